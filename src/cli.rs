use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "hippo")]
#[command(author, version, about = "DASH and Smooth Streaming server for fragmented MP4 files")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Serve streams from a file root
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Directory containing stream manifests and media
        #[arg(short = 'r', long)]
        file_root: Option<PathBuf>,

        /// URL path prefix the file root is served under
        #[arg(short = 'u', long)]
        url_root: Option<String>,

        /// Log verbosity, 0 (warnings) to 10
        #[arg(short = 'l', long)]
        log_level: Option<u8>,

        /// Write logs to this file instead of stdout
        #[arg(short = 'o', long)]
        log_output: Option<PathBuf>,

        /// Do not answer /crossdomain.xml
        #[arg(short = 'x', long)]
        no_cross_domain: bool,

        /// Add Access-Control-Allow-Origin to stream responses
        #[arg(long)]
        cors: bool,

        /// Log every request path
        #[arg(short = 'd', long)]
        debug: bool,
    },

    /// Print the fragment index of a file
    Index {
        /// Fragmented MP4 file
        #[arg(required = true)]
        file: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Resolve the byte range of one fragment
    Locate {
        /// Fragmented MP4 file
        #[arg(required = true)]
        file: PathBuf,

        /// Track ID from the tfra box
        track_id: u32,

        /// Fragment start time in track timescale units
        time: u64,

        /// End at the next index entry instead of scanning to the mdat
        #[arg(long)]
        next_entry: bool,
    },

    /// Validate configuration file
    Validate {
        /// Config file to validate (uses default if not specified)
        config: Option<PathBuf>,
    },

    /// Display version information
    Version,
}
