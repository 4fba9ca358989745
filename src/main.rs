mod cli;

use hippo::{config, server};
use hippo_media::{EndStrategy, FragmentIndex};

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands};
use std::path::{Path, PathBuf};

/// Command-line overrides for `serve`; `None` keeps the config file value.
struct ServeOverrides {
    host: Option<String>,
    port: Option<u16>,
    file_root: Option<PathBuf>,
    url_root: Option<String>,
    log_level: Option<u8>,
    log_output: Option<PathBuf>,
    no_cross_domain: bool,
    cors: bool,
    debug: bool,
}

impl ServeOverrides {
    fn apply(self, config: &mut config::Config) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(file_root) = self.file_root {
            config.server.file_root = file_root;
        }
        if let Some(url_root) = self.url_root {
            config.server.url_root = url_root;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if let Some(output) = self.log_output {
            config.logging.output = Some(output);
        }
        if self.no_cross_domain {
            config.server.cross_domain = false;
        }
        if self.cors {
            config.server.set_cors_headers = true;
        }
        if self.debug {
            config.server.debug = true;
        }
    }
}

/// Initialize tracing. `RUST_LOG` wins over the configured level.
fn init_logging(logging: &config::LoggingConfig, debug: bool, verbose: bool) -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose {
            "hippo=trace,hippo_media=trace,tower_http=debug".to_string()
        } else {
            logging.filter_directive(debug)
        }
    });

    match &logging.output {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {:?}", path))?;
            tracing_subscriber::fmt()
                .with_env_filter(&env_filter)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(&env_filter).init();
        }
    }

    Ok(())
}

fn serve(config_path: Option<&Path>, overrides: ServeOverrides, verbose: bool) -> Result<()> {
    let mut config = config::load_config_or_default(config_path)?;
    overrides.apply(&mut config);
    config::validate_config(&config)?;
    config::resolve_roots(&mut config.server)?;

    init_logging(&config.logging, config.server.debug, verbose)?;
    tracing::info!("Starting hippo {}", env!("CARGO_PKG_VERSION"));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(server::start_server(config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            host,
            port,
            file_root,
            url_root,
            log_level,
            log_output,
            no_cross_domain,
            cors,
            debug,
        } => {
            let overrides = ServeOverrides {
                host,
                port,
                file_root,
                url_root,
                log_level,
                log_output,
                no_cross_domain,
                cors,
                debug,
            };
            serve(cli.config.as_deref(), overrides, cli.verbose)
        }
        Commands::Index { file, json } => {
            init_logging(&config::LoggingConfig::default(), false, cli.verbose)?;
            print_index(&file, json)
        }
        Commands::Locate {
            file,
            track_id,
            time,
            next_entry,
        } => {
            init_logging(&config::LoggingConfig::default(), false, cli.verbose)?;
            locate(&file, track_id, time, next_entry)
        }
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("hippo {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn print_index(file: &Path, json: bool) -> Result<()> {
    let index = FragmentIndex::open(file)
        .with_context(|| format!("Failed to read fragment index from {:?}", file))?;

    if json {
        let json_str = serde_json::to_string_pretty(&index)?;
        println!("{}", json_str);
        return Ok(());
    }

    println!("File: {}", file.display());
    println!("Size: {} bytes", index.file_size);
    println!("mfra: offset {}, {} bytes", index.mfra.offset, index.mfra.size);
    println!("\nTracks: {}", index.tracks.len());
    for track in &index.tracks {
        println!(
            "  track {} (tfra v{}): {} entries",
            track.track_id,
            track.version,
            track.entries.len()
        );
        for entry in &track.entries {
            println!("      time {:>12}  moof @ {}", entry.time, entry.moof_offset);
        }
    }

    Ok(())
}

fn locate(file: &Path, track_id: u32, time: u64, next_entry: bool) -> Result<()> {
    let strategy = if next_entry {
        EndStrategy::NextEntryBoundary
    } else {
        EndStrategy::ScanToMdat
    };

    let range = hippo_media::resolve_with(file, track_id, time, strategy)
        .with_context(|| format!("Failed to locate track {} time {} in {:?}", track_id, time, file))?;
    println!("{}", range);
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let mut config = config::load_config(p)?;
            config::resolve_roots(&mut config.server)?;
            println!("✓ Configuration is valid");
            println!("  Server: {}:{}", config.server.host, config.server.port);
            println!("  File root: {}", config.server.file_root.display());
            println!("  URL root: {}", config.server.url_root);
            println!("  End strategy: {:?}", config.index.end_strategy);
            println!(
                "  Index cache: {}",
                if config.index.cache_enabled {
                    format!("{} entries, {}s TTL", config.index.cache_max_entries, config.index.cache_ttl_secs)
                } else {
                    "disabled".to_string()
                }
            );
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Server: {}:{}", config.server.host, config.server.port);
        }
    }

    Ok(())
}
