use hippo_media::EndStrategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub index: IndexConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory under which stream manifests and media files live
    #[serde(default = "default_file_root")]
    pub file_root: PathBuf,

    /// URL path prefix at which the file root is exposed
    #[serde(default = "default_url_root")]
    pub url_root: String,

    /// Serve a permissive /crossdomain.xml
    #[serde(default = "default_true")]
    pub cross_domain: bool,

    /// Add `Access-Control-Allow-Origin: *` to stream responses
    #[serde(default)]
    pub set_cors_headers: bool,

    #[serde(default)]
    pub debug: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8000
}
fn default_file_root() -> PathBuf {
    PathBuf::from(".")
}
fn default_url_root() -> String {
    "/".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            file_root: default_file_root(),
            url_root: default_url_root(),
            cross_domain: true,
            set_cors_headers: false,
            debug: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Verbosity between 0 and 10 (0 = warnings only)
    #[serde(default = "default_log_level")]
    pub level: u8,

    /// Log file; stdout when unset
    #[serde(default)]
    pub output: Option<PathBuf>,
}

fn default_log_level() -> u8 {
    1
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            output: None,
        }
    }
}

impl LoggingConfig {
    /// Directive for the hippo crates at this level.
    pub fn filter_directive(&self, debug: bool) -> String {
        let level = match (debug, self.level) {
            (true, l) if l < 5 => "debug",
            (_, 0) => "warn",
            (_, 1) => "info",
            (_, 2..=4) => "debug",
            _ => "trace",
        };
        let http = if level == "warn" { "warn" } else { "info" };
        format!("hippo={level},hippo_media={level},tower_http={http}")
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexConfig {
    /// How fragment ends are computed
    #[serde(default)]
    pub end_strategy: EndStrategy,

    /// Keep parsed fragment indexes between requests
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: usize,

    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,
}

fn default_cache_max_entries() -> usize {
    256
}
fn default_cache_ttl() -> u64 {
    3600
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            end_strategy: EndStrategy::default(),
            cache_enabled: true,
            cache_max_entries: default_cache_max_entries(),
            cache_ttl_secs: default_cache_ttl(),
        }
    }
}
