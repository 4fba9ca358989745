mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./hippo.toml",
        "~/.config/hippo/config.toml",
        "/etc/hippo/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    if config.logging.level > 10 {
        anyhow::bail!(
            "Log level must be between 0 and 10, got {}",
            config.logging.level
        );
    }

    if config.index.cache_enabled && config.index.cache_max_entries == 0 {
        anyhow::bail!("Index cache is enabled but cache_max_entries is 0");
    }

    Ok(())
}

/// Resolve the file root to an absolute directory and normalize the URL root.
///
/// Run after command-line overrides have been applied.
pub fn resolve_roots(server: &mut ServerConfig) -> Result<()> {
    let root = server
        .file_root
        .canonicalize()
        .with_context(|| format!("Root path {:?} does not exist", server.file_root))?;
    if !root.is_dir() {
        anyhow::bail!("Root path {:?} is not a directory", root);
    }
    server.file_root = root;

    if !server.url_root.starts_with('/') {
        server.url_root.insert(0, '/');
    }

    Ok(())
}
