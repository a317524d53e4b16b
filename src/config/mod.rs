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

    let default_paths = [
        "./profileforge.toml",
        "./config.toml",
        "~/.config/profileforge/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.engine.rendition_fields.is_empty() {
        anyhow::bail!("engine.rendition_fields cannot be empty");
    }

    if config.engine.segment_extension.trim().is_empty() {
        anyhow::bail!("engine.segment_extension cannot be empty");
    }

    if !config.batch.template_suffix.ends_with(".json") {
        anyhow::bail!(
            "batch.template_suffix must end in .json, got '{}'",
            config.batch.template_suffix
        );
    }

    let paths = [
        ("rules", &config.paths.rules),
        ("template", &config.paths.template),
        ("schema", &config.paths.schema),
    ];
    for (name, path) in paths {
        if let Some(path) = path {
            if !path.exists() {
                tracing::warn!("paths.{} does not exist: {:?}", name, path);
            }
        }
    }

    Ok(())
}
