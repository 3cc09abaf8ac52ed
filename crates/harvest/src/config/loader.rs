use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;
use crate::extractor::{normalize_extension, FileFormat};

pub const SUPPORTED_VERSION: &str = "1";

/// Loads a config file. `.yaml`/`.yml` files are parsed as YAML, anything
/// else as JSON.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    let is_yaml = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
        .unwrap_or(false);

    if is_yaml {
        load_config_from_yaml(&content)
    } else {
        load_config_from_str(&content)
    }
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn load_config_from_yaml(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != SUPPORTED_VERSION {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.root_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "root_directory must not be empty".to_string(),
        });
    }

    if config.temp_directory.trim().is_empty() {
        return Err(ConfigError::Validation {
            message: "temp_directory must not be empty".to_string(),
        });
    }

    if !config.catalog.dry_run {
        let url = config.catalog.url.trim().to_lowercase();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::Validation {
                message: format!(
                    "catalog.url must start with http:// or https:// (got '{}')",
                    config.catalog.url
                ),
            });
        }
    }

    if config.catalog.retry.attempts == 0 {
        return Err(ConfigError::Validation {
            message: "catalog.retry.attempts must be at least 1".to_string(),
        });
    }

    if config.scan.workers == 0 {
        return Err(ConfigError::Validation {
            message: "scan.workers must be at least 1".to_string(),
        });
    }

    if config.scan.max_archive_depth == 0 {
        return Err(ConfigError::Validation {
            message: "scan.max_archive_depth must be at least 1".to_string(),
        });
    }

    for ext in &config.scan.extensions {
        if FileFormat::from_extension(&normalize_extension(ext)).is_none() {
            return Err(ConfigError::Validation {
                message: format!("scan.extensions: unsupported extension '{}'", ext),
            });
        }
    }

    for (source, target) in &config.field_map {
        if source.trim().is_empty() || target.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: format!("Invalid field_map entry '{}' -> '{}'", source, target),
            });
        }
    }

    Ok(())
}
