//! Catalog API key lookup.
//!
//! `catalog.api_key` wins over `catalog.api_key_file` (mounted secrets),
//! which wins over `catalog.api_key_env`. Having no key at all is not an
//! error: reads still work and the catalog rejects writes.

use std::path::PathBuf;

use secrecy::SecretString;
use tracing::debug;

use crate::config::CatalogConfig;

#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("Cannot read API key file '{}': {source}", path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("API key file '{}' is empty", path.display())]
    EmptyKeyFile { path: PathBuf },

    #[error("Environment variable '{0}' holds invalid UTF-8")]
    NotUnicode(String),
}

/// Where the key is configured to come from. Blank settings are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource<'a> {
    Inline(&'a str),
    File(&'a str),
    Env(&'a str),
}

impl<'a> KeySource<'a> {
    pub fn from_config(catalog: &'a CatalogConfig) -> Option<Self> {
        fn non_blank(value: &Option<String>) -> Option<&str> {
            value.as_deref().map(str::trim).filter(|v| !v.is_empty())
        }

        non_blank(&catalog.api_key)
            .map(KeySource::Inline)
            .or_else(|| non_blank(&catalog.api_key_file).map(KeySource::File))
            .or_else(|| non_blank(&catalog.api_key_env).map(KeySource::Env))
    }
}

pub fn resolve_api_key(catalog: &CatalogConfig) -> Result<Option<SecretString>, SecretError> {
    let Some(source) = KeySource::from_config(catalog) else {
        return Ok(None);
    };

    match source {
        KeySource::Inline(key) => Ok(Some(SecretString::from(key.to_string()))),
        KeySource::File(path) => {
            let path = expand_home(path);
            let content = std::fs::read_to_string(&path).map_err(|e| SecretError::KeyFile {
                path: path.clone(),
                source: e,
            })?;
            let key = content.trim();
            if key.is_empty() {
                return Err(SecretError::EmptyKeyFile { path });
            }
            Ok(Some(SecretString::from(key.to_string())))
        }
        KeySource::Env(name) => match std::env::var(name) {
            // Values pasted into env files often keep their newline
            Ok(value) if !value.trim().is_empty() => {
                Ok(Some(SecretString::from(value.trim().to_string())))
            }
            Ok(_) | Err(std::env::VarError::NotPresent) => {
                debug!(var = name, "API key variable not set");
                Ok(None)
            }
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::NotUnicode(name.to_string())),
        },
    }
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(path),
    }
}
