use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::pipeline::PipelineError;

#[derive(Error, Debug)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Secret error: {0}")]
    Secret(#[from] crate::secrets::SecretError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Failed to parse config YAML: {0}")]
    ParseYaml(#[from] serde_yaml::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Failure of a single format extractor. Never aborts a walk; it is recorded
/// as the item's extraction error.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Unsupported document format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("Spreadsheet error: {0}")]
    Spreadsheet(String),

    #[error("Shapefile error: {0}")]
    Shapefile(String),

    #[error("Delimited text error: {0}")]
    Delimited(String),

    #[error("Invalid ZIP format: {0}")]
    Archive(String),
}

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("Failed to open archive '{path}': {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt archive '{path}': {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to create extraction directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Scan root '{0}' does not exist or is not a directory")]
    InvalidRoot(PathBuf),

    #[error("Failed to prepare temporary directory '{path}': {source}")]
    TempDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Worker pool failure: {0}")]
    Worker(String),
}

pub type Result<T> = std::result::Result<T, HarvestError>;
