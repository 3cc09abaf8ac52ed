pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extractor;
pub mod hash;
pub mod logging;
pub mod pipeline;
pub mod sanitize;
pub mod scan;
pub mod secrets;
pub mod slug;
pub mod transformer;
pub mod validator;

pub use archive::{ArchiveExtractor, ExtractReport, VisitedArchives};
pub use catalog::{CatalogApi, CatalogError, CatalogSync, CkanClient, MemoryCatalog};
pub use config::{load_config, Config};
pub use error::{ArchiveError, ConfigError, ExtractError, HarvestError, Result, ScanError};
pub use extractor::{ExtensionFilter, ExtractorRegistry, FileFormat, FormatExtractor};
pub use pipeline::{Pipeline, PipelineConfig, PipelineError, RunReport};
pub use scan::{ScanItem, Scanner};
pub use secrets::{resolve_api_key, KeySource, SecretError};
pub use slug::slugify;
pub use transformer::Transformer;
pub use validator::Validator;
