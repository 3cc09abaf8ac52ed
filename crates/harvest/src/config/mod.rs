pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, load_config_from_yaml};
pub use schema::{
    default_field_map, CatalogConfig, Config, RetryConfig, ScanConfig, ValidationConfig,
};
