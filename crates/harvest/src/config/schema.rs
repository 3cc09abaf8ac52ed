use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub version: String,
    pub root_directory: String,
    #[serde(default = "default_temp_directory")]
    pub temp_directory: String,
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default = "default_field_map")]
    pub field_map: BTreeMap<String, String>,
    #[serde(default)]
    pub dataset_extras: BTreeMap<String, String>,
}

fn default_temp_directory() -> String {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("harvest")
        .join("extract")
        .to_string_lossy()
        .into_owned()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_file: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: Option<String>,
    /// Organization used for items that do not come out of an archive.
    #[serde(default)]
    pub default_organization: Option<String>,
    /// Publish into an in-memory catalog instead of the remote one.
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_api_key_env() -> Option<String> {
    Some("CKAN_API_KEY".to_string())
}

fn default_timeout_secs() -> u64 {
    90
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    2000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// 1 keeps archive contents sequential; more enables the extraction pool.
    #[serde(default = "default_workers")]
    pub workers: usize,
    #[serde(default = "default_max_archive_depth")]
    pub max_archive_depth: usize,
    /// Extensions to publish (`pdf`, `.csv`). Empty publishes every
    /// supported format.
    #[serde(default)]
    pub extensions: Vec<String>,
}

fn default_workers() -> usize {
    1
}

fn default_max_archive_depth() -> usize {
    16
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            max_archive_depth: default_max_archive_depth(),
            extensions: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default = "default_max_pdf_pages")]
    pub max_pdf_pages: u64,
    #[serde(default = "default_max_sheets")]
    pub max_sheets: u64,
    #[serde(default = "default_max_features")]
    pub max_features: u64,
}

fn default_max_pdf_pages() -> u64 {
    1000
}

fn default_max_sheets() -> u64 {
    50
}

fn default_max_features() -> u64 {
    1_000_000
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_pdf_pages: default_max_pdf_pages(),
            max_sheets: default_max_sheets(),
            max_features: default_max_features(),
        }
    }
}

/// Source field → catalog field.
pub fn default_field_map() -> BTreeMap<String, String> {
    [
        ("file_name", "name"),
        ("format", "format"),
        ("title", "title"),
        ("author", "author"),
        ("subject", "subject"),
        ("created", "created"),
        ("modified", "last_modified"),
        ("keywords", "tags"),
        ("bbox", "spatial_bbox"),
        ("crs", "crs"),
        ("geometry_types", "geometry_types"),
        ("sheets", "excel_sheets"),
        ("page_count", "page_count"),
        ("relative_path", "relative_path"),
    ]
    .into_iter()
    .map(|(source, target)| (source.to_string(), target.to_string()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_gets_defaults() {
        let json = r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": { "url": "https://ckan.example.org" }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.scan.workers, 1);
        assert_eq!(config.scan.max_archive_depth, 16);
        assert_eq!(config.catalog.retry.attempts, 3);
        assert_eq!(config.catalog.retry.delay_ms, 2000);
        assert_eq!(config.catalog.timeout_secs, 90);
        assert_eq!(config.catalog.api_key_env.as_deref(), Some("CKAN_API_KEY"));
        assert_eq!(config.validation.max_pdf_pages, 1000);
        assert_eq!(config.field_map.get("keywords").map(String::as_str), Some("tags"));
        assert!(config.temp_directory.ends_with("extract"));
    }

    #[test]
    fn test_field_map_override_replaces_defaults() {
        let json = r#"{
            "version": "1",
            "root_directory": "/data",
            "catalog": { "url": "https://ckan.example.org" },
            "field_map": { "title": "title" }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.field_map.len(), 1);
    }
}
