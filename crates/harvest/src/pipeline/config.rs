use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::catalog::RetryPolicy;
use crate::config::{Config, ValidationConfig};
use crate::extractor::{ExtensionFilter, Fields};

pub struct PipelineConfig {
    pub root_directory: PathBuf,
    pub temp_directory: PathBuf,
    pub default_organization: Option<String>,
    pub field_map: BTreeMap<String, String>,
    pub dataset_extras: Fields,
    pub validation: ValidationConfig,
    pub workers: usize,
    pub max_archive_depth: usize,
    pub extensions: ExtensionFilter,
    pub retry: RetryPolicy,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            root_directory: PathBuf::from(&config.root_directory),
            temp_directory: PathBuf::from(&config.temp_directory),
            default_organization: config
                .catalog
                .default_organization
                .clone()
                .filter(|o| !o.trim().is_empty()),
            field_map: config.field_map.clone(),
            dataset_extras: config
                .dataset_extras
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
            validation: config.validation.clone(),
            // More threads than cores only adds contention
            workers: config.scan.workers.clamp(1, num_cpus::get().max(1)),
            max_archive_depth: config.scan.max_archive_depth,
            extensions: ExtensionFilter::new(&config.scan.extensions),
            retry: RetryPolicy::from(&config.catalog.retry),
        }
    }
}
