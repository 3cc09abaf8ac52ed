//! Isolated environment for running the full pipeline against a
//! `MemoryCatalog`.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use harvest::catalog::{Dataset, MemoryCatalog, Resource, RetryPolicy};
use harvest::config::{default_field_map, ValidationConfig};
use harvest::extractor::{ExtensionFilter, Fields};
use harvest::{Pipeline, PipelineConfig, PipelineError, RunReport};

use super::builders::ZipBuilder;

pub const DEFAULT_ORG: &str = "City Archive";

pub struct TestHarness {
    temp_dir: TempDir,
    /// Directory tree being harvested.
    pub root: PathBuf,
    /// Base directory for per-run extraction areas.
    pub temp_base: PathBuf,
    pub catalog: Arc<MemoryCatalog>,
    default_organization: Option<String>,
    workers: usize,
    max_archive_depth: usize,
    extensions: ExtensionFilter,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().join("root");
        let temp_base = temp_dir.path().join("scratch");
        fs::create_dir_all(&root).expect("Failed to create root directory");

        Self {
            temp_dir,
            root,
            temp_base,
            catalog: Arc::new(MemoryCatalog::new()),
            default_organization: Some(DEFAULT_ORG.to_string()),
            workers: 1,
            max_archive_depth: 8,
            extensions: ExtensionFilter::default(),
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = ExtensionFilter::new(extensions);
        self
    }

    pub fn without_default_organization(mut self) -> Self {
        self.default_organization = None;
        self
    }

    /// Directory holding both `root` and `temp_base`.
    pub fn base(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
        let path = self.root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(&path, contents).expect("Failed to write file");
        path
    }

    pub fn write_zip(&self, relative: &str, zip: ZipBuilder) -> PathBuf {
        self.write(relative, zip.build())
    }

    pub fn config(&self) -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            root_directory: self.root.clone(),
            temp_directory: self.temp_base.clone(),
            default_organization: self.default_organization.clone(),
            field_map: default_field_map(),
            dataset_extras: Fields::new(),
            validation: ValidationConfig::default(),
            workers: self.workers,
            max_archive_depth: self.max_archive_depth,
            extensions: self.extensions.clone(),
            retry: RetryPolicy::new(2, Duration::ZERO),
        })
    }

    /// Runs a fresh pipeline, so every run starts with empty caches.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        Pipeline::from_config(self.config(), Arc::clone(&self.catalog)).run()
    }

    /// Entries left below the temp base.
    pub fn temp_leftovers(&self) -> Vec<PathBuf> {
        match fs::read_dir(&self.temp_base) {
            Ok(entries) => entries.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
            Err(_) => Vec::new(),
        }
    }

    pub fn dataset(&self, name: &str) -> Dataset {
        self.catalog
            .dataset(name)
            .unwrap_or_else(|| panic!("dataset '{}' not in catalog", name))
    }

    /// The resource called `name`, wherever it was published.
    pub fn resource(&self, name: &str) -> (Dataset, Resource) {
        self.catalog
            .datasets()
            .into_iter()
            .find_map(|dataset| {
                let resource = dataset.resources.iter().find(|r| r.name == name)?.clone();
                Some((dataset, resource))
            })
            .unwrap_or_else(|| panic!("resource '{}' not in catalog", name))
    }

    pub fn organization_id(&self, slug: &str) -> String {
        self.catalog
            .organizations()
            .into_iter()
            .find(|o| o.name == slug)
            .map(|o| o.id)
            .unwrap_or_else(|| panic!("organization '{}' not in catalog", slug))
    }
}
