use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, info, info_span, warn};

use crate::catalog::{CatalogApi, CatalogSync, DatasetPayload, ResourceOutcome, ResourcePayload};
use crate::extractor::{ExtractorRegistry, Fields};
use crate::sanitize;
use crate::scan::{ScanItem, Scanner};
use crate::slug::slugify;
use crate::transformer::Transformer;
use crate::validator::Validator;

use super::config::PipelineConfig;
use super::error::PipelineError;
use super::names::ResourceNames;
use super::report::RunReport;

/// Scanner → Validator → Transformer → catalog, one item at a time.
pub struct Pipeline<C> {
    config: Arc<PipelineConfig>,
    catalog: C,
    scanner: Scanner,
    validator: Validator,
    transformer: Transformer,
}

impl<C: CatalogApi> Pipeline<C> {
    pub fn from_config(config: Arc<PipelineConfig>, catalog: C) -> Self {
        let scanner = Scanner::new(
            Arc::new(ExtractorRegistry::new()),
            config.max_archive_depth,
            config.workers,
        )
        .with_extensions(config.extensions.clone());
        let validator = Validator::new(config.validation.clone());
        let transformer = Transformer::new(config.field_map.clone());

        Self {
            config,
            catalog,
            scanner,
            validator,
            transformer,
        }
    }

    pub fn catalog(&self) -> &C {
        &self.catalog
    }

    /// One complete run. Catalog caches live exactly as long as this call;
    /// the run's temporary directory is removed on every exit path.
    pub fn run(&self) -> Result<RunReport, PipelineError> {
        let root = &self.config.root_directory;
        let _pipeline_span = info_span!("pipeline",
            root = %sanitize::redact_path(root),
        )
        .entered();

        let mut report = RunReport::new(Utc::now());
        let mut sync = CatalogSync::new(&self.catalog, self.config.retry);
        let mut names = ResourceNames::new();

        {
            let _step = info_span!("check_connection").entered();
            sync.check_connection().map_err(PipelineError::Connection)?;
        }

        let temp_base = &self.config.temp_directory;
        fs::create_dir_all(temp_base).map_err(|e| PipelineError::TempDirectory {
            path: temp_base.clone(),
            source: e,
        })?;
        let run_dir = tempfile::Builder::new()
            .prefix("run-")
            .tempdir_in(temp_base)
            .map_err(|e| PipelineError::TempDirectory {
                path: temp_base.clone(),
                source: e,
            })?;

        // run_dir is dropped (and removed) when this function returns, also
        // when the walk is aborted
        let summary = self.scanner.walk(root, run_dir.path(), |item| {
            self.process_item(&mut sync, &mut names, &mut report, item)
        })?;

        report.finish(&summary, sync.stats().clone());

        if let Err(e) = run_dir.close() {
            warn!("Failed to remove run directory: {}", e);
        }

        info!(
            items = report.items_scanned(),
            writes = report.sync.writes(),
            failures = report.sync.failures,
            "Pipeline run finished"
        );
        Ok(report)
    }

    fn process_item(
        &self,
        sync: &mut CatalogSync<&C>,
        names: &mut ResourceNames,
        report: &mut RunReport,
        item: ScanItem,
    ) -> Result<(), PipelineError> {
        let _item_span = info_span!("item",
            path = %item.relative_path,
            kind = item.kind.name(),
        )
        .entered();

        report.record_item(&item);

        {
            let _step = info_span!("validate").entered();
            let issues = self.validator.validate(&item);
            report.validation_issues += issues.len();
            for (key, message) in &issues {
                warn!(issue = %key, "{}", message);
            }
        }

        let fields = {
            let _step = info_span!("transform").entered();
            self.transformer.transform(&item)
        };

        let Some((org_slug, org_title)) = self.organization_for(&item) else {
            debug!("No organization for item, not publishing");
            report.items_without_organization += 1;
            return Ok(());
        };

        let _step = info_span!("publish").entered();

        let Some(org_id) = sync
            .ensure_organization(&org_slug, &org_title)
            .map_err(PipelineError::Aborted)?
        else {
            report.items_unresolved += 1;
            return Ok(());
        };

        let dataset = self.dataset_payload(&item, org_id);
        let Some(dataset_id) = sync
            .ensure_dataset(&dataset)
            .map_err(PipelineError::Aborted)?
        else {
            report.items_unresolved += 1;
            return Ok(());
        };

        // Directories only describe their dataset
        let Some(hash) = item.content_hash.as_deref() else {
            return Ok(());
        };

        let mut payload = resource_payload(&item, fields);
        let (name, renamed) = names.assign(&dataset_id, &payload.name, &item.relative_path);
        if renamed {
            info!(taken = %payload.name, name = %name, "Resource name already used in dataset");
            report.resources_renamed += 1;
            payload.name = name;
        }
        match sync
            .upsert_resource(&dataset_id, &payload, &item.path, hash)
            .map_err(PipelineError::Aborted)?
        {
            Some(ResourceOutcome::Skipped) => {
                debug!(file = %sanitize::redact_path(&item.path), "Duplicate reference skipped")
            }
            Some(_) => {}
            None => report.items_unresolved += 1,
        }
        Ok(())
    }

    /// Organization slug and title. Archive contents belong to the
    /// organization named after their archive.
    fn organization_for(&self, item: &ScanItem) -> Option<(String, String)> {
        if let Some(origin) = &item.origin {
            let title = Path::new(&origin.archive_path)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| origin.organization.clone());
            return Some((origin.organization.clone(), title));
        }

        self.config
            .default_organization
            .as_ref()
            .map(|name| (slugify(name), name.clone()))
    }

    fn dataset_payload(&self, item: &ScanItem, owner_org: String) -> DatasetPayload {
        let title = dataset_title(item);
        DatasetPayload {
            name: slugify(&title),
            notes: format!("Automatically created dataset for {}", title),
            title,
            owner_org,
            extras: self.config.dataset_extras.clone(),
        }
    }
}

/// Directories name their own dataset; files join the dataset of the
/// directory they sit in, or one named after themselves at the root.
fn dataset_title(item: &ScanItem) -> String {
    if item.is_directory() {
        return item.file_name();
    }
    match item.parent_segment() {
        Some(parent) => parent.to_string(),
        None => item.stem(),
    }
}

fn resource_payload(item: &ScanItem, mut fields: Fields) -> ResourcePayload {
    let name = match fields.remove("name") {
        Some(Value::String(name)) if !name.trim().is_empty() => name,
        _ => item.file_name(),
    };
    ResourcePayload::new(name, fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogError, MemoryCatalog, RetryPolicy};
    use crate::config::{default_field_map, ValidationConfig};
    use crate::extractor::{ExtensionFilter, FileFormat};
    use crate::scan::item::tests::file_item;
    use crate::scan::ArchiveOrigin;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::TempDir;

    fn config(root: PathBuf, temp: PathBuf, default_org: Option<&str>) -> Arc<PipelineConfig> {
        Arc::new(PipelineConfig {
            root_directory: root,
            temp_directory: temp,
            default_organization: default_org.map(str::to_string),
            field_map: default_field_map(),
            dataset_extras: Fields::new(),
            validation: ValidationConfig::default(),
            workers: 1,
            max_archive_depth: 8,
            extensions: ExtensionFilter::default(),
            retry: RetryPolicy::new(2, Duration::ZERO),
        })
    }

    #[test]
    fn test_dataset_title_rules() {
        let nested = file_item("reports/2024/summary.pdf", FileFormat::Pdf);
        assert_eq!(dataset_title(&nested), "2024");

        let root = file_item("summary.pdf", FileFormat::Pdf);
        assert_eq!(dataset_title(&root), "summary");
    }

    #[test]
    fn test_resource_name_from_fields() {
        let item = file_item("a/report.csv", FileFormat::Csv);
        let mut fields = Fields::new();
        fields.insert("name".into(), Value::String("Report 2024".into()));
        fields.insert("format".into(), Value::String("CSV".into()));

        let payload = resource_payload(&item, fields);
        assert_eq!(payload.name, "Report 2024");
        assert!(!payload.fields.contains_key("name"));

        let payload = resource_payload(&item, Fields::new());
        assert_eq!(payload.name, "report.csv");
    }

    #[test]
    fn test_organization_for_item() {
        let tmp = TempDir::new().unwrap();
        let pipeline = Pipeline::from_config(
            config(tmp.path().into(), tmp.path().join("t"), Some("City Archive")),
            MemoryCatalog::new(),
        );

        let plain = file_item("a.pdf", FileFormat::Pdf);
        assert_eq!(
            pipeline.organization_for(&plain),
            Some(("city-archive".to_string(), "City Archive".to_string()))
        );

        let mut extracted = file_item("exports/Water Board.zip/a.pdf", FileFormat::Pdf);
        extracted.origin = Some(ArchiveOrigin {
            archive_path: "exports/Water Board.zip".into(),
            organization: "water-board".into(),
        });
        assert_eq!(
            pipeline.organization_for(&extracted),
            Some(("water-board".to_string(), "Water Board".to_string()))
        );
    }

    #[test]
    fn test_run_without_default_organization_publishes_nothing() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("notes.txt"), "hello").unwrap();

        let pipeline =
            Pipeline::from_config(config(root, tmp.path().join("temp"), None), MemoryCatalog::new());
        let report = pipeline.run().unwrap();

        assert_eq!(report.files, 1);
        assert_eq!(report.items_without_organization, 1);
        assert_eq!(pipeline.catalog().counts().writes(), 0);
    }

    #[test]
    fn test_unreachable_catalog_aborts_before_scanning() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("root");
        fs::create_dir_all(&root).unwrap();

        let catalog = MemoryCatalog::new();
        catalog.fail_next(
            "status",
            vec![
                CatalogError::Transient("down".into()),
                CatalogError::Transient("down".into()),
            ],
        );
        let temp = tmp.path().join("temp");
        let pipeline = Pipeline::from_config(config(root, temp.clone(), Some("org")), catalog);

        assert!(matches!(pipeline.run(), Err(PipelineError::Connection(_))));
        assert!(!temp.exists());
    }
}
