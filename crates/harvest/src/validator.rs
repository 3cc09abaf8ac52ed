//! Advisory per-format checks. Issues are reported, never enforced.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::extractor::{Fields, FileFormat};
use crate::scan::{ItemKind, ScanItem};

pub type Issues = BTreeMap<String, String>;

#[derive(Debug, Clone, Default)]
pub struct Validator {
    limits: ValidationConfig,
}

impl Validator {
    pub fn new(limits: ValidationConfig) -> Self {
        Self { limits }
    }

    /// Issue key → message. Empty when the item looks fine.
    pub fn validate(&self, item: &ScanItem) -> Issues {
        let mut issues = Issues::new();

        if let Some(error) = &item.extraction_error {
            issues.insert(
                "extraction_error".to_string(),
                format!("Extraction error: {}", error),
            );
        }

        // Nothing further can be said about an unreadable file
        if item.extraction_error.is_none() {
            match item.kind {
                ItemKind::File(FileFormat::Pdf) => self.check_pdf(&item.fields, &mut issues),
                ItemKind::File(FileFormat::Xlsx) => {
                    self.check_spreadsheet(&item.fields, &mut issues)
                }
                ItemKind::File(FileFormat::Shapefile) => {
                    self.check_shapefile(&item.fields, &mut issues)
                }
                _ => {}
            }
        }

        if !issues.is_empty() {
            debug!(path = %item.relative_path, ?issues, "Validation issues");
        }
        issues
    }

    fn check_pdf(&self, fields: &Fields, issues: &mut Issues) {
        if !has_value(fields, "title") {
            issues.insert("title".to_string(), "PDF title missing".to_string());
        }
        check_count(
            fields,
            "page_count",
            "Page count",
            self.limits.max_pdf_pages,
            issues,
        );
    }

    fn check_spreadsheet(&self, fields: &Fields, issues: &mut Issues) {
        if !has_value(fields, "title") {
            issues.insert("title".to_string(), "Spreadsheet title missing".to_string());
        }
        check_count(
            fields,
            "sheet_count",
            "Sheet count",
            self.limits.max_sheets,
            issues,
        );
    }

    fn check_shapefile(&self, fields: &Fields, issues: &mut Issues) {
        if !has_value(fields, "crs") {
            issues.insert("crs".to_string(), "CRS missing".to_string());
        }
        if !has_value(fields, "geometry_types") {
            issues.insert(
                "geometry_types".to_string(),
                "Geometry types missing".to_string(),
            );
        }
        if let Some(count) = fields.get("feature_count").and_then(Value::as_u64) {
            if count > self.limits.max_features {
                issues.insert(
                    "feature_count".to_string(),
                    format!("Too many features ({}>{})", count, self.limits.max_features),
                );
            }
        }
    }
}

fn has_value(fields: &Fields, key: &str) -> bool {
    match fields.get(key) {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(Value::Array(a)) => !a.is_empty(),
        Some(_) => true,
    }
}

fn check_count(fields: &Fields, key: &str, label: &str, limit: u64, issues: &mut Issues) {
    match fields.get(key).and_then(Value::as_u64) {
        None => {
            issues.insert(key.to_string(), format!("{} not available", label));
        }
        Some(count) if count > limit => {
            issues.insert(
                key.to_string(),
                format!("{} exceeds limit ({}>{})", label, count, limit),
            );
        }
        Some(_) => {}
    }
}
