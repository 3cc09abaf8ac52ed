pub mod archive;
pub mod pdf;
pub mod shapefile;
pub mod spreadsheet;
pub mod text;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Field mapping produced by extraction and consumed by the transformer.
pub type Fields = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Pdf,
    Xlsx,
    Xls,
    Shapefile,
    Csv,
    Text,
    Zip,
}

impl FileFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(FileFormat::Pdf),
            "xlsx" => Some(FileFormat::Xlsx),
            "xls" => Some(FileFormat::Xls),
            "shp" => Some(FileFormat::Shapefile),
            "csv" => Some(FileFormat::Csv),
            "txt" | "md" => Some(FileFormat::Text),
            "zip" => Some(FileFormat::Zip),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Label published as the resource format.
    pub fn label(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "PDF",
            FileFormat::Xlsx => "XLSX",
            FileFormat::Xls => "XLS",
            FileFormat::Shapefile => "SHP",
            FileFormat::Csv => "CSV",
            FileFormat::Text => "TXT",
            FileFormat::Zip => "ZIP",
        }
    }

    pub fn is_archive(&self) -> bool {
        matches!(self, FileFormat::Zip)
    }
}

/// Extensions allowed through a walk. An empty filter allows every
/// supported format. Archives are always unpacked; the filter only decides
/// whether the archive file itself is published.
#[derive(Debug, Clone, Default)]
pub struct ExtensionFilter {
    allowed: HashSet<String>,
}

impl ExtensionFilter {
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed: extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.allowed.is_empty()
    }

    pub fn allows(&self, path: &Path) -> bool {
        if self.allowed.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.allowed.contains(&normalize_extension(e)))
    }
}

/// `".PDF "` → `"pdf"`
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Outcome of running an extractor: whatever fields could be read plus an
/// error message when the input was malformed.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub fields: Fields,
    pub error: Option<String>,
}

pub trait FormatExtractor: Send + Sync {
    fn extract(&self, path: &Path) -> Result<Fields, ExtractError>;
}

/// Fixed extension → extractor table.
pub struct ExtractorRegistry {
    extractors: HashMap<FileFormat, Box<dyn FormatExtractor>>,
}

impl ExtractorRegistry {
    pub fn new() -> Self {
        let mut extractors: HashMap<FileFormat, Box<dyn FormatExtractor>> = HashMap::new();
        extractors.insert(FileFormat::Pdf, Box::new(pdf::PdfExtractor::new()));
        extractors.insert(
            FileFormat::Xlsx,
            Box::new(spreadsheet::SpreadsheetExtractor::new()),
        );
        extractors.insert(
            FileFormat::Xls,
            Box::new(spreadsheet::LegacySpreadsheetExtractor),
        );
        extractors.insert(
            FileFormat::Shapefile,
            Box::new(shapefile::ShapefileExtractor::new()),
        );
        extractors.insert(FileFormat::Csv, Box::new(text::DelimitedExtractor::new()));
        extractors.insert(FileFormat::Text, Box::new(text::TextExtractor::new()));
        extractors.insert(FileFormat::Zip, Box::new(archive::ZipInfoExtractor));

        Self { extractors }
    }

    pub fn supports(&self, format: FileFormat) -> bool {
        self.extractors.contains_key(&format)
    }

    /// Runs the extractor registered for `format`. Never fails: extractor
    /// errors are folded into [`Extraction::error`].
    pub fn extract(&self, format: FileFormat, path: &Path) -> Extraction {
        let Some(extractor) = self.extractors.get(&format) else {
            return Extraction {
                fields: Fields::new(),
                error: Some(ExtractError::UnsupportedFormat(format.label().to_string()).to_string()),
            };
        };

        match extractor.extract(path) {
            Ok(fields) => Extraction {
                fields,
                error: None,
            },
            Err(e) => {
                log::debug!("Extraction failed for {}: {}", path.display(), e);
                Extraction {
                    fields: Fields::new(),
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Inserts `value` under `key` unless it is empty.
pub(crate) fn insert_text(fields: &mut Fields, key: &str, value: Option<String>) {
    if let Some(value) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
        fields.insert(key.to_string(), serde_json::Value::String(value));
    }
}
