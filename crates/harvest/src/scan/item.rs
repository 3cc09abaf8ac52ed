use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::extractor::{Fields, FileFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Directory,
    Archive,
    File(FileFormat),
}

impl ItemKind {
    pub fn name(&self) -> &'static str {
        match self {
            ItemKind::Directory => "directory",
            ItemKind::Archive => "archive",
            ItemKind::File(_) => "file",
        }
    }

    pub fn format(&self) -> Option<FileFormat> {
        match self {
            ItemKind::Directory => None,
            ItemKind::Archive => Some(FileFormat::Zip),
            ItemKind::File(format) => Some(*format),
        }
    }
}

/// Where an item unpacked from an archive came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveOrigin {
    /// Relative path of the outermost archive below the scan root.
    pub archive_path: String,
    /// Organization slug derived from the archive's base name.
    pub organization: String,
}

/// Metadata record for one filesystem entry found during a walk.
#[derive(Debug, Clone, Serialize)]
pub struct ScanItem {
    pub path: PathBuf,
    pub kind: ItemKind,
    pub size: u64,
    pub modified: DateTime<Utc>,
    /// Relative to the scan root, `/`-separated. Archive contents are
    /// prefixed with the archive's own relative path.
    pub relative_path: String,
    pub fields: Fields,
    pub extraction_error: Option<String>,
    /// SHA-256 of the file contents. `None` for directories.
    pub content_hash: Option<String>,
    pub origin: Option<ArchiveOrigin>,
}

impl ScanItem {
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.relative_path.clone())
    }

    pub fn is_directory(&self) -> bool {
        self.kind == ItemKind::Directory
    }

    /// Resource format label, or `directory`.
    pub fn format_label(&self) -> &'static str {
        self.kind.format().map(|f| f.label()).unwrap_or("directory")
    }

    /// Top-level attributes shared by every item, looked up by name.
    pub fn attribute(&self, name: &str) -> Option<Value> {
        let value = match name {
            "path" => Value::String(self.path.to_string_lossy().into_owned()),
            "file_name" => Value::String(self.file_name()),
            "relative_path" => Value::String(self.relative_path.clone()),
            "kind" => Value::String(self.kind.name().to_string()),
            "format" => Value::String(self.format_label().to_string()),
            "size" => Value::from(self.size),
            "last_modified" => Value::String(self.modified.to_rfc3339()),
            "content_hash" => Value::String(self.content_hash.clone()?),
            "source_archive" => Value::String(self.origin.as_ref()?.archive_path.clone()),
            "organization_candidate" => {
                Value::String(self.origin.as_ref()?.organization.clone())
            }
            _ => return None,
        };
        Some(value)
    }

    /// Parent segment of the relative path, `None` for items at the root.
    pub fn parent_segment(&self) -> Option<&str> {
        let (parent, _) = self.relative_path.rsplit_once('/')?;
        parent.rsplit('/').next().filter(|s| !s.is_empty())
    }

    pub fn stem(&self) -> String {
        Path::new(&self.file_name())
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.file_name())
    }
}
