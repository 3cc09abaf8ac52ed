use std::path::Path;

use serde_json::Value;

use crate::error::ExtractError;
use crate::extractor::{insert_text, Fields, FormatExtractor};

/// Metadata of the ZIP file itself. Unpacking is the archive module's job.
pub struct ZipInfoExtractor;

impl FormatExtractor for ZipInfoExtractor {
    fn extract(&self, path: &Path) -> Result<Fields, ExtractError> {
        let file = std::fs::File::open(path).map_err(|e| ExtractError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let archive =
            zip::ZipArchive::new(file).map_err(|e| ExtractError::Archive(e.to_string()))?;

        let mut fields = Fields::new();
        fields.insert(
            "entry_count".to_string(),
            Value::from(archive.len() as u64),
        );
        let comment = archive.comment();
        if !comment.is_empty() {
            insert_text(
                &mut fields,
                "comment",
                Some(String::from_utf8_lossy(comment).into_owned()),
            );
        }

        Ok(fields)
    }
}
