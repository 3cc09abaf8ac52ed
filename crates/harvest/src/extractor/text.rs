use std::io::{BufRead, BufReader};
use std::path::Path;

use serde_json::Value;

use crate::error::ExtractError;
use crate::extractor::{Fields, FormatExtractor};

pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for TextExtractor {
    fn extract(&self, path: &Path) -> Result<Fields, ExtractError> {
        let bytes = std::fs::read(path).map_err(|e| ExtractError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let text = String::from_utf8_lossy(&bytes);

        let mut fields = Fields::new();
        fields.insert(
            "line_count".to_string(),
            Value::from(text.lines().count() as u64),
        );
        fields.insert(
            "char_count".to_string(),
            Value::from(text.chars().count() as u64),
        );
        Ok(fields)
    }
}

/// Comma- or semicolon-separated tables. The delimiter is picked from the
/// header line.
pub struct DelimitedExtractor;

impl DelimitedExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for DelimitedExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for DelimitedExtractor {
    fn extract(&self, path: &Path) -> Result<Fields, ExtractError> {
        let delimiter = sniff_delimiter(path)?;

        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .from_path(path)
            .map_err(|e| ExtractError::Delimited(e.to_string()))?;

        let columns: Vec<Value> = reader
            .headers()
            .map_err(|e| ExtractError::Delimited(format!("Failed to read header: {}", e)))?
            .iter()
            .map(|h| Value::String(h.trim().to_string()))
            .collect();

        let mut row_count = 0u64;
        for record in reader.byte_records() {
            record.map_err(|e| ExtractError::Delimited(format!("Row {}: {}", row_count + 1, e)))?;
            row_count += 1;
        }

        let mut fields = Fields::new();
        fields.insert("columns".to_string(), Value::Array(columns));
        fields.insert("row_count".to_string(), Value::from(row_count));
        fields.insert(
            "delimiter".to_string(),
            Value::String((delimiter as char).to_string()),
        );
        Ok(fields)
    }
}

fn sniff_delimiter(path: &Path) -> Result<u8, ExtractError> {
    let file = std::fs::File::open(path).map_err(|e| ExtractError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut first_line = Vec::new();
    BufReader::new(file)
        .read_until(b'\n', &mut first_line)
        .map_err(|e| ExtractError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

    let commas = first_line.iter().filter(|&&b| b == b',').count();
    let semicolons = first_line.iter().filter(|&&b| b == b';').count();
    Ok(if semicolons > commas { b';' } else { b',' })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_counts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "één\ntwee\ndrie").unwrap();

        let fields = TextExtractor::new().extract(&path).unwrap();
        assert_eq!(fields["line_count"], 3);
        assert_eq!(fields["char_count"], 13);
    }

    #[test]
    fn test_csv_columns_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        std::fs::write(&path, "id, name ,value\n1,a,10\n2,b,20\n").unwrap();

        let fields = DelimitedExtractor::new().extract(&path).unwrap();
        assert_eq!(fields["columns"], serde_json::json!(["id", "name", "value"]));
        assert_eq!(fields["row_count"], 2);
        assert_eq!(fields["delimiter"], ",");
    }

    #[test]
    fn test_semicolon_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        std::fs::write(&path, "gemeente;inwoners\nUtrecht;361924\n").unwrap();

        let fields = DelimitedExtractor::new().extract(&path).unwrap();
        assert_eq!(fields["columns"], serde_json::json!(["gemeente", "inwoners"]));
        assert_eq!(fields["row_count"], 1);
        assert_eq!(fields["delimiter"], ";");
    }

    #[test]
    fn test_missing_csv_is_error() {
        let result = DelimitedExtractor::new().extract(Path::new("/nonexistent/x.csv"));
        assert!(matches!(result, Err(ExtractError::Read { .. })));
    }
}
