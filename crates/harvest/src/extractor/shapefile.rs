use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::ExtractError;
use crate::extractor::{Fields, FormatExtractor};

const HEADER_LEN: u64 = 100;
const FILE_CODE: i32 = 9994;

static EPSG_AUTHORITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"AUTHORITY\s*\[\s*"EPSG"\s*,\s*"?(\d+)"?\s*\]"#).expect("valid EPSG pattern")
});

/// ESRI shapefiles. The `.shp` header provides the geometry type and
/// bounding box; sidecar `.shx`, `.prj` and `.dbf` files supply the feature
/// count, coordinate reference system and attribute columns.
pub struct ShapefileExtractor;

impl ShapefileExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ShapefileExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for ShapefileExtractor {
    fn extract(&self, path: &Path) -> Result<Fields, ExtractError> {
        let mut file = File::open(path).map_err(|e| ExtractError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let file_len = file
            .metadata()
            .map_err(|e| ExtractError::Read {
                path: path.to_path_buf(),
                source: e,
            })?
            .len();

        if file_len < HEADER_LEN {
            return Err(ExtractError::Shapefile(format!(
                "File too short for a shapefile header ({} bytes)",
                file_len
            )));
        }

        let mut header = [0u8; HEADER_LEN as usize];
        file.read_exact(&mut header)
            .map_err(|e| ExtractError::Shapefile(format!("Failed to read header: {}", e)))?;

        let file_code = i32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        if file_code != FILE_CODE {
            return Err(ExtractError::Shapefile(format!(
                "Unexpected file code {} (expected {})",
                file_code, FILE_CODE
            )));
        }

        let shape_type = i32::from_le_bytes([header[32], header[33], header[34], header[35]]);
        let bbox: Vec<f64> = (0..4)
            .map(|i| {
                let start = 36 + i * 8;
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&header[start..start + 8]);
                f64::from_le_bytes(bytes)
            })
            .collect();

        let mut fields = Fields::new();

        let geometry_types: Vec<Value> = geometry_name(shape_type)
            .map(|name| vec![Value::from(name)])
            .unwrap_or_default();
        fields.insert("geometry_types".to_string(), Value::Array(geometry_types));

        if bbox.iter().all(|v| v.is_finite()) {
            fields.insert(
                "bbox".to_string(),
                Value::Array(bbox.into_iter().map(Value::from).collect()),
            );
        }

        let feature_count = match index_feature_count(&path.with_extension("shx")) {
            Some(count) => count,
            None => count_records(&mut file, file_len)?,
        };
        fields.insert("feature_count".to_string(), Value::from(feature_count));

        if let Some(crs) = read_crs(&path.with_extension("prj")) {
            fields.insert("crs".to_string(), Value::String(crs));
        }

        if let Some(columns) = read_dbf_columns(&path.with_extension("dbf")) {
            fields.insert(
                "columns".to_string(),
                Value::Array(columns.into_iter().map(Value::String).collect()),
            );
        }

        Ok(fields)
    }
}

fn geometry_name(shape_type: i32) -> Option<&'static str> {
    match shape_type {
        1 | 11 | 21 => Some("Point"),
        3 | 13 | 23 => Some("LineString"),
        5 | 15 | 25 => Some("Polygon"),
        8 | 18 | 28 => Some("MultiPoint"),
        31 => Some("MultiPatch"),
        _ => None,
    }
}

/// Each `.shx` record is 8 bytes after the 100-byte header.
fn index_feature_count(shx: &Path) -> Option<u64> {
    let len = std::fs::metadata(shx).ok()?.len();
    (len >= HEADER_LEN).then(|| (len - HEADER_LEN) / 8)
}

/// Walks the record headers of the main file when no index is present.
fn count_records(file: &mut File, file_len: u64) -> Result<u64, ExtractError> {
    let mut offset = HEADER_LEN;
    let mut count = 0u64;
    let mut record_header = [0u8; 8];

    while offset + 8 <= file_len {
        file.seek(SeekFrom::Start(offset))
            .and_then(|_| file.read_exact(&mut record_header))
            .map_err(|e| ExtractError::Shapefile(format!("Failed to read record header: {}", e)))?;

        // Content length is in 16-bit words
        let words = i32::from_be_bytes([
            record_header[4],
            record_header[5],
            record_header[6],
            record_header[7],
        ]);
        if words < 0 {
            return Err(ExtractError::Shapefile(format!(
                "Negative record length at offset {}",
                offset
            )));
        }

        offset += 8 + words as u64 * 2;
        count += 1;
    }

    Ok(count)
}

fn read_crs(prj: &Path) -> Option<String> {
    let wkt = std::fs::read_to_string(prj).ok()?;
    let wkt = wkt.trim();
    if wkt.is_empty() {
        return None;
    }

    // The outermost authority is the last one in the WKT text
    if let Some(code) = EPSG_AUTHORITY
        .captures_iter(wkt)
        .last()
        .and_then(|c| c.get(1))
    {
        return Some(format!("EPSG:{}", code.as_str()));
    }

    Some(wkt.to_string())
}

/// Field names from the dBASE header: 32-byte descriptors starting at offset
/// 32, terminated by 0x0D.
fn read_dbf_columns(dbf: &Path) -> Option<Vec<String>> {
    let bytes = std::fs::read(dbf).ok()?;
    if bytes.len() < 32 {
        return None;
    }

    let mut columns = Vec::new();
    let mut offset = 32;
    while offset + 32 <= bytes.len() && bytes[offset] != 0x0D {
        let raw_name = &bytes[offset..offset + 11];
        let end = raw_name.iter().position(|&b| b == 0).unwrap_or(11);
        let name = String::from_utf8_lossy(&raw_name[..end]).trim().to_string();
        if !name.is_empty() {
            columns.push(name);
        }
        offset += 32;
    }

    Some(columns)
}
