//! Maps extracted fields onto catalog field names.

use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::extractor::Fields;
use crate::scan::ScanItem;
use crate::slug::slugify;

const TAGS_FIELD: &str = "tags";
const FORMAT_FIELD: &str = "format";
const BBOX_FIELD: &str = "spatial_bbox";
/// Where the polygon built from a bounding box is stored.
pub const SPATIAL_FIELD: &str = "spatial";

#[derive(Debug, Clone)]
pub struct Transformer {
    field_map: BTreeMap<String, String>,
}

impl Transformer {
    pub fn new(field_map: BTreeMap<String, String>) -> Self {
        Self { field_map }
    }

    /// Catalog-ready fields for `item`. Always has `title` and `name`; file
    /// items also carry `mimetype`.
    pub fn transform(&self, item: &ScanItem) -> Fields {
        let mut out = Fields::new();

        for (source, target) in &self.field_map {
            let Some(value) = item
                .fields
                .get(source)
                .cloned()
                .or_else(|| item.attribute(source))
            else {
                continue;
            };
            if value.is_null() {
                continue;
            }

            match convert(target, value) {
                Ok((key, converted)) => {
                    out.insert(key, converted);
                }
                Err(reason) => warn!(
                    path = %item.relative_path,
                    "Dropping {} -> {}: {}",
                    source,
                    target,
                    reason
                ),
            }
        }

        if !has_text(&out, "title") {
            out.insert("title".to_string(), Value::String(item.file_name()));
        }
        if !has_text(&out, "name") {
            let title = out
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            out.insert("name".to_string(), Value::String(slugify(&title)));
        }

        if !item.is_directory() {
            let mimetype = mime_guess::from_path(&item.path).first_or_octet_stream();
            out.insert(
                "mimetype".to_string(),
                Value::String(mimetype.essence_str().to_string()),
            );
        }

        debug!(path = %item.relative_path, fields = out.len(), "Transformed item");
        out
    }
}

fn has_text(fields: &Fields, key: &str) -> bool {
    fields
        .get(key)
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn convert(target: &str, value: Value) -> Result<(String, Value), String> {
    match target {
        TAGS_FIELD => Ok((target.to_string(), tags(value)?)),
        FORMAT_FIELD => match value {
            Value::String(s) => Ok((target.to_string(), Value::String(s.to_uppercase()))),
            other => Ok((target.to_string(), other)),
        },
        BBOX_FIELD => Ok((SPATIAL_FIELD.to_string(), bbox_polygon(&value)?)),
        _ => Ok((target.to_string(), value)),
    }
}

fn tags(value: Value) -> Result<Value, String> {
    let tokens: Vec<Value> = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(|t| Value::String(t.to_string()))
            .collect(),
        Value::Array(items) => items
            .into_iter()
            .filter(|v| v.as_str().is_some_and(|s| !s.trim().is_empty()))
            .collect(),
        other => return Err(format!("expected a string or list, got {}", other)),
    };
    Ok(Value::Array(tokens))
}

/// `[min_x, min_y, max_x, max_y]` → closed GeoJSON polygon, serialized.
fn bbox_polygon(value: &Value) -> Result<Value, String> {
    let coords: Vec<f64> = value
        .as_array()
        .ok_or_else(|| "bounding box is not a list".to_string())?
        .iter()
        .map(|v| v.as_f64().ok_or_else(|| format!("non-numeric coordinate {}", v)))
        .collect::<Result<_, _>>()?;

    let &[min_x, min_y, max_x, max_y] = coords.as_slice() else {
        return Err(format!("expected 4 coordinates, got {}", coords.len()));
    };

    let polygon = json!({
        "type": "Polygon",
        "coordinates": [[
            [min_x, min_y],
            [max_x, min_y],
            [max_x, max_y],
            [min_x, max_y],
            [min_x, min_y],
        ]],
    });
    Ok(Value::String(polygon.to_string()))
}
