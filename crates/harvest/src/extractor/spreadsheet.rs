use std::io::{Read, Seek};
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::Value;

use crate::error::ExtractError;
use crate::extractor::{insert_text, Fields, FormatExtractor};

/// Office Open XML workbooks (`.xlsx`). Sheet names come from the workbook
/// part; document properties from `docProps/core.xml` when present.
pub struct SpreadsheetExtractor;

impl SpreadsheetExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SpreadsheetExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for SpreadsheetExtractor {
    fn extract(&self, path: &Path) -> Result<Fields, ExtractError> {
        let file = std::fs::File::open(path).map_err(|e| ExtractError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| ExtractError::Spreadsheet(format!("Invalid XLSX format: {}", e)))?;

        let workbook_xml = read_part(&mut archive, "xl/workbook.xml")?.ok_or_else(|| {
            ExtractError::Spreadsheet("Invalid XLSX format: missing xl/workbook.xml".to_string())
        })?;
        let sheets = parse_sheet_names(&workbook_xml)?;

        let mut fields = Fields::new();
        fields.insert(
            "sheet_count".to_string(),
            Value::from(sheets.len() as u64),
        );
        fields.insert(
            "sheets".to_string(),
            Value::Array(sheets.into_iter().map(Value::String).collect()),
        );

        if let Some(core_xml) = read_part(&mut archive, "docProps/core.xml")? {
            let props = parse_core_properties(&core_xml)?;
            insert_text(&mut fields, "title", props.title);
            insert_text(&mut fields, "author", props.creator);
            insert_text(&mut fields, "subject", props.subject);
            insert_text(&mut fields, "keywords", props.keywords);
            insert_text(&mut fields, "category", props.category);
            insert_text(&mut fields, "last_modified_by", props.last_modified_by);
            insert_text(&mut fields, "created", props.created);
            insert_text(&mut fields, "modified", props.modified);
        }

        Ok(fields)
    }
}

/// Legacy BIFF workbooks are recognized so they surface as an extraction
/// issue instead of being skipped silently.
pub struct LegacySpreadsheetExtractor;

impl FormatExtractor for LegacySpreadsheetExtractor {
    fn extract(&self, _path: &Path) -> Result<Fields, ExtractError> {
        Err(ExtractError::Spreadsheet(
            "Legacy binary workbook (.xls) is not supported".to_string(),
        ))
    }
}

fn read_part<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    name: &str,
) -> Result<Option<String>, ExtractError> {
    let mut part = match archive.by_name(name) {
        Ok(part) => part,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => {
            return Err(ExtractError::Spreadsheet(format!(
                "Failed to open {}: {}",
                name, e
            )))
        }
    };

    let mut content = String::new();
    part.read_to_string(&mut content)
        .map_err(|e| ExtractError::Spreadsheet(format!("Failed to read {}: {}", name, e)))?;
    Ok(Some(content))
}

fn parse_sheet_names(xml: &str) -> Result<Vec<String>, ExtractError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut sheets = Vec::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                if e.local_name().as_ref() == b"sheet" =>
            {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"name" {
                        sheets.push(unescape_lossy(&attr.value));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Spreadsheet(format!(
                    "Workbook XML parsing error: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(sheets)
}

#[derive(Debug, Default)]
struct CoreProperties {
    title: Option<String>,
    creator: Option<String>,
    subject: Option<String>,
    keywords: Option<String>,
    category: Option<String>,
    last_modified_by: Option<String>,
    created: Option<String>,
    modified: Option<String>,
}

impl CoreProperties {
    fn slot(&mut self, local_name: &[u8]) -> Option<&mut Option<String>> {
        match local_name {
            b"title" => Some(&mut self.title),
            b"creator" => Some(&mut self.creator),
            b"subject" => Some(&mut self.subject),
            b"keywords" => Some(&mut self.keywords),
            b"category" => Some(&mut self.category),
            b"lastModifiedBy" => Some(&mut self.last_modified_by),
            b"created" => Some(&mut self.created),
            b"modified" => Some(&mut self.modified),
            _ => None,
        }
    }
}

fn parse_core_properties(xml: &str) -> Result<CoreProperties, ExtractError> {
    // No trimming: text around entity references must keep its spaces
    let mut reader = Reader::from_str(xml);

    let mut props = CoreProperties::default();
    let mut current: Option<Vec<u8>> = None;
    let mut buffer = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                current = Some(e.local_name().as_ref().to_vec());
                buffer.clear();
            }
            Ok(Event::Text(ref e)) => {
                if current.is_some() {
                    buffer.push_str(&unescape_lossy(e));
                }
            }
            Ok(Event::GeneralRef(ref e)) => {
                if current.is_some() {
                    buffer.push_str(resolve_entity(e));
                }
            }
            Ok(Event::End(_)) => {
                if let Some(name) = current.take() {
                    if let Some(slot) = props.slot(&name) {
                        *slot = Some(buffer.clone());
                    }
                }
                buffer.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ExtractError::Spreadsheet(format!(
                    "Core properties XML parsing error: {}",
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(props)
}

fn unescape_lossy(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match quick_xml::escape::unescape(&text) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => text.into_owned(),
    }
}

fn resolve_entity(name: &[u8]) -> &'static str {
    match name {
        b"amp" => "&",
        b"lt" => "<",
        b"gt" => ">",
        b"quot" => "\"",
        b"apos" => "'",
        _ => "",
    }
}
