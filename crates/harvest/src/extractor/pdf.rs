use std::path::Path;

use chrono::{FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use lopdf::{Document, Object};
use serde_json::Value;

use crate::error::ExtractError;
use crate::extractor::{insert_text, Fields, FormatExtractor};

pub struct PdfExtractor;

impl PdfExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FormatExtractor for PdfExtractor {
    fn extract(&self, path: &Path) -> Result<Fields, ExtractError> {
        let _span = tracing::debug_span!("extractor.pdf").entered();

        let bytes = std::fs::read(path).map_err(|e| ExtractError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = Document::load_mem(&bytes)
            .map_err(|e| ExtractError::Pdf(format!("Failed to load PDF: {}", e)))?;

        let mut fields = Fields::new();

        if let Some(info) = info_dictionary(&doc) {
            insert_text(&mut fields, "title", info_string(info, b"Title"));
            insert_text(&mut fields, "author", info_string(info, b"Author"));
            insert_text(&mut fields, "subject", info_string(info, b"Subject"));
            insert_text(&mut fields, "producer", info_string(info, b"Producer"));
            insert_text(&mut fields, "keywords", info_string(info, b"Keywords"));
            insert_text(
                &mut fields,
                "created",
                info_string(info, b"CreationDate").map(|d| parse_pdf_date(&d)),
            );
            insert_text(
                &mut fields,
                "modified",
                info_string(info, b"ModDate").map(|d| parse_pdf_date(&d)),
            );
        }

        fields.insert(
            "page_count".to_string(),
            Value::from(doc.get_pages().len() as u64),
        );

        Ok(fields)
    }
}

fn info_dictionary(doc: &Document) -> Option<&lopdf::Dictionary> {
    let info = doc.trailer.get(b"Info").ok()?;
    match info {
        Object::Reference(id) => doc.get_object(*id).ok()?.as_dict().ok(),
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn info_string(info: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    match info.get(key).ok()? {
        Object::String(bytes, _) => Some(decode_text_string(bytes)),
        Object::Name(name) => Some(String::from_utf8_lossy(name).into_owned()),
        _ => None,
    }
}

/// PDF text strings are either UTF-16BE with a BOM or PDFDocEncoding, which
/// matches Latin-1 for printable characters.
fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.starts_with(&[0xFE, 0xFF]) {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    bytes.iter().map(|&b| b as char).collect()
}

/// Normalizes `D:YYYYMMDDHHmmSS...` to RFC 3339 UTC. Unparsable input is
/// returned unchanged.
fn parse_pdf_date(raw: &str) -> String {
    let Some(core) = raw.strip_prefix("D:") else {
        return raw.to_string();
    };

    let digits: String = core.chars().take_while(|c| c.is_ascii_digit()).collect();

    if digits.len() >= 14 {
        if let Ok(local) = NaiveDateTime::parse_from_str(&digits[..14], "%Y%m%d%H%M%S") {
            let offset = utc_offset(&core[digits.len()..]);
            if let Some(dt) = offset.from_local_datetime(&local).single() {
                return dt.with_timezone(&Utc).to_rfc3339();
            }
        }
    }

    if digits.len() >= 8 {
        if let Some(dt) = NaiveDate::parse_from_str(&digits[..8], "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
        {
            return Utc.from_utc_datetime(&dt).to_rfc3339();
        }
    }

    tracing::debug!("Could not parse PDF date '{}', keeping raw value", raw);
    raw.to_string()
}

/// `Z`, `+HH'mm'` or `-HH'mm'`; anything else is treated as UTC.
fn utc_offset(suffix: &str) -> FixedOffset {
    let utc = Utc.fix();
    let sign = match suffix.chars().next() {
        Some('+') => 1,
        Some('-') => -1,
        _ => return utc,
    };

    let digits: String = suffix[1..].chars().filter(char::is_ascii_digit).collect();
    let hours: i32 = digits.get(..2).and_then(|h| h.parse().ok()).unwrap_or(0);
    let minutes: i32 = digits.get(2..4).and_then(|m| m.parse().ok()).unwrap_or(0);
    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).unwrap_or(utc)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use lopdf::{dictionary, Stream};

    /// Writes a minimal PDF with `pages` empty pages and an Info dictionary.
    pub(crate) fn write_pdf(path: &Path, title: Option<&str>, pages: usize) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let mut kids = Vec::new();
        for _ in 0..pages {
            let content_id = doc.add_object(Stream::new(dictionary! {}, Vec::new()));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => pages as i64,
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut info = dictionary! {
            "Author" => Object::string_literal("Team Geo"),
            "CreationDate" => Object::string_literal("D:20240131120500+01'00'"),
            "ModDate" => Object::string_literal("D:20240201"),
        };
        if let Some(title) = title {
            info.set("Title", Object::string_literal(title));
        }
        let info_id = doc.add_object(info);
        doc.trailer.set("Info", info_id);

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        std::fs::write(path, buffer).unwrap();
    }

    #[test]
    fn test_extracts_info_and_page_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        write_pdf(&path, Some("Annual Report"), 3);

        let fields = PdfExtractor::new().extract(&path).unwrap();
        assert_eq!(fields["title"], "Annual Report");
        assert_eq!(fields["author"], "Team Geo");
        assert_eq!(fields["page_count"], 3);
        assert_eq!(fields["created"], "2024-01-31T11:05:00+00:00");
        assert_eq!(fields["modified"], "2024-02-01T00:00:00+00:00");
    }

    #[test]
    fn test_missing_title_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("untitled.pdf");
        write_pdf(&path, None, 1);

        let fields = PdfExtractor::new().extract(&path).unwrap();
        assert!(!fields.contains_key("title"));
    }

    #[test]
    fn test_garbage_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"%PDF-1.4 truncated").unwrap();

        assert!(matches!(
            PdfExtractor::new().extract(&path),
            Err(ExtractError::Pdf(_))
        ));
    }

    #[test]
    fn test_parse_pdf_date_variants() {
        assert_eq!(parse_pdf_date("D:19991231235959Z"), "1999-12-31T23:59:59+00:00");
        assert_eq!(
            parse_pdf_date("D:20230615080000-05'30'"),
            "2023-06-15T13:30:00+00:00"
        );
        assert_eq!(parse_pdf_date("D:2020"), "D:2020");
        assert_eq!(parse_pdf_date("yesterday"), "yesterday");
    }

    #[test]
    fn test_decode_utf16_text_string() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69];
        assert_eq!(decode_text_string(&bytes), "Hi");
    }
}
