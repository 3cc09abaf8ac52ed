//! Builders for archives and configs used across the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Write};

use zip::write::SimpleFileOptions;
use zip::ZipWriter;

/// Builds a ZIP archive in memory.
#[derive(Default)]
pub struct ZipBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl ZipBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file entry. Names are written as given, `../` included.
    pub fn file(mut self, name: &str, contents: impl AsRef<[u8]>) -> Self {
        self.entries
            .push((name.to_string(), contents.as_ref().to_vec()));
        self
    }

    /// Adds another archive as an entry.
    pub fn archive(self, name: &str, inner: ZipBuilder) -> Self {
        let bytes = inner.build();
        self.file(name, bytes)
    }

    pub fn build(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, bytes) in self.entries {
            writer
                .start_file(name, SimpleFileOptions::default())
                .expect("Failed to start zip entry");
            writer.write_all(&bytes).expect("Failed to write zip entry");
        }
        writer
            .finish()
            .expect("Failed to finish zip archive")
            .into_inner()
    }
}

/// Minimal JSON config accepted by `load_config`.
pub fn config_json(root: &str, temp: &str, default_org: Option<&str>) -> String {
    let default_org = default_org
        .map(|o| format!(r#", "default_organization": "{}""#, o))
        .unwrap_or_default();
    format!(
        r#"{{
    "version": "1",
    "root_directory": "{}",
    "temp_directory": "{}",
    "catalog": {{ "url": "https://ckan.example.org", "dry_run": true{} }}
}}"#,
        root, temp, default_org
    )
}
