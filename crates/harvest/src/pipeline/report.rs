use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::catalog::SyncStats;
use crate::scan::{ItemKind, ScanItem, ScanSummary};

/// What one pipeline run saw and did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub directories: usize,
    pub files: usize,
    pub archives: usize,
    pub extraction_errors: usize,
    pub validation_issues: usize,
    pub archives_extracted: usize,
    pub archives_failed: usize,
    pub unsafe_entries_skipped: usize,
    /// Items with neither an archive-derived nor a default organization.
    pub items_without_organization: usize,
    /// Items skipped because their organization, dataset or resource failed.
    pub items_unresolved: usize,
    /// Files published under their relative path because their own name was
    /// taken in the dataset.
    pub resources_renamed: usize,
    pub sync: SyncStats,
}

impl RunReport {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            directories: 0,
            files: 0,
            archives: 0,
            extraction_errors: 0,
            validation_issues: 0,
            archives_extracted: 0,
            archives_failed: 0,
            unsafe_entries_skipped: 0,
            items_without_organization: 0,
            items_unresolved: 0,
            resources_renamed: 0,
            sync: SyncStats::default(),
        }
    }

    pub fn items_scanned(&self) -> usize {
        self.directories + self.files + self.archives
    }

    pub(crate) fn record_item(&mut self, item: &ScanItem) {
        match item.kind {
            ItemKind::Directory => self.directories += 1,
            ItemKind::Archive => self.archives += 1,
            ItemKind::File(_) => self.files += 1,
        }
        if item.extraction_error.is_some() {
            self.extraction_errors += 1;
        }
    }

    pub(crate) fn finish(&mut self, scan: &ScanSummary, sync: SyncStats) {
        self.archives_extracted = scan.archives_extracted;
        self.archives_failed = scan.archives_failed;
        self.unsafe_entries_skipped = scan.entries_skipped;
        self.sync = sync;
        self.finished_at = Some(Utc::now());
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = &self.sync;
        writeln!(
            f,
            "Scanned {} item(s): {} director(ies), {} file(s), {} archive(s)",
            self.items_scanned(),
            self.directories,
            self.files,
            self.archives
        )?;
        writeln!(
            f,
            "Archives: {} extracted, {} failed, {} unsafe entr(ies) skipped",
            self.archives_extracted, self.archives_failed, self.unsafe_entries_skipped
        )?;
        writeln!(
            f,
            "Issues: {} extraction error(s), {} validation issue(s)",
            self.extraction_errors, self.validation_issues
        )?;
        writeln!(
            f,
            "Organizations: {} created",
            s.organizations_created
        )?;
        writeln!(
            f,
            "Datasets: {} created, {} updated, {} unchanged, {} conflict(s)",
            s.datasets_created, s.datasets_updated, s.datasets_unchanged, s.dataset_conflicts
        )?;
        writeln!(
            f,
            "Resources: {} created, {} updated, {} unchanged, {} skipped, {} renamed",
            s.resources_created,
            s.resources_updated,
            s.resources_unchanged,
            s.resources_skipped,
            self.resources_renamed
        )?;
        write!(
            f,
            "Unpublished: {} without organization, {} unresolved, {} catalog failure(s)",
            self.items_without_organization, self.items_unresolved, s.failures
        )
    }
}
