//! Safe, recursive ZIP extraction.
//!
//! Every entry is resolved against the destination before anything is
//! written; entries that would escape it are skipped. Archives found inside
//! the extracted tree are unpacked in place (the nested `.zip` file is
//! replaced by a directory of the same name) using an explicit worklist, so
//! deeply nested chains never grow the call stack.

pub mod entry_path;

use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::ArchiveError;
use crate::extractor::FileFormat;

pub use entry_path::contained_path;

/// Archives already handled in this walk, by canonical path. Distinct files
/// with identical bytes are separate archives and are each unpacked.
#[derive(Debug, Default)]
pub struct VisitedArchives {
    paths: HashSet<PathBuf>,
}

impl VisitedArchives {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `archive`; returns `false` when it was seen before.
    pub fn first_visit(&mut self, archive: &Path) -> io::Result<bool> {
        Ok(self.paths.insert(archive.canonicalize()?))
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[derive(Debug, Default, Clone)]
pub struct ExtractReport {
    /// The archive was already in the visited set; nothing was written.
    pub already_visited: bool,
    /// Number of archives unpacked, the outer one included.
    pub archives_extracted: usize,
    pub files_written: usize,
    /// Entry names that were not written (unsafe or unreadable).
    pub skipped_entries: Vec<String>,
    /// Nested archives that could not be unpacked.
    pub nested_failures: Vec<PathBuf>,
}

#[derive(Debug, Default)]
struct UnpackStats {
    files_written: usize,
    skipped_entries: Vec<String>,
}

pub struct ArchiveExtractor {
    max_depth: usize,
}

impl ArchiveExtractor {
    pub fn new(max_depth: usize) -> Self {
        Self {
            max_depth: max_depth.max(1),
        }
    }

    /// Unpacks `archive` into `destination`, then every archive nested in it.
    ///
    /// `Err` means the outer archive could not be read at all; nested
    /// failures are reported in [`ExtractReport::nested_failures`] and leave
    /// the rest of the tree intact.
    pub fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        visited: &mut VisitedArchives,
    ) -> Result<ExtractReport, ArchiveError> {
        let mut report = ExtractReport::default();

        match visited.first_visit(archive) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Archive already extracted, skipping: {}", archive.display());
                report.already_visited = true;
                return Ok(report);
            }
            Err(e) => {
                return Err(ArchiveError::Open {
                    path: archive.to_path_buf(),
                    source: e,
                })
            }
        }

        fs::create_dir_all(destination).map_err(|e| ArchiveError::CreateDirectory {
            path: destination.to_path_buf(),
            source: e,
        })?;

        let stats = unpack(archive, destination)?;
        report.archives_extracted += 1;
        report.files_written += stats.files_written;
        report.skipped_entries.extend(stats.skipped_entries);

        // Directories still to be searched for nested archives, with depth
        let mut pending: Vec<(PathBuf, usize)> = vec![(destination.to_path_buf(), 1)];

        while let Some((dir, depth)) = pending.pop() {
            for nested in find_archives(&dir) {
                if let Some(extracted_dir) =
                    self.extract_nested(&nested, depth, visited, &mut report)
                {
                    pending.push((extracted_dir, depth + 1));
                }
            }
        }

        info!(
            "Extracted {} ({} archive(s), {} file(s), {} skipped)",
            archive.display(),
            report.archives_extracted,
            report.files_written,
            report.skipped_entries.len()
        );

        Ok(report)
    }

    /// Replaces a nested archive file with a directory holding its contents.
    /// Returns that directory when something was unpacked.
    fn extract_nested(
        &self,
        nested: &Path,
        depth: usize,
        visited: &mut VisitedArchives,
        report: &mut ExtractReport,
    ) -> Option<PathBuf> {
        if depth >= self.max_depth {
            warn!(
                "Nested archive exceeds depth limit {}: {}",
                self.max_depth,
                nested.display()
            );
            remove_archive_file(nested);
            report.nested_failures.push(nested.to_path_buf());
            return None;
        }

        match visited.first_visit(nested) {
            Ok(true) => {}
            Ok(false) => {
                debug!("Nested archive already handled: {}", nested.display());
                remove_archive_file(nested);
                return None;
            }
            Err(e) => {
                warn!("Cannot inspect nested archive {}: {}", nested.display(), e);
                remove_archive_file(nested);
                report.nested_failures.push(nested.to_path_buf());
                return None;
            }
        }

        let staging = staging_dir(nested);
        let result = fs::create_dir_all(&staging)
            .map_err(|e| ArchiveError::CreateDirectory {
                path: staging.clone(),
                source: e,
            })
            .and_then(|_| unpack(nested, &staging));

        // The archive itself is never a publishable resource
        remove_archive_file(nested);

        match result {
            Ok(stats) => {
                if let Err(e) = fs::rename(&staging, nested) {
                    warn!(
                        "Failed to move nested contents into place for {}: {}",
                        nested.display(),
                        e
                    );
                    let _ = fs::remove_dir_all(&staging);
                    report.nested_failures.push(nested.to_path_buf());
                    return None;
                }
                report.archives_extracted += 1;
                report.files_written += stats.files_written;
                report.skipped_entries.extend(stats.skipped_entries);
                Some(nested.to_path_buf())
            }
            Err(e) => {
                warn!("Skipping nested archive: {}", e);
                let _ = fs::remove_dir_all(&staging);
                report.nested_failures.push(nested.to_path_buf());
                None
            }
        }
    }
}

/// Writes every safe entry of `archive` below `destination`.
fn unpack(archive: &Path, destination: &Path) -> Result<UnpackStats, ArchiveError> {
    let file = File::open(archive).map_err(|e| ArchiveError::Open {
        path: archive.to_path_buf(),
        source: e,
    })?;

    let mut zip = zip::ZipArchive::new(file).map_err(|e| ArchiveError::Corrupt {
        path: archive.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut stats = UnpackStats::default();

    for index in 0..zip.len() {
        let mut entry = match zip.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(
                    "Unreadable entry #{} in {}: {}",
                    index,
                    archive.display(),
                    e
                );
                stats.skipped_entries.push(format!("#{}", index));
                continue;
            }
        };

        let name = entry.name().to_string();
        let Some(target) = contained_path(destination, &name) else {
            warn!(
                "Skipping unsafe entry '{}' in {}",
                name,
                archive.display()
            );
            stats.skipped_entries.push(name);
            continue;
        };

        if entry.is_dir() {
            if let Err(e) = fs::create_dir_all(&target) {
                warn!("Failed to create directory for entry '{}': {}", name, e);
                stats.skipped_entries.push(name);
            }
            continue;
        }

        let written = target
            .parent()
            .map(fs::create_dir_all)
            .unwrap_or(Ok(()))
            .and_then(|_| File::create(&target))
            .and_then(|mut out| io::copy(&mut entry, &mut out));

        match written {
            Ok(_) => stats.files_written += 1,
            Err(e) => {
                warn!(
                    "Failed to extract entry '{}' from {}: {}",
                    name,
                    archive.display(),
                    e
                );
                let _ = fs::remove_file(&target);
                stats.skipped_entries.push(name);
            }
        }
    }

    Ok(stats)
}

fn find_archives(dir: &Path) -> Vec<PathBuf> {
    let mut archives: Vec<PathBuf> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| FileFormat::from_path(p).is_some_and(|f| f.is_archive()))
        .collect();
    archives.sort();
    archives
}

fn staging_dir(nested: &Path) -> PathBuf {
    let name = nested
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "archive".to_string());
    nested.with_file_name(format!(".{}.partial", name))
}

fn remove_archive_file(path: &Path) {
    if let Err(e) = fs::remove_file(path) {
        warn!("Failed to remove nested archive {}: {}", path.display(), e);
    }
}
