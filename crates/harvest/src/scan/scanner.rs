use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use walkdir::WalkDir;

use crate::archive::{ArchiveExtractor, VisitedArchives};
use crate::error::ScanError;
use crate::extractor::{ExtensionFilter, Extraction, ExtractorRegistry, Fields, FileFormat};
use crate::hash::hash_file;
use crate::scan::item::{ArchiveOrigin, ItemKind, ScanItem};
use crate::scan::pool::{describe_all, FileJob};
use crate::slug::slugify;

/// Totals for one walk.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub items: usize,
    pub archives_extracted: usize,
    pub archives_failed: usize,
    pub entries_skipped: usize,
}

/// Walks a directory tree, unpacking archives as they are met.
pub struct Scanner {
    registry: Arc<ExtractorRegistry>,
    archives: ArchiveExtractor,
    workers: usize,
    extensions: ExtensionFilter,
}

impl Scanner {
    pub fn new(registry: Arc<ExtractorRegistry>, max_archive_depth: usize, workers: usize) -> Self {
        Self {
            registry,
            archives: ArchiveExtractor::new(max_archive_depth),
            workers: workers.max(1),
            extensions: ExtensionFilter::default(),
        }
    }

    /// Only files passing `extensions` are described. Archives are unpacked
    /// either way.
    pub fn with_extensions(mut self, extensions: ExtensionFilter) -> Self {
        self.extensions = extensions;
        self
    }

    /// Walks `root` and hands every item to `visit` in top-down order.
    ///
    /// Archive contents are unpacked into a fresh directory below `run_dir`
    /// that is removed as soon as `visit` has seen the last of them, so the
    /// files an item points at are only guaranteed to exist during its
    /// callback.
    pub fn walk<E, F>(&self, root: &Path, run_dir: &Path, mut visit: F) -> Result<ScanSummary, E>
    where
        F: FnMut(ScanItem) -> Result<(), E>,
        E: From<ScanError>,
    {
        if !root.is_dir() {
            return Err(ScanError::InvalidRoot(root.to_path_buf()).into());
        }

        let skip_below = run_dir.canonicalize().ok();
        let mut processed: HashSet<PathBuf> = HashSet::new();
        let mut visited = VisitedArchives::new();
        let mut summary = ScanSummary::default();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Never descend into our own extraction area
                match (&skip_below, e.path().canonicalize()) {
                    (Some(skip), Ok(path)) => !path.starts_with(skip),
                    _ => true,
                }
            });

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let canonical = match path.canonicalize() {
                Ok(canonical) => canonical,
                Err(e) => {
                    warn!("Skipping vanished entry {}: {}", path.display(), e);
                    continue;
                }
            };
            if !processed.insert(canonical) {
                debug!("Already processed: {}", path.display());
                continue;
            }

            let relative_path = relative_to(root, path);

            if entry.file_type().is_dir() {
                if let Some(item) = describe_directory(path, relative_path) {
                    summary.items += 1;
                    visit(item)?;
                }
                continue;
            }

            let Some(format) = FileFormat::from_path(path) else {
                debug!("Ignoring unsupported file: {}", path.display());
                continue;
            };

            if self.extensions.allows(path) {
                if let Some(item) =
                    describe_file(&self.registry, path, relative_path.clone(), format)
                {
                    summary.items += 1;
                    visit(item)?;
                }
            } else {
                debug!("Extension not selected: {}", path.display());
            }

            if format.is_archive() {
                self.walk_archive(
                    path,
                    &relative_path,
                    run_dir,
                    &mut visited,
                    &mut processed,
                    &mut summary,
                    &mut visit,
                )?;
            }
        }

        info!(
            "Scanned {} items in {} ({} archive(s) extracted, {} failed)",
            summary.items,
            root.display(),
            summary.archives_extracted,
            summary.archives_failed
        );

        Ok(summary)
    }

    /// Collects every item of a walk. Files unpacked from archives are
    /// already removed when this returns; use [`Scanner::walk`] when their
    /// contents are still needed.
    pub fn scan(&self, root: &Path, run_dir: &Path) -> Result<Vec<ScanItem>, ScanError> {
        let mut items = Vec::new();
        self.walk(root, run_dir, |item| {
            items.push(item);
            Ok::<(), ScanError>(())
        })?;
        Ok(items)
    }

    #[allow(clippy::too_many_arguments)]
    fn walk_archive<E, F>(
        &self,
        archive: &Path,
        archive_relative: &str,
        run_dir: &Path,
        visited: &mut VisitedArchives,
        processed: &mut HashSet<PathBuf>,
        summary: &mut ScanSummary,
        visit: &mut F,
    ) -> Result<(), E>
    where
        F: FnMut(ScanItem) -> Result<(), E>,
        E: From<ScanError>,
    {
        let scratch = tempfile::Builder::new()
            .prefix("archive-")
            .tempdir_in(run_dir)
            .map_err(|e| ScanError::TempDirectory {
                path: run_dir.to_path_buf(),
                source: e,
            })?;

        let report = match self.archives.extract(archive, scratch.path(), visited) {
            Ok(report) => report,
            Err(e) => {
                warn!("Skipping archive contents: {}", e);
                summary.archives_failed += 1;
                return Ok(());
            }
        };
        if report.already_visited {
            return Ok(());
        }
        summary.archives_extracted += report.archives_extracted;
        summary.archives_failed += report.nested_failures.len();
        summary.entries_skipped += report.skipped_entries.len();

        let stem = archive
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let origin = ArchiveOrigin {
            archive_path: archive_relative.to_string(),
            organization: slugify(&stem),
        };

        let mut jobs = Vec::new();
        for entry in WalkDir::new(scratch.path())
            .min_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
        {
            let path = entry.into_path();
            let Some(format) = FileFormat::from_path(&path) else {
                continue;
            };
            if !self.extensions.allows(&path) {
                continue;
            }
            if let Ok(canonical) = path.canonicalize() {
                if !processed.insert(canonical) {
                    continue;
                }
            }
            jobs.push(FileJob {
                relative_path: format!(
                    "{}/{}",
                    archive_relative,
                    relative_to(scratch.path(), &path)
                ),
                path,
                format,
            });
        }

        let items = if self.workers > 1 && jobs.len() > 1 {
            describe_all(Arc::clone(&self.registry), self.workers, jobs)?
        } else {
            jobs.into_iter()
                .filter_map(|job| {
                    describe_file(&self.registry, &job.path, job.relative_path, job.format)
                })
                .collect()
        };

        for mut item in items {
            item.origin = Some(origin.clone());
            summary.items += 1;
            visit(item)?;
        }

        debug!(
            "Finished archive {}, removing {}",
            archive_relative,
            scratch.path().display()
        );
        if let Err(e) = scratch.close() {
            warn!("Failed to remove extraction directory: {}", e);
        }
        Ok(())
    }
}

/// `/`-separated path of `path` below `base`.
fn relative_to(base: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn modified_time(metadata: &fs::Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}

fn describe_directory(path: &Path, relative_path: String) -> Option<ScanItem> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Cannot read directory {}: {}", path.display(), e);
            return None;
        }
    };

    Some(ScanItem {
        path: path.to_path_buf(),
        kind: ItemKind::Directory,
        size: 0,
        modified: modified_time(&metadata),
        relative_path,
        fields: Fields::new(),
        extraction_error: None,
        content_hash: None,
        origin: None,
    })
}

/// Builds the item for one file. `None` when the file vanished or cannot be
/// read; a failing extractor only sets `extraction_error`.
pub(crate) fn describe_file(
    registry: &ExtractorRegistry,
    path: &Path,
    relative_path: String,
    format: FileFormat,
) -> Option<ScanItem> {
    let metadata = match fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(e) => {
            warn!("Cannot read {}: {}", path.display(), e);
            return None;
        }
    };

    let content_hash = match hash_file(path) {
        Ok(hash) => hash,
        Err(e) => {
            warn!("Cannot hash {}: {}", path.display(), e);
            return None;
        }
    };

    let Extraction { fields, error } = registry.extract(format, path);
    let kind = if format.is_archive() {
        ItemKind::Archive
    } else {
        ItemKind::File(format)
    };

    Some(ScanItem {
        path: path.to_path_buf(),
        kind,
        size: metadata.len(),
        modified: modified_time(&metadata),
        relative_path,
        fields,
        extraction_error: error,
        content_hash: Some(content_hash),
        origin: None,
    })
}
