use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info};

use crate::error::ScanError;
use crate::extractor::{ExtractorRegistry, FileFormat};
use crate::scan::item::ScanItem;
use crate::scan::scanner::describe_file;

/// A file unpacked from an archive, waiting for metadata extraction.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub path: PathBuf,
    pub relative_path: String,
    pub format: FileFormat,
}

/// Bounded pool for the local, read-only extraction work on archive
/// contents. Workers never touch catalog state; results are collected by the
/// thread that owns the pool.
pub struct ExtractionPool {
    job_sender: Sender<FileJob>,
    result_receiver: Receiver<Option<ScanItem>>,
    workers: Vec<JoinHandle<()>>,
}

impl ExtractionPool {
    /// # Panics
    /// Panics if `worker_count` is 0.
    pub fn new(registry: Arc<ExtractorRegistry>, worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be > 0");
        let (job_sender, job_receiver) = bounded::<FileJob>(worker_count * 2);
        // Unbounded so workers never block while the owner is still submitting
        let (result_sender, result_receiver) = unbounded::<Option<ScanItem>>();

        let mut workers = Vec::with_capacity(worker_count);
        for worker_id in 0..worker_count {
            let job_rx = job_receiver.clone();
            let result_tx = result_sender.clone();
            let worker_registry = Arc::clone(&registry);

            workers.push(thread::spawn(move || {
                run_worker(worker_id, job_rx, result_tx, worker_registry);
            }));
        }

        debug!("Started {} extraction workers", worker_count);

        Self {
            job_sender,
            result_receiver,
            workers,
        }
    }

    pub fn submit(&self, job: FileJob) -> Result<(), ScanError> {
        self.job_sender
            .send(job)
            .map_err(|_| ScanError::Worker("job channel closed".to_string()))
    }

    /// Closes the job queue, waits for the workers and returns every
    /// described item.
    pub fn finish(self) -> Result<Vec<ScanItem>, ScanError> {
        drop(self.job_sender);

        let mut panicked = 0usize;
        for (i, worker) in self.workers.into_iter().enumerate() {
            if let Err(e) = worker.join() {
                error!("Extraction worker {} panicked: {:?}", i, e);
                panicked += 1;
            }
        }

        if panicked > 0 {
            return Err(ScanError::Worker(format!(
                "{} extraction worker(s) panicked",
                panicked
            )));
        }

        Ok(self.result_receiver.try_iter().flatten().collect())
    }
}

/// Describes `jobs` on `worker_count` threads. The result is sorted by
/// relative path so the walk order does not depend on scheduling.
pub fn describe_all(
    registry: Arc<ExtractorRegistry>,
    worker_count: usize,
    jobs: Vec<FileJob>,
) -> Result<Vec<ScanItem>, ScanError> {
    let job_count = jobs.len();
    let pool = ExtractionPool::new(registry, worker_count.min(job_count.max(1)));

    for job in jobs {
        pool.submit(job)?;
    }

    let mut items = pool.finish()?;
    items.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    info!(
        "Described {}/{} archive entries on {} worker(s)",
        items.len(),
        job_count,
        worker_count
    );
    Ok(items)
}

fn run_worker(
    worker_id: usize,
    job_receiver: Receiver<FileJob>,
    result_sender: Sender<Option<ScanItem>>,
    registry: Arc<ExtractorRegistry>,
) {
    debug!("Extraction worker {} started", worker_id);

    for job in job_receiver.iter() {
        let item = describe_file(&registry, &job.path, job.relative_path, job.format);
        if result_sender.send(item).is_err() {
            error!("Extraction worker {} lost its result channel", worker_id);
            break;
        }
    }

    debug!("Extraction worker {} stopped", worker_id);
}
