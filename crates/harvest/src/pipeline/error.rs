use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::error::ScanError;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Scan failed: {0}")]
    Scan(#[from] ScanError),

    #[error("Catalog unreachable: {0}")]
    Connection(CatalogError),

    #[error("Run aborted: {0}")]
    Aborted(CatalogError),

    #[error("Cannot use temporary directory '{path}': {source}")]
    TempDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
