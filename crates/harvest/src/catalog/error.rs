//! Catalog API error types.

use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by a catalog backend.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// Credentials missing, rejected or lacking permission. Never retried.
    #[error("Not authorized: {0}")]
    Authorization(String),

    /// The catalog rejected the request itself (bad payload, conflict).
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Timeout, connection failure or a server-side error.
    #[error("Transient failure: {0}")]
    Transient(String),

    /// The file to upload could not be read.
    #[error("Cannot upload '{path}': {message}")]
    Upload { path: PathBuf, message: String },

    /// The catalog answered with something we could not interpret.
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl CatalogError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, CatalogError::Transient(_))
    }

    /// Errors that must abort the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CatalogError::Authorization(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(CatalogError::Transient("timeout".into()).is_retryable());
        assert!(!CatalogError::Validation("bad".into()).is_retryable());
        assert!(!CatalogError::Authorization("403".into()).is_retryable());

        assert!(CatalogError::Authorization("401".into()).is_fatal());
        assert!(!CatalogError::Transient("503".into()).is_fatal());
        assert!(!CatalogError::NotFound("x".into()).is_fatal());
    }
}
