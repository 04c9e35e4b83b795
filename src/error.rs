use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ScrapeError>;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// A page element or attribute is missing, or its text did not parse.
    #[error("failed to extract {field}: {reason}")]
    ExtractionFailed { field: &'static str, reason: String },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    /// Asset download error, timeout, or non-success status.
    #[error("download of {url} failed: {reason}")]
    NetworkFailed { url: String, reason: String },

    #[error("failed to persist {}: {source}", path.display())]
    PersistFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("catalog discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl ScrapeError {
    pub fn extraction(field: &'static str, reason: impl Into<String>) -> Self {
        Self::ExtractionFailed {
            field,
            reason: reason.into(),
        }
    }

    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::PersistFailed {
            path: path.into(),
            source,
        }
    }
}
