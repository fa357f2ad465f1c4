use dealerscan_core::{ConfigError, DealerScanError, ZipCode};
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single resolver call.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    HttpStatus { status: u16, url: String },

    #[error("failed to parse response: {0}")]
    Parse(String),
}

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("a scan is already running")]
    AlreadyRunning,

    #[error("failed to resolve dealers for {zip}: {source}")]
    Resolve {
        zip: ZipCode,
        #[source]
        source: ResolveError,
    },

    #[error("failed to write {lost} records to {} ({written} written): {source}", .path.display())]
    Write {
        path: PathBuf,
        written: usize,
        lost: usize,
        #[source]
        source: csv::Error,
    },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("resolver setup failed: {0}")]
    ResolverSetup(#[source] ResolveError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Core(#[from] DealerScanError),
}

impl ScanError {
    /// Map a core validation failure onto the caller-facing `InvalidInput`.
    pub(crate) fn invalid_input(err: DealerScanError) -> Self {
        match err {
            DealerScanError::Validation(msg) => Self::InvalidInput(msg),
            other => Self::Core(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
