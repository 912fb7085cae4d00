use thiserror::Error;

use super::WorkerPhase;

#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Offline mode - network skipped")]
    Offline,

    #[error("Network unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the on-disk cache storage.
///
/// Write failures on the fetch path are logged and swallowed; they never
/// reach the caller of an intercepted request.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt cache entry: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("Invalid cache name: {0}")]
    InvalidName(String),
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Cache storage error: {0}")]
    Cache(#[from] CacheError),

    #[error("Invalid asset path {path}: {source}")]
    InvalidPath {
        path: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Cannot {action} while {phase}")]
    InvalidPhase {
        action: &'static str,
        phase: WorkerPhase,
    },
}
