use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Curl error: {0}")]
    Curl(#[from] curl::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Verification request timed out: {0}")]
    Timeout(String),

    #[error("Detector error: {0}")]
    Detector(String),

    #[error("PEM error: {0}")]
    Pem(#[from] PemError),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Typed failures from PEM normalization. A malformed candidate is skipped,
/// never surfaced as a finding and never aborts the batch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PemError {
    #[error("no header line found")]
    NoHeader,

    #[error("no content line(s) found")]
    NoContent,

    #[error("no footer line found")]
    NoFooter,

    #[error("key malformed by base64 decoder")]
    Base64Mangled,
}

pub type Result<T> = std::result::Result<T, ScanError>;
