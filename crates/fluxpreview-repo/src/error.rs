//! Error types for repository operations

use thiserror::Error;

/// Repository operation errors
#[derive(Debug, Error)]
pub enum RepoError {
    // ============ Configuration Errors ============
    #[error("Invalid repository URL: {url} - {reason}")]
    InvalidRepositoryUrl { url: String, reason: String },

    #[error("Invalid repository configuration: {message}")]
    InvalidConfig { message: String },

    #[error("Invalid TLS material for repository {name}: {message}")]
    InvalidTls { name: String, message: String },

    // ============ Network Errors ============
    #[error("HTTP error fetching {url}: {status}")]
    HttpError { url: String, status: u16 },

    #[error("Network error fetching {url}: {message}")]
    NetworkError { url: String, message: String },

    #[error("Request to {url} timed out after {seconds}s")]
    Timeout { url: String, seconds: u64 },

    #[error("Too many redirects fetching {url}")]
    TooManyRedirects { url: String },

    // ============ Index Errors ============
    #[error("Invalid index from {url}: {message}")]
    InvalidIndex { url: String, message: String },

    // ============ Chart Errors ============
    #[error("Chart {chart} not found in repository {repo}")]
    ChartNotFound { chart: String, repo: String },

    #[error("Invalid version constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },

    #[error("No version of {chart} satisfies {constraint}, available: {available}")]
    UnsatisfiableConstraint {
        chart: String,
        constraint: String,
        available: String,
    },

    #[error("Chart {chart}@{version} has no download URL")]
    NoDownloadUrl { chart: String, version: String },

    #[error("Integrity check failed for {chart}: expected {expected}, got {actual}")]
    IntegrityCheckFailed {
        chart: String,
        expected: String,
        actual: String,
    },

    #[error("Invalid chart archive {chart}: {source}")]
    InvalidChart {
        chart: String,
        source: fluxpreview_core::CoreError,
    },

    // ============ IO Errors ============
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, RepoError>;

/// Timeout applied to every repository request
pub const REQUEST_TIMEOUT_SECS: u64 = 30;

impl RepoError {
    pub(crate) fn from_reqwest(url: &str, e: reqwest::Error) -> Self {
        if e.is_timeout() {
            RepoError::Timeout {
                url: url.to_string(),
                seconds: REQUEST_TIMEOUT_SECS,
            }
        } else if let Some(status) = e.status() {
            RepoError::HttpError {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else {
            RepoError::NetworkError {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }
}

impl From<serde_yaml::Error> for RepoError {
    fn from(e: serde_yaml::Error) -> Self {
        RepoError::Serialization(e.to_string())
    }
}
