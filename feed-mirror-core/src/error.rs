//! Error types for the mirror pipeline.
//!
//! Only [`SyncError`] (and the [`ConfigError`] it wraps) ever aborts a run.
//! [`FetchFailure`] is recorded per entry and [`ShortenError`] is replaced by a
//! sentinel link, so neither reaches the caller as an `Err`.

use std::path::PathBuf;
use thiserror::Error;

/// Fatal configuration problems, detected before any network activity.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("no sources configured")]
    NoSources,

    #[error("source #{index} has an empty `{field}`")]
    EmptyField { index: usize, field: &'static str },

    #[error("duplicate source description: {0:?}")]
    DuplicateDesc(String),

    #[error("duplicate source url: {0}")]
    DuplicateUrl(String),

    #[error("max_workers must be at least 1")]
    InvalidWorkers,

    #[error("max_file_size_mb {0} is too large to express in bytes")]
    InvalidSizeLimit(u64),

    #[error("link template `{name}` must contain exactly one {{filename}} placeholder: {template}")]
    InvalidTemplate { name: &'static str, template: String },

    #[error("GITHUB_REPOSITORY environment variable not set")]
    MissingRepository,

    #[error("GITHUB_REPOSITORY must look like `owner/repo`, got {0:?}")]
    MalformedRepository(String),
}

/// Why a single source could not be mirrored. The `Display` output is the
/// reason shown in the report.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FetchFailure {
    #[error("download failed: {0}")]
    Transfer(String),

    #[error("file too large ({size_mb} MB > {limit_mb} MB), skipped")]
    SizeExceeded { size_mb: f64, limit_mb: u64 },

    #[error("unexpected error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for FetchFailure {
    fn from(e: reqwest::Error) -> Self {
        FetchFailure::Transfer(e.to_string())
    }
}

impl From<std::io::Error> for FetchFailure {
    fn from(e: std::io::Error) -> Self {
        FetchFailure::Io(e.to_string())
    }
}

/// Failure of a single call to the shortening service.
#[derive(Debug, Error)]
pub enum ShortenError {
    #[error("shortener request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("shortener returned status {0}")]
    Status(u16),

    #[error("shortener returned a malformed response: {0:?}")]
    MalformedResponse(String),

    #[error("shortening disabled")]
    Disabled,
}

/// Errors that abort a whole synchronisation run.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to prepare content store {path:?}: {source}")]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
