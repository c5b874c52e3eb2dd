//! # contract: seams and shared data of the mirror pipeline
//!
//! This module defines the two traits the pipeline talks to the outside world
//! through, and the plain data types handed from one stage to the next.
//!
//! ## Interface & Extensibility
//! - Implement [`Fetcher`] to change how a single source is retrieved into the
//!   content store (HTTP, local fixtures, a fake in tests).
//! - Implement [`Shortener`] for another URL shortening service.
//! - Both traits are async and `Send + Sync`; the orchestrator shares them
//!   across concurrently running tasks by reference.
//!
//! ## Mocking & Testing
//! - Both traits are annotated for `mockall`, so consumers can generate
//!   deterministic mocks (`MockFetcher`, `MockShortener`) in tests.
//!
//! ## Stage types
//! - [`FetchOutcome`]: result of one transfer, staging file not yet named.
//! - [`ResolvedArtifact`]: a staged file after it received its final name.
//! - [`LinkedResult`]: a resolved artifact plus its public links.
//! - [`EntryReport`] / [`SynchroniseReport`]: what the report renderer consumes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[cfg(any(test, feature = "test-export-mocks"))]
use mockall::automock;

use crate::config::SourceEntry;
use crate::error::{FetchFailure, ShortenError};

/// A transfer that completed and passed the size check. The file still sits
/// under its staging name.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedFile {
    pub staging_path: PathBuf,
    pub size_bytes: u64,
    /// Extension chosen by sniffing, with leading dot (e.g. `.xml.gz`).
    pub extension: String,
}

/// Outcome of fetching one source entry.
pub type FetchOutcome = Result<StagedFile, FetchFailure>;

/// A staged file after the naming pass moved it to its final name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedArtifact {
    pub filename: String,
    pub path: PathBuf,
    pub size_mb: f64,
}

/// Public links for one artifact. Short links hold
/// [`crate::links::SHORTENING_UNAVAILABLE`] when shortening failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkedResult {
    pub artifact: ResolvedArtifact,
    pub direct_url: String,
    pub cdn_url: String,
    pub short_direct_url: String,
    pub short_cdn_url: String,
}

/// Final state of a single source entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum EntryStatus {
    Mirrored(LinkedResult),
    Failed { reason: String },
}

/// One line of the report: the configured entry and what became of it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryReport {
    pub source: SourceEntry,
    pub status: EntryStatus,
}

impl EntryReport {
    pub fn is_mirrored(&self) -> bool {
        matches!(self.status, EntryStatus::Mirrored(_))
    }
}

/// Ordered results of a whole run; `entries[i]` belongs to `sources[i]`.
#[derive(Debug, Clone, Serialize)]
pub struct SynchroniseReport {
    pub updated_at: DateTime<Utc>,
    pub entries: Vec<EntryReport>,
}

impl SynchroniseReport {
    pub fn mirrored_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_mirrored()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.entries.len() - self.mirrored_count()
    }
}

/// Retrieves one source into a uniquely named staging file inside `store_dir`.
///
/// Implementations must never fail the run: every problem is reported as a
/// [`FetchFailure`] and must leave no staging file behind. They must not pick
/// final names either; that happens in a single ordered pass after all
/// fetches have joined.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, entry: &SourceEntry, store_dir: &Path) -> FetchOutcome;
}

/// Turns a long URL into a short one via some external service.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Shortener: Send + Sync {
    async fn shorten(&self, url: &str) -> Result<String, ShortenError>;
}
