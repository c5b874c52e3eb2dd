//! High-level pipeline: orchestrates fetch → sniff → name → link for all sources.
//!
//! This module provides the top-level orchestration of a mirror run. For the
//! configured source list it:
//!   - Validates the configuration (duplicates are fatal, nothing is fetched)
//!   - Clears the content store (full replace per run)
//!   - Fetches every source concurrently through a bounded pool of
//!     `max_workers` in-flight transfers, in arbitrary completion order
//!   - Re-sequences the outcomes into source order, keyed by URL
//!   - Names the staged files in one sequential pass (see [`crate::naming`])
//!   - Builds direct/CDN links and their short forms (see [`crate::links`])
//!
//! # Error Handling
//! Only configuration errors and an unusable content store abort the run.
//! Every other problem stays local to its entry and ends up in the
//! [`SynchroniseReport`], which always holds exactly one entry per source, in
//! source order.

use std::collections::HashMap;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{debug, error, info};

use crate::config::{LinkTemplates, MirrorConfig, SourceEntry};
use crate::contract::{
    EntryReport, EntryStatus, FetchOutcome, Fetcher, Shortener, SynchroniseReport,
};
use crate::download::clear_store;
use crate::error::{FetchFailure, SyncError};
use crate::links::build_links;
use crate::naming::resolve_names;

/// Runs one full mirror pass. `templates` must already be resolved against
/// the repository identifier.
pub async fn synchronise<F, S>(
    config: &MirrorConfig,
    templates: &LinkTemplates,
    fetcher: &F,
    shortener: &S,
) -> Result<SynchroniseReport, SyncError>
where
    F: Fetcher + ?Sized,
    S: Shortener + ?Sized,
{
    info!(
        sources = config.sources.len(),
        max_workers = config.max_workers,
        "[SYNC] Starting mirror pipeline"
    );

    config.validate().map_err(|e| {
        error!(error = %e, "[SYNC][ERROR] Invalid configuration");
        e
    })?;

    clear_store(&config.output_dir).await.map_err(|source| {
        error!(error = ?source, path = %config.output_dir.display(), "[SYNC][ERROR] Failed to prepare content store");
        SyncError::Store {
            path: config.output_dir.clone(),
            source,
        }
    })?;
    info!(path = %config.output_dir.display(), "[SYNC] Content store cleared");

    let outcomes = fetch_all(config, fetcher).await;
    info!(completed = outcomes.len(), "[SYNC] All fetches joined");

    let ordered = resequence(&config.sources, outcomes);
    let resolved = resolve_names(&config.output_dir, ordered).await;

    let mut entries = Vec::with_capacity(resolved.len());
    for (source, result) in resolved {
        let status = match result {
            Ok(artifact) => EntryStatus::Mirrored(build_links(templates, artifact, shortener).await),
            Err(failure) => EntryStatus::Failed {
                reason: failure.to_string(),
            },
        };
        let entry = EntryReport { source, status };
        match serde_json::to_string(&entry) {
            Ok(json) => debug!(json = %json, "[SYNC][DEBUG] Entry report"),
            Err(e) => error!(error = ?e, "[SYNC][DEBUG] Failed to serialize entry report"),
        }
        entries.push(entry);
    }

    let report = SynchroniseReport {
        updated_at: Utc::now(),
        entries,
    };
    info!(
        mirrored = report.mirrored_count(),
        failed = report.failed_count(),
        "[SYNC] Mirror pipeline finished"
    );
    Ok(report)
}

/// Fetches every source with at most `max_workers` transfers in flight.
/// The returned vector is in completion order.
async fn fetch_all<F>(config: &MirrorConfig, fetcher: &F) -> Vec<(String, FetchOutcome)>
where
    F: Fetcher + ?Sized,
{
    let store_dir = config.output_dir.as_path();
    stream::iter(config.sources.iter())
        .map(|entry| async move {
            let outcome = fetcher.fetch(entry, store_dir).await;
            (entry.url.clone(), outcome)
        })
        .buffer_unordered(config.max_workers.max(1))
        .collect()
        .await
}

/// Puts completion-ordered outcomes back into source order, joined on URL.
/// URLs are unique after validation; an entry without an outcome is reported
/// as failed rather than dropped.
fn resequence(
    sources: &[SourceEntry],
    outcomes: Vec<(String, FetchOutcome)>,
) -> Vec<(SourceEntry, FetchOutcome)> {
    let mut by_url: HashMap<String, FetchOutcome> = HashMap::with_capacity(outcomes.len());
    for (url, outcome) in outcomes {
        by_url.entry(url).or_insert(outcome);
    }

    sources
        .iter()
        .map(|source| {
            let outcome = by_url.remove(&source.url).unwrap_or_else(|| {
                Err(FetchFailure::Io("no fetch result recorded".to_string()))
            });
            (source.clone(), outcome)
        })
        .collect()
}
