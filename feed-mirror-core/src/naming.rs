//! Final naming of staged downloads.
//!
//! Runs strictly after every fetch has joined, over the entries in source
//! order. Doing the "is this name taken" check here, single-threaded, is what
//! makes the resulting names race-free and identical across runs with the same
//! inputs.

use regex::Regex;
use std::collections::HashSet;
use std::path::Path;
use std::sync::OnceLock;
use tokio::fs;
use tracing::{error, info, warn};

use crate::config::SourceEntry;
use crate::contract::{FetchOutcome, ResolvedArtifact, StagedFile};
use crate::download::bytes_to_mb;
use crate::error::FetchFailure;
use crate::sniff::last_path_segment;

const FALLBACK_BASE_NAME: &str = "download";

fn separator_runs() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static slug regex is valid"))
}

/// Lowercase, ASCII-alphanumeric slug with single dashes between words.
///
/// `"Alpha Two"` becomes `"alpha-two"`; text without any ASCII alphanumerics
/// yields an empty string.
pub fn slugify(text: &str) -> String {
    let lowered = text.to_lowercase();
    separator_runs()
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

/// Base file name (without extension) for a source entry: the slugged
/// description, else the slugged URL file stem, else `download`.
pub fn base_name(entry: &SourceEntry) -> String {
    let from_desc = slugify(&entry.desc);
    if !from_desc.is_empty() {
        return from_desc;
    }
    let from_url = last_path_segment(&entry.url)
        .map(|segment| {
            let stem = segment.split('.').find(|s| !s.is_empty()).unwrap_or_default();
            slugify(stem)
        })
        .unwrap_or_default();
    if !from_url.is_empty() {
        return from_url;
    }
    FALLBACK_BASE_NAME.to_string()
}

/// Picks `base + extension`, or `base-1 + extension`, `base-2 + extension`, …
/// whichever is not yet in `used`.
pub fn unique_filename(base: &str, extension: &str, used: &HashSet<String>) -> String {
    let candidate = format!("{base}{extension}");
    if !used.contains(&candidate) {
        return candidate;
    }
    (1u32..)
        .map(|counter| format!("{base}-{counter}{extension}"))
        .find(|candidate| !used.contains(candidate))
        .unwrap_or(candidate)
}

/// Assigns final names in source order and moves staging files into place.
///
/// Failures pass through untouched. A failed rename turns that entry into an
/// [`FetchFailure::Io`] and its name is not reserved.
pub async fn resolve_names(
    store_dir: &Path,
    outcomes: Vec<(SourceEntry, FetchOutcome)>,
) -> Vec<(SourceEntry, Result<ResolvedArtifact, FetchFailure>)> {
    let mut used: HashSet<String> = HashSet::new();
    let mut resolved = Vec::with_capacity(outcomes.len());

    for (entry, outcome) in outcomes {
        let staged = match outcome {
            Ok(staged) => staged,
            Err(failure) => {
                resolved.push((entry, Err(failure)));
                continue;
            }
        };

        let base = base_name(&entry);
        let filename = unique_filename(&base, &staged.extension, &used);
        if filename != format!("{base}{}", staged.extension) {
            info!(desc = %entry.desc, filename = %filename, "Name collision resolved with numeric suffix");
        }

        let result = move_into_place(store_dir, &staged, &filename).await;
        if let Ok(artifact) = &result {
            used.insert(artifact.filename.clone());
        }
        resolved.push((entry, result));
    }

    resolved
}

async fn move_into_place(
    store_dir: &Path,
    staged: &StagedFile,
    filename: &str,
) -> Result<ResolvedArtifact, FetchFailure> {
    let target = store_dir.join(filename);
    match fs::rename(&staged.staging_path, &target).await {
        Ok(()) => {
            info!(
                from = %staged.staging_path.display(),
                to = %target.display(),
                "Staging file renamed"
            );
            Ok(ResolvedArtifact {
                filename: filename.to_string(),
                path: target,
                size_mb: bytes_to_mb(staged.size_bytes),
            })
        }
        Err(e) => {
            error!(error = ?e, from = %staged.staging_path.display(), to = %target.display(), "Rename failed");
            if let Err(cleanup) = fs::remove_file(&staged.staging_path).await {
                warn!(error = ?cleanup, path = %staged.staging_path.display(), "Failed to remove staging file after rename error");
            }
            Err(FetchFailure::Io(format!("rename to {filename} failed: {e}")))
        }
    }
}
