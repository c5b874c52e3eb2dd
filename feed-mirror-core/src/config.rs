use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::ConfigError;

pub const DEFAULT_OUTPUT_DIR: &str = "data";
pub const DEFAULT_MAX_WORKERS: usize = 8;
pub const DEFAULT_CHUNK_SIZE: usize = 16 * 1024;
pub const DEFAULT_MAX_FILE_SIZE_MB: u64 = 95;
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

// The default templates serve files from `data/` in the repository, so they
// only agree with the default `output_dir`. See `LinkTemplates::serves_store`.
pub const DEFAULT_DIRECT_TEMPLATE: &str =
    "https://github.com/{owner}/{repo}/raw/main/data/{filename}";
pub const DEFAULT_CDN_TEMPLATE: &str =
    "https://cdn.jsdelivr.net/gh/{owner}/{repo}@main/data/{filename}";

const FILENAME_PLACEHOLDER: &str = "{filename}";
const BYTES_PER_MB: u64 = 1024 * 1024;

/// One configured remote resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub url: String,
    pub desc: String,
}

impl SourceEntry {
    pub fn new(url: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            desc: desc.into(),
        }
    }
}

/// Everything a single mirror run needs, apart from the link templates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_max_file_size_mb")]
    pub max_file_size_mb: u64,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_max_workers() -> usize {
    DEFAULT_MAX_WORKERS
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_max_file_size_mb() -> u64 {
    DEFAULT_MAX_FILE_SIZE_MB
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl MirrorConfig {
    /// Config with default tunables for the given store and sources.
    pub fn new(output_dir: impl Into<PathBuf>, sources: Vec<SourceEntry>) -> Self {
        Self {
            output_dir: output_dir.into(),
            sources,
            max_workers: DEFAULT_MAX_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_file_size_mb: DEFAULT_MAX_FILE_SIZE_MB,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Size ceiling in bytes; saturates instead of overflowing for absurd limits.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(BYTES_PER_MB)
    }

    /// Rejects configurations the pipeline cannot run deterministically:
    /// empty lists, blank fields, and duplicate descriptions or URLs (URLs are
    /// the re-sequencing key, descriptions the naming key).
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::NoSources);
        }
        if self.max_workers == 0 {
            return Err(ConfigError::InvalidWorkers);
        }
        if self.max_file_size_mb.checked_mul(BYTES_PER_MB).is_none() {
            return Err(ConfigError::InvalidSizeLimit(self.max_file_size_mb));
        }

        let mut descs = HashSet::new();
        let mut urls = HashSet::new();
        for (index, entry) in self.sources.iter().enumerate() {
            if entry.url.trim().is_empty() {
                return Err(ConfigError::EmptyField { index, field: "url" });
            }
            if entry.desc.trim().is_empty() {
                return Err(ConfigError::EmptyField { index, field: "desc" });
            }
            if !descs.insert(entry.desc.as_str()) {
                return Err(ConfigError::DuplicateDesc(entry.desc.clone()));
            }
            if !urls.insert(entry.url.as_str()) {
                return Err(ConfigError::DuplicateUrl(entry.url.clone()));
            }
        }
        Ok(())
    }

    pub fn trace_loaded(&self) {
        info!(
            output_dir = %self.output_dir.display(),
            sources_count = self.sources.len(),
            max_workers = self.max_workers,
            max_file_size_mb = self.max_file_size_mb,
            "Loaded MirrorConfig"
        );
        debug!(?self, "MirrorConfig loaded (full debug)");
    }
}

/// `owner/repo` pair used to format the link templates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoIdent {
    pub owner: String,
    pub repo: String,
}

impl RepoIdent {
    pub fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.split_once('/') {
            Some((owner, repo))
                if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') =>
            {
                Ok(Self {
                    owner: owner.to_string(),
                    repo: repo.to_string(),
                })
            }
            _ => Err(ConfigError::MalformedRepository(value.to_string())),
        }
    }

    /// Reads `GITHUB_REPOSITORY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let value =
            std::env::var("GITHUB_REPOSITORY").map_err(|_| ConfigError::MissingRepository)?;
        Self::parse(value.trim())
    }
}

/// Direct-mirror and CDN URL templates.
///
/// Raw templates may carry `{owner}` and `{repo}`; after [`LinkTemplates::resolve`]
/// only the `{filename}` placeholder remains. The path segment in front of
/// `{filename}` has to name the same directory as `MirrorConfig::output_dir`,
/// otherwise the published links point at nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkTemplates {
    #[serde(default = "default_direct_template")]
    pub direct: String,
    #[serde(default = "default_cdn_template")]
    pub cdn: String,
}

fn default_direct_template() -> String {
    DEFAULT_DIRECT_TEMPLATE.to_string()
}

fn default_cdn_template() -> String {
    DEFAULT_CDN_TEMPLATE.to_string()
}

impl Default for LinkTemplates {
    fn default() -> Self {
        Self {
            direct: default_direct_template(),
            cdn: default_cdn_template(),
        }
    }
}

impl LinkTemplates {
    /// Substitutes the repository identifier and checks each template keeps
    /// exactly one filename placeholder.
    pub fn resolve(&self, ident: &RepoIdent) -> Result<LinkTemplates, ConfigError> {
        let fill = |name: &'static str, template: &str| -> Result<String, ConfigError> {
            if template.matches(FILENAME_PLACEHOLDER).count() != 1 {
                return Err(ConfigError::InvalidTemplate {
                    name,
                    template: template.to_string(),
                });
            }
            Ok(template
                .replace("{owner}", &ident.owner)
                .replace("{repo}", &ident.repo))
        };
        Ok(LinkTemplates {
            direct: fill("direct", &self.direct)?,
            cdn: fill("cdn", &self.cdn)?,
        })
    }

    /// True when both templates place `{filename}` directly under the last
    /// component of `output_dir` (e.g. `.../data/{filename}` for `./data`).
    pub fn serves_store(&self, output_dir: &Path) -> bool {
        let Some(dir) = output_dir.file_name().and_then(|d| d.to_str()) else {
            return false;
        };
        let suffix = format!("/{dir}/{FILENAME_PLACEHOLDER}");
        self.direct.ends_with(&suffix) && self.cdn.ends_with(&suffix)
    }

    pub fn direct_url(&self, filename: &str) -> String {
        self.direct.replace(FILENAME_PLACEHOLDER, filename)
    }

    pub fn cdn_url(&self, filename: &str) -> String {
        self.cdn.replace(FILENAME_PLACEHOLDER, filename)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(sources: Vec<SourceEntry>) -> MirrorConfig {
        MirrorConfig::new("data", sources)
    }

    #[test]
    fn rejects_duplicate_descriptions() {
        let cfg = config(vec![
            SourceEntry::new("http://x/a.xml", "Feed A"),
            SourceEntry::new("http://x/b", "Feed A"),
        ]);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::DuplicateDesc("Feed A".into()))
        );
    }

    #[test]
    fn rejects_duplicate_urls() {
        let cfg = config(vec![
            SourceEntry::new("http://x/a.xml", "Feed A"),
            SourceEntry::new("http://x/a.xml", "Feed B"),
        ]);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::DuplicateUrl("http://x/a.xml".into()))
        );
    }

    #[test]
    fn rejects_empty_and_blank() {
        assert_eq!(config(vec![]).validate(), Err(ConfigError::NoSources));
        let cfg = config(vec![SourceEntry::new("http://x/a", "  ")]);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::EmptyField { index: 0, field: "desc" })
        );
        let mut cfg = config(vec![SourceEntry::new("http://x/a", "A")]);
        cfg.max_workers = 0;
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidWorkers));
    }

    #[test]
    fn oversized_limit_saturates_and_fails_validation() {
        let mut cfg = config(vec![SourceEntry::new("http://x/a", "A")]);
        cfg.max_file_size_mb = u64::MAX / 1024;
        assert_eq!(cfg.max_file_size_bytes(), u64::MAX);
        assert_eq!(
            cfg.validate(),
            Err(ConfigError::InvalidSizeLimit(u64::MAX / 1024))
        );

        cfg.max_file_size_mb = 95;
        assert_eq!(cfg.max_file_size_bytes(), 95 * 1024 * 1024);
        assert_eq!(cfg.validate(), Ok(()));
    }

    #[test]
    fn parses_repository_identifier() {
        let ident = RepoIdent::parse("octo/feeds").unwrap();
        assert_eq!(ident.owner, "octo");
        assert_eq!(ident.repo, "feeds");

        for bad in ["", "octo", "/feeds", "octo/", "a/b/c"] {
            assert!(RepoIdent::parse(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn resolves_default_templates() {
        let ident = RepoIdent::parse("octo/feeds").unwrap();
        let templates = LinkTemplates::default().resolve(&ident).unwrap();
        assert_eq!(
            templates.direct_url("alpha.xml.gz"),
            "https://github.com/octo/feeds/raw/main/data/alpha.xml.gz"
        );
        assert_eq!(
            templates.cdn_url("alpha.xml.gz"),
            "https://cdn.jsdelivr.net/gh/octo/feeds@main/data/alpha.xml.gz"
        );
    }

    #[test]
    fn default_templates_only_serve_the_default_store() {
        let templates = LinkTemplates::default();
        assert!(templates.serves_store(Path::new(DEFAULT_OUTPUT_DIR)));
        assert!(templates.serves_store(Path::new("./data")));
        assert!(!templates.serves_store(Path::new("mirror")));

        let custom = LinkTemplates {
            direct: "https://github.com/{owner}/{repo}/raw/main/mirror/{filename}".into(),
            cdn: "https://cdn.jsdelivr.net/gh/{owner}/{repo}@main/mirror/{filename}".into(),
        };
        assert!(custom.serves_store(Path::new("mirror")));
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let ident = RepoIdent::parse("octo/feeds").unwrap();
        let templates = LinkTemplates {
            direct: "https://example.org/static".into(),
            cdn: DEFAULT_CDN_TEMPLATE.into(),
        };
        assert!(matches!(
            templates.resolve(&ident),
            Err(ConfigError::InvalidTemplate { name: "direct", .. })
        ));
    }
}
