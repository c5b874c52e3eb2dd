/// `load_config` module: Loads a static YAML (or JSON) config file and the
/// repository identifier from the environment.
///
/// This module is the only place where user-supplied configuration is parsed
/// and mapped to the strongly-typed structs of `feed-mirror-core`.
///
/// # Responsibilities
/// - Parse the config file into [`CliConfig`]: tunables, source list, notes, link templates
/// - Read `GITHUB_REPOSITORY` and resolve the link templates against it
/// - Fail with clear diagnostics; all errors here are fatal and surface at the CLI boundary
///
/// JSON files are accepted as-is, since `serde_yaml` parses them too.
use anyhow::{Context, Result};
use feed_mirror_core::config::{LinkTemplates, MirrorConfig, RepoIdent};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::{error, info, warn};

/// Fully loaded CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub mirror: MirrorConfig,
    pub notes: Option<String>,
    pub links: LinkTemplates,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(flatten)]
    mirror: MirrorConfig,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    links: Option<LinkTemplates>,
}

/// Loads the config file, validating the source list.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let raw: RawConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    let mirror = raw.mirror;

    if let Err(e) = mirror.validate() {
        error!(error = %e, config_path = ?path_ref, "Invalid source configuration");
        return Err(anyhow::Error::new(e).context(format!("Invalid config {:?}", path_ref)));
    }
    mirror.trace_loaded();

    let notes = raw.notes.filter(|n| !n.trim().is_empty());
    let links = raw.links.unwrap_or_default();
    if !links.serves_store(&mirror.output_dir) {
        warn!(
            output_dir = %mirror.output_dir.display(),
            direct = %links.direct,
            cdn = %links.cdn,
            "Link templates do not point at output_dir; published links may be dead"
        );
    }

    Ok(CliConfig {
        mirror,
        notes,
        links,
    })
}

/// Reads `GITHUB_REPOSITORY` and fills `{owner}`/`{repo}` into the templates.
pub fn resolve_links(links: &LinkTemplates) -> Result<LinkTemplates> {
    let ident = RepoIdent::from_env().context("Cannot determine repository for link templates")?;
    info!(owner = %ident.owner, repo = %ident.repo, "Resolved repository identifier");
    links
        .resolve(&ident)
        .context("Invalid link template in config")
}
