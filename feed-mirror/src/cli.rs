///
/// This module implements the CLI interface for feed-mirror: command parsing,
/// argument validation, and the async entrypoint shared by `main` and tests.
///
/// All pipeline logic (fetching, sniffing, naming, links) lives in the
/// [`feed-mirror-core`] crate. This module only wires configuration, the
/// environment, the pipeline and the report file together.
///
/// ## How To Use
/// - For command-line users: `feed-mirror sync --config sources.json`.
/// - For programmatic/integration use: call [`run`] with a constructed [`Cli`].
///
/// [`feed-mirror-core`]: ../../feed-mirror-core/
use crate::load_config::{load_config, resolve_links};
use crate::report::render_report;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use feed_mirror_core::contract::Shortener;
use feed_mirror_core::download::HttpFetcher;
use feed_mirror_core::links::{IsGdShortener, NoopShortener};
use feed_mirror_core::synchronise::synchronise;
use std::path::PathBuf;

/// CLI for feed-mirror: mirror remote feeds into a content store and report links.
#[derive(Parser)]
#[clap(
    name = "feed-mirror",
    version,
    about = "Mirror remote feeds into a local content store with stable direct, CDN and short links"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch all configured sources into the content store and rewrite the report
    Sync {
        /// Path to the YAML or JSON config file
        #[clap(long)]
        config: PathBuf,

        /// Where to write the markdown report
        #[clap(long, default_value = "README.md")]
        readme: PathBuf,

        /// Skip the external shortening service; short links show the sentinel
        #[clap(long)]
        no_shorten: bool,
    },
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::Sync {
            config,
            readme,
            no_shorten,
        } => {
            let config = load_config(config)?;
            let templates = resolve_links(&config.links)?;
            tracing::info!(command = "sync", "Starting mirror run");

            let fetcher =
                HttpFetcher::new(&config.mirror).context("Failed to build HTTP client")?;
            let shortener: Box<dyn Shortener> = if no_shorten {
                Box::new(NoopShortener)
            } else {
                Box::new(IsGdShortener::new().context("Failed to build shortener client")?)
            };

            let report = match synchronise(&config.mirror, &templates, &fetcher, shortener.as_ref()).await {
                Ok(report) => report,
                Err(e) => {
                    tracing::error!(command = "sync", error = %e, "Mirror run failed");
                    return Err(anyhow::Error::new(e).context("Mirror run failed"));
                }
            };

            let markdown = render_report(&report, config.notes.as_deref());
            std::fs::write(&readme, markdown)
                .with_context(|| format!("Failed to write report {:?}", readme))?;

            tracing::info!(
                command = "sync",
                mirrored = report.mirrored_count(),
                failed = report.failed_count(),
                readme = %readme.display(),
                "Mirror run complete"
            );
            println!(
                "Mirror run complete: {} mirrored, {} failed. Report written to {}",
                report.mirrored_count(),
                report.failed_count(),
                readme.display()
            );
            Ok(())
        }
    }
}
