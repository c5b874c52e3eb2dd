//! Public links for mirrored artifacts: direct mirror URL, CDN URL, and a
//! best-effort short form of each.

use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::LinkTemplates;
use crate::contract::{LinkedResult, ResolvedArtifact, Shortener};
use crate::error::ShortenError;

/// Placed in a short-link field whenever the shortener could not deliver.
pub const SHORTENING_UNAVAILABLE: &str = "shortening unavailable";

pub const DEFAULT_ISGD_ENDPOINT: &str = "https://is.gd/create.php";
const SHORTENER_TIMEOUT_SECS: u64 = 20;

/// Client for the is.gd "simple" API: one GET per URL, the body is the short
/// URL as plain text.
pub struct IsGdShortener {
    client: reqwest::Client,
    endpoint: String,
}

impl IsGdShortener {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_endpoint(DEFAULT_ISGD_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SHORTENER_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait::async_trait]
impl Shortener for IsGdShortener {
    async fn shorten(&self, url: &str) -> Result<String, ShortenError> {
        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("format", "simple"), ("url", url)])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ShortenError::Status(status.as_u16()));
        }
        let body = response.text().await?;
        let short = body.trim();
        match Url::parse(short) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(short.to_string()),
            _ => Err(ShortenError::MalformedResponse(short.to_string())),
        }
    }
}

/// Shortener that always declines; every short link becomes the sentinel.
pub struct NoopShortener;

#[async_trait::async_trait]
impl Shortener for NoopShortener {
    async fn shorten(&self, _url: &str) -> Result<String, ShortenError> {
        Err(ShortenError::Disabled)
    }
}

/// Shortens `url`, substituting [`SHORTENING_UNAVAILABLE`] on any failure.
pub async fn shorten_or_sentinel<S: Shortener + ?Sized>(shortener: &S, url: &str) -> String {
    match shortener.shorten(url).await {
        Ok(short) => {
            debug!(url = %url, short = %short, "Shortened URL");
            short
        }
        Err(e) => {
            warn!(url = %url, error = %e, "Could not shorten URL");
            SHORTENING_UNAVAILABLE.to_string()
        }
    }
}

/// Expands both templates for the artifact and shortens the two results
/// concurrently.
pub async fn build_links<S: Shortener + ?Sized>(
    templates: &LinkTemplates,
    artifact: ResolvedArtifact,
    shortener: &S,
) -> LinkedResult {
    let direct_url = templates.direct_url(&artifact.filename);
    let cdn_url = templates.cdn_url(&artifact.filename);

    let (short_direct_url, short_cdn_url) = futures::join!(
        shorten_or_sentinel(shortener, &direct_url),
        shorten_or_sentinel(shortener, &cdn_url),
    );

    LinkedResult {
        artifact,
        direct_url,
        cdn_url,
        short_direct_url,
        short_cdn_url,
    }
}
