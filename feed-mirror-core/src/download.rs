use std::path::{Path, PathBuf};
use std::time::Duration;

use futures::StreamExt;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, warn};

use crate::config::{MirrorConfig, SourceEntry};
use crate::contract::{FetchOutcome, Fetcher, StagedFile};
use crate::error::FetchFailure;
use crate::sniff::{detect_extension, SNIFF_LEN};

const STAGING_PREFIX: &str = "tmp_";
const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Bytes to MiB, rounded to two decimals.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    (bytes as f64 / BYTES_PER_MB * 100.0).round() / 100.0
}

/// A fresh staging path that no other task can pick.
pub fn staging_path(store_dir: &Path) -> PathBuf {
    store_dir.join(format!(
        "{STAGING_PREFIX}{}",
        uuid::Uuid::new_v4().simple()
    ))
}

/// HttpFetcher streams sources over HTTP(S) into the content store.
///
/// One client is shared by all concurrent fetches; the per-request timeout is
/// configured on the client.
pub struct HttpFetcher {
    client: reqwest::Client,
    chunk_size: usize,
    max_size_bytes: u64,
    max_size_mb: u64,
}

impl HttpFetcher {
    pub fn new(config: &MirrorConfig) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("feed-mirror/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: reqwest::Client, config: &MirrorConfig) -> Self {
        Self {
            client,
            chunk_size: config.chunk_size.max(1),
            max_size_bytes: config.max_file_size_bytes(),
            max_size_mb: config.max_file_size_mb,
        }
    }

    fn too_large(&self, size_bytes: u64) -> FetchFailure {
        FetchFailure::SizeExceeded {
            size_mb: bytes_to_mb(size_bytes),
            limit_mb: self.max_size_mb,
        }
    }

    async fn transfer(&self, url: &str, staging: &Path) -> Result<u64, FetchFailure> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Transfer(format!(
                "HTTP status {status} for {url}"
            )));
        }

        if let Some(announced) = response.content_length() {
            if announced > self.max_size_bytes {
                return Err(self.too_large(announced));
            }
        }

        let file = File::create(staging).await?;
        let mut writer = BufWriter::with_capacity(self.chunk_size, file);
        let mut written: u64 = 0;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_size_bytes {
                return Err(self.too_large(written));
            }
            writer.write_all(&chunk).await?;
        }
        writer.flush().await?;
        Ok(written)
    }
}

/// Reads the first [`SNIFF_LEN`] bytes of a file (fewer if it is shorter).
pub async fn read_prefix(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut file = File::open(path).await?;
    let mut prefix = Vec::with_capacity(SNIFF_LEN);
    (&mut file).take(SNIFF_LEN as u64).read_to_end(&mut prefix).await?;
    Ok(prefix)
}

async fn remove_staging(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed staging file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(error = ?e, path = %path.display(), "Failed to remove staging file"),
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, entry: &SourceEntry, store_dir: &Path) -> FetchOutcome {
        let staging = staging_path(store_dir);
        info!(url = %entry.url, desc = %entry.desc, staging = %staging.display(), "Starting download");

        let size_bytes = match self.transfer(&entry.url, &staging).await {
            Ok(size) => size,
            Err(failure) => {
                error!(url = %entry.url, desc = %entry.desc, error = %failure, "Download failed");
                remove_staging(&staging).await;
                return Err(failure);
            }
        };

        let prefix = match read_prefix(&staging).await {
            Ok(prefix) => prefix,
            Err(e) => {
                error!(url = %entry.url, error = ?e, "Failed to read back staging file");
                remove_staging(&staging).await;
                return Err(e.into());
            }
        };
        let extension = detect_extension(&prefix, &entry.url);

        info!(
            url = %entry.url,
            desc = %entry.desc,
            size_bytes,
            extension = %extension,
            "Download finished"
        );
        Ok(StagedFile {
            staging_path: staging,
            size_bytes,
            extension,
        })
    }
}

/// Empties the content store of regular files, creating it if absent.
/// Subdirectories are left alone.
pub async fn clear_store(store_dir: &Path) -> std::io::Result<()> {
    if !fs::try_exists(store_dir).await? {
        fs::create_dir_all(store_dir).await?;
        debug!(path = %store_dir.display(), "Created content store");
        return Ok(());
    }

    let mut removed = 0usize;
    let mut entries = fs::read_dir(store_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if entry.file_type().await?.is_file() {
            fs::remove_file(entry.path()).await?;
            removed += 1;
        }
    }
    debug!(path = %store_dir.display(), removed, "Cleared content store");
    Ok(())
}
