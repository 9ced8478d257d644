//! Image downloader
//!
//! ## Responsibilities
//!
//! 1. **Dedup**: one network call per unique URL within a batch
//! 2. **Bounded concurrency**: fixed-size chunks, each chunk fully awaited
//!    before the next one starts
//! 3. **Idempotent naming**: filename = md5(url) + extension sniffed from
//!    the URL suffix, so a re-run finds the cached file and skips the fetch
//! 4. **Validation**: minimum size and a recognized magic-byte signature
//!    before anything is written to disk
//!
//! A failed URL never aborts the batch; it surfaces as a failed
//! `DownloadResult` with the error message attached.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ImageError;
use crate::utils::retry::{with_retry, RetryPolicy};

/// Buffers below this size are rejected as truncated/error pages.
const MIN_IMAGE_BYTES: usize = 1024;

const KNOWN_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp", "tiff"];

/// Outcome of one unique URL. Never mutated after creation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadResult {
    pub url: String,
    pub success: bool,
    pub local_path: Option<String>,
    pub error: Option<String>,
}

impl DownloadResult {
    fn ok(url: &str, path: &Path) -> Self {
        Self {
            url: url.to_string(),
            success: true,
            local_path: Some(path.to_string_lossy().into_owned()),
            error: None,
        }
    }

    fn failed(url: &str, error: impl ToString) -> Self {
        Self {
            url: url.to_string(),
            success: false,
            local_path: None,
            error: Some(error.to_string()),
        }
    }
}

pub struct ImageDownloader {
    client: reqwest::Client,
    output_dir: PathBuf,
    max_concurrent: usize,
    retry: RetryPolicy,
}

impl ImageDownloader {
    pub fn new(config: &Config) -> Result<Self> {
        let output_dir = PathBuf::from(&config.images_dir);
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("cannot create images dir {}", output_dir.display()))?;

        let client = reqwest::Client::builder()
            .user_agent(config.browser.user_agent.clone())
            .timeout(Duration::from_secs(30))
            .build()
            .context("cannot build http client")?;

        Ok(Self {
            client,
            output_dir,
            max_concurrent: config.max_concurrent_images.max(1),
            retry: config.download_retry.clone(),
        })
    }

    /// Download every unique URL, `max_concurrent` at a time.
    ///
    /// Chunks are processed strictly in order; all downloads within a chunk
    /// run concurrently and the whole chunk is awaited before the next.
    pub async fn download_batch(&self, urls: &[String]) -> Vec<DownloadResult> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = urls.iter().filter(|u| seen.insert(u.as_str())).collect();

        if unique.is_empty() {
            return Vec::new();
        }
        info!("🖼️ downloading {} unique images", unique.len());

        let mut results = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(self.max_concurrent) {
            let batch = chunk.iter().map(|url| self.download_image(url));
            results.extend(futures::future::join_all(batch).await);
        }

        let ok = results.iter().filter(|r| r.success).count();
        info!("🖼️ image batch done: {} ok, {} failed", ok, results.len() - ok);
        results
    }

    /// Download a single image, reusing the on-disk cache when present.
    pub async fn download_image(&self, url: &str) -> DownloadResult {
        let path = self.output_dir.join(local_filename(url));

        // Idempotent re-run: the deterministic name already exists on disk.
        if path.exists() {
            debug!("cache hit for {}", url);
            return DownloadResult::ok(url, &path);
        }

        let fetched = with_retry(
            || self.fetch_validated(url),
            &self.retry,
            |e, attempt| warn!("image fetch attempt {} failed for {}: {}", attempt, url, e),
        )
        .await;

        match fetched {
            Ok(bytes) => match tokio::fs::write(&path, &bytes).await {
                Ok(()) => DownloadResult::ok(url, &path),
                Err(e) => DownloadResult::failed(url, format!("write failed: {e}")),
            },
            Err(e) => DownloadResult::failed(url, e),
        }
    }

    /// Fetch the bytes and validate them. Invalid bytes count as a fetch
    /// failure so the retry loop gets another chance at a clean response.
    async fn fetch_validated(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::BadStatus(status.as_u16()).into());
        }
        let bytes = response.bytes().await?.to_vec();
        validate_image_bytes(&bytes)?;
        Ok(bytes)
    }
}

/// Deterministic local filename: md5 of the URL plus the extension sniffed
/// from its suffix (default `jpg`).
pub fn local_filename(url: &str) -> String {
    let hash = format!("{:x}", md5::compute(url.as_bytes()));
    let ext = url
        .rsplit('.')
        .next()
        .map(|e| e.split(['?', '#']).next().unwrap_or(e).to_ascii_lowercase())
        .filter(|e| KNOWN_EXTENSIONS.contains(&e.as_str()))
        .unwrap_or_else(|| "jpg".to_string());
    format!("{hash}.{ext}")
}

/// Minimum size plus a recognized magic-byte signature
/// (JPEG/PNG/GIF/BMP/TIFF).
pub fn validate_image_bytes(bytes: &[u8]) -> Result<(), ImageError> {
    if bytes.len() < MIN_IMAGE_BYTES {
        return Err(ImageError::TooSmall {
            len: bytes.len(),
            min: MIN_IMAGE_BYTES,
        });
    }

    let recognized = bytes.starts_with(&[0xFF, 0xD8, 0xFF])          // JPEG
        || bytes.starts_with(&[0x89, 0x50, 0x4E, 0x47])              // PNG
        || bytes.starts_with(b"GIF8")                                // GIF
        || bytes.starts_with(b"BM")                                  // BMP
        || bytes.starts_with(&[0x49, 0x49, 0x2A, 0x00])              // TIFF LE
        || bytes.starts_with(&[0x4D, 0x4D, 0x00, 0x2A]); // TIFF BE

    if recognized {
        Ok(())
    } else {
        Err(ImageError::UnknownSignature)
    }
}
