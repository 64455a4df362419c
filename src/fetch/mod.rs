// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image acquisition over HTTP with a local byte store
//!
//! Success is strictly HTTP 200 within the configured timeout; any other
//! status or transport failure is a fetch failure. Fetched bytes are
//! persisted under the image directory keyed by the SHA-256 digest of the
//! full URL, so two distinct URLs sharing a basename can never collide.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Fetch error taxonomy
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Timeout fetching: {0}")]
    Timeout(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {0} for: {1}")]
    Status(u16, String),

    #[error("Invalid image URL '{0}': {1}")]
    InvalidUrl(String, String),

    #[error("Failed to persist image bytes: {0}")]
    Store(String),
}

/// Acquisition seam: returns the raw bytes behind an image URL
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP-backed image store
///
/// Long-lived, read-only-after-construction service shared by all batch
/// workers.
pub struct HttpImageStore {
    client: Client,
    image_dir: PathBuf,
}

impl HttpImageStore {
    /// Create the store, building the HTTP client and the image directory
    pub async fn new(image_dir: impl Into<PathBuf>, timeout_secs: u64) -> Result<Self> {
        let image_dir = image_dir.into();
        tokio::fs::create_dir_all(&image_dir)
            .await
            .with_context(|| format!("failed to create image dir {}", image_dir.display()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent("catalog-ocr/1.2 (+batch catalog enrichment)")
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self { client, image_dir })
    }

    /// Store filename for a URL: SHA-256 hex of the full URL, keeping the
    /// URL path's extension when it has one
    pub fn store_filename(url: &str) -> String {
        let digest = hex::encode(Sha256::digest(url.as_bytes()));

        let extension = Url::parse(url)
            .ok()
            .and_then(|parsed| {
                Path::new(parsed.path())
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
            })
            .filter(|ext| !ext.is_empty() && ext.len() <= 5);

        match extension {
            Some(ext) => format!("{digest}.{ext}"),
            None => digest,
        }
    }

    /// Local path a URL's bytes are stored under
    pub fn store_path(&self, url: &str) -> PathBuf {
        self.image_dir.join(Self::store_filename(url))
    }
}

#[async_trait]
impl ImageFetcher for HttpImageStore {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        Url::parse(url).map_err(|e| FetchError::InvalidUrl(url.to_string(), e.to_string()))?;

        debug!("fetching image: {}", url);

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout(url.to_string())
            } else {
                FetchError::Http(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        if status != 200 {
            return Err(FetchError::Status(status, url.to_string()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout(url.to_string())
                } else {
                    FetchError::Http(e.to_string())
                }
            })?
            .to_vec();

        // Store side effect; a write failure fails acquisition for this row
        let path = self.store_path(url);
        if let Err(e) = tokio::fs::write(&path, &bytes).await {
            warn!("failed to persist {} to {}: {}", url, path.display(), e);
            return Err(FetchError::Store(e.to_string()));
        }

        debug!("stored {} bytes at {}", bytes.len(), path.display());
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_filename_distinct_urls_same_basename() {
        let a = HttpImageStore::store_filename("https://cdn-a.example.com/items/41/photo.jpg");
        let b = HttpImageStore::store_filename("https://cdn-b.example.com/items/97/photo.jpg");
        assert_ne!(a, b);
        assert!(a.ends_with(".jpg"));
        assert!(b.ends_with(".jpg"));
    }

    #[test]
    fn test_store_filename_is_stable() {
        let url = "https://example.com/p/scale.png";
        assert_eq!(
            HttpImageStore::store_filename(url),
            HttpImageStore::store_filename(url)
        );
    }

    #[test]
    fn test_store_filename_without_extension() {
        let name = HttpImageStore::store_filename("https://example.com/image/42");
        assert_eq!(name.len(), 64);
        assert!(!name.contains('.'));
    }

    #[test]
    fn test_store_filename_rejects_long_extension() {
        // Query-ish trailing garbage should not become an "extension"
        let name = HttpImageStore::store_filename("https://example.com/img.somelongext");
        assert!(!name.contains('.'));
    }

    #[tokio::test]
    async fn test_fetch_invalid_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = HttpImageStore::new(dir.path(), 1).await.unwrap();
        let result = store.fetch("not a url").await;
        assert!(matches!(result, Err(FetchError::InvalidUrl(_, _))));
    }

    #[tokio::test]
    async fn test_store_path_lands_in_image_dir() {
        let dir = tempfile::tempdir().unwrap();
        let store = HttpImageStore::new(dir.path(), 1).await.unwrap();
        let path = store.store_path("https://example.com/a.png");
        assert!(path.starts_with(dir.path()));
    }
}
