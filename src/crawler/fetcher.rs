//! Caching fetch layer
//!
//! This module handles every network read of a harvest, including:
//! - Building the HTTP client with the configured user agent and timeouts
//! - The transport seam used by the cache (reqwest in production)
//! - Buffered fetches persisted to the cache directory before returning
//! - Streamed media downloads written through a `.part` file
//! - Status classification (only 200 and 302 are accepted)

use crate::config::CrawlerConfig;
use crate::url::cache_key;
use crate::FetchError;
use async_trait::async_trait;
use reqwest::{redirect::Policy, Client, StatusCode};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Header sent with every listing batch request
pub const LISTING_HEADERS: &[(&str, &str)] = &[("x-requested-with", "XMLHttpRequest")];

/// Returns true for the statuses the cache accepts as content
pub fn is_accepted_status(status: u16) -> bool {
    status == StatusCode::OK.as_u16() || status == StatusCode::FOUND.as_u16()
}

/// Network access used by [`FetchCache`]
///
/// Implementations must reject statuses outside {200, 302} with
/// [`FetchError::UnexpectedStatus`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetches the full body of `url`
    async fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Vec<u8>, FetchError>;

    /// Writes the body of `url` to `destination` chunk by chunk
    ///
    /// Returns the number of bytes written.
    async fn get_stream(&self, url: &Url, destination: &Path) -> Result<u64, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The crawler configuration (user agent and request timeout)
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
///
/// # Example
///
/// ```no_run
/// use grid_harvest::config::CrawlerConfig;
/// use grid_harvest::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.request_timeout))
        .connect_timeout(Duration::from_secs(10))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// [`Transport`] backed by a reqwest client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds the transport from the crawler configuration
    pub fn from_config(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::new(build_http_client(config)?))
    }

    async fn send(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> Result<reqwest::Response, FetchError> {
        let mut request = self.client.get(url.clone());
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(url, &e))?;

        let status = response.status().as_u16();
        if !is_accepted_status(status) {
            return Err(FetchError::UnexpectedStatus {
                status,
                url: url.to_string(),
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &Url, headers: &[(&str, &str)]) -> Result<Vec<u8>, FetchError> {
        let response = self.send(url, headers).await?;
        let body = response
            .bytes()
            .await
            .map_err(|e| transport_error(url, &e))?;
        Ok(body.to_vec())
    }

    async fn get_stream(&self, url: &Url, destination: &Path) -> Result<u64, FetchError> {
        let mut response = self.send(url, &[]).await?;

        let mut file = tokio::fs::File::create(destination)
            .await
            .map_err(|e| io_error(destination, e))?;

        let mut written = 0u64;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| transport_error(url, &e))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| io_error(destination, e))?;
            written += chunk.len() as u64;
        }

        file.flush().await.map_err(|e| io_error(destination, e))?;
        file.sync_all()
            .await
            .map_err(|e| io_error(destination, e))?;
        Ok(written)
    }
}

fn transport_error(url: &Url, error: &reqwest::Error) -> FetchError {
    let message = if error.is_timeout() {
        "Request timeout".to_string()
    } else if error.is_connect() {
        "Connection refused".to_string()
    } else if error.is_redirect() {
        format!("Redirect error: {}", error)
    } else {
        error.to_string()
    };
    FetchError::Transport {
        url: url.to_string(),
        message,
    }
}

fn io_error(path: &Path, source: std::io::Error) -> FetchError {
    FetchError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// Sibling path used while a file is being written
fn part_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    path.with_file_name(name)
}

/// How a fetch delivers its content
#[derive(Debug, Clone, Copy)]
pub enum FetchMode<'a> {
    /// Return the body, serving and filling the cache directory
    Buffered,

    /// Write the body to the given destination, bypassing the cache
    Stream(&'a Path),
}

/// Content returned by [`FetchCache::fetch`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Body(Vec<u8>),
    Written { path: PathBuf, bytes: u64 },
}

/// Counters describing how the cache has been used
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub streamed_bytes: u64,
}

/// Content-addressed fetch cache
///
/// Buffered fetches are stored under the cache directory as one file per
/// locator, named by [`cache_key`]. Cached content never expires and a hit
/// never touches the network.
pub struct FetchCache {
    cache_dir: PathBuf,
    transport: Arc<dyn Transport>,
    hits: AtomicU64,
    misses: AtomicU64,
    streamed_bytes: AtomicU64,
}

impl FetchCache {
    pub fn new(cache_dir: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            transport,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            streamed_bytes: AtomicU64::new(0),
        }
    }

    /// Where the cached copy of `url` lives
    pub fn cache_path(&self, url: &Url) -> PathBuf {
        self.cache_dir.join(cache_key(url))
    }

    /// Fetches `url` in the requested mode
    pub async fn fetch(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
        mode: FetchMode<'_>,
    ) -> Result<Fetched, FetchError> {
        match mode {
            FetchMode::Buffered => Ok(Fetched::Body(self.fetch_buffered(url, headers).await?)),
            FetchMode::Stream(destination) => {
                let bytes = self.fetch_stream(url, destination).await?;
                Ok(Fetched::Written {
                    path: destination.to_path_buf(),
                    bytes,
                })
            }
        }
    }

    /// Returns the body of `url`, from the cache when possible
    ///
    /// On a miss the body is written to `<key>.part` and renamed to `<key>`
    /// before it is returned, so the canonical path only ever holds a
    /// complete body.
    pub async fn fetch_buffered(
        &self,
        url: &Url,
        headers: &[(&str, &str)],
    ) -> Result<Vec<u8>, FetchError> {
        let path = self.cache_path(url);

        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::trace!("Cache hit for {}", url);
                return Ok(bytes);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(io_error(&path, e)),
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!("Fetching {}", url);
        let body = self.transport.get(url, headers).await?;

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| io_error(&self.cache_dir, e))?;
        let part = part_path(&path);
        if let Err(e) = write_file(&part, &body).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
        tokio::fs::rename(&part, &path)
            .await
            .map_err(|e| io_error(&path, e))?;

        Ok(body)
    }

    /// Streams the body of `url` to `destination`
    ///
    /// The bytes land in `<destination>.part` first; an interrupted or
    /// failed download never leaves a file at `destination`.
    pub async fn fetch_stream(&self, url: &Url, destination: &Path) -> Result<u64, FetchError> {
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, e))?;
        }

        let part = part_path(destination);
        tracing::debug!("Downloading {} to {}", url, destination.display());

        let bytes = match self.transport.get_stream(url, &part).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                return Err(e);
            }
        };

        tokio::fs::rename(&part, destination)
            .await
            .map_err(|e| io_error(destination, e))?;
        self.streamed_bytes.fetch_add(bytes, Ordering::Relaxed);
        Ok(bytes)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            streamed_bytes: self.streamed_bytes.load(Ordering::Relaxed),
        }
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| io_error(path, e))?;
    file.write_all(bytes).await.map_err(|e| io_error(path, e))?;
    file.sync_all().await.map_err(|e| io_error(path, e))?;
    Ok(())
}
