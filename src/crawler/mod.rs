//! Polite HTTP crawling.
//!
//! `PoliteCrawler` wraps a shared `reqwest::Client` with:
//! - a minimum delay between requests (`PolitenessClock`)
//! - bounded, fixed-interval retries for transient failures
//! - an explicit timeout on every attempt
//!
//! Terminal failures are returned as `FetchResult` variants, never as errors,
//! so the caller decides whether to skip the subject.

mod politeness;
mod retry;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use reqwest::header::{HeaderMap, CONTENT_TYPE};
use tokio::io::AsyncWriteExt;
use tokio_retry::RetryIf;

use crate::config::{
    CrawlConfig, MAX_RESPONSE_BODY_SIZE, RETRY_DELAY_MS, RETRY_MAX_ATTEMPTS,
};
use crate::error_handling::{get_retry_strategy, InitializationError};
use crate::initialization::init_client;

pub use politeness::{PoliteTurn, PolitenessClock};
pub(crate) use retry::AttemptError;
use retry::classify_reqwest_error;

/// A successfully fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// Raw response body
    pub body: Vec<u8>,
    /// `Content-Type` header, or `application/octet-stream` when absent
    pub content_type: String,
    /// URL after redirects
    pub final_url: String,
}

/// Outcome of one `fetch` call, after retries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// 2xx response
    Ok(FetchedPage),
    /// Non-2xx status (final after retries for 429/5xx)
    HttpError(u16),
    /// Transport failure with its cause
    NetworkError(String),
    /// Every attempt timed out (or the last one did)
    Timeout,
}

impl FetchResult {
    /// Returns the page for `Ok`, `None` otherwise.
    pub fn page(&self) -> Option<&FetchedPage> {
        match self {
            FetchResult::Ok(page) => Some(page),
            _ => None,
        }
    }

    /// Short description of a failed outcome for reports.
    pub fn describe(&self) -> String {
        match self {
            FetchResult::Ok(page) => format!("OK ({})", page.final_url),
            FetchResult::HttpError(status) => format!("HTTP {}", status),
            FetchResult::NetworkError(cause) => format!("network error: {}", cause),
            FetchResult::Timeout => "timed out".to_string(),
        }
    }
}

/// Rate-limited, retrying HTTP fetcher.
///
/// Clones share the client and the politeness clock.
#[derive(Clone, Debug)]
pub struct PoliteCrawler {
    client: Arc<reqwest::Client>,
    clock: PolitenessClock,
    retry_attempts: usize,
    retry_delay: Duration,
    request_timeout: Duration,
    download_timeout: Duration,
    attempts_made: Arc<AtomicUsize>,
}

impl PoliteCrawler {
    /// Creates a crawler with the default retry budget and a 20s timeout.
    pub fn new(client: Arc<reqwest::Client>, clock: PolitenessClock) -> Self {
        PoliteCrawler {
            client,
            clock,
            retry_attempts: RETRY_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(RETRY_DELAY_MS),
            request_timeout: Duration::from_secs(20),
            download_timeout: Duration::from_secs(60),
            attempts_made: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Builds the page crawler described by a crawl configuration.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError` if the HTTP client cannot be built.
    pub fn from_config(config: &CrawlConfig) -> Result<Self, InitializationError> {
        let timeout = Duration::from_secs(config.timeout_seconds);
        let client = init_client(
            &config.user_agent,
            timeout,
            config.session_cookie.as_deref(),
        )?;
        let clock = PolitenessClock::with_jitter(config.min_delay, config.delay_jitter);
        Ok(PoliteCrawler::new(client, clock)
            .with_retry(config.retry_attempts, Duration::from_millis(RETRY_DELAY_MS))
            .with_timeouts(
                timeout,
                Duration::from_secs(config.download_timeout_seconds),
            ))
    }

    /// Sets the total attempt budget and the fixed delay between attempts.
    pub fn with_retry(mut self, attempts: usize, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Sets the per-attempt timeouts for pages and binary downloads.
    pub fn with_timeouts(mut self, request: Duration, download: Duration) -> Self {
        self.request_timeout = request;
        self.download_timeout = download;
        self
    }

    /// Same client and settings, separate politeness clock.
    ///
    /// Media lives on CDN hosts, so it does not need to queue behind page
    /// requests to the profile host.
    pub fn with_clock(&self, clock: PolitenessClock) -> Self {
        PoliteCrawler {
            clock,
            attempts_made: Arc::new(AtomicUsize::new(0)),
            ..self.clone()
        }
    }

    /// Total request attempts issued through this crawler and its clones.
    pub fn attempts_made(&self) -> usize {
        self.attempts_made.load(Ordering::SeqCst)
    }

    /// Fetches `url`, retrying transient failures within the attempt budget.
    pub async fn fetch(&self, url: &str, headers: &HeaderMap) -> FetchResult {
        let result = RetryIf::spawn(
            get_retry_strategy(self.retry_delay, self.retry_attempts),
            || self.fetch_once(url, headers),
            |e: &AttemptError| {
                let retry = e.is_retriable();
                if retry {
                    debug!("Retrying {} after {:?}", url, e);
                }
                retry
            },
        )
        .await;

        match result {
            Ok(page) => FetchResult::Ok(page),
            Err(e) => {
                let outcome = FetchResult::from(e);
                warn!("Fetch of {} failed: {}", url, outcome.describe());
                outcome
            }
        }
    }

    /// Streams `url` into `destination`, replacing it only after the whole body arrived.
    ///
    /// Returns `false` on any terminal failure; the partial file is removed.
    pub async fn download_binary(&self, url: &str, destination: &Path) -> bool {
        if let Some(parent) = destination.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Cannot create {}: {}", parent.display(), e);
                return false;
            }
        }
        let part = part_path(destination);

        let result = RetryIf::spawn(
            get_retry_strategy(self.retry_delay, self.retry_attempts),
            || self.download_once(url, &part),
            |e: &AttemptError| e.is_retriable(),
        )
        .await;

        match result {
            Ok(bytes) => match tokio::fs::rename(&part, destination).await {
                Ok(()) => {
                    debug!("Downloaded {} ({} bytes) to {}", url, bytes, destination.display());
                    true
                }
                Err(e) => {
                    warn!("Cannot move download into {}: {}", destination.display(), e);
                    let _ = tokio::fs::remove_file(&part).await;
                    false
                }
            },
            Err(e) => {
                let _ = tokio::fs::remove_file(&part).await;
                warn!(
                    "Download of {} failed: {}",
                    url,
                    FetchResult::from(e).describe()
                );
                false
            }
        }
    }

    async fn fetch_once(&self, url: &str, headers: &HeaderMap) -> Result<FetchedPage, AttemptError> {
        let _turn = self.clock.wait_turn().await;
        self.attempts_made.fetch_add(1, Ordering::SeqCst);

        let request = self.client.get(url).headers(headers.clone());
        let attempt = async {
            let response = request.send().await.map_err(classify_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(AttemptError::Status(status.as_u16()));
            }
            if response
                .content_length()
                .is_some_and(|len| len > MAX_RESPONSE_BODY_SIZE as u64)
            {
                return Err(AttemptError::permanent("response body exceeds size limit"));
            }
            let final_url = response.url().to_string();
            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("application/octet-stream")
                .to_string();
            let body = response.bytes().await.map_err(classify_reqwest_error)?;
            if body.len() > MAX_RESPONSE_BODY_SIZE {
                return Err(AttemptError::permanent("response body exceeds size limit"));
            }
            Ok(FetchedPage {
                body: body.to_vec(),
                content_type,
                final_url,
            })
        };

        tokio::time::timeout(self.request_timeout, attempt)
            .await
            .unwrap_or(Err(AttemptError::Timeout))
    }

    async fn download_once(&self, url: &str, part: &Path) -> Result<u64, AttemptError> {
        let _turn = self.clock.wait_turn().await;
        self.attempts_made.fetch_add(1, Ordering::SeqCst);

        let request = self.client.get(url).timeout(self.download_timeout);
        let attempt = async {
            let mut response = request.send().await.map_err(classify_reqwest_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(AttemptError::Status(status.as_u16()));
            }
            let mut file = tokio::fs::File::create(part)
                .await
                .map_err(|e| AttemptError::permanent(format!("create {}: {}", part.display(), e)))?;
            let mut written = 0u64;
            while let Some(chunk) = response.chunk().await.map_err(classify_reqwest_error)? {
                file.write_all(&chunk)
                    .await
                    .map_err(|e| AttemptError::permanent(format!("write {}: {}", part.display(), e)))?;
                written += chunk.len() as u64;
            }
            file.flush()
                .await
                .map_err(|e| AttemptError::permanent(format!("flush {}: {}", part.display(), e)))?;
            Ok(written)
        };

        tokio::time::timeout(self.download_timeout, attempt)
            .await
            .unwrap_or(Err(AttemptError::Timeout))
    }
}

fn part_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_part_path_appends_suffix() {
        assert_eq!(
            part_path(Path::new("/tmp/ACME/images/1.jpg")),
            PathBuf::from("/tmp/ACME/images/1.jpg.part")
        );
    }

    #[test]
    fn test_describe_variants() {
        assert_eq!(FetchResult::HttpError(404).describe(), "HTTP 404");
        assert_eq!(FetchResult::Timeout.describe(), "timed out");
        assert!(FetchResult::NetworkError("refused".into())
            .describe()
            .contains("refused"));
    }

    #[test]
    fn test_page_accessor() {
        let page = FetchedPage {
            body: b"<html></html>".to_vec(),
            content_type: "text/html".into(),
            final_url: "https://example.com/".into(),
        };
        assert_eq!(FetchResult::Ok(page.clone()).page(), Some(&page));
        assert_eq!(FetchResult::Timeout.page(), None);
    }
}
