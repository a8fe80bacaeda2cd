//! HTTP client initialization.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE};
use reqwest::ClientBuilder;

use crate::error_handling::InitializationError;

/// Builds the shared crawl client.
///
/// Browser-like `Accept` headers are set by default, and the session cookie,
/// when present, is attached to every request. Redirects are followed (reqwest
/// default of 10 hops) so `FetchedPage::final_url` reflects the landing page.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the client cannot be
/// built or the cookie is not a valid header value.
pub fn init_client(
    user_agent: &str,
    timeout: Duration,
    session_cookie: Option<&str>,
) -> Result<Arc<reqwest::Client>, InitializationError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    if let Some(cookie) = session_cookie {
        match HeaderValue::from_str(cookie) {
            Ok(mut value) => {
                value.set_sensitive(true);
                headers.insert(COOKIE, value);
            }
            Err(e) => log::warn!("Ignoring session cookie with invalid characters: {}", e),
        }
    }

    let client = ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(user_agent)
        .default_headers(headers)
        .build()?;
    Ok(Arc::new(client))
}

/// Builds the client used by the REST storage sink.
///
/// # Errors
///
/// Returns `InitializationError::HttpClientError` if the client cannot be built.
pub fn init_storage_client(timeout: Duration) -> Result<reqwest::Client, InitializationError> {
    Ok(ClientBuilder::new().timeout(timeout).build()?)
}
