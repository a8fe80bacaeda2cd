//! Attempt-level failures and their retriability.

use crate::config::HTTP_STATUS_TOO_MANY_REQUESTS;
use crate::utils::error_chain_message;

use super::FetchResult;

/// Why a single request attempt failed.
///
/// Only lives inside the retry loop; the caller sees the terminal
/// `FetchResult` it converts into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttemptError {
    /// Non-2xx response.
    Status(u16),
    /// The attempt exceeded its timeout.
    Timeout,
    /// Transport failure. `retriable` is false for errors a retry cannot fix
    /// (redirect loops, malformed URLs, oversized bodies, local disk errors).
    Network { cause: String, retriable: bool },
}

impl AttemptError {
    /// Transient failures: timeouts, retriable transport errors, 429, and 5xx.
    pub(crate) fn is_retriable(&self) -> bool {
        match self {
            AttemptError::Status(status) => is_retriable_status(*status),
            AttemptError::Timeout => true,
            AttemptError::Network { retriable, .. } => *retriable,
        }
    }

    pub(crate) fn permanent(cause: impl Into<String>) -> Self {
        AttemptError::Network {
            cause: cause.into(),
            retriable: false,
        }
    }
}

impl From<AttemptError> for FetchResult {
    fn from(error: AttemptError) -> Self {
        match error {
            AttemptError::Status(status) => FetchResult::HttpError(status),
            AttemptError::Timeout => FetchResult::Timeout,
            AttemptError::Network { cause, .. } => FetchResult::NetworkError(cause),
        }
    }
}

/// 429 and 5xx are worth retrying; every other status is final.
pub(crate) fn is_retriable_status(status: u16) -> bool {
    status == HTTP_STATUS_TOO_MANY_REQUESTS || (500..600).contains(&status)
}

/// Classifies a `reqwest::Error` raised while sending or reading a response.
pub(crate) fn classify_reqwest_error(error: reqwest::Error) -> AttemptError {
    if let Some(status) = error.status() {
        return AttemptError::Status(status.as_u16());
    }
    if error.is_timeout() {
        return AttemptError::Timeout;
    }
    // Redirect loops, bad URLs, and undecodable bodies fail the same way every time
    let retriable = !(error.is_redirect() || error.is_builder() || error.is_decode());
    AttemptError::Network {
        cause: error_chain_message(&error),
        retriable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_429_is_retriable() {
        assert!(AttemptError::Status(429).is_retriable());
    }

    #[test]
    fn test_5xx_is_retriable() {
        for status in [500, 502, 503, 504, 521] {
            assert!(AttemptError::Status(status).is_retriable(), "{status}");
        }
    }

    #[test]
    fn test_other_4xx_are_permanent() {
        for status in [400, 401, 403, 404, 410] {
            assert!(!AttemptError::Status(status).is_retriable(), "{status}");
        }
    }

    #[test]
    fn test_timeout_is_retriable() {
        assert!(AttemptError::Timeout.is_retriable());
    }

    #[test]
    fn test_network_retriability_follows_flag() {
        let transient = AttemptError::Network {
            cause: "connection reset".into(),
            retriable: true,
        };
        assert!(transient.is_retriable());
        assert!(!AttemptError::permanent("body too large").is_retriable());
    }

    #[test]
    fn test_conversion_into_fetch_result() {
        assert_eq!(
            FetchResult::from(AttemptError::Status(404)),
            FetchResult::HttpError(404)
        );
        assert_eq!(FetchResult::from(AttemptError::Timeout), FetchResult::Timeout);
        assert_eq!(
            FetchResult::from(AttemptError::permanent("disk full")),
            FetchResult::NetworkError("disk full".into())
        );
    }

    #[tokio::test]
    async fn test_connect_error_is_retriable() {
        // Port 9 (discard) on localhost is closed in test environments
        let err = reqwest::Client::new()
            .get("http://127.0.0.1:9/")
            .send()
            .await
            .unwrap_err();
        assert!(classify_reqwest_error(err).is_retriable());
    }

    #[tokio::test]
    async fn test_builder_error_is_permanent() {
        let err = reqwest::Client::new()
            .get("not a url")
            .send()
            .await
            .unwrap_err();
        assert!(!classify_reqwest_error(err).is_retriable());
    }
}
