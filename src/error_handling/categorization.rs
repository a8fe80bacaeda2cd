//! Error categorization and retry strategy.
//!
//! This module provides functions to categorize failures and configure retry strategies.

use std::time::Duration;
use tokio_retry::strategy::FixedInterval;

use super::types::{ErrorType, SinkError};
use crate::config::HTTP_STATUS_TOO_MANY_REQUESTS;
use crate::crawler::FetchResult;

/// Creates a fixed-interval retry strategy bounded to `max_attempts` total attempts.
///
/// `tokio_retry` makes one initial attempt and then one more per yielded
/// delay, so the iterator yields `max_attempts - 1` delays. A budget of 0 or 1
/// means a single attempt with no retries.
pub fn get_retry_strategy(delay: Duration, max_attempts: usize) -> impl Iterator<Item = Duration> {
    FixedInterval::new(delay).take(max_attempts.saturating_sub(1))
}

/// Maps a terminal fetch outcome to its statistics category.
///
/// Returns `None` for `FetchResult::Ok`.
pub fn categorize_fetch_result(result: &FetchResult) -> Option<ErrorType> {
    match result {
        FetchResult::Ok(_) => None,
        FetchResult::HttpError(status) if *status == HTTP_STATUS_TOO_MANY_REQUESTS => {
            Some(ErrorType::FetchTooManyRequests)
        }
        FetchResult::HttpError(status) if (500..600).contains(status) => {
            Some(ErrorType::FetchServerError)
        }
        FetchResult::HttpError(_) => Some(ErrorType::FetchClientError),
        FetchResult::NetworkError(_) => Some(ErrorType::FetchNetworkError),
        FetchResult::Timeout => Some(ErrorType::FetchTimeout),
    }
}

/// Maps a terminal sink error to its statistics category.
pub fn categorize_sink_error(error: &SinkError) -> ErrorType {
    match error {
        SinkError::Transient(_) | SinkError::Unavailable(_) => {
            ErrorType::UploadTransientExhausted
        }
        SinkError::Permanent(_) | SinkError::AlreadyExists(_) => ErrorType::UploadRejected,
    }
}
