//! Error message cleanup for reports and logs.
//!
//! Messages end up in CSV exports that operators open in spreadsheets, so
//! control characters are removed and length is capped.

use std::error::Error as StdError;

use crate::config::MAX_ERROR_MESSAGE_LENGTH;

/// Removes control characters other than newline, tab, and carriage return.
pub fn sanitize_error_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\t' | '\r'))
        .collect()
}

/// Sanitizes a message and truncates it to `MAX_ERROR_MESSAGE_LENGTH` characters.
///
/// Truncation counts characters, not bytes, so multi-byte text is never split.
pub fn sanitize_and_truncate_error_message(message: &str) -> String {
    let sanitized = sanitize_error_message(message);
    let char_count = sanitized.chars().count();

    if char_count > MAX_ERROR_MESSAGE_LENGTH {
        let keep = MAX_ERROR_MESSAGE_LENGTH.saturating_sub(50);
        let truncated: String = sanitized.chars().take(keep).collect();
        format!(
            "{}... (truncated, original length: {} chars)",
            truncated, char_count
        )
    } else {
        sanitized
    }
}

/// Joins an error and all of its sources with `": "`.
///
/// reqwest hides the interesting part (connection refused, DNS failure) in
/// the source chain, so `to_string()` alone is not enough for a report.
pub fn error_chain_message(error: &(dyn StdError + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    sanitize_and_truncate_error_message(&message)
}
