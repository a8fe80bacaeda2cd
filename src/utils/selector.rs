//! CSS selector helpers for the extraction strategies.

use regex::Regex;
use scraper::Selector;

/// Parses a CSS selector that is a compile-time constant.
///
/// Used to initialize `LazyLock<Selector>` statics.
///
/// # Panics
///
/// Panics if the selector cannot be parsed, which indicates a programming error.
pub fn parse_selector_unsafe(selector_str: &str, context: &str) -> Selector {
    Selector::parse(selector_str).unwrap_or_else(|e| {
        panic!(
            "Failed to parse CSS selector '{}' in {}: {}. This is a programming error.",
            selector_str, context, e
        )
    })
}

/// Compiles a regex pattern that is a compile-time constant.
///
/// # Panics
///
/// Panics if the pattern is invalid, which indicates a programming error.
pub fn compile_regex_unsafe(pattern: &str, context: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| {
        panic!(
            "Failed to compile regex pattern '{}' in {}: {}. This is a programming error.",
            pattern, context, e
        )
    })
}
