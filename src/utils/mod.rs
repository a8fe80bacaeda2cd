//! Shared utilities.
//!
//! - Error message sanitization and truncation
//! - Static CSS selector and regex construction

pub mod sanitize;
mod selector;

pub use sanitize::{error_chain_message, sanitize_and_truncate_error_message};
pub use selector::{compile_regex_unsafe, parse_selector_unsafe};
