//! Application configuration and constants.
//!
//! This module provides:
//! - Configuration constants (delays, timeouts, retry budgets, storage layout)
//! - Library configuration structs for the crawl and migration drivers
//! - CLI option types and parsing

mod constants;
mod types;

// Re-export all constants
pub use constants::*;
pub use types::{
    CatalogArgs, Command, CrawlArgs, CrawlConfig, IndexArgs, LogFormat, LogLevel, MigrateArgs,
    MigrateConfig, Opt, SinkConfig, SinkKind, StorageArgs, SubjectArgs, SubjectSource,
};
