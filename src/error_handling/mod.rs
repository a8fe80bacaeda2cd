//! Error handling and processing statistics.
//!
//! This module provides:
//! - Error type definitions (`thiserror` enums per concern)
//! - Failure categorization for statistics
//! - Retry strategy configuration
//! - Processing statistics tracking
//!
//! Failures fall into three tiers: transient (retried, then demoted),
//! permanent per unit (recorded, run continues), and permanent per run
//! (`PreconditionError`, aborts before any unit is processed).

mod categorization;
mod stats;
mod types;

// Re-export public API
pub use categorization::{
    categorize_fetch_result, categorize_sink_error, get_retry_strategy,
};
pub use stats::ProcessingStats;
pub use types::{
    CatalogInsertError, ErrorType, ExtractError, InitializationError, PlanError,
    PreconditionError, SinkError,
};
