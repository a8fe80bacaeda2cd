//! Run-loop helpers shared by the drivers.
//!
//! This module provides progress logging, Ctrl-C handling, and end-of-run
//! statistics printing.

pub mod logging;
pub mod shutdown;
pub mod statistics;

// Re-export public API
pub use logging::log_progress;
pub use shutdown::{cancel_on_ctrl_c, shutdown_gracefully};
pub use statistics::{print_error_statistics, print_run_summary};
