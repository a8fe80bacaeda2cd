//! Statistics printing.

use log::info;
use strum::IntoEnumIterator;

use crate::error_handling::{ErrorType, ProcessingStats};
use crate::report::RunReport;

/// Prints per-category failure counts to the log.
pub fn print_error_statistics(error_stats: &ProcessingStats) {
    let total_errors = error_stats.total_errors();
    if total_errors == 0 {
        return;
    }
    info!("Error Counts ({} total):", total_errors);
    for error_type in ErrorType::iter() {
        let count = error_stats.get_error_count(error_type);
        if count > 0 {
            info!("   {}: {}", error_type.as_str(), count);
        }
    }
}

/// Logs the one-line run summary.
///
/// Works with both plain and JSON log formats.
pub fn print_run_summary(kind: &str, report: &RunReport, elapsed_seconds: f64) {
    info!(
        "✅ {} finished: {} attempted ({} succeeded, {} skipped, {} failed, {} empty) in {:.1}s, {:.2}% complete{}",
        kind,
        report.attempted,
        report.succeeded,
        report.skipped,
        report.failed,
        report.empty,
        elapsed_seconds,
        report.success_rate(),
        if report.interrupted { " (interrupted)" } else { "" }
    );
}
