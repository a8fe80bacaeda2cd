//! Progress logging utilities.

use log::info;

/// Logs how many units are done out of `total` and the current rate.
///
/// # Arguments
///
/// * `start_time` - When the run started
/// * `done` - Units finished so far (any outcome)
/// * `total` - Units planned for the run
pub fn log_progress(start_time: std::time::Instant, done: usize, total: usize) {
    let elapsed_secs = start_time.elapsed().as_secs_f64();
    let rate = if elapsed_secs > 0.0 {
        done as f64 / elapsed_secs
    } else {
        0.0
    };
    info!(
        "Processed {}/{} in {:.2} seconds (~{:.2}/sec)",
        done, total, elapsed_secs, rate
    );
}
