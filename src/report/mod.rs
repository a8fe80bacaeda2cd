//! Run reports and failure records.
//!
//! A `RunReport` is created when a run starts, mutated only by the driver as
//! outcomes arrive, and exported when the run ends.

mod export;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::utils::sanitize_and_truncate_error_message;

pub use export::{export_failures, failure_file_name, load_failure_keys};

/// One unit that did not make it, with enough context to re-drive it.
///
/// Field names double as the CSV export columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// When the failure was recorded (UTC, RFC 3339)
    #[serde(rename = "timestamp")]
    pub timestamp_utc: DateTime<Utc>,
    /// Brand or profile the unit belongs to
    pub subject: String,
    /// Category label (`brand_media`, `product_media`, `profile`, `media`)
    pub category: String,
    /// Local file name, when the unit is a file
    pub file_name: String,
    /// Local path of the file or profile
    pub local_path: String,
    /// Storage key or source URL
    pub destination_key: String,
    /// Local file size, 0 when unknown
    #[serde(rename = "file_size_bytes")]
    pub size_bytes: u64,
    /// Content type of the unit
    pub content_type: String,
    /// Sanitized and length-capped
    pub error_message: String,
}

impl FailureRecord {
    /// Creates a record stamped now, with the message sanitized and truncated.
    pub fn new(
        subject: impl Into<String>,
        category: impl Into<String>,
        error_message: &str,
    ) -> Self {
        FailureRecord {
            timestamp_utc: Utc::now(),
            subject: subject.into(),
            category: category.into(),
            file_name: String::new(),
            local_path: String::new(),
            destination_key: String::new(),
            size_bytes: 0,
            content_type: String::new(),
            error_message: sanitize_and_truncate_error_message(error_message),
        }
    }
}

/// Counters and failures of one crawl or migration run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RunReport {
    /// Units (or subjects) the run started work on
    pub attempted: usize,
    /// Uploaded, written or fetched
    pub succeeded: usize,
    /// Already present at the destination
    pub skipped: usize,
    /// Number of failure records
    pub failed: usize,
    /// Subjects whose page yielded nothing (crawl only)
    pub empty: usize,
    /// The run was cancelled before every unit was attempted
    pub interrupted: bool,
    /// One record per failed unit, in completion order
    pub failures: Vec<FailureRecord>,
}

impl RunReport {
    /// An empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts a failure and keeps its record.
    pub fn record_failure(&mut self, failure: FailureRecord) {
        self.failed += 1;
        self.failures.push(failure);
    }

    /// Percentage of attempted units that ended uploaded or skipped.
    pub fn success_rate(&self) -> f64 {
        if self.attempted == 0 {
            return 0.0;
        }
        (self.succeeded + self.skipped) as f64 / self.attempted as f64 * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_record_sanitizes_message() {
        let record = FailureRecord::new("ACME", "brand_media", "upload\u{0}failed\u{7}");
        assert_eq!(record.error_message, "uploadfailed");
        assert_eq!(record.size_bytes, 0);
    }

    #[test]
    fn test_success_rate_counts_skips() {
        let mut report = RunReport {
            attempted: 4,
            succeeded: 2,
            skipped: 1,
            ..Default::default()
        };
        report.record_failure(FailureRecord::new("ACME", "brand_media", "boom"));
        assert_eq!(report.failed, 1);
        assert!((report.success_rate() - 75.0).abs() < f64::EPSILON);
        assert_eq!(RunReport::new().success_rate(), 0.0);
    }
}
