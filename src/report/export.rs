//! CSV export of failure records, and reading them back for re-drive.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use csv::Writer;
use serde::Deserialize;

use super::RunReport;

/// `failed_<kind>_<YYYYmmdd_HHMMSS>.csv`
pub fn failure_file_name(kind: &str, at: DateTime<Local>) -> String {
    format!("failed_{}_{}.csv", kind, at.format("%Y%m%d_%H%M%S"))
}

/// Writes the report's failures to a timestamped CSV in `dir`.
///
/// # Returns
///
/// The path written, or `None` when the report has no failures (no file is
/// created in that case).
pub fn export_failures(report: &RunReport, dir: &Path, kind: &str) -> Result<Option<PathBuf>> {
    if report.failures.is_empty() {
        return Ok(None);
    }
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create report directory: {}", dir.display()))?;
    let path = dir.join(failure_file_name(kind, Local::now()));

    let mut writer = Writer::from_path(&path)
        .with_context(|| format!("Failed to create failure export: {}", path.display()))?;
    for failure in &report.failures {
        writer
            .serialize(failure)
            .context("Failed to write failure record")?;
    }
    writer.flush().context("Failed to flush failure export")?;
    Ok(Some(path))
}

#[derive(Debug, Deserialize)]
struct FailureKeyRow {
    destination_key: String,
}

/// Reads the `destination_key` column of an earlier failure export.
///
/// # Errors
///
/// Fails if the file cannot be opened or a row has no `destination_key`.
pub fn load_failure_keys(path: &Path) -> Result<HashSet<String>, csv::Error> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut keys = HashSet::new();
    for row in reader.deserialize::<FailureKeyRow>() {
        let row = row?;
        if !row.destination_key.is_empty() {
            keys.insert(row.destination_key);
        }
    }
    Ok(keys)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FailureRecord;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_failure_file_name_format() {
        let at = Local.with_ymd_and_hms(2025, 3, 9, 14, 5, 7).unwrap();
        assert_eq!(
            failure_file_name("uploads", at),
            "failed_uploads_20250309_140507.csv"
        );
    }

    #[test]
    fn test_no_failures_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let written = export_failures(&RunReport::new(), dir.path(), "uploads").unwrap();
        assert!(written.is_none());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_export_then_load_keys() {
        let dir = TempDir::new().unwrap();
        let mut report = RunReport::new();
        let mut failure = FailureRecord::new("ACME", "brand_media", "HTTP 503, \"busy\"");
        failure.file_name = "img1.jpg".into();
        failure.destination_key = "ACME/scrolling_brand_media/img1.jpg".into();
        failure.size_bytes = 1024;
        failure.content_type = "image/jpeg".into();
        report.record_failure(failure);

        let path = export_failures(&report, dir.path(), "uploads")
            .unwrap()
            .expect("one failure exported");
        let text = std::fs::read_to_string(&path).unwrap();
        let header = text.lines().next().unwrap();
        assert_eq!(
            header,
            "timestamp,subject,category,file_name,local_path,destination_key,file_size_bytes,content_type,error_message"
        );

        let keys = load_failure_keys(&path).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.contains("ACME/scrolling_brand_media/img1.jpg"));
    }
}
