//! Executing a migration plan against a sink.

use std::future::{ready, Future};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use log::{debug, info, warn};
use tokio_retry::RetryIf;
use tokio_util::sync::CancellationToken;

use super::plan::MigrationUnit;
use crate::app::log_progress;
use crate::config::{
    LOGGING_INTERVAL, MAX_PARALLEL_WORKERS, UPLOAD_MAX_ATTEMPTS, UPLOAD_RETRY_DELAY_MS,
};
use crate::error_handling::{
    categorize_sink_error, get_retry_strategy, ErrorType, ProcessingStats, SinkError,
};
use crate::report::{FailureRecord, RunReport};
use crate::sink::StorageSink;

/// Tuning for `Migrator::execute`.
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Concurrent units (1 = sequential); clamped to `1..=MAX_PARALLEL_WORKERS`
    pub workers: usize,
    /// Total attempts per sink call
    pub upload_attempts: usize,
    /// Fixed delay between attempts
    pub retry_delay: Duration,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        ExecuteOptions {
            workers: 1,
            upload_attempts: UPLOAD_MAX_ATTEMPTS,
            retry_delay: Duration::from_millis(UPLOAD_RETRY_DELAY_MS),
        }
    }
}

/// How one unit ended.
#[derive(Debug, Clone, PartialEq)]
pub enum UnitOutcome {
    /// The object was stored under its key
    Uploaded,
    /// The key already held an object
    Skipped,
    /// The unit could not be moved
    Failed(FailureRecord),
    /// Cancellation fired before the upload began; nothing was changed
    Cancelled,
}

/// Uploads planned units, skipping keys that already exist.
pub struct Migrator {
    sink: Arc<dyn StorageSink>,
    options: ExecuteOptions,
    stats: Arc<ProcessingStats>,
}

impl Migrator {
    /// A migrator uploading into `sink`.
    pub fn new(sink: Arc<dyn StorageSink>, options: ExecuteOptions) -> Self {
        Migrator {
            sink,
            options,
            stats: Arc::new(ProcessingStats::new()),
        }
    }

    /// Failure categories tallied so far.
    pub fn stats(&self) -> &Arc<ProcessingStats> {
        &self.stats
    }

    /// Runs every unit and returns the report.
    ///
    /// Units run one at a time, or `workers` at a time in parallel mode.
    /// Once `cancel` fires no further unit starts and no further upload
    /// begins; uploads already under way finish. Units stopped that way are
    /// not counted as attempted and the report is marked interrupted. A
    /// failing unit never stops the run.
    pub async fn execute(&self, units: &[MigrationUnit], cancel: &CancellationToken) -> RunReport {
        let workers = self.options.workers.clamp(1, MAX_PARALLEL_WORKERS);
        let total = units.len();
        let start_time = Instant::now();
        let mut report = RunReport::new();
        info!("Migrating {} units with {} worker(s)", total, workers);

        let mut outcomes = stream::iter(units)
            .take_while(|_| ready(!cancel.is_cancelled()))
            .map(|unit| self.migrate_unit(unit, cancel))
            .buffer_unordered(workers);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                UnitOutcome::Uploaded => report.succeeded += 1,
                UnitOutcome::Skipped => report.skipped += 1,
                UnitOutcome::Failed(failure) => report.record_failure(failure),
                UnitOutcome::Cancelled => continue,
            }
            report.attempted += 1;
            if report.attempted % LOGGING_INTERVAL == 0 {
                log_progress(start_time, report.attempted, total);
            }
        }

        if report.attempted < total {
            warn!(
                "Migration interrupted: {} of {} units not attempted",
                total - report.attempted,
                total
            );
            report.interrupted = true;
        }
        report
    }

    /// Moves one unit: `exists` → skip, otherwise read and `put`.
    ///
    /// Returns `Cancelled` without uploading if `cancel` has fired by the
    /// time the upload would begin.
    pub async fn migrate_unit(
        &self,
        unit: &MigrationUnit,
        cancel: &CancellationToken,
    ) -> UnitOutcome {
        let key = unit.destination_key.as_str();
        match self.with_retry(|| self.sink.exists(key)).await {
            Ok(true) => {
                debug!("Skipping (exists): {}", key);
                return UnitOutcome::Skipped;
            }
            Ok(false) => {}
            Err(e) => return self.fail(unit, categorize_sink_error(&e), &e.to_string()),
        }

        let bytes = match tokio::fs::read(&unit.local_path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                let message = format!("cannot read {}: {}", unit.local_path.display(), e);
                return self.fail(unit, ErrorType::UploadReadFailed, &message);
            }
        };

        if cancel.is_cancelled() {
            debug!("Not uploading (cancelled): {}", key);
            return UnitOutcome::Cancelled;
        }
        let result = self
            .with_retry(|| self.sink.put(key, bytes.clone(), &unit.mime_type))
            .await;
        match result {
            Ok(()) => {
                debug!("Uploaded: {}", key);
                UnitOutcome::Uploaded
            }
            Err(SinkError::AlreadyExists(_)) => {
                debug!("Skipping (exists): {}", key);
                UnitOutcome::Skipped
            }
            Err(e) => self.fail(unit, categorize_sink_error(&e), &e.to_string()),
        }
    }

    async fn with_retry<T, A, F>(&self, action: A) -> Result<T, SinkError>
    where
        A: FnMut() -> F,
        F: Future<Output = Result<T, SinkError>>,
    {
        let strategy =
            get_retry_strategy(self.options.retry_delay, self.options.upload_attempts);
        RetryIf::spawn(strategy, action, SinkError::is_transient).await
    }

    fn fail(&self, unit: &MigrationUnit, error_type: ErrorType, message: &str) -> UnitOutcome {
        warn!("Failed: {}: {}", unit.destination_key, message);
        self.stats.increment_error(error_type);
        UnitOutcome::Failed(failure_for_unit(unit, message))
    }
}

/// Builds the failure record for a unit.
pub fn failure_for_unit(unit: &MigrationUnit, message: &str) -> FailureRecord {
    FailureRecord {
        file_name: unit.file_name(),
        local_path: unit.local_path.display().to_string(),
        destination_key: unit.destination_key.clone(),
        size_bytes: unit.size_bytes,
        content_type: unit.mime_type.clone(),
        ..FailureRecord::new(&unit.subject, unit.category.label(), message)
    }
}

/// Runs `units` sequentially with default options and no cancellation.
pub async fn execute(units: &[MigrationUnit], sink: Arc<dyn StorageSink>) -> RunReport {
    Migrator::new(sink, ExecuteOptions::default())
        .execute(units, &CancellationToken::new())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migrate::MediaCategory;
    use crate::sink::MemorySink;
    use std::path::PathBuf;

    fn unit(dir: &std::path::Path, name: &str) -> MigrationUnit {
        let local_path = dir.join(name);
        std::fs::write(&local_path, b"bytes").unwrap();
        MigrationUnit {
            subject: "ACME".into(),
            category: MediaCategory::BrandMedia,
            product: None,
            local_path,
            destination_key: format!("ACME/scrolling_brand_media/{}", name),
            size_bytes: 5,
            mime_type: "image/jpeg".into(),
        }
    }

    #[tokio::test]
    async fn test_second_run_skips_everything() {
        let dir = tempfile::TempDir::new().unwrap();
        let units = vec![unit(dir.path(), "a.jpg"), unit(dir.path(), "b.jpg")];
        let sink = Arc::new(MemorySink::new());

        let first = execute(&units, sink.clone()).await;
        assert_eq!((first.succeeded, first.skipped, first.failed), (2, 0, 0));
        let second = execute(&units, sink.clone()).await;
        assert_eq!((second.succeeded, second.skipped, second.failed), (0, 2, 0));
        assert_eq!(sink.put_count(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_file_is_a_failure_record() {
        let sink = Arc::new(MemorySink::new());
        let missing = MigrationUnit {
            subject: "ACME".into(),
            category: MediaCategory::ProductMedia,
            product: Some("Dress".into()),
            local_path: PathBuf::from("/nonexistent/dress.jpg"),
            destination_key: "ACME/scrolling_product_media/Dress/dress.jpg".into(),
            size_bytes: 10,
            mime_type: "image/jpeg".into(),
        };
        let migrator = Migrator::new(sink, ExecuteOptions::default());
        let outcome = migrator
            .migrate_unit(&missing, &CancellationToken::new())
            .await;
        let UnitOutcome::Failed(record) = outcome else {
            panic!("expected a failure");
        };
        assert_eq!(record.category, "product_media");
        assert_eq!(record.file_name, "dress.jpg");
        assert_eq!(record.size_bytes, 10);
        assert!(record.error_message.contains("cannot read"));
        assert_eq!(
            migrator.stats().get_error_count(ErrorType::UploadReadFailed),
            1
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start_attempts_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let units = vec![unit(dir.path(), "a.jpg")];
        let sink = Arc::new(MemorySink::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let report = Migrator::new(sink.clone(), ExecuteOptions::default())
            .execute(&units, &cancel)
            .await;
        assert_eq!(report.attempted, 0);
        assert!(report.interrupted);
        assert_eq!(sink.put_count(), 0);
    }
}
