//! brand_harvest library: polite brand-page crawling and idempotent media migration
//!
//! This library fetches brand profile pages under a minimum inter-request
//! delay, extracts media and metadata with an ordered list of strategies, and
//! moves a local content tree into a storage sink so that re-running a
//! migration never duplicates an object.
//!
//! # Example
//!
//! ```no_run
//! use brand_harvest::{run_migration, MigrateConfig, SinkConfig};
//! use std::path::PathBuf;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MigrateConfig {
//!     source_dir: PathBuf::from("downloads"),
//!     sink: SinkConfig::Local { root: PathBuf::from("bucket") },
//!     ..Default::default()
//! };
//!
//! let output = run_migration(config, CancellationToken::new()).await?;
//! println!("{} uploaded, {} skipped, {} failed",
//!          output.report.succeeded, output.report.skipped, output.report.failed);
//! # Ok(())
//! # }
//! ```
//!
//! # Requirements
//!
//! This library requires a Tokio runtime. Use `#[tokio::main]` in your application
//! or ensure you're calling library functions within an async context.

#![warn(missing_docs)]

mod app;
pub mod config;
pub mod crawler;
mod error_handling;
pub mod extract;
pub mod initialization;
pub mod migrate;
pub mod report;
pub mod sink;
pub mod subject;
mod utils;

// Re-export public API
pub use app::{cancel_on_ctrl_c, shutdown_gracefully};
pub use config::{
    CrawlConfig, LogFormat, LogLevel, MigrateConfig, SinkConfig, SubjectSource,
};
pub use crawler::{FetchResult, FetchedPage, PoliteCrawler, PolitenessClock};
pub use error_handling::{
    CatalogInsertError, ErrorType, ExtractError, InitializationError, PlanError, PreconditionError,
    ProcessingStats, SinkError,
};
pub use extract::{Completeness, ExtractedRecord, MediaItem, MediaKind, MultiStrategyExtractor};
pub use migrate::{
    build_catalog, build_indexes, execute, plan_migration, sanitize_key_component,
    MigrationPlan, MigrationUnit,
};
pub use report::{FailureRecord, RunReport};
pub use run::{run_catalog, run_crawl, run_index, run_migration, ProfileDocument, RunOutput};
pub use sink::{open_sink, LocalDirSink, MemorySink, ObjectEntry, RestSink, StorageSink};
pub use subject::{handle_candidates, Subject};

// Internal run module (drivers wiring the components together)
mod run {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::time::Instant;

    use anyhow::{Context, Result};
    use chrono::{DateTime, Utc};
    use log::{debug, info, warn};
    use reqwest::header::HeaderMap;
    use serde::Serialize;
    use tokio_util::sync::CancellationToken;

    use crate::app::{log_progress, print_error_statistics, print_run_summary};
    use crate::config::{
        CrawlConfig, MigrateConfig, SinkConfig, SubjectSource, LOGGING_INTERVAL,
    };
    use crate::crawler::{FetchResult, FetchedPage, PoliteCrawler, PolitenessClock};
    use crate::error_handling::{
        categorize_fetch_result, ErrorType, PlanError, PreconditionError, ProcessingStats,
    };
    use crate::extract::{media_file_name, ExtractedRecord, MediaKind, MultiStrategyExtractor};
    use crate::migrate::{
        build_catalog, build_indexes, insert_catalog, plan_migration_with, ExecuteOptions,
        Migrator, PlanOptions,
    };
    use crate::report::{export_failures, load_failure_keys, FailureRecord, RunReport};
    use crate::sink::open_sink;
    use crate::subject::{load_subjects, Subject};

    /// Results of one driver run.
    #[derive(Debug, Clone)]
    pub struct RunOutput {
        /// Short run kind (`crawl`, `uploads`, `index`, `catalog`)
        pub kind: &'static str,
        /// Counters and failure records
        pub report: RunReport,
        /// Failure export written at run end, if there were failures
        pub failures_path: Option<PathBuf>,
        /// Elapsed time in seconds
        pub elapsed_seconds: f64,
    }

    /// Contents of `<output_dir>/<subject>/profile.json`.
    #[derive(Debug, Clone, Serialize)]
    pub struct ProfileDocument {
        /// Subject display name
        pub subject: String,
        /// Handle whose page was fetched
        pub handle: String,
        /// Page URL after redirects
        pub source_url: String,
        /// When the page was fetched
        pub fetched_at: DateTime<Utc>,
        /// Strategy that produced the record
        pub strategy: Option<&'static str>,
        /// Extracted media and metadata
        pub record: ExtractedRecord,
    }

    /// Crawls every subject's profile page and saves what was extracted.
    ///
    /// For each subject, the handle candidates are tried against
    /// `profile_url_template` until one fetch returns a page. The page goes
    /// through the default extraction strategies and the result is written to
    /// `<output_dir>/<subject>/profile.json`; media is then downloaded into
    /// `images/` and `videos/` next to it. Files already on disk are not
    /// downloaded again.
    ///
    /// A subject whose page cannot be fetched becomes a `profile` failure
    /// record, one whose page yields nothing counts as `empty`, and a media
    /// download that fails becomes a `media` failure record. None of these
    /// stop the run.
    ///
    /// # Errors
    ///
    /// Fails before any request if the subject list cannot be loaded or the
    /// HTTP client cannot be built.
    pub async fn run_crawl(config: CrawlConfig, cancel: CancellationToken) -> Result<RunOutput> {
        let start_time = Instant::now();
        let subjects = load_subjects(&config.subjects)
            .await
            .context("Failed to load subjects")?;
        let crawler =
            PoliteCrawler::from_config(&config).context("Failed to initialize HTTP client")?;
        let media_crawler =
            crawler.with_clock(PolitenessClock::with_jitter(config.min_delay, config.delay_jitter));
        let extractor = MultiStrategyExtractor::with_default_strategies(&config.media_hosts);
        let stats = ProcessingStats::new();
        let headers = HeaderMap::new();

        info!(
            "Crawling {} subject(s) into {} (strategies: {})",
            subjects.len(),
            config.output_dir.display(),
            extractor.strategy_names().join(", ")
        );

        let mut report = RunReport::new();
        for subject in &subjects {
            if cancel.is_cancelled() {
                warn!(
                    "Crawl interrupted: {} of {} subjects not attempted",
                    subjects.len() - report.attempted,
                    subjects.len()
                );
                report.interrupted = true;
                break;
            }
            report.attempted += 1;
            let Some(folder) = subject.local_folder() else {
                warn!("No usable folder name for subject '{}'", subject.display_name);
                stats.increment_error(ErrorType::ProfileWriteFailed);
                report.record_failure(FailureRecord::new(
                    &subject.display_name,
                    "profile",
                    "subject name does not yield a folder below the output directory",
                ));
                continue;
            };
            let subject_dir = config.output_dir.join(folder);

            let Some((handle, page)) =
                fetch_profile(&crawler, &config.profile_url_template, subject, &headers, &stats, &mut report)
                    .await
            else {
                continue;
            };

            let (record, strategy) = extractor.extract_with_source(&page.body, &page.content_type);
            if record.is_empty() {
                info!("Nothing extracted for {} ({})", subject.display_name, page.final_url);
                stats.increment_error(ErrorType::ExtractionEmpty);
                report.empty += 1;
                continue;
            }

            let document = ProfileDocument {
                subject: subject.display_name.clone(),
                handle,
                source_url: page.final_url.clone(),
                fetched_at: Utc::now(),
                strategy,
                record,
            };
            if let Err(e) = write_profile(&subject_dir, &document).await {
                warn!("Cannot save profile of {}: {:#}", subject.display_name, e);
                stats.increment_error(ErrorType::ProfileWriteFailed);
                let mut failure =
                    FailureRecord::new(&subject.display_name, "profile", &format!("{:#}", e));
                failure.local_path = subject_dir.join("profile.json").display().to_string();
                failure.destination_key = page.final_url.clone();
                failure.content_type = "application/json".to_string();
                report.record_failure(failure);
                continue;
            }

            let media_failures = if config.download_media {
                download_media(&media_crawler, &subject.display_name, &subject_dir, &document.record, &cancel)
                    .await
            } else {
                Vec::new()
            };
            if media_failures.is_empty() {
                report.succeeded += 1;
            }
            for failure in media_failures {
                stats.increment_error(ErrorType::MediaDownloadFailed);
                report.record_failure(failure);
            }

            if report.attempted % LOGGING_INTERVAL == 0 {
                log_progress(start_time, report.attempted, subjects.len());
            }
        }

        let elapsed_seconds = start_time.elapsed().as_secs_f64();
        debug!("Crawl issued {} page request(s)", crawler.attempts_made());
        print_error_statistics(&stats);
        print_run_summary("Crawl", &report, elapsed_seconds);
        let failures_path = export_report(&report, &config.report_dir, "crawl");
        Ok(RunOutput {
            kind: "crawl",
            report,
            failures_path,
            elapsed_seconds,
        })
    }

    /// Tries each handle candidate until a page is fetched.
    ///
    /// On failure the last outcome is recorded against the subject.
    async fn fetch_profile(
        crawler: &PoliteCrawler,
        url_template: &str,
        subject: &Subject,
        headers: &HeaderMap,
        stats: &ProcessingStats,
        report: &mut RunReport,
    ) -> Option<(String, FetchedPage)> {
        let mut last: Option<(String, FetchResult)> = None;
        for handle in subject.handle_candidates() {
            let url = url_template.replace("{handle}", &handle);
            debug!("Fetching {} for {}", url, subject.display_name);
            match crawler.fetch(&url, headers).await {
                FetchResult::Ok(page) => return Some((handle, page)),
                outcome => last = Some((url, outcome)),
            }
        }

        let (url, outcome) = last.unwrap_or_else(|| {
            (
                String::new(),
                FetchResult::NetworkError("no handle candidates".to_string()),
            )
        });
        warn!("No profile page for {}: {}", subject.display_name, outcome.describe());
        if let Some(error_type) = categorize_fetch_result(&outcome) {
            stats.increment_error(error_type);
        }
        let mut failure = FailureRecord::new(&subject.display_name, "profile", &outcome.describe());
        failure.destination_key = url;
        report.record_failure(failure);
        None
    }

    async fn write_profile(dir: &Path, document: &ProfileDocument) -> Result<()> {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        let body =
            serde_json::to_vec_pretty(document).context("Failed to serialize profile")?;
        let path = dir.join("profile.json");
        tokio::fs::write(&path, body)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(
            "Saved {} ({} media item(s), {:?})",
            path.display(),
            document.record.media_items().len(),
            document.record.completeness()
        );
        Ok(())
    }

    /// Downloads a record's media into `images/` and `videos/` under `dir`.
    ///
    /// Returns one failure record per item that could not be downloaded.
    async fn download_media(
        crawler: &PoliteCrawler,
        subject: &str,
        dir: &Path,
        record: &ExtractedRecord,
        cancel: &CancellationToken,
    ) -> Vec<FailureRecord> {
        let mut failures = Vec::new();
        let mut counters: HashMap<MediaKind, usize> = HashMap::new();
        for item in record.media_items() {
            if cancel.is_cancelled() {
                break;
            }
            let index = counters.entry(item.kind).or_default();
            let file_name = media_file_name(item, *index);
            *index += 1;
            let folder = match item.kind {
                MediaKind::Image => "images",
                MediaKind::Video => "videos",
            };
            let destination = dir.join(folder).join(&file_name);
            if tokio::fs::try_exists(&destination).await.unwrap_or(false) {
                debug!("Already downloaded: {}", destination.display());
                continue;
            }
            if !crawler.download_binary(&item.url, &destination).await {
                let mut failure = FailureRecord::new(subject, "media", "download failed");
                failure.file_name = file_name;
                failure.local_path = destination.display().to_string();
                failure.destination_key = item.url.clone();
                failure.content_type = match item.kind {
                    MediaKind::Image => "image/*".to_string(),
                    MediaKind::Video => "video/*".to_string(),
                };
                failures.push(failure);
            }
        }
        failures
    }

    /// Plans the local tree and uploads every unit not already in the sink.
    ///
    /// With `retry_failures` set, only the destination keys listed in that
    /// earlier failure export are planned.
    ///
    /// # Errors
    ///
    /// Fails before any upload if the subject list, the failure list or the
    /// plan cannot be built (missing source directory, key collision), or if
    /// the sink is unavailable.
    pub async fn run_migration(config: MigrateConfig, cancel: CancellationToken) -> Result<RunOutput> {
        let start_time = Instant::now();
        let subjects = load_subjects(&config.subjects)
            .await
            .context("Failed to load subjects")?;
        let only_keys = match &config.retry_failures {
            Some(path) => {
                let keys = load_failure_keys(path).map_err(|source| {
                    PreconditionError::from(PlanError::FailureList {
                        path: path.clone(),
                        source,
                    })
                })?;
                info!("Re-driving {} key(s) from {}", keys.len(), path.display());
                Some(keys)
            }
            None => None,
        };

        let options = PlanOptions {
            subjects: subjects.iter().map(Subject::folder_query).collect(),
            max_subjects: config.subjects.max_subjects,
            only_keys,
        };
        let plan = plan_migration_with(&config.source_dir, &options)
            .map_err(PreconditionError::from)
            .context("Failed to plan migration")?;
        for name in &plan.unresolved_subjects {
            warn!("No brand folder for subject '{}'", name);
        }

        let sink = open_sink(&config.sink)
            .await
            .context("Failed to open storage sink")?;

        let migrator = Migrator::new(
            sink,
            ExecuteOptions {
                workers: config.workers,
                upload_attempts: config.upload_attempts,
                retry_delay: config.upload_retry_delay,
            },
        );
        for path in &plan.rejected {
            debug!("Rejected at planning: {}", path.display());
            migrator.stats().increment_error(ErrorType::PlanRejected);
        }
        let report = migrator.execute(&plan.units, &cancel).await;

        let elapsed_seconds = start_time.elapsed().as_secs_f64();
        print_error_statistics(migrator.stats());
        print_run_summary("Migration", &report, elapsed_seconds);
        let failures_path = export_report(&report, &config.report_dir, "uploads");
        Ok(RunOutput {
            kind: "uploads",
            report,
            failures_path,
            elapsed_seconds,
        })
    }

    /// Writes `index.json` manifests for the subjects' media folders in the sink.
    ///
    /// An empty subject source indexes every brand folder in the sink.
    /// Folders that could not be indexed are exported to `report_dir`.
    ///
    /// # Errors
    ///
    /// Fails if the subject list cannot be loaded, the sink is unavailable, or
    /// the sink root cannot be listed.
    pub async fn run_index(
        subjects: &SubjectSource,
        sink: &SinkConfig,
        report_dir: &Path,
    ) -> Result<RunOutput> {
        let start_time = Instant::now();
        let brands: Vec<String> = load_subjects(subjects)
            .await
            .context("Failed to load subjects")?
            .iter()
            .map(Subject::folder_query)
            .collect();
        let sink = open_sink(sink).await.context("Failed to open storage sink")?;
        let report = build_indexes(sink.as_ref(), &brands)
            .await
            .context("Failed to list storage folders")?;

        let elapsed_seconds = start_time.elapsed().as_secs_f64();
        print_run_summary("Index", &report, elapsed_seconds);
        let failures_path = export_report(&report, report_dir, "index");
        Ok(RunOutput {
            kind: "index",
            report,
            failures_path,
            elapsed_seconds,
        })
    }

    /// Inserts one product row per product folder of the local tree into `table`.
    ///
    /// Rows the table already holds count as skipped. A rejected batch ends
    /// the insert; rows stored before it count as succeeded and the rest is
    /// one failure record, exported to `report_dir`.
    ///
    /// # Errors
    ///
    /// Fails if the plan cannot be built or the sink is unavailable.
    pub async fn run_catalog(
        source_dir: &Path,
        subjects: &SubjectSource,
        sink: &SinkConfig,
        table: &str,
        report_dir: &Path,
    ) -> Result<RunOutput> {
        let start_time = Instant::now();
        let names = load_subjects(subjects)
            .await
            .context("Failed to load subjects")?
            .iter()
            .map(Subject::folder_query)
            .collect();
        let options = PlanOptions {
            subjects: names,
            max_subjects: subjects.max_subjects,
            only_keys: None,
        };
        let plan = plan_migration_with(source_dir, &options)
            .map_err(PreconditionError::from)
            .context("Failed to plan catalog")?;
        let rows = build_catalog(&plan);
        let sink = open_sink(sink).await.context("Failed to open storage sink")?;

        let mut report = RunReport {
            attempted: rows.len(),
            ..Default::default()
        };
        match insert_catalog(sink.as_ref(), table, &rows).await {
            Ok(done) => {
                report.succeeded = done.inserted;
                report.skipped = done.duplicates;
            }
            Err(e) => {
                warn!("Catalog insert failed: {}", e);
                report.succeeded = e.inserted;
                report.skipped = e.duplicates;
                let mut failure = FailureRecord::new("", "catalog", &e.to_string());
                failure.destination_key = table.to_string();
                report.record_failure(failure);
            }
        }

        let elapsed_seconds = start_time.elapsed().as_secs_f64();
        print_run_summary("Catalog", &report, elapsed_seconds);
        let failures_path = export_report(&report, report_dir, "catalog");
        Ok(RunOutput {
            kind: "catalog",
            report,
            failures_path,
            elapsed_seconds,
        })
    }

    /// Exports failures; an export error is logged, never fatal.
    fn export_report(report: &RunReport, dir: &Path, kind: &str) -> Option<PathBuf> {
        match export_failures(report, dir, kind) {
            Ok(Some(path)) => {
                info!("Wrote {} failure(s) to {}", report.failures.len(), path.display());
                Some(path)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Failed to export failures: {:#}", e);
                None
            }
        }
    }
}
