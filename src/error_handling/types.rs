//! Error type definitions.
//!
//! This module defines the error enums used throughout the application and the
//! `ErrorType` categories tallied by `ProcessingStats`.

use std::path::PathBuf;

use log::SetLoggerError;
use reqwest::Error as ReqwestError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the HTTP client.
    #[error("HTTP client initialization error: {0}")]
    HttpClientError(#[from] ReqwestError),
}

/// Run-level precondition failures.
///
/// These abort a run before any subject or unit is processed.
#[derive(Error, Debug)]
pub enum PreconditionError {
    /// A required credential or setting is missing.
    #[error("Missing required credential or setting: {0}")]
    MissingCredential(&'static str),

    /// The subjects file could not be read.
    #[error("Cannot read subjects file {}: {source}", path.display())]
    SubjectsFile {
        /// File that failed to load
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The storage backend is unreachable or the bucket is inaccessible.
    #[error("Storage backend unavailable: {0}")]
    SinkUnavailable(String),

    /// The migration plan could not be built.
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Failures while building a migration plan.
///
/// All of these are raised before any upload starts.
#[derive(Error, Debug)]
pub enum PlanError {
    /// The local source tree does not exist or is not a directory.
    #[error("Source directory not found: {}", .0.display())]
    SourceDirMissing(PathBuf),

    /// Two distinct local files sanitize to the same destination key.
    #[error("Destination key collision on '{key}': {} and {}", first.display(), second.display())]
    KeyCollision {
        /// The shared destination key
        key: String,
        /// First file planned for the key
        first: PathBuf,
        /// Second file mapping to the same key
        second: PathBuf,
    },

    /// The local content tree could not be walked.
    #[error("Cannot walk source tree: {0}")]
    Walk(#[from] walkdir::Error),

    /// A failure export given for re-drive could not be read.
    #[error("Cannot read failure list {}: {source}", path.display())]
    FailureList {
        /// The failure export
        path: PathBuf,
        /// Underlying CSV error
        #[source]
        source: csv::Error,
    },
}

/// Errors reported by a storage sink.
///
/// The variant decides retry behavior: only `Transient` is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Network hiccup, 429 or 5xx; worth retrying.
    #[error("transient storage error: {0}")]
    Transient(String),

    /// The request was rejected; retrying will not help.
    #[error("storage rejected request: {0}")]
    Permanent(String),

    /// The key already holds an object.
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    /// The backend or bucket cannot be reached at all.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl SinkError {
    /// Returns true when the operation may succeed if repeated.
    pub fn is_transient(&self) -> bool {
        matches!(self, SinkError::Transient(_))
    }
}

/// A catalog insert that stopped at a rejected batch.
///
/// Rows of earlier batches stay in the table; the counts say how far the
/// insert got.
#[derive(Error, Debug)]
#[error("insert into {table} stopped with {remaining} row(s) not written: {source}")]
pub struct CatalogInsertError {
    /// Destination table
    pub table: String,
    /// Rows newly stored by earlier batches
    pub inserted: usize,
    /// Rows earlier batches found already present
    pub duplicates: usize,
    /// Rows of the rejected batch and every batch after it
    pub remaining: usize,
    /// Error of the rejected batch
    #[source]
    pub source: SinkError,
}

/// Failure of a single extraction strategy.
///
/// Never escapes the extractor: the strategy is treated as having found
/// nothing and the next one runs.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// An embedded JSON block did not parse.
    #[error("malformed JSON payload: {0}")]
    MalformedJson(#[from] serde_json::Error),

    /// Any other unusable input.
    #[error("unusable payload: {0}")]
    Malformed(String),
}

/// Categories of per-unit failures, tallied for the end-of-run statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIterMacro)]
pub enum ErrorType {
    // Crawl errors
    /// 4xx other than 429
    FetchClientError,
    /// 429 after retries
    FetchTooManyRequests,
    /// 5xx after retries
    FetchServerError,
    /// Connection or transport failure after retries
    FetchNetworkError,
    /// Every attempt timed out
    FetchTimeout,
    /// The page yielded no media and no metadata
    ExtractionEmpty,
    /// A media file could not be downloaded
    MediaDownloadFailed,
    /// `profile.json` could not be written
    ProfileWriteFailed,
    // Migration errors
    /// Transient sink errors outlasted the retry budget
    UploadTransientExhausted,
    /// The sink rejected the upload
    UploadRejected,
    /// The local file could not be read
    UploadReadFailed,
    /// The file was left out of the plan
    PlanRejected,
}

impl ErrorType {
    /// Human-readable label for statistics output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::FetchClientError => "HTTP client error (4xx)",
            ErrorType::FetchTooManyRequests => "Too many requests (429)",
            ErrorType::FetchServerError => "HTTP server error (5xx)",
            ErrorType::FetchNetworkError => "Network error",
            ErrorType::FetchTimeout => "Request timeout",
            ErrorType::ExtractionEmpty => "Nothing extracted",
            ErrorType::MediaDownloadFailed => "Media download failed",
            ErrorType::ProfileWriteFailed => "Profile write failed",
            ErrorType::UploadTransientExhausted => "Upload retries exhausted",
            ErrorType::UploadRejected => "Upload rejected",
            ErrorType::UploadReadFailed => "Local file unreadable",
            ErrorType::PlanRejected => "File rejected at planning",
        }
    }
}
