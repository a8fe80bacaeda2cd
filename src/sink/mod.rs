//! Storage backends.
//!
//! `StorageSink` is the only thing the migrator and the follow-up tools know
//! about storage: an object store (`put`/`exists`/`list`) plus a table
//! (`insert`). Implementations:
//! - `LocalDirSink`: a directory acting as the bucket
//! - `MemorySink`: in-process, for tests and dry runs
//! - `RestSink`: Supabase-compatible REST storage

mod local;
mod memory;
mod rest;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::SinkConfig;
use crate::error_handling::{PreconditionError, SinkError};

pub use local::LocalDirSink;
pub use memory::MemorySink;
pub use rest::RestSink;

/// One entry returned by `StorageSink::list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectEntry {
    /// Name relative to the listed prefix (no slashes)
    pub name: String,
    /// Object size in bytes (0 for folders)
    pub size: u64,
    /// True for a folder-like prefix rather than an object
    pub is_folder: bool,
}

/// Object store + table interface used by the migrator.
///
/// `put` must be all-or-nothing: a reader never observes a partially written
/// object under `key`, even if the run is interrupted mid-upload.
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Readiness check run once before a migration starts.
    async fn check_ready(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// Stores `bytes` under `key`, replacing any existing object.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), SinkError>;

    /// True when an object is stored under `key`.
    async fn exists(&self, key: &str) -> Result<bool, SinkError>;

    /// Direct children of the folder `prefix` (objects and sub-folders).
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, SinkError>;

    /// Adds rows to `table`, ignoring rows already present; returns the
    /// number of rows newly stored.
    async fn insert(&self, table: &str, rows: &[serde_json::Value]) -> Result<usize, SinkError>;
}

/// Builds the configured sink and runs its readiness check.
///
/// # Errors
///
/// Returns `PreconditionError::SinkUnavailable` if the backend cannot be
/// built or its bucket is not reachable.
pub async fn open_sink(config: &SinkConfig) -> Result<Arc<dyn StorageSink>, PreconditionError> {
    let sink: Arc<dyn StorageSink> = match config {
        SinkConfig::Local { root } => Arc::new(LocalDirSink::new(root.clone())),
        SinkConfig::Memory => Arc::new(MemorySink::new()),
        SinkConfig::Rest {
            base_url,
            service_key,
            bucket,
            timeout_seconds,
        } => Arc::new(
            RestSink::new(
                base_url,
                service_key,
                bucket,
                Duration::from_secs(*timeout_seconds),
            )
            .map_err(|e| PreconditionError::SinkUnavailable(e.to_string()))?,
        ),
    };
    sink.check_ready()
        .await
        .map_err(|e| PreconditionError::SinkUnavailable(e.to_string()))?;
    Ok(sink)
}

/// Splits a key into its parent folder and final name.
pub(crate) fn split_key(key: &str) -> (&str, &str) {
    match key.rsplit_once('/') {
        Some((parent, name)) => (parent, name),
        None => ("", key),
    }
}

/// Rejects keys that could escape the bucket or address nothing.
pub(crate) fn validate_key(key: &str) -> Result<(), SinkError> {
    if key.is_empty()
        || key.starts_with('/')
        || key
            .split('/')
            .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(SinkError::Permanent(format!("invalid object key '{}'", key)));
    }
    Ok(())
}
