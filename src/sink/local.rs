//! Directory-backed sink.

use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::{validate_key, ObjectEntry, StorageSink};
use crate::error_handling::SinkError;

/// Folder under the root that holds table rows; hidden from `list("")`.
const TABLES_DIR: &str = "_tables";
/// Suffix of in-flight uploads; hidden from `list`.
const UPLOAD_SUFFIX: &str = ".uploading";

/// A local directory acting as the bucket.
///
/// Objects are written to a sibling temp file and renamed into place, so an
/// interrupted run never leaves a truncated object under its final key.
/// Table rows are appended as JSON lines to `_tables/<table>.jsonl`; a row
/// equal to one already in the file is not appended again.
#[derive(Debug, Clone)]
pub struct LocalDirSink {
    root: PathBuf,
}

impl LocalDirSink {
    /// A sink storing objects under `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        LocalDirSink { root: root.into() }
    }

    /// Directory acting as the bucket.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, key: &str) -> Result<PathBuf, SinkError> {
        validate_key(key)?;
        Ok(self.root.join(key))
    }
}

/// Existing rows of a table file, re-serialized so equal rows compare equal.
fn stored_rows(text: &str) -> HashSet<String> {
    text.lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .map(|row| row.to_string())
        .collect()
}

fn io_to_sink_error(context: &str, error: std::io::Error) -> SinkError {
    let message = format!("{}: {}", context, error);
    match error.kind() {
        ErrorKind::PermissionDenied | ErrorKind::InvalidInput | ErrorKind::InvalidData => {
            SinkError::Permanent(message)
        }
        _ => SinkError::Transient(message),
    }
}

#[async_trait]
impl StorageSink for LocalDirSink {
    async fn check_ready(&self) -> Result<(), SinkError> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| SinkError::Unavailable(format!("{}: {}", self.root.display(), e)))?;
        let metadata = tokio::fs::metadata(&self.root)
            .await
            .map_err(|e| SinkError::Unavailable(format!("{}: {}", self.root.display(), e)))?;
        if metadata.permissions().readonly() {
            return Err(SinkError::Unavailable(format!(
                "{} is read-only",
                self.root.display()
            )));
        }
        Ok(())
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, _content_type: &str) -> Result<(), SinkError> {
        let path = self.object_path(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_to_sink_error(key, e))?;
        }
        let mut temp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        temp_name.push(UPLOAD_SUFFIX);
        let temp = path.with_file_name(temp_name);

        let write = async {
            let mut file = tokio::fs::File::create(&temp).await?;
            file.write_all(&bytes).await?;
            file.sync_all().await?;
            drop(file);
            tokio::fs::rename(&temp, &path).await
        };
        if let Err(e) = write.await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(io_to_sink_error(key, e));
        }
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, SinkError> {
        let path = self.object_path(key)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_to_sink_error(key, e)),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, SinkError> {
        let prefix = prefix.trim_matches('/');
        let dir = if prefix.is_empty() {
            self.root.clone()
        } else {
            self.object_path(prefix)?
        };

        let mut reader = match tokio::fs::read_dir(&dir).await {
            Ok(reader) => reader,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_to_sink_error(prefix, e)),
        };

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| io_to_sink_error(prefix, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(UPLOAD_SUFFIX) || (prefix.is_empty() && name == TABLES_DIR) {
                continue;
            }
            let metadata = entry
                .metadata()
                .await
                .map_err(|e| io_to_sink_error(prefix, e))?;
            entries.push(ObjectEntry {
                name,
                size: if metadata.is_file() { metadata.len() } else { 0 },
                is_folder: metadata.is_dir(),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn insert(&self, table: &str, rows: &[serde_json::Value]) -> Result<usize, SinkError> {
        validate_key(table)?;
        if table.contains('/') {
            return Err(SinkError::Permanent(format!("invalid table name '{}'", table)));
        }
        let dir = self.root.join(TABLES_DIR);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| io_to_sink_error(table, e))?;

        let path = dir.join(format!("{}.jsonl", table));
        let mut present = match tokio::fs::read_to_string(&path).await {
            Ok(text) => stored_rows(&text),
            Err(e) if e.kind() == ErrorKind::NotFound => HashSet::new(),
            Err(e) => return Err(io_to_sink_error(table, e)),
        };

        let mut buffer = Vec::new();
        let mut inserted = 0;
        for row in rows {
            let line = serde_json::to_string(row)
                .map_err(|e| SinkError::Permanent(format!("{}: {}", table, e)))?;
            if present.insert(line.clone()) {
                buffer.extend_from_slice(line.as_bytes());
                buffer.push(b'\n');
                inserted += 1;
            }
        }
        if inserted == 0 {
            return Ok(0);
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| io_to_sink_error(table, e))?;
        file.write_all(&buffer)
            .await
            .map_err(|e| io_to_sink_error(table, e))?;
        file.flush().await.map_err(|e| io_to_sink_error(table, e))?;
        Ok(inserted)
    }
}
