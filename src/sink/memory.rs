//! In-memory sink.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{split_key, validate_key, ObjectEntry, StorageSink};
use crate::error_handling::SinkError;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Holds objects and table rows in process memory.
///
/// Used by tests and by dry runs; nothing survives the process.
#[derive(Debug, Default)]
pub struct MemorySink {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    tables: Mutex<BTreeMap<String, Vec<serde_json::Value>>>,
    put_calls: AtomicUsize,
}

impl MemorySink {
    /// An empty in-process bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `put` calls received, successful or not.
    pub fn put_count(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    /// All stored keys in lexicographic order.
    pub async fn keys(&self) -> Vec<String> {
        self.objects.lock().await.keys().cloned().collect()
    }

    /// Bytes and content type stored under `key`.
    pub async fn object(&self, key: &str) -> Option<(Vec<u8>, String)> {
        self.objects
            .lock()
            .await
            .get(key)
            .map(|o| (o.bytes.clone(), o.content_type.clone()))
    }

    /// Rows stored in `table`, in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<serde_json::Value> {
        self.tables
            .lock()
            .await
            .get(table)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageSink for MemorySink {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), SinkError> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        validate_key(key)?;
        self.objects.lock().await.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, SinkError> {
        Ok(self.objects.lock().await.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, SinkError> {
        let prefix = prefix.trim_matches('/');
        let objects = self.objects.lock().await;
        let mut entries: BTreeMap<String, ObjectEntry> = BTreeMap::new();

        for (key, object) in objects.iter() {
            let rest = if prefix.is_empty() {
                key.as_str()
            } else {
                match key.strip_prefix(prefix).and_then(|r| r.strip_prefix('/')) {
                    Some(rest) => rest,
                    None => continue,
                }
            };
            let entry = match rest.split_once('/') {
                Some((folder, _)) => ObjectEntry {
                    name: folder.to_string(),
                    size: 0,
                    is_folder: true,
                },
                None => ObjectEntry {
                    name: split_key(rest).1.to_string(),
                    size: object.bytes.len() as u64,
                    is_folder: false,
                },
            };
            entries.entry(entry.name.clone()).or_insert(entry);
        }
        Ok(entries.into_values().collect())
    }

    async fn insert(&self, table: &str, rows: &[serde_json::Value]) -> Result<usize, SinkError> {
        let mut tables = self.tables.lock().await;
        let stored = tables.entry(table.to_string()).or_default();
        let mut inserted = 0;
        for row in rows {
            if !stored.contains(row) {
                stored.push(row.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_folders_and_files() {
        let sink = MemorySink::new();
        for key in [
            "ACME/scrolling_brand_media/a.jpg",
            "ACME/scrolling_brand_media/b.mp4",
            "ACME/scrolling_product_media/Dress/c.jpg",
            "ACMEX/scrolling_brand_media/d.jpg",
        ] {
            sink.put(key, vec![0; 3], "image/jpeg").await.unwrap();
        }
        assert_eq!(sink.put_count(), 4);

        let root: Vec<_> = sink.list("").await.unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(root, ["ACME", "ACMEX"]);

        let acme = sink.list("ACME").await.unwrap();
        assert_eq!(acme.len(), 2);
        assert!(acme.iter().all(|e| e.is_folder));

        let media = sink.list("ACME/scrolling_brand_media/").await.unwrap();
        assert_eq!(media.len(), 2);
        assert_eq!(media[0].name, "a.jpg");
        assert_eq!(media[0].size, 3);
    }

    #[tokio::test]
    async fn test_insert_and_rows() {
        let sink = MemorySink::new();
        let rows = [serde_json::json!({"product_name": "Dress"})];
        assert_eq!(sink.insert("products", &rows).await.unwrap(), 1);
        assert_eq!(sink.insert("products", &rows).await.unwrap(), 0);
        assert_eq!(sink.rows("products").await.len(), 1);
        assert!(sink.rows("other").await.is_empty());
    }
}
