//! `index.json` manifests for media folders in storage.

use chrono::Utc;
use log::{debug, info, warn};
use serde::Serialize;

use super::sanitize::{sanitize_key_component, MediaCategory};
use crate::config::{ALLOWED_EXTENSIONS, INDEX_FILE_NAME};
use crate::error_handling::SinkError;
use crate::report::{FailureRecord, RunReport};
use crate::sink::StorageSink;

/// Contents of one `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderManifest {
    /// Media file names, sorted
    pub files: Vec<String>,
    /// RFC 3339 UTC timestamp
    pub generated_at: String,
    /// Length of `files`
    pub total_files: usize,
}

impl FolderManifest {
    /// A manifest over `files`, stamped now.
    pub fn new(mut files: Vec<String>) -> Self {
        files.sort();
        FolderManifest {
            total_files: files.len(),
            files,
            generated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Writes an `index.json` into every media folder of the given brands.
///
/// Covers `<brand>/scrolling_brand_media` and each
/// `<brand>/scrolling_product_media/<product>`. `brands` are display names
/// and are sanitized the same way destination keys are; an empty list means
/// every top-level folder in the sink. Folders without media files get no
/// manifest.
///
/// In the returned report a written manifest counts as succeeded and an
/// empty folder as skipped. A folder that cannot be listed or written is a
/// failure record; the other folders still run.
pub async fn build_indexes(
    sink: &dyn StorageSink,
    brands: &[String],
) -> Result<RunReport, SinkError> {
    let brand_keys: Vec<String> = if brands.is_empty() {
        sink.list("")
            .await?
            .into_iter()
            .filter(|e| e.is_folder)
            .map(|e| e.name)
            .collect()
    } else {
        brands
            .iter()
            .map(|b| sanitize_key_component(b))
            .filter(|b| !b.is_empty())
            .collect()
    };

    let mut report = RunReport::new();
    for brand in &brand_keys {
        let mut folders = vec![format!("{}/{}", brand, MediaCategory::BrandMedia.segment())];
        let products_prefix = format!("{}/{}", brand, MediaCategory::ProductMedia.segment());
        match sink.list(&products_prefix).await {
            Ok(entries) => folders.extend(
                entries
                    .into_iter()
                    .filter(|e| e.is_folder)
                    .map(|e| format!("{}/{}", products_prefix, e.name)),
            ),
            Err(e) => {
                warn!("Cannot list {}: {}", products_prefix, e);
                report.attempted += 1;
                report.record_failure(folder_failure(brand, &products_prefix, &e));
            }
        }

        for folder in folders {
            report.attempted += 1;
            match index_folder(sink, &folder).await {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    warn!("Cannot index {}: {}", folder, e);
                    report.record_failure(folder_failure(brand, &folder, &e));
                }
            }
        }
    }
    info!(
        "Wrote {} manifests for {} brands",
        report.succeeded,
        brand_keys.len()
    );
    Ok(report)
}

/// Lists `folder` and writes its manifest. Returns false if it holds no media.
async fn index_folder(sink: &dyn StorageSink, folder: &str) -> Result<bool, SinkError> {
    let files: Vec<String> = sink
        .list(folder)
        .await?
        .into_iter()
        .filter(|e| !e.is_folder && e.name != INDEX_FILE_NAME && is_media_name(&e.name))
        .map(|e| e.name)
        .collect();
    if files.is_empty() {
        debug!("No media in {}", folder);
        return Ok(false);
    }

    let manifest = FolderManifest::new(files);
    let body = serde_json::to_vec_pretty(&manifest)
        .map_err(|e| SinkError::Permanent(format!("{}: {}", folder, e)))?;
    sink.put(
        &format!("{}/{}", folder, INDEX_FILE_NAME),
        body,
        "application/json",
    )
    .await?;
    debug!("Indexed {} ({} files)", folder, manifest.total_files);
    Ok(true)
}

fn is_media_name(name: &str) -> bool {
    name.rsplit_once('.')
        .is_some_and(|(_, ext)| ALLOWED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
}

fn folder_failure(brand: &str, folder: &str, error: &SinkError) -> FailureRecord {
    FailureRecord {
        destination_key: folder.to_string(),
        content_type: "application/json".to_string(),
        ..FailureRecord::new(brand, "index", &error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;

    async fn seeded() -> MemorySink {
        let sink = MemorySink::new();
        for key in [
            "ACME/scrolling_brand_media/b.mp4",
            "ACME/scrolling_brand_media/a.jpg",
            "ACME/scrolling_brand_media/notes.txt",
            "ACME/scrolling_product_media/Dress/front.jpg",
            "Blue_Fox/scrolling_brand_media/x.png",
        ] {
            sink.put(key, vec![1], "application/octet-stream").await.unwrap();
        }
        sink
    }

    #[tokio::test]
    async fn test_manifests_for_requested_brand() {
        let sink = seeded().await;
        let report = build_indexes(&sink, &["ACME".to_string()]).await.unwrap();
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 0);

        let (bytes, content_type) = sink
            .object("ACME/scrolling_brand_media/index.json")
            .await
            .expect("manifest written");
        assert_eq!(content_type, "application/json");
        let manifest: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(manifest["files"], serde_json::json!(["a.jpg", "b.mp4"]));
        assert_eq!(manifest["total_files"], 2);
        assert!(sink
            .object("ACME/scrolling_product_media/Dress/index.json")
            .await
            .is_some());
        assert!(sink
            .object("Blue_Fox/scrolling_brand_media/index.json")
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_all_brands_and_rerun_ignores_existing_manifest() {
        let sink = seeded().await;
        let first = build_indexes(&sink, &[]).await.unwrap();
        assert_eq!(first.succeeded, 3);
        let second = build_indexes(&sink, &[]).await.unwrap();
        assert_eq!(second.succeeded, 3);

        let (bytes, _) = sink
            .object("Blue_Fox/scrolling_brand_media/index.json")
            .await
            .unwrap();
        let manifest: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(manifest["files"], serde_json::json!(["x.png"]));
    }

    #[tokio::test]
    async fn test_brand_without_media_is_skipped() {
        let sink = MemorySink::new();
        let report = build_indexes(&sink, &["Nobody".to_string()]).await.unwrap();
        assert_eq!(report.succeeded, 0);
        assert_eq!(report.skipped, 1);
        assert!(sink.keys().await.is_empty());
    }
}
