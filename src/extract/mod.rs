//! Best-effort extraction of media and profile metadata from crawled pages.
//!
//! `MultiStrategyExtractor` runs an ordered list of `Strategy` implementations
//! and keeps the first non-empty result. The default order is:
//!
//! 1. `EmbeddedJson`: JSON payloads and script blocks (depth-bounded walk)
//! 2. `MetaTags`: Open Graph / description meta tags
//! 3. `RawText`: regex scan for `"biography":"..."` style fragments
//! 4. `Markup`: `img`/`video` elements on allow-listed media hosts
//!
//! Extraction is pure: no network or disk I/O.

mod embedded_json;
mod markup;
mod media;
mod meta_tags;
mod raw_text;

use std::collections::{BTreeMap, HashSet};

use log::debug;
use serde::Serialize;

use crate::error_handling::ExtractError;

pub use embedded_json::EmbeddedJson;
pub use markup::Markup;
pub use media::{clean_media_url, is_junk_media_url, media_file_name, normalize_media_url};
pub use meta_tags::MetaTags;
pub use raw_text::RawText;

/// Kind of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    /// Still image
    Image,
    /// Video clip
    Video,
}

/// One media URL found on a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MediaItem {
    /// Image or video
    pub kind: MediaKind,
    /// Absolute, cleaned URL
    pub url: String,
    /// Post the item belongs to, when the page says
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_post_id: Option<String>,
}

/// How much of a subject's data an extraction recovered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    /// Media found, and the strategy read its whole input
    Complete,
    /// Metadata only, or the strategy had to skip unusable input
    Partial,
    /// Nothing found
    Empty,
}

/// Normalized extraction output.
///
/// Built only through `RecordBuilder`, which fixes `completeness` from the
/// collected data: `Empty` exactly when both collections are empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExtractedRecord {
    media_items: Vec<MediaItem>,
    metadata_fields: BTreeMap<String, String>,
    completeness: Completeness,
}

impl ExtractedRecord {
    /// A record with nothing in it.
    pub fn empty() -> Self {
        RecordBuilder::default().build()
    }

    /// Starts an empty builder.
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// Media items in first-seen order, unique by URL.
    pub fn media_items(&self) -> &[MediaItem] {
        &self.media_items
    }

    /// Metadata by field name (`biography`, `full_name`, `description`, ...).
    pub fn metadata_fields(&self) -> &BTreeMap<String, String> {
        &self.metadata_fields
    }

    /// Completeness fixed at build time.
    pub fn completeness(&self) -> Completeness {
        self.completeness
    }

    /// True when nothing was found.
    pub fn is_empty(&self) -> bool {
        self.completeness == Completeness::Empty
    }
}

/// Accumulates media and metadata for one `ExtractedRecord`.
#[derive(Debug, Default)]
pub struct RecordBuilder {
    media_items: Vec<MediaItem>,
    seen_urls: HashSet<String>,
    metadata_fields: BTreeMap<String, String>,
    degraded: bool,
}

impl RecordBuilder {
    /// Adds a media item unless its URL was already added. Returns whether it was added.
    pub fn push_media(
        &mut self,
        kind: MediaKind,
        url: impl Into<String>,
        source_post_id: Option<String>,
    ) -> bool {
        let url = url.into();
        if url.is_empty() || !self.seen_urls.insert(url.clone()) {
            return false;
        }
        self.media_items.push(MediaItem {
            kind,
            url,
            source_post_id,
        });
        true
    }

    /// Sets a metadata field unless it is already set; blank values are ignored.
    pub fn set_metadata(&mut self, key: &str, value: &str) {
        let value = value.trim();
        if value.is_empty() {
            return;
        }
        self.metadata_fields
            .entry(key.to_string())
            .or_insert_with(|| value.to_string());
    }

    /// Flags the record as assembled from partially unusable input.
    pub fn mark_partial(&mut self) {
        self.degraded = true;
    }

    /// Finishes the record and fixes its completeness.
    pub fn build(self) -> ExtractedRecord {
        let completeness = if self.media_items.is_empty() && self.metadata_fields.is_empty() {
            Completeness::Empty
        } else if self.media_items.is_empty() || self.degraded {
            Completeness::Partial
        } else {
            Completeness::Complete
        };
        ExtractedRecord {
            media_items: self.media_items,
            metadata_fields: self.metadata_fields,
            completeness,
        }
    }
}

/// One self-contained extraction heuristic.
///
/// `Ok(None)` means "nothing here"; `Err` means the input was unusable for
/// this strategy. Either way the extractor moves on to the next strategy.
pub trait Strategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Runs the heuristic over a decoded page body.
    fn extract(&self, body: &str) -> Result<Option<ExtractedRecord>, ExtractError>;
}

/// Ordered list of strategies; the first non-empty result wins.
pub struct MultiStrategyExtractor {
    strategies: Vec<Box<dyn Strategy>>,
}

impl MultiStrategyExtractor {
    /// An extractor trying `strategies` in the given order.
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        MultiStrategyExtractor { strategies }
    }

    /// The four built-in strategies in priority order.
    ///
    /// `media_hosts` is the allow-list for the markup scan.
    pub fn with_default_strategies(media_hosts: &[String]) -> Self {
        Self::new(vec![
            Box::new(EmbeddedJson),
            Box::new(MetaTags),
            Box::new(RawText),
            Box::new(Markup::new(media_hosts.to_vec())),
        ])
    }

    /// Strategy names in the order they run.
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Extracts a record from a fetched body; Empty when no strategy finds anything.
    pub fn extract(&self, body: &[u8], content_type: &str) -> ExtractedRecord {
        self.extract_with_source(body, content_type).0
    }

    /// Like `extract`, also returning the name of the winning strategy.
    pub fn extract_with_source(
        &self,
        body: &[u8],
        content_type: &str,
    ) -> (ExtractedRecord, Option<&'static str>) {
        let mime = content_type.to_ascii_lowercase();
        if mime.starts_with("image/") || mime.starts_with("video/") {
            debug!("Skipping extraction of binary content type {}", content_type);
            return (ExtractedRecord::empty(), None);
        }

        let text = String::from_utf8_lossy(body);
        for strategy in &self.strategies {
            match strategy.extract(&text) {
                Ok(Some(record)) if !record.is_empty() => {
                    debug!(
                        "Strategy {} extracted {} media item(s), {} field(s) ({:?})",
                        strategy.name(),
                        record.media_items().len(),
                        record.metadata_fields().len(),
                        record.completeness()
                    );
                    return (record, Some(strategy.name()));
                }
                Ok(_) => debug!("Strategy {} found nothing", strategy.name()),
                Err(e) => debug!("Strategy {} failed, falling through: {}", strategy.name(), e),
            }
        }
        (ExtractedRecord::empty(), None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_iff_no_media_and_no_metadata() {
        assert_eq!(ExtractedRecord::empty().completeness(), Completeness::Empty);

        let mut builder = ExtractedRecord::builder();
        builder.set_metadata("bio", "Handmade in Lisbon");
        assert_eq!(builder.build().completeness(), Completeness::Partial);

        let mut builder = ExtractedRecord::builder();
        builder.push_media(MediaKind::Image, "https://cdn.example.com/a.jpg", None);
        assert_eq!(builder.build().completeness(), Completeness::Complete);
    }

    #[test]
    fn test_mark_partial_degrades_media_record() {
        let mut builder = ExtractedRecord::builder();
        builder.push_media(MediaKind::Image, "https://cdn.example.com/a.jpg", None);
        builder.mark_partial();
        assert_eq!(builder.build().completeness(), Completeness::Partial);
    }

    #[test]
    fn test_mark_partial_on_nothing_stays_empty() {
        let mut builder = ExtractedRecord::builder();
        builder.mark_partial();
        assert_eq!(builder.build().completeness(), Completeness::Empty);
    }

    #[test]
    fn test_media_dedup_keeps_first_seen_order() {
        let mut builder = ExtractedRecord::builder();
        assert!(builder.push_media(MediaKind::Image, "https://a/1.jpg", Some("p1".into())));
        assert!(builder.push_media(MediaKind::Video, "https://a/2.mp4", None));
        assert!(!builder.push_media(MediaKind::Image, "https://a/1.jpg", Some("p9".into())));
        assert!(builder.push_media(MediaKind::Image, "https://a/3.jpg", None));
        let record = builder.build();
        let urls: Vec<_> = record.media_items().iter().map(|m| m.url.as_str()).collect();
        assert_eq!(urls, ["https://a/1.jpg", "https://a/2.mp4", "https://a/3.jpg"]);
        assert_eq!(record.media_items()[0].source_post_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_metadata_first_writer_wins_and_blank_ignored() {
        let mut builder = ExtractedRecord::builder();
        builder.set_metadata("bio", "  ");
        builder.set_metadata("bio", "first");
        builder.set_metadata("bio", "second");
        let record = builder.build();
        assert_eq!(record.metadata_fields().get("bio").map(String::as_str), Some("first"));
    }

    #[test]
    fn test_binary_content_type_short_circuits() {
        let extractor = MultiStrategyExtractor::with_default_strategies(&[]);
        let record = extractor.extract(br#"{"display_url":"https://a/b.jpg"}"#, "image/jpeg");
        assert!(record.is_empty());
    }

    #[test]
    fn test_default_strategy_order() {
        let extractor = MultiStrategyExtractor::with_default_strategies(&[]);
        assert_eq!(
            extractor.strategy_names(),
            ["embedded_json", "meta_tags", "raw_text", "markup"]
        );
    }

    #[test]
    fn test_record_serializes_lowercase_enums() {
        let mut builder = ExtractedRecord::builder();
        builder.push_media(MediaKind::Video, "https://a/v.mp4", None);
        let json = serde_json::to_value(builder.build()).expect("serializable");
        assert_eq!(json["completeness"], "complete");
        assert_eq!(json["media_items"][0]["kind"], "video");
        assert!(json["media_items"][0].get("source_post_id").is_none());
    }
}
