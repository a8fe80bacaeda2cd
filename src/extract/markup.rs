//! Strategy 4: generic `img`/`video` scan, the last resort.
//!
//! Prone to false positives, so every URL must pass the host allow-list and
//! the logo/icon filename filter before it is kept.

use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::media::{clean_media_url, host_allowed, is_junk_media_url, normalize_media_url};
use super::{ExtractedRecord, MediaKind, Strategy};
use crate::error_handling::ExtractError;
use crate::utils::parse_selector_unsafe;

static IMG_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| parse_selector_unsafe("img", "IMG_SELECTOR"));
static VIDEO_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| parse_selector_unsafe("video", "VIDEO_SELECTOR"));
static VIDEO_SOURCE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| parse_selector_unsafe("source[src]", "VIDEO_SOURCE_SELECTOR"));

/// Markup scan strategy with a media host allow-list.
pub struct Markup {
    allowed_hosts: Vec<String>,
}

impl Markup {
    /// An empty allow-list accepts media from any host.
    pub fn new(allowed_hosts: Vec<String>) -> Self {
        Markup { allowed_hosts }
    }

    fn accept(&self, raw: &str) -> Option<String> {
        let url = normalize_media_url(raw)?;
        if !host_allowed(&url, &self.allowed_hosts) || is_junk_media_url(&url) {
            return None;
        }
        Some(clean_media_url(&url))
    }
}

impl Strategy for Markup {
    fn name(&self) -> &'static str {
        "markup"
    }

    fn extract(&self, body: &str) -> Result<Option<ExtractedRecord>, ExtractError> {
        if !body.contains("<img") && !body.contains("<video") {
            return Ok(None);
        }
        let document = Html::parse_document(body);
        let mut builder = ExtractedRecord::builder();

        for img in document.select(&IMG_SELECTOR) {
            // Lazy-loading themes keep the real URL in data-src
            let element = img.value();
            for raw in [element.attr("data-src"), element.attr("src")]
                .into_iter()
                .flatten()
            {
                if let Some(url) = self.accept(raw) {
                    builder.push_media(MediaKind::Image, url, None);
                    break;
                }
            }
        }

        for video in document.select(&VIDEO_SELECTOR) {
            let sources = video
                .value()
                .attr("src")
                .into_iter()
                .chain(
                    video
                        .select(&VIDEO_SOURCE_SELECTOR)
                        .filter_map(|s| s.value().attr("src")),
                );
            for raw in sources {
                if let Some(url) = self.accept(raw) {
                    builder.push_media(MediaKind::Video, url, None);
                }
            }
        }

        Ok(Some(builder.build()))
    }
}
