//! Strategy 2: declarative `<meta>` tags (Open Graph, Twitter cards, description).

use std::sync::LazyLock;

use scraper::{Html, Selector};

use super::media::normalize_media_url;
use super::{ExtractedRecord, MediaKind, Strategy};
use crate::error_handling::ExtractError;
use crate::utils::parse_selector_unsafe;

static META_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| parse_selector_unsafe("meta[content]", "META_SELECTOR"));

/// Meta tag strategy.
pub struct MetaTags;

impl Strategy for MetaTags {
    fn name(&self) -> &'static str {
        "meta_tags"
    }

    fn extract(&self, body: &str) -> Result<Option<ExtractedRecord>, ExtractError> {
        if !body.contains("<meta") {
            return Ok(None);
        }
        let document = Html::parse_document(body);
        let mut builder = ExtractedRecord::builder();

        for element in document.select(&META_SELECTOR) {
            let value = element.value();
            let Some(key) = value.attr("property").or_else(|| value.attr("name")) else {
                continue;
            };
            let content = value.attr("content").unwrap_or_default().trim();
            if content.is_empty() {
                continue;
            }

            match key.to_ascii_lowercase().as_str() {
                "og:image" | "og:image:url" | "og:image:secure_url" | "twitter:image" => {
                    if let Some(url) = normalize_media_url(content) {
                        builder.push_media(MediaKind::Image, url, None);
                    }
                }
                "og:video" | "og:video:url" | "og:video:secure_url" => {
                    if let Some(url) = normalize_media_url(content) {
                        builder.push_media(MediaKind::Video, url, None);
                    }
                }
                "og:description" | "description" => builder.set_metadata("description", content),
                "og:title" => builder.set_metadata("title", content),
                "product:price:amount" | "og:price:amount" => {
                    builder.set_metadata("price", content)
                }
                "product:price:currency" | "og:price:currency" => {
                    builder.set_metadata("currency", content)
                }
                _ => {}
            }
        }

        Ok(Some(builder.build()))
    }
}
