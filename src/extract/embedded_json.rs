//! Strategy 1: JSON payloads and JSON carried in script blocks.
//!
//! Recognized carriers:
//! - a body that is itself JSON (API responses)
//! - `window._sharedData = {...};` assignments
//! - `<script type="application/ld+json">` and `<script type="application/json">`
//!
//! The parsed tree is walked to `MAX_JSON_DEPTH` looking only for a narrow
//! set of keys, so schema drift elsewhere in the payload is harmless.

use std::sync::LazyLock;

use regex::Regex;
use scraper::{Html, Selector};
use serde_json::{Map, Value};

use super::media::normalize_media_url;
use super::{ExtractedRecord, MediaKind, RecordBuilder, Strategy};
use crate::config::MAX_JSON_DEPTH;
use crate::error_handling::ExtractError;
use crate::utils::{compile_regex_unsafe, parse_selector_unsafe};

static SHARED_DATA_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex_unsafe(
        r"(?s)window\._sharedData\s*=\s*(\{.*?\})\s*;\s*</script>",
        "SHARED_DATA_RE",
    )
});

static JSON_SCRIPT_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    parse_selector_unsafe(
        r#"script[type="application/ld+json"], script[type="application/json"]"#,
        "JSON_SCRIPT_SELECTOR",
    )
});

/// String-valued keys copied into metadata, with their metadata names.
const METADATA_KEYS: &[(&str, &str)] = &[
    ("biography", "bio"),
    ("full_name", "full_name"),
    ("external_url", "website"),
    ("category_name", "category"),
    ("description", "description"),
    ("priceCurrency", "currency"),
];

/// Embedded JSON strategy.
pub struct EmbeddedJson;

impl Strategy for EmbeddedJson {
    fn name(&self) -> &'static str {
        "embedded_json"
    }

    fn extract(&self, body: &str) -> Result<Option<ExtractedRecord>, ExtractError> {
        let blocks = collect_blocks(body);
        if blocks.is_empty() {
            return Ok(None);
        }

        let mut builder = ExtractedRecord::builder();
        let mut first_error = None;
        let mut parsed_any = false;
        for block in &blocks {
            match serde_json::from_str::<Value>(block) {
                Ok(value) => {
                    parsed_any = true;
                    walk(&value, 0, &mut builder);
                }
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }

        match (parsed_any, first_error) {
            (false, Some(e)) => Err(ExtractError::MalformedJson(e)),
            (true, Some(_)) => {
                builder.mark_partial();
                Ok(Some(builder.build()))
            }
            _ => Ok(Some(builder.build())),
        }
    }
}

fn collect_blocks(body: &str) -> Vec<String> {
    let trimmed = body.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return vec![trimmed.to_string()];
    }

    let mut blocks: Vec<String> = SHARED_DATA_RE
        .captures_iter(body)
        .filter_map(|c| c.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if body.contains("<script") {
        let document = Html::parse_document(body);
        blocks.extend(
            document
                .select(&JSON_SCRIPT_SELECTOR)
                .map(|script| script.text().collect::<String>())
                .filter(|text| !text.trim().is_empty()),
        );
    }
    blocks
}

fn walk(value: &Value, depth: usize, out: &mut RecordBuilder) {
    if depth > MAX_JSON_DEPTH {
        return;
    }
    match value {
        Value::Object(map) => {
            visit_object(map, out);
            for child in map.values() {
                walk(child, depth + 1, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk(item, depth + 1, out);
            }
        }
        _ => {}
    }
}

fn visit_object(map: &Map<String, Value>, out: &mut RecordBuilder) {
    let post_id = str_field(map, "shortcode")
        .or_else(|| str_field(map, "id"))
        .map(str::to_string);

    if let Some(url) = str_field(map, "display_url").and_then(normalize_media_url) {
        out.push_media(MediaKind::Image, url, post_id.clone());
    }
    if let Some(url) = str_field(map, "video_url").and_then(normalize_media_url) {
        out.push_media(MediaKind::Video, url, post_id);
    }

    // JSON-LD: "image" may be a string, a list of strings, or an ImageObject
    match map.get("image") {
        Some(Value::String(url)) => push_image(out, url),
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(url) => push_image(out, url),
                    Value::Object(obj) => {
                        if let Some(url) = str_field(obj, "url") {
                            push_image(out, url);
                        }
                    }
                    _ => {}
                }
            }
        }
        Some(Value::Object(obj)) => {
            if let Some(url) = str_field(obj, "url") {
                push_image(out, url);
            }
        }
        _ => {}
    }

    for (key, field) in METADATA_KEYS {
        if let Some(value) = str_field(map, key) {
            out.set_metadata(field, value);
        }
    }

    match map.get("price") {
        Some(Value::String(price)) => out.set_metadata("price", price),
        Some(Value::Number(price)) => out.set_metadata("price", &price.to_string()),
        _ => {}
    }

    if let Some(count) = map
        .get("edge_followed_by")
        .and_then(|v| v.get("count"))
        .and_then(Value::as_u64)
    {
        out.set_metadata("followers", &count.to_string());
    }
}

fn push_image(out: &mut RecordBuilder, raw: &str) {
    if let Some(url) = normalize_media_url(raw) {
        out.push_media(MediaKind::Image, url, None);
    }
}

fn str_field<'a>(map: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    map.get(key).and_then(Value::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Completeness;

    const SHARED_DATA_PAGE: &str = r#"<html><head></head><body>
<script type="text/javascript">window._sharedData = {"entry_data":{"ProfilePage":[{"graphql":{"user":{
  "biography":"Slow fashion from Porto","full_name":"ACME Studio","external_url":"https://acme.example",
  "edge_followed_by":{"count":1234},
  "edge_owner_to_timeline_media":{"edges":[
    {"node":{"shortcode":"B1","display_url":"https://scontent.cdninstagram.com/p/1.jpg","is_video":false}},
    {"node":{"shortcode":"B2","display_url":"https://scontent.cdninstagram.com/p/2.jpg","is_video":true,
             "video_url":"https://scontent.cdninstagram.com/v/2.mp4"}}
  ]}}}}]}};</script>
</body></html>"#;

    #[test]
    fn test_shared_data_profile() {
        let record = EmbeddedJson
            .extract(SHARED_DATA_PAGE)
            .expect("parses")
            .expect("finds data");
        assert_eq!(record.completeness(), Completeness::Complete);
        let items = record.media_items();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].url, "https://scontent.cdninstagram.com/p/1.jpg");
        assert_eq!(items[0].source_post_id.as_deref(), Some("B1"));
        assert_eq!(items[2].kind, MediaKind::Video);
        assert_eq!(items[2].source_post_id.as_deref(), Some("B2"));

        let meta = record.metadata_fields();
        assert_eq!(meta["bio"], "Slow fashion from Porto");
        assert_eq!(meta["full_name"], "ACME Studio");
        assert_eq!(meta["website"], "https://acme.example");
        assert_eq!(meta["followers"], "1234");
    }

    #[test]
    fn test_json_ld_product() {
        let page = r#"<html><head><script type="application/ld+json">
            {"@type":"Product","name":"Linen Shirt","description":"Loose fit",
             "image":["//cdn.shopify.com/files/shirt-front.jpg","https://cdn.shopify.com/files/shirt-back.jpg"],
             "offers":{"price":"89.00","priceCurrency":"EUR"}}
        </script></head><body></body></html>"#;
        let record = EmbeddedJson.extract(page).unwrap().unwrap();
        assert_eq!(record.media_items().len(), 2);
        assert_eq!(
            record.media_items()[0].url,
            "https://cdn.shopify.com/files/shirt-front.jpg"
        );
        assert_eq!(record.metadata_fields()["price"], "89.00");
        assert_eq!(record.metadata_fields()["currency"], "EUR");
        assert_eq!(record.metadata_fields()["description"], "Loose fit");
    }

    #[test]
    fn test_pure_json_body() {
        let body = r#"{"graphql":{"user":{"biography":"Hi","edge_followed_by":{"count":7}}}}"#;
        let record = EmbeddedJson.extract(body).unwrap().unwrap();
        assert_eq!(record.completeness(), Completeness::Partial);
        assert_eq!(record.metadata_fields()["followers"], "7");
    }

    #[test]
    fn test_page_without_json_is_none() {
        let page = "<html><head><title>x</title></head><body><p>hello</p></body></html>";
        assert!(EmbeddedJson.extract(page).unwrap().is_none());
    }

    #[test]
    fn test_truncated_json_is_an_error_not_a_panic() {
        let page = r#"<html><head><script type="application/ld+json">{"image": "https://cdn.shop</script></head></html>"#;
        assert!(matches!(
            EmbeddedJson.extract(page),
            Err(ExtractError::MalformedJson(_))
        ));
    }

    #[test]
    fn test_one_bad_block_marks_partial() {
        let page = r#"<html><head>
            <script type="application/ld+json">{"broken": </script>
            <script type="application/ld+json">{"image":"https://cdn.shopify.com/files/dress-main.jpg"}</script>
        </head></html>"#;
        let record = EmbeddedJson.extract(page).unwrap().unwrap();
        assert_eq!(record.media_items().len(), 1);
        assert_eq!(record.completeness(), Completeness::Partial);
    }

    #[test]
    fn test_depth_bound_stops_walk() {
        let mut nested = r#"{"display_url":"https://cdn.example.com/deep/image.jpg"}"#.to_string();
        for _ in 0..(MAX_JSON_DEPTH + 2) {
            nested = format!(r#"{{"child":{}}}"#, nested);
        }
        let record = EmbeddedJson.extract(&nested).unwrap().unwrap();
        assert!(record.is_empty());
    }
}
