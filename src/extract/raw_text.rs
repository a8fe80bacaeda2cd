//! Strategy 3: regex scan for JSON-style `"key":"value"` fragments in raw text.
//!
//! Catches data embedded in scripts that are not valid JSON on their own
//! (minified bundles, partial hydration payloads).

use std::sync::LazyLock;

use regex::Regex;

use super::media::normalize_media_url;
use super::{ExtractedRecord, MediaKind, Strategy};
use crate::error_handling::ExtractError;
use crate::utils::compile_regex_unsafe;

// A JSON string body: anything but quote/backslash, or an escape sequence
macro_rules! json_string_field {
    ($key:literal) => {
        concat!(r#"""#, $key, r#""\s*:\s*"((?:[^"\\]|\\.)*)""#)
    };
}

static BIOGRAPHY_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex_unsafe(json_string_field!("(?:biography|bio)"), "BIOGRAPHY_RE")
});
static FULL_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex_unsafe(json_string_field!("full_?[nN]ame"), "FULL_NAME_RE")
});
static DISPLAY_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_regex_unsafe(json_string_field!("display_url"), "DISPLAY_URL_RE"));
static VIDEO_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_regex_unsafe(json_string_field!("video_url"), "VIDEO_URL_RE"));
static PRICE_RE: LazyLock<Regex> = LazyLock::new(|| {
    compile_regex_unsafe(r#""price"\s*:\s*"?(\d+(?:\.\d+)?)"#, "PRICE_RE")
});

/// Raw text strategy.
pub struct RawText;

impl Strategy for RawText {
    fn name(&self) -> &'static str {
        "raw_text"
    }

    fn extract(&self, body: &str) -> Result<Option<ExtractedRecord>, ExtractError> {
        let mut builder = ExtractedRecord::builder();

        if let Some(bio) = first_capture(&BIOGRAPHY_RE, body) {
            builder.set_metadata("bio", &bio);
        }
        if let Some(name) = first_capture(&FULL_NAME_RE, body) {
            builder.set_metadata("full_name", &name);
        }
        if let Some(price) = PRICE_RE.captures(body).and_then(|c| c.get(1)) {
            builder.set_metadata("price", price.as_str());
        }

        for (re, kind) in [
            (&*DISPLAY_URL_RE, MediaKind::Image),
            (&*VIDEO_URL_RE, MediaKind::Video),
        ] {
            for captures in re.captures_iter(body) {
                let Some(raw) = captures.get(1) else { continue };
                if let Some(url) = normalize_media_url(&decode_json_string(raw.as_str())) {
                    builder.push_media(kind, url, None);
                }
            }
        }

        Ok(Some(builder.build()))
    }
}

fn first_capture(re: &Regex, body: &str) -> Option<String> {
    re.captures_iter(body)
        .filter_map(|c| c.get(1))
        .map(|m| decode_json_string(m.as_str()))
        .find(|value| !value.trim().is_empty())
}

/// Decodes JSON escapes (`\n`, `\u00e9`, `\/`) in a captured string body.
/// Falls back to the raw text if the escapes are malformed.
fn decode_json_string(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{}\"", raw)).unwrap_or_else(|_| raw.to_string())
}
