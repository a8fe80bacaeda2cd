//! Media URL normalization and filtering shared by the strategies.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use super::{MediaItem, MediaKind};
use crate::config::{ALLOWED_EXTENSIONS, CDN_IMAGE_SIZE, MIN_MEDIA_URL_LENGTH};
use crate::migrate::sanitize_key_component;
use crate::utils::compile_regex_unsafe;

/// Filename fragments that mark site chrome rather than content.
const JUNK_MARKERS: &[&str] = &["logo", "icon", "favicon", "sprite", "placeholder", "spinner"];

// `_600x`, `_600x800`, `_2048x` size suffixes before the extension
static SIZE_SUFFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_regex_unsafe(r"_\d+x\d*(\.[A-Za-z0-9]+)$", "SIZE_SUFFIX_RE"));

/// Turns a raw attribute value into an absolute http(s) URL.
///
/// Protocol-relative URLs get `https:`. Relative paths, `data:` URIs and
/// anything unparsable yield `None`.
pub fn normalize_media_url(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let candidate = if let Some(rest) = raw.strip_prefix("//") {
        format!("https://{}", rest)
    } else {
        raw.to_string()
    };
    let parsed = Url::parse(&candidate).ok()?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some() => Some(parsed.to_string()),
        _ => None,
    }
}

/// Requests the full-size variant of a CDN image URL.
///
/// Fills `{width}`/`{height}` templates, drops `_NNNxNNN` size suffixes from
/// the file name, and removes the `v` cache-buster query parameter.
pub fn clean_media_url(url: &str) -> String {
    let filled = url
        .replace("{width}", CDN_IMAGE_SIZE)
        .replace("%7Bwidth%7D", CDN_IMAGE_SIZE)
        .replace("{height}", CDN_IMAGE_SIZE)
        .replace("%7Bheight%7D", CDN_IMAGE_SIZE);

    let Ok(mut parsed) = Url::parse(&filled) else {
        return filled;
    };

    let path = parsed.path().to_string();
    let stripped = SIZE_SUFFIX_RE.replace(&path, "$1");
    if stripped != path {
        parsed.set_path(&stripped);
    }

    if parsed.query().is_some() {
        let kept: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(k, _)| k != "v")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(kept);
        }
    }
    parsed.to_string()
}

/// True for URLs that are too short to be content or whose file name looks
/// like a logo, icon, or other site chrome.
pub fn is_junk_media_url(url: &str) -> bool {
    if url.len() <= MIN_MEDIA_URL_LENGTH {
        return true;
    }
    let file_name = Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .unwrap_or_else(|| url.to_string())
        .to_ascii_lowercase();
    JUNK_MARKERS.iter().any(|marker| file_name.contains(marker))
}

/// True when the URL's host is one of `allowed` or a subdomain of one.
/// An empty allow-list accepts every host.
pub(crate) fn host_allowed(url: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(str::to_string)) else {
        return false;
    };
    allowed.iter().any(|h| {
        let h = h.trim_start_matches('.');
        host == h || host.ends_with(&format!(".{}", h))
    })
}

/// Local file name for the `index`-th media item of a profile.
///
/// `<post id>.<ext>` when the item carries a post id, otherwise
/// `image_001.<ext>` / `video_001.<ext>` (1-based). The extension comes from
/// the URL path when it is an allowed media extension, else `jpg` or `mp4`.
pub fn media_file_name(item: &MediaItem, index: usize) -> String {
    let default_ext = match item.kind {
        MediaKind::Image => "jpg",
        MediaKind::Video => "mp4",
    };
    let ext = Url::parse(&item.url)
        .ok()
        .and_then(|u| {
            let file = u.path().rsplit('/').next().unwrap_or_default().to_string();
            file.rsplit_once('.')
                .map(|(_, ext)| ext.to_ascii_lowercase())
                .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        })
        .unwrap_or_else(|| default_ext.to_string());

    let stem = item
        .source_post_id
        .as_deref()
        .map(sanitize_key_component)
        .filter(|id| !id.is_empty());
    match stem {
        Some(id) => format!("{}.{}", id, ext),
        None => {
            let prefix = match item.kind {
                MediaKind::Image => "image",
                MediaKind::Video => "video",
            };
            format!("{}_{:03}.{}", prefix, index + 1, ext)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_protocol_relative() {
        assert_eq!(
            normalize_media_url("//cdn.shopify.com/s/files/1/a.jpg").as_deref(),
            Some("https://cdn.shopify.com/s/files/1/a.jpg")
        );
    }

    #[test]
    fn test_normalize_rejects_relative_and_data_uris() {
        assert_eq!(normalize_media_url("/images/a.jpg"), None);
        assert_eq!(normalize_media_url("data:image/png;base64,AAAA"), None);
        assert_eq!(normalize_media_url(""), None);
    }

    #[test]
    fn test_clean_fills_width_template_and_strips_suffix() {
        let cleaned = clean_media_url(
            "https://cdn.shopify.com/s/files/1/products/shirt_{width}x.jpg?v=1699999999",
        );
        assert_eq!(cleaned, "https://cdn.shopify.com/s/files/1/products/shirt.jpg");
    }

    #[test]
    fn test_clean_strips_fixed_size_suffix_keeps_other_params() {
        let cleaned =
            clean_media_url("https://cdn.shopify.com/files/tee_600x800.png?v=12&crop=center");
        assert_eq!(cleaned, "https://cdn.shopify.com/files/tee.png?crop=center");
    }

    #[test]
    fn test_clean_leaves_plain_urls_alone() {
        let url = "https://scontent.cdninstagram.com/v/t51/12345_n.jpg?stp=dst-jpg";
        assert_eq!(clean_media_url(url), url);
    }

    #[test]
    fn test_junk_filter() {
        assert!(is_junk_media_url("https://a.co/x.png"));
        assert!(is_junk_media_url("https://cdn.shopify.com/files/brand-logo.png"));
        assert!(is_junk_media_url("https://cdn.shopify.com/files/cart_ICON.svg"));
        assert!(!is_junk_media_url("https://cdn.shopify.com/files/silk-dress-front.jpg"));
    }

    #[test]
    fn test_junk_filter_ignores_markers_outside_file_name() {
        assert!(!is_junk_media_url(
            "https://cdn.shopify.com/icons-store/products/dress-front.jpg"
        ));
    }

    #[test]
    fn test_host_allowed_matches_subdomains() {
        let hosts = vec!["cdninstagram.com".to_string()];
        assert!(host_allowed("https://scontent-lhr8-1.cdninstagram.com/a.jpg", &hosts));
        assert!(host_allowed("https://cdninstagram.com/a.jpg", &hosts));
        assert!(!host_allowed("https://evilcdninstagram.com/a.jpg", &hosts));
        assert!(!host_allowed("https://example.com/a.jpg", &hosts));
        assert!(host_allowed("https://example.com/a.jpg", &[]));
    }

    #[test]
    fn test_media_file_name_prefers_post_id() {
        let item = MediaItem {
            kind: MediaKind::Video,
            url: "https://scontent.cdninstagram.com/v/clip.mov?x=1".into(),
            source_post_id: Some("CxYz_12".into()),
        };
        assert_eq!(media_file_name(&item, 4), "CxYz_12.mov");
    }

    #[test]
    fn test_media_file_name_numbers_and_defaults_extension() {
        let item = MediaItem {
            kind: MediaKind::Image,
            url: "https://scontent.cdninstagram.com/v/t51/abc".into(),
            source_post_id: None,
        };
        assert_eq!(media_file_name(&item, 0), "image_001.jpg");
        assert_eq!(media_file_name(&item, 11), "image_012.jpg");
    }
}
