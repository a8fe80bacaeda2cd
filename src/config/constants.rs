//! Configuration constants.
//!
//! This module defines the constants used throughout the application,
//! including politeness delays, timeouts, retry budgets, and storage layout
//! segments.

use std::time::Duration;

/// Progress is logged every N processed units.
pub const LOGGING_INTERVAL: usize = 5;

// Crawl politeness
/// Minimum delay between the completion of one request and the start of the next.
pub const DEFAULT_MIN_REQUEST_DELAY: Duration = Duration::from_secs(2);
/// Upper bound of the random jitter added on top of the minimum delay.
pub const DEFAULT_DELAY_JITTER: Duration = Duration::from_millis(1000);

// Network operation timeouts
/// Per-request timeout in seconds (send + body read)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
/// Per-request timeout for binary media downloads in seconds.
/// Videos are larger than pages, so they get more room.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

// Retry strategy
/// Total attempts for a crawl request (initial attempt + retries)
pub const RETRY_MAX_ATTEMPTS: usize = 3;
/// Fixed delay between crawl retries in milliseconds
pub const RETRY_DELAY_MS: u64 = 500;
/// Total attempts for a storage upload
pub const UPLOAD_MAX_ATTEMPTS: usize = 3;
/// Fixed delay between upload retries in milliseconds
pub const UPLOAD_RETRY_DELAY_MS: u64 = 1000;

/// HTTP status code for Too Many Requests
pub const HTTP_STATUS_TOO_MANY_REQUESTS: u16 = 429;
/// HTTP status code the storage API uses for an already existing object
pub const HTTP_STATUS_CONFLICT: u16 = 409;

// Parallel migration
/// Upper bound on migration workers
pub const MAX_PARALLEL_WORKERS: usize = 5;
/// Worker count used when parallel mode is requested without an explicit count
pub const DEFAULT_PARALLEL_WORKERS: usize = 3;

/// Default User-Agent string for HTTP requests.
///
/// Users can override this via the `--user-agent` CLI flag.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

/// Profile URL template used when a subject has no explicit URL.
/// `{handle}` is replaced by the subject's remote handle.
pub const DEFAULT_PROFILE_URL_TEMPLATE: &str = "https://www.instagram.com/{handle}/";

/// Hosts whose media URLs the markup strategy accepts (suffix match).
pub const DEFAULT_MEDIA_HOSTS: &[&str] = &["cdninstagram.com", "fbcdn.net", "cdn.shopify.com"];

// Response and body size limits
/// Maximum page body size in bytes (5MB)
/// Larger pages are rejected as a network error to bound memory use
pub const MAX_RESPONSE_BODY_SIZE: usize = 5 * 1024 * 1024;

// Extraction
/// Maximum nesting depth walked by the embedded JSON strategy
pub const MAX_JSON_DEPTH: usize = 12;
/// Media URLs this short or shorter are treated as junk by the markup strategy
pub const MIN_MEDIA_URL_LENGTH: usize = 20;
/// Width/height substituted into templated CDN image URLs
pub const CDN_IMAGE_SIZE: &str = "2048";

// Local content tree
/// File extensions (lowercase, no dot) eligible for migration
pub const ALLOWED_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "mp4", "mov"];
/// Subfolders of a brand directory that hold brand-level media
pub const BRAND_MEDIA_SUBDIRS: &[&str] = &["images", "videos"];
/// Storage segment for brand-level media
pub const BRAND_MEDIA_SEGMENT: &str = "scrolling_brand_media";
/// Storage segment for product media
pub const PRODUCT_MEDIA_SEGMENT: &str = "scrolling_product_media";
/// Name of the per-folder manifest written by the index builder
pub const INDEX_FILE_NAME: &str = "index.json";
/// Default table for product catalog rows
pub const DEFAULT_PRODUCT_TABLE: &str = "products";

// Error message size limits
/// Maximum error message length in characters (2000 chars)
/// Error messages longer than this are truncated with a note about the original length
pub const MAX_ERROR_MESSAGE_LENGTH: usize = 2000;
