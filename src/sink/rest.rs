//! Supabase-compatible REST storage sink.
//!
//! Object API under `/storage/v1/...`, table API under `/rest/v1/<table>`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use url::Url;

use super::{split_key, validate_key, ObjectEntry, StorageSink};
use crate::config::{HTTP_STATUS_CONFLICT, HTTP_STATUS_TOO_MANY_REQUESTS};
use crate::error_handling::{InitializationError, SinkError};
use crate::initialization::init_storage_client;

/// Page size for object listing.
const LIST_PAGE_SIZE: usize = 1000;
/// Response bodies longer than this are cut in error messages.
const MAX_ERROR_BODY_CHARS: usize = 300;

#[derive(Debug, Deserialize)]
struct ListedObject {
    name: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    metadata: Option<ListedMetadata>,
}

#[derive(Debug, Deserialize)]
struct ListedMetadata {
    #[serde(default)]
    size: Option<u64>,
}

/// REST object store client.
#[derive(Debug, Clone)]
pub struct RestSink {
    client: reqwest::Client,
    base_url: Url,
    service_key: String,
    bucket: String,
}

impl RestSink {
    /// Creates a sink for `bucket` on the project at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns `SinkError::Unavailable` if `base_url` does not parse or the
    /// HTTP client cannot be built.
    pub fn new(
        base_url: &str,
        service_key: &str,
        bucket: &str,
        timeout: Duration,
    ) -> Result<Self, SinkError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            SinkError::Unavailable(format!("invalid storage URL '{}': {}", base_url, e))
        })?;
        let client = init_storage_client(timeout)
            .map_err(|e: InitializationError| SinkError::Unavailable(e.to_string()))?;
        Ok(RestSink {
            client,
            base_url,
            service_key: service_key.to_string(),
            bucket: bucket.to_string(),
        })
    }

    /// Builds `<base>/<segments...>`, percent-encoding each segment.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, SinkError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SinkError::Permanent(format!("storage URL cannot be a base: {}", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn object_url(&self, key: &str) -> Result<Url, SinkError> {
        let segments = ["storage", "v1", "object", self.bucket.as_str()]
            .into_iter()
            .chain(key.split('/'));
        self.endpoint(segments)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }

    async fn send(&self, request: RequestBuilder, context: &str) -> Result<Response, SinkError> {
        let response = self
            .authorized(request)
            .send()
            .await
            .map_err(|e| classify_transport_error(context, e))?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(classify_status(status, context, &body))
    }

    async fn list_page(
        &self,
        prefix: &str,
        search: Option<&str>,
        offset: usize,
    ) -> Result<Vec<ListedObject>, SinkError> {
        let url = self.endpoint(["storage", "v1", "object", "list", self.bucket.as_str()])?;
        let mut body = serde_json::json!({
            "prefix": prefix,
            "limit": LIST_PAGE_SIZE,
            "offset": offset,
            "sortBy": { "column": "name", "order": "asc" },
        });
        if let Some(search) = search {
            body["search"] = serde_json::Value::String(search.to_string());
        }
        let response = self.send(self.client.post(url).json(&body), prefix).await?;
        response
            .json::<Vec<ListedObject>>()
            .await
            .map_err(|e| SinkError::Transient(format!("{}: unreadable listing: {}", prefix, e)))
    }
}

/// Maps a non-success HTTP status to a sink error.
///
/// 429 and 5xx are transient, 409 means the object already exists, 401/403
/// mean the credentials or bucket are unusable, anything else is permanent.
fn classify_status(status: StatusCode, context: &str, body: &str) -> SinkError {
    let body: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
    let message = format!("{}: HTTP {} {}", context, status.as_u16(), body.trim());
    match status.as_u16() {
        HTTP_STATUS_CONFLICT => SinkError::AlreadyExists(context.to_string()),
        HTTP_STATUS_TOO_MANY_REQUESTS => SinkError::Transient(message),
        401 | 403 => SinkError::Unavailable(message),
        code if (500..600).contains(&code) => SinkError::Transient(message),
        _ => SinkError::Permanent(message),
    }
}

fn classify_transport_error(context: &str, error: reqwest::Error) -> SinkError {
    let message = format!("{}: {}", context, error);
    if error.is_builder() || error.is_redirect() {
        SinkError::Permanent(message)
    } else {
        SinkError::Transient(message)
    }
}

#[async_trait]
impl StorageSink for RestSink {
    async fn check_ready(&self) -> Result<(), SinkError> {
        let url = self.endpoint(["storage", "v1", "bucket", self.bucket.as_str()])?;
        match self.send(self.client.get(url), &self.bucket).await {
            Ok(_) => Ok(()),
            Err(SinkError::Transient(m)) | Err(SinkError::Permanent(m)) => {
                Err(SinkError::Unavailable(m))
            }
            Err(other) => Err(other),
        }
    }

    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<(), SinkError> {
        validate_key(key)?;
        let request = self
            .client
            .post(self.object_url(key)?)
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "true")
            .body(bytes);
        self.send(request, key).await?;
        Ok(())
    }

    async fn exists(&self, key: &str) -> Result<bool, SinkError> {
        validate_key(key)?;
        let (parent, name) = split_key(key);
        let listed = self.list_page(parent, Some(name), 0).await?;
        Ok(listed.iter().any(|o| o.name == name && o.id.is_some()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>, SinkError> {
        let prefix = prefix.trim_matches('/');
        let mut entries = Vec::new();
        let mut offset = 0;
        loop {
            let page = self.list_page(prefix, None, offset).await?;
            let page_len = page.len();
            entries.extend(page.into_iter().map(|o| ObjectEntry {
                is_folder: o.id.is_none(),
                size: o.metadata.and_then(|m| m.size).unwrap_or(0),
                name: o.name,
            }));
            if page_len < LIST_PAGE_SIZE {
                break;
            }
            offset += page_len;
        }
        Ok(entries)
    }

    async fn insert(&self, table: &str, rows: &[serde_json::Value]) -> Result<usize, SinkError> {
        if rows.is_empty() {
            return Ok(0);
        }
        let url = self.endpoint(["rest", "v1", table])?;
        let request = self
            .client
            .post(url)
            .header("Prefer", "return=representation,resolution=ignore-duplicates")
            .json(rows);
        let response = self.send(request, table).await?;
        // Only rows actually stored come back; duplicates are skipped server-side
        let stored = response
            .json::<Vec<serde_json::Value>>()
            .await
            .map_err(|e| SinkError::Transient(format!("{}: unreadable insert reply: {}", table, e)))?;
        Ok(stored.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_encodes_segments() {
        let sink = RestSink::new(
            "https://project.supabase.co/",
            "key",
            "brand media",
            Duration::from_secs(5),
        )
        .unwrap();
        let url = sink.object_url("ACME/scrolling_brand_media/a.jpg").unwrap();
        assert_eq!(
            url.as_str(),
            "https://project.supabase.co/storage/v1/object/brand%20media/ACME/scrolling_brand_media/a.jpg"
        );
    }

    #[test]
    fn test_classify_status() {
        assert!(matches!(
            classify_status(StatusCode::CONFLICT, "k", ""),
            SinkError::AlreadyExists(_)
        ));
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "k", "").is_transient());
        assert!(classify_status(StatusCode::BAD_GATEWAY, "k", "").is_transient());
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, "k", ""),
            SinkError::Unavailable(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::PAYLOAD_TOO_LARGE, "k", "too big"),
            SinkError::Permanent(_)
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        let err = RestSink::new("not a url", "key", "media", Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, SinkError::Unavailable(_)));
    }
}
