//! HTTP transfers over presigned URLs.
//!
//! Presigned URLs carry their own authorization, so these requests go through
//! a plain reqwest client instead of the S3 SDK. Parts are sent strictly one
//! after another and nothing is retried.

use std::ops::RangeInclusive;
use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use quick_xml::Reader;
use quick_xml::events::Event;
use reqwest::header::{ETAG, RANGE};
use reqwest::{Client, Response};
use tokio::io::AsyncWriteExt;

use crate::error::status_reason;
use crate::{Result, StorageError, TRACING_TARGET_TRANSFER};

/// Transfers over presigned URLs.
#[async_trait]
pub trait PresignedTransfer: Send + Sync {
    /// Uploads one multipart part and returns its ETag.
    async fn put_part(&self, url: &str, body: Vec<u8>) -> Result<String>;

    /// Fetches an inclusive byte range.
    async fn get_range(&self, url: &str, range: RangeInclusive<u64>) -> Result<Bytes>;

    /// Streams the whole object into `path` and returns the byte count and duration.
    async fn download_to_file(&self, url: &str, path: &Path) -> Result<(u64, Duration)>;

    /// Fetches the first byte to prove the URL grants read access.
    async fn probe(&self, url: &str) -> Result<()> {
        self.get_range(url, 0..=0).await.map(|_| ())
    }
}

/// Reqwest-based [`PresignedTransfer`].
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    http: Client,
}

impl HttpTransfer {
    /// Creates a transfer client without request timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Config`] if the TLS backend cannot be initialized.
    pub fn new() -> Result<Self> {
        let http = Client::builder()
            .build()
            .map_err(|e| StorageError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { http })
    }
}

#[async_trait]
impl PresignedTransfer for HttpTransfer {
    async fn put_part(&self, url: &str, body: Vec<u8>) -> Result<String> {
        let size = body.len();
        let response = check_status(self.http.put(url).body(body).send().await?).await?;

        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| StorageError::InvalidRequest("part upload returned no ETag".into()))?;

        tracing::debug!(target: TRACING_TARGET_TRANSFER, size, etag = %etag, "Part uploaded");
        Ok(etag)
    }

    async fn get_range(&self, url: &str, range: RangeInclusive<u64>) -> Result<Bytes> {
        let header = range_header(&range);
        tracing::debug!(target: TRACING_TARGET_TRANSFER, range = %header, "Fetching range");

        let response = self.http.get(url).header(RANGE, header).send().await?;
        Ok(check_status(response).await?.bytes().await?)
    }

    async fn download_to_file(&self, url: &str, path: &Path) -> Result<(u64, Duration)> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let start = Instant::now();
        let mut response = check_status(self.http.get(url).send().await?).await?;
        let mut file = tokio::fs::File::create(path).await?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;

        let elapsed = start.elapsed();
        tracing::debug!(
            target: TRACING_TARGET_TRANSFER,
            path = %path.display(),
            bytes = written,
            elapsed = ?elapsed,
            "Download written to file"
        );

        Ok((written, elapsed))
    }
}

/// Formats an inclusive range as an HTTP `Range` header value.
fn range_header(range: &RangeInclusive<u64>) -> String {
    format!("bytes={}-{}", range.start(), range.end())
}

/// Passes successful responses through and turns the rest into errors.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let reason = match (xml_element(&body, "Code"), xml_element(&body, "Message")) {
        (Some(code), Some(message)) => format!("{code}: {message}"),
        (Some(code), None) => code,
        _ => status_reason(status.as_u16()),
    };

    Err(StorageError::UnexpectedStatus {
        status: status.as_u16(),
        reason,
    })
}

/// Extracts the unescaped text of the first `<name>` element of an S3 error
/// document. Namespace prefixes and attributes are ignored.
fn xml_element(body: &str, name: &str) -> Option<String> {
    let mut reader = Reader::from_str(body);
    let mut inside = false;
    let mut text = String::new();

    loop {
        match reader.read_event().ok()? {
            Event::Start(e) if e.local_name().as_ref() == name.as_bytes() => inside = true,
            Event::Text(e) if inside => text.push_str(&e.unescape().ok()?),
            Event::End(e) if inside && e.local_name().as_ref() == name.as_bytes() => {
                let text = text.trim();
                return (!text.is_empty()).then(|| text.to_string());
            }
            Event::Eof => return None,
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCESS_DENIED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Error><Code>AccessDenied</Code><Message>Access Denied</Message><RequestId>1</RequestId></Error>"#;

    #[test]
    fn range_header_is_inclusive() {
        assert_eq!(range_header(&(0..=0)), "bytes=0-0");
        assert_eq!(range_header(&(16..=31)), "bytes=16-31");
    }

    #[test]
    fn parses_s3_error_document() {
        assert_eq!(xml_element(ACCESS_DENIED, "Code").as_deref(), Some("AccessDenied"));
        assert_eq!(xml_element(ACCESS_DENIED, "Message").as_deref(), Some("Access Denied"));
        assert_eq!(xml_element(ACCESS_DENIED, "Resource"), None);
        assert_eq!(xml_element("", "Code"), None);
        assert_eq!(xml_element("<Error><Code></Code></Error>", "Code"), None);
    }

    #[test]
    fn error_document_text_is_unescaped() {
        let body = "<Error><Code>NoSuchKey</Code>\
            <Message>The key &apos;a&amp;b&apos; doesn&apos;t exist</Message></Error>";
        assert_eq!(
            xml_element(body, "Message").as_deref(),
            Some("The key 'a&b' doesn't exist")
        );
    }

    #[test]
    fn error_document_elements_may_carry_attributes() {
        let body = r#"<Error><Code xmlns="x">AccessDenied</Code></Error>"#;
        assert_eq!(xml_element(body, "Code").as_deref(), Some("AccessDenied"));

        let prefixed = "<s3:Error><s3:Code>SlowDown</s3:Code></s3:Error>";
        assert_eq!(xml_element(prefixed, "Code").as_deref(), Some("SlowDown"));
    }

    #[test]
    fn client_is_created() {
        assert!(HttpTransfer::new().is_ok());
    }
}
