//! Blob service data structures.

use super::parse_http_date;
use super::ContinuationToken;
use crate::transport::HttpResponse;
use bytes::Bytes;
use chrono::{DateTime, Utc};

/// System properties of a blob.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobProperties {
    /// Entity tag.
    pub etag: Option<String>,
    /// Last modification time.
    pub last_modified: Option<DateTime<Utc>>,
    /// Size in bytes.
    pub content_length: u64,
    /// MIME type.
    pub content_type: Option<String>,
    /// Base64 MD5 of the content, as stored by the service.
    pub content_md5: Option<String>,
    /// `BlockBlob`, `PageBlob` or `AppendBlob`.
    pub blob_type: Option<String>,
}

impl BlobProperties {
    /// Read blob properties from response headers.
    pub fn from_response(response: &HttpResponse) -> Self {
        Self {
            etag: response.etag().map(String::from),
            last_modified: response.get_header("last-modified").and_then(parse_http_date),
            content_length: response.content_length().unwrap_or(0),
            content_type: response.content_type().map(String::from),
            content_md5: response.get_header("content-md5").map(String::from),
            blob_type: response.get_header("x-ms-blob-type").map(String::from),
        }
    }
}

/// A blob in a listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobItem {
    /// Blob name.
    pub name: String,
    /// Blob properties.
    pub properties: BlobProperties,
}

/// One segment of a blob listing.
#[derive(Debug, Clone, Default)]
pub struct ListBlobsSegment {
    /// Blobs in this segment.
    pub blobs: Vec<BlobItem>,
    /// Virtual directory prefixes in this segment.
    pub prefixes: Vec<String>,
    /// Token for the next segment; `None` when the listing is complete.
    pub continuation_token: Option<ContinuationToken>,
}

/// A downloaded blob.
#[derive(Debug, Clone)]
pub struct DownloadedBlob {
    /// Blob content.
    pub content: Bytes,
    /// Blob properties.
    pub properties: BlobProperties,
}

/// Options for listing blobs.
#[derive(Debug, Clone, Default)]
pub struct ListBlobsOptions {
    /// Only return blobs whose names begin with this prefix.
    pub prefix: Option<String>,
    /// Group names sharing a prefix up to this delimiter.
    pub delimiter: Option<String>,
    /// Maximum number of results per segment.
    pub max_results: Option<u32>,
}

impl ListBlobsOptions {
    /// Create empty listing options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the name prefix.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Set the hierarchy delimiter.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = Some(delimiter.into());
        self
    }

    /// Set the segment size.
    pub fn max_results(mut self, max_results: u32) -> Self {
        self.max_results = Some(max_results);
        self
    }
}
