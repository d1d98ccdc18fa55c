//! Per-attempt request results.

use crate::error::parse_extended_error;
use crate::location::StorageLocation;
use crate::transport::HttpResponse;
use crate::types::parse_http_date;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Structured error returned by the service in an error response body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtendedError {
    code: String,
    message: String,
    details: HashMap<String, String>,
}

impl ExtendedError {
    /// Create an extended error with a code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            details: HashMap::new(),
        }
    }

    /// Service error code, e.g. `ServerBusy`. Empty when none was returned.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Service error message. Empty when none was returned.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Additional elements of the error document.
    pub fn details(&self) -> &HashMap<String, String> {
        &self.details
    }

    pub(crate) fn set_code(&mut self, code: String) {
        self.code = code;
    }

    pub(crate) fn set_message(&mut self, message: String) {
        self.message = message;
    }

    pub(crate) fn add_detail(&mut self, key: String, value: String) {
        self.details.insert(key, value);
    }
}

/// Outcome of a single physical attempt.
///
/// A result is immutable once recorded. The executor appends exactly one result per
/// attempt to the operation context, whether or not a response was received.
#[derive(Debug, Clone)]
pub struct RequestResult {
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    target_location: StorageLocation,
    http_status_code: Option<u16>,
    service_request_id: Option<String>,
    request_date: Option<DateTime<Utc>>,
    etag: Option<String>,
    content_length: Option<u64>,
    content_md5: Option<String>,
    request_server_encrypted: bool,
    extended_error: ExtendedError,
}

impl RequestResult {
    /// Create a result with only timing, location and status information.
    pub fn new(
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        target_location: StorageLocation,
        http_status_code: Option<u16>,
    ) -> Self {
        Self {
            start_time,
            end_time,
            target_location,
            http_status_code,
            service_request_id: None,
            request_date: None,
            etag: None,
            content_length: None,
            content_md5: None,
            request_server_encrypted: false,
            extended_error: ExtendedError::default(),
        }
    }

    /// Result of an attempt for which no response was obtained.
    pub fn transport_failure(start_time: DateTime<Utc>, target_location: StorageLocation) -> Self {
        Self::new(start_time, Utc::now(), target_location, None)
    }

    /// Result of an attempt that received a response.
    ///
    /// Service headers are captured, and for non-2xx responses the body is parsed
    /// for the structured service error.
    pub fn from_response(
        start_time: DateTime<Utc>,
        target_location: StorageLocation,
        response: &HttpResponse,
    ) -> Self {
        let mut result = Self::new(start_time, Utc::now(), target_location, Some(response.status));
        result.service_request_id = response.get_header("x-ms-request-id").map(String::from);
        result.request_date = response.get_header("date").and_then(parse_http_date);
        result.etag = response.get_header("etag").map(String::from);
        result.content_length = response
            .get_header("content-length")
            .and_then(|v| v.trim().parse().ok());
        result.content_md5 = response.get_header("content-md5").map(String::from);
        result.request_server_encrypted = response
            .get_header("x-ms-request-server-encrypted")
            .map(|v| v.trim().eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        if !response.is_success() {
            if let Some(error) =
                parse_extended_error(response.get_header("content-type"), &response.body)
            {
                result.extended_error = error;
            }
        }
        result
    }

    /// When the attempt was started.
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// When the attempt completed or failed.
    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Location the attempt was sent to.
    pub fn target_location(&self) -> StorageLocation {
        self.target_location
    }

    /// True if a response was received for the attempt.
    pub fn is_response_available(&self) -> bool {
        self.http_status_code.is_some()
    }

    /// HTTP status code, if a response was received.
    pub fn http_status_code(&self) -> Option<u16> {
        self.http_status_code
    }

    /// Service request ID (`x-ms-request-id`).
    pub fn service_request_id(&self) -> Option<&str> {
        self.service_request_id.as_deref()
    }

    /// Service `Date` header.
    pub fn request_date(&self) -> Option<DateTime<Utc>> {
        self.request_date
    }

    /// `ETag` header.
    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    /// `Content-Length` header.
    pub fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// `Content-MD5` header.
    pub fn content_md5(&self) -> Option<&str> {
        self.content_md5.as_deref()
    }

    /// True if the service reported the request payload as encrypted at rest.
    pub fn request_server_encrypted(&self) -> bool {
        self.request_server_encrypted
    }

    /// Structured service error. Empty for successful attempts.
    pub fn extended_error(&self) -> &ExtendedError {
        &self.extended_error
    }
}
