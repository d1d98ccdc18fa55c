//! Shared helpers for service data types.

use chrono::{DateTime, Utc};

/// Storage service REST API version sent as `x-ms-version`.
pub const STORAGE_SERVICE_VERSION: &str = "2021-08-06";

/// Parse an RFC 1123 HTTP date (`Mon, 15 Jan 2024 10:30:00 GMT`).
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Format a timestamp as an RFC 1123 HTTP date.
pub fn format_http_date(time: DateTime<Utc>) -> String {
    time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}
