//! Shared Key authorization for the blob and queue services.

use super::{hmac_sha256, RequestSigner};
use crate::error::{SigningError, StorageError};
use crate::operation::{ClientLogLevel, OperationContext};
use crate::transport::HttpRequest;
use crate::types::{format_http_date, STORAGE_SERVICE_VERSION};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretVec};
use std::collections::BTreeMap;
use tracing::trace;
use url::Url;

/// Standard headers included, in order, in the string to sign.
const SIGNED_STANDARD_HEADERS: [&str; 11] = [
    "content-encoding",
    "content-language",
    "content-length",
    "content-md5",
    "content-type",
    "date",
    "if-modified-since",
    "if-match",
    "if-none-match",
    "if-unmodified-since",
    "range",
];

/// Build the canonicalized `x-ms-*` headers block.
///
/// Names are lowercased and sorted; values have their whitespace collapsed. Each
/// header ends with a newline.
pub fn canonicalized_headers(request: &HttpRequest) -> String {
    let mut header_map: BTreeMap<String, Vec<String>> = BTreeMap::new();

    for (name, value) in &request.headers {
        let name_lower = name.to_lowercase();
        if !name_lower.starts_with("x-ms-") {
            continue;
        }

        let trimmed = value.split_whitespace().collect::<Vec<_>>().join(" ");
        header_map.entry(name_lower).or_default().push(trimmed);
    }

    header_map
        .iter()
        .map(|(name, values)| format!("{}:{}\n", name, values.join(",")))
        .collect()
}

/// Build the canonicalized resource: `/account/path` followed by one
/// `\nname:value1,value2` line per query parameter, sorted by name.
pub fn canonicalized_resource(url: &Url, account_name: &str) -> String {
    let path = if url.path().is_empty() { "/" } else { url.path() };
    let mut resource = format!("/{}{}", account_name, path);

    let mut params: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, value) in url.query_pairs() {
        params
            .entry(name.to_lowercase())
            .or_default()
            .push(value.into_owned());
    }

    for (name, mut values) in params {
        values.sort();
        resource.push('\n');
        resource.push_str(&name);
        resource.push(':');
        resource.push_str(&values.join(","));
    }

    resource
}

/// Build the Shared Key string to sign.
///
/// Format:
/// ```text
/// VERB\n
/// Content-Encoding\n ... Range\n   (eleven standard headers)
/// CanonicalizedHeaders
/// CanonicalizedResource
/// ```
/// `Date` is left empty when `x-ms-date` is present, and a zero `Content-Length`
/// is written as an empty line.
pub fn build_string_to_sign(request: &HttpRequest, url: &Url, account_name: &str) -> String {
    let has_ms_date = request.get_header("x-ms-date").is_some();
    let body_length = request.body.as_ref().map(|b| b.len()).unwrap_or(0);

    let mut string_to_sign = request.method.to_uppercase();
    string_to_sign.push('\n');

    for header in SIGNED_STANDARD_HEADERS {
        let value = match header {
            "date" if has_ms_date => String::new(),
            "content-length" => match request.get_header(header) {
                Some(v) if v.trim() == "0" => String::new(),
                Some(v) => v.trim().to_string(),
                None if body_length > 0 => body_length.to_string(),
                None => String::new(),
            },
            _ => request.get_header(header).unwrap_or_default().trim().to_string(),
        };
        string_to_sign.push_str(&value);
        string_to_sign.push('\n');
    }

    string_to_sign.push_str(&canonicalized_headers(request));
    string_to_sign.push_str(&canonicalized_resource(url, account_name));
    string_to_sign
}

/// Signs requests with the account key.
pub struct SharedKeySigner {
    account_name: String,
    key: SecretVec<u8>,
}

impl SharedKeySigner {
    /// Create a signer from the account name and decoded account key.
    pub fn new(account_name: impl Into<String>, key: Vec<u8>) -> Self {
        Self {
            account_name: account_name.into(),
            key: SecretVec::new(key),
        }
    }

    /// Account the signer signs for.
    pub fn account_name(&self) -> &str {
        &self.account_name
    }

    /// Compute the `Authorization` header value for a request.
    pub fn authorization(&self, request: &HttpRequest, url: &Url) -> Result<String, StorageError> {
        let string_to_sign = build_string_to_sign(request, url, &self.account_name);
        let mac = hmac_sha256(self.key.expose_secret(), string_to_sign.as_bytes())?;
        let signature = STANDARD.encode(mac);
        Ok(format!("SharedKey {}:{}", self.account_name, signature))
    }
}

#[async_trait]
impl RequestSigner for SharedKeySigner {
    async fn sign(
        &self,
        mut request: HttpRequest,
        context: &OperationContext,
    ) -> Result<HttpRequest, StorageError> {
        let url = Url::parse(&request.url).map_err(|e| SigningError::InvalidUrl {
            url: request.url.clone(),
            message: e.to_string(),
        })?;

        request.set_header("x-ms-date", format_http_date(Utc::now()));
        if request.get_header("x-ms-version").is_none() {
            request.set_header("x-ms-version", STORAGE_SERVICE_VERSION);
        }

        let authorization = self.authorization(&request, &url)?;
        if context.should_log(ClientLogLevel::Verbose) {
            trace!(
                client_request_id = %context.client_request_id(),
                string_to_sign = %build_string_to_sign(&request, &url, &self.account_name),
                "Signed request"
            );
        }
        request.set_header("Authorization", authorization);
        Ok(request)
    }
}

impl std::fmt::Debug for SharedKeySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedKeySigner")
            .field("account_name", &self.account_name)
            .finish_non_exhaustive()
    }
}
