//! HTTP exchange seam of the executor.
//!
//! The executor only sees [`HttpRequest`], [`HttpResponse`] and the
//! [`HttpTransport`] trait. A transport reports an `Err` only when no response
//! was obtained; every status code, 5xx included, comes back as `Ok` so that the
//! retry policy can classify it.

use crate::error::{NetworkError, RequestError, StorageError};
use async_trait::async_trait;
use bytes::Bytes;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use std::time::Duration;

/// Streaming request body handed to the transport.
pub type BodyStream =
    Box<dyn futures::Stream<Item = Result<Bytes, std::io::Error>> + Send + Unpin>;

/// One attempt's wire request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method.
    pub method: String,
    /// Absolute request URL, query included.
    pub url: String,
    /// Headers; names are unique ignoring case.
    pub headers: HashMap<String, String>,
    /// Buffered body. Streamed bodies travel separately.
    pub body: Option<Bytes>,
    /// Time allowed for this attempt, including reading the response body.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Request without headers or body.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: HashMap::new(),
            body: None,
            timeout: None,
        }
    }

    /// Attach a buffered body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builder form of [`set_header`](Self::set_header).
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Set a header, replacing any existing header with the same name in any case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Case-insensitive header lookup.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    fn header_map(&self) -> Result<HeaderMap, StorageError> {
        let mut map = HeaderMap::with_capacity(self.headers.len());
        for (name, value) in &self.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                RequestError::Validation {
                    message: format!("Invalid header name '{}': {}", name, e),
                }
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|e| {
                RequestError::Validation {
                    message: format!("Invalid value for header '{}': {}", name, e),
                }
            })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }
}

/// A received response, body fully read.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl HttpResponse {
    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Case-insensitive header lookup.
    pub fn get_header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// `Content-Length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.get_header("content-length")
            .and_then(|v| v.trim().parse().ok())
    }

    /// `Content-Type`.
    pub fn content_type(&self) -> Option<&str> {
        self.get_header("content-type")
    }

    /// `ETag`.
    pub fn etag(&self) -> Option<&str> {
        self.get_header("etag")
    }
}

fn find_header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends attempts over the network.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send a request with its buffered body, if any.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StorageError>;

    /// Send a request whose body is streamed. `request.body` is ignored.
    async fn send_streaming(
        &self,
        request: HttpRequest,
        body_stream: BodyStream,
    ) -> Result<HttpResponse, StorageError>;
}

/// Connection settings of [`ReqwestTransport`].
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// TCP/TLS connect timeout.
    pub connect_timeout: Duration,
    /// Upper bound on the time of one attempt, response body included.
    pub read_timeout: Duration,
    /// Idle connections kept per host.
    pub max_idle_connections: usize,
    /// How long an idle connection is kept.
    pub idle_timeout: Duration,
    /// Verify server certificates.
    pub verify_ssl: bool,
    /// `User-Agent` sent with every request.
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(90),
            max_idle_connections: 100,
            idle_timeout: Duration::from_secs(90),
            verify_ssl: true,
            user_agent: default_user_agent(),
        }
    }
}

/// `User-Agent` used unless configured otherwise.
pub fn default_user_agent() -> String {
    format!("azure-storage-integration/{}", env!("CARGO_PKG_VERSION"))
}

/// [`HttpTransport`] over a pooled `reqwest` client.
pub struct ReqwestTransport {
    client: reqwest::Client,
    read_timeout: Duration,
}

impl ReqwestTransport {
    /// Transport with default settings.
    pub fn new() -> Result<Self, StorageError> {
        Self::with_settings(TransportSettings::default())
    }

    /// Transport with explicit settings.
    pub fn with_settings(settings: TransportSettings) -> Result<Self, StorageError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .pool_max_idle_per_host(settings.max_idle_connections)
            .pool_idle_timeout(settings.idle_timeout)
            .danger_accept_invalid_certs(!settings.verify_ssl)
            .user_agent(settings.user_agent)
            .build()
            .map_err(|e| NetworkError::TlsError {
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            read_timeout: settings.read_timeout,
        })
    }

    /// The attempt's own timeout, never longer than the read timeout.
    fn attempt_timeout(&self, request: &HttpRequest) -> Duration {
        request
            .timeout
            .map_or(self.read_timeout, |t| t.min(self.read_timeout))
    }

    fn request_builder(
        &self,
        request: &HttpRequest,
    ) -> Result<(reqwest::RequestBuilder, Duration), StorageError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes()).map_err(|_| {
            RequestError::Validation {
                message: format!("Invalid HTTP method '{}'", request.method),
            }
        })?;
        let timeout = self.attempt_timeout(request);

        let builder = self
            .client
            .request(method, &request.url)
            .headers(request.header_map()?)
            .timeout(timeout);
        Ok((builder, timeout))
    }

    async fn exchange(
        &self,
        builder: reqwest::RequestBuilder,
        timeout: Duration,
    ) -> Result<HttpResponse, StorageError> {
        let response = builder
            .send()
            .await
            .map_err(|e| classify(&e, timeout))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                NetworkError::Timeout { duration: timeout }
            } else {
                NetworkError::Interrupted {
                    message: format!("response body: {}", e),
                }
            }
        })?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Map a reqwest failure to the network error taxonomy.
fn classify(e: &reqwest::Error, timeout: Duration) -> StorageError {
    let error = if e.is_timeout() {
        NetworkError::Timeout { duration: timeout }
    } else if e.is_body() || (e.is_request() && !e.is_connect()) {
        NetworkError::Interrupted {
            message: e.to_string(),
        }
    } else {
        NetworkError::ConnectionFailed {
            message: e.to_string(),
        }
    };
    error.into()
}

/// Headers with non-UTF-8 values are dropped.
fn collect_headers(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StorageError> {
        let (mut builder, timeout) = self.request_builder(&request)?;
        if let Some(body) = request.body {
            builder = builder.body(body);
        }
        self.exchange(builder, timeout).await
    }

    async fn send_streaming(
        &self,
        request: HttpRequest,
        body_stream: BodyStream,
    ) -> Result<HttpResponse, StorageError> {
        let (builder, timeout) = self.request_builder(&request)?;
        let builder = builder.body(reqwest::Body::wrap_stream(body_stream));
        self.exchange(builder, timeout).await
    }
}

impl std::fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}
