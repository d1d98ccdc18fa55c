//! Mock HTTP transport for testing.

use crate::error::{NetworkError, StorageError};
use crate::transport::{BodyStream, HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use url::Url;

/// Mock HTTP response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body.
    pub body: Bytes,
}

impl MockResponse {
    /// Create a response with the given status and empty body.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: Bytes::new(),
        }
    }

    /// Create a 200 response with empty body.
    pub fn ok() -> Self {
        Self::status(200)
    }

    /// Create a 200 response with body.
    pub fn ok_with_body(body: impl Into<Bytes>) -> Self {
        Self::ok().with_body(body)
    }

    /// Create an error response with an XML `<Error>` body.
    pub fn with_error(status: u16, code: &str, message: &str) -> Self {
        Self::status(status)
            .with_header("Content-Type", "application/xml")
            .with_body(super::TestFixtures::error_xml(code, message))
    }

    /// Add a header to the response.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set the response body.
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Scripted outcome of one request.
#[derive(Debug, Clone)]
enum MockOutcome {
    Response(MockResponse),
    Failure(String),
}

/// Mock HTTP transport for testing.
///
/// Outcomes are consumed in FIFO order. When the queue is empty, a response
/// registered for the request's host is used, then the default response; with
/// neither, the request fails as a connection error.
#[derive(Default)]
pub struct MockTransport {
    outcomes: Mutex<VecDeque<MockOutcome>>,
    requests: Mutex<Vec<HttpRequest>>,
    default_response: Option<MockResponse>,
    host_defaults: HashMap<String, MockResponse>,
}

impl MockTransport {
    /// Create a new mock transport with no responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock transport with queued responses.
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        let transport = Self::new();
        for response in responses {
            transport.push_response(response);
        }
        transport
    }

    /// Create a mock transport with a default response.
    pub fn with_default(response: MockResponse) -> Self {
        Self {
            default_response: Some(response),
            ..Self::default()
        }
    }

    /// Answer every unscripted request for `host` with `response`.
    pub fn with_host_default(mut self, host: impl Into<String>, response: MockResponse) -> Self {
        self.host_defaults.insert(host.into(), response);
        self
    }

    /// Queue a response.
    pub fn push_response(&self, response: MockResponse) {
        self.outcomes.lock().push_back(MockOutcome::Response(response));
    }

    /// Queue a transport failure (no response obtained).
    pub fn push_failure(&self, message: impl Into<String>) {
        self.outcomes.lock().push_back(MockOutcome::Failure(message.into()));
    }

    /// Get all recorded requests.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.requests.lock().len()
    }

    /// Get the last request made.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.requests.lock().last().cloned()
    }

    /// Hosts the recorded requests were sent to, in order.
    pub fn requested_hosts(&self) -> Vec<String> {
        self.requests
            .lock()
            .iter()
            .filter_map(|r| Url::parse(&r.url).ok())
            .filter_map(|u| u.host_str().map(String::from))
            .collect()
    }

    fn respond(&self, request: HttpRequest) -> Result<HttpResponse, StorageError> {
        let host = Url::parse(&request.url)
            .ok()
            .and_then(|u| u.host_str().map(String::from));
        self.requests.lock().push(request);

        let outcome = self.outcomes.lock().pop_front().or_else(|| {
            host.and_then(|h| self.host_defaults.get(&h).cloned())
                .or_else(|| self.default_response.clone())
                .map(MockOutcome::Response)
        });

        match outcome {
            Some(MockOutcome::Response(mock)) => Ok(HttpResponse {
                status: mock.status,
                headers: mock.headers,
                body: mock.body,
            }),
            Some(MockOutcome::Failure(message)) => {
                Err(NetworkError::ConnectionFailed { message }.into())
            }
            None => Err(NetworkError::ConnectionFailed {
                message: "No mock response available".to_string(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, StorageError> {
        self.respond(request)
    }

    async fn send_streaming(
        &self,
        mut request: HttpRequest,
        mut body_stream: BodyStream,
    ) -> Result<HttpResponse, StorageError> {
        let mut body = BytesMut::new();
        while let Some(chunk) = body_stream.next().await {
            let chunk = chunk.map_err(|e| NetworkError::Interrupted {
                message: e.to_string(),
            })?;
            body.extend_from_slice(&chunk);
        }
        request.body = Some(body.freeze());
        self.respond(request)
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("queued_outcomes", &self.outcomes.lock().len())
            .field("recorded_requests", &self.requests.lock().len())
            .finish()
    }
}
