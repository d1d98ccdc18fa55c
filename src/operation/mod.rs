//! Per-operation state shared between the caller and the executor.
//!
//! An [`OperationContext`] spans one logical operation. It carries the client
//! request ID sent with every attempt, user headers, the log level gate, optional
//! observation hooks, and the ordered list of [`RequestResult`]s, one per physical
//! attempt. The context is a cheap handle: clones share the same state, so the
//! caller can inspect results while (or after) the executor records them.

mod result;

pub use result::{ExtendedError, RequestResult};

use crate::transport::{HttpRequest, HttpResponse};
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Client-side log verbosity for an operation.
///
/// Ordered from quietest to noisiest; a message is emitted when its level is at
/// or below the context's level and the context is not `Off`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ClientLogLevel {
    /// No logging.
    Off,
    /// Failures only.
    Error,
    /// Failures and retries.
    #[default]
    Warning,
    /// Per-attempt progress.
    Informational,
    /// Everything, including signing and hook activity.
    Verbose,
}

/// Observer invoked just before each attempt is sent.
pub type SendingRequestHook = Arc<dyn Fn(&HttpRequest, &OperationContext) + Send + Sync>;

/// Observer invoked after each response is received.
pub type ResponseReceivedHook =
    Arc<dyn Fn(&HttpRequest, &HttpResponse, &OperationContext) + Send + Sync>;

struct Settings {
    client_request_id: String,
    log_level: ClientLogLevel,
    user_headers: HashMap<String, String>,
    sending_request: Option<SendingRequestHook>,
    response_received: Option<ResponseReceivedHook>,
}

#[derive(Default)]
struct Timing {
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
}

struct Inner {
    settings: RwLock<Settings>,
    timing: Mutex<Timing>,
    results: Mutex<Vec<RequestResult>>,
}

/// Shared per-operation context.
#[derive(Clone)]
pub struct OperationContext {
    inner: Arc<Inner>,
}

impl OperationContext {
    /// Create a context with a fresh client request ID and the default log level.
    pub fn new() -> Self {
        Self::with_log_level(ClientLogLevel::default())
    }

    /// Create a context with a fresh client request ID and the given log level.
    pub fn with_log_level(log_level: ClientLogLevel) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings: RwLock::new(Settings {
                    client_request_id: uuid::Uuid::new_v4().to_string(),
                    log_level,
                    user_headers: HashMap::new(),
                    sending_request: None,
                    response_received: None,
                }),
                timing: Mutex::new(Timing::default()),
                results: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Client request ID sent as `x-ms-client-request-id`.
    pub fn client_request_id(&self) -> String {
        self.inner.settings.read().client_request_id.clone()
    }

    /// Replace the client request ID.
    pub fn set_client_request_id(&self, id: impl Into<String>) {
        self.inner.settings.write().client_request_id = id.into();
    }

    /// Current log level.
    pub fn log_level(&self) -> ClientLogLevel {
        self.inner.settings.read().log_level
    }

    /// Change the log level.
    pub fn set_log_level(&self, level: ClientLogLevel) {
        self.inner.settings.write().log_level = level;
    }

    /// Returns true if a message at `level` should be emitted.
    pub fn should_log(&self, level: ClientLogLevel) -> bool {
        let current = self.log_level();
        level != ClientLogLevel::Off && current != ClientLogLevel::Off && level <= current
    }

    /// Headers added to every attempt of the operation.
    pub fn user_headers(&self) -> HashMap<String, String> {
        self.inner.settings.read().user_headers.clone()
    }

    /// Add a header to every attempt of the operation.
    pub fn add_user_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.inner
            .settings
            .write()
            .user_headers
            .insert(name.into(), value.into());
    }

    /// Install the hook called before each attempt is sent.
    pub fn set_sending_request<F>(&self, hook: F)
    where
        F: Fn(&HttpRequest, &OperationContext) + Send + Sync + 'static,
    {
        self.inner.settings.write().sending_request = Some(Arc::new(hook));
    }

    /// Install the hook called after each response is received.
    pub fn set_response_received<F>(&self, hook: F)
    where
        F: Fn(&HttpRequest, &HttpResponse, &OperationContext) + Send + Sync + 'static,
    {
        self.inner.settings.write().response_received = Some(Arc::new(hook));
    }

    // Hooks are cloned out so they run without any lock held.
    pub(crate) fn sending_request_hook(&self) -> Option<SendingRequestHook> {
        self.inner.settings.read().sending_request.clone()
    }

    pub(crate) fn response_received_hook(&self) -> Option<ResponseReceivedHook> {
        self.inner.settings.read().response_received.clone()
    }

    /// When the operation started.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.inner.timing.lock().start_time
    }

    /// Record when the operation started.
    pub fn set_start_time(&self, time: DateTime<Utc>) {
        self.inner.timing.lock().start_time = Some(time);
    }

    /// When the operation ended.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.inner.timing.lock().end_time
    }

    /// Record when the operation ended.
    pub fn set_end_time(&self, time: DateTime<Utc>) {
        self.inner.timing.lock().end_time = Some(time);
    }

    /// Snapshot of all attempt results, in attempt order.
    pub fn request_results(&self) -> Vec<RequestResult> {
        self.inner.results.lock().clone()
    }

    /// Number of attempts recorded so far.
    pub fn request_result_count(&self) -> usize {
        self.inner.results.lock().len()
    }

    /// Result of the most recent attempt.
    pub fn last_request_result(&self) -> Option<RequestResult> {
        self.inner.results.lock().last().cloned()
    }

    pub(crate) fn add_request_result(&self, result: RequestResult) {
        self.inner.results.lock().push(result);
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for OperationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let settings = self.inner.settings.read();
        f.debug_struct("OperationContext")
            .field("client_request_id", &settings.client_request_id)
            .field("log_level", &settings.log_level)
            .field("user_headers", &settings.user_headers.len())
            .field("request_results", &self.inner.results.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::location::StorageLocation;

    #[test]
    fn test_new_context_has_request_id() {
        let a = OperationContext::new();
        let b = OperationContext::new();
        assert!(!a.client_request_id().is_empty());
        assert_ne!(a.client_request_id(), b.client_request_id());
        assert_eq!(a.log_level(), ClientLogLevel::Warning);
    }

    #[test]
    fn test_log_level_gate() {
        let context = OperationContext::with_log_level(ClientLogLevel::Informational);
        assert!(context.should_log(ClientLogLevel::Error));
        assert!(context.should_log(ClientLogLevel::Informational));
        assert!(!context.should_log(ClientLogLevel::Verbose));
        assert!(!context.should_log(ClientLogLevel::Off));

        context.set_log_level(ClientLogLevel::Off);
        assert!(!context.should_log(ClientLogLevel::Error));
    }

    #[test]
    fn test_clones_share_results() {
        let context = OperationContext::new();
        let observer = context.clone();

        let now = Utc::now();
        context.add_request_result(RequestResult::new(
            now,
            now,
            StorageLocation::Primary,
            Some(503),
        ));
        context.add_request_result(RequestResult::new(
            now,
            now,
            StorageLocation::Secondary,
            Some(200),
        ));

        assert_eq!(observer.request_result_count(), 2);
        let results = observer.request_results();
        assert_eq!(results[0].http_status_code(), Some(503));
        assert_eq!(
            observer.last_request_result().unwrap().target_location(),
            StorageLocation::Secondary
        );
    }

    #[test]
    fn test_user_headers_and_request_id() {
        let context = OperationContext::new();
        context.set_client_request_id("my-id");
        context.add_user_header("x-ms-meta-owner", "ops");

        assert_eq!(context.client_request_id(), "my-id");
        assert_eq!(
            context.user_headers().get("x-ms-meta-owner").map(String::as_str),
            Some("ops")
        );
    }

    #[test]
    fn test_hook_may_read_context() {
        let context = OperationContext::new();
        context.set_sending_request(|_, ctx| {
            // Reading settings from inside a hook must not deadlock.
            let _ = ctx.client_request_id();
            ctx.add_user_header("x-seen", "1");
        });

        let hook = context.sending_request_hook().unwrap();
        let request = HttpRequest::new("GET", "https://account.blob.core.windows.net/");
        hook(&request, &context);
        assert!(context.user_headers().contains_key("x-seen"));
    }
}
