//! Per-request options.

use crate::location::LocationMode;
use crate::resilience::{default_retry_policy, RetryPolicy};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default buffer size for streamed request bodies.
pub const DEFAULT_HTTP_BUFFER_SIZE: usize = 64 * 1024;

/// Options applying to one operation.
///
/// Every field is optional. Values left unset on a call are taken from the
/// client's defaults (see [`RequestOptions::merge`]) and, failing that, from the
/// library defaults applied by the accessors.
#[derive(Clone, Default)]
pub struct RequestOptions {
    retry_policy: Option<Arc<dyn RetryPolicy>>,
    server_timeout: Option<Duration>,
    maximum_execution_time: Option<Duration>,
    location_mode: Option<LocationMode>,
    http_buffer_size: Option<usize>,
}

impl RequestOptions {
    /// Create empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the retry policy prototype.
    pub fn with_retry_policy(mut self, policy: impl RetryPolicy + 'static) -> Self {
        self.retry_policy = Some(Arc::new(policy));
        self
    }

    /// Set a shared retry policy prototype.
    pub fn with_shared_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.retry_policy = Some(policy);
        self
    }

    /// Set the server-side timeout sent with each attempt.
    pub fn with_server_timeout(mut self, timeout: Duration) -> Self {
        self.server_timeout = Some(timeout);
        self
    }

    /// Set the deadline for the whole operation, retries and waits included.
    pub fn with_maximum_execution_time(mut self, time: Duration) -> Self {
        self.maximum_execution_time = Some(time);
        self
    }

    /// Set the location mode.
    pub fn with_location_mode(mut self, mode: LocationMode) -> Self {
        self.location_mode = Some(mode);
        self
    }

    /// Set the chunk size used when streaming request bodies.
    pub fn with_http_buffer_size(mut self, size: usize) -> Self {
        self.http_buffer_size = Some(size);
        self
    }

    /// Fill every unset value from `defaults`.
    pub fn merge(&self, defaults: &RequestOptions) -> RequestOptions {
        RequestOptions {
            retry_policy: self
                .retry_policy
                .clone()
                .or_else(|| defaults.retry_policy.clone()),
            server_timeout: self.server_timeout.or(defaults.server_timeout),
            maximum_execution_time: self
                .maximum_execution_time
                .or(defaults.maximum_execution_time),
            location_mode: self.location_mode.or(defaults.location_mode),
            http_buffer_size: self.http_buffer_size.or(defaults.http_buffer_size),
        }
    }

    /// Retry policy prototype. Defaults to the exponential policy.
    pub fn retry_policy(&self) -> Arc<dyn RetryPolicy> {
        self.retry_policy
            .clone()
            .unwrap_or_else(default_retry_policy)
    }

    /// Server-side timeout. Unset by default.
    pub fn server_timeout(&self) -> Option<Duration> {
        self.server_timeout.filter(|t| !t.is_zero())
    }

    /// Operation deadline. Unset by default.
    pub fn maximum_execution_time(&self) -> Option<Duration> {
        self.maximum_execution_time.filter(|t| !t.is_zero())
    }

    /// Location mode. Defaults to primary only.
    pub fn location_mode(&self) -> LocationMode {
        self.location_mode.unwrap_or_default()
    }

    /// Streaming chunk size. Defaults to 64 KiB.
    pub fn http_buffer_size(&self) -> usize {
        self.http_buffer_size
            .filter(|s| *s > 0)
            .unwrap_or(DEFAULT_HTTP_BUFFER_SIZE)
    }
}

impl fmt::Debug for RequestOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestOptions")
            .field("retry_policy", &self.retry_policy)
            .field("server_timeout", &self.server_timeout)
            .field("maximum_execution_time", &self.maximum_execution_time)
            .field("location_mode", &self.location_mode)
            .field("http_buffer_size", &self.http_buffer_size)
            .finish()
    }
}
