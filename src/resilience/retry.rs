//! Retry decision types and the policy trait.

use crate::location::{LocationMode, StorageLocation};
use crate::operation::{OperationContext, RequestResult};
use std::fmt::Debug;
use std::time::Duration;

use super::DEFAULT_RETRY_INTERVAL;

/// Input to a retry decision.
#[derive(Debug, Clone)]
pub struct RetryContext {
    current_retry_count: u32,
    last_request_result: RequestResult,
    next_location: StorageLocation,
    current_location_mode: LocationMode,
}

impl RetryContext {
    /// Create a retry context.
    ///
    /// `current_retry_count` is the number of retries already made: 0 when the first
    /// attempt has just failed.
    pub fn new(
        current_retry_count: u32,
        last_request_result: RequestResult,
        next_location: StorageLocation,
        current_location_mode: LocationMode,
    ) -> Self {
        Self {
            current_retry_count,
            last_request_result,
            next_location,
            current_location_mode,
        }
    }

    /// Number of retries already made.
    pub fn current_retry_count(&self) -> u32 {
        self.current_retry_count
    }

    /// Result of the attempt that just failed.
    pub fn last_request_result(&self) -> &RequestResult {
        &self.last_request_result
    }

    /// Location the location mode would use for the next attempt.
    pub fn next_location(&self) -> StorageLocation {
        self.next_location
    }

    /// Location mode in effect for the operation.
    pub fn current_location_mode(&self) -> LocationMode {
        self.current_location_mode
    }
}

/// Output of a retry decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryInfo {
    should_retry: bool,
    target_location: StorageLocation,
    updated_location_mode: Option<LocationMode>,
    retry_interval: Duration,
}

impl Default for RetryInfo {
    /// A decision not to retry.
    fn default() -> Self {
        Self {
            should_retry: false,
            target_location: StorageLocation::Unspecified,
            updated_location_mode: None,
            retry_interval: Duration::ZERO,
        }
    }
}

impl RetryInfo {
    /// A decision to retry at the context's next location, in its current mode, after
    /// the default interval.
    pub fn from_context(context: &RetryContext) -> Self {
        Self {
            should_retry: true,
            target_location: context.next_location(),
            updated_location_mode: Some(context.current_location_mode()),
            retry_interval: DEFAULT_RETRY_INTERVAL,
        }
    }

    /// Whether to make another attempt.
    pub fn should_retry(&self) -> bool {
        self.should_retry
    }

    /// Location of the next attempt.
    pub fn target_location(&self) -> StorageLocation {
        self.target_location
    }

    /// Location mode for the remaining attempts; `None` keeps the current mode.
    pub fn updated_location_mode(&self) -> Option<LocationMode> {
        self.updated_location_mode
    }

    /// Wait before the next attempt.
    pub fn retry_interval(&self) -> Duration {
        self.retry_interval
    }

    /// Set the location of the next attempt.
    pub fn set_target_location(&mut self, location: StorageLocation) {
        self.target_location = location;
    }

    /// Set the location mode for the remaining attempts.
    pub fn set_updated_location_mode(&mut self, mode: LocationMode) {
        self.updated_location_mode = Some(mode);
    }

    /// Set the wait before the next attempt.
    pub fn set_retry_interval(&mut self, interval: Duration) {
        self.retry_interval = interval;
    }
}

/// Decides whether and when a failed attempt is retried.
///
/// A policy instance is stateful (it remembers when each location was last
/// attempted), so the executor works on a fresh copy per operation obtained from
/// [`RetryPolicy::clone_policy`]. The configured instance acts as a prototype and
/// is never evaluated directly.
pub trait RetryPolicy: Debug + Send + Sync {
    /// Decide on the failed attempt described by `context`.
    fn evaluate(
        &mut self,
        context: &RetryContext,
        operation_context: &OperationContext,
    ) -> RetryInfo;

    /// A fresh instance with the same parameters and no per-operation state.
    fn clone_policy(&self) -> Box<dyn RetryPolicy>;
}

/// Policy that never retries.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoRetryPolicy;

impl NoRetryPolicy {
    /// Create a no-retry policy.
    pub fn new() -> Self {
        Self
    }
}

impl RetryPolicy for NoRetryPolicy {
    fn evaluate(
        &mut self,
        _context: &RetryContext,
        _operation_context: &OperationContext,
    ) -> RetryInfo {
        RetryInfo::default()
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(*self)
    }
}
