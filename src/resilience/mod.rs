//! Resilience layer for storage operations.
//!
//! This module provides the retry policies the executor consults after each
//! failed attempt.

mod policies;
mod retry;

pub use policies::{exponential_backoff, ExponentialRetryPolicy, LinearRetryPolicy, RetryPolicyBase};
pub use retry::{NoRetryPolicy, RetryContext, RetryInfo, RetryPolicy};

use std::sync::Arc;
use std::time::Duration;

/// Default wait between attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Default retry limit of the built-in policies.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Smallest wait produced by the exponential policy.
pub const MIN_EXPONENTIAL_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// Largest wait produced by the exponential policy.
pub const MAX_EXPONENTIAL_RETRY_INTERVAL: Duration = Duration::from_secs(120);

/// Policy used when neither the call nor the client configures one.
pub fn default_retry_policy() -> Arc<dyn RetryPolicy> {
    Arc::new(ExponentialRetryPolicy::default())
}
