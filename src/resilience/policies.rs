//! Linear and exponential retry policies.

use super::retry::{RetryContext, RetryInfo, RetryPolicy};
use super::{
    DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_INTERVAL, MAX_EXPONENTIAL_RETRY_INTERVAL,
    MIN_EXPONENTIAL_RETRY_INTERVAL,
};
use crate::location::{LocationMode, StorageLocation};
use crate::operation::OperationContext;
use chrono::{DateTime, Utc};
use rand::Rng;
use std::time::Duration;

/// Decision rules shared by the built-in policies.
///
/// Tracks when each location was last attempted so that the wait before an attempt
/// accounts for time already spent on the other location.
#[derive(Debug, Clone)]
pub struct RetryPolicyBase {
    delta_backoff: Duration,
    max_attempts: u32,
    last_primary_attempt: Option<DateTime<Utc>>,
    last_secondary_attempt: Option<DateTime<Utc>>,
}

impl RetryPolicyBase {
    /// Create the shared state for a policy.
    pub fn new(delta_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            delta_backoff,
            max_attempts,
            last_primary_attempt: None,
            last_secondary_attempt: None,
        }
    }

    /// Base backoff interval.
    pub fn delta_backoff(&self) -> Duration {
        self.delta_backoff
    }

    /// Retry limit: no retry once `max_attempts` retries were made.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Apply the shared rules.
    ///
    /// Redirects and client errors are final, except 408 and a 404 from the
    /// secondary (replication lag), which fails over to the primary unless the mode
    /// is secondary-only. 501 and 505 are final. Everything else, including attempts
    /// without a response, is retried at the next location after the default interval.
    pub fn evaluate(&mut self, context: &RetryContext) -> RetryInfo {
        if context.current_retry_count() >= self.max_attempts {
            return RetryInfo::default();
        }

        let result = context.last_request_result();
        match result.target_location() {
            StorageLocation::Primary => self.last_primary_attempt = Some(result.end_time()),
            StorageLocation::Secondary => self.last_secondary_attempt = Some(result.end_time()),
            StorageLocation::Unspecified => {}
        }

        let status = result.http_status_code();
        let secondary_not_found =
            result.target_location() == StorageLocation::Secondary && status == Some(404);

        if let Some(status) = status {
            if (300..500).contains(&status) && status != 408 && !secondary_not_found {
                return RetryInfo::default();
            }
            if status == 501 || status == 505 {
                return RetryInfo::default();
            }
        }

        let mut info = RetryInfo::from_context(context);
        if secondary_not_found && context.current_location_mode() != LocationMode::SecondaryOnly {
            info.set_updated_location_mode(LocationMode::PrimaryOnly);
            info.set_target_location(StorageLocation::Primary);
        }
        info
    }

    /// Subtract the time elapsed since the target location was last attempted.
    ///
    /// A location never attempted gets no wait.
    pub fn align_retry_interval(&self, info: &mut RetryInfo) {
        let last_attempt = match info.target_location() {
            StorageLocation::Primary => self.last_primary_attempt,
            StorageLocation::Secondary => self.last_secondary_attempt,
            StorageLocation::Unspecified => None,
        };

        let aligned = match last_attempt {
            Some(last) => {
                let since = (Utc::now() - last).to_std().unwrap_or(Duration::ZERO);
                info.retry_interval().saturating_sub(since)
            }
            None => Duration::ZERO,
        };
        info.set_retry_interval(aligned);
    }
}

/// Retries with a fixed interval.
#[derive(Debug, Clone)]
pub struct LinearRetryPolicy {
    base: RetryPolicyBase,
}

impl LinearRetryPolicy {
    /// Create a linear policy.
    pub fn new(delta_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            base: RetryPolicyBase::new(delta_backoff, max_attempts),
        }
    }
}

impl Default for LinearRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy for LinearRetryPolicy {
    fn evaluate(
        &mut self,
        context: &RetryContext,
        _operation_context: &OperationContext,
    ) -> RetryInfo {
        let mut info = self.base.evaluate(context);
        if info.should_retry() {
            info.set_retry_interval(self.base.delta_backoff());
            self.base.align_retry_interval(&mut info);
        }
        info
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::new(self.base.delta_backoff(), self.base.max_attempts()))
    }
}

/// Retries with an exponentially growing, jittered interval.
#[derive(Debug, Clone)]
pub struct ExponentialRetryPolicy {
    base: RetryPolicyBase,
}

impl ExponentialRetryPolicy {
    /// Create an exponential policy.
    pub fn new(delta_backoff: Duration, max_attempts: u32) -> Self {
        Self {
            base: RetryPolicyBase::new(delta_backoff, max_attempts),
        }
    }
}

impl Default for ExponentialRetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_RETRY_INTERVAL, DEFAULT_MAX_ATTEMPTS)
    }
}

impl RetryPolicy for ExponentialRetryPolicy {
    fn evaluate(
        &mut self,
        context: &RetryContext,
        _operation_context: &OperationContext,
    ) -> RetryInfo {
        let mut info = self.base.evaluate(context);
        if info.should_retry() {
            let jitter = rand::thread_rng().gen_range(0.8..=1.2);
            info.set_retry_interval(exponential_backoff(
                self.base.delta_backoff(),
                context.current_retry_count(),
                jitter,
            ));
            self.base.align_retry_interval(&mut info);
        }
        info
    }

    fn clone_policy(&self) -> Box<dyn RetryPolicy> {
        Box::new(Self::new(self.base.delta_backoff(), self.base.max_attempts()))
    }
}

/// Exponential interval before alignment.
///
/// `min + (2^retry_count - 1) * jitter * delta`, capped at the maximum interval.
/// `jitter` is the random scale factor, drawn from `[0.8, 1.2]` by the policy.
pub fn exponential_backoff(delta_backoff: Duration, retry_count: u32, jitter: f64) -> Duration {
    let exponent = retry_count.min(i32::MAX as u32) as i32;
    let increment = (2f64.powi(exponent) - 1.0) * jitter * delta_backoff.as_secs_f64();
    let interval = MIN_EXPONENTIAL_RETRY_INTERVAL.as_secs_f64() + increment;
    let max = MAX_EXPONENTIAL_RETRY_INTERVAL.as_secs_f64();

    if !increment.is_finite() || increment < 0.0 || interval >= max {
        MAX_EXPONENTIAL_RETRY_INTERVAL
    } else {
        Duration::from_secs_f64(interval)
    }
}
