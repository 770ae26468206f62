//! Timeout racing and retry for provider calls.
//!
//! One logical call becomes up to `max_retries` attempts. Each attempt races
//! the provider future against a timer and the caller's cancellation token;
//! whichever branch loses is dropped. Transient failures (including timeouts)
//! back off exponentially, terminal failures return immediately.

use crate::config::GenerationConfig;
use crate::error::GenerateError;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Timeout and backoff settings for one logical call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: u64,
    /// Total attempts
    pub max_retries: u32,
    /// Backoff base in milliseconds
    pub base_delay_ms: u64,
    /// Cap on a computed backoff delay
    pub max_delay_ms: u64,
    /// Cap on a provider-supplied retry-after hint
    pub max_hint_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&GenerationConfig::default())
    }
}

impl From<&GenerationConfig> for RetryPolicy {
    fn from(config: &GenerationConfig) -> Self {
        Self {
            timeout_ms: config.timeout_ms,
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            max_delay_ms: config.max_delay_ms,
            max_hint_delay_ms: config.max_hint_delay_ms,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt that follows failed attempt `attempt` (0-based).
    ///
    /// A provider hint wins over the computed backoff.
    pub fn delay_for(&self, error: &GenerateError, attempt: u32) -> Duration {
        match error {
            GenerateError::Transient {
                retry_after: Some(hint),
                ..
            } => (*hint).min(Duration::from_millis(self.max_hint_delay_ms)),
            _ => backoff_duration(attempt, self.base_delay_ms, self.max_delay_ms),
        }
    }
}

/// Determine whether a classified failure is worth retrying.
///
/// Retryable: transient network/overload/loading failures and timeouts.
/// Everything else is terminal.
pub fn is_retryable(error: &GenerateError) -> bool {
    matches!(
        error,
        GenerateError::Transient { .. } | GenerateError::Timeout { .. }
    )
}

/// Calculate exponential backoff duration for a given attempt.
///
/// Uses `base_delay * 2^attempt`, capped at `max_delay_ms`.
pub fn backoff_duration(attempt: u32, base_delay_ms: u64, max_delay_ms: u64) -> Duration {
    let delay = base_delay_ms.saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(delay.min(max_delay_ms))
}

/// A call that failed for good, with the number of attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFailure {
    pub error: GenerateError,
    pub attempts: u32,
}

/// Executes one logical call with timeout racing and retry.
#[derive(Debug, Clone, Default)]
pub struct Executor {
    policy: RetryPolicy,
}

impl Executor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Run `attempt_fn` until it succeeds, fails terminally, or runs out of attempts.
    ///
    /// Returns `Ok(None)` if `cancel` fires: a voluntary cancellation is a
    /// no-op, never retried and never reported as a failure.
    pub async fn execute<T, F, Fut>(
        &self,
        label: &str,
        cancel: &CancellationToken,
        mut attempt_fn: F,
    ) -> Result<Option<T>, CallFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, GenerateError>>,
    {
        let max_attempts = self.policy.max_retries.max(1);
        let timeout = Duration::from_millis(self.policy.timeout_ms);
        let mut attempt = 0u32;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("{label}: cancelled during attempt {}", attempt + 1);
                    return Ok(None);
                }
                result = tokio::time::timeout(timeout, attempt_fn()) => result,
            };

            let error = match outcome {
                Ok(Ok(value)) => return Ok(Some(value)),
                Ok(Err(e)) => e,
                Err(_) => GenerateError::Timeout {
                    timeout_ms: self.policy.timeout_ms,
                },
            };

            let attempts = attempt + 1;
            if !is_retryable(&error) || attempts >= max_attempts {
                if is_retryable(&error) {
                    tracing::warn!("{label}: giving up after {attempts} attempt(s): {error}");
                }
                return Err(CallFailure { error, attempts });
            }

            let delay = self.policy.delay_for(&error, attempt);
            tracing::warn!(
                "{label}: attempt {attempts}/{max_attempts} failed ({error}), retrying after {delay:?}"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tracing::debug!("{label}: cancelled during backoff");
                    return Ok(None);
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }
}
