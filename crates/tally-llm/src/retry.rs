//! Retry/Backoff Executor
//!
//! Wraps a provider call with bounded exponential backoff. Only `Transient`
//! failures are retried; everything else passes straight through. The
//! executor holds no state between calls, so there is no retry budget shared
//! across documents.

use crate::{ExtractionProvider, LlmError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tally_domain::{ExtractionError, ExtractionRequest, ExtractionResult};
use tracing::{debug, warn};

/// Retry parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Retries after the first attempt (total attempts = `max_retries + 1`)
    pub max_retries: u32,

    /// Factor applied to the delay after each retry
    pub backoff_multiplier: f64,

    /// Delay before the first retry, in milliseconds
    pub initial_delay_ms: u64,

    /// Upper bound on a single attempt, in milliseconds
    pub attempt_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1000,
            attempt_timeout_ms: 30_000,
        }
    }
}

impl RetryPolicy {
    /// A single attempt, no retries
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Total number of attempts the executor may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the first retry
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    /// Per-attempt timeout
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.attempt_timeout_ms)
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), LlmError> {
        if !self.backoff_multiplier.is_finite() || !(1.0..=10.0).contains(&self.backoff_multiplier)
        {
            return Err(LlmError::Config(format!(
                "backoff_multiplier {} out of range [1.0, 10.0]",
                self.backoff_multiplier
            )));
        }
        if self.attempt_timeout_ms == 0 {
            return Err(LlmError::Config(
                "attempt_timeout_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Runs provider calls under a [`RetryPolicy`]
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    policy: RetryPolicy,
}

impl RetryExecutor {
    /// Create an executor with the given policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self { policy }
    }

    /// Active policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `provider.extract(request)` with retries
    pub async fn run(
        &self,
        provider: &dyn ExtractionProvider,
        request: &ExtractionRequest,
    ) -> ExtractionResult {
        self.execute(provider.name(), || provider.extract(request))
            .await
    }

    /// Run an arbitrary extraction call with retries
    ///
    /// `label` names the provider in logs and in the timeout result.
    /// The returned result records the number of attempts and the total
    /// time spent, backoff sleeps included.
    pub async fn execute<F, Fut>(&self, label: &str, mut call: F) -> ExtractionResult
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ExtractionResult>,
    {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts();
        let mut delay = self.policy.initial_delay();
        let mut attempt = 0;

        loop {
            attempt += 1;
            let attempt_started = Instant::now();
            let result = match tokio::time::timeout(self.policy.attempt_timeout(), call()).await {
                Ok(result) => result,
                Err(_) => ExtractionResult::failed(
                    label,
                    ExtractionError::transient(format!(
                        "attempt timed out after {:?}",
                        self.policy.attempt_timeout()
                    )),
                    attempt_started.elapsed(),
                ),
            };

            let retryable = match &result.error {
                None => {
                    debug!(provider = label, attempt, "Extraction succeeded");
                    return result.with_attempts(attempt).with_elapsed(started.elapsed());
                }
                Some(error) => error.kind.is_retryable(),
            };

            if !retryable {
                debug!(
                    provider = label,
                    attempt,
                    kind = ?result.error_kind(),
                    "Non-retryable failure"
                );
                return result.with_attempts(attempt).with_elapsed(started.elapsed());
            }

            if attempt >= max_attempts {
                return exhausted(result, attempt).with_elapsed(started.elapsed());
            }

            warn!(
                provider = label,
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = ?result.error.as_ref().map(|e| e.message.as_str()),
                "Transient failure, retrying"
            );
            tokio::time::sleep(delay).await;
            delay = Duration::try_from_secs_f64(delay.as_secs_f64() * self.policy.backoff_multiplier)
                .unwrap_or(Duration::MAX);
        }
    }
}

/// Wrap the last transient failure as the final one
fn exhausted(last: ExtractionResult, attempts: u32) -> ExtractionResult {
    let message = last
        .error
        .as_ref()
        .map(|e| e.message.clone())
        .unwrap_or_default();
    let error = ExtractionError::transient(format!(
        "gave up after {} attempts: {}",
        attempts, message
    ));
    warn!(provider = %last.provider, attempts, "Retries exhausted");
    last.into_failure(error).with_attempts(attempts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MockProvider, MockResponse};
    use tally_domain::{DocumentKind, ErrorKind};

    const VALID: &str =
        r#"{"date":"2025-01-15","type":"expense","category":"Office Supplies","amount":45.99}"#;

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            backoff_multiplier: 2.0,
            initial_delay_ms: 1,
            attempt_timeout_ms: 1_000,
        }
    }

    fn request() -> ExtractionRequest {
        ExtractionRequest {
            file_name: "receipt.png".to_string(),
            content: vec![0; 16],
            kind: DocumentKind::Image,
            mime_type: "image/png".to_string(),
            text: None,
            categories: vec![],
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert_eq!(policy.initial_delay(), Duration::from_secs(1));
        assert_eq!(policy.attempt_timeout(), Duration::from_secs(30));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_invalid_multiplier() {
        for multiplier in [0.5, f64::NAN, f64::INFINITY, 11.0] {
            let policy = RetryPolicy {
                backoff_multiplier: multiplier,
                ..RetryPolicy::default()
            };
            assert!(policy.validate().is_err(), "{}", multiplier);
        }
    }

    #[tokio::test]
    async fn test_always_transient_makes_max_retries_plus_one_attempts() {
        let provider = MockProvider::failing(ErrorKind::Transient, "HTTP 503");
        let executor = RetryExecutor::new(fast_policy());

        let result = executor.run(&provider, &request()).await;

        assert_eq!(provider.call_count(), 4);
        assert!(!result.success);
        assert_eq!(result.attempts, 4);
        assert_eq!(result.error_kind(), Some(ErrorKind::Transient));
        assert!(result.error.unwrap().message.starts_with("gave up after 4 attempts"));
    }

    #[tokio::test]
    async fn test_permanent_makes_one_attempt() {
        let provider = MockProvider::failing(ErrorKind::Permanent, "HTTP 401");
        let result = RetryExecutor::new(fast_policy()).run(&provider, &request()).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.error_kind(), Some(ErrorKind::Permanent));
    }

    #[tokio::test]
    async fn test_invalid_response_is_not_retried() {
        let provider = MockProvider::new("I could not read this receipt, sorry.");
        let result = RetryExecutor::new(fast_policy()).run(&provider, &request()).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.error_kind(), Some(ErrorKind::Invalid));
    }

    #[tokio::test]
    async fn test_transient_then_success() {
        let provider = MockProvider::new(VALID);
        provider.push_response(MockResponse::Failure(ErrorKind::Transient, "429".into()));

        let result = RetryExecutor::new(fast_policy()).run(&provider, &request()).await;

        assert_eq!(provider.call_count(), 2);
        assert!(result.success);
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn test_no_retry_policy() {
        let provider = MockProvider::failing(ErrorKind::Transient, "timeout");
        let policy = RetryPolicy {
            initial_delay_ms: 1,
            ..RetryPolicy::no_retry()
        };
        let result = RetryExecutor::new(policy).run(&provider, &request()).await;

        assert_eq!(provider.call_count(), 1);
        assert_eq!(result.attempts, 1);
        assert_eq!(result.error_kind(), Some(ErrorKind::Transient));
    }

    #[tokio::test]
    async fn test_slow_attempt_times_out_as_transient() {
        let provider = MockProvider::new(VALID).with_delay(Duration::from_millis(200));
        let policy = RetryPolicy {
            max_retries: 1,
            initial_delay_ms: 1,
            attempt_timeout_ms: 20,
            ..RetryPolicy::default()
        };

        let result = RetryExecutor::new(policy).run(&provider, &request()).await;

        assert_eq!(provider.call_count(), 2);
        assert_eq!(result.error_kind(), Some(ErrorKind::Transient));
        assert!(result.error.unwrap().message.contains("timed out"));
    }

    #[tokio::test]
    async fn test_execute_with_closure() {
        let mut calls = 0u32;
        let executor = RetryExecutor::new(fast_policy());

        let result = executor
            .execute("closure", || {
                calls += 1;
                let attempt = calls;
                async move {
                    if attempt < 3 {
                        ExtractionResult::failed(
                            "closure",
                            ExtractionError::transient("busy"),
                            Duration::ZERO,
                        )
                    } else {
                        ExtractionResult::failed(
                            "closure",
                            ExtractionError::permanent("forbidden"),
                            Duration::ZERO,
                        )
                    }
                }
            })
            .await;

        assert_eq!(calls, 3);
        assert_eq!(result.attempts, 3);
        assert_eq!(result.error_kind(), Some(ErrorKind::Permanent));
    }
}
