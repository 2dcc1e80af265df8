//! Bounded exponential-backoff retry

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use shared::{Clock, ErrorCode, ResilienceSettings, ServiceError};

use crate::normalizer::{enhance, RawError};

/// Predicate deciding whether a normalized failure is worth another attempt
pub type RetryCondition = Arc<dyn Fn(&ServiceError) -> bool + Send + Sync>;

/// Retry policy for a single call
#[derive(Clone)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    pub retry_condition: RetryCondition,
}

impl fmt::Debug for RetryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .finish_non_exhaustive()
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::from_settings(&ResilienceSettings::default())
    }
}

/// Retry anything already marked retryable, network and timeout failures, and 5xx responses
pub fn default_retry_condition(error: &ServiceError) -> bool {
    error.is_retryable
        || matches!(error.code, ErrorCode::NetworkError | ErrorCode::Timeout)
        || error.is_server_error()
}

impl RetryConfig {
    pub fn from_settings(settings: &ResilienceSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: settings.base_delay(),
            max_delay: settings.max_delay(),
            backoff_factor: settings.backoff_factor,
            retry_condition: Arc::new(default_retry_condition),
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_delays(mut self, base_delay: Duration, max_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self.max_delay = max_delay;
        self
    }

    pub fn with_backoff_factor(mut self, backoff_factor: f64) -> Self {
        self.backoff_factor = backoff_factor;
        self
    }

    pub fn with_retry_condition<F>(mut self, condition: F) -> Self
    where
        F: Fn(&ServiceError) -> bool + Send + Sync + 'static,
    {
        self.retry_condition = Arc::new(condition);
        self
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        if self.max_attempts < 1 {
            return Err(ServiceError::invalid_input("maxAttempts must be at least 1")
                .with_context("maxAttempts", self.max_attempts));
        }
        if !(self.backoff_factor >= 1.0) {
            return Err(ServiceError::invalid_input("backoffFactor must be at least 1")
                .with_context("backoffFactor", self.backoff_factor));
        }
        Ok(())
    }

    /// Delay inserted after failed attempt `attempt` (1-based):
    /// `min(base_delay * backoff_factor^(attempt-1), max_delay)`
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.base_delay.as_nanos() as f64 * self.backoff_factor.powi(exponent);
        let max_nanos = self.max_delay.as_nanos() as f64;

        if !scaled.is_finite() || scaled >= max_nanos {
            self.max_delay
        } else {
            Duration::from_nanos(scaled.round() as u64)
        }
    }
}

/// Run `operation` until it succeeds, the retry condition rejects the failure,
/// or `max_attempts` is exhausted. Only the final failure is surfaced.
pub async fn with_retry<T, E, F, Fut>(
    clock: &dyn Clock,
    service_id: &str,
    config: &RetryConfig,
    mut operation: F,
) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<RawError>,
{
    config.validate()?;

    let mut attempt = 1;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(raw) => enhance(raw.into(), service_id),
        };

        if attempt >= config.max_attempts || !(config.retry_condition)(&error) {
            tracing::debug!(
                service = service_id,
                attempt,
                code = %error.code,
                "giving up: {}",
                error.message
            );
            return Err(error);
        }

        let delay = config.delay_for_attempt(attempt);
        tracing::warn!(
            service = service_id,
            attempt,
            max_attempts = config.max_attempts,
            delay_ms = delay.as_millis() as u64,
            code = %error.code,
            error = %error.message,
            "⏳ attempt failed, retrying"
        );

        clock.sleep(delay).await;
        attempt += 1;
    }
}
