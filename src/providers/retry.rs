//! Retry configuration and the throttled retry loop.
//!
//! Every generation request goes through [`with_retry()`], which paces the
//! request by the load controller's multiplier, feeds latency and errors
//! back into the controller, and retries transient failures with
//! exponential backoff.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::Instant;
use tracing::{error, trace};

use crate::telemetry;
use crate::throttle::LoadController;
use crate::{ForgeError, Result};

/// Configuration for retry behaviour on transient errors.
///
/// Uses exponential backoff with optional jitter:
///
/// ```rust
/// # use mcqforge::RetryConfig;
/// # use std::time::Duration;
/// let config = RetryConfig::new()
///     .max_attempts(5)
///     .initial_delay(Duration::from_millis(200))
///     .jitter(Duration::ZERO);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the initial request).
    /// 1 = no retry. Default: 3.
    pub max_attempts: u32,
    /// Base delay before the first retry. Default: 500ms.
    pub initial_delay: Duration,
    /// Maximum delay between retries (caps exponential growth). Default: 10s.
    pub max_delay: Duration,
    /// Upper bound of uniform random jitter added to each delay. Default: 200ms.
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            jitter: Duration::from_millis(200),
        }
    }
}

impl RetryConfig {
    /// Create a new config with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config that disables retries (single attempt).
    pub fn disabled() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Set maximum attempts (including the initial request).
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n;
        self
    }

    /// Set the base delay before the first retry.
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay between retries.
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the jitter bound (`Duration::ZERO` disables jitter).
    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    ///
    /// Uses exponential backoff: `initial_delay * 2^attempt`, capped at `max_delay`.
    /// Does NOT include jitter or throttling; see
    /// [`backoff()`](Self::backoff) for the full calculation.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(attempt));
        delay.min(self.max_delay)
    }

    /// Full delay before retry `attempt + 1`: capped backoff plus jitter,
    /// scaled by the throttle `multiplier`.
    pub fn backoff(&self, attempt: u32, multiplier: f64) -> Duration {
        let jitter_ms = u64::try_from(self.jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
        };
        (self.delay_for_attempt(attempt) + jitter).mul_f64(multiplier.max(1.0))
    }
}

/// Execute one logical request with pacing, load feedback and retry.
///
/// - Before every attempt, sleeps for the controller's pacing delay.
/// - Successful attempts report their latency; failed attempts report an
///   error (and their latency too, when the endpoint actually answered).
/// - Transient errors are retried up to `config.max_attempts`. Permanent
///   errors are returned immediately.
/// - Exhaustion yields [`ForgeError::GenerationUnavailable`] and is the only
///   failure logged here; intermediate attempts are traced.
pub(crate) async fn with_retry<F, Fut, T>(
    config: &RetryConfig,
    throttle: &LoadController,
    model: &str,
    operation: &'static str,
    f: F,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..config.max_attempts {
        let pacing = throttle.pacing_delay();
        if !pacing.is_zero() {
            tokio::time::sleep(pacing).await;
        }

        let started = Instant::now();
        let result = f().await;
        let elapsed = started.elapsed();
        metrics::histogram!(telemetry::REQUEST_DURATION_SECONDS,
            "model" => model.to_owned(),
            "operation" => operation,
        )
        .record(elapsed.as_secs_f64());

        match result {
            Ok(value) => {
                throttle.record_latency(elapsed);
                metrics::counter!(telemetry::REQUESTS_TOTAL,
                    "model" => model.to_owned(),
                    "operation" => operation,
                    "status" => "ok",
                )
                .increment(1);
                return Ok(value);
            }
            Err(e) => {
                if e.has_response() {
                    throttle.record_latency(elapsed);
                }
                throttle.record_error();
                metrics::counter!(telemetry::REQUESTS_TOTAL,
                    "model" => model.to_owned(),
                    "operation" => operation,
                    "status" => "error",
                )
                .increment(1);

                if !e.is_transient() {
                    return Err(e); // permanent error, no retry
                }
                if attempt + 1 < config.max_attempts {
                    metrics::counter!(telemetry::RETRIES_TOTAL,
                        "model" => model.to_owned(),
                        "operation" => operation,
                    )
                    .increment(1);
                    let delay = config.backoff(attempt, throttle.recommend_delay_multiplier());
                    trace!(
                        model,
                        operation,
                        attempt = attempt + 1,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "retrying after transient error"
                    );
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }

    let reason = last_err.map_or_else(|| "no attempts allowed".to_string(), |e| e.to_string());
    error!(
        model,
        operation,
        attempts = config.max_attempts,
        error = %reason,
        "generation unavailable, giving up"
    );
    Err(ForgeError::GenerationUnavailable {
        attempts: config.max_attempts,
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_without_jitter_is_deterministic() {
        let config = RetryConfig::new().jitter(Duration::ZERO);
        assert_eq!(config.backoff(0, 1.0), Duration::from_millis(500));
        assert_eq!(config.backoff(1, 1.0), Duration::from_secs(1));
        assert_eq!(config.backoff(1, 2.0), Duration::from_secs(2));
    }

    #[test]
    fn backoff_is_capped_before_scaling() {
        let config = RetryConfig::new().jitter(Duration::ZERO);
        assert_eq!(config.backoff(10, 1.0), Duration::from_secs(10));
        assert_eq!(config.backoff(10, 3.0), Duration::from_secs(30));
    }

    #[test]
    fn jitter_stays_in_bounds() {
        let config = RetryConfig::new().jitter(Duration::from_millis(200));
        for _ in 0..50 {
            let d = config.backoff(0, 1.0);
            assert!(d >= Duration::from_millis(500));
            assert!(d <= Duration::from_millis(700));
        }
    }

    #[test]
    fn multiplier_below_one_is_ignored() {
        let config = RetryConfig::new().jitter(Duration::ZERO);
        assert_eq!(config.backoff(0, 0.5), Duration::from_millis(500));
    }
}
