//! Retry strategy with backoff and jitter.
//!
//! Pure eligibility and delay computation: the strategy never sleeps or
//! mutates state itself. Jitter is strictly additive, uniform in
//! `[0%, 50%]` of the computed base delay, so concurrent retries spread out
//! without ever firing early.

use pipeline_core::PipelineError;
use rand::Rng;
use std::time::Duration;

/// Backoff progression between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Same delay for every attempt.
    Constant,
    /// `base_delay * 2^attempt`, capped at `max_delay`.
    Exponential,
}

/// Default message fragments that mark an error as retryable regardless of
/// its variant.
const DEFAULT_RETRYABLE_PATTERNS: &[&str] = &[
    "rate limit",
    "too many requests",
    "timeout",
    "timed out",
    "overloaded",
    "bad gateway",
    "service unavailable",
    "502",
    "503",
];

/// Retry configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retries after the initial attempt.
    pub max_retries: u32,
    /// Backoff progression.
    pub backoff: Backoff,
    /// Base delay between attempts.
    pub base_delay: Duration,
    /// Cap on the computed delay (before jitter).
    pub max_delay: Duration,
    /// Extra message fragments treated as retryable, in addition to the
    /// default set.
    pub extra_retryable_patterns: Vec<String>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Backoff::Exponential,
            base_delay: Duration::from_millis(400),
            max_delay: Duration::from_secs(3),
            extra_retryable_patterns: Vec::new(),
        }
    }
}

/// Retry strategy implementation.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    config: RetryConfig,
}

impl RetryStrategy {
    /// Create a strategy with the given configuration.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(RetryConfig::default())
    }

    /// Whether another retry is allowed after `attempt` retries have
    /// already happened (0-indexed).
    #[must_use]
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.config.max_retries
    }

    /// Delay before the retry following attempt index `attempt`.
    ///
    /// The jittered result is always at least the computed base delay and
    /// at most 1.5x it.
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let base = self.base_delay_for(attempt);
        let jitter = rand::thread_rng().gen_range(0.0..=0.5) * base;
        Duration::from_secs_f64(base + jitter)
    }

    /// The un-jittered delay for an attempt index.
    #[must_use]
    pub fn base_delay_for(&self, attempt: u32) -> f64 {
        let base = self.config.base_delay.as_secs_f64();
        match self.config.backoff {
            Backoff::Constant => base,
            Backoff::Exponential => {
                let scaled = base * 2f64.powi(attempt as i32);
                scaled.min(self.config.max_delay.as_secs_f64())
            }
        }
    }

    /// Whether an error is retryable under this strategy.
    ///
    /// True when the error classifies as retryable (rate limit, timeout,
    /// retryable provider error, 429/5xx), or when its message contains one
    /// of the default or caller-supplied patterns (case-insensitive).
    #[must_use]
    pub fn is_retryable(&self, error: &PipelineError) -> bool {
        if error.is_retryable() {
            return true;
        }
        // Circuit-open and validation errors are never retryable, even if a
        // pattern happens to match their message.
        if matches!(
            error,
            PipelineError::CircuitOpen { .. }
                | PipelineError::Validation { .. }
                | PipelineError::BudgetExceeded { .. }
        ) {
            return false;
        }

        let message = error.to_string().to_lowercase();
        DEFAULT_RETRYABLE_PATTERNS
            .iter()
            .any(|p| message.contains(p))
            || self
                .config
                .extra_retryable_patterns
                .iter()
                .any(|p| message.contains(&p.to_lowercase()))
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
