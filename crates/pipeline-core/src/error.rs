//! Error types for the agent pipeline.
//!
//! A single taxonomy is shared across all pipeline crates so that retry
//! classification, fallback decisions, and budget enforcement can pattern
//! match on concrete variants instead of probing error strings.

use crate::types::{BudgetDimension, BudgetPeriod, BudgetScope, TenantId};
use std::time::Duration;
use thiserror::Error;

/// Result alias used throughout the pipeline.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Errors produced by the pipeline and its collaborators.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Malformed input: unsupported tenant shape, empty identifiers, invalid
    /// agent configuration. Never retried, never triggers fallback.
    #[error("validation error: {message}")]
    Validation {
        /// Human-readable description of the violation.
        message: String,
    },

    /// A budget limit is already breached under hard enforcement. Raised
    /// pre-flight, before any cost is incurred.
    #[error("budget exceeded: {scope} {period} {dimension} limit {limit} reached (current {current})")]
    BudgetExceeded {
        /// Scope of the breached limit.
        scope: BudgetScope,
        /// Accounting period of the breached limit.
        period: BudgetPeriod,
        /// Dimension of the breached limit.
        dimension: BudgetDimension,
        /// The configured limit.
        limit: f64,
        /// The current counter value.
        current: f64,
        /// The tenant whose budget was breached, if any.
        tenant: Option<TenantId>,
    },

    /// An error reported by an LLM provider.
    #[error("provider error from {provider}: {message}")]
    Provider {
        /// Provider that produced the error.
        provider: String,
        /// Provider-supplied message.
        message: String,
        /// HTTP status code, if the provider surfaced one.
        status_code: Option<u16>,
        /// Whether the provider marked the error as retryable.
        retryable: bool,
    },

    /// A request or attempt sequence exceeded its time budget.
    #[error("timed out after {elapsed:?}")]
    Timeout {
        /// Time elapsed when the timeout fired.
        elapsed: Duration,
    },

    /// The provider rejected the request due to rate limiting.
    #[error("rate limited by provider")]
    RateLimit {
        /// Provider-suggested backoff, if any.
        retry_after: Option<Duration>,
    },

    /// A circuit breaker denied the request without contacting the provider.
    #[error("circuit breaker open for {target}")]
    CircuitOpen {
        /// The agent/model key whose breaker is open.
        target: String,
    },

    /// A storage collaborator (key-value store or execution history)
    /// failed. Accounting writes are best-effort, so callers typically log
    /// and swallow this variant.
    #[error("storage error: {message}")]
    Storage {
        /// Description of the failure.
        message: String,
    },

    /// Serialization of a cached result or record failed.
    #[error("serialization error: {message}")]
    Serialization {
        /// Description of the failure.
        message: String,
    },

    /// Invariant violation inside the pipeline itself.
    #[error("internal error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl PipelineError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a provider error.
    #[must_use]
    pub fn provider(
        provider: impl Into<String>,
        message: impl Into<String>,
        status_code: Option<u16>,
        retryable: bool,
    ) -> Self {
        Self::Provider {
            provider: provider.into(),
            message: message.into(),
            status_code,
            retryable,
        }
    }

    /// Create a timeout error.
    #[must_use]
    pub fn timeout(elapsed: Duration) -> Self {
        Self::Timeout { elapsed }
    }

    /// Create a rate-limit error.
    #[must_use]
    pub fn rate_limit(retry_after: Option<Duration>) -> Self {
        Self::RateLimit { retry_after }
    }

    /// Create a circuit-open error.
    #[must_use]
    pub fn circuit_open(target: impl Into<String>) -> Self {
        Self::CircuitOpen {
            target: target.into(),
        }
    }

    /// Create a storage error.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    /// Create an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error is retryable by classification alone.
    ///
    /// Rate limits, timeouts, provider errors flagged retryable, and
    /// provider errors with a 429/5xx status are retryable. Everything else
    /// (validation, budget, circuit-open, storage) is not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimit { .. } | Self::Timeout { .. } => true,
            Self::Provider {
                retryable,
                status_code,
                ..
            } => {
                *retryable
                    || status_code
                        .is_some_and(|code| code == 429 || (500..600).contains(&code))
            }
            _ => false,
        }
    }

    /// A short, stable class name for execution records and alerts.
    #[must_use]
    pub fn class_name(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "ValidationError",
            Self::BudgetExceeded { .. } => "BudgetExceededError",
            Self::Provider { .. } => "ProviderError",
            Self::Timeout { .. } => "TimeoutError",
            Self::RateLimit { .. } => "RateLimitError",
            Self::CircuitOpen { .. } => "CircuitOpenError",
            Self::Storage { .. } => "StorageError",
            Self::Serialization { .. } => "SerializationError",
            Self::Internal { .. } => "InternalError",
        }
    }
}

impl From<serde_json::Error> for PipelineError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            message: err.to_string(),
        }
    }
}
