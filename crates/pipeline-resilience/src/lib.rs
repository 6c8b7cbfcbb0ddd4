//! # Pipeline Resilience
//!
//! Resilience patterns for the LLM agent pipeline:
//! - Retry strategy with constant/exponential backoff and additive jitter
//! - Circuit breaker with a sliding failure window
//! - Reliability engine orchestrating retries, model fallback chains, and
//!   an overall wall-clock budget

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod circuit_breaker;
pub mod engine;
pub mod retry;

// Re-export main types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitBreakerStats, CircuitState,
};
pub use engine::{InvokeOutcome, ReliabilityEngine, ReliabilityPolicy};
pub use retry::{Backoff, RetryConfig, RetryStrategy};
