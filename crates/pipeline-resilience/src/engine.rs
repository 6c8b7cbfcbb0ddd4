//! Reliability engine: retries, fallback chains, circuit breaking.
//!
//! The engine walks the try-list `[primary] + fallbacks` in order. Per
//! model it runs the retry loop for retryable errors; when retries exhaust
//! or the error is non-retryable, it falls back to the next model. Errors
//! matching the non-fallback list propagate immediately, and an optional
//! overall wall-clock budget bounds the whole sequence.

use crate::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
use crate::retry::{RetryConfig, RetryStrategy};
use pipeline_core::{ModelId, PipelineError, PipelineResult};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-agent reliability policy.
#[derive(Debug, Clone, Default)]
pub struct ReliabilityPolicy {
    /// Retry configuration for each model attempt sequence.
    pub retry: RetryConfig,
    /// Error classes or message fragments that must never trigger fallback;
    /// matching errors propagate immediately.
    pub non_fallback_patterns: Vec<String>,
    /// Advisory wall-clock budget for the whole retry+fallback sequence,
    /// checked between attempts. In-flight requests are not preempted.
    pub overall_timeout: Option<Duration>,
    /// Circuit breaker configuration; `None` disables breaking.
    pub circuit_breaker: Option<CircuitBreakerConfig>,
}

/// The result of a reliability-wrapped invocation.
#[derive(Debug)]
pub struct InvokeOutcome<T> {
    /// The successful value.
    pub value: T,
    /// The model that served the request (primary or a fallback).
    pub model: ModelId,
}

/// Orchestrates retries, fallback chains, timeout budget, and circuit
/// breakers for agent invocations.
#[derive(Default)]
pub struct ReliabilityEngine {
    breakers: CircuitBreakerRegistry,
}

impl ReliabilityEngine {
    /// Create a new engine with an empty breaker registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            breakers: CircuitBreakerRegistry::new(),
        }
    }

    /// Access the breaker registry (for stats and manual intervention).
    #[must_use]
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        &self.breakers
    }

    /// Invoke `operation` against the primary model, falling back through
    /// `fallbacks` in order.
    ///
    /// # Errors
    /// Returns the last encountered error once every model in the try-list
    /// is exhausted, a `Timeout` when the overall budget elapses, or the
    /// triggering error directly when it matches the non-fallback list.
    pub async fn invoke<T, F, Fut>(
        &self,
        policy: &ReliabilityPolicy,
        agent_key: &str,
        primary: &ModelId,
        fallbacks: &[ModelId],
        operation: F,
    ) -> PipelineResult<InvokeOutcome<T>>
    where
        F: Fn(ModelId) -> Fut,
        Fut: Future<Output = PipelineResult<T>>,
    {
        let strategy = RetryStrategy::new(policy.retry.clone());
        let started = Instant::now();
        let deadline = policy.overall_timeout.map(|t| started + t);
        let mut last_error: Option<PipelineError> = None;

        let try_list = std::iter::once(primary).chain(fallbacks.iter());
        for model in try_list {
            let target = format!("{agent_key}:{model}");
            let breaker = policy
                .circuit_breaker
                .as_ref()
                .map(|config| self.breakers.breaker(&target, config));

            if let Some(ref breaker) = breaker {
                if !breaker.allow_request() {
                    debug!(target = %target, "circuit open, skipping to next model");
                    last_error = Some(PipelineError::circuit_open(&target));
                    continue;
                }
            }

            let mut attempt: u32 = 0;
            loop {
                if let Some(deadline) = deadline {
                    if Instant::now() >= deadline {
                        warn!(
                            agent = agent_key,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "overall timeout exhausted during retry/fallback sequence"
                        );
                        return Err(PipelineError::timeout(started.elapsed()));
                    }
                }

                match operation(model.clone()).await {
                    Ok(value) => {
                        if let Some(ref breaker) = breaker {
                            breaker.record_success();
                        }
                        if attempt > 0 || model != primary {
                            debug!(
                                agent = agent_key,
                                model = %model,
                                attempt,
                                "invocation recovered"
                            );
                        }
                        return Ok(InvokeOutcome {
                            value,
                            model: model.clone(),
                        });
                    }
                    Err(error) => {
                        if let Some(ref breaker) = breaker {
                            breaker.record_failure();
                        }

                        if Self::matches_non_fallback(&error, policy) {
                            debug!(
                                agent = agent_key,
                                model = %model,
                                error = %error,
                                "non-fallback error, propagating immediately"
                            );
                            return Err(error);
                        }

                        let can_retry =
                            strategy.is_retryable(&error) && strategy.should_retry(attempt);
                        if !can_retry {
                            warn!(
                                agent = agent_key,
                                model = %model,
                                attempts = attempt + 1,
                                error = %error,
                                "model exhausted, moving to next in try-list"
                            );
                            last_error = Some(error);
                            break;
                        }

                        // Re-check the breaker before each retry: a failed
                        // half-open trial must not be retried against.
                        if let Some(ref breaker) = breaker {
                            if !breaker.allow_request() {
                                last_error = Some(PipelineError::circuit_open(&target));
                                break;
                            }
                        }

                        let delay = strategy.delay_for(attempt);
                        debug!(
                            agent = agent_key,
                            model = %model,
                            attempt = attempt + 1,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "retrying after error"
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| PipelineError::internal("try-list exhausted without an error")))
    }

    fn matches_non_fallback(error: &PipelineError, policy: &ReliabilityPolicy) -> bool {
        // Validation errors never trigger an expensive fallback chain.
        if matches!(error, PipelineError::Validation { .. }) {
            return true;
        }
        if policy.non_fallback_patterns.is_empty() {
            return false;
        }
        let class = error.class_name().to_lowercase();
        let message = error.to_string().to_lowercase();
        policy.non_fallback_patterns.iter().any(|p| {
            let p = p.to_lowercase();
            class == p || message.contains(&p)
        })
    }
}
