//! Circuit breaker with a sliding failure window.
//!
//! The breaker stops sending requests to a failing agent/model target and
//! gives it time to recover. Failures older than the window are excluded
//! when evaluating the threshold; after the cooldown elapses a single trial
//! request is admitted.

use dashmap::DashMap;
use parking_lot::Mutex;
use pipeline_core::{PipelineError, PipelineResult};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Requests flow normally.
    Closed,
    /// Requests are rejected without contacting the target.
    Open,
    /// One trial request is admitted to probe recovery.
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Failures within the window required to open the circuit.
    pub failure_threshold: u32,
    /// Sliding window; failures older than this are ignored.
    pub window: Duration,
    /// Time to wait after opening before admitting a trial request.
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// Circuit breaker for a single agent/model target.
pub struct CircuitBreaker {
    target: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a new breaker.
    #[must_use]
    pub fn new(target: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            target: target.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(target: impl Into<String>) -> Self {
        Self::new(target, CircuitBreakerConfig::default())
    }

    /// The target this breaker guards.
    #[must_use]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Whether a request may proceed right now.
    ///
    /// In the open state this transitions to half-open once the cooldown
    /// has elapsed; half-open admits exactly one trial at a time.
    #[must_use]
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|at| at.elapsed());
                if elapsed.is_some_and(|e| e >= self.config.cooldown) {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    info!(target = %self.target, "circuit breaker half-open, admitting trial");
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    false
                } else {
                    inner.trial_in_flight = true;
                    true
                }
            }
        }
    }

    /// Check whether a request may proceed.
    ///
    /// # Errors
    /// Returns `PipelineError::CircuitOpen` when the breaker denies the
    /// request.
    pub fn check(&self) -> PipelineResult<()> {
        if self.allow_request() {
            Ok(())
        } else {
            Err(PipelineError::circuit_open(&self.target))
        }
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {}
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failures.clear();
                inner.opened_at = None;
                inner.trial_in_flight = false;
                info!(target = %self.target, "circuit breaker closed after successful trial");
            }
            CircuitState::Open => {
                // A late success from a request admitted before opening.
            }
        }
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        match inner.state {
            CircuitState::Closed => {
                inner.failures.push_back(now);
                Self::prune(&mut inner.failures, self.config.window, now);
                let failures = inner.failures.len() as u32;
                if failures >= self.config.failure_threshold {
                    debug!(
                        target = %self.target,
                        failures,
                        threshold = self.config.failure_threshold,
                        "circuit breaker failure threshold reached"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                    inner.trial_in_flight = false;
                    warn!(target = %self.target, "circuit breaker opened");
                }
            }
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.opened_at = Some(now);
                inner.trial_in_flight = false;
                warn!(target = %self.target, "circuit breaker reopened after failed trial");
            }
            CircuitState::Open => {}
        }
    }

    /// Reset to the closed state.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Closed;
        inner.failures.clear();
        inner.opened_at = None;
        inner.trial_in_flight = false;
        info!(target = %self.target, "circuit breaker reset");
    }

    /// Force the circuit open (manual intervention).
    pub fn force_open(&self) {
        let mut inner = self.inner.lock();
        inner.state = CircuitState::Open;
        inner.opened_at = Some(Instant::now());
        inner.trial_in_flight = false;
        warn!(target = %self.target, "circuit breaker forced open");
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn stats(&self) -> CircuitBreakerStats {
        let mut inner = self.inner.lock();
        let now = Instant::now();
        Self::prune(&mut inner.failures, self.config.window, now);
        CircuitBreakerStats {
            state: inner.state,
            failures_in_window: inner.failures.len() as u32,
            open_for: inner.opened_at.map(|at| at.elapsed()),
        }
    }

    fn prune(failures: &mut VecDeque<Instant>, window: Duration, now: Instant) {
        while let Some(front) = failures.front() {
            if now.duration_since(*front) > window {
                failures.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Snapshot of a breaker's state.
#[derive(Debug, Clone)]
pub struct CircuitBreakerStats {
    /// Current state.
    pub state: CircuitState,
    /// Failures currently inside the sliding window.
    pub failures_in_window: u32,
    /// How long the breaker has been open, if it is.
    pub open_for: Option<Duration>,
}

/// Per-target breaker registry.
///
/// Breakers are created lazily with the configuration supplied at first
/// use and shared by every invocation hitting the same target.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            breakers: DashMap::new(),
        }
    }

    /// Get or create the breaker for a target.
    #[must_use]
    pub fn breaker(&self, target: &str, config: &CircuitBreakerConfig) -> Arc<CircuitBreaker> {
        let entry = self
            .breakers
            .entry(target.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(target, config.clone())));
        Arc::clone(entry.value())
    }

    /// The breaker for a target, if one exists.
    #[must_use]
    pub fn get(&self, target: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers
            .get(target)
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Reset every breaker.
    pub fn reset_all(&self) {
        for entry in &self.breakers {
            entry.value().reset();
        }
    }

    /// Number of registered breakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
