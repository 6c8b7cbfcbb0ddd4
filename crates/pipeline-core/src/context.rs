//! Per-invocation execution context.
//!
//! A context is created for each call, threaded through the pipeline
//! stages, and discarded once the result is extracted. It is exclusively
//! owned by the call that created it and never shared across invocations.

use crate::error::{PipelineError, PipelineResult};
use crate::response::AgentOutput;
use crate::types::{ExecutionKind, ModelId, RequestId, TenantId};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Mutable per-invocation state.
///
/// Invariant: `output` and `error` are mutually exclusive; exactly one is
/// set by the time the pipeline completes.
#[derive(Debug)]
pub struct ExecutionContext {
    /// Unique id for this invocation.
    pub request_id: RequestId,

    /// Agent type name.
    pub agent_name: String,

    /// Agent type version.
    pub agent_version: String,

    /// Invocation modality.
    pub kind: ExecutionKind,

    /// The resolved model for this call. Updated when a fallback model
    /// serves the request.
    pub model: ModelId,

    /// The resolved tenant, if any.
    pub tenant_id: Option<TenantId>,

    /// Caller requested a cache bypass.
    pub skip_cache: bool,

    /// Caller requested a streaming response (never cached).
    pub streaming: bool,

    /// Opaque input payload.
    pub input: serde_json::Value,

    /// Resolved modality-specific parameters.
    pub params: BTreeMap<String, String>,

    /// Wall-clock start of the invocation.
    pub started_at: DateTime<Utc>,

    /// Accumulated input token count.
    pub input_tokens: u32,

    /// Accumulated output token count.
    pub output_tokens: u32,

    /// Accumulated cost in USD.
    pub total_cost: f64,

    clock: Instant,
    output: Option<AgentOutput>,
    error: Option<String>,
}

impl ExecutionContext {
    /// Create a fresh context for one invocation.
    #[must_use]
    pub fn new(
        agent_name: impl Into<String>,
        agent_version: impl Into<String>,
        kind: ExecutionKind,
        model: ModelId,
        input: serde_json::Value,
    ) -> Self {
        Self {
            request_id: RequestId::generate(),
            agent_name: agent_name.into(),
            agent_version: agent_version.into(),
            kind,
            model,
            tenant_id: None,
            skip_cache: false,
            streaming: false,
            input,
            params: BTreeMap::new(),
            started_at: Utc::now(),
            input_tokens: 0,
            output_tokens: 0,
            total_cost: 0.0,
            clock: Instant::now(),
            output: None,
            error: None,
        }
    }

    /// Accumulate token usage from a provider response.
    pub fn record_usage(&mut self, input_tokens: u32, output_tokens: u32) {
        self.input_tokens = self.input_tokens.saturating_add(input_tokens);
        self.output_tokens = self.output_tokens.saturating_add(output_tokens);
    }

    /// Accumulate cost.
    pub fn record_cost(&mut self, cost: f64) {
        if cost > 0.0 {
            self.total_cost += cost;
        }
    }

    /// Set the final output.
    ///
    /// # Errors
    /// Returns an internal error if an output or error was already set; the
    /// terminal stage sets the result exactly once.
    pub fn set_output(&mut self, output: AgentOutput) -> PipelineResult<()> {
        if self.output.is_some() {
            return Err(PipelineError::internal("context output set twice"));
        }
        if self.error.is_some() {
            return Err(PipelineError::internal(
                "context output set after error was recorded",
            ));
        }
        self.output = Some(output);
        Ok(())
    }

    /// Record the terminal error message.
    ///
    /// # Errors
    /// Returns an internal error if an output was already set.
    pub fn set_error(&mut self, message: impl Into<String>) -> PipelineResult<()> {
        if self.output.is_some() {
            return Err(PipelineError::internal(
                "context error set after output was recorded",
            ));
        }
        self.error = Some(message.into());
        Ok(())
    }

    /// The final output, if the invocation succeeded.
    #[must_use]
    pub fn output(&self) -> Option<&AgentOutput> {
        self.output.as_ref()
    }

    /// The terminal error message, if the invocation failed.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Extract the final output, consuming the context.
    ///
    /// # Errors
    /// Returns an internal error if the pipeline terminated without setting
    /// an output.
    pub fn into_output(self) -> PipelineResult<AgentOutput> {
        self.output
            .ok_or_else(|| PipelineError::internal("pipeline completed without an output"))
    }

    /// Elapsed time since the context was created.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.clock.elapsed()
    }

    /// Elapsed milliseconds since the context was created.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    /// Total tokens accumulated so far.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}
