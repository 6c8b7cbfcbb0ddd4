//! The result returned to callers by the pipeline.

use crate::provider::{ProviderResponse, ResponseExtras};
use crate::types::ModelId;
use serde::{Deserialize, Serialize};

/// Final result of an agent invocation.
///
/// This is what `ExecutionContext::output` holds and what the cache layer
/// serializes. `cached` is true when the value was served from the response
/// cache instead of a live provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentOutput {
    /// The produced content.
    pub content: serde_json::Value,

    /// The model that produced the content (the primary model or a
    /// fallback).
    pub model: ModelId,

    /// Tokens consumed by the prompt/input.
    pub input_tokens: u32,

    /// Tokens produced in the response.
    pub output_tokens: u32,

    /// Cost of the invocation in USD. Zero for cache hits.
    pub cost: f64,

    /// Whether this result was served from cache.
    pub cached: bool,

    /// Modality-specific extras carried over from the provider response.
    #[serde(default, skip_serializing_if = "ResponseExtras::is_empty")]
    pub extras: ResponseExtras,
}

impl AgentOutput {
    /// Build an output from a live provider response.
    #[must_use]
    pub fn from_response(response: ProviderResponse, model: ModelId, cost: f64) -> Self {
        Self {
            content: response.content,
            model,
            input_tokens: response.input_tokens,
            output_tokens: response.output_tokens,
            cost,
            cached: false,
            extras: response.extras,
        }
    }

    /// Mark this output as served from cache. A cache hit incurs no new
    /// cost, so the cost is zeroed.
    #[must_use]
    pub fn into_cached(mut self) -> Self {
        self.cached = true;
        self.cost = 0.0;
        self
    }

    /// Total tokens for this output.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}
