//! Provider abstraction.
//!
//! The actual LLM API clients live outside this pipeline. This module
//! defines the normalized request handed to them and the explicit response
//! shape they must return: optional capabilities (provider-reported cost,
//! transcription details) are optional fields, not runtime probing.

use crate::error::PipelineResult;
use crate::types::{ExecutionKind, ModelId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Normalized provider request built by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderRequest {
    /// The invocation modality.
    pub kind: ExecutionKind,

    /// Opaque input payload (messages, prompt, audio reference, ...).
    pub input: serde_json::Value,

    /// Resolved modality-specific parameters (voice, size, language, ...).
    ///
    /// Kept sorted so downstream consumers (cache fingerprinting) see a
    /// deterministic order.
    pub params: BTreeMap<String, String>,

    /// Whether the caller requested a streaming response.
    pub stream: bool,
}

impl ProviderRequest {
    /// Create a request with no parameters.
    #[must_use]
    pub fn new(kind: ExecutionKind, input: serde_json::Value) -> Self {
        Self {
            kind,
            input,
            params: BTreeMap::new(),
            stream: false,
        }
    }

    /// Attach a resolved parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Request a streaming response.
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Modality-specific response details a provider may populate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseExtras {
    /// Transcription segments, if the provider returned them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segments: Option<serde_json::Value>,

    /// Word-level timestamps, if the provider returned them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub words: Option<serde_json::Value>,

    /// Detected or requested language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Audio duration in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_secs: Option<f64>,
}

impl ResponseExtras {
    /// Whether any detail field is populated.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_none()
            && self.words.is_none()
            && self.language.is_none()
            && self.duration_secs.is_none()
    }
}

/// Normalized provider response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// The produced content (text, image reference, transcript, ...).
    pub content: serde_json::Value,

    /// Tokens consumed by the prompt/input.
    pub input_tokens: u32,

    /// Tokens produced in the response.
    pub output_tokens: u32,

    /// Provider-reported cost in USD. Takes precedence over pricing-table
    /// derivation when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,

    /// Modality-specific extras.
    #[serde(default, skip_serializing_if = "ResponseExtras::is_empty")]
    pub extras: ResponseExtras,
}

impl ProviderResponse {
    /// Create a response with the given content and token counts.
    #[must_use]
    pub fn new(content: serde_json::Value, input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            content,
            input_tokens,
            output_tokens,
            cost: None,
            extras: ResponseExtras::default(),
        }
    }

    /// Attach a provider-reported cost.
    #[must_use]
    pub fn with_cost(mut self, cost: f64) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Attach modality-specific extras.
    #[must_use]
    pub fn with_extras(mut self, extras: ResponseExtras) -> Self {
        self.extras = extras;
        self
    }

    /// Total tokens for this response.
    #[must_use]
    pub fn total_tokens(&self) -> u32 {
        self.input_tokens.saturating_add(self.output_tokens)
    }
}

/// The external LLM provider capability.
///
/// Implementations wrap concrete API clients; the pipeline only sees this
/// trait.
#[async_trait]
pub trait ProviderClient: Send + Sync {
    /// Invoke the provider for the given model.
    ///
    /// # Errors
    /// Returns a `Provider`, `RateLimit`, or `Timeout` error on failure.
    async fn invoke(
        &self,
        model: &ModelId,
        request: &ProviderRequest,
    ) -> PipelineResult<ProviderResponse>;

    /// Provider name for logs and records.
    fn name(&self) -> &str;
}
