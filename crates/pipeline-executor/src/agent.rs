//! Agent type registration.
//!
//! An [`AgentSpec`] is the immutable configuration snapshot for one agent
//! type, built once at registration time. Inheritance and defaults are
//! resolved here, in the builder, not at call time.

use pipeline_cache::CachePolicy;
use pipeline_core::{ExecutionKind, ModelId, PipelineError, PipelineResult};
use pipeline_resilience::ReliabilityPolicy;

/// Immutable per-agent-type configuration.
#[derive(Debug, Clone)]
pub struct AgentSpec {
    /// Agent type name (e.g., "summarizer").
    pub name: String,
    /// Agent type version; participates in cache fingerprints so a version
    /// bump invalidates stale entries.
    pub version: String,
    /// Invocation modality.
    pub kind: ExecutionKind,
    /// Primary model.
    pub model: ModelId,
    /// Fallback models tried in order after the primary fails.
    pub fallback_models: Vec<ModelId>,
    /// Response cache policy.
    pub cache: CachePolicy,
    /// Retry/fallback/circuit-breaker policy.
    pub reliability: ReliabilityPolicy,
}

impl AgentSpec {
    /// Start building a spec.
    #[must_use]
    pub fn builder(name: impl Into<String>, model: ModelId) -> AgentSpecBuilder {
        AgentSpecBuilder {
            name: name.into(),
            version: "1.0.0".to_string(),
            kind: ExecutionKind::Chat,
            model,
            fallback_models: Vec::new(),
            cache: CachePolicy::default(),
            reliability: ReliabilityPolicy::default(),
        }
    }
}

/// Builder for [`AgentSpec`].
#[derive(Debug)]
pub struct AgentSpecBuilder {
    name: String,
    version: String,
    kind: ExecutionKind,
    model: ModelId,
    fallback_models: Vec<ModelId>,
    cache: CachePolicy,
    reliability: ReliabilityPolicy,
}

impl AgentSpecBuilder {
    /// Set the version.
    #[must_use]
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Set the invocation modality.
    #[must_use]
    pub fn kind(mut self, kind: ExecutionKind) -> Self {
        self.kind = kind;
        self
    }

    /// Add a fallback model.
    #[must_use]
    pub fn fallback(mut self, model: ModelId) -> Self {
        self.fallback_models.push(model);
        self
    }

    /// Set the full fallback chain.
    #[must_use]
    pub fn fallbacks(mut self, models: Vec<ModelId>) -> Self {
        self.fallback_models = models;
        self
    }

    /// Set the cache policy.
    #[must_use]
    pub fn cache(mut self, cache: CachePolicy) -> Self {
        self.cache = cache;
        self
    }

    /// Set the reliability policy.
    #[must_use]
    pub fn reliability(mut self, reliability: ReliabilityPolicy) -> Self {
        self.reliability = reliability;
        self
    }

    /// Validate and build the spec.
    ///
    /// # Errors
    /// Returns a validation error for an empty name/version or a fallback
    /// chain containing the primary model or duplicates.
    pub fn build(self) -> PipelineResult<AgentSpec> {
        if self.name.trim().is_empty() {
            return Err(PipelineError::validation("agent name must not be empty"));
        }
        if self.version.trim().is_empty() {
            return Err(PipelineError::validation("agent version must not be empty"));
        }
        for (i, fallback) in self.fallback_models.iter().enumerate() {
            if *fallback == self.model {
                return Err(PipelineError::validation(format!(
                    "fallback model {fallback} duplicates the primary model"
                )));
            }
            if self.fallback_models[..i].contains(fallback) {
                return Err(PipelineError::validation(format!(
                    "fallback model {fallback} appears twice"
                )));
            }
        }

        Ok(AgentSpec {
            name: self.name,
            version: self.version,
            kind: self.kind,
            model: self.model,
            fallback_models: self.fallback_models,
            cache: self.cache,
            reliability: self.reliability,
        })
    }
}
