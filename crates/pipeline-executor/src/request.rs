//! Per-call execution request.

use pipeline_core::{ModelId, TenantRef};
use std::collections::BTreeMap;

/// Everything a caller supplies for one invocation.
#[derive(Debug, Clone)]
pub struct ExecutionRequest {
    /// Opaque input payload.
    pub input: serde_json::Value,
    /// Resolved modality-specific parameters (voice, size, language, ...).
    pub params: BTreeMap<String, String>,
    /// The tenant this call is accounted against.
    pub tenant: TenantRef,
    /// Bypass the cache for this call.
    pub skip_cache: bool,
    /// Request a streaming response (never cached).
    pub stream: bool,
    /// Use this model instead of the agent's primary.
    pub model_override: Option<ModelId>,
    /// Caller-estimated cost of this call (USD), checked against the
    /// remaining budget pre-flight.
    pub estimated_cost: Option<f64>,
}

impl ExecutionRequest {
    /// Create a request with the given input and defaults elsewhere.
    #[must_use]
    pub fn new(input: serde_json::Value) -> Self {
        Self {
            input,
            params: BTreeMap::new(),
            tenant: TenantRef::Anonymous,
            skip_cache: false,
            stream: false,
            model_override: None,
            estimated_cost: None,
        }
    }

    /// Attach a tenant.
    #[must_use]
    pub fn with_tenant(mut self, tenant: TenantRef) -> Self {
        self.tenant = tenant;
        self
    }

    /// Attach a resolved parameter.
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Bypass the cache.
    #[must_use]
    pub fn with_skip_cache(mut self, skip: bool) -> Self {
        self.skip_cache = skip;
        self
    }

    /// Request streaming.
    #[must_use]
    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Override the model for this call.
    #[must_use]
    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Supply an estimated cost for pre-flight budget checking.
    #[must_use]
    pub fn with_estimated_cost(mut self, cost: f64) -> Self {
        self.estimated_cost = Some(cost);
        self
    }
}
