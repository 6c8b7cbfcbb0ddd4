//! Scriptable provider double for integration testing.
//!
//! Per-model behaviors with call counters, so tests can assert exactly how
//! many attempts each model received.

use async_trait::async_trait;
use pipeline_core::{
    ModelId, PipelineError, PipelineResult, ProviderClient, ProviderRequest, ProviderResponse,
};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Mutex;

/// What a model does when invoked.
#[derive(Debug, Clone)]
pub enum ModelScript {
    /// Succeed with the given content, token counts, and optional
    /// provider-reported cost.
    Ok {
        /// Response content.
        content: serde_json::Value,
        /// Input tokens reported.
        input_tokens: u32,
        /// Output tokens reported.
        output_tokens: u32,
        /// Provider-reported cost, if any.
        cost: Option<f64>,
    },
    /// Fail with a rate-limit error on every attempt.
    RateLimit,
    /// Fail with a retryable 500 on every attempt.
    ServerError,
    /// Fail with a non-retryable 400 on every attempt.
    BadRequest,
    /// Fail `failures` times with rate limits, then succeed.
    FlakyThenOk {
        /// Number of failures before success.
        failures: u32,
    },
}

impl ModelScript {
    /// A plain success script.
    #[must_use]
    pub fn ok(content: &str) -> Self {
        Self::Ok {
            content: json!(content),
            input_tokens: 100,
            output_tokens: 50,
            cost: None,
        }
    }

    /// A success script with a provider-reported cost.
    #[must_use]
    pub fn ok_with_cost(content: &str, cost: f64) -> Self {
        Self::Ok {
            content: json!(content),
            input_tokens: 100,
            output_tokens: 50,
            cost: Some(cost),
        }
    }
}

/// Provider double driven by per-model scripts.
#[derive(Default)]
pub struct ScriptedProvider {
    scripts: Mutex<HashMap<String, ModelScript>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedProvider {
    /// Create a provider where every model succeeds with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a script to a model.
    #[must_use]
    pub fn with_script(self, model: &str, script: ModelScript) -> Self {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(model.to_string(), script);
        }
        self
    }

    /// Replace a model's script mid-test.
    pub fn set_script(&self, model: &str, script: ModelScript) {
        if let Ok(mut scripts) = self.scripts.lock() {
            scripts.insert(model.to_string(), script);
        }
    }

    /// Attempts made against a model.
    #[must_use]
    pub fn calls_for(&self, model: &str) -> u32 {
        self.calls
            .lock()
            .map(|calls| calls.get(model).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    /// Attempts made across all models.
    #[must_use]
    pub fn total_calls(&self) -> u32 {
        self.calls
            .lock()
            .map(|calls| calls.values().sum())
            .unwrap_or(0)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    async fn invoke(
        &self,
        model: &ModelId,
        _request: &ProviderRequest,
    ) -> PipelineResult<ProviderResponse> {
        let attempt = {
            let mut calls = self
                .calls
                .lock()
                .map_err(|_| PipelineError::internal("call counter poisoned"))?;
            let entry = calls.entry(model.as_str().to_string()).or_insert(0);
            *entry += 1;
            *entry
        };

        let script = self
            .scripts
            .lock()
            .map_err(|_| PipelineError::internal("script table poisoned"))?
            .get(model.as_str())
            .cloned();

        match script {
            None => Ok(ProviderResponse::new(json!("default response"), 100, 50)),
            Some(ModelScript::Ok {
                content,
                input_tokens,
                output_tokens,
                cost,
            }) => {
                let mut response = ProviderResponse::new(content, input_tokens, output_tokens);
                if let Some(cost) = cost {
                    response = response.with_cost(cost);
                }
                Ok(response)
            }
            Some(ModelScript::RateLimit) => Err(PipelineError::rate_limit(None)),
            Some(ModelScript::ServerError) => Err(PipelineError::provider(
                "mock",
                "internal server error",
                Some(500),
                false,
            )),
            Some(ModelScript::BadRequest) => Err(PipelineError::provider(
                "mock",
                "bad request",
                Some(400),
                false,
            )),
            Some(ModelScript::FlakyThenOk { failures }) => {
                if attempt <= failures {
                    Err(PipelineError::rate_limit(None))
                } else {
                    Ok(ProviderResponse::new(json!("recovered"), 100, 50))
                }
            }
        }
    }

    fn name(&self) -> &str {
        "scripted-mock"
    }
}
