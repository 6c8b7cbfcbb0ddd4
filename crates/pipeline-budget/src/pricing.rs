//! Model pricing for cost derivation.
//!
//! Costs are derived from token usage in two phases at record time: tokens
//! first, then cost from the pricing table. A provider-reported cost, when
//! present on the response, takes precedence over table-derived cost.

use pipeline_core::ModelId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Pricing for a single model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Model id this pricing applies to.
    pub model: String,
    /// Cost per 1K input tokens (USD).
    pub input_cost_per_1k: f64,
    /// Cost per 1K output tokens (USD).
    pub output_cost_per_1k: f64,
}

impl ModelPricing {
    /// Create pricing for a model.
    #[must_use]
    pub fn new(model: impl Into<String>, input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            model: model.into(),
            input_cost_per_1k: input_per_1k,
            output_cost_per_1k: output_per_1k,
        }
    }

    /// Cost of a token count pair under this pricing.
    #[must_use]
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        let input_cost = (f64::from(input_tokens) / 1000.0) * self.input_cost_per_1k;
        let output_cost = (f64::from(output_tokens) / 1000.0) * self.output_cost_per_1k;
        input_cost + output_cost
    }
}

/// Registry of per-model pricing with default fallback rates.
#[derive(Debug, Clone)]
pub struct PricingTable {
    models: HashMap<String, ModelPricing>,
    default_input_cost_per_1k: f64,
    default_output_cost_per_1k: f64,
}

impl Default for PricingTable {
    fn default() -> Self {
        Self {
            models: HashMap::new(),
            default_input_cost_per_1k: 0.01,
            default_output_cost_per_1k: 0.03,
        }
    }
}

impl PricingTable {
    /// Create an empty table with the standard default rates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the fallback rates used for unknown models.
    #[must_use]
    pub fn with_default_pricing(mut self, input_per_1k: f64, output_per_1k: f64) -> Self {
        self.default_input_cost_per_1k = input_per_1k;
        self.default_output_cost_per_1k = output_per_1k;
        self
    }

    /// Register pricing for a model.
    #[must_use]
    pub fn with_model(mut self, pricing: ModelPricing) -> Self {
        self.models.insert(pricing.model.clone(), pricing);
        self
    }

    /// Pricing for a model, if registered.
    #[must_use]
    pub fn pricing_for(&self, model: &ModelId) -> Option<&ModelPricing> {
        self.models.get(model.as_str())
    }

    /// Cost of a token count pair for a model, using the default rates for
    /// unregistered models.
    #[must_use]
    pub fn cost_for(&self, model: &ModelId, input_tokens: u32, output_tokens: u32) -> f64 {
        match self.pricing_for(model) {
            Some(pricing) => pricing.calculate_cost(input_tokens, output_tokens),
            None => {
                let input_cost =
                    (f64::from(input_tokens) / 1000.0) * self.default_input_cost_per_1k;
                let output_cost =
                    (f64::from(output_tokens) / 1000.0) * self.default_output_cost_per_1k;
                input_cost + output_cost
            }
        }
    }
}
