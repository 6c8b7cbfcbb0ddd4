//! Resolved budget configuration.
//!
//! A [`BudgetConfig`] is the immutable value snapshot used for one call,
//! produced by layering an inline override over the tenant record over the
//! engine defaults. An absent limit means "unlimited for that dimension",
//! never zero.

use pipeline_core::{BudgetPeriod, BudgetOverrides, Enforcement};
use std::collections::HashMap;

/// Resolved, immutable budget configuration for a single call.
#[derive(Debug, Clone, PartialEq)]
pub struct BudgetConfig {
    /// Whether budget tracking applies at all.
    pub enabled: bool,
    /// Enforcement mode.
    pub enforcement: Enforcement,
    /// Tenant-wide daily cost limit (USD).
    pub daily_limit: Option<f64>,
    /// Tenant-wide monthly cost limit (USD).
    pub monthly_limit: Option<f64>,
    /// Per-agent daily cost limits (USD), keyed by agent name.
    pub agent_daily_limits: HashMap<String, f64>,
    /// Per-agent monthly cost limits (USD), keyed by agent name.
    pub agent_monthly_limits: HashMap<String, f64>,
    /// Tenant-wide daily token limit. Tokens are never limited per agent.
    pub daily_token_limit: Option<u64>,
    /// Tenant-wide monthly token limit.
    pub monthly_token_limit: Option<u64>,
    /// Tenant-wide daily execution-count limit.
    pub daily_execution_limit: Option<u64>,
    /// Tenant-wide monthly execution-count limit.
    pub monthly_execution_limit: Option<u64>,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            enforcement: Enforcement::Soft,
            daily_limit: None,
            monthly_limit: None,
            agent_daily_limits: HashMap::new(),
            agent_monthly_limits: HashMap::new(),
            daily_token_limit: None,
            monthly_token_limit: None,
            daily_execution_limit: None,
            monthly_execution_limit: None,
        }
    }
}

impl BudgetConfig {
    /// Resolve the effective configuration from up to three layers:
    /// engine defaults, the stored tenant record, and a per-call inline
    /// override. Higher layers win field by field; a layer with
    /// `inherit_defaults = false` discards everything beneath it.
    #[must_use]
    pub fn resolve(
        defaults: &BudgetOverrides,
        tenant: Option<&BudgetOverrides>,
        inline: Option<&BudgetOverrides>,
    ) -> Self {
        let mut merged = defaults.clone();

        if let Some(tenant) = tenant {
            if !tenant.inherits() {
                merged = BudgetOverrides::default();
            }
            merge_layer(&mut merged, tenant);
        }

        if let Some(inline) = inline {
            if !inline.inherits() {
                merged = BudgetOverrides::default();
            }
            merge_layer(&mut merged, inline);
        }

        Self {
            enabled: merged.enabled.unwrap_or(true),
            enforcement: merged.enforcement.unwrap_or(Enforcement::Soft),
            daily_limit: merged.daily_limit,
            monthly_limit: merged.monthly_limit,
            agent_daily_limits: merged.agent_daily_limits.unwrap_or_default(),
            agent_monthly_limits: merged.agent_monthly_limits.unwrap_or_default(),
            daily_token_limit: merged.daily_token_limit,
            monthly_token_limit: merged.monthly_token_limit,
            daily_execution_limit: merged.daily_execution_limit,
            monthly_execution_limit: merged.monthly_execution_limit,
        }
    }

    /// The tenant-wide cost limit for a period.
    #[must_use]
    pub fn cost_limit(&self, period: BudgetPeriod) -> Option<f64> {
        match period {
            BudgetPeriod::Daily => self.daily_limit,
            BudgetPeriod::Monthly => self.monthly_limit,
        }
    }

    /// The per-agent cost limit for a period, if one is configured for the
    /// agent.
    #[must_use]
    pub fn agent_cost_limit(&self, period: BudgetPeriod, agent: &str) -> Option<f64> {
        match period {
            BudgetPeriod::Daily => self.agent_daily_limits.get(agent).copied(),
            BudgetPeriod::Monthly => self.agent_monthly_limits.get(agent).copied(),
        }
    }

    /// The tenant-wide token limit for a period.
    #[must_use]
    pub fn token_limit(&self, period: BudgetPeriod) -> Option<u64> {
        match period {
            BudgetPeriod::Daily => self.daily_token_limit,
            BudgetPeriod::Monthly => self.monthly_token_limit,
        }
    }

    /// The tenant-wide execution-count limit for a period.
    #[must_use]
    pub fn execution_limit(&self, period: BudgetPeriod) -> Option<u64> {
        match period {
            BudgetPeriod::Daily => self.daily_execution_limit,
            BudgetPeriod::Monthly => self.monthly_execution_limit,
        }
    }

    /// Whether any checking should happen for this call.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.enforcement != Enforcement::None
    }
}

fn merge_layer(base: &mut BudgetOverrides, layer: &BudgetOverrides) {
    if layer.enabled.is_some() {
        base.enabled = layer.enabled;
    }
    if layer.enforcement.is_some() {
        base.enforcement = layer.enforcement;
    }
    if layer.daily_limit.is_some() {
        base.daily_limit = layer.daily_limit;
    }
    if layer.monthly_limit.is_some() {
        base.monthly_limit = layer.monthly_limit;
    }
    if layer.agent_daily_limits.is_some() {
        base.agent_daily_limits = layer.agent_daily_limits.clone();
    }
    if layer.agent_monthly_limits.is_some() {
        base.agent_monthly_limits = layer.agent_monthly_limits.clone();
    }
    if layer.daily_token_limit.is_some() {
        base.daily_token_limit = layer.daily_token_limit;
    }
    if layer.monthly_token_limit.is_some() {
        base.monthly_token_limit = layer.monthly_token_limit;
    }
    if layer.daily_execution_limit.is_some() {
        base.daily_execution_limit = layer.daily_execution_limit;
    }
    if layer.monthly_execution_limit.is_some() {
        base.monthly_execution_limit = layer.monthly_execution_limit;
    }
}
