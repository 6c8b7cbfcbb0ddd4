//! Engine-wide configuration.
//!
//! Built once at process start and passed explicitly to the pipeline
//! constructor. Immutable thereafter; there is no ambient global.

use crate::tenant::BudgetOverrides;
use std::collections::HashMap;
use std::time::Duration;

/// Immutable engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Namespace prefix for all store keys (cache entries, counters, alert
    /// markers).
    pub namespace: String,

    /// Master switch for budget tracking and enforcement.
    pub budgets_enabled: bool,

    /// Global default budget limits, merged under tenant records.
    pub default_budgets: BudgetOverrides,

    /// Stored per-tenant budget records, keyed by tenant id.
    pub tenant_budgets: HashMap<String, BudgetOverrides>,

    /// TTL of the alert deduplication marker.
    pub alert_dedup_ttl: Duration,

    /// Default cache TTL for agents that enable caching without one.
    pub default_cache_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            namespace: "agent-pipeline".to_string(),
            budgets_enabled: true,
            default_budgets: BudgetOverrides::default(),
            tenant_budgets: HashMap::new(),
            alert_dedup_ttl: Duration::from_secs(60 * 60),
            default_cache_ttl: Duration::from_secs(60 * 60),
        }
    }
}

impl EngineConfig {
    /// Create a builder.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// The stored budget record for a tenant, if any.
    #[must_use]
    pub fn tenant_budget(&self, tenant_id: &str) -> Option<&BudgetOverrides> {
        self.tenant_budgets.get(tenant_id)
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Default)]
pub struct EngineConfigBuilder {
    config: EngineConfig,
}

impl EngineConfigBuilder {
    /// Create a new builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key namespace.
    #[must_use]
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Enable or disable budget tracking.
    #[must_use]
    pub fn budgets_enabled(mut self, enabled: bool) -> Self {
        self.config.budgets_enabled = enabled;
        self
    }

    /// Set the global default budget limits.
    #[must_use]
    pub fn default_budgets(mut self, defaults: BudgetOverrides) -> Self {
        self.config.default_budgets = defaults;
        self
    }

    /// Register a stored budget record for a tenant.
    #[must_use]
    pub fn tenant_budget(mut self, tenant_id: impl Into<String>, record: BudgetOverrides) -> Self {
        self.config.tenant_budgets.insert(tenant_id.into(), record);
        self
    }

    /// Set the alert deduplication marker TTL.
    #[must_use]
    pub fn alert_dedup_ttl(mut self, ttl: Duration) -> Self {
        self.config.alert_dedup_ttl = ttl;
        self
    }

    /// Set the default cache TTL.
    #[must_use]
    pub fn default_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_cache_ttl = ttl;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        self.config
    }
}
