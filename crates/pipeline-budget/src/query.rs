//! Read-side budget queries.
//!
//! Pure reads over the same key scheme the recorder writes. Absent keys
//! read as zero; dimensions without a configured limit are unlimited and
//! are omitted from status reports entirely.

use crate::config::BudgetConfig;
use crate::forecast::{Forecaster, LinearForecaster, SpendForecast};
use crate::keys;
use chrono::{DateTime, Utc};
use pipeline_core::{BudgetPeriod, BudgetScope, TenantId};
use pipeline_store::KeyValueStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Remaining room under a limit, or unlimited when no limit is configured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "amount")]
pub enum Remaining<T> {
    /// No limit configured for this dimension.
    Unlimited,
    /// Room left under the limit; never negative.
    Amount(T),
}

impl Remaining<f64> {
    /// Whether the limit is fully consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Amount(a) if *a <= 0.0)
    }
}

impl Remaining<u64> {
    /// Whether the limit is fully consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Amount(0))
    }
}

/// Point-in-time view of one budget dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionStatus {
    /// The configured limit.
    pub limit: f64,
    /// The current counter value.
    pub current: f64,
    /// Room left under the limit; never negative.
    pub remaining: f64,
    /// `current / limit` as a percentage, rounded to two decimals.
    pub percent_used: f64,
}

impl DimensionStatus {
    fn compute(limit: f64, current: f64) -> Self {
        Self {
            limit,
            current,
            remaining: (limit - current).max(0.0),
            percent_used: round2(current / limit * 100.0),
        }
    }
}

/// Aggregate budget status for a tenant (and optionally one agent).
///
/// Dimensions without a configured limit are absent, not zeroed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetStatusReport {
    /// Tenant-wide daily cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_daily: Option<DimensionStatus>,
    /// Tenant-wide monthly cost.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_monthly: Option<DimensionStatus>,
    /// Per-agent daily cost, when an agent was named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_daily: Option<DimensionStatus>,
    /// Per-agent monthly cost, when an agent was named.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_monthly: Option<DimensionStatus>,
    /// Tenant-wide daily tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_daily: Option<DimensionStatus>,
    /// Tenant-wide monthly tokens.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_monthly: Option<DimensionStatus>,
    /// Month-end spend projection.
    pub forecast: SpendForecast,
    /// When the report was generated.
    pub generated_at: DateTime<Utc>,
}

/// Read-side view over spend, token, and execution counters.
pub struct BudgetQuery {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    forecaster: Arc<dyn Forecaster>,
}

impl BudgetQuery {
    /// Create a query view with the default linear forecaster.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>, namespace: impl Into<String>) -> Self {
        Self::with_forecaster(store, namespace, Arc::new(LinearForecaster::new()))
    }

    /// Create a query view with a custom forecaster.
    #[must_use]
    pub fn with_forecaster(
        store: Arc<dyn KeyValueStore>,
        namespace: impl Into<String>,
        forecaster: Arc<dyn Forecaster>,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            forecaster,
        }
    }

    /// Current spend for a scope and period. Zero when no counter exists.
    pub async fn current_spend(
        &self,
        scope: BudgetScope,
        period: BudgetPeriod,
        agent: Option<&str>,
        tenant: Option<&TenantId>,
    ) -> f64 {
        self.current_spend_at(scope, period, agent, tenant, Utc::now())
            .await
    }

    /// Current spend as of an explicit instant.
    pub async fn current_spend_at(
        &self,
        scope: BudgetScope,
        period: BudgetPeriod,
        agent: Option<&str>,
        tenant: Option<&TenantId>,
        now: DateTime<Utc>,
    ) -> f64 {
        let key = keys::spend_key(&self.namespace, scope, period, agent, tenant, now);
        self.read_counter(&key).await
    }

    /// Current token count for a period. Zero when no counter exists.
    pub async fn current_tokens(&self, period: BudgetPeriod, tenant: Option<&TenantId>) -> u64 {
        self.current_tokens_at(period, tenant, Utc::now()).await
    }

    /// Current token count as of an explicit instant.
    pub async fn current_tokens_at(
        &self,
        period: BudgetPeriod,
        tenant: Option<&TenantId>,
        now: DateTime<Utc>,
    ) -> u64 {
        let key = keys::token_key(&self.namespace, period, tenant, now);
        self.read_counter(&key).await as u64
    }

    /// Current execution count for a period. Zero when no counter exists.
    pub async fn current_executions(
        &self,
        period: BudgetPeriod,
        tenant: Option<&TenantId>,
    ) -> u64 {
        self.current_executions_at(period, tenant, Utc::now()).await
    }

    /// Current execution count as of an explicit instant.
    pub async fn current_executions_at(
        &self,
        period: BudgetPeriod,
        tenant: Option<&TenantId>,
        now: DateTime<Utc>,
    ) -> u64 {
        let key = keys::execution_key(&self.namespace, period, tenant, now);
        self.read_counter(&key).await as u64
    }

    /// Remaining cost budget for a scope and period.
    ///
    /// `max(limit - current, 0)`, or unlimited when no limit is configured
    /// for the dimension.
    pub async fn remaining_budget(
        &self,
        scope: BudgetScope,
        period: BudgetPeriod,
        agent: Option<&str>,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
    ) -> Remaining<f64> {
        let limit = match scope {
            BudgetScope::Global => config.cost_limit(period),
            BudgetScope::Agent => agent.and_then(|a| config.agent_cost_limit(period, a)),
        };
        let Some(limit) = limit else {
            return Remaining::Unlimited;
        };
        let current = self.current_spend(scope, period, agent, tenant).await;
        Remaining::Amount((limit - current).max(0.0))
    }

    /// Remaining token budget for a period (global scope only).
    pub async fn remaining_token_budget(
        &self,
        period: BudgetPeriod,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
    ) -> Remaining<u64> {
        let Some(limit) = config.token_limit(period) else {
            return Remaining::Unlimited;
        };
        let current = self.current_tokens(period, tenant).await;
        Remaining::Amount(limit.saturating_sub(current))
    }

    /// Aggregate status snapshot with forecast.
    pub async fn status(
        &self,
        agent: Option<&str>,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
    ) -> BudgetStatusReport {
        self.status_at(agent, tenant, config, Utc::now()).await
    }

    /// Aggregate status snapshot as of an explicit instant.
    pub async fn status_at(
        &self,
        agent: Option<&str>,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
        now: DateTime<Utc>,
    ) -> BudgetStatusReport {
        let mut report = BudgetStatusReport {
            global_daily: None,
            global_monthly: None,
            agent_daily: None,
            agent_monthly: None,
            tokens_daily: None,
            tokens_monthly: None,
            forecast: self.forecaster.project(
                self.current_spend_at(
                    BudgetScope::Global,
                    BudgetPeriod::Monthly,
                    None,
                    tenant,
                    now,
                )
                .await,
                now,
            ),
            generated_at: now,
        };

        for period in [BudgetPeriod::Daily, BudgetPeriod::Monthly] {
            if let Some(limit) = config.cost_limit(period) {
                let current = self
                    .current_spend_at(BudgetScope::Global, period, None, tenant, now)
                    .await;
                let status = DimensionStatus::compute(limit, current);
                match period {
                    BudgetPeriod::Daily => report.global_daily = Some(status),
                    BudgetPeriod::Monthly => report.global_monthly = Some(status),
                }
            }

            if let Some(agent) = agent {
                if let Some(limit) = config.agent_cost_limit(period, agent) {
                    let current = self
                        .current_spend_at(BudgetScope::Agent, period, Some(agent), tenant, now)
                        .await;
                    let status = DimensionStatus::compute(limit, current);
                    match period {
                        BudgetPeriod::Daily => report.agent_daily = Some(status),
                        BudgetPeriod::Monthly => report.agent_monthly = Some(status),
                    }
                }
            }

            if let Some(limit) = config.token_limit(period) {
                let current = self.current_tokens_at(period, tenant, now).await;
                let status = DimensionStatus::compute(limit as f64, current as f64);
                match period {
                    BudgetPeriod::Daily => report.tokens_daily = Some(status),
                    BudgetPeriod::Monthly => report.tokens_monthly = Some(status),
                }
            }
        }

        report
    }

    async fn read_counter(&self, key: &str) -> f64 {
        match self.store.read(key).await {
            Ok(Some(data)) => std::str::from_utf8(&data)
                .ok()
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(0.0),
            Ok(None) => 0.0,
            Err(error) => {
                warn!(key, %error, "counter read failed, treating as zero");
                0.0
            }
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
