//! Write-side spend accounting.
//!
//! Every successful invocation lands here: cost increments four counters
//! (global and per-agent, daily and monthly), tokens and executions two
//! each (tokens and executions are never tracked per agent). Counter TTLs
//! apply only on key creation, so repeated increments never extend a
//! period. Accounting is best-effort: store failures are logged and
//! swallowed, never propagated into the user-facing call.

use crate::alerts::{AlertKind, AlertSink, BudgetAlert};
use crate::config::BudgetConfig;
use crate::keys;
use chrono::{DateTime, Utc};
use pipeline_core::{BudgetDimension, BudgetPeriod, BudgetScope, Enforcement, TenantId};
use pipeline_store::{counter_for, Counter, KeyValueStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Records spend, token, and execution counters and fires cap alerts.
pub struct SpendRecorder {
    counter: Arc<dyn Counter>,
    store: Arc<dyn KeyValueStore>,
    alerts: Arc<dyn AlertSink>,
    namespace: String,
    alert_dedup_ttl: Duration,
}

impl SpendRecorder {
    /// Create a recorder over the shared store.
    ///
    /// The counter strategy (atomic vs read-modify-write) is selected once
    /// here from the store's capabilities.
    #[must_use]
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        alerts: Arc<dyn AlertSink>,
        namespace: impl Into<String>,
        alert_dedup_ttl: Duration,
    ) -> Self {
        Self {
            counter: counter_for(Arc::clone(&store)),
            store,
            alerts,
            namespace: namespace.into(),
            alert_dedup_ttl,
        }
    }

    /// Record spend for an invocation.
    pub async fn record_spend(
        &self,
        agent: &str,
        amount: f64,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
    ) {
        self.record_spend_at(agent, amount, tenant, config, Utc::now())
            .await;
    }

    /// Record spend as of an explicit instant (exposed for tests and
    /// backfill tooling).
    pub async fn record_spend_at(
        &self,
        agent: &str,
        amount: f64,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
        now: DateTime<Utc>,
    ) {
        if amount <= 0.0 {
            return;
        }

        let mut totals = [None, None, None, None];
        let slots = [
            (BudgetScope::Global, BudgetPeriod::Daily),
            (BudgetScope::Global, BudgetPeriod::Monthly),
            (BudgetScope::Agent, BudgetPeriod::Daily),
            (BudgetScope::Agent, BudgetPeriod::Monthly),
        ];
        for (slot, (scope, period)) in totals.iter_mut().zip(slots) {
            let agent_part = match scope {
                BudgetScope::Global => None,
                BudgetScope::Agent => Some(agent),
            };
            let key = keys::spend_key(&self.namespace, scope, period, agent_part, tenant, now);
            *slot = self.increment(&key, amount, period.ttl()).await;
        }

        debug!(
            agent,
            amount,
            tenant = tenant.map_or("-", TenantId::as_str),
            "spend recorded"
        );

        if !config.enabled {
            return;
        }

        // First breach wins; one alert per (kind, scope, tenant, day).
        let checks = [
            (
                BudgetScope::Global,
                BudgetPeriod::Daily,
                config.daily_limit,
                totals[0],
            ),
            (
                BudgetScope::Global,
                BudgetPeriod::Monthly,
                config.monthly_limit,
                totals[1],
            ),
            (
                BudgetScope::Agent,
                BudgetPeriod::Daily,
                config.agent_cost_limit(BudgetPeriod::Daily, agent),
                totals[2],
            ),
            (
                BudgetScope::Agent,
                BudgetPeriod::Monthly,
                config.agent_cost_limit(BudgetPeriod::Monthly, agent),
                totals[3],
            ),
        ];
        for (scope, period, limit, total) in checks {
            let (Some(limit), Some(total)) = (limit, total) else {
                continue;
            };
            if total >= limit {
                let agent_part = match scope {
                    BudgetScope::Global => None,
                    BudgetScope::Agent => Some(agent),
                };
                self.emit_once(
                    config,
                    scope,
                    period,
                    BudgetDimension::Cost,
                    limit,
                    total,
                    agent_part,
                    tenant,
                    now,
                )
                .await;
                break;
            }
        }
    }

    /// Record token usage for an invocation.
    pub async fn record_tokens(
        &self,
        agent: &str,
        tokens: u64,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
    ) {
        self.record_tokens_at(agent, tokens, tenant, config, Utc::now())
            .await;
    }

    /// Record token usage as of an explicit instant.
    pub async fn record_tokens_at(
        &self,
        agent: &str,
        tokens: u64,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
        now: DateTime<Utc>,
    ) {
        if tokens == 0 {
            return;
        }

        let mut totals = [None, None];
        for (slot, period) in totals
            .iter_mut()
            .zip([BudgetPeriod::Daily, BudgetPeriod::Monthly])
        {
            let key = keys::token_key(&self.namespace, period, tenant, now);
            *slot = self.increment(&key, tokens as f64, period.ttl()).await;
        }

        debug!(
            agent,
            tokens,
            tenant = tenant.map_or("-", TenantId::as_str),
            "token usage recorded"
        );

        if !config.enabled {
            return;
        }

        let checks = [
            (BudgetPeriod::Daily, config.daily_token_limit, totals[0]),
            (BudgetPeriod::Monthly, config.monthly_token_limit, totals[1]),
        ];
        for (period, limit, total) in checks {
            let (Some(limit), Some(total)) = (limit, total) else {
                continue;
            };
            if total >= limit as f64 {
                self.emit_once(
                    config,
                    BudgetScope::Global,
                    period,
                    BudgetDimension::Tokens,
                    limit as f64,
                    total,
                    None,
                    tenant,
                    now,
                )
                .await;
                break;
            }
        }
    }

    /// Record one execution for an invocation.
    pub async fn record_execution(
        &self,
        agent: &str,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
    ) {
        self.record_execution_at(agent, tenant, config, Utc::now())
            .await;
    }

    /// Record one execution as of an explicit instant.
    pub async fn record_execution_at(
        &self,
        agent: &str,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
        now: DateTime<Utc>,
    ) {
        let mut totals = [None, None];
        for (slot, period) in totals
            .iter_mut()
            .zip([BudgetPeriod::Daily, BudgetPeriod::Monthly])
        {
            let key = keys::execution_key(&self.namespace, period, tenant, now);
            *slot = self.increment(&key, 1.0, period.ttl()).await;
        }

        debug!(
            agent,
            tenant = tenant.map_or("-", TenantId::as_str),
            "execution recorded"
        );

        if !config.enabled {
            return;
        }

        let checks = [
            (BudgetPeriod::Daily, config.daily_execution_limit, totals[0]),
            (
                BudgetPeriod::Monthly,
                config.monthly_execution_limit,
                totals[1],
            ),
        ];
        for (period, limit, total) in checks {
            let (Some(limit), Some(total)) = (limit, total) else {
                continue;
            };
            if total >= limit as f64 {
                self.emit_once(
                    config,
                    BudgetScope::Global,
                    period,
                    BudgetDimension::Executions,
                    limit as f64,
                    total,
                    None,
                    tenant,
                    now,
                )
                .await;
                break;
            }
        }
    }

    async fn increment(&self, key: &str, amount: f64, ttl: Duration) -> Option<f64> {
        match self.counter.increment(key, amount, ttl).await {
            Ok(total) => Some(total),
            Err(error) => {
                warn!(key, %error, "counter increment failed, spend not recorded");
                None
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn emit_once(
        &self,
        config: &BudgetConfig,
        scope: BudgetScope,
        period: BudgetPeriod,
        dimension: BudgetDimension,
        limit: f64,
        current: f64,
        agent: Option<&str>,
        tenant: Option<&TenantId>,
        now: DateTime<Utc>,
    ) {
        let kind = match config.enforcement {
            Enforcement::Hard => AlertKind::HardCap,
            Enforcement::Soft | Enforcement::None => AlertKind::SoftCap,
        };
        let marker = keys::alert_marker_key(&self.namespace, kind, scope, agent, tenant, now);

        match self
            .store
            .write_if_absent(&marker, b"1".to_vec(), Some(self.alert_dedup_ttl))
            .await
        {
            Ok(true) => {
                self.alerts
                    .notify(BudgetAlert {
                        kind,
                        scope,
                        period,
                        dimension,
                        limit,
                        current,
                        agent: agent.map(str::to_string),
                        tenant: tenant.cloned(),
                        timestamp: now,
                    })
                    .await;
            }
            Ok(false) => {
                debug!(marker, "budget alert suppressed by dedup marker");
            }
            Err(error) => {
                warn!(marker, %error, "alert dedup marker write failed, skipping alert");
            }
        }
    }
}
