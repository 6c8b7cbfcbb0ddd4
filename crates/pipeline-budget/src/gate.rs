//! Pre-flight budget gate.
//!
//! Runs as the second pipeline stage, before the cache lookup, so every
//! invocation respects budget gating. The check-then-record sequence is not
//! transactional: two concurrent calls can both pass a check that would
//! have failed had they been serialized. Hard enforcement narrows but does
//! not close that window; it is best-effort by design.

use crate::config::BudgetConfig;
use crate::query::BudgetQuery;
use chrono::{DateTime, Utc};
use pipeline_core::{
    BudgetDimension, BudgetOverrides, BudgetPeriod, BudgetScope, Enforcement, EngineConfig,
    PipelineError, PipelineResult, TenantId,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Coordinates budget resolution and the pre-flight check.
pub struct BudgetGate {
    engine: Arc<EngineConfig>,
    query: Arc<BudgetQuery>,
}

struct Breach {
    scope: BudgetScope,
    period: BudgetPeriod,
    dimension: BudgetDimension,
    limit: f64,
    current: f64,
}

impl BudgetGate {
    /// Create a gate over the engine configuration and query view.
    #[must_use]
    pub fn new(engine: Arc<EngineConfig>, query: Arc<BudgetQuery>) -> Self {
        Self { engine, query }
    }

    /// Resolve the effective budget configuration for a call.
    #[must_use]
    pub fn effective_config(
        &self,
        tenant: Option<&TenantId>,
        inline: Option<&BudgetOverrides>,
    ) -> BudgetConfig {
        let record = tenant.and_then(|t| self.engine.tenant_budget(t.as_str()));
        BudgetConfig::resolve(&self.engine.default_budgets, record, inline)
    }

    /// Check every applicable limit for an invocation.
    ///
    /// Passes immediately when budgets are disabled or enforcement is
    /// `none`. A cost dimension breaches when its counter is already at or
    /// past the limit, or when `estimated_cost` is supplied and would push
    /// it past. On a breach: hard enforcement rejects with
    /// `BudgetExceeded`, soft enforcement logs and allows.
    ///
    /// # Errors
    /// Returns `PipelineError::BudgetExceeded` under hard enforcement.
    pub async fn check(
        &self,
        agent: &str,
        tenant: Option<&TenantId>,
        inline: Option<&BudgetOverrides>,
        estimated_cost: Option<f64>,
    ) -> PipelineResult<BudgetConfig> {
        self.check_at(agent, tenant, inline, estimated_cost, Utc::now())
            .await
    }

    /// Check as of an explicit instant (exposed for tests).
    ///
    /// # Errors
    /// Returns `PipelineError::BudgetExceeded` under hard enforcement.
    pub async fn check_at(
        &self,
        agent: &str,
        tenant: Option<&TenantId>,
        inline: Option<&BudgetOverrides>,
        estimated_cost: Option<f64>,
        now: DateTime<Utc>,
    ) -> PipelineResult<BudgetConfig> {
        let config = self.effective_config(tenant, inline);

        if !self.engine.budgets_enabled || !config.is_active() {
            debug!(agent, "budget gate inactive, passing");
            return Ok(config);
        }

        if let Some(breach) = self
            .first_breach(agent, tenant, &config, estimated_cost, now)
            .await
        {
            match config.enforcement {
                Enforcement::Hard => {
                    return Err(PipelineError::BudgetExceeded {
                        scope: breach.scope,
                        period: breach.period,
                        dimension: breach.dimension,
                        limit: breach.limit,
                        current: breach.current,
                        tenant: tenant.cloned(),
                    });
                }
                Enforcement::Soft | Enforcement::None => {
                    warn!(
                        agent,
                        scope = %breach.scope,
                        period = %breach.period,
                        dimension = %breach.dimension,
                        limit = breach.limit,
                        current = breach.current,
                        tenant = tenant.map_or("-", TenantId::as_str),
                        "budget limit reached, allowing under soft enforcement"
                    );
                }
            }
        }

        Ok(config)
    }

    fn cost_breached(limit: f64, current: f64, estimated_cost: Option<f64>) -> bool {
        current >= limit || estimated_cost.is_some_and(|estimate| current + estimate > limit)
    }

    async fn first_breach(
        &self,
        agent: &str,
        tenant: Option<&TenantId>,
        config: &BudgetConfig,
        estimated_cost: Option<f64>,
        now: DateTime<Utc>,
    ) -> Option<Breach> {
        for period in [BudgetPeriod::Daily, BudgetPeriod::Monthly] {
            if let Some(limit) = config.cost_limit(period) {
                let current = self
                    .query
                    .current_spend_at(BudgetScope::Global, period, None, tenant, now)
                    .await;
                if Self::cost_breached(limit, current, estimated_cost) {
                    return Some(Breach {
                        scope: BudgetScope::Global,
                        period,
                        dimension: BudgetDimension::Cost,
                        limit,
                        current,
                    });
                }
            }
        }

        for period in [BudgetPeriod::Daily, BudgetPeriod::Monthly] {
            if let Some(limit) = config.agent_cost_limit(period, agent) {
                let current = self
                    .query
                    .current_spend_at(BudgetScope::Agent, period, Some(agent), tenant, now)
                    .await;
                if Self::cost_breached(limit, current, estimated_cost) {
                    return Some(Breach {
                        scope: BudgetScope::Agent,
                        period,
                        dimension: BudgetDimension::Cost,
                        limit,
                        current,
                    });
                }
            }
        }

        for period in [BudgetPeriod::Daily, BudgetPeriod::Monthly] {
            if let Some(limit) = config.token_limit(period) {
                let current = self.query.current_tokens_at(period, tenant, now).await;
                if current >= limit {
                    return Some(Breach {
                        scope: BudgetScope::Global,
                        period,
                        dimension: BudgetDimension::Tokens,
                        limit: limit as f64,
                        current: current as f64,
                    });
                }
            }
        }

        for period in [BudgetPeriod::Daily, BudgetPeriod::Monthly] {
            if let Some(limit) = config.execution_limit(period) {
                let current = self.query.current_executions_at(period, tenant, now).await;
                if current >= limit {
                    return Some(Breach {
                        scope: BudgetScope::Global,
                        period,
                        dimension: BudgetDimension::Executions,
                        limit: limit as f64,
                        current: current as f64,
                    });
                }
            }
        }

        None
    }
}
