//! Counter and marker key construction.
//!
//! Keys embed the calendar date (daily) or year-month (monthly), so period
//! rollover is automatic: a new period produces a new key that reads as
//! zero, and the old key ages out via its TTL. No reset logic exists
//! anywhere.

use crate::alerts::AlertKind;
use chrono::{DateTime, Utc};
use pipeline_core::{BudgetPeriod, BudgetScope, TenantId};

/// The tenant component of a key: `tenant:<id>` or `global`.
#[must_use]
pub fn tenant_part(tenant: Option<&TenantId>) -> String {
    match tenant {
        Some(id) => format!("tenant:{id}"),
        None => "global".to_string(),
    }
}

/// Key for a cost counter.
///
/// Global scope: `{ns}:budget:{tenant_part}:{date}`.
/// Agent scope: `{ns}:budget:{tenant_part}:agent:{name}:{date}`.
#[must_use]
pub fn spend_key(
    namespace: &str,
    scope: BudgetScope,
    period: BudgetPeriod,
    agent: Option<&str>,
    tenant: Option<&TenantId>,
    now: DateTime<Utc>,
) -> String {
    let tenant = tenant_part(tenant);
    let date = period.date_part(now);
    match (scope, agent) {
        (BudgetScope::Agent, Some(agent)) => {
            format!("{namespace}:budget:{tenant}:agent:{agent}:{date}")
        }
        _ => format!("{namespace}:budget:{tenant}:{date}"),
    }
}

/// Key for a token counter. Tokens are only tracked tenant-wide.
#[must_use]
pub fn token_key(
    namespace: &str,
    period: BudgetPeriod,
    tenant: Option<&TenantId>,
    now: DateTime<Utc>,
) -> String {
    format!(
        "{namespace}:tokens:{}:{}",
        tenant_part(tenant),
        period.date_part(now)
    )
}

/// Key for an execution counter. Executions are only tracked tenant-wide.
#[must_use]
pub fn execution_key(
    namespace: &str,
    period: BudgetPeriod,
    tenant: Option<&TenantId>,
    now: DateTime<Utc>,
) -> String {
    format!(
        "{namespace}:executions:{}:{}",
        tenant_part(tenant),
        period.date_part(now)
    )
}

/// Key for the alert deduplication marker, scoped to
/// (kind, scope, tenant, calendar day).
#[must_use]
pub fn alert_marker_key(
    namespace: &str,
    kind: AlertKind,
    scope: BudgetScope,
    agent: Option<&str>,
    tenant: Option<&TenantId>,
    now: DateTime<Utc>,
) -> String {
    let tenant = tenant_part(tenant);
    let day = BudgetPeriod::Daily.date_part(now);
    match (scope, agent) {
        (BudgetScope::Agent, Some(agent)) => {
            format!("{namespace}:budget_alert:{kind}:{scope}:agent:{agent}:{tenant}:{day}")
        }
        _ => format!("{namespace}:budget_alert:{kind}:{scope}:{tenant}:{day}"),
    }
}
