//! Tenant references and raw budget override snapshots.
//!
//! Callers hand the pipeline a tenant in one of three shapes: a bare id, an
//! id with an inline budget override, or nothing (anonymous). The shapes are
//! modeled as an explicit sum type resolved once at pipeline entry; any
//! other shape fails closed with a validation error.

use crate::error::{PipelineError, PipelineResult};
use crate::types::{Enforcement, TenantId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw, unresolved budget limits attached to a tenant record or supplied
/// inline with a call.
///
/// Every field is optional: `None` means "inherit" during resolution, and a
/// dimension that stays unset after resolution means "unlimited", never
/// zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetOverrides {
    /// Whether budget tracking is enabled for this tenant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,

    /// Enforcement mode override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforcement: Option<Enforcement>,

    /// Tenant-wide daily cost limit (USD).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_limit: Option<f64>,

    /// Tenant-wide monthly cost limit (USD).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_limit: Option<f64>,

    /// Per-agent daily cost limits (USD), keyed by agent name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_daily_limits: Option<HashMap<String, f64>>,

    /// Per-agent monthly cost limits (USD), keyed by agent name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_monthly_limits: Option<HashMap<String, f64>>,

    /// Tenant-wide daily token limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_token_limit: Option<u64>,

    /// Tenant-wide monthly token limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_token_limit: Option<u64>,

    /// Tenant-wide daily execution-count limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daily_execution_limit: Option<u64>,

    /// Tenant-wide monthly execution-count limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_execution_limit: Option<u64>,

    /// Whether unset fields inherit from the engine defaults. Defaults to
    /// true when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inherit_defaults: Option<bool>,
}

impl BudgetOverrides {
    /// Whether unset fields should fall back to the engine defaults.
    #[must_use]
    pub fn inherits(&self) -> bool {
        self.inherit_defaults.unwrap_or(true)
    }
}

/// The tenant attached to a single invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum TenantRef {
    /// No tenant; accounting uses the global bucket.
    Anonymous,
    /// A tenant identified by id; budgets come from the tenant record and
    /// engine defaults.
    Id(TenantId),
    /// A tenant id with an inline budget override taking precedence over
    /// the stored record for this call.
    Inline {
        /// The tenant id.
        id: TenantId,
        /// The inline override.
        budgets: BudgetOverrides,
    },
}

impl TenantRef {
    /// Convenience constructor from a raw id string.
    ///
    /// # Errors
    /// Returns a validation error for empty ids.
    pub fn by_id(id: impl Into<String>) -> PipelineResult<Self> {
        Ok(Self::Id(TenantId::new(id)?))
    }

    /// Parse a tenant reference from a dynamic JSON value.
    ///
    /// Accepted shapes: `null` (anonymous), a string id, or an object with
    /// an `"id"` field and an optional `"budgets"` override object. Any
    /// other shape fails closed.
    ///
    /// # Errors
    /// Returns a validation error for unsupported shapes.
    pub fn from_value(value: &serde_json::Value) -> PipelineResult<Self> {
        match value {
            serde_json::Value::Null => Ok(Self::Anonymous),
            serde_json::Value::String(id) => Ok(Self::Id(TenantId::new(id.clone())?)),
            serde_json::Value::Object(map) => {
                let id = map
                    .get("id")
                    .and_then(serde_json::Value::as_str)
                    .ok_or_else(|| {
                        PipelineError::validation("tenant object requires a string \"id\" field")
                    })?;
                let id = TenantId::new(id)?;
                match map.get("budgets") {
                    None => Ok(Self::Id(id)),
                    Some(raw) => {
                        let budgets: BudgetOverrides = serde_json::from_value(raw.clone())
                            .map_err(|e| {
                                PipelineError::validation(format!(
                                    "invalid tenant budget override: {e}"
                                ))
                            })?;
                        Ok(Self::Inline { id, budgets })
                    }
                }
            }
            other => Err(PipelineError::validation(format!(
                "unsupported tenant shape: {}",
                json_type_name(other)
            ))),
        }
    }

    /// Split the reference into its tenant id and inline override, if any.
    #[must_use]
    pub fn resolve(self) -> (Option<TenantId>, Option<BudgetOverrides>) {
        match self {
            Self::Anonymous => (None, None),
            Self::Id(id) => (Some(id), None),
            Self::Inline { id, budgets } => (Some(id), Some(budgets)),
        }
    }

    /// The tenant id without consuming the reference.
    #[must_use]
    pub fn tenant_id(&self) -> Option<&TenantId> {
        match self {
            Self::Anonymous => None,
            Self::Id(id) | Self::Inline { id, .. } => Some(id),
        }
    }
}

impl Default for TenantRef {
    fn default() -> Self {
        Self::Anonymous
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
