//! Budget alert sink.
//!
//! Soft/hard-cap crossings are delivered to an [`AlertSink`] collaborator.
//! The default sink emits structured log warnings; deployments plug in
//! their own (webhooks, pagers) by implementing the trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline_core::{BudgetDimension, BudgetPeriod, BudgetScope, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// The kind of budget event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A limit was crossed under soft (or no) enforcement.
    SoftCap,
    /// A limit was crossed under hard enforcement.
    HardCap,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::SoftCap => "soft_cap",
            Self::HardCap => "hard_cap",
        };
        f.write_str(s)
    }
}

/// Payload delivered to the alert sink on a budget crossing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetAlert {
    /// Soft or hard cap.
    pub kind: AlertKind,
    /// Scope of the breached limit.
    pub scope: BudgetScope,
    /// Period of the breached limit.
    pub period: BudgetPeriod,
    /// Dimension of the breached limit.
    pub dimension: BudgetDimension,
    /// The configured limit.
    pub limit: f64,
    /// The counter total at the time of the breach.
    pub current: f64,
    /// Agent name for agent-scoped limits.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent: Option<String>,
    /// The tenant whose budget crossed, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant: Option<TenantId>,
    /// When the crossing was observed.
    pub timestamp: DateTime<Utc>,
}

/// Destination for budget alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Deliver an alert. Delivery is best-effort; implementations should
    /// not propagate failures into the calling pipeline.
    async fn notify(&self, alert: BudgetAlert);
}

/// Default sink: structured log warnings.
#[derive(Debug, Default)]
pub struct LogAlertSink;

impl LogAlertSink {
    /// Create the sink.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn notify(&self, alert: BudgetAlert) {
        warn!(
            kind = %alert.kind,
            scope = %alert.scope,
            period = %alert.period,
            dimension = %alert.dimension,
            limit = alert.limit,
            current = alert.current,
            agent = alert.agent.as_deref().unwrap_or("-"),
            tenant = alert.tenant.as_ref().map_or("-", TenantId::as_str),
            "budget limit crossed"
        );
    }
}

/// Sink that records every alert, for tests and assertions.
#[derive(Debug, Default)]
pub struct RecordingAlertSink {
    alerts: parking_lot::Mutex<Vec<BudgetAlert>>,
}

impl RecordingAlertSink {
    /// Create an empty recording sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of delivered alerts.
    #[must_use]
    pub fn alerts(&self) -> Vec<BudgetAlert> {
        self.alerts.lock().clone()
    }

    /// Number of delivered alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.lock().len()
    }

    /// Whether no alerts were delivered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.lock().is_empty()
    }
}

#[async_trait]
impl AlertSink for RecordingAlertSink {
    async fn notify(&self, alert: BudgetAlert) {
        self.alerts.lock().push(alert);
    }
}
