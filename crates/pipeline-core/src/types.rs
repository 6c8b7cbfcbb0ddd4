//! Validated domain types (newtypes) and shared vocabulary.
//!
//! This module defines the identifier newtypes used across the pipeline and
//! the budget vocabulary (scope, period, dimension, enforcement) shared by
//! the accounting and error-handling layers.

use crate::error::PipelineError;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Tenant identifier.
///
/// Guaranteed non-empty and trimmed of surrounding whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a new tenant id.
    ///
    /// # Errors
    /// Returns a validation error if the id is empty or whitespace-only.
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::validation("tenant id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Model identifier (e.g., "gpt-4o", "claude-3-opus").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    /// Create a new model id.
    ///
    /// # Errors
    /// Returns a validation error if the id is empty.
    pub fn new(id: impl Into<String>) -> Result<Self, PipelineError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(PipelineError::validation("model id must not be empty"));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Get the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique per-invocation request identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(String);

impl RequestId {
    /// Generate a fresh random request id.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The modality of an agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// Chat / text completion.
    Chat,
    /// Image generation.
    Image,
    /// Audio synthesis (text to speech).
    Audio,
    /// Audio transcription (speech to text).
    Transcription,
}

impl fmt::Display for ExecutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Chat => "chat",
            Self::Image => "image",
            Self::Audio => "audio",
            Self::Transcription => "transcription",
        };
        f.write_str(s)
    }
}

/// Budget scope: tenant-wide or per agent type within a tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    /// Tenant-wide counters and limits.
    Global,
    /// Per-agent-type counters and limits.
    Agent,
}

impl fmt::Display for BudgetScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Global => "global",
            Self::Agent => "agent",
        };
        f.write_str(s)
    }
}

/// Budget accounting window, keyed by calendar date or month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetPeriod {
    /// Calendar-day window.
    Daily,
    /// Calendar-month window.
    Monthly,
}

impl BudgetPeriod {
    /// The calendar component of a counter key for this period.
    ///
    /// Daily periods use the ISO date (`2026-08-05`); monthly periods use
    /// `YYYY-MM` (`2026-08`). A new period produces a new key, so counters
    /// roll over without explicit reset logic.
    #[must_use]
    pub fn date_part(&self, now: DateTime<Utc>) -> String {
        match self {
            Self::Daily => now.format("%Y-%m-%d").to_string(),
            Self::Monthly => format!("{:04}-{:02}", now.year(), now.month()),
        }
    }

    /// The store TTL for counters in this period.
    #[must_use]
    pub fn ttl(&self) -> Duration {
        match self {
            Self::Daily => Duration::from_secs(24 * 60 * 60),
            Self::Monthly => Duration::from_secs(31 * 24 * 60 * 60),
        }
    }
}

impl fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Daily => "daily",
            Self::Monthly => "monthly",
        };
        f.write_str(s)
    }
}

/// The dimension a budget limit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetDimension {
    /// Cost in USD.
    Cost,
    /// Token counts.
    Tokens,
    /// Execution counts.
    Executions,
}

impl fmt::Display for BudgetDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Cost => "cost",
            Self::Tokens => "tokens",
            Self::Executions => "executions",
        };
        f.write_str(s)
    }
}

/// Budget enforcement mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Enforcement {
    /// No budget checks.
    None,
    /// Alert on breach but allow the call through.
    Soft,
    /// Reject calls once a limit is breached.
    Hard,
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Soft => "soft",
            Self::Hard => "hard",
        };
        f.write_str(s)
    }
}
