//! Execution records and the history storage collaborator.
//!
//! One record is created per terminal call, success or failure, and never
//! mutated afterwards. Persistence lives behind the [`ExecutionStorage`]
//! trait; the bundled in-memory implementation serves tests and
//! single-process deployments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pipeline_core::{ExecutionKind, ModelId, PipelineResult, RequestId, TenantId};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;

/// Terminal status of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// In flight (only visible to storage backends that persist early).
    Running,
    /// Completed with an output.
    Success,
    /// Failed with an error.
    Error,
    /// Failed by exhausting a time budget.
    Timeout,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
            Self::Timeout => "timeout",
        };
        f.write_str(s)
    }
}

/// One execution's history entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Invocation id.
    pub id: RequestId,
    /// Agent type name.
    pub agent_type: String,
    /// Invocation modality.
    pub execution_kind: ExecutionKind,
    /// The model that served (or last attempted) the request.
    pub model: ModelId,
    /// Terminal status.
    pub status: ExecutionStatus,
    /// Tokens consumed by the prompt/input.
    pub input_tokens: u32,
    /// Tokens produced in the response.
    pub output_tokens: u32,
    /// Total cost in USD.
    pub total_cost: f64,
    /// Wall-clock duration in milliseconds.
    pub duration_ms: u64,
    /// When the invocation started.
    pub started_at: DateTime<Utc>,
    /// When the invocation completed.
    pub completed_at: DateTime<Utc>,
    /// The tenant, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<TenantId>,
    /// Error class for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_class: Option<String>,
    /// Error message for failures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Free-form metadata (cache hit flag and the like).
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub metadata: serde_json::Value,
}

/// Read-side aggregate over an agent's history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Total executions.
    pub total: u64,
    /// Successful executions.
    pub success_count: u64,
    /// Failed executions (errors and timeouts).
    pub error_count: u64,
    /// Sum of input tokens.
    pub total_input_tokens: u64,
    /// Sum of output tokens.
    pub total_output_tokens: u64,
    /// Sum of cost in USD.
    pub total_cost: f64,
    /// Average duration in milliseconds.
    pub avg_duration_ms: f64,
}

impl ExecutionStats {
    fn add(&mut self, record: &ExecutionRecord) {
        self.total += 1;
        match record.status {
            ExecutionStatus::Success => self.success_count += 1,
            ExecutionStatus::Error | ExecutionStatus::Timeout => self.error_count += 1,
            ExecutionStatus::Running => {}
        }
        self.total_input_tokens += u64::from(record.input_tokens);
        self.total_output_tokens += u64::from(record.output_tokens);
        self.total_cost += record.total_cost;
        self.avg_duration_ms = (self.avg_duration_ms * (self.total - 1) as f64
            + record.duration_ms as f64)
            / self.total as f64;
    }
}

/// The execution history collaborator.
#[async_trait]
pub trait ExecutionStorage: Send + Sync {
    /// Persist a record.
    ///
    /// # Errors
    /// Returns a storage error on failure; callers treat persistence as
    /// best-effort and must not propagate this into the user-facing call.
    async fn create(&self, record: ExecutionRecord) -> PipelineResult<()>;

    /// Aggregate stats for an agent type.
    ///
    /// # Errors
    /// Returns a storage error on failure.
    async fn stats_for(&self, agent_type: &str) -> PipelineResult<ExecutionStats>;
}

/// Bounded in-memory execution history.
pub struct MemoryExecutionStorage {
    records: RwLock<Vec<ExecutionRecord>>,
    max_records: usize,
}

impl MemoryExecutionStorage {
    /// Create storage retaining up to `max_records` entries.
    #[must_use]
    pub fn new(max_records: usize) -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            max_records,
        }
    }

    /// Create with the default retention (10k records).
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(10_000)
    }

    /// The most recent records, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<ExecutionRecord> {
        let records = self.records.read().await;
        records.iter().rev().take(limit).cloned().collect()
    }

    /// Number of retained records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether no records are retained.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for MemoryExecutionStorage {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[async_trait]
impl ExecutionStorage for MemoryExecutionStorage {
    async fn create(&self, record: ExecutionRecord) -> PipelineResult<()> {
        let mut records = self.records.write().await;
        if records.len() >= self.max_records {
            records.remove(0);
        }
        records.push(record);
        Ok(())
    }

    async fn stats_for(&self, agent_type: &str) -> PipelineResult<ExecutionStats> {
        let records = self.records.read().await;
        let mut stats = ExecutionStats::default();
        for record in records.iter().filter(|r| r.agent_type == agent_type) {
            stats.add(record);
        }
        Ok(stats)
    }
}
