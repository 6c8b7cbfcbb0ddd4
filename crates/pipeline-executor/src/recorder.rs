//! Builds execution records and hands them to storage.
//!
//! Storage failures are logged and swallowed: a failed history write must
//! never fail the user-facing call.

use crate::record::{ExecutionRecord, ExecutionStatus, ExecutionStorage};
use chrono::Utc;
use pipeline_core::{ExecutionContext, PipelineError};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

/// Builds and persists execution records.
pub struct ExecutionRecorder {
    storage: Arc<dyn ExecutionStorage>,
}

impl ExecutionRecorder {
    /// Create a recorder over the storage collaborator.
    #[must_use]
    pub fn new(storage: Arc<dyn ExecutionStorage>) -> Self {
        Self { storage }
    }

    /// Persist a success record for a completed context.
    pub async fn record_success(&self, ctx: &ExecutionContext, cache_hit: bool) {
        let record = ExecutionRecord {
            id: ctx.request_id.clone(),
            agent_type: ctx.agent_name.clone(),
            execution_kind: ctx.kind,
            model: ctx.model.clone(),
            status: ExecutionStatus::Success,
            input_tokens: ctx.input_tokens,
            output_tokens: ctx.output_tokens,
            total_cost: ctx.total_cost,
            duration_ms: ctx.duration_ms(),
            started_at: ctx.started_at,
            completed_at: Utc::now(),
            tenant_id: ctx.tenant_id.clone(),
            error_class: None,
            error_message: None,
            metadata: if cache_hit {
                json!({ "cache_hit": true })
            } else {
                serde_json::Value::Null
            },
        };
        self.persist(record).await;
    }

    /// Persist a failure record for a completed context.
    pub async fn record_failure(&self, ctx: &ExecutionContext, error: &PipelineError) {
        let status = match error {
            PipelineError::Timeout { .. } => ExecutionStatus::Timeout,
            _ => ExecutionStatus::Error,
        };
        let record = ExecutionRecord {
            id: ctx.request_id.clone(),
            agent_type: ctx.agent_name.clone(),
            execution_kind: ctx.kind,
            model: ctx.model.clone(),
            status,
            input_tokens: ctx.input_tokens,
            output_tokens: ctx.output_tokens,
            total_cost: ctx.total_cost,
            duration_ms: ctx.duration_ms(),
            started_at: ctx.started_at,
            completed_at: Utc::now(),
            tenant_id: ctx.tenant_id.clone(),
            error_class: Some(error.class_name().to_string()),
            error_message: Some(error.to_string()),
            metadata: serde_json::Value::Null,
        };
        self.persist(record).await;
    }

    async fn persist(&self, record: ExecutionRecord) {
        let agent = record.agent_type.clone();
        if let Err(error) = self.storage.create(record).await {
            warn!(agent, %error, "execution record write failed");
        }
    }
}
