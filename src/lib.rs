//! # LLM Agent Pipeline
//!
//! Middleware execution pipeline for LLM agents with cross-cutting
//! reliability, cost budgeting, caching, and multi-tenant accounting.
//!
//! This facade crate re-exports the public surface of the workspace
//! members:
//! - [`pipeline_core`]: context, tenant references, provider abstraction,
//!   errors
//! - [`pipeline_store`]: the shared key-value/counter store
//! - [`pipeline_resilience`]: retry, circuit breaker, fallback chains
//! - [`pipeline_budget`]: spend accounting, budget gate, alerting
//! - [`pipeline_cache`]: content-addressed response caching
//! - [`pipeline_executor`]: the ordered middleware chain
//!
//! ## Example
//!
//! ```no_run
//! use llm_agent_pipeline::{
//!     AgentSpec, EngineConfig, ExecutionRequest, Executor, ModelId, TenantRef,
//! };
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! # async fn run(provider: Arc<dyn llm_agent_pipeline::ProviderClient>) ->
//! #     Result<(), llm_agent_pipeline::PipelineError> {
//! let executor = Executor::builder()
//!     .config(EngineConfig::builder().namespace("my-app").build())
//!     .provider(provider)
//!     .build()?;
//!
//! let agent = AgentSpec::builder("summarizer", ModelId::new("gpt-4o")?).build()?;
//! let output = executor
//!     .execute(
//!         &agent,
//!         ExecutionRequest::new(json!({"text": "..."}))
//!             .with_tenant(TenantRef::by_id("acme")?),
//!     )
//!     .await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod logging;

pub use logging::{init_logging, LoggingConfig};

pub use pipeline_core::{
    AgentOutput, BudgetDimension, BudgetOverrides, BudgetPeriod, BudgetScope, Enforcement,
    EngineConfig, ExecutionContext, ExecutionKind, ModelId, PipelineError, PipelineResult,
    ProviderClient, ProviderRequest, ProviderResponse, RequestId, ResponseExtras, TenantId,
    TenantRef,
};

pub use pipeline_store::{Counter, KeyValueStore, MemoryStore};

pub use pipeline_resilience::{
    Backoff, CircuitBreaker, CircuitBreakerConfig, CircuitState, ReliabilityEngine,
    ReliabilityPolicy, RetryConfig, RetryStrategy,
};

pub use pipeline_budget::{
    AlertKind, AlertSink, BudgetAlert, BudgetConfig, BudgetGate, BudgetQuery, BudgetStatusReport,
    Forecaster, LinearForecaster, LogAlertSink, ModelPricing, PricingTable, Remaining,
    SpendForecast, SpendRecorder,
};

pub use pipeline_cache::{CachePolicy, Fingerprint, ResponseCache};

pub use pipeline_executor::{
    AgentSpec, ExecutionRecord, ExecutionRequest, ExecutionStats, ExecutionStatus,
    ExecutionStorage, Executor, MemoryExecutionStorage,
};
