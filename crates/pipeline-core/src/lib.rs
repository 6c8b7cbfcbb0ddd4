//! # Pipeline Core
//!
//! Core types, traits, and error handling for the LLM agent pipeline.
//!
//! This crate provides the foundational types used throughout the pipeline:
//! - Per-invocation execution context
//! - Tenant references and budget override snapshots
//! - Provider traits and abstractions
//! - Error types and handling
//! - Validated domain types (newtypes)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod context;
pub mod error;
pub mod provider;
pub mod response;
pub mod tenant;
pub mod types;

// Re-export commonly used types
pub use config::{EngineConfig, EngineConfigBuilder};
pub use context::ExecutionContext;
pub use error::{PipelineError, PipelineResult};
pub use provider::{ProviderClient, ProviderRequest, ProviderResponse, ResponseExtras};
pub use response::AgentOutput;
pub use tenant::{BudgetOverrides, TenantRef};
pub use types::{
    BudgetDimension, BudgetPeriod, BudgetScope, Enforcement, ExecutionKind, ModelId, RequestId,
    TenantId,
};
