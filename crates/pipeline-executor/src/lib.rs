//! # Pipeline Executor
//!
//! The ordered middleware chain wrapping every agent invocation:
//! resolve tenant, check budget, check cache, invoke the
//! reliability-wrapped provider, record spend and execution, write cache.
//!
//! Also home to agent registration (`AgentSpec`), execution records, and
//! the execution storage collaborator.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agent;
pub mod executor;
pub mod record;
pub mod recorder;
pub mod request;

// Re-export main types
pub use agent::{AgentSpec, AgentSpecBuilder};
pub use executor::{Executor, ExecutorBuilder};
pub use record::{
    ExecutionRecord, ExecutionStats, ExecutionStatus, ExecutionStorage, MemoryExecutionStorage,
};
pub use recorder::ExecutionRecorder;
pub use request::ExecutionRequest;
