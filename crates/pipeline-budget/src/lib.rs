//! # Pipeline Budget
//!
//! Cost and usage accounting for the LLM agent pipeline:
//! - Per-tenant budget configuration with inheritance resolution
//! - Atomic spend/token/execution counters keyed by calendar period
//! - Read-side budget queries, status reports, and forecasting
//! - The pre-flight budget gate with soft/hard enforcement
//! - Soft/hard-cap alerting with per-day deduplication
//! - Model pricing for cost derivation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod alerts;
pub mod config;
pub mod forecast;
pub mod gate;
pub mod keys;
pub mod pricing;
pub mod query;
pub mod recorder;

// Re-export main types
pub use alerts::{AlertKind, AlertSink, BudgetAlert, LogAlertSink, RecordingAlertSink};
pub use config::BudgetConfig;
pub use forecast::{Forecaster, LinearForecaster, SpendForecast};
pub use gate::BudgetGate;
pub use pricing::{ModelPricing, PricingTable};
pub use query::{BudgetQuery, BudgetStatusReport, DimensionStatus, Remaining};
pub use recorder::SpendRecorder;
