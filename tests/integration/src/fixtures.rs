//! Shared fixtures for integration tests.

use crate::mock_provider::ScriptedProvider;
use pipeline_budget::{AlertSink, PricingTable, RecordingAlertSink};
use pipeline_cache::CachePolicy;
use pipeline_core::{
    BudgetOverrides, Enforcement, EngineConfig, ModelId, ProviderClient, TenantRef,
};
use pipeline_executor::{
    AgentSpec, ExecutionStorage, Executor, MemoryExecutionStorage,
};
use pipeline_resilience::{ReliabilityPolicy, RetryConfig};
use std::sync::Arc;
use std::time::Duration;

/// Everything a test needs to drive the pipeline and observe its effects.
pub struct TestHarness {
    /// The pipeline under test.
    pub executor: Executor,
    /// The scripted provider behind it.
    pub provider: Arc<ScriptedProvider>,
    /// Execution history.
    pub storage: Arc<MemoryExecutionStorage>,
    /// Delivered budget alerts.
    pub alerts: Arc<RecordingAlertSink>,
}

impl TestHarness {
    /// Build a harness around a scripted provider and engine config.
    #[must_use]
    pub fn new(provider: ScriptedProvider, config: EngineConfig) -> Self {
        let provider = Arc::new(provider);
        let storage = Arc::new(MemoryExecutionStorage::with_defaults());
        let alerts = Arc::new(RecordingAlertSink::new());
        let executor = Executor::builder()
            .config(config)
            .provider(Arc::clone(&provider) as Arc<dyn ProviderClient>)
            .storage(Arc::clone(&storage) as Arc<dyn ExecutionStorage>)
            .alerts(Arc::clone(&alerts) as Arc<dyn AlertSink>)
            .pricing(PricingTable::new())
            .build()
            .expect("executor builds");
        Self {
            executor,
            provider,
            storage,
            alerts,
        }
    }

    /// Harness with default engine configuration.
    #[must_use]
    pub fn with_defaults(provider: ScriptedProvider) -> Self {
        Self::new(provider, EngineConfig::default())
    }
}

/// A model id, unwrapped.
#[must_use]
pub fn model(id: &str) -> ModelId {
    ModelId::new(id).expect("valid model id")
}

/// A tenant reference, unwrapped.
#[must_use]
pub fn tenant(id: &str) -> TenantRef {
    TenantRef::by_id(id).expect("valid tenant id")
}

/// A plain chat agent with no caching and default reliability.
#[must_use]
pub fn chat_agent(name: &str, primary: &str) -> AgentSpec {
    AgentSpec::builder(name, model(primary))
        .build()
        .expect("valid spec")
}

/// A chat agent with caching enabled.
#[must_use]
pub fn cached_agent(name: &str, primary: &str, ttl: Duration) -> AgentSpec {
    AgentSpec::builder(name, model(primary))
        .cache(CachePolicy::enabled(ttl))
        .build()
        .expect("valid spec")
}

/// A retry policy with millisecond delays so tests stay fast.
#[must_use]
pub fn fast_retry(max_retries: u32) -> ReliabilityPolicy {
    ReliabilityPolicy {
        retry: RetryConfig {
            max_retries,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// An engine config with one tenant under hard enforcement and a daily
/// cost limit.
#[must_use]
pub fn hard_budget_config(tenant_id: &str, daily_limit: f64) -> EngineConfig {
    EngineConfig::builder()
        .namespace("itest")
        .tenant_budget(
            tenant_id,
            BudgetOverrides {
                enforcement: Some(Enforcement::Hard),
                daily_limit: Some(daily_limit),
                ..Default::default()
            },
        )
        .build()
}
