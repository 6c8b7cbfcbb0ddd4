//! The ordered middleware chain.
//!
//! Stages run strictly in order, each able to short-circuit the rest:
//! resolve tenant, check budget, check cache, invoke through the
//! reliability engine, record spend and execution, write cache. The
//! pipeline always terminates with either an output or an error propagated
//! to the caller, never neither.

use crate::agent::AgentSpec;
use crate::record::{ExecutionStorage, MemoryExecutionStorage};
use crate::recorder::ExecutionRecorder;
use crate::request::ExecutionRequest;
use pipeline_budget::{
    AlertSink, BudgetGate, BudgetQuery, Forecaster, LogAlertSink, PricingTable, SpendRecorder,
};
use pipeline_cache::{Fingerprint, ResponseCache};
use pipeline_core::{
    AgentOutput, EngineConfig, ExecutionContext, PipelineError, PipelineResult, ProviderClient,
    ProviderRequest,
};
use pipeline_resilience::{CircuitBreakerRegistry, ReliabilityEngine};
use pipeline_store::{KeyValueStore, MemoryStore};
use std::sync::Arc;
use tracing::{debug, instrument};

/// The execution pipeline.
///
/// Construct once with [`Executor::builder`] and share across calls; every
/// invocation gets its own [`ExecutionContext`].
pub struct Executor {
    config: Arc<EngineConfig>,
    provider: Arc<dyn ProviderClient>,
    cache: Arc<ResponseCache>,
    gate: BudgetGate,
    spend: SpendRecorder,
    reliability: ReliabilityEngine,
    recorder: ExecutionRecorder,
    pricing: Arc<PricingTable>,
    query: Arc<BudgetQuery>,
}

impl Executor {
    /// Start building an executor.
    #[must_use]
    pub fn builder() -> ExecutorBuilder {
        ExecutorBuilder::default()
    }

    /// Run one invocation through the pipeline.
    ///
    /// # Errors
    /// Propagates budget rejections and terminal provider errors; the
    /// terminal error is always recorded before it is re-raised.
    #[instrument(skip_all, fields(agent = %agent.name))]
    pub async fn execute(
        &self,
        agent: &AgentSpec,
        request: ExecutionRequest,
    ) -> PipelineResult<AgentOutput> {
        // Stage 1: resolve tenant.
        let (tenant_id, inline_budgets) = request.tenant.resolve();
        let primary = request
            .model_override
            .unwrap_or_else(|| agent.model.clone());

        let mut ctx = ExecutionContext::new(
            &agent.name,
            &agent.version,
            agent.kind,
            primary.clone(),
            request.input,
        );
        ctx.tenant_id = tenant_id;
        ctx.skip_cache = request.skip_cache;
        ctx.streaming = request.stream;
        ctx.params = request.params;

        // Stage 2: budget check. Rejections propagate before any cost is
        // incurred.
        let budget = self
            .gate
            .check(
                &agent.name,
                ctx.tenant_id.as_ref(),
                inline_budgets.as_ref(),
                request.estimated_cost,
            )
            .await?;

        // Stage 3: cache lookup. Streaming responses are consumed
        // incrementally and are never cacheable.
        let fingerprint = if agent.cache.enabled && !ctx.skip_cache && !ctx.streaming {
            Some(Fingerprint::build(
                &self.config.namespace,
                &agent.name,
                &agent.version,
                &ctx.model,
                &ctx.params,
                &agent.cache,
                &ctx.input,
            ))
        } else {
            None
        };

        if let Some(ref fingerprint) = fingerprint {
            if let Some(output) = self.cache.lookup(fingerprint).await {
                debug!(agent = %agent.name, "served from cache");
                ctx.set_output(output)?;
                self.recorder.record_success(&ctx, true).await;
                return ctx.into_output();
            }
        }

        // Stage 4: invoke through the reliability engine.
        let provider_request = ProviderRequest {
            kind: agent.kind,
            input: ctx.input.clone(),
            params: ctx.params.clone(),
            stream: ctx.streaming,
        };
        let provider = Arc::clone(&self.provider);
        let outcome = self
            .reliability
            .invoke(
                &agent.reliability,
                &agent.name,
                &primary,
                &agent.fallback_models,
                |model| {
                    let provider = Arc::clone(&provider);
                    let request = provider_request.clone();
                    async move { provider.invoke(&model, &request).await }
                },
            )
            .await;

        match outcome {
            Ok(outcome) => {
                ctx.model = outcome.model;
                let response = outcome.value;

                // Two-phase accounting: tokens first, then cost derived
                // from them (unless the provider reported one).
                ctx.record_usage(response.input_tokens, response.output_tokens);
                let cost = response.cost.unwrap_or_else(|| {
                    self.pricing.cost_for(
                        &ctx.model,
                        response.input_tokens,
                        response.output_tokens,
                    )
                });
                ctx.record_cost(cost);

                let output = AgentOutput::from_response(response, ctx.model.clone(), cost);
                ctx.set_output(output)?;

                // Stage 5: record spend and execution.
                if self.config.budgets_enabled && budget.enabled {
                    self.spend
                        .record_spend(&agent.name, cost, ctx.tenant_id.as_ref(), &budget)
                        .await;
                    self.spend
                        .record_tokens(
                            &agent.name,
                            u64::from(ctx.total_tokens()),
                            ctx.tenant_id.as_ref(),
                            &budget,
                        )
                        .await;
                    self.spend
                        .record_execution(&agent.name, ctx.tenant_id.as_ref(), &budget)
                        .await;
                }
                self.recorder.record_success(&ctx, false).await;

                // Stage 6: cache write, successful results only.
                if let Some(ref fingerprint) = fingerprint {
                    if let Some(output) = ctx.output() {
                        self.cache.store(fingerprint, output, agent.cache.ttl).await;
                    }
                }

                ctx.into_output()
            }
            Err(error) => {
                // Record the failure, then re-raise: the caller always sees
                // the terminal error after accounting was attempted.
                let _ = ctx.set_error(error.to_string());
                self.recorder.record_failure(&ctx, &error).await;
                Err(error)
            }
        }
    }

    /// Read-side budget queries.
    #[must_use]
    pub fn budget_query(&self) -> &BudgetQuery {
        &self.query
    }

    /// Response cache statistics.
    #[must_use]
    pub fn cache_stats(&self) -> pipeline_cache::CacheStatsSnapshot {
        self.cache.stats()
    }

    /// Circuit breaker registry (stats, reset, manual intervention).
    #[must_use]
    pub fn breakers(&self) -> &CircuitBreakerRegistry {
        self.reliability.breakers()
    }

    /// The engine configuration.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

/// Builder wiring the executor's collaborators.
///
/// Only the provider is mandatory; the store defaults to in-memory, the
/// alert sink to structured logging, and execution storage to the bounded
/// in-memory history.
#[derive(Default)]
pub struct ExecutorBuilder {
    config: Option<EngineConfig>,
    store: Option<Arc<dyn KeyValueStore>>,
    provider: Option<Arc<dyn ProviderClient>>,
    storage: Option<Arc<dyn ExecutionStorage>>,
    alerts: Option<Arc<dyn AlertSink>>,
    forecaster: Option<Arc<dyn Forecaster>>,
    pricing: Option<PricingTable>,
}

impl ExecutorBuilder {
    /// Set the engine configuration.
    #[must_use]
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the shared key-value store.
    #[must_use]
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the provider client.
    #[must_use]
    pub fn provider(mut self, provider: Arc<dyn ProviderClient>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Set the execution history storage.
    #[must_use]
    pub fn storage(mut self, storage: Arc<dyn ExecutionStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    /// Set the budget alert sink.
    #[must_use]
    pub fn alerts(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = Some(alerts);
        self
    }

    /// Set the spend forecaster.
    #[must_use]
    pub fn forecaster(mut self, forecaster: Arc<dyn Forecaster>) -> Self {
        self.forecaster = Some(forecaster);
        self
    }

    /// Set the pricing table.
    #[must_use]
    pub fn pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = Some(pricing);
        self
    }

    /// Build the executor.
    ///
    /// # Errors
    /// Returns a validation error when no provider was supplied.
    pub fn build(self) -> PipelineResult<Executor> {
        let provider = self
            .provider
            .ok_or_else(|| PipelineError::validation("executor requires a provider client"))?;
        let config = Arc::new(self.config.unwrap_or_default());
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let storage = self
            .storage
            .unwrap_or_else(|| Arc::new(MemoryExecutionStorage::with_defaults()));
        let alerts = self
            .alerts
            .unwrap_or_else(|| Arc::new(LogAlertSink::new()));
        let pricing = Arc::new(self.pricing.unwrap_or_default());

        let query = Arc::new(match self.forecaster {
            Some(forecaster) => BudgetQuery::with_forecaster(
                Arc::clone(&store),
                config.namespace.clone(),
                forecaster,
            ),
            None => BudgetQuery::new(Arc::clone(&store), config.namespace.clone()),
        });
        let gate = BudgetGate::new(Arc::clone(&config), Arc::clone(&query));
        let spend = SpendRecorder::new(
            Arc::clone(&store),
            alerts,
            config.namespace.clone(),
            config.alert_dedup_ttl,
        );
        let cache = Arc::new(ResponseCache::new(Arc::clone(&store)));
        let recorder = ExecutionRecorder::new(storage);

        Ok(Executor {
            config,
            provider,
            cache,
            gate,
            spend,
            reliability: ReliabilityEngine::new(),
            recorder,
            pricing,
            query,
        })
    }
}
