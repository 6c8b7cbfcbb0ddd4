//! Budget enforcement through the full pipeline.

use crate::fixtures::*;
use crate::mock_provider::{ModelScript, ScriptedProvider};
use chrono::{TimeZone, Utc};
use pipeline_budget::{AlertSink, BudgetConfig, BudgetQuery, RecordingAlertSink, SpendRecorder};
use pipeline_core::{BudgetPeriod, BudgetScope, PipelineError, TenantId};
use pipeline_executor::ExecutionRequest;
use pipeline_store::{KeyValueStore, MemoryStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn acme() -> TenantId {
    TenantId::new("acme").expect("valid tenant")
}

/// Scenario A: hard daily limit of $10, zero prior spend. A $4 call
/// succeeds; a $7 call is rejected pre-flight and spend stays at $4.
#[tokio::test]
async fn scenario_a_hard_budget_gate() {
    let provider = ScriptedProvider::new()
        .with_script("gpt-4o", ModelScript::ok_with_cost("first", 4.0));
    let harness = TestHarness::new(provider, hard_budget_config("acme", 10.0));
    let agent = chat_agent("summarizer", "gpt-4o");

    // First call: $4, succeeds.
    harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("doc one"))
                .with_tenant(tenant("acme"))
                .with_estimated_cost(4.0),
        )
        .await
        .expect("first call succeeds");

    let t = acme();
    let spend = harness
        .executor
        .budget_query()
        .current_spend(BudgetScope::Global, BudgetPeriod::Daily, None, Some(&t))
        .await;
    assert!((spend - 4.0).abs() < 1e-9);

    // Second call: $7 against $6 remaining, rejected before any provider
    // invocation.
    let calls_before = harness.provider.total_calls();
    let result = harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("doc two"))
                .with_tenant(tenant("acme"))
                .with_estimated_cost(7.0),
        )
        .await;

    assert!(matches!(result, Err(PipelineError::BudgetExceeded { .. })));
    assert_eq!(
        harness.provider.total_calls(),
        calls_before,
        "no provider invocation for the rejected call"
    );

    // Spend not incremented by the rejection.
    let spend = harness
        .executor
        .budget_query()
        .current_spend(BudgetScope::Global, BudgetPeriod::Daily, None, Some(&t))
        .await;
    assert!((spend - 4.0).abs() < 1e-9);
}

/// P1: spend recorded on one calendar day is invisible to the next day's
/// daily counter.
#[tokio::test]
async fn p1_period_rollover() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingAlertSink::new());
    let recorder = SpendRecorder::new(
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        sink as Arc<dyn AlertSink>,
        "itest",
        Duration::from_secs(3600),
    );
    let query = BudgetQuery::new(Arc::clone(&store) as Arc<dyn KeyValueStore>, "itest");
    let t = acme();

    let d1 = Utc.with_ymd_and_hms(2026, 8, 5, 22, 0, 0).unwrap();
    let d2 = Utc.with_ymd_and_hms(2026, 8, 6, 2, 0, 0).unwrap();

    recorder
        .record_spend_at("summarizer", 8.0, Some(&t), &BudgetConfig::default(), d1)
        .await;

    let as_of_d1 = query
        .current_spend_at(BudgetScope::Global, BudgetPeriod::Daily, None, Some(&t), d1)
        .await;
    let as_of_d2 = query
        .current_spend_at(BudgetScope::Global, BudgetPeriod::Daily, None, Some(&t), d2)
        .await;

    assert!((as_of_d1 - 8.0).abs() < 1e-9);
    assert!(as_of_d2.abs() < f64::EPSILON, "new day, fresh counter");
}

/// P2: remaining budget clamps at zero no matter how far spend overshoots.
#[tokio::test]
async fn p2_remaining_never_negative() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingAlertSink::new());
    let recorder = SpendRecorder::new(
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        sink as Arc<dyn AlertSink>,
        "itest",
        Duration::from_secs(3600),
    );
    let query = BudgetQuery::new(Arc::clone(&store) as Arc<dyn KeyValueStore>, "itest");
    let config = BudgetConfig {
        daily_limit: Some(1.0),
        ..Default::default()
    };

    recorder
        .record_spend("summarizer", 1000.0, None, &config)
        .await;

    let remaining = query
        .remaining_budget(BudgetScope::Global, BudgetPeriod::Daily, None, None, &config)
        .await;
    assert_eq!(remaining, pipeline_budget::Remaining::Amount(0.0));
}

/// P3: an unconfigured dimension is unlimited and never gates a call.
#[tokio::test]
async fn p3_no_limit_is_unlimited() {
    let provider = ScriptedProvider::new()
        .with_script("gpt-4o", ModelScript::ok_with_cost("pricey", 10_000.0));
    let harness = TestHarness::with_defaults(provider);
    let agent = chat_agent("summarizer", "gpt-4o");

    // No limits configured anywhere: absurdly expensive calls still pass.
    for _ in 0..3 {
        harness
            .executor
            .execute(
                &agent,
                ExecutionRequest::new(json!("doc")).with_tenant(tenant("acme")),
            )
            .await
            .expect("unlimited tenant is never gated");
    }

    let t = acme();
    let remaining = harness
        .executor
        .budget_query()
        .remaining_budget(
            BudgetScope::Global,
            BudgetPeriod::Daily,
            None,
            Some(&t),
            &BudgetConfig::default(),
        )
        .await;
    assert_eq!(remaining, pipeline_budget::Remaining::Unlimited);
}

/// P4: concurrent breaches of the same (scope, tenant, day) produce
/// exactly one alert.
#[tokio::test]
async fn p4_at_most_one_alert() {
    let store = Arc::new(MemoryStore::new());
    let sink = Arc::new(RecordingAlertSink::new());
    let recorder = Arc::new(SpendRecorder::new(
        Arc::clone(&store) as Arc<dyn KeyValueStore>,
        Arc::clone(&sink) as Arc<dyn AlertSink>,
        "itest",
        Duration::from_secs(3600),
    ));
    let config = Arc::new(BudgetConfig {
        daily_limit: Some(1.0),
        ..Default::default()
    });
    let now = Utc.with_ymd_and_hms(2026, 8, 5, 12, 0, 0).unwrap();

    let mut handles = Vec::new();
    for _ in 0..16 {
        let recorder = Arc::clone(&recorder);
        let config = Arc::clone(&config);
        handles.push(tokio::spawn(async move {
            recorder
                .record_spend_at("summarizer", 2.0, None, &config, now)
                .await;
        }));
    }
    for handle in handles {
        handle.await.expect("task joins");
    }

    assert_eq!(sink.len(), 1, "exactly one alert for N concurrent breaches");
}

/// Soft enforcement alerts but never rejects.
#[tokio::test]
async fn soft_enforcement_allows_over_budget_calls() {
    let config = pipeline_core::EngineConfig::builder()
        .namespace("itest")
        .tenant_budget(
            "acme",
            pipeline_core::BudgetOverrides {
                enforcement: Some(pipeline_core::Enforcement::Soft),
                daily_limit: Some(1.0),
                ..Default::default()
            },
        )
        .build();
    let provider = ScriptedProvider::new()
        .with_script("gpt-4o", ModelScript::ok_with_cost("x", 5.0));
    let harness = TestHarness::new(provider, config);
    let agent = chat_agent("summarizer", "gpt-4o");

    for _ in 0..3 {
        harness
            .executor
            .execute(
                &agent,
                ExecutionRequest::new(json!("doc")).with_tenant(tenant("acme")),
            )
            .await
            .expect("soft enforcement never rejects");
    }

    assert_eq!(harness.provider.total_calls(), 3);
    assert_eq!(harness.alerts.len(), 1, "breach alert deduplicated");
    assert_eq!(
        harness.alerts.alerts()[0].kind,
        pipeline_budget::AlertKind::SoftCap
    );
}

/// Tenants account independently: one tenant's breach never gates another.
#[tokio::test]
async fn tenant_isolation() {
    let provider = ScriptedProvider::new()
        .with_script("gpt-4o", ModelScript::ok_with_cost("x", 11.0));
    let harness = TestHarness::new(provider, hard_budget_config("acme", 10.0));
    let agent = chat_agent("summarizer", "gpt-4o");

    // Exhaust acme's budget.
    harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("doc")).with_tenant(tenant("acme")),
        )
        .await
        .expect("first call passes");
    let blocked = harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("doc")).with_tenant(tenant("acme")),
        )
        .await;
    assert!(matches!(blocked, Err(PipelineError::BudgetExceeded { .. })));

    // Another tenant (no record, engine defaults, no limits) sails through.
    harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("doc")).with_tenant(tenant("globex")),
        )
        .await
        .expect("other tenant unaffected");
}
