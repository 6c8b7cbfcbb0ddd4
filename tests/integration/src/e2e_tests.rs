//! End-to-end flows combining budgets, caching, records, and reporting.

use crate::fixtures::*;
use crate::mock_provider::{ModelScript, ScriptedProvider};
use pipeline_core::{
    BudgetOverrides, Enforcement, EngineConfig, PipelineError, TenantId, TenantRef,
};
use pipeline_executor::{ExecutionRequest, ExecutionStatus, ExecutionStorage};
use serde_json::json;

fn acme() -> TenantId {
    TenantId::new("acme").expect("valid tenant")
}

/// A full journey: two agents, spend accumulation, execution history, and
/// a status report that reflects both.
#[tokio::test]
async fn full_journey_records_and_reports() {
    let config = EngineConfig::builder()
        .namespace("e2e")
        .tenant_budget(
            "acme",
            BudgetOverrides {
                enforcement: Some(Enforcement::Soft),
                daily_limit: Some(100.0),
                monthly_limit: Some(1000.0),
                ..Default::default()
            },
        )
        .build();
    let provider = ScriptedProvider::new()
        .with_script("gpt-4o", ModelScript::ok_with_cost("summary", 2.5))
        .with_script("dall-e-3", ModelScript::ok_with_cost("image-url", 7.5));
    let harness = TestHarness::new(provider, config);

    let summarizer = chat_agent("summarizer", "gpt-4o");
    let illustrator = chat_agent("illustrator", "dall-e-3");

    harness
        .executor
        .execute(
            &summarizer,
            ExecutionRequest::new(json!("doc")).with_tenant(tenant("acme")),
        )
        .await
        .expect("summarizer succeeds");
    harness
        .executor
        .execute(
            &illustrator,
            ExecutionRequest::new(json!("a lighthouse")).with_tenant(tenant("acme")),
        )
        .await
        .expect("illustrator succeeds");

    // Spend accumulated across both agents.
    let t = acme();
    let gate_config = pipeline_budget::BudgetConfig {
        daily_limit: Some(100.0),
        monthly_limit: Some(1000.0),
        ..Default::default()
    };
    let report = harness
        .executor
        .budget_query()
        .status(None, Some(&t), &gate_config)
        .await;

    let daily = report.global_daily.expect("daily limit configured");
    assert!((daily.current - 10.0).abs() < 1e-9);
    assert!((daily.remaining - 90.0).abs() < 1e-9);
    assert!((daily.percent_used - 10.0).abs() < 1e-9);
    assert!(report.global_monthly.is_some());
    assert!(report.tokens_daily.is_none(), "no token limit configured");
    assert!(report.forecast.projected_month_end >= 10.0);

    // Execution history sees one record per agent.
    let stats = harness
        .storage
        .stats_for("summarizer")
        .await
        .expect("stats");
    assert_eq!(stats.total, 1);
    assert_eq!(stats.success_count, 1);
    assert!((stats.total_cost - 2.5).abs() < 1e-9);

    let stats = harness
        .storage
        .stats_for("illustrator")
        .await
        .expect("stats");
    assert_eq!(stats.total, 1);
}

/// Dynamic tenant shapes resolve at pipeline entry; unsupported shapes
/// fail closed before anything else happens.
#[tokio::test]
async fn tenant_shapes_from_json() {
    let provider = ScriptedProvider::new();
    let harness = TestHarness::with_defaults(provider);
    let agent = chat_agent("summarizer", "gpt-4o");

    // String shape.
    let by_string = TenantRef::from_value(&json!("acme")).expect("string shape");
    harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("doc")).with_tenant(by_string),
        )
        .await
        .expect("string tenant works");

    // Object shape with inline budgets.
    let by_object = TenantRef::from_value(&json!({
        "id": "acme",
        "budgets": { "enforcement": "hard", "daily_limit": 0.0 }
    }))
    .expect("object shape");
    let result = harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("doc")).with_tenant(by_object),
        )
        .await;
    assert!(
        matches!(result, Err(PipelineError::BudgetExceeded { .. })),
        "inline zero limit gates immediately"
    );

    // Unsupported shape fails closed at parse time.
    assert!(matches!(
        TenantRef::from_value(&json!(42)),
        Err(PipelineError::Validation { .. })
    ));
}

/// Failure records carry the error taxonomy; success records follow after
/// recovery.
#[tokio::test]
async fn history_tracks_failures_and_recovery() {
    let provider = ScriptedProvider::new().with_script("gpt-4o", ModelScript::BadRequest);
    let harness = TestHarness::with_defaults(provider);
    let mut agent = chat_agent("summarizer", "gpt-4o");
    agent.reliability = fast_retry(0);

    let failed = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await;
    assert!(failed.is_err());

    harness
        .provider
        .set_script("gpt-4o", ModelScript::ok("fine now"));
    harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("recovered");

    let records = harness.storage.recent(2).await;
    assert_eq!(records[0].status, ExecutionStatus::Success);
    assert_eq!(records[1].status, ExecutionStatus::Error);
    assert_eq!(records[1].error_class.as_deref(), Some("ProviderError"));
    assert!(records[1]
        .error_message
        .as_deref()
        .unwrap_or("")
        .contains("bad request"));

    let stats = harness
        .storage
        .stats_for("summarizer")
        .await
        .expect("stats");
    assert_eq!(stats.total, 2);
    assert_eq!(stats.success_count, 1);
    assert_eq!(stats.error_count, 1);
}

/// Anonymous calls account against the global bucket and still work end
/// to end.
#[tokio::test]
async fn anonymous_calls_use_global_bucket() {
    let provider = ScriptedProvider::new()
        .with_script("gpt-4o", ModelScript::ok_with_cost("x", 1.5));
    let harness = TestHarness::with_defaults(provider);
    let agent = chat_agent("summarizer", "gpt-4o");

    harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("anonymous call succeeds");

    let spend = harness
        .executor
        .budget_query()
        .current_spend(
            pipeline_core::BudgetScope::Global,
            pipeline_core::BudgetPeriod::Daily,
            None,
            None,
        )
        .await;
    assert!((spend - 1.5).abs() < 1e-9);
}
