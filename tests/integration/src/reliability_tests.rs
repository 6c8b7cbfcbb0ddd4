//! Retry, fallback, and circuit breaker orchestration.

use crate::fixtures::*;
use crate::mock_provider::{ModelScript, ScriptedProvider};
use pipeline_core::{PipelineError, ModelId};
use pipeline_executor::{AgentSpec, ExecutionRequest};
use pipeline_resilience::{
    Backoff, CircuitBreakerConfig, RetryConfig, RetryStrategy,
};
use serde_json::json;
use std::time::Duration;

/// Scenario C: primary rate-limits on every attempt (maxRetries=2),
/// fallback succeeds first try. 3 attempts against primary, 1 against
/// fallback, result from the fallback.
#[tokio::test]
async fn scenario_c_retry_then_fallback() {
    let provider = ScriptedProvider::new()
        .with_script("gpt-x", ModelScript::RateLimit)
        .with_script("gpt-y", ModelScript::ok("from fallback"));
    let harness = TestHarness::with_defaults(provider);
    let agent = AgentSpec::builder("summarizer", model("gpt-x"))
        .fallback(model("gpt-y"))
        .reliability(fast_retry(2))
        .build()
        .expect("valid spec");

    let output = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("fallback serves the request");

    assert_eq!(output.model, ModelId::new("gpt-y").expect("valid model"));
    assert_eq!(output.content, json!("from fallback"));
    assert_eq!(harness.provider.calls_for("gpt-x"), 3, "1 initial + 2 retries");
    assert_eq!(harness.provider.calls_for("gpt-y"), 1);
}

/// P7: exponential backoff with base 0.4s and cap 3.0s stays within
/// `[base*2^n, 1.5*min(base*2^n, 3.0)]`.
#[test]
fn p7_backoff_bounds() {
    let strategy = RetryStrategy::new(RetryConfig {
        backoff: Backoff::Exponential,
        base_delay: Duration::from_millis(400),
        max_delay: Duration::from_secs(3),
        ..Default::default()
    });

    for attempt in 0..4 {
        let expected = (0.4 * 2f64.powi(attempt as i32)).min(3.0);
        for _ in 0..100 {
            let delay = strategy.delay_for(attempt).as_secs_f64();
            assert!(delay >= expected - 1e-9, "attempt {attempt}: {delay} too low");
            assert!(
                delay <= expected * 1.5 + 1e-9,
                "attempt {attempt}: {delay} too high"
            );
        }
    }
}

/// P8: non-retryable primary, failing first fallback, succeeding second;
/// strict try-list order, primary never revisited.
#[tokio::test]
async fn p8_fallback_order() {
    let provider = ScriptedProvider::new()
        .with_script("primary", ModelScript::BadRequest)
        .with_script("fb-1", ModelScript::BadRequest)
        .with_script("fb-2", ModelScript::ok("third time lucky"));
    let harness = TestHarness::with_defaults(provider);
    let agent = AgentSpec::builder("summarizer", model("primary"))
        .fallbacks(vec![model("fb-1"), model("fb-2")])
        .reliability(fast_retry(3))
        .build()
        .expect("valid spec");

    let output = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("second fallback serves");

    assert_eq!(output.model, model("fb-2"));
    // Non-retryable: exactly one attempt each, no primary retries after
    // moving on.
    assert_eq!(harness.provider.calls_for("primary"), 1);
    assert_eq!(harness.provider.calls_for("fb-1"), 1);
    assert_eq!(harness.provider.calls_for("fb-2"), 1);
}

/// P9: breaker opens after the threshold, short-circuits during cooldown,
/// then admits exactly one half-open trial.
#[tokio::test]
async fn p9_circuit_breaker_lifecycle() {
    let provider = ScriptedProvider::new().with_script("gpt-x", ModelScript::ServerError);
    let harness = TestHarness::with_defaults(provider);
    let mut reliability = fast_retry(0);
    reliability.circuit_breaker = Some(CircuitBreakerConfig {
        failure_threshold: 2,
        window: Duration::from_secs(60),
        cooldown: Duration::from_millis(50),
    });
    let agent = AgentSpec::builder("summarizer", model("gpt-x"))
        .reliability(reliability)
        .build()
        .expect("valid spec");

    // Two failing calls trip the breaker.
    for _ in 0..2 {
        let result = harness
            .executor
            .execute(&agent, ExecutionRequest::new(json!("doc")))
            .await;
        assert!(result.is_err());
    }
    assert_eq!(harness.provider.calls_for("gpt-x"), 2);

    // Open: the next call is short-circuited without reaching the
    // provider.
    let result = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await;
    assert!(matches!(result, Err(PipelineError::CircuitOpen { .. })));
    assert_eq!(harness.provider.calls_for("gpt-x"), 2, "no request made");

    // After the cooldown the half-open trial reaches a recovered
    // provider and closes the breaker.
    tokio::time::sleep(Duration::from_millis(80)).await;
    harness
        .provider
        .set_script("gpt-x", ModelScript::ok("recovered"));

    let output = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("trial succeeds");
    assert_eq!(output.content, json!("recovered"));
    assert_eq!(harness.provider.calls_for("gpt-x"), 3);

    // Closed again: subsequent calls flow normally.
    harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("circuit closed");
    assert_eq!(harness.provider.calls_for("gpt-x"), 4);
}

/// A flaky model that recovers within the retry budget never falls back.
#[tokio::test]
async fn retry_recovers_without_fallback() {
    let provider = ScriptedProvider::new()
        .with_script("gpt-x", ModelScript::FlakyThenOk { failures: 2 })
        .with_script("gpt-y", ModelScript::ok("should not be used"));
    let harness = TestHarness::with_defaults(provider);
    let agent = AgentSpec::builder("summarizer", model("gpt-x"))
        .fallback(model("gpt-y"))
        .reliability(fast_retry(3))
        .build()
        .expect("valid spec");

    let output = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("primary recovers");

    assert_eq!(output.model, model("gpt-x"));
    assert_eq!(output.content, json!("recovered"));
    assert_eq!(harness.provider.calls_for("gpt-x"), 3);
    assert_eq!(harness.provider.calls_for("gpt-y"), 0);
}

/// When every model is exhausted the caller sees the last underlying
/// error with its original type.
#[tokio::test]
async fn exhaustion_surfaces_last_error() {
    let provider = ScriptedProvider::new()
        .with_script("gpt-x", ModelScript::RateLimit)
        .with_script("gpt-y", ModelScript::ServerError);
    let harness = TestHarness::with_defaults(provider);
    let agent = AgentSpec::builder("summarizer", model("gpt-x"))
        .fallback(model("gpt-y"))
        .reliability(fast_retry(1))
        .build()
        .expect("valid spec");

    let result = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await;

    // The last model tried was gpt-y with a 500.
    match result {
        Err(PipelineError::Provider { status_code, .. }) => {
            assert_eq!(status_code, Some(500));
        }
        other => panic!("expected the last provider error, got {other:?}"),
    }
}
