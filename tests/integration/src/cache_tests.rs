//! Caching behavior through the full pipeline.

use crate::fixtures::*;
use crate::mock_provider::{ModelScript, ScriptedProvider};
use pipeline_cache::CachePolicy;
use pipeline_core::EngineConfig;
use pipeline_executor::{AgentSpec, ExecutionRequest};
use serde_json::json;
use std::time::Duration;

/// Scenario B: identical request twice within the TTL window; exactly one
/// provider invocation; equal outputs.
#[tokio::test]
async fn scenario_b_cache_hit() {
    let provider =
        ScriptedProvider::new().with_script("gpt-4o", ModelScript::ok("the summary"));
    let harness = TestHarness::with_defaults(provider);
    let agent = cached_agent("summarizer", "gpt-4o", Duration::from_secs(3600));

    let first = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("same document")))
        .await
        .expect("first call succeeds");
    let second = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("same document")))
        .await
        .expect("second call succeeds");

    assert_eq!(harness.provider.total_calls(), 1, "one provider invocation");
    assert_eq!(first.content, second.content);
    assert!(!first.cached);
    assert!(second.cached);
    assert!(second.cost.abs() < f64::EPSILON, "cache hits cost nothing");
}

/// P5: determinism. Identical effective parameters produce a hit; a
/// different input misses.
#[tokio::test]
async fn p5_cache_determinism() {
    let provider = ScriptedProvider::new();
    let harness = TestHarness::with_defaults(provider);
    let agent = cached_agent("summarizer", "gpt-4o", Duration::from_secs(3600));

    harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc A")))
        .await
        .expect("call succeeds");
    harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc A")))
        .await
        .expect("call succeeds");
    harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc B")))
        .await
        .expect("call succeeds");

    assert_eq!(
        harness.provider.total_calls(),
        2,
        "doc A invoked once, doc B once"
    );
}

/// P6: include-listed parameters change the fingerprint; exclude-listed
/// parameters do not.
#[tokio::test]
async fn p6_cache_key_include_exclude() {
    let provider = ScriptedProvider::new();
    let harness = TestHarness::with_defaults(provider);
    let agent = AgentSpec::builder("narrator", model("tts-1"))
        .cache(
            CachePolicy::enabled(Duration::from_secs(3600))
                .with_include(["voice"])
                .with_exclude(["trace_id"]),
        )
        .build()
        .expect("valid spec");

    // Same voice, different trace ids: second call is a hit.
    harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("read this"))
                .with_param("voice", "nova")
                .with_param("trace_id", "t-1"),
        )
        .await
        .expect("call succeeds");
    harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("read this"))
                .with_param("voice", "nova")
                .with_param("trace_id", "t-2"),
        )
        .await
        .expect("call succeeds");
    assert_eq!(harness.provider.total_calls(), 1, "trace id is irrelevant");

    // Different voice: miss.
    harness
        .executor
        .execute(
            &agent,
            ExecutionRequest::new(json!("read this"))
                .with_param("voice", "alloy")
                .with_param("trace_id", "t-3"),
        )
        .await
        .expect("call succeeds");
    assert_eq!(harness.provider.total_calls(), 2, "voice participates");
}

/// TTL expiry turns a hit back into a miss.
#[tokio::test]
async fn cache_ttl_expiry() {
    let provider = ScriptedProvider::new();
    let harness = TestHarness::with_defaults(provider);
    let agent = cached_agent("summarizer", "gpt-4o", Duration::from_millis(30));

    harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("call succeeds");
    tokio::time::sleep(Duration::from_millis(80)).await;
    harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("call succeeds");

    assert_eq!(harness.provider.total_calls(), 2, "entry expired");
}

/// Failed results are never cached: a failure followed by a success does
/// not serve the failure.
#[tokio::test]
async fn failures_never_cached() {
    let provider =
        ScriptedProvider::new().with_script("gpt-4o", ModelScript::BadRequest);
    let harness = TestHarness::with_defaults(provider);
    let mut agent = cached_agent("summarizer", "gpt-4o", Duration::from_secs(3600));
    agent.reliability = fast_retry(0);

    let failed = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await;
    assert!(failed.is_err());
    assert_eq!(harness.executor.cache_stats().stores, 0);

    // Provider recovers; the next identical call reaches it.
    harness
        .provider
        .set_script("gpt-4o", ModelScript::ok("recovered"));
    let output = harness
        .executor
        .execute(&agent, ExecutionRequest::new(json!("doc")))
        .await
        .expect("recovered call succeeds");
    assert_eq!(output.content, json!("recovered"));
    assert_eq!(harness.provider.total_calls(), 2);
}

/// A bumped agent version misses the old version's entries.
#[tokio::test]
async fn version_bump_invalidates() {
    let provider = ScriptedProvider::new();
    let harness = TestHarness::with_defaults(provider);

    let v1 = AgentSpec::builder("summarizer", model("gpt-4o"))
        .version("1.0.0")
        .cache(CachePolicy::enabled(Duration::from_secs(3600)))
        .build()
        .expect("valid spec");
    let v2 = AgentSpec::builder("summarizer", model("gpt-4o"))
        .version("2.0.0")
        .cache(CachePolicy::enabled(Duration::from_secs(3600)))
        .build()
        .expect("valid spec");

    harness
        .executor
        .execute(&v1, ExecutionRequest::new(json!("doc")))
        .await
        .expect("call succeeds");
    harness
        .executor
        .execute(&v2, ExecutionRequest::new(json!("doc")))
        .await
        .expect("call succeeds");

    assert_eq!(harness.provider.total_calls(), 2, "no cross-version hit");
}

/// Cache disabled on the engine-wide config default agent: every call
/// reaches the provider.
#[tokio::test]
async fn uncached_agent_always_invokes() {
    let provider = ScriptedProvider::new();
    let harness = TestHarness::new(provider, EngineConfig::default());
    let agent = chat_agent("summarizer", "gpt-4o");

    for _ in 0..3 {
        harness
            .executor
            .execute(&agent, ExecutionRequest::new(json!("doc")))
            .await
            .expect("call succeeds");
    }

    assert_eq!(harness.provider.total_calls(), 3);
}
