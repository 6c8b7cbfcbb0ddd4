//! Cache fingerprint construction.
//!
//! The fingerprint must change whenever a parameter that affects the output
//! changes, and must not change for parameters irrelevant to the output
//! (tracing ids and the like). Which parameters count is a configuration
//! surface on the agent's cache policy, not guesswork: an explicit include
//! list (empty meaning "all") minus an explicit exclude list.

use pipeline_core::ModelId;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

/// Per-agent cache policy.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Whether responses are cached for this agent.
    pub enabled: bool,
    /// How long cached responses live.
    pub ttl: Duration,
    /// Parameter keys that participate in the fingerprint. Empty means all
    /// parameters participate.
    pub include_params: Vec<String>,
    /// Parameter keys excluded from the fingerprint even when included
    /// above.
    pub exclude_params: Vec<String>,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(60 * 60),
            include_params: Vec::new(),
            exclude_params: Vec::new(),
        }
    }
}

impl CachePolicy {
    /// A policy with caching enabled and the given TTL.
    #[must_use]
    pub fn enabled(ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl,
            ..Default::default()
        }
    }

    /// Set the include list.
    #[must_use]
    pub fn with_include(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.include_params = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the exclude list.
    #[must_use]
    pub fn with_exclude(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.exclude_params = keys.into_iter().map(Into::into).collect();
        self
    }

    fn selected_params<'a>(
        &self,
        params: &'a BTreeMap<String, String>,
    ) -> Vec<(&'a str, &'a str)> {
        params
            .iter()
            .filter(|(key, _)| {
                self.include_params.is_empty() || self.include_params.iter().any(|k| k == *key)
            })
            .filter(|(key, _)| !self.exclude_params.iter().any(|k| k == *key))
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }
}

/// Deterministic cache key for one request's output-relevant parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Build a fingerprint.
    ///
    /// Layout: `{ns}:cache:{agent}:{version}:{model}[:{k}={v}...]:{hash}`
    /// where the parameter pairs come from the policy's selection in sorted
    /// key order and the hash is hex SHA-256 of the canonical JSON of the
    /// input payload.
    #[must_use]
    pub fn build(
        namespace: &str,
        agent_name: &str,
        agent_version: &str,
        model: &ModelId,
        params: &BTreeMap<String, String>,
        policy: &CachePolicy,
        input: &serde_json::Value,
    ) -> Self {
        let mut key = format!("{namespace}:cache:{agent_name}:{agent_version}:{model}");
        for (name, value) in policy.selected_params(params) {
            key.push(':');
            key.push_str(name);
            key.push('=');
            key.push_str(value);
        }
        key.push(':');
        key.push_str(&content_hash(input));
        Self(key)
    }

    /// The key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn content_hash(input: &serde_json::Value) -> String {
    // serde_json object keys are sorted, so the serialization is canonical.
    let canonical = input.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
