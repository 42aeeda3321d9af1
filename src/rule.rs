//! Rule model and the startup-built rule registry.
//!
//! Rules are declared once, at registration time, against a route id and are
//! immutable afterwards. The registry replaces metadata/attribute scanning
//! with an explicit builder: a plain map from route id to [`RateLimitRule`]
//! plus a set of routes marked to ignore rate limiting entirely.

use crate::error::RuleError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

/// Whether counting is per specific resource or per resource group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RateLimitScope {
    /// Each resource (e.g. one action) is counted separately.
    #[default]
    PerResource,
    /// The whole resource group (e.g. a controller) shares one counter.
    PerResourceGroup,
}

/// A quota: at most `limit` requests per `period` for each derived key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    /// Length of the counting window.
    pub period: Duration,
    /// Number of requests admitted per window.
    pub limit: u32,
    /// Counting scope.
    #[serde(default)]
    pub scope: RateLimitScope,
    /// Route fields contributing to the key, in order.
    #[serde(default)]
    pub route_fields: Vec<String>,
    /// Query fields contributing to the key, in order.
    #[serde(default)]
    pub query_fields: Vec<String>,
    /// Body fields contributing to the key, in order (case-insensitive match).
    #[serde(default)]
    pub body_fields: Vec<String>,
}

impl RateLimitRule {
    /// Create a rule admitting `limit` requests per `period`, scoped per
    /// resource with no extra key fields.
    pub fn new(limit: u32, period: Duration) -> Self {
        Self {
            period,
            limit,
            scope: RateLimitScope::PerResource,
            route_fields: Vec::new(),
            query_fields: Vec::new(),
            body_fields: Vec::new(),
        }
    }

    pub fn scope(mut self, scope: RateLimitScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn route_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.route_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn query_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn body_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.body_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the rule invariant: `limit > 0 && period > 0`.
    pub fn validate(&self) -> Result<(), RuleError> {
        if self.limit == 0 || self.period.is_zero() {
            return Err(RuleError { limit: self.limit, period: self.period });
        }
        Ok(())
    }
}

/// Route-id → rule mapping consulted by the pipeline integration at dispatch
/// time, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct RuleRegistry {
    rules: HashMap<String, RateLimitRule>,
    ignored: HashSet<String>,
}

impl RuleRegistry {
    pub fn builder() -> RuleRegistryBuilder {
        RuleRegistryBuilder::default()
    }

    /// Rule attached to `route_id`, if any.
    pub fn rule(&self, route_id: &str) -> Option<&RateLimitRule> {
        self.rules.get(route_id)
    }

    /// Whether `route_id` is explicitly exempted from rate limiting.
    pub fn is_ignored(&self, route_id: &str) -> bool {
        self.ignored.contains(route_id)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Fluent builder for [`RuleRegistry`].
#[derive(Debug, Default)]
pub struct RuleRegistryBuilder {
    registry: RuleRegistry,
}

impl RuleRegistryBuilder {
    /// Attach `rule` to `route_id`. A later call for the same route replaces
    /// the earlier rule.
    pub fn rule(mut self, route_id: impl Into<String>, rule: RateLimitRule) -> Self {
        self.registry.rules.insert(route_id.into(), rule);
        self
    }

    /// Mark `route_id` as exempt: the coordinator unconditionally admits it,
    /// overriding any rule otherwise in effect.
    pub fn ignore(mut self, route_id: impl Into<String>) -> Self {
        self.registry.ignored.insert(route_id.into());
        self
    }

    pub fn build(self) -> RuleRegistry {
        self.registry
    }
}
