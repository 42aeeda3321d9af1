//! Canonical counting-key derivation.
//!
//! `build_key` is pure: no I/O, no side effects, deterministic for identical
//! inputs. Two requests share a counter iff every contributing component is
//! equal.
//!
//! Separator scheme: every appended field value is terminated by `:`,
//! single- and multi-value parameters alike. This keeps
//! `{a: "1", b: "23"}` and `{a: "12", b: "3"}` on distinct keys.

use crate::context::RequestContext;
use crate::rule::{RateLimitRule, RateLimitScope};
use serde_json::{Map, Value};

const FIELD_SEPARATOR: char = ':';

/// Derive the counting key for one request.
///
/// `identity_prefix` is the already-resolved per-identity prefix (client id
/// or IP). Missing fields are silently skipped; lookups are independent of
/// one another.
pub fn build_key(
    identity_prefix: &str,
    method: &str,
    rule: &RateLimitRule,
    ctx: &RequestContext,
) -> String {
    let resource = ctx.resource();
    let mut key = String::with_capacity(64);

    key.push_str(identity_prefix);
    key.push_str(method);
    key.push_str(resource.group());

    // PerResourceGroup shares one counter across the whole group.
    if rule.scope == RateLimitScope::PerResource {
        if let Some(name) = resource.name() {
            key.push_str(name);
        }
    }

    for field in &rule.route_fields {
        if let Some(value) = ctx.route_value(field) {
            key.push_str(value);
            key.push(FIELD_SEPARATOR);
        }
    }

    for field in &rule.query_fields {
        if let Some(values) = ctx.query_values(field) {
            for value in values {
                key.push_str(value);
                key.push(FIELD_SEPARATOR);
            }
        }
    }

    if !rule.body_fields.is_empty() {
        if let Some(properties) = first_argument_object(ctx.body()) {
            for field in &rule.body_fields {
                if let Some(value) = lookup_case_insensitive(properties, field) {
                    match value {
                        Value::String(s) => key.push_str(s),
                        other => key.push_str(&other.to_string()),
                    }
                    key.push(FIELD_SEPARATOR);
                }
            }
        }
    }

    key
}

/// The first top-level argument of the body, when it is an object.
fn first_argument_object(body: Option<&Value>) -> Option<&Map<String, Value>> {
    let root = body?.as_object()?;
    let (_, first) = root.iter().next()?;
    first.as_object()
}

fn lookup_case_insensitive<'a>(map: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    map.iter().find(|(name, _)| name.eq_ignore_ascii_case(field)).map(|(_, value)| value)
}
