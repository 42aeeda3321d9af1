//! The single decision entry point.
//!
//! Every trigger shape funnels into [`RateLimitCoordinator::check_rate_limit`].
//! Short-circuits, in order: rate limiting disabled, rule invalid (an error,
//! never a silent decision), identity allow-listed, route marked to ignore
//! rate limiting. Only then is the key built and the store consulted.
//!
//! Infrastructure failures never reject traffic: a store error is logged and
//! the request admitted. A rate limiter must not become a point of outage for
//! the service it protects.

use crate::context::RequestContext;
use crate::error::RuleError;
use crate::identity::IdentityResolver;
use crate::key::build_key;
use crate::options::RateLimitOptions;
use crate::rule::RateLimitRule;
use crate::store::CounterStore;
use std::sync::Arc;
use tracing::error;

/// Orchestrates short-circuit checks, key construction, and the store call.
#[derive(Debug)]
pub struct RateLimitCoordinator<S> {
    options: RateLimitOptions,
    resolver: IdentityResolver,
    store: Arc<S>,
}

impl<S> RateLimitCoordinator<S>
where
    S: CounterStore,
{
    pub fn new(options: RateLimitOptions, store: Arc<S>) -> Self {
        let resolver = IdentityResolver::from_options(&options);
        Self { options, resolver, store }
    }

    pub fn options(&self) -> &RateLimitOptions {
        &self.options
    }

    /// Decide whether the request may proceed (`true`) or is over quota
    /// (`false`). An invalid rule is an error for the integration layer to
    /// report, never a silent admit or deny.
    pub async fn check_rate_limit(
        &self,
        ctx: &RequestContext,
        rule: &RateLimitRule,
    ) -> Result<bool, RuleError> {
        if !self.options.enabled {
            return Ok(true);
        }

        rule.validate()?;

        let identity = self.resolver.resolve(ctx);

        if let Some(ip) = identity.ip {
            if self.options.ip_allow_list.contains(&ip) {
                return Ok(true);
            }
        }
        if let Some(client_id) = &identity.client_id {
            if self.options.client_id_allow_list.iter().any(|allowed| allowed == client_id) {
                return Ok(true);
            }
        }

        if ctx.is_ignored() {
            return Ok(true);
        }

        let prefix = identity.prefix().unwrap_or_default();
        let key = build_key(&prefix, ctx.method(), rule, ctx);

        match self.store.check_and_record(&key, rule.period, rule.limit).await {
            Ok(admitted) => Ok(admitted),
            Err(e) => {
                error!(
                    target: "turnstile::coordinator",
                    key = %key,
                    error = %e,
                    "counting store unavailable, failing open"
                );
                Ok(true)
            }
        }
    }
}
