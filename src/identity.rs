//! Request identity resolution.
//!
//! An injected component rather than ambient state: the coordinator owns one
//! resolver configured from [`RateLimitOptions`]. Resolution order follows
//! the proxy convention: configured IP header first (taking the first entry
//! of a comma-separated list), then the transport peer address. A configured
//! client-identifier header, when present on the request, is preferred over
//! the IP as the counting identity; both are still reported so the caller can
//! run both allow-list checks.

use crate::context::RequestContext;
use crate::options::RateLimitOptions;
use std::net::IpAddr;

/// Identity attributes extracted from one request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResolvedIdentity {
    /// Requester IP, from the configured header or the peer address.
    pub ip: Option<IpAddr>,
    /// Client identifier header value, when configured and present.
    pub client_id: Option<String>,
}

impl ResolvedIdentity {
    /// The key prefix: client id when known, otherwise the IP rendered as
    /// text. `None` when the request exposed neither.
    pub fn prefix(&self) -> Option<String> {
        self.client_id.clone().or_else(|| self.ip.map(|ip| ip.to_string()))
    }
}

/// Resolves request identity from headers with a peer-address fallback.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    ip_header: String,
    client_id_header: Option<String>,
}

impl IdentityResolver {
    pub fn new(ip_header: impl Into<String>, client_id_header: Option<String>) -> Self {
        Self { ip_header: ip_header.into(), client_id_header }
    }

    pub fn from_options(options: &RateLimitOptions) -> Self {
        Self::new(options.ip_header_name.clone(), options.client_id_header.clone())
    }

    pub fn resolve(&self, ctx: &RequestContext) -> ResolvedIdentity {
        let ip = ctx
            .header_value(&self.ip_header)
            .and_then(first_forwarded_ip)
            .or_else(|| ctx.peer());

        let client_id = self
            .client_id_header
            .as_deref()
            .and_then(|h| ctx.header_value(h))
            .filter(|v| !v.trim().is_empty())
            .map(str::to_string);

        ResolvedIdentity { ip, client_id }
    }
}

/// First entry of a comma-separated forwarded-for list, parsed as an IP.
fn first_forwarded_ip(value: &str) -> Option<IpAddr> {
    value.split(',').next()?.trim().parse().ok()
}
