//! Runtime options consumed by the coordinator and the middleware.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// Header consulted for the requester IP when none is configured.
pub const DEFAULT_IP_HEADER: &str = "X-Forwarded-For";

/// Configuration surface for the decision engine.
///
/// Every field has a default; a plain `RateLimitOptions::default()` enables
/// rate limiting with a 429 rejection and X-Forwarded-For identity
/// resolution. Deserializable so it can be loaded from a configuration table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitOptions {
    /// When false, every request is admitted without consulting the store.
    pub enabled: bool,
    /// Status code of the rejection response.
    pub http_status_code: u16,
    /// Message carried by the rejection response.
    pub error_message: String,
    /// Optional fully custom rejection body; `$(ErrorMessage)` and
    /// `$(HttpStatusCode)` placeholders are substituted.
    pub response_template: Option<String>,
    /// Header consulted for the requester IP; falls back to the peer address.
    pub ip_header_name: String,
    /// IPs exempted from rate limiting.
    pub ip_allow_list: Vec<IpAddr>,
    /// Header carrying a client identifier; when present on a request its
    /// value is preferred over the IP as the counting identity.
    pub client_id_header: Option<String>,
    /// Client identifiers exempted from rate limiting.
    pub client_id_allow_list: Vec<String>,
}

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            http_status_code: 429,
            error_message: "Rate limit Exceeded".to_string(),
            response_template: None,
            ip_header_name: DEFAULT_IP_HEADER.to_string(),
            ip_allow_list: Vec::new(),
            client_id_header: None,
            client_id_allow_list: Vec::new(),
        }
    }
}

impl RateLimitOptions {
    pub fn builder() -> RateLimitOptionsBuilder {
        RateLimitOptionsBuilder::default()
    }
}

/// Fluent builder for [`RateLimitOptions`].
#[derive(Debug, Default)]
pub struct RateLimitOptionsBuilder {
    options: RateLimitOptions,
}

impl RateLimitOptionsBuilder {
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.options.enabled = enabled;
        self
    }

    pub fn http_status_code(mut self, code: u16) -> Self {
        self.options.http_status_code = code;
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.options.error_message = message.into();
        self
    }

    pub fn response_template(mut self, template: impl Into<String>) -> Self {
        self.options.response_template = Some(template.into());
        self
    }

    pub fn ip_header_name(mut self, name: impl Into<String>) -> Self {
        self.options.ip_header_name = name.into();
        self
    }

    pub fn allow_ip(mut self, ip: IpAddr) -> Self {
        self.options.ip_allow_list.push(ip);
        self
    }

    pub fn client_id_header(mut self, name: impl Into<String>) -> Self {
        self.options.client_id_header = Some(name.into());
        self
    }

    pub fn allow_client_id(mut self, id: impl Into<String>) -> Self {
        self.options.client_id_allow_list.push(id.into());
        self
    }

    pub fn build(self) -> RateLimitOptions {
        self.options
    }
}
