//! Framework-neutral request snapshot consumed by the coordinator.
//!
//! Both trigger shapes funnel into [`RequestContext`]: the structured
//! action-style shape carries route values and the parsed body argument
//! object, the lightweight endpoint-style shape usually carries only the
//! method and a display name. Field lookups are all optional; the key builder
//! silently skips anything missing.

use serde_json::Value;
use std::collections::HashMap;
use std::net::IpAddr;

/// Identifies the counted resource: a group (controller, router) and an
/// optional specific name (action, handler).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceId {
    group: String,
    name: Option<String>,
}

impl ResourceId {
    /// Resource inside a group, e.g. controller + action.
    pub fn action(group: impl Into<String>, name: impl Into<String>) -> Self {
        Self { group: group.into(), name: Some(name.into()) }
    }

    /// Standalone endpoint known only by its display name.
    pub fn endpoint(display_name: impl Into<String>) -> Self {
        Self { group: display_name.into(), name: None }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Registry lookup id: `group/name` for actions, the group alone for
    /// endpoints.
    pub fn route_id(&self) -> String {
        match &self.name {
            Some(name) => format!("{}/{}", self.group, name),
            None => self.group.clone(),
        }
    }
}

/// Everything the decision path may read from a request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    method: String,
    resource: ResourceId,
    route_values: HashMap<String, String>,
    query: HashMap<String, Vec<String>>,
    body: Option<Value>,
    headers: HashMap<String, String>,
    peer_addr: Option<IpAddr>,
    ignored: bool,
}

impl RequestContext {
    fn new(method: impl Into<String>, resource: ResourceId) -> Self {
        Self {
            method: method.into(),
            resource,
            route_values: HashMap::new(),
            query: HashMap::new(),
            body: None,
            headers: HashMap::new(),
            peer_addr: None,
            ignored: false,
        }
    }

    /// Structured action-style trigger (group + action with route/body data).
    pub fn for_action(
        method: impl Into<String>,
        group: impl Into<String>,
        action: impl Into<String>,
    ) -> Self {
        Self::new(method, ResourceId::action(group, action))
    }

    /// Lightweight endpoint-style trigger (display name only).
    pub fn for_endpoint(method: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self::new(method, ResourceId::endpoint(display_name))
    }

    pub fn route(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.route_values.insert(name.into(), value.into());
        self
    }

    /// Add one query value; call repeatedly for multi-valued parameters.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.entry(name.into()).or_default().push(value.into());
        self
    }

    /// Add a header. Names are matched case-insensitively on lookup.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Attach the request's parsed argument object (first top-level argument
    /// is consulted for body key fields).
    pub fn body_json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn peer_addr(mut self, addr: IpAddr) -> Self {
        self.peer_addr = Some(addr);
        self
    }

    /// Mark the target route as exempt from rate limiting.
    pub fn ignore(mut self) -> Self {
        self.ignored = true;
        self
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn resource(&self) -> &ResourceId {
        &self.resource
    }

    pub fn route_value(&self, name: &str) -> Option<&str> {
        self.route_values.get(name).map(String::as_str)
    }

    pub fn query_values(&self, name: &str) -> Option<&[String]> {
        self.query.get(name).map(Vec::as_slice)
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    pub fn peer(&self) -> Option<IpAddr> {
        self.peer_addr
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored
    }
}
