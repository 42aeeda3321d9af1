//! End-to-end middleware tests: a tower stack wrapping a fake handler,
//! driven through `ServiceExt::oneshot`.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, Layer, ServiceExt};
use turnstile::{
    InMemoryCounterStore, RateLimitCoordinator, RateLimitError, RateLimitLayer, RateLimitOptions,
    RateLimitRule, RequestContext, RuleRegistry,
};

#[derive(Debug, Clone)]
struct FakeRequest {
    method: &'static str,
    path: &'static str,
    ip: &'static str,
    route: Vec<(&'static str, &'static str)>,
}

impl FakeRequest {
    fn get(path: &'static str, ip: &'static str) -> Self {
        Self { method: "GET", path, ip, route: Vec::new() }
    }

    fn route(mut self, name: &'static str, value: &'static str) -> Self {
        self.route.push((name, value));
        self
    }
}

fn extract(req: &FakeRequest) -> RequestContext {
    let mut ctx = RequestContext::for_endpoint(req.method, req.path)
        .header("X-Forwarded-For", req.ip);
    for (name, value) in &req.route {
        ctx = ctx.route(*name, *value);
    }
    ctx
}

fn limited_stack(
    options: RateLimitOptions,
    registry: RuleRegistry,
) -> impl tower::Service<FakeRequest, Response = &'static str, Error = RateLimitError<Infallible>>
       + Clone {
    let coordinator = Arc::new(RateLimitCoordinator::new(
        options,
        Arc::new(InMemoryCounterStore::new()),
    ));
    let layer = RateLimitLayer::new(coordinator, Arc::new(registry), extract);
    layer.layer(service_fn(|_req: FakeRequest| async { Ok::<_, Infallible>("handled") }))
}

fn single_rule_registry(rule: RateLimitRule) -> RuleRegistry {
    RuleRegistry::builder().rule("orders", rule).build()
}

#[tokio::test]
async fn second_request_from_same_ip_is_rejected() {
    let rule = RateLimitRule::new(1, Duration::from_secs(60));
    let stack = limited_stack(RateLimitOptions::default(), single_rule_registry(rule));
    let req = FakeRequest::get("orders", "203.0.113.9");

    assert_eq!(stack.clone().oneshot(req.clone()).await.unwrap(), "handled");

    let err = stack.oneshot(req).await.unwrap_err();
    let (status, body) = err.rejection().expect("rejection");
    assert_eq!(status, 429);
    assert!(body.contains("Rate limit Exceeded"), "{body}");
    assert!(body.contains("429"), "{body}");
}

#[tokio::test]
async fn requests_from_different_ips_both_pass() {
    let rule = RateLimitRule::new(1, Duration::from_secs(60));
    let stack = limited_stack(RateLimitOptions::default(), single_rule_registry(rule));

    let first = stack.clone().oneshot(FakeRequest::get("orders", "198.51.100.1")).await;
    let second = stack.oneshot(FakeRequest::get("orders", "198.51.100.2")).await;
    assert!(first.is_ok());
    assert!(second.is_ok());
}

#[tokio::test]
async fn allow_listed_ip_is_never_throttled() {
    let options = RateLimitOptions::builder()
        .allow_ip("203.0.113.9".parse().unwrap())
        .build();
    let rule = RateLimitRule::new(1, Duration::from_secs(60));
    let stack = limited_stack(options, single_rule_registry(rule));
    let req = FakeRequest::get("orders", "203.0.113.9");

    assert!(stack.clone().oneshot(req.clone()).await.is_ok());
    assert!(stack.oneshot(req).await.is_ok());
}

#[tokio::test]
async fn route_field_values_partition_the_quota() {
    let rule = RateLimitRule::new(1, Duration::from_secs(60)).route_fields(["id", "name"]);
    let stack = limited_stack(RateLimitOptions::default(), single_rule_registry(rule));

    let twenty = FakeRequest::get("orders", "203.0.113.9")
        .route("id", "20")
        .route("name", "rate-limit");
    let twenty_one = FakeRequest::get("orders", "203.0.113.9")
        .route("id", "21")
        .route("name", "rate-limit");

    assert!(stack.clone().oneshot(twenty.clone()).await.is_ok());
    assert!(stack.clone().oneshot(twenty).await.is_err());
    assert!(stack.oneshot(twenty_one).await.is_ok());
}

#[tokio::test]
async fn custom_template_shapes_the_rejection_body() {
    let options = RateLimitOptions::builder()
        .response_template(r#"{"error":{"message":"$(ErrorMessage)","code":$(HttpStatusCode)}}"#)
        .build();
    let rule = RateLimitRule::new(1, Duration::from_secs(60));
    let stack = limited_stack(options, single_rule_registry(rule));
    let req = FakeRequest::get("orders", "203.0.113.9");

    assert!(stack.clone().oneshot(req.clone()).await.is_ok());

    let err = stack.oneshot(req).await.unwrap_err();
    let (_, body) = err.rejection().expect("rejection");
    let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(parsed["error"]["message"], "Rate limit Exceeded");
    assert_eq!(parsed["error"]["code"], 429);
}

#[tokio::test]
async fn routes_without_a_rule_pass_through() {
    let rule = RateLimitRule::new(1, Duration::from_secs(60));
    let stack = limited_stack(RateLimitOptions::default(), single_rule_registry(rule));
    let req = FakeRequest::get("healthz", "203.0.113.9");

    for _ in 0..3 {
        assert!(stack.clone().oneshot(req.clone()).await.is_ok());
    }
}

#[tokio::test]
async fn ignored_routes_are_exempt_even_with_a_rule() {
    let rule = RateLimitRule::new(1, Duration::from_secs(60));
    let registry = RuleRegistry::builder()
        .rule("orders", rule)
        .ignore("orders")
        .build();
    let stack = limited_stack(RateLimitOptions::default(), registry);
    let req = FakeRequest::get("orders", "203.0.113.9");

    assert!(stack.clone().oneshot(req.clone()).await.is_ok());
    assert!(stack.oneshot(req).await.is_ok());
}

#[tokio::test]
async fn disabled_limiter_admits_everything() {
    let options = RateLimitOptions::builder().enabled(false).build();
    let rule = RateLimitRule::new(1, Duration::from_secs(60));
    let stack = limited_stack(options, single_rule_registry(rule));
    let req = FakeRequest::get("orders", "203.0.113.9");

    for _ in 0..5 {
        assert!(stack.clone().oneshot(req.clone()).await.is_ok());
    }
}

#[tokio::test]
async fn invalid_rule_surfaces_as_config_error() {
    let rule = RateLimitRule::new(0, Duration::from_secs(60));
    let stack = limited_stack(RateLimitOptions::default(), single_rule_registry(rule));

    let err = stack.oneshot(FakeRequest::get("orders", "203.0.113.9")).await.unwrap_err();
    assert!(err.is_config());
}
