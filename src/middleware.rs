//! Tower middleware wiring the coordinator into a request pipeline.
//!
//! The layer is generic over the request type: an injected extractor turns
//! the framework's request into a [`RequestContext`], and the rule registry
//! supplies the rule (or ignore marker) for the extracted route id. Routes
//! with no registered rule pass through untouched. A denied request fails the
//! service with [`RateLimitError::Rejected`] carrying the configured status
//! code and body; the integration layer renders it and must not call the
//! downstream handler.

use crate::context::RequestContext;
use crate::coordinator::RateLimitCoordinator;
use crate::error::RateLimitError;
use crate::response::rejection_body;
use crate::rule::RuleRegistry;
use crate::store::CounterStore;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower_layer::Layer;
use tower_service::Service;

/// A layer that enforces registered rate-limit rules.
#[derive(Debug)]
pub struct RateLimitLayer<St, F> {
    coordinator: Arc<RateLimitCoordinator<St>>,
    registry: Arc<RuleRegistry>,
    extract: Arc<F>,
}

impl<St, F> RateLimitLayer<St, F> {
    pub fn new(
        coordinator: Arc<RateLimitCoordinator<St>>,
        registry: Arc<RuleRegistry>,
        extract: F,
    ) -> Self {
        Self { coordinator, registry, extract: Arc::new(extract) }
    }
}

impl<St, F> Clone for RateLimitLayer<St, F> {
    fn clone(&self) -> Self {
        Self {
            coordinator: Arc::clone(&self.coordinator),
            registry: Arc::clone(&self.registry),
            extract: Arc::clone(&self.extract),
        }
    }
}

impl<Svc, St, F> Layer<Svc> for RateLimitLayer<St, F> {
    type Service = RateLimitService<Svc, St, F>;

    fn layer(&self, service: Svc) -> Self::Service {
        RateLimitService {
            inner: service,
            coordinator: Arc::clone(&self.coordinator),
            registry: Arc::clone(&self.registry),
            extract: Arc::clone(&self.extract),
        }
    }
}

/// Middleware service that enforces rate limits.
#[derive(Debug)]
pub struct RateLimitService<Svc, St, F> {
    inner: Svc,
    coordinator: Arc<RateLimitCoordinator<St>>,
    registry: Arc<RuleRegistry>,
    extract: Arc<F>,
}

impl<Svc: Clone, St, F> Clone for RateLimitService<Svc, St, F> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            coordinator: Arc::clone(&self.coordinator),
            registry: Arc::clone(&self.registry),
            extract: Arc::clone(&self.extract),
        }
    }
}

impl<Svc, St, F, Req> Service<Req> for RateLimitService<Svc, St, F>
where
    Svc: Service<Req> + Clone + Send + 'static,
    Svc::Future: Send + 'static,
    Svc::Error: Send + Sync + std::error::Error + 'static,
    St: CounterStore + 'static,
    F: Fn(&Req) -> RequestContext + Send + Sync + 'static,
    Req: Send + 'static,
{
    type Response = Svc::Response;
    type Error = RateLimitError<Svc::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(RateLimitError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let mut ctx = (self.extract)(&req);
        let route_id = ctx.resource().route_id();
        if self.registry.is_ignored(&route_id) {
            ctx = ctx.ignore();
        }
        let rule = self.registry.rule(&route_id).cloned();

        let coordinator = Arc::clone(&self.coordinator);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(rule) = rule else {
                // No rule attached to this route.
                return inner.call(req).await.map_err(RateLimitError::Inner);
            };

            match coordinator.check_rate_limit(&ctx, &rule).await {
                Ok(true) => inner.call(req).await.map_err(RateLimitError::Inner),
                Ok(false) => {
                    let options = coordinator.options();
                    Err(RateLimitError::Rejected {
                        status: options.http_status_code,
                        body: rejection_body(options),
                    })
                }
                Err(e) => Err(RateLimitError::Config(e)),
            }
        })
    }
}
