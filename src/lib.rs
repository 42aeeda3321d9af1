#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Turnstile
//!
//! A rate-limit decision engine for async Rust: canonical key derivation,
//! windowed counters, and pluggable counting stores behind one trait.
//!
//! ## Features
//!
//! - **Key builder** deriving a deterministic counting key from identity,
//!   method, resource, and configured route/query/body fields
//! - **In-process counting store** with per-key async locking and fixed
//!   windows
//! - **Pluggable distributed stores** via the [`CounterStore`] trait (see the
//!   `turnstile-redis` companion crate)
//! - **Coordinator** handling short-circuits (disabled, allow-lists, ignore
//!   markers) and fail-open on store outages
//! - **Tower middleware** wiring the decision into a request pipeline
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use std::time::Duration;
//! use turnstile::{InMemoryCounterStore, RateLimitCoordinator, RateLimitOptions, RateLimitRule, RequestContext};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = Arc::new(InMemoryCounterStore::new());
//!     let coordinator = RateLimitCoordinator::new(RateLimitOptions::default(), store);
//!
//!     let rule = RateLimitRule::new(100, Duration::from_secs(60));
//!     let ctx = RequestContext::for_endpoint("GET", "orders")
//!         .peer_addr("10.0.0.1".parse().unwrap());
//!
//!     assert!(coordinator.check_rate_limit(&ctx, &rule).await.unwrap());
//! }
//! ```

pub mod clock;
pub mod context;
pub mod coordinator;
pub mod error;
pub mod identity;
pub mod key;
pub mod lock;
pub mod memory;
pub mod middleware;
pub mod options;
pub mod prelude;
pub mod queue;
pub mod response;
pub mod rule;
pub mod store;

// Re-exports
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use context::{RequestContext, ResourceId};
pub use coordinator::RateLimitCoordinator;
pub use error::{RateLimitError, RuleError};
pub use identity::{IdentityResolver, ResolvedIdentity};
pub use key::build_key;
pub use lock::KeyedLock;
pub use memory::InMemoryCounterStore;
pub use middleware::{RateLimitLayer, RateLimitService};
pub use options::{RateLimitOptions, RateLimitOptionsBuilder};
pub use queue::{BackgroundQueue, BackgroundWorker};
pub use response::rejection_body;
pub use rule::{RateLimitRule, RateLimitScope, RuleRegistry, RuleRegistryBuilder};
pub use store::CounterStore;
