//! Convenience re-exports for common usage.

pub use crate::context::{RequestContext, ResourceId};
pub use crate::coordinator::RateLimitCoordinator;
pub use crate::error::{RateLimitError, RuleError};
pub use crate::memory::InMemoryCounterStore;
pub use crate::middleware::RateLimitLayer;
pub use crate::options::RateLimitOptions;
pub use crate::rule::{RateLimitRule, RateLimitScope, RuleRegistry};
pub use crate::store::CounterStore;
