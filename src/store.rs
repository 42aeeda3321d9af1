//! The counting-store seam.
//!
//! Backends answer one question: has this key exceeded `limit` events per
//! `period`. The in-process store lives in this crate; distributed backends
//! (e.g. Redis in `turnstile-redis`) implement the same trait, so the
//! coordinator is generic over where counting happens.

use async_trait::async_trait;
use std::time::Duration;

/// A time-windowed counter keyed by string.
///
/// Implementations must make `check_and_record` atomic per key: two
/// concurrent calls for the same key observe a strictly ordered sequence of
/// check-and-increment operations. `limit` is the number of requests admitted
/// per window on every backend; a post-increment count above it denies, and
/// `limit == 0` denies unconditionally.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Error type for storage operations. The coordinator fails open on any
    /// error from this trait.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Count one event against `key` and return whether the request is
    /// admitted (`true`) or over quota (`false`).
    async fn check_and_record(
        &self,
        key: &str,
        period: Duration,
        limit: u32,
    ) -> Result<bool, Self::Error>;
}
