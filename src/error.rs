//! Error types for the rate-limit decision path
use std::fmt;
use std::time::Duration;

/// A rule failed validation: limit and period must both be positive.
///
/// Surfaced to the caller at check time rather than silently admitting or
/// denying, so a misconfigured rule never lets unlimited traffic through
/// unnoticed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleError {
    /// Limit the rule carried.
    pub limit: u32,
    /// Period the rule carried.
    pub period: Duration,
}

impl fmt::Display for RuleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "rate limit rule requires limit > 0 and period > 0 (got limit {}, period {:?})",
            self.limit, self.period
        )
    }
}

impl std::error::Error for RuleError {}

/// Unified error type at the pipeline-integration boundary.
#[derive(Debug, Clone)]
pub enum RateLimitError<E> {
    /// The request was over quota and must be rejected with the configured
    /// status code and body.
    Rejected { status: u16, body: String },
    /// The rule attached to the route is invalid.
    Config(RuleError),
    /// The underlying service failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for RateLimitError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rejected { status, .. } => {
                write!(f, "rate limit exceeded (status {})", status)
            }
            Self::Config(e) => write!(f, "{}", e),
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for RateLimitError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::Config(e) => Some(e),
            Self::Rejected { .. } => None,
        }
    }
}

impl<E> RateLimitError<E> {
    /// Check if this error is a quota rejection.
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Check if this error is a rule-configuration error.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Check if this error wraps an inner service error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Access the rejection status and body, if present.
    pub fn rejection(&self) -> Option<(u16, &str)> {
        match self {
            Self::Rejected { status, body } => Some((*status, body.as_str())),
            _ => None,
        }
    }

    /// Get the inner error if this is an Inner variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }
}
