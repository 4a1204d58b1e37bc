//! Error types for throttling.
//!
//! Two families live here:
//! - [`ThrottleError`] is what the middleware hands back per request: either the engine refused
//!   admission (`TooManyRequests`) or the protected handler failed (`Inner`).
//! - [`BuildError`] covers everything that can go wrong while turning a rule specification into
//!   a live engine. These are raised once, at configuration time.
//!
//! A limiter saying "no" is not an error: limiters hand back an ungranted [`Permit`](crate::Permit)
//! and only the middleware turns a final rejection into `TooManyRequests`.
use std::fmt;

use http::StatusCode;

use crate::backoff::BackoffError;

/// Per-request outcome surfaced by [`ThrottleService`](crate::ThrottleService).
#[derive(Debug, Clone)]
pub enum ThrottleError<E> {
    /// The selected rule refused admission after any configured retries.
    TooManyRequests { rule: String },
    /// The downstream handler failed.
    Inner(E),
}

impl<E: fmt::Display> fmt::Display for ThrottleError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyRequests { rule } => {
                write!(f, "too many requests (throttled by rule '{}')", rule)
            }
            Self::Inner(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for ThrottleError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Inner(e) => Some(e),
            Self::TooManyRequests { .. } => None,
        }
    }
}

impl<E> ThrottleError<E> {
    /// Check if this error is an admission rejection.
    pub fn is_too_many_requests(&self) -> bool {
        matches!(self, Self::TooManyRequests { .. })
    }

    /// Check if this error wraps a downstream error.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Name of the rule that rejected the request, if any.
    pub fn rule(&self) -> Option<&str> {
        match self {
            Self::TooManyRequests { rule } => Some(rule),
            Self::Inner(_) => None,
        }
    }

    /// Get the inner error if this is an Inner variant
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::TooManyRequests { .. } => None,
        }
    }

    /// Borrow the inner error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            Self::TooManyRequests { .. } => None,
        }
    }

    /// HTTP status for a rejection; `None` for downstream errors, whose mapping belongs to the
    /// caller.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::TooManyRequests { .. } => Some(StatusCode::TOO_MANY_REQUESTS),
            Self::Inner(_) => None,
        }
    }
}

/// Failures raised while building limiters, rules, or the engine.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A matcher pattern failed to compile.
    #[error("invalid matcher pattern '{pattern}': {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    /// A method in the allow-list is not a valid HTTP method token.
    #[error("invalid HTTP method '{0}'")]
    InvalidMethod(String),
    /// Limiter parameters are unusable (e.g. a zero tick period).
    #[error("invalid {kind} limiter: {reason}")]
    InvalidLimiter { kind: &'static str, reason: String },
    /// Backoff parameters are inconsistent.
    #[error("invalid backoff: {0}")]
    Backoff(#[from] BackoffError),
    /// Limiters with a replenishment schedule must be built inside a tokio runtime.
    #[error("no tokio runtime available to drive the replenishment schedule")]
    NoRuntime,
    /// The rule specification could not be parsed.
    #[error("malformed throttle configuration: {0}")]
    Config(#[from] serde_json::Error),
    /// The rule specification file could not be read.
    #[error("failed to read throttle configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl BuildError {
    pub(crate) fn invalid_limiter(kind: &'static str, reason: impl Into<String>) -> Self {
        BuildError::InvalidLimiter { kind, reason: reason.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::io;

    #[test]
    fn too_many_requests_display_names_rule() {
        let err: ThrottleError<io::Error> = ThrottleError::TooManyRequests { rule: "api".into() };
        let msg = format!("{}", err);
        assert!(msg.contains("too many requests"));
        assert!(msg.contains("api"));
    }

    #[test]
    fn too_many_requests_maps_to_429() {
        let err: ThrottleError<io::Error> = ThrottleError::TooManyRequests { rule: "r".into() };
        assert_eq!(err.status(), Some(StatusCode::TOO_MANY_REQUESTS));
        assert!(err.is_too_many_requests());
        assert!(!err.is_inner());
        assert_eq!(err.rule(), Some("r"));
        assert!(err.source().is_none());
    }

    #[test]
    fn inner_error_is_passed_through() {
        let err = ThrottleError::Inner(io::Error::new(io::ErrorKind::Other, "backend down"));
        assert!(err.is_inner());
        assert!(err.status().is_none());
        assert!(err.rule().is_none());
        assert_eq!(format!("{}", err), "backend down");
        assert!(err.source().is_some());
        assert_eq!(err.into_inner().unwrap().to_string(), "backend down");
    }

    #[test]
    fn build_error_wraps_regex_source() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = BuildError::InvalidPattern { pattern: "(".into(), source };
        assert!(err.to_string().contains("invalid matcher pattern '('"));
        assert!(err.source().is_some());
    }

    #[test]
    fn invalid_limiter_message() {
        let err = BuildError::invalid_limiter("fixed_window", "window_size_ms must be > 0");
        assert_eq!(err.to_string(), "invalid fixed_window limiter: window_size_ms must be > 0");
    }
}
