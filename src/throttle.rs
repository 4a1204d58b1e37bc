//! Ordered first-match dispatch of requests onto throttle rules.
//!
//! An engine holds its rules in declaration order. For each request the first rule whose method
//! allow-list and matcher both accept the request is selected and only that rule's limiter is
//! consulted. Requests that match no rule pass through unthrottled.
//!
//! ```rust
//! use std::sync::Arc;
//! use gatewarden::{Admission, MaxConnections, PathMatcher, ThrottleEngine, ThrottleRule};
//! use http::Method;
//! use tokio_util::sync::CancellationToken;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let engine = ThrottleEngine::from_rules(vec![ThrottleRule::new(
//!     "api",
//!     Arc::new(PathMatcher::prefix(["/api/"])),
//!     Arc::new(MaxConnections::new(1).unwrap()),
//! )]);
//! let cancel = CancellationToken::new();
//!
//! let first = engine.admit(&Method::GET, "/api/users", &cancel).await;
//! assert!(first.is_granted());
//! let second = engine.admit(&Method::GET, "/api/users", &cancel).await;
//! assert!(second.is_rejected());
//! let other = engine.admit(&Method::GET, "/static/app.js", &cancel).await;
//! assert!(matches!(other, Admission::Unmatched));
//! # });
//! ```

use std::fmt;
use std::sync::Arc;

use http::Method;
use tokio_util::sync::CancellationToken;

use crate::config::{RuleSpec, ThrottleSpec};
use crate::error::BuildError;
use crate::matcher::Matcher;
use crate::rate_limit::{Permit, RateLimiter};
use crate::retry::RetryLimiter;

/// A matcher, an optional method allow-list and the limiter that gates matching requests.
///
/// Immutable once built. Retry, when configured, is already folded into `limiter` as a
/// [`RetryLimiter`].
#[derive(Debug, Clone)]
pub struct ThrottleRule {
    name: Arc<str>,
    methods: Vec<Method>,
    matcher: Arc<dyn Matcher>,
    limiter: Arc<dyn RateLimiter>,
}

impl ThrottleRule {
    /// A rule applying to every method.
    pub fn new(
        name: impl Into<String>,
        matcher: Arc<dyn Matcher>,
        limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        let name: String = name.into();
        Self { name: name.into(), methods: Vec::new(), matcher, limiter }
    }

    /// Restrict the rule to the given methods. An empty list means all methods.
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method>) -> Self {
        self.methods = methods.into_iter().collect();
        self
    }

    /// Resolve a rule specification. `index` names unnamed rules.
    pub fn from_spec(index: usize, spec: &RuleSpec) -> Result<Self, BuildError> {
        let name = spec.name.clone().unwrap_or_else(|| format!("rule-{}", index));
        let methods = spec
            .methods
            .iter()
            .map(String::as_str)
            .map(parse_method)
            .collect::<Result<Vec<_>, _>>()?;
        let matcher = Arc::new(spec.matcher.build()?);

        let mut limiter = spec.limiter.build()?;
        if let Some(retry) = &spec.retry {
            // a present backoff is validated even when no retries are configured
            let backoff = retry.backoff.clone().unwrap_or_default().build()?;
            if retry.max_retry > 0 {
                limiter = Arc::new(
                    RetryLimiter::builder_shared(limiter)
                        .max_retry(retry.max_retry)
                        .backoff(backoff)
                        .build(),
                );
            }
        }

        tracing::debug!(
            rule = %name,
            limiter = limiter.kind(),
            methods = ?spec.methods,
            max_retry = spec.retry.as_ref().map_or(0, |r| r.max_retry),
            "throttle rule built"
        );
        Ok(Self { name: name.into(), methods, matcher, limiter })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    pub fn limiter(&self) -> &Arc<dyn RateLimiter> {
        &self.limiter
    }

    /// Method allow-list (when non-empty) and matcher must both accept.
    pub fn matches(&self, method: &Method, path: &str) -> bool {
        (self.methods.is_empty() || self.methods.contains(method))
            && self.matcher.matches(method, path)
    }
}

fn parse_method(raw: &str) -> Result<Method, BuildError> {
    let upper = raw.trim().to_ascii_uppercase();
    if upper.is_empty() {
        return Err(BuildError::InvalidMethod(raw.to_string()));
    }
    Method::from_bytes(upper.as_bytes()).map_err(|_| BuildError::InvalidMethod(raw.to_string()))
}

/// Result of dispatching one request.
pub enum Admission {
    /// No rule matched; the request passes through.
    Unmatched,
    /// The selected rule granted admission. Hold the permit until the request is done.
    Granted { rule: Arc<str>, permit: Permit },
    /// The selected rule refused admission after any retries.
    Rejected { rule: Arc<str> },
}

impl Admission {
    pub fn is_granted(&self) -> bool {
        matches!(self, Admission::Granted { .. })
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Admission::Rejected { .. })
    }

    /// Name of the selected rule, if any.
    pub fn rule(&self) -> Option<&str> {
        match self {
            Admission::Unmatched => None,
            Admission::Granted { rule, .. } | Admission::Rejected { rule } => Some(rule),
        }
    }
}

impl fmt::Debug for Admission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Admission::Unmatched => f.write_str("Unmatched"),
            Admission::Granted { rule, .. } => f.debug_struct("Granted").field("rule", rule).finish(),
            Admission::Rejected { rule } => f.debug_struct("Rejected").field("rule", rule).finish(),
        }
    }
}

/// Ordered rule list with first-match semantics.
///
/// Dropping the engine drops every rule and with it the background schedules of its limiters.
#[derive(Debug, Clone, Default)]
pub struct ThrottleEngine {
    rules: Vec<ThrottleRule>,
}

impl ThrottleEngine {
    /// Build every rule of `spec` in declaration order. Must be called within a tokio runtime
    /// when any rule uses a time-driven limiter.
    pub fn build(spec: &ThrottleSpec) -> Result<Self, BuildError> {
        let rules = spec
            .rules
            .iter()
            .enumerate()
            .map(|(index, rule)| ThrottleRule::from_spec(index, rule))
            .collect::<Result<Vec<_>, _>>()?;
        tracing::info!(rules = rules.len(), "throttle engine built");
        Ok(Self { rules })
    }

    pub fn from_rules(rules: Vec<ThrottleRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ThrottleRule] {
        &self.rules
    }

    /// The first rule accepting the request, if any.
    pub fn select(&self, method: &Method, path: &str) -> Option<&ThrottleRule> {
        self.rules.iter().find(|rule| rule.matches(method, path))
    }

    /// Dispatch one request: select a rule and run its limiter's admission.
    pub async fn admit(&self, method: &Method, path: &str, cancel: &CancellationToken) -> Admission {
        let Some(rule) = self.select(method, path) else {
            tracing::trace!(%method, path, "no throttle rule matched");
            return Admission::Unmatched;
        };

        let permit = rule.limiter.accept(cancel).await;
        if permit.is_granted() {
            tracing::trace!(rule = %rule.name, %method, path, "request admitted");
            Admission::Granted { rule: rule.name.clone(), permit }
        } else {
            tracing::debug!(rule = %rule.name, %method, path, "request throttled");
            Admission::Rejected { rule: rule.name.clone() }
        }
    }
}
