//! Throttle rule specifications.
//!
//! These are the structured specs handed over by the configuration layer. They are plain serde
//! types; [`ThrottleEngine::build`](crate::ThrottleEngine::build) resolves them once into live
//! limiters. Unset fields take the gateway defaults.
//!
//! ```rust
//! use gatewarden::config::{LimiterSpec, ThrottleSpec};
//!
//! let spec = ThrottleSpec::from_json_str(r#"{
//!     "rules": [{
//!         "matcher": { "kind": "prefix", "patterns": ["/api/"] },
//!         "limiter": { "kind": "fixed_window", "limit": 50 }
//!     }]
//! }"#).unwrap();
//! assert_eq!(
//!     spec.rules[0].limiter,
//!     LimiterSpec::FixedWindow { window_size_ms: 1000, limit: 50 }
//! );
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::backoff::{
    Backoff, BackoffError, JitteredBackoff, DEFAULT_BASE_NANOS, DEFAULT_MAX_NANOS,
    DEFAULT_MIN_NANOS,
};
use crate::error::BuildError;
use crate::jitter::Jitter;
use crate::matcher::{PathMatcher, PatternKind};
use crate::rate_limit::{
    fixed_window, leaky_bucket, max_connections, token_bucket, FixedWindow, LeakyBucket,
    MaxConnections, RateLimiter, TokenBucket,
};

/// Ordered list of throttle rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ThrottleSpec {
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl ThrottleSpec {
    pub fn from_json_str(json: &str) -> Result<Self, BuildError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a JSON spec from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, BuildError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

/// One rule: which requests it selects and how they are admitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    /// Used in logs and rejection errors; defaults to `rule-<index>`.
    #[serde(default)]
    pub name: Option<String>,

    /// HTTP methods the rule applies to; empty means all methods.
    #[serde(default)]
    pub methods: Vec<String>,

    #[serde(default)]
    pub matcher: MatcherSpec,

    pub limiter: LimiterSpec,

    #[serde(default)]
    pub retry: Option<RetrySpec>,
}

/// Pattern type plus patterns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherSpec {
    #[serde(default)]
    pub kind: PatternKind,
    #[serde(default)]
    pub patterns: Vec<String>,
}

impl MatcherSpec {
    pub fn build(&self) -> Result<PathMatcher, BuildError> {
        PathMatcher::new(self.kind, self.patterns.iter().cloned())
    }
}

/// Exactly one limiter algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LimiterSpec {
    MaxConnections {
        #[serde(default = "default_max_conns")]
        max_conns: usize,
    },
    FixedWindow {
        #[serde(default = "default_window_size_ms")]
        window_size_ms: u64,
        #[serde(default = "default_window_limit")]
        limit: usize,
    },
    TokenBucket {
        #[serde(default = "default_token_bucket_size")]
        bucket_size: usize,
        #[serde(default = "default_fill_interval_ms")]
        fill_interval_ms: u64,
        #[serde(default = "default_fill_rate")]
        fill_rate: usize,
    },
    LeakyBucket {
        #[serde(default = "default_leaky_bucket_size")]
        bucket_size: usize,
        #[serde(default = "default_leak_interval_ms")]
        leak_interval_ms: u64,
        #[serde(default = "default_leak_rate")]
        leak_rate: usize,
    },
}

impl LimiterSpec {
    /// Instantiate the limiter. Time-driven limiters start their schedule here, so this must run
    /// inside a tokio runtime.
    pub fn build(&self) -> Result<Arc<dyn RateLimiter>, BuildError> {
        let limiter: Arc<dyn RateLimiter> = match *self {
            LimiterSpec::MaxConnections { max_conns } => Arc::new(MaxConnections::new(max_conns)?),
            LimiterSpec::FixedWindow { window_size_ms, limit } => {
                Arc::new(FixedWindow::new(limit, Duration::from_millis(window_size_ms))?)
            }
            LimiterSpec::TokenBucket { bucket_size, fill_interval_ms, fill_rate } => Arc::new(
                TokenBucket::new(bucket_size, fill_rate, Duration::from_millis(fill_interval_ms))?,
            ),
            LimiterSpec::LeakyBucket { bucket_size, leak_interval_ms, leak_rate } => Arc::new(
                LeakyBucket::new(bucket_size, leak_rate, Duration::from_millis(leak_interval_ms))?,
            ),
        };
        Ok(limiter)
    }
}

/// Retry parameters for a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrySpec {
    #[serde(default)]
    pub max_retry: usize,
    /// Defaults to exponential full jitter (base 2000ns, min 0, max 2^21ns).
    #[serde(default)]
    pub backoff: Option<BackoffSpec>,
}

/// Growth shape of the backoff ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    Constant,
    Linear,
    #[default]
    Exponential,
}

/// Backoff parameters; all durations are in nanoseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffSpec {
    #[serde(default)]
    pub strategy: BackoffStrategy,
    #[serde(default = "default_base_nanos")]
    pub base_nanos: u64,
    #[serde(default = "default_min_nanos")]
    pub min_nanos: u64,
    /// Ceiling for linear and exponential growth. When unset it is 2^21ns, raised to
    /// `base_nanos` if the base is larger. Ignored by `constant`.
    #[serde(default)]
    pub max_nanos: Option<u64>,
    #[serde(default)]
    pub jitter: Jitter,
}

impl Default for BackoffSpec {
    fn default() -> Self {
        Self {
            strategy: BackoffStrategy::default(),
            base_nanos: default_base_nanos(),
            min_nanos: default_min_nanos(),
            max_nanos: None,
            jitter: Jitter::default(),
        }
    }
}

impl BackoffSpec {
    /// The ceiling actually applied: `max_nanos` if set, else the default ceiling or the base,
    /// whichever is larger.
    pub fn effective_max_nanos(&self) -> u64 {
        self.max_nanos.unwrap_or_else(|| DEFAULT_MAX_NANOS.max(self.base_nanos))
    }

    pub fn build(&self) -> Result<JitteredBackoff, BuildError> {
        let base = Duration::from_nanos(self.base_nanos);
        let min = Duration::from_nanos(self.min_nanos);
        let max = Duration::from_nanos(self.effective_max_nanos());
        if min > max {
            return Err(BackoffError::MinGreaterThanMax { min, max }.into());
        }
        let backoff = match self.strategy {
            BackoffStrategy::Constant => Backoff::constant(base),
            BackoffStrategy::Linear => Backoff::linear(base).with_max(max)?,
            BackoffStrategy::Exponential => Backoff::exponential(base).with_max(max)?,
        };
        Ok(JitteredBackoff::new(backoff, self.jitter).with_min(min))
    }
}

fn default_max_conns() -> usize {
    max_connections::DEFAULT_MAX_CONNS
}

fn default_window_size_ms() -> u64 {
    fixed_window::DEFAULT_WINDOW.as_millis() as u64
}

fn default_window_limit() -> usize {
    fixed_window::DEFAULT_LIMIT
}

fn default_token_bucket_size() -> usize {
    token_bucket::DEFAULT_BUCKET_SIZE
}

fn default_fill_interval_ms() -> u64 {
    token_bucket::DEFAULT_FILL_INTERVAL.as_millis() as u64
}

fn default_fill_rate() -> usize {
    token_bucket::DEFAULT_FILL_RATE
}

fn default_leaky_bucket_size() -> usize {
    leaky_bucket::DEFAULT_BUCKET_SIZE
}

fn default_leak_interval_ms() -> u64 {
    leaky_bucket::DEFAULT_LEAK_INTERVAL.as_millis() as u64
}

fn default_leak_rate() -> usize {
    leaky_bucket::DEFAULT_LEAK_RATE
}

fn default_base_nanos() -> u64 {
    DEFAULT_BASE_NANOS
}

fn default_min_nanos() -> u64 {
    DEFAULT_MIN_NANOS
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::BackoffPolicy;

    fn limiter(json: &str) -> LimiterSpec {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn limiter_defaults_apply() {
        assert_eq!(
            limiter(r#"{"kind":"max_connections"}"#),
            LimiterSpec::MaxConnections { max_conns: 128 }
        );
        assert_eq!(
            limiter(r#"{"kind":"fixed_window"}"#),
            LimiterSpec::FixedWindow { window_size_ms: 1000, limit: 1000 }
        );
        assert_eq!(
            limiter(r#"{"kind":"token_bucket"}"#),
            LimiterSpec::TokenBucket { bucket_size: 1000, fill_interval_ms: 1000, fill_rate: 1000 }
        );
        assert_eq!(
            limiter(r#"{"kind":"leaky_bucket"}"#),
            LimiterSpec::LeakyBucket { bucket_size: 1000, leak_interval_ms: 1000, leak_rate: 200 }
        );
    }

    #[test]
    fn unknown_algorithm_is_a_config_error() {
        let err = ThrottleSpec::from_json_str(
            r#"{"rules":[{"limiter":{"kind":"sliding_log","limit":5}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn rule_fields_default_when_unset() {
        let spec = ThrottleSpec::from_json_str(r#"{"rules":[{"limiter":{"kind":"max_connections","max_conns":3}}]}"#)
            .unwrap();
        let rule = &spec.rules[0];
        assert!(rule.name.is_none());
        assert!(rule.methods.is_empty());
        assert_eq!(rule.matcher, MatcherSpec::default());
        assert!(rule.retry.is_none());
    }

    #[test]
    fn retry_without_backoff_uses_default_parameters() {
        let retry: RetrySpec = serde_json::from_str(r#"{"max_retry":2}"#).unwrap();
        assert_eq!(retry.max_retry, 2);
        assert!(retry.backoff.is_none());

        let backoff: BackoffSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(backoff, BackoffSpec::default());
        assert_eq!(backoff.base_nanos, 2000);
        assert_eq!(backoff.min_nanos, 0);
        assert_eq!(backoff.max_nanos, None);
        assert_eq!(backoff.effective_max_nanos(), 1 << 21);
        assert_eq!(backoff.strategy, BackoffStrategy::Exponential);
        assert_eq!(backoff.jitter, Jitter::Full);
    }

    #[test]
    fn backoff_spec_rejects_inverted_bounds() {
        let spec = BackoffSpec { min_nanos: 10, max_nanos: Some(5), ..BackoffSpec::default() };
        assert!(matches!(spec.build(), Err(BuildError::Backoff(BackoffError::MinGreaterThanMax { .. }))));
    }

    #[test]
    fn large_base_without_max_still_builds() {
        for strategy in ["exponential", "linear"] {
            let spec: BackoffSpec = serde_json::from_str(&format!(
                r#"{{"strategy":"{}","base_nanos":5000000,"jitter":"none"}}"#,
                strategy
            ))
            .unwrap();
            assert_eq!(spec.effective_max_nanos(), 5_000_000);
            let policy = spec.build().unwrap();
            assert_eq!(policy.delay(1), Duration::from_millis(5));
            assert_eq!(policy.delay(4), Duration::from_millis(5));
        }
    }

    #[test]
    fn explicit_max_below_base_is_still_an_error() {
        let spec = BackoffSpec {
            base_nanos: 5_000_000,
            max_nanos: Some(1_000_000),
            ..BackoffSpec::default()
        };
        assert!(matches!(spec.build(), Err(BuildError::Backoff(BackoffError::MaxLessThanBase { .. }))));
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ThrottleSpec::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, BuildError::Io(_)));
    }

    #[tokio::test]
    async fn limiter_spec_builds_the_selected_algorithm() {
        let built = limiter(r#"{"kind":"leaky_bucket","leak_rate":5}"#).build().unwrap();
        assert_eq!(built.kind(), "leaky_bucket");
        let built = limiter(r#"{"kind":"token_bucket"}"#).build().unwrap();
        assert_eq!(built.kind(), "token_bucket");
    }

    #[tokio::test]
    async fn zero_window_fails_to_build() {
        let err = limiter(r#"{"kind":"fixed_window","window_size_ms":0}"#).build().unwrap_err();
        assert!(matches!(err, BuildError::InvalidLimiter { .. }));
    }
}
