#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Gatewarden
//!
//! Admission control for API gateways: decide, per request, whether it may proceed now, must
//! wait, or is refused with 429 Too Many Requests.
//!
//! ## Features
//!
//! - **Four limiters**: max in-flight connections, fixed window, token bucket, leaky bucket
//! - **Retry decorator** with exponential full-jitter backoff and cancellation
//! - **First-match dispatch** over ordered rules keyed by method and path
//! - **Lock-free inventory** using atomics, one background task per time-driven limiter
//! - **Tower middleware** for `http::Request` handlers
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use gatewarden::{ThrottleEngine, ThrottleLayer, ThrottleSpec};
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! #[tokio::main]
//! async fn main() {
//!     let spec = ThrottleSpec::from_json_str(r#"{
//!         "rules": [{
//!             "name": "api",
//!             "methods": ["GET", "POST"],
//!             "matcher": { "kind": "prefix", "patterns": ["/api/"] },
//!             "limiter": { "kind": "token_bucket", "bucket_size": 100, "fill_rate": 50 },
//!             "retry": { "max_retry": 3 }
//!         }]
//!     }"#).unwrap();
//!     let engine = Arc::new(ThrottleEngine::build(&spec).unwrap());
//!
//!     let svc = ServiceBuilder::new()
//!         .layer(ThrottleLayer::new(engine))
//!         .service(service_fn(|_req: http::Request<()>| async {
//!             Ok::<_, std::io::Error>("hello")
//!         }));
//!
//!     let req = http::Request::get("/api/users").body(()).unwrap();
//!     assert_eq!(svc.oneshot(req).await.unwrap(), "hello");
//! }
//! ```

pub mod backoff;
pub mod config;
pub mod error;
pub mod jitter;
pub mod matcher;
pub mod middleware;
pub mod prelude;
pub mod rate_limit;
pub mod retry;
pub mod sleeper;
pub mod throttle;

// Re-exports
pub use backoff::{Backoff, BackoffError, BackoffPolicy, JitteredBackoff};
pub use config::{LimiterSpec, RuleSpec, ThrottleSpec};
pub use error::{BuildError, ThrottleError};
pub use jitter::Jitter;
pub use matcher::{Matcher, PathMatcher, PatternKind};
pub use middleware::{ThrottleLayer, ThrottleService};
pub use rate_limit::{FixedWindow, LeakyBucket, MaxConnections, Permit, RateLimiter, TokenBucket};
pub use retry::{RetryLimiter, RetryLimiterBuilder};
pub use sleeper::{Sleeper, TokioSleeper};
pub use throttle::{Admission, ThrottleEngine, ThrottleRule};
