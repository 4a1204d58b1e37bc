//! Tower middleware that puts a [`ThrottleEngine`] in front of an HTTP handler.
//!
//! Each request is dispatched through the engine before the wrapped service is called. A
//! rejection short-circuits with [`ThrottleError::TooManyRequests`]; formatting the 429 response
//! is left to whatever error handling sits above this layer. On a grant the permit lives inside
//! the response future, so it is released when the handler finishes, fails, panics or is dropped.
//!
//! If an upstream layer inserted a [`CancellationToken`] into the request extensions, admission
//! waits honor it. Otherwise a fresh token is used and cancellation happens only by dropping the
//! response future.
//!
//! ```rust
//! use std::sync::Arc;
//! use gatewarden::{MaxConnections, PathMatcher, ThrottleEngine, ThrottleLayer, ThrottleRule};
//! use tower::{service_fn, ServiceBuilder, ServiceExt};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let engine = Arc::new(ThrottleEngine::from_rules(vec![ThrottleRule::new(
//!     "closed",
//!     Arc::new(PathMatcher::any()),
//!     Arc::new(MaxConnections::new(0).unwrap()),
//! )]));
//! let svc = ServiceBuilder::new()
//!     .layer(ThrottleLayer::new(engine))
//!     .service(service_fn(|_req: http::Request<()>| async {
//!         Ok::<_, std::io::Error>("ok")
//!     }));
//!
//! let err = svc.oneshot(http::Request::new(())).await.unwrap_err();
//! assert_eq!(err.status(), Some(http::StatusCode::TOO_MANY_REQUESTS));
//! # });
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tokio_util::sync::CancellationToken;
use tower_layer::Layer;
use tower_service::Service;

use crate::error::ThrottleError;
use crate::throttle::{Admission, ThrottleEngine};

/// Layer wrapping services in a [`ThrottleService`].
#[derive(Debug, Clone)]
pub struct ThrottleLayer {
    engine: Arc<ThrottleEngine>,
}

impl ThrottleLayer {
    pub fn new(engine: Arc<ThrottleEngine>) -> Self {
        Self { engine }
    }
}

impl<S> Layer<S> for ThrottleLayer {
    type Service = ThrottleService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        ThrottleService { inner, engine: self.engine.clone() }
    }
}

/// Service applying first-match throttling to `http::Request`s.
#[derive(Debug, Clone)]
pub struct ThrottleService<S> {
    inner: S,
    engine: Arc<ThrottleEngine>,
}

impl<S> ThrottleService<S> {
    pub fn new(inner: S, engine: Arc<ThrottleEngine>) -> Self {
        Self { inner, engine }
    }

    pub fn engine(&self) -> &Arc<ThrottleEngine> {
        &self.engine
    }
}

impl<S, B> Service<http::Request<B>> for ThrottleService<S>
where
    S: Service<http::Request<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
    S::Response: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = ThrottleError<S::Error>;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(ThrottleError::Inner)
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        let engine = self.engine.clone();
        // keep the instance that was driven to readiness
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let cancel =
                req.extensions().get::<CancellationToken>().cloned().unwrap_or_default();

            let admission = engine.admit(req.method(), req.uri().path(), &cancel).await;
            match admission {
                Admission::Unmatched => inner.call(req).await.map_err(ThrottleError::Inner),
                Admission::Granted { permit, .. } => {
                    let result = inner.call(req).await.map_err(ThrottleError::Inner);
                    permit.release();
                    result
                }
                Admission::Rejected { rule } => {
                    Err(ThrottleError::TooManyRequests { rule: rule.to_string() })
                }
            }
        })
    }
}
