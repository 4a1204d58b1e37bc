use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gatewarden::{
    MaxConnections, PathMatcher, ThrottleEngine, ThrottleLayer, ThrottleRule, TokenBucket,
};

use http::Method;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::{service_fn, Service, ServiceBuilder};

fn max_connections_allow_now(c: &mut Criterion) {
    let limiter = MaxConnections::new(1024).unwrap();

    c.bench_function("max_connections_allow_now_uncontended", |b| {
        b.iter(|| {
            let permit = black_box(limiter.allow_now());
            permit.release();
        });
    });
}

fn token_bucket_allow_now(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let _enter = rt.enter();
    // refills far faster than the loop can drain, so most iterations are grants
    let bucket = TokenBucket::new(1_000_000, 1_000_000, Duration::from_millis(1)).unwrap();

    c.bench_function("token_bucket_allow_now_uncontended", |b| {
        b.iter(|| black_box(bucket.allow_now()).is_granted());
    });
}

fn engine_dispatch(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    // ten rules that never match ahead of the one that does
    let mut rules: Vec<ThrottleRule> = (0..10)
        .map(|i| {
            ThrottleRule::new(
                format!("miss-{}", i),
                Arc::new(PathMatcher::prefix([format!("/svc{}/", i)])),
                Arc::new(MaxConnections::new(1).unwrap()),
            )
        })
        .collect();
    rules.push(ThrottleRule::new(
        "api",
        Arc::new(PathMatcher::prefix(["/api/"])),
        Arc::new(MaxConnections::new(1024).unwrap()),
    ));
    let engine = Arc::new(ThrottleEngine::from_rules(rules));
    let cancel = CancellationToken::new();

    c.bench_function("engine_admit_eleventh_rule", |b| {
        b.to_async(&rt).iter(|| async {
            let admission = engine.admit(&Method::GET, black_box("/api/users"), &cancel).await;
            black_box(admission.is_granted());
        });
    });

    let svc = ServiceBuilder::new()
        .layer(ThrottleLayer::new(engine.clone()))
        .service(service_fn(|_req: http::Request<()>| async { Ok::<_, Infallible>(()) }));

    c.bench_function("throttle_service_call", |b| {
        b.to_async(&rt).iter(|| async {
            let mut local_svc = svc.clone();
            let req = http::Request::get("/api/users").body(()).unwrap();
            let _ = black_box(local_svc.call(req)).await;
        });
    });
}

criterion_group!(benches, max_connections_allow_now, token_bucket_allow_now, engine_dispatch);
criterion_main!(benches);
