//! Building engines from JSON rule specifications.
use gatewarden::prelude::*;
use gatewarden::config::BackoffStrategy;

const FULL_SPEC: &str = r#"{
    "rules": [
        {
            "name": "api",
            "methods": ["GET", "post"],
            "matcher": { "kind": "prefix", "patterns": ["/api/"] },
            "limiter": { "kind": "token_bucket", "bucket_size": 100, "fill_interval_ms": 1000, "fill_rate": 50 },
            "retry": { "max_retry": 3, "backoff": { "strategy": "exponential", "base_nanos": 2000, "min_nanos": 0, "max_nanos": 2097152, "jitter": "full" } }
        },
        {
            "name": "users",
            "matcher": { "kind": "regex", "patterns": ["^/users/[0-9]+$"] },
            "limiter": { "kind": "leaky_bucket" }
        },
        {
            "limiter": { "kind": "max_connections", "max_conns": 16 }
        }
    ]
}"#;

#[tokio::test]
async fn builds_every_rule_in_order() {
    let spec = ThrottleSpec::from_json_str(FULL_SPEC).unwrap();
    let engine = ThrottleEngine::build(&spec).unwrap();

    let summary: Vec<(&str, &str)> =
        engine.rules().iter().map(|r| (r.name(), r.limiter().kind())).collect();
    assert_eq!(
        summary,
        vec![("api", "token_bucket"), ("users", "leaky_bucket"), ("rule-2", "max_connections")]
    );
    assert_eq!(engine.rules()[0].methods(), &[http::Method::GET, http::Method::POST]);

    let get = http::Method::GET;
    assert_eq!(engine.select(&get, "/api/v1").map(ThrottleRule::name), Some("api"));
    assert_eq!(engine.select(&get, "/users/7").map(ThrottleRule::name), Some("users"));
    assert_eq!(engine.select(&get, "/users/me").map(ThrottleRule::name), Some("rule-2"));
    assert_eq!(engine.select(&http::Method::DELETE, "/api/v1").map(ThrottleRule::name), Some("rule-2"));
}

#[test]
fn unset_fields_take_gateway_defaults() {
    let spec = ThrottleSpec::from_json_str(
        r#"{"rules":[{"limiter":{"kind":"token_bucket","fill_rate":5},"retry":{"max_retry":1,"backoff":{}}}]}"#,
    )
    .unwrap();
    let rule = &spec.rules[0];
    assert_eq!(
        rule.limiter,
        LimiterSpec::TokenBucket { bucket_size: 1000, fill_interval_ms: 1000, fill_rate: 5 }
    );
    assert_eq!(rule.matcher.kind, PatternKind::Prefix);
    let backoff = rule.retry.as_ref().unwrap().backoff.as_ref().unwrap();
    assert_eq!(backoff.strategy, BackoffStrategy::Exponential);
    assert_eq!((backoff.base_nanos, backoff.min_nanos), (2000, 0));
    assert_eq!(backoff.effective_max_nanos(), 1 << 21);
    assert_eq!(backoff.jitter, Jitter::Full);
}

#[tokio::test]
async fn invalid_regex_fails_the_build() {
    let spec = ThrottleSpec::from_json_str(
        r#"{"rules":[{"matcher":{"kind":"regex","patterns":["/ok","[unterminated"]},"limiter":{"kind":"max_connections"}}]}"#,
    )
    .unwrap();
    match ThrottleEngine::build(&spec) {
        Err(BuildError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "[unterminated"),
        other => panic!("expected InvalidPattern, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn zero_fill_rate_fails_the_build() {
    let spec = ThrottleSpec::from_json_str(
        r#"{"rules":[{"limiter":{"kind":"token_bucket","fill_rate":0}}]}"#,
    )
    .unwrap();
    let err = ThrottleEngine::build(&spec).unwrap_err();
    assert!(matches!(err, BuildError::InvalidLimiter { kind: "token_bucket", .. }));
}

#[test]
fn time_driven_limiters_need_a_runtime() {
    let spec = ThrottleSpec::from_json_str(r#"{"rules":[{"limiter":{"kind":"fixed_window"}}]}"#)
        .unwrap();
    let err = ThrottleEngine::build(&spec).unwrap_err();
    assert!(matches!(err, BuildError::NoRuntime));

    // no schedule, no runtime needed
    let spec =
        ThrottleSpec::from_json_str(r#"{"rules":[{"limiter":{"kind":"max_connections"}}]}"#)
            .unwrap();
    assert!(ThrottleEngine::build(&spec).is_ok());
}

#[tokio::test]
async fn loads_from_file() {
    let path = std::env::temp_dir().join(format!("gatewarden-spec-{}.json", std::process::id()));
    std::fs::write(&path, FULL_SPEC).unwrap();
    let loaded = ThrottleSpec::from_file(&path);
    std::fs::remove_file(&path).unwrap();

    let spec = loaded.unwrap();
    assert_eq!(spec.rules.len(), 3);
    assert_eq!(spec.rules[0].name.as_deref(), Some("api"));
}

#[test]
fn malformed_json_is_a_config_error() {
    let err = ThrottleSpec::from_json_str("{ rules: [").unwrap_err();
    assert!(matches!(err, BuildError::Config(_)));
    assert!(err.to_string().starts_with("malformed throttle configuration"));
}
