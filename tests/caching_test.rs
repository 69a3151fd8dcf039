mod common;

use std::time::Duration;

use axum::http::StatusCode;
use serde_json::json;
use tokio::task::JoinSet;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::*;

/// Issuer whose first answer publishes `before`, every later one `after`.
async fn rotating_issuer(before: &[&str], after: &[&str], delay: Duration) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(before)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(jwks(after))
                .set_delay(delay),
        )
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn startup_fetches_each_issuer_once() {
    let server = issuer(&["k1"]).await;
    let app = gateway(config(&[("JWT_ISSUER", jwks_url(&server).as_str())])).await;
    assert_eq!(fetch_count(&server).await, 1);

    let token = sign("k1", &json!({"sub": "u", "exp": epoch_in(60)}));
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(get_with_bearer("/", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(fetch_count(&server).await, 1);
}

#[tokio::test]
async fn unknown_kid_triggers_exactly_one_refetch() {
    let server = issuer(&["k1"]).await;
    let app = gateway(config(&[("JWT_ISSUER", jwks_url(&server).as_str())])).await;

    let token = sign("unknown", &json!({"sub": "u", "exp": epoch_in(60)}));
    let response = app.oneshot(get_with_bearer("/", &token)).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(fetch_count(&server).await, 2);
}

#[tokio::test]
async fn rotated_key_is_picked_up_on_first_use() {
    let server = rotating_issuer(&["old"], &["old", "new"], Duration::ZERO).await;
    let app = gateway(config(&[("JWT_ISSUER", jwks_url(&server).as_str())])).await;

    let token = sign("new", &json!({"sub": "u", "exp": epoch_in(60)}));
    let response = app
        .clone()
        .oneshot(get_with_bearer("/", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fetch_count(&server).await, 2);

    // Cached from now on.
    let response = app.oneshot(get_with_bearer("/", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(fetch_count(&server).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_share_one_refetch() {
    let server = rotating_issuer(&["old"], &["new"], Duration::from_millis(200)).await;
    let app = gateway(config(&[("JWT_ISSUER", jwks_url(&server).as_str())])).await;
    let token = sign("new", &json!({"sub": "u", "exp": epoch_in(60)}));

    let mut requests = JoinSet::new();
    for _ in 0..16 {
        let app = app.clone();
        let token = token.clone();
        requests.spawn(async move { app.oneshot(get_with_bearer("/", &token)).await });
    }

    while let Some(joined) = requests.join_next().await {
        let response = joined.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(fetch_count(&server).await, 2);
}

#[tokio::test]
async fn refetches_are_rate_limited_when_configured() {
    let server = issuer(&["k1"]).await;
    let app = gateway(config(&[
        ("JWT_ISSUER", jwks_url(&server).as_str()),
        ("JWKS_MIN_REFRESH_INTERVAL_SECONDS", "60"),
    ]))
    .await;

    let token = sign("unknown", &json!({"sub": "u", "exp": epoch_in(60)}));
    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(get_with_bearer("/", &token))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    assert_eq!(fetch_count(&server).await, 1);
}

#[tokio::test]
async fn unreachable_issuer_on_refetch_is_a_401() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(&["k1"])))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let app = gateway(config(&[("JWT_ISSUER", jwks_url(&server).as_str())])).await;

    let token = sign("k2", &json!({"sub": "u", "exp": epoch_in(60)}));
    let response = app
        .clone()
        .oneshot(get_with_bearer("/", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Known keys keep working while the issuer is down.
    let token = sign("k1", &json!({"sub": "u", "exp": epoch_in(60)}));
    let response = app.oneshot(get_with_bearer("/", &token)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn startup_fails_when_issuer_is_unreachable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let fetcher = jwt_gateway::services::auth::jwks::HttpKeyFetcher::new(Duration::from_secs(5))
        .unwrap();
    let config = config(&[("JWT_ISSUER", jwks_url(&server).as_str())]);
    let result =
        jwt_gateway::app::build_state(std::sync::Arc::new(config), std::sync::Arc::new(fetcher))
            .await;

    assert!(result.is_err());
}
