#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, Response, header};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use jwt_gateway::app::{build_router, build_state};
use jwt_gateway::config::Config;
use jwt_gateway::services::auth::jwks::HttpKeyFetcher;

/// RSA test key (DO NOT use in production) published in every mock key set.
pub const PRIMARY_PEM: &str = include_str!("../fixtures/primary_key.pem");
/// A second RSA key never published by any issuer.
pub const ROGUE_PEM: &str = include_str!("../fixtures/rogue_key.pem");

const PRIMARY_N: &str = "ALsQRtR6U2Rzjz2nsUAdntmN4nvzDwJpf2DX63LQk65cFi3HX1wSGL9VpGXbgzYYcB2WVYvLTfuozN-HwzMKNn3aXMlGpcz9K26Gv6I6sLfXh617zNafnowLWNU-aMxyHTODlnoiFbtTH5ZlPzC7l6HIWSCdx1RlgPmXnNwORIhhRET3nkgeiDfl5AlY-vWRyLbOIQTihiydiiqqE8kO8SVJ1QmkEYE7o62SmKfwH2V9Z7sJLPskdByMT2k2vDDDJzEHiQClQTBvghhTTo_jLurBrysD_jiWDvatlFiA0tyD1BeG_2p5YpqL3trok05P00Qpv7UMPK7uTkP0RJErMr0";

pub const JWKS_PATH: &str = "/.well-known/jwks.json";

/// JWKS document publishing the primary key under each of `kids`.
pub fn jwks(kids: &[&str]) -> Value {
    let keys: Vec<Value> = kids
        .iter()
        .map(|kid| {
            json!({
                "kty": "RSA",
                "use": "sig",
                "alg": "RS256",
                "kid": kid,
                "n": PRIMARY_N,
                "e": "AQAB",
            })
        })
        .collect();
    json!({ "keys": keys })
}

/// Mock issuer serving a fixed key set at [`JWKS_PATH`].
pub async fn issuer(kids: &[&str]) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(JWKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(jwks(kids)))
        .mount(&server)
        .await;
    server
}

pub fn jwks_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), JWKS_PATH)
}

/// Number of key set fetches the mock issuer has answered.
pub async fn fetch_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or_default()
}

pub fn sign(kid: &str, claims: &Value) -> String {
    sign_with(PRIMARY_PEM, kid, claims)
}

pub fn sign_with(pem: &str, kid: &str, claims: &Value) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("test key");
    jsonwebtoken::encode(&header, claims, &key).expect("sign token")
}

/// Seconds since the Unix epoch, shifted by `offset`.
pub fn epoch_in(offset: i64) -> i64 {
    chrono::Utc::now().timestamp() + offset
}

pub fn config(vars: &[(&str, &str)]) -> Config {
    let vars: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Config::from_lookup(|key| vars.get(key).cloned()).expect("valid test config")
}

/// Full gateway router (middleware included) wired against live mock issuers.
pub async fn gateway(config: Config) -> Router {
    let fetcher = HttpKeyFetcher::new(Duration::from_secs(5)).expect("http client");
    let state = build_state(Arc::new(config), Arc::new(fetcher))
        .await
        .expect("initial key fetch");
    build_router(state)
}

pub fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

pub fn get_with_bearer(uri: &str, token: &str) -> Request<Body> {
    Request::get(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .expect("request")
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    serde_json::from_slice(&bytes).expect("json body")
}
