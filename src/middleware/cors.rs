//! CORS headers for browser clients.
//!
//! Responsibility:
//! - Answer preflights before they reach the authorizer.
//! - Attach the same fixed header set to every response.
//!
//! Policy:
//! - Any origin, WITHOUT credentials. The gateway only ever answers with a
//!   status and a claims header; the upstream owns the real CORS decision.

use std::time::Duration;

use axum::Router;
use axum::http::{Method, header};
use tower_http::cors::{Any, CorsLayer};

/// Preflight cache lifetime advertised to browsers (20 days).
const MAX_AGE: Duration = Duration::from_secs(1_728_000);

/// Apply CORS policy to the given Router.
pub fn apply(router: Router) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::DELETE,
            Method::PUT,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION])
        .max_age(MAX_AGE);

    router.layer(cors)
}
