//! HTTP-level middleware (cross-cutting concerns).
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id)
//! - Access logging / request tracing (TraceLayer)
//! - Body size limits
//! - Global timeout
//!
//! Notes:
//! - The timeout must stay above `JWKS_FETCH_TIMEOUT_SECONDS`, otherwise a slow
//!   key refresh surfaces as 408 instead of a 401 with a fetch error logged.

use std::time::Duration;

use axum::Router;
use axum::error_handling::HandleErrorLayer;
use axum::http::{StatusCode, header::HeaderName};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

/// Requests are authorization probes; their bodies are never read.
const BODY_LIMIT: usize = 64 * 1024;

/// Apply HTTP-level middleware to the given Router.
///
/// `timeout` bounds the whole decision, including any key refetch.
pub fn apply(router: Router, timeout: Duration) -> Router {
    let request_id_header = HeaderName::from_static("x-request-id");

    let layers = ServiceBuilder::new()
        // Make the service error `Infallible` by turning layer errors into statuses.
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                tracing::warn!("authorization timed out");
                StatusCode::REQUEST_TIMEOUT
            } else {
                tracing::error!(error = %err, "unhandled middleware error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        // Generate a request id if the caller sent none, then echo it on the response.
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header))
        // Cap request bodies; the gateway never reads them.
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        // Bound the whole decision, a key refetch included.
        .layer(TimeoutLayer::new(timeout))
        // Access log / tracing for every request.
        .layer(TraceLayer::new_for_http());

    router.layer(layers)
}
