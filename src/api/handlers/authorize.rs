/*
 * Responsibility
 * - Catch-all handler: run the Authorizer and turn its outcome into the HTTP answer
 *   - 200 (+ claims header) on success / preflight / basic auth passthrough
 *   - 401 or 500 with a JSON error body on rejection
 * - One log line per decision with enough request metadata to reconstruct it
 *   (query tokens redacted)
 */
use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderValue, StatusCode, header, request::Parts},
    response::{IntoResponse, Response},
};
use tracing::Instrument;

use crate::error::{AppError, ErrorShape};
use crate::services::auth::authorizer::TOKEN_QUERY_PARAMS;
use crate::services::auth::{Outcome, RequestInfo};
use crate::state::AppState;

pub async fn authorize(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let (parts, _body) = request.into_parts();
    let span = tracing::info_span!(
        "authorize",
        remote_addr = %remote_addr(&parts),
        host = header_str(&parts, header::HOST),
        method = %parts.method,
        path = parts.uri.path(),
        query = %redacted_query(parts.uri.query()),
        user_agent = header_str(&parts, header::USER_AGENT),
    );

    decide(&state, &parts).instrument(span).await
}

async fn decide(state: &AppState, parts: &Parts) -> Result<Response, AppError> {
    let path = parts.uri.path();
    let shape = ErrorShape::for_path(path, &state.config.new_error_message_regex);

    let request = RequestInfo {
        method: &parts.method,
        path,
        query: parts.uri.query(),
        headers: &parts.headers,
    };

    let outcome = match state.authorizer.authorize(&request).await {
        Ok(outcome) => outcome,
        Err(err) => {
            let status = err.status();
            if status.is_server_error() {
                tracing::error!(status = status.as_u16(), error = %err, "authorization failed");
            } else {
                tracing::warn!(status = status.as_u16(), error = %err, "authorization failed");
            }
            return Err(AppError::from_auth(&err, shape));
        }
    };

    match outcome {
        Outcome::Preflight => {
            tracing::info!(status = 200, "CORS request ok");
            Ok(StatusCode::OK.into_response())
        }
        Outcome::Passthrough { header } => {
            tracing::info!(status = 200, header = %header, "basic auth allowed");
            Ok(StatusCode::OK.into_response())
        }
        Outcome::Verified(claims) => {
            let payload = claims.to_json().map_err(|err| {
                tracing::error!(status = 500, error = %err, "unable to serialize claims");
                AppError::Internal(shape)
            })?;
            let value = HeaderValue::from_bytes(payload.as_bytes()).map_err(|err| {
                tracing::error!(status = 500, error = %err, "claims are not a valid header value");
                AppError::Internal(shape)
            })?;

            tracing::debug!(claims = %payload, header = %state.config.outbound_header, "adding payload");
            tracing::info!(status = 200, subject = claims.subject(), "authentication success");

            let mut response = StatusCode::OK.into_response();
            response
                .headers_mut()
                .insert(state.config.outbound_header.clone(), value);
            Ok(response)
        }
    }
}

fn remote_addr(parts: &Parts) -> String {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default()
}

const REDACTED: &str = "REDACTED";

fn redacted_query(query: Option<&str>) -> String {
    let Some(query) = query else {
        return String::new();
    };

    let mut redacted = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        if TOKEN_QUERY_PARAMS.iter().any(|name| *name == key) {
            redacted.append_pair(&key, REDACTED);
        } else {
            redacted.append_pair(&key, &value);
        }
    }
    redacted.finish()
}

fn header_str(parts: &Parts, name: header::HeaderName) -> &str {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}
