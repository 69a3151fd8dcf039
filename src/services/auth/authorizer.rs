//! Per-request authorization flow.
//!
//! ```text
//! OPTIONS ───────────────────────────────────────────────▶ Preflight
//! passthrough policy ── Allowed ─────────────────────────▶ Passthrough
//!        └─ Denied ─▶ token extraction ── none ──────────▶ NoCredentialsSupplied
//!                          └─▶ issuer resolution ── none ─▶ IssuerNotFound
//!                                 └─▶ decode ── error ────▶ (decode error)
//!                                       └─▶ expiry check ─▶ Verified(claims)
//! ```
use axum::http::{HeaderMap, HeaderName, Method, header};
use chrono::{DateTime, Utc};

use crate::services::auth::claims::Claims;
use crate::services::auth::error::AuthError;
use crate::services::auth::expiry::Expiry;
use crate::services::auth::issuer::IssuerResolver;
use crate::services::auth::passthrough::{PassthroughDecision, PassthroughPolicy};
use crate::services::auth::token::TokenDecoder;

const BEARER_PREFIX: &str = "Bearer ";
pub(crate) const TOKEN_QUERY_PARAMS: [&str; 2] = ["token", "bearer_token"];

/// The parts of an inbound request the flow looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestInfo<'a> {
    pub method: &'a Method,
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// CORS preflight; never verified.
    Preflight,
    /// Basic credentials in the named header were accepted by policy.
    Passthrough { header: HeaderName },
    /// Signature-valid (and, if enabled, unexpired) token.
    Verified(Claims),
}

#[derive(Debug)]
pub struct Authorizer {
    resolver: IssuerResolver,
    decoder: TokenDecoder,
    passthrough: PassthroughPolicy,
    check_expiry: bool,
}

impl Authorizer {
    pub fn new(
        resolver: IssuerResolver,
        decoder: TokenDecoder,
        passthrough: PassthroughPolicy,
        check_expiry: bool,
    ) -> Self {
        Self {
            resolver,
            decoder,
            passthrough,
            check_expiry,
        }
    }

    pub async fn authorize(&self, request: &RequestInfo<'_>) -> Result<Outcome, AuthError> {
        self.authorize_at(request, Utc::now()).await
    }

    /// Same as [`Authorizer::authorize`] with an explicit clock for the expiry check.
    pub async fn authorize_at(
        &self,
        request: &RequestInfo<'_>,
        now: DateTime<Utc>,
    ) -> Result<Outcome, AuthError> {
        if *request.method == Method::OPTIONS {
            return Ok(Outcome::Preflight);
        }

        match self.passthrough.evaluate(request.path, request.headers) {
            PassthroughDecision::Allowed { header } => return Ok(Outcome::Passthrough { header }),
            PassthroughDecision::Denied(reason) => {
                tracing::debug!(path = request.path, %reason, "basic auth not allowed");
            }
        }

        let token = extract_token(request.headers, request.query)
            .ok_or(AuthError::NoCredentialsSupplied)?;

        let issuer = self
            .resolver
            .resolve(request.path)
            .ok_or_else(|| AuthError::IssuerNotFound {
                path: request.path.to_string(),
            })?;

        let claims = self.decoder.decode(&token, issuer).await?;

        if self.check_expiry {
            Expiry::from_claims(&claims)?.check(now)?;
        }

        Ok(Outcome::Verified(claims))
    }
}

/// Bearer token from the `Authorization` header, else the `token` query
/// parameter, else `bearer_token`. Empty values are skipped.
pub fn extract_token(headers: &HeaderMap, query: Option<&str>) -> Option<String> {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix(BEARER_PREFIX).unwrap_or(v).trim())
        .filter(|v| !v.is_empty());
    if let Some(token) = from_header {
        return Some(token.to_string());
    }

    let query = query?;
    TOKEN_QUERY_PARAMS.iter().find_map(|name| {
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty())
    })
}
