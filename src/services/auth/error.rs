use axum::http::StatusCode;
use thiserror::Error;

use crate::services::auth::expiry::ExpiryError;
use crate::services::auth::issuer::IssuerId;
use crate::services::auth::jwks::FetchError;
use crate::services::auth::key_set_cache::KeySetError;

/// Request-scoped authentication failures.
///
/// None of these terminate the process: the HTTP layer turns every variant into
/// a 401 response, except the server-side defects reported by [`AuthError::status`].
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("could not read jwt: {0}")]
    Parse(#[source] jsonwebtoken::errors::Error),
    #[error("missing 'kid' in the token header")]
    KeyIdMissing,
    #[error("can not find token's key id '{kid}' in jwk set")]
    KeyNotFound { kid: String },
    #[error("unable to retrieve key set: {0}")]
    FetchFailed(#[source] FetchError),
    #[error("only RSA keys are supported, got: {0}")]
    UnsupportedKey(String),
    #[error("signature verification failed: {0}")]
    InvalidSignature(#[source] jsonwebtoken::errors::Error),
    #[error("neither 'exp' nor 'expires_at' was provided in the token payload")]
    MissingExpiry,
    #[error("invalid '{0}' claim")]
    InvalidExpiry(&'static str),
    #[error("unable to parse 'expires_at' value '{value}' as RFC 3339: {source}")]
    MalformedTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("token is expired (expired at {expired_at})")]
    TokenExpired { expired_at: chrono::DateTime<chrono::Utc> },
    #[error("could not find jwt issuer for path {path}")]
    IssuerNotFound { path: String },
    #[error("issuer '{0}' has no key set configured")]
    UnknownIssuer(IssuerId),
    #[error("unable to retrieve jwt from authorization header or query parameter")]
    NoCredentialsSupplied,
}

impl AuthError {
    /// HTTP status the boundary layer should answer with.
    ///
    /// A malformed `expires_at` is a data-quality problem on the issuer side and an
    /// unknown issuer id is a wiring bug, so both are reported as 500.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedTimestamp { .. } | Self::UnknownIssuer(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            _ => StatusCode::UNAUTHORIZED,
        }
    }
}

impl From<KeySetError> for AuthError {
    fn from(e: KeySetError) -> Self {
        match e {
            KeySetError::KeyNotFound { kid } => Self::KeyNotFound { kid },
            KeySetError::FetchFailed(cause) => Self::FetchFailed(cause),
            KeySetError::UnknownIssuer(issuer) => Self::UnknownIssuer(issuer),
        }
    }
}

impl From<ExpiryError> for AuthError {
    fn from(e: ExpiryError) -> Self {
        match e {
            ExpiryError::Missing => Self::MissingExpiry,
            ExpiryError::InvalidClaim(name) => Self::InvalidExpiry(name),
            ExpiryError::MalformedTimestamp { value, source } => {
                Self::MalformedTimestamp { value, source }
            }
            ExpiryError::Expired { expired_at } => Self::TokenExpired { expired_at },
        }
    }
}
