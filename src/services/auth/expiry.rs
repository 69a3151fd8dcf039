//! Token expiry in either of the two encodings issuers use.
//!
//! - `exp`: Unix epoch seconds (RFC 7519). Takes precedence when present.
//! - `expires_at`: an RFC 3339 timestamp string. Non-standard but emitted by some issuers.
use chrono::{DateTime, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::services::auth::claims::Claims;

#[derive(Debug, Error)]
pub enum ExpiryError {
    #[error("neither 'exp' nor 'expires_at' is present")]
    Missing,
    #[error("'{0}' claim has an unexpected type or range")]
    InvalidClaim(&'static str),
    #[error("'expires_at' value '{value}' is not RFC 3339: {source}")]
    MalformedTimestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    #[error("token expired at {expired_at}")]
    Expired { expired_at: DateTime<Utc> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expiry {
    Epoch(i64),
    Rfc3339(String),
}

impl Expiry {
    pub fn from_claims(claims: &Claims) -> Result<Self, ExpiryError> {
        if let Some(exp) = claims.get("exp") {
            return epoch_seconds(exp)
                .map(Self::Epoch)
                .ok_or(ExpiryError::InvalidClaim("exp"));
        }

        match claims.get("expires_at") {
            Some(Value::String(s)) => Ok(Self::Rfc3339(s.clone())),
            Some(_) => Err(ExpiryError::InvalidClaim("expires_at")),
            None => Err(ExpiryError::Missing),
        }
    }

    /// Normalize to a UTC instant.
    pub fn instant(&self) -> Result<DateTime<Utc>, ExpiryError> {
        match self {
            Self::Epoch(seconds) => {
                DateTime::from_timestamp(*seconds, 0).ok_or(ExpiryError::InvalidClaim("exp"))
            }
            Self::Rfc3339(value) => DateTime::parse_from_rfc3339(value)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|source| ExpiryError::MalformedTimestamp {
                    value: value.clone(),
                    source,
                }),
        }
    }

    /// Expired only when the instant is strictly before `now`; equality is still valid.
    pub fn check(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>, ExpiryError> {
        let expires_at = self.instant()?;
        if expires_at < now {
            return Err(ExpiryError::Expired {
                expired_at: expires_at,
            });
        }
        Ok(expires_at)
    }
}

// Integral seconds, or a float truncated toward zero.
fn epoch_seconds(value: &Value) -> Option<i64> {
    let Value::Number(n) = value else {
        return None;
    };
    n.as_i64().or_else(|| {
        n.as_f64()
            .filter(|f| f.is_finite() && *f >= i64::MIN as f64 && *f <= i64::MAX as f64)
            .map(|f| f.trunc() as i64)
    })
}
