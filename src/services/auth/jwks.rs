//! JWKS retrieval from an issuer URL.
//!
//! The fetcher performs exactly one GET per call. Retry policy belongs to the
//! caller ([`KeySetCache`](crate::services::auth::key_set_cache::KeySetCache)).
use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to issuer failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("issuer answered with status {0}")]
    Status(u16),
    #[error("malformed key set document: {0}")]
    Json(#[from] serde_json::Error),
    /// A concurrent request's fetch for the same issuer failed with this cause.
    #[error("shared key set fetch failed: {0}")]
    Shared(String),
}

/// Source of key sets. Implementations must be shareable across request tasks.
#[async_trait]
pub trait KeyFetcher: Send + Sync + 'static {
    async fn fetch(&self, url: &Url) -> Result<JwkSet, FetchError>;
}

/// `reqwest`-backed fetcher with a bounded per-request timeout.
#[derive(Clone, Debug)]
pub struct HttpKeyFetcher {
    client: Client,
}

impl HttpKeyFetcher {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl KeyFetcher for HttpKeyFetcher {
    async fn fetch(&self, url: &Url) -> Result<JwkSet, FetchError> {
        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let jwks = parse_key_set(&body)?;

        tracing::info!(issuer = %url, keys = jwks.keys.len(), "retrieved key set");

        Ok(jwks)
    }
}

// `keys` is optional on the wire; a document without it is an empty set.
#[derive(Debug, Deserialize)]
struct KeySetDocument {
    #[serde(default)]
    keys: Vec<Jwk>,
}

/// Parse a JWKS document. An empty (or whitespace-only) body is an empty key set.
pub fn parse_key_set(body: &[u8]) -> Result<JwkSet, serde_json::Error> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(JwkSet { keys: Vec::new() });
    }

    let document: KeySetDocument = serde_json::from_slice(body)?;
    Ok(JwkSet {
        keys: document.keys,
    })
}
