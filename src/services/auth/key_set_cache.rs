//! Per-issuer key-set cache with refetch-on-miss.
//!
//! Each issuer owns one entry:
//! - `current`: the last fetched set, swapped wholesale behind an `RwLock<Arc<_>>`
//!   so readers never observe a partially written set.
//! - `refresh`: a mutex held for the duration of a fetch. Concurrent misses queue on
//!   it and, once inside, see that an attempt finished while they waited: they
//!   reuse the new set, or share the failure, instead of fetching again.
//!
//! Keys are refreshed strictly on demand; there is no background task.
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};

use crate::services::auth::issuer::{IssuerId, IssuerRecord};
use crate::services::auth::jwks::{FetchError, KeyFetcher};

#[derive(Debug, Error)]
pub enum KeySetError {
    #[error("key id '{kid}' not found in key set")]
    KeyNotFound { kid: String },
    #[error("unable to fetch key set: {0}")]
    FetchFailed(#[from] FetchError),
    #[error("issuer '{0}' is not configured")]
    UnknownIssuer(IssuerId),
}

struct CachedKeySet {
    keys: JwkSet,
    generation: u64,
}

impl CachedKeySet {
    fn empty() -> Self {
        Self {
            keys: JwkSet { keys: Vec::new() },
            generation: 0,
        }
    }

    fn find(&self, kid: &str) -> Option<Jwk> {
        self.keys.find(kid).cloned()
    }
}

#[derive(Default)]
struct RefreshState {
    // Start of the last fetch attempt (successful or not).
    last_attempt: Option<Instant>,
    // Cause of the last attempt, if it failed.
    last_failure: Option<String>,
}

struct IssuerEntry {
    record: IssuerRecord,
    current: RwLock<Arc<CachedKeySet>>,
    refresh: Mutex<RefreshState>,
    // Finished fetch attempts; only bumped while `refresh` is held.
    attempts: AtomicU64,
}

impl IssuerEntry {
    fn new(record: IssuerRecord) -> Self {
        Self {
            record,
            current: RwLock::new(Arc::new(CachedKeySet::empty())),
            refresh: Mutex::new(RefreshState::default()),
            attempts: AtomicU64::new(0),
        }
    }

    async fn snapshot(&self) -> Arc<CachedKeySet> {
        Arc::clone(&*self.current.read().await)
    }
}

pub struct KeySetCache {
    entries: HashMap<IssuerId, IssuerEntry>,
    fetcher: Arc<dyn KeyFetcher>,
    min_refresh_interval: Duration,
}

impl std::fmt::Debug for KeySetCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeySetCache")
            .field("issuers", &self.entries.keys().collect::<Vec<_>>())
            .field("min_refresh_interval", &self.min_refresh_interval)
            .finish()
    }
}

impl KeySetCache {
    /// `min_refresh_interval` of zero disables refetch rate limiting.
    pub fn new(
        issuers: impl IntoIterator<Item = IssuerRecord>,
        fetcher: Arc<dyn KeyFetcher>,
        min_refresh_interval: Duration,
    ) -> Self {
        let entries = issuers
            .into_iter()
            .map(|record| (record.id.clone(), IssuerEntry::new(record)))
            .collect();

        Self {
            entries,
            fetcher,
            min_refresh_interval,
        }
    }

    /// Fetch every configured issuer's key set once.
    ///
    /// Used at startup: the first failure is returned and the caller is expected
    /// to stop, since an unreachable issuer means nothing can be verified.
    pub async fn warm_up(&self) -> Result<(), KeySetError> {
        for entry in self.entries.values() {
            let mut state = entry.refresh.lock().await;
            let generation = entry.snapshot().await.generation;
            self.refresh(entry, &mut state, generation).await?;
        }
        Ok(())
    }

    /// Find `kid` in the issuer's key set, refetching the set at most once on a miss.
    pub async fn lookup(&self, issuer: &IssuerId, kid: &str) -> Result<Jwk, KeySetError> {
        let entry = self
            .entries
            .get(issuer)
            .ok_or_else(|| KeySetError::UnknownIssuer(issuer.clone()))?;

        let attempts_seen = entry.attempts.load(Ordering::Acquire);
        let seen = entry.snapshot().await;
        if let Some(jwk) = seen.find(kid) {
            return Ok(jwk);
        }

        let mut state = entry.refresh.lock().await;

        let latest = entry.snapshot().await;
        if latest.generation != seen.generation {
            // Another request refreshed while we waited for the lock.
            return latest.find(kid).ok_or_else(|| not_found(kid));
        }

        if entry.attempts.load(Ordering::Acquire) != attempts_seen {
            if let Some(cause) = &state.last_failure {
                // Another request's fetch failed while we waited for the lock.
                tracing::debug!(issuer = %issuer, kid, "sharing failed key set refetch");
                return Err(KeySetError::FetchFailed(FetchError::Shared(cause.clone())));
            }
        }

        if let Some(at) = state.last_attempt {
            if at.elapsed() < self.min_refresh_interval {
                tracing::debug!(issuer = %issuer, kid, "key set refetch rate limited");
                return Err(not_found(kid));
            }
        }

        let refreshed = self.refresh(entry, &mut state, latest.generation).await?;
        refreshed.find(kid).ok_or_else(|| not_found(kid))
    }

    /// Number of keys currently cached for `issuer`.
    pub async fn key_count(&self, issuer: &IssuerId) -> Option<usize> {
        let entry = self.entries.get(issuer)?;
        Some(entry.snapshot().await.keys.keys.len())
    }

    // Caller must hold `entry.refresh`; `state` is the guarded value.
    async fn refresh(
        &self,
        entry: &IssuerEntry,
        state: &mut RefreshState,
        generation: u64,
    ) -> Result<Arc<CachedKeySet>, KeySetError> {
        state.last_attempt = Some(Instant::now());

        let fetched = self.fetcher.fetch(&entry.record.url).await;
        state.last_failure = fetched.as_ref().err().map(ToString::to_string);
        entry.attempts.fetch_add(1, Ordering::Release);

        let keys = fetched.map_err(|err| {
            tracing::error!(
                issuer = %entry.record.id,
                url = %entry.record.url,
                error = %err,
                "unable to update key set"
            );
            KeySetError::FetchFailed(err)
        })?;

        let next = Arc::new(CachedKeySet {
            keys,
            generation: generation + 1,
        });
        *entry.current.write().await = Arc::clone(&next);

        tracing::info!(
            issuer = %entry.record.id,
            keys = next.keys.keys.len(),
            generation = next.generation,
            "updated key set"
        );

        Ok(next)
    }
}

fn not_found(kid: &str) -> KeySetError {
    KeySetError::KeyNotFound {
        kid: kid.to_string(),
    }
}
