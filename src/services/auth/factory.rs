/// Factory: build the `Authorizer` (and its key-set cache) from application `Config`.
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::jwks::KeyFetcher;
use crate::services::auth::key_set_cache::{KeySetCache, KeySetError};
use crate::services::auth::passthrough::PassthroughPolicy;
use crate::services::auth::token::TokenDecoder;
use crate::services::auth::Authorizer;

/// Build the authorizer and fetch every issuer's key set once.
///
/// # Errors
/// Fails when any configured issuer's key set can not be retrieved.
pub async fn build_authorizer(
    config: &Config,
    fetcher: Arc<dyn KeyFetcher>,
) -> Result<Arc<Authorizer>, KeySetError> {
    let keys = Arc::new(KeySetCache::new(
        config.issuers.iter().cloned(),
        fetcher,
        config.jwks_min_refresh_interval,
    ));

    keys.warm_up().await?;

    for issuer in &config.issuers {
        tracing::info!(
            issuer = %issuer.id,
            url = %issuer.url,
            keys = keys.key_count(&issuer.id).await.unwrap_or_default(),
            "issuer configured"
        );
    }

    let passthrough = PassthroughPolicy::new(
        config.passthrough.enabled,
        config.passthrough.headers.clone(),
        config.passthrough.path_pattern.clone(),
    );

    Ok(Arc::new(Authorizer::new(
        config.issuer_resolver.clone(),
        TokenDecoder::new(keys),
        passthrough,
        config.check_expiry,
    )))
}
