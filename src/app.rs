/*
 * Responsibility
 * - Config load -> key-set warm-up -> Router assembly
 * - Middleware (CORS / request-id / trace / timeout)
 * - axum::serve() with peer addresses for the access log
 */
use std::net::SocketAddr;
use std::time::Duration;
use std::{panic, process, sync::Arc};

use anyhow::{Context, Result};
use axum::Router;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::config::{Config, LogConfig};
use crate::middleware;
use crate::services::auth::build_authorizer;
use crate::services::auth::jwks::{HttpKeyFetcher, KeyFetcher};
use crate::state::AppState;

/// Floor for the per-request deadline; raised when key fetches may take longer.
const MIN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

fn init_tracing(log: &LogConfig) {
    // RUST_LOG wins over LOG_LEVEL. Ex:
    // RUST_LOG=info,jwt_gateway=debug cargo run
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("{0},tower_http={0}", log.level))
    });

    let registry = tracing_subscriber::registry().with(filter);
    if log.app_env.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // Only an explicit APP_ENV=development fails fast; production keeps serving.
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    let log = LogConfig::from_env();
    init_tracing(&log);

    let config = Config::from_env().inspect_err(|err| {
        tracing::error!(error = %err, "invalid configuration");
    })?;
    init_panic_hook(!config.app_env.is_production());

    tracing::info!(
        "starting gateway in {:?} mode on {}",
        config.app_env,
        config.addr
    );

    let config = Arc::new(config);
    let fetcher: Arc<dyn KeyFetcher> = Arc::new(
        HttpKeyFetcher::new(config.jwks_fetch_timeout).context("building JWKS client")?,
    );
    let state = build_state(config.clone(), fetcher).await.inspect_err(|err| {
        tracing::error!(error = %err, "unable to load key sets, shutting down");
    })?;

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("binding {}", config.addr))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Fetch every configured issuer's key set and wire the shared state.
pub async fn build_state(config: Arc<Config>, fetcher: Arc<dyn KeyFetcher>) -> Result<AppState> {
    let authorizer = build_authorizer(&config, fetcher)
        .await
        .context("initial key set fetch failed")?;

    Ok(AppState::new(config, authorizer))
}

pub fn build_router(state: AppState) -> Router {
    let timeout = request_timeout(&state.config);

    let router = api::routes().with_state(state);
    let router = middleware::cors::apply(router);
    middleware::http::apply(router, timeout)
}

fn request_timeout(config: &Config) -> Duration {
    MIN_REQUEST_TIMEOUT.max(config.jwks_fetch_timeout * 2)
}
