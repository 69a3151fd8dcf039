/*
 * Responsibility
 * - Shared context attached to the Router (AppState)
 *   - config: immutable settings built once at startup
 *   - authorizer: issuer resolver + key-set cache + passthrough policy
 * - Clone is cheap (everything behind Arc)
 */
use std::sync::Arc;

use crate::config::Config;
use crate::services::auth::Authorizer;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<Config>,
    pub authorizer: Arc<Authorizer>,
}

impl AppState {
    pub fn new(config: Arc<Config>, authorizer: Arc<Authorizer>) -> Self {
        Self { config, authorizer }
    }
}
