/*
 * Responsibility
 * - Every path and every method is an auth decision (the gateway sits in front of
 *   the real API), so there is a single fallback handler and no named routes
 */
use axum::Router;

use crate::api::handlers::authorize::authorize;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().fallback(authorize)
}
