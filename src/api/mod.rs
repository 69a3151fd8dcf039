/*
 * Responsibility
 * - HTTP surface of the gateway (routes() re-export)
 */
pub mod handlers;
mod routes;

pub use routes::routes;
