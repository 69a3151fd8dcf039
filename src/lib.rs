/*
 * Responsibility
 * - Library surface of the gateway (integration tests drive app::build_router)
 */
pub mod api;
pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod services;
pub mod state;
