//! HTTP server: configuration, authentication, routing, and shared state.

pub mod auth;
pub mod config;
pub mod routes;
pub mod state;

pub use config::{Config, Secrets};
pub use routes::build_router;
pub use state::AppState;
