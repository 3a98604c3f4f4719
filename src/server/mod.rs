//! HTTP adapter composing the core into a REST + SSE service.
//!
//! Thin axum layer over the store, broker and session signer: it resolves a
//! user from a session cookie or Basic credentials, authorizes every request
//! against the permission rules, translates `_id`/`_v` conventions and
//! streams change events per collection. The core never depends on this
//! module.

mod auth;
mod config;
mod error;
mod routes;
mod state;

pub use config::{Config, ConfigError, ServerConfig};
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
