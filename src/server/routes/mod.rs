//! API routes and handlers.

mod events;
mod resources;
mod session;

use axum::{
    routing::{get, post},
    Router,
};

use super::state::AppState;

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/auth/login", post(session::login))
        .route("/auth/logout", post(session::logout))
        .route("/api/events/{collection}", get(events::stream))
        .route(
            "/api/{collection}",
            get(resources::list).post(resources::create),
        )
        .route(
            "/api/{collection}/{id}",
            get(resources::get)
                .put(resources::update)
                .delete(resources::delete),
        )
        .with_state(state)
}

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}
