//! The axum HTTP surface (spec §6). Routing/serialization/CORS are explicitly out of scope for
//! the orchestrator itself, but the request/response contracts here are what the core requires.

pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;

pub use state::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/generate-post", post(handlers::generate_post))
        .route("/status/{task_id}", get(handlers::get_status))
        .route("/tasks", get(handlers::list_tasks))
        .route("/verify-post", post(handlers::verify_post))
        .route("/batch-generate", post(handlers::batch_generate))
        .route("/health", get(handlers::health))
        .with_state(state)
}
