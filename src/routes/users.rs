//! Cached positions by key.
//!
//! - `GET /users` lists live keys.
//! - `GET /users/{user_id}` returns the cached location, or `null`.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::debug;

use super::cache_unavailable;
use crate::state::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list))
        .route("/users/{user_id}", get(user))
}

async fn list(State(state): State<AppState>) -> Response {
    // ---
    match state.cache.list_keys().await {
        Ok(keys) => {
            debug!("GET /users - {} keys", keys.len());
            Json(keys).into_response()
        }
        Err(e) => cache_unavailable(e),
    }
}

async fn user(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    // ---
    match state.cache.get(&user_id).await {
        Ok(location) => Json(location).into_response(),
        Err(e) => cache_unavailable(e),
    }
}
