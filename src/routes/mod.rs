//! HTTP route gateway.
//!
//! Each sibling module exports a subrouter over [`AppState`]; this gateway
//! merges them, installs the shared layers and answers every unmatched path
//! with the validator string, which is what the vendor probes for.

use axum::{
    extract::DefaultBodyLimit,
    http::{header, Method, StatusCode},
    response::Response,
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::error;

use crate::error::{CacheError, ErrorBody};
use crate::state::AppState;

mod assets;
mod health;
mod notifications;
mod socket;
mod users;

// ---

pub fn router(state: AppState) -> Router {
    // ---
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);
    let body_limit = state.config.max_body_bytes;

    Router::new()
        .merge(notifications::router())
        .merge(users::router())
        .merge(assets::router())
        .merge(socket::router())
        .merge(health::router())
        .fallback(notifications::validator)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// 503 for a read that could not reach the cache backend.
fn cache_unavailable(e: CacheError) -> Response {
    // ---
    error!(error = %e, "Cache backend unavailable");
    let status = StatusCode::SERVICE_UNAVAILABLE;
    ErrorBody::new(status, "Location cache unavailable").into_response_with(status)
}
