//! Vendor-facing endpoint.
//!
//! - `GET /post` answers the validator string the vendor checks before it
//!   starts pushing.
//! - `POST /post` receives sighting notifications.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::warn;

use crate::error::IngestError;
use crate::ingest;
use crate::models::Notification;
use crate::state::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/post", get(validator).post(receive))
}

/// Validator string, also used as the gateway fallback.
pub(super) async fn validator(State(state): State<AppState>) -> String {
    state.config.validator.clone()
}

async fn receive(
    State(state): State<AppState>,
    payload: Result<Json<Notification>, JsonRejection>,
) -> Response {
    // ---
    let Json(notification) = match payload {
        Ok(payload) => payload,
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            warn!("Notification body over the size limit");
            return rejection.into_response();
        }
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Malformed notification");
            return IngestError::Malformed(rejection.body_text()).into_response();
        }
    };

    match ingest::ingest(&state, &notification).await {
        Ok(_) => StatusCode::OK.into_response(),
        Err(e) => {
            warn!(error = %e, "Notification rejected");
            e.into_response()
        }
    }
}
