//! `GET /assets`: configured assets with their current position.
//!
//! Each asset carrying a string `id` gets an `indoorLocation` member read
//! from the cache under that id (`null` when absent or unreadable). Other
//! assets are returned as configured.

use axum::{extract::State, routing::get, Json, Router};
use serde_json::Value;
use tracing::warn;

use crate::state::AppState;

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/assets", get(assets))
}

async fn assets(State(state): State<AppState>) -> Json<Vec<Value>> {
    // ---
    let mut assets = state.config.assets.clone();

    for asset in assets.iter_mut() {
        let Some(id) = asset.get("id").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        let location = match state.cache.get(&id).await {
            Ok(location) => location,
            Err(e) => {
                warn!(asset = %id, error = %e, "Could not read asset location");
                None
            }
        };
        if let Some(fields) = asset.as_object_mut() {
            let value = location
                .and_then(|location| serde_json::to_value(location).ok())
                .unwrap_or(Value::Null);
            fields.insert("indoorLocation".to_string(), value);
        }
    }

    Json(assets)
}
