//! `GET /socket?userId=..`: live location feed over WebSocket.
//!
//! The connection is refused with a 400 before the upgrade when `userId` is
//! missing. Once upgraded it owns exactly one [`LiveFeed`], which is closed
//! when the loop exits for any reason: client close, send failure, read
//! error or feed termination.

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::ErrorBody;
use crate::live::LiveFeed;
use crate::models::IndoorLocationChange;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SocketParams {
    user_id: Option<String>,
}

// ---

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(socket))
}

async fn socket(
    State(state): State<AppState>,
    Query(params): Query<SocketParams>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    // ---
    let Some(user_id) = params.user_id.filter(|id| !id.is_empty()) else {
        warn!("Socket connection without userId refused");
        let status = StatusCode::BAD_REQUEST;
        return ErrorBody::new(status, "Missing userId").into_response_with(status);
    };

    match upgrade {
        Ok(upgrade) => upgrade.on_upgrade(move |socket| serve_feed(socket, state, user_id)),
        Err(rejection) => rejection.into_response(),
    }
}

async fn serve_feed(socket: WebSocket, state: AppState, user_id: String) {
    // ---
    let connection = Uuid::new_v4();

    let mut feed = match LiveFeed::open(state.cache.as_ref(), &user_id).await {
        Ok(feed) => feed,
        Err(e) => {
            error!(%connection, user_id = %user_id, error = %e, "Could not open live feed");
            return;
        }
    };
    info!(%connection, user_id = %user_id, "Live feed connected");

    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            update = feed.next() => {
                let Some(location) = update else {
                    break;
                };
                let change = IndoorLocationChange::new(&user_id, &location);
                let json = match serde_json::to_string(&change) {
                    Ok(json) => json,
                    Err(e) => {
                        warn!(%connection, error = %e, "Could not encode location change");
                        continue;
                    }
                };
                if sender.send(Message::Text(json.into())).await.is_err() {
                    debug!(%connection, "Send failed, client gone");
                    break;
                }
            }
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(%connection, error = %e, "Socket read error");
                    break;
                }
                // Pings are answered by axum; anything else is ignored
                Some(Ok(_)) => {}
            },
        }
    }

    feed.close();
    info!(%connection, user_id = %user_id, "Live feed disconnected");
}
