//! Relay socket handler
//!
//! `GET /api/v1/remote/{id}` upgrades to a WebSocket and joins the room
//! named by the challenge id.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use tandem_core::session::{Frame, SessionEvent};
use tracing::{debug, info, warn};

use crate::relay::RelayHub;
use crate::state::AppState;
use crate::validation::validate_room_id;

/// GET /api/v1/remote/{id} - Join a relay room
///
/// The room id is checked before the upgrade so a bad id gets a JSON error
/// instead of a socket.
pub async fn remote_handler(
    Path(room_id): Path<String>,
    State(state): State<AppState>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if let Err(e) = validate_room_id(&room_id) {
        return e.into_response();
    }
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return rejection.into_response(),
    };

    let hub = Arc::clone(&state.hub);
    ws.max_message_size(state.max_frame_bytes)
        .max_frame_size(state.max_frame_bytes)
        .on_upgrade(move |socket| run_peer(socket, room_id, hub))
}

async fn run_peer(socket: WebSocket, room_id: String, hub: Arc<RelayHub>) {
    let (mut sink, mut stream) = socket.split();

    let (peer, mut outbound) = match hub.join(&room_id) {
        Ok(joined) => joined,
        Err(e) => {
            info!(room = %room_id, error = %e, "Rejecting peer");
            let busy = Frame::event_text(SessionEvent::Busy);
            let _ = sink.send(Message::Text(busy.into())).await;
            let _ = sink.close().await;
            return;
        }
    };

    let writer = tokio::spawn(async move {
        while let Some(text) = outbound.recv().await {
            if sink.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(message) = stream.next().await {
        match message {
            Ok(Message::Text(text)) => hub.forward(&room_id, peer, text.as_str()),
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                warn!(room = %room_id, peer = %peer, "Binary frame received, closing");
                break;
            }
            Err(e) => {
                debug!(room = %room_id, peer = %peer, error = %e, "Socket read failed");
                break;
            }
        }
    }

    hub.leave(&room_id, peer);
    writer.abort();
}
