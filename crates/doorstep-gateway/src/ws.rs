use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use doorstep_common::{ChatMessage, SessionKey};

use crate::state::SharedState;

/// GET /api/sessions/{key}/ws — live transcript push.
///
/// Sends the full transcript as one JSON array frame on connect and again
/// after every change for as long as the session stays open.
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, key))
}

async fn handle_socket(mut socket: WebSocket, state: SharedState, key: String) {
    let session = SessionKey::new(key);

    // Subscribe before reading the snapshot so no append slips between the
    // two; a duplicated full-snapshot frame is harmless.
    let mut rx = state.update_feed(session.as_str()).subscribe();
    let snapshot = match state.store.transcript(&session) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(session = %session, "transcript load failed for ws client: {e}");
            return;
        }
    };
    if send_transcript(&mut socket, &snapshot).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            update = rx.recv() => match update {
                Ok(transcript) => {
                    if send_transcript(&mut socket, &transcript).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(session = %session, "ws client lagged {skipped} updates, resyncing");
                    match state.store.transcript(&session) {
                        Ok(transcript) => {
                            if send_transcript(&mut socket, &transcript).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            warn!(session = %session, "transcript resync failed: {e}");
                            break;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(_)) => {} // client frames are ignored
                _ => break,       // closed or errored
            },
        }
    }
    debug!(session = %session, "ws client disconnected");
}

async fn send_transcript(
    socket: &mut WebSocket,
    transcript: &[ChatMessage],
) -> Result<(), axum::Error> {
    let payload = serde_json::to_string(transcript).unwrap_or_else(|_| "[]".to_string());
    socket.send(Message::Text(payload.into())).await
}
