use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{error, info};

use doorstep_chat::ChatSessionController;
use doorstep_common::{ChatMessage, Error, SessionKey};
use doorstep_relay::{ClientMeta, RelayOutcome, VisitorSubmission, parse_operator_reply};

use crate::state::SharedState;

#[derive(Deserialize)]
pub struct SubmitMessageRequest {
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub message: String,
}

/// POST /api/sessions — open a widget session.
///
/// Resolves the visitor's session key and wires the session's live
/// subscription into the broadcast feed consumed by WebSocket clients.
pub async fn open_session(State(state): State<SharedState>) -> (StatusCode, Json<Value>) {
    let mut controller = ChatSessionController::new(
        Arc::clone(&state.prober),
        Arc::clone(&state.store),
        Arc::clone(&state.dispatcher),
    );

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<Vec<ChatMessage>>();
    let opened = controller
        .open(move |transcript| {
            let _ = tx.send(transcript.to_vec());
        })
        .await;

    let session = match opened {
        Ok(session) => session,
        Err(e) => {
            error!("failed to open chat session: {e}");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "error", "message": e.to_string() })),
            );
        }
    };

    // Pump subscription updates into the session's broadcast feed. The task
    // ends when the session's subscription (and with it the sender) drops.
    let feed = state.update_feed(session.as_str());
    tokio::spawn(async move {
        while let Some(transcript) = rx.recv().await {
            let _ = feed.send(transcript);
        }
    });

    // A re-open for the same key replaces the previous controller; its
    // subscription is released when the old controller drops.
    state.sessions.insert(
        session.as_str().to_string(),
        Arc::new(tokio::sync::Mutex::new(controller)),
    );

    info!(session = %session, "widget session opened");
    (
        StatusCode::CREATED,
        Json(json!({ "session_key": session.as_str(), "status": "ready" })),
    )
}

/// POST /api/sessions/{key}/messages — submit one visitor message.
pub async fn submit_message(
    State(state): State<SharedState>,
    Path(key): Path<String>,
    headers: HeaderMap,
    Json(body): Json<SubmitMessageRequest>,
) -> (StatusCode, Json<Value>) {
    let Some(controller) = state.sessions.get(&key).map(|entry| Arc::clone(entry.value()))
    else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "message": "session is not open" })),
        );
    };

    let submission = match validate_submission(body) {
        Ok(submission) => submission,
        Err(message) => {
            return (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "status": "error", "message": message })),
            );
        }
    };

    let client = ClientMeta {
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string),
    };

    let outcome = controller.lock().await.submit(submission, client).await;
    match outcome {
        Ok(RelayOutcome::Delivered) => (StatusCode::OK, Json(json!({ "status": "delivered" }))),
        Ok(RelayOutcome::DeliveredDegraded) => (
            StatusCode::OK,
            Json(json!({ "status": "delivered_degraded" })),
        ),
        Ok(RelayOutcome::Failed(failure)) => (
            StatusCode::BAD_GATEWAY,
            Json(json!({ "status": "failed", "message": failure.to_string() })),
        ),
        Err(e) => error_response(e),
    }
}

/// GET /api/sessions/{key}/transcript — full ordered transcript.
pub async fn session_transcript(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> Response {
    match state.store.transcript(&SessionKey::new(key)) {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => error_response(e).into_response(),
    }
}

/// DELETE /api/sessions/{key} — close the widget session.
///
/// Releases the live subscription; the transcript itself is kept.
pub async fn close_session(
    State(state): State<SharedState>,
    Path(key): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.sessions.remove(&key) {
        Some((_, controller)) => {
            controller.lock().await.close();
            info!(session = %key, "widget session closed");
            (StatusCode::OK, Json(json!({ "status": "closed" })))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": "error", "message": "session is not open" })),
        ),
    }
}

/// POST /webhooks/telegram — bot webhook for operator replies.
///
/// When the operator replies to a relayed message, the reply lands in the
/// originating session's transcript as a system message. Every other update
/// is acknowledged and dropped.
pub async fn telegram_webhook(
    State(state): State<SharedState>,
    Json(update): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(reply) = parse_operator_reply(&update) else {
        return (StatusCode::OK, Json(json!({ "ok": true })));
    };

    match state
        .store
        .append(&reply.session, &ChatMessage::system(reply.text.clone()))
    {
        Ok(()) => {
            info!(session = %reply.session, "operator reply appended");
            (StatusCode::OK, Json(json!({ "success": true })))
        }
        Err(e) => {
            error!("failed to append operator reply: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false })),
            )
        }
    }
}

fn error_response(error: Error) -> (StatusCode, Json<Value>) {
    let status = match &error {
        Error::Session(_) => StatusCode::CONFLICT,
        Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(json!({ "status": "error", "message": error.to_string() })),
    )
}

/// Form-level validation mirroring the widget's client-side rules.
fn validate_submission(request: SubmitMessageRequest) -> Result<VisitorSubmission, String> {
    let name = request.name.trim().to_string();
    if name.chars().count() < 2 {
        return Err("name must have at least 2 characters".to_string());
    }

    let message = request.message.trim().to_string();
    if message.chars().count() < 5 {
        return Err("message must have at least 5 characters".to_string());
    }

    let phone = request
        .phone
        .map(|phone| phone.trim().to_string())
        .filter(|phone| !phone.is_empty());
    if let Some(phone) = &phone {
        let digits = phone.chars().filter(char::is_ascii_digit).count();
        if digits != 10 && digits != 11 {
            return Err("phone must have 10 or 11 digits".to_string());
        }
    }

    Ok(VisitorSubmission {
        name,
        phone,
        message,
    })
}
