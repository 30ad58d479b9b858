use std::fmt;
use std::time::Duration;

use doorstep_common::{Error, Result};
use reqwest::StatusCode;
use tracing::{debug, info, warn};

use crate::envelope::OutboundEnvelope;

/// Outcome of one relay send. Callers always get one of these; transport
/// and remote failures never escape as errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Delivered,
    DeliveredDegraded,
    Failed(RelayFailure),
}

/// Final failure classes after local recovery is exhausted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFailure {
    /// Credentials rejected by the remote API.
    Auth(String),
    /// Transport-level error before any remote verdict.
    Network(String),
    /// Remote rejection outside the formatting class.
    Rejected(String),
}

impl fmt::Display for RelayFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayFailure::Auth(detail) => write!(f, "authentication rejected: {detail}"),
            RelayFailure::Network(detail) => write!(f, "network error: {detail}"),
            RelayFailure::Rejected(detail) => write!(f, "rejected by relay: {detail}"),
        }
    }
}

/// Injected endpoint and credentials for the bot API.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub api_base: String,
    pub bot_token: String,
    pub chat_id: String,
    pub timeout_ms: u64,
}

/// Stateless transform-and-send over an [`OutboundEnvelope`].
///
/// The primary attempt carries the full enriched payload. When the remote
/// API rejects it for formatting, a minimal payload is retried exactly once;
/// every other rejection class is final.
pub struct RelayDispatcher {
    client: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

enum SendStatus {
    Accepted,
    FormattingRejected(String),
    AuthRejected(String),
    Transport(String),
    Rejected(String),
}

impl RelayDispatcher {
    /// Fails fast on missing credentials rather than silently no-opping at
    /// send time.
    pub fn new(settings: RelaySettings) -> Result<Self> {
        if settings.bot_token.trim().is_empty() {
            return Err(Error::Config("relay bot token is not configured".to_string()));
        }
        if settings.chat_id.trim().is_empty() {
            return Err(Error::Config("relay chat id is not configured".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("failed to build relay http client: {e}")))?;

        Ok(Self {
            client,
            api_base: settings.api_base.trim_end_matches('/').to_string(),
            bot_token: settings.bot_token,
            chat_id: settings.chat_id,
        })
    }

    /// Send one envelope: one HTTP request, or two when the first is
    /// rejected for formatting and the degraded retry fires.
    pub async fn send(&self, envelope: &OutboundEnvelope) -> RelayOutcome {
        match self.post_text(&envelope.to_text()).await {
            SendStatus::Accepted => {
                info!(session = %envelope.session, "relay delivered");
                RelayOutcome::Delivered
            }
            SendStatus::FormattingRejected(detail) => {
                warn!(
                    session = %envelope.session,
                    "relay rejected formatting ({detail}), retrying with degraded payload"
                );
                match self.post_text(&envelope.to_degraded_text()).await {
                    SendStatus::Accepted => {
                        info!(session = %envelope.session, "relay delivered degraded payload");
                        RelayOutcome::DeliveredDegraded
                    }
                    SendStatus::FormattingRejected(detail) | SendStatus::Rejected(detail) => {
                        RelayOutcome::Failed(RelayFailure::Rejected(detail))
                    }
                    SendStatus::AuthRejected(detail) => {
                        RelayOutcome::Failed(RelayFailure::Auth(detail))
                    }
                    SendStatus::Transport(detail) => {
                        RelayOutcome::Failed(RelayFailure::Network(detail))
                    }
                }
            }
            SendStatus::AuthRejected(detail) => RelayOutcome::Failed(RelayFailure::Auth(detail)),
            SendStatus::Transport(detail) => RelayOutcome::Failed(RelayFailure::Network(detail)),
            SendStatus::Rejected(detail) => RelayOutcome::Failed(RelayFailure::Rejected(detail)),
        }
    }

    async fn post_text(&self, text: &str) -> SendStatus {
        let url = format!("{}/bot{}/sendMessage", self.api_base, self.bot_token);
        let body = serde_json::json!({ "chat_id": self.chat_id, "text": text });

        let response = match self.client.post(&url).json(&body).send().await {
            Ok(response) => response,
            Err(e) => return SendStatus::Transport(e.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return SendStatus::Accepted;
        }

        let raw = response.text().await.unwrap_or_default();
        let detail = extract_description(&raw).unwrap_or_else(|| format!("HTTP {status}"));
        debug!("relay send rejected: HTTP {status}: {detail}");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return SendStatus::AuthRejected(detail);
        }
        if status == StatusCode::BAD_REQUEST && is_formatting_rejection(&detail) {
            return SendStatus::FormattingRejected(detail);
        }
        SendStatus::Rejected(format!("HTTP {status}: {detail}"))
    }
}

/// The bot API reports formatting problems as 400s whose description says it
/// cannot parse the message entities.
fn is_formatting_rejection(description: &str) -> bool {
    description.to_ascii_lowercase().contains("can't parse")
}

/// Pull the human-readable `description` out of an error body shaped like
/// `{"ok":false,"error_code":400,"description":"..."}`.
fn extract_description(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value.get("description")?.as_str().map(str::to_string)
}
