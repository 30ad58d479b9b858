use std::sync::OnceLock;

use doorstep_common::SessionKey;
use regex::Regex;
use serde_json::Value;

use crate::SESSION_MARKER;

/// Operator reply extracted from a bot webhook update.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorReply {
    pub session: SessionKey,
    pub text: String,
}

/// Parse a webhook update into a reply routed back to a visitor session.
///
/// Only fires when the operator used the reply function on a relayed
/// message whose quoted text still carries the session marker line.
/// Everything else (plain messages, edits, non-text payloads) yields `None`
/// and should be acknowledged without action.
pub fn parse_operator_reply(update: &Value) -> Option<OperatorReply> {
    let message = update.get("message")?;
    let text = message.get("text")?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }

    let quoted = message.get("reply_to_message")?.get("text")?.as_str()?;
    let session = extract_session_key(quoted)?;
    Some(OperatorReply {
        session,
        text: text.to_string(),
    })
}

fn session_marker_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(&format!(r"(?m)^{SESSION_MARKER}\s*(\S+)"))
            .expect("session marker regex is valid")
    })
}

fn extract_session_key(quoted: &str) -> Option<SessionKey> {
    session_marker_regex()
        .captures(quoted)
        .and_then(|captures| captures.get(1))
        .map(|key| SessionKey::new(key.as_str()))
}
