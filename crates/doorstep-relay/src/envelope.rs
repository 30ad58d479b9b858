use std::fmt::Write;

use chrono::{DateTime, Utc};
use doorstep_common::{GeolocationResult, SessionKey};

use crate::SESSION_MARKER;

/// Visitor-supplied fields from the chat form.
#[derive(Debug, Clone)]
pub struct VisitorSubmission {
    pub name: String,
    pub phone: Option<String>,
    pub message: String,
}

/// Request-level metadata forwarded for context.
#[derive(Debug, Clone, Default)]
pub struct ClientMeta {
    pub user_agent: Option<String>,
}

/// Composed payload for one relay send.
///
/// Built per send and never persisted verbatim; only the text/sender
/// projection of the visitor message reaches the transcript.
#[derive(Debug, Clone)]
pub struct OutboundEnvelope {
    pub session: SessionKey,
    pub submission: VisitorSubmission,
    pub geo: GeolocationResult,
    pub client: ClientMeta,
    pub submitted_at: DateTime<Utc>,
}

impl OutboundEnvelope {
    /// Full notification text for the primary attempt.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "New message from the site");
        let _ = writeln!(out);
        let _ = writeln!(out, "Name: {}", self.submission.name);
        let _ = writeln!(
            out,
            "Phone: {}",
            self.submission
                .phone
                .as_deref()
                .filter(|phone| !phone.trim().is_empty())
                .map(format_phone)
                .unwrap_or_else(|| "not provided".to_string())
        );
        let _ = writeln!(out);
        let _ = writeln!(out, "Message:");
        let _ = writeln!(out, "{}", self.submission.message);
        let _ = writeln!(out);
        let _ = writeln!(out, "{SESSION_MARKER} {}", self.session);
        let _ = writeln!(out, "IP: {}", or_unknown(&self.geo.ip));
        let _ = writeln!(
            out,
            "Location: {}, {}, {}",
            or_unknown(&self.geo.city),
            or_unknown(&self.geo.region),
            or_unknown(&self.geo.country)
        );
        let _ = writeln!(out, "ISP: {}", or_unknown(&self.geo.isp));
        if let Some(agent) = self
            .client
            .user_agent
            .as_deref()
            .filter(|agent| !agent.trim().is_empty())
        {
            let _ = writeln!(out, "Agent: {agent}");
        }
        let _ = write!(
            out,
            "Date: {}",
            self.submitted_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        out
    }

    /// Reduced payload for the one-shot degraded retry: just the sender name
    /// and a short excerpt of the body.
    pub fn to_degraded_text(&self) -> String {
        format!(
            "Message from {}: {}",
            self.submission.name,
            truncate_chars(&self.submission.message, 50)
        )
    }
}

fn or_unknown(value: &str) -> &str {
    if value.trim().is_empty() { "unknown" } else { value }
}

/// Truncate on a char boundary so multibyte input cannot split.
fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

/// Group a 10/11-digit phone number as `(AA) NNNNN-NNNN` for display.
/// Anything else passes through untouched.
pub fn format_phone(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    match digits.len() {
        10 => format!("({}) {}-{}", &digits[..2], &digits[2..6], &digits[6..]),
        11 => format!("({}) {}-{}", &digits[..2], &digits[2..7], &digits[7..]),
        _ => raw.trim().to_string(),
    }
}
