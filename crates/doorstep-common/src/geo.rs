use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for fields no provider could supply at all.
pub const UNAVAILABLE: &str = "unavailable";

/// Approximate public network identity of a visitor.
///
/// `ip` is empty when no provider resolved one; the remaining fields hold
/// whatever the winning provider reported, empty when that provider omitted
/// them. Renderers map empty fields to "unknown" rather than failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeolocationResult {
    pub ip: String,
    pub country: String,
    pub region: String,
    pub city: String,
    pub isp: String,
    pub resolved_at: DateTime<Utc>,
}

impl GeolocationResult {
    /// Result returned after every provider failed. The `ip` stays empty so
    /// session derivation falls through to the anonymous branch.
    pub fn unavailable() -> Self {
        Self {
            ip: String::new(),
            country: UNAVAILABLE.to_string(),
            region: UNAVAILABLE.to_string(),
            city: UNAVAILABLE.to_string(),
            isp: UNAVAILABLE.to_string(),
            resolved_at: Utc::now(),
        }
    }

    pub fn has_ip(&self) -> bool {
        !self.ip.is_empty()
    }
}
