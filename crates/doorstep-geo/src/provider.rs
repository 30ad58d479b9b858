use chrono::Utc;
use doorstep_common::GeolocationResult;
use serde_json::Value;

/// One configured lookup endpoint. Providers are plain data so the chain
/// can be reordered or extended from configuration alone.
#[derive(Debug, Clone)]
pub struct GeoProvider {
    pub name: String,
    pub url: String,
}

impl GeoProvider {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Map one provider's response body onto the shared field names.
///
/// The services disagree on key names for the same concept; the first alias
/// present in the body wins. Fields no alias matches stay empty, which
/// downstream renderers show as "unknown".
pub fn normalize_body(body: &Value) -> GeolocationResult {
    GeolocationResult {
        ip: pick(body, &["ip", "IPv4", "ipAddress"]),
        country: pick(body, &["country_name", "country", "countryName"]),
        region: pick(body, &["region", "state", "region_name", "stateProv"]),
        city: pick(body, &["city"]),
        isp: pick(body, &["org", "isp", "asn"]),
        resolved_at: Utc::now(),
    }
}

fn pick(body: &Value, aliases: &[&str]) -> String {
    aliases
        .iter()
        .find_map(|key| body.get(key).and_then(Value::as_str))
        .unwrap_or_default()
        .trim()
        .to_string()
}
