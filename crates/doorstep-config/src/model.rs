use std::path::PathBuf;

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub relay: RelayConfig,
    #[serde(default)]
    pub geo: GeoConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Bot API credentials and endpoint. The token and chat id have no defaults;
/// they come from the config file or environment and are validated when the
/// dispatcher is constructed.
#[derive(Debug, Clone, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_relay_api_base")]
    pub api_base: String,
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
    #[serde(default = "default_relay_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            api_base: default_relay_api_base(),
            bot_token: String::new(),
            chat_id: String::new(),
            timeout_ms: default_relay_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoConfig {
    /// Lookup services tried in order; the first usable response wins.
    #[serde(default = "default_geo_providers")]
    pub providers: Vec<GeoProviderConfig>,
    /// Timeout applied to each individual provider attempt.
    #[serde(default = "default_geo_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            providers: default_geo_providers(),
            timeout_ms: default_geo_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeoProviderConfig {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3990
}

fn default_relay_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_relay_timeout_ms() -> u64 {
    10_000
}

fn default_geo_timeout_ms() -> u64 {
    5_000
}

fn default_db_path() -> PathBuf {
    PathBuf::from("doorstep.db")
}

fn default_geo_providers() -> Vec<GeoProviderConfig> {
    [
        ("ipapi", "https://ipapi.co/json/"),
        ("ipinfo", "https://ipinfo.io/json/"),
        ("geolocation-db", "https://geolocation-db.com/json/"),
        ("db-ip", "https://api.db-ip.com/v2/free/self"),
    ]
    .into_iter()
    .map(|(name, url)| GeoProviderConfig {
        name: name.to_string(),
        url: url.to_string(),
    })
    .collect()
}
