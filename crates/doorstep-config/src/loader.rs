use std::path::{Path, PathBuf};

use doorstep_common::{Error, Result};
use tracing::{debug, info};

use crate::model::AppConfig;

/// Loads the application configuration from a TOML file and applies
/// environment overrides on top.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Directory holding the default config file (`~/.doorstep`).
    pub fn default_config_dir() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".doorstep"))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Load configuration.
    ///
    /// With an explicit `path` the file must exist and parse. Without one,
    /// `~/.doorstep/config.toml` is used when present, otherwise defaults.
    /// Environment variables win over file values either way.
    pub fn load(path: Option<&Path>) -> Result<AppConfig> {
        let mut config = match path {
            Some(path) => Self::read_file(path)?,
            None => {
                let default_path = Self::default_config_dir().join("config.toml");
                if default_path.exists() {
                    Self::read_file(&default_path)?
                } else {
                    debug!("no config file found, using defaults");
                    AppConfig::default()
                }
            }
        };

        apply_env_overrides(&mut config, |key| std::env::var(key).ok());
        validate(&config)?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<AppConfig> {
        info!("loading configuration from {}", path.display());
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))
    }
}

/// Environment overrides, injectable for tests.
fn apply_env_overrides(config: &mut AppConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(token) = lookup("DOORSTEP_RELAY_BOT_TOKEN") {
        config.relay.bot_token = token;
    }
    if let Some(chat_id) = lookup("DOORSTEP_RELAY_CHAT_ID") {
        config.relay.chat_id = chat_id;
    }
    if let Some(api_base) = lookup("DOORSTEP_RELAY_API_BASE") {
        config.relay.api_base = api_base;
    }
    if let Some(db_path) = lookup("DOORSTEP_DB_PATH") {
        config.store.db_path = db_path.into();
    }
    if let Some(port) = lookup("DOORSTEP_GATEWAY_PORT")
        && let Ok(port) = port.parse()
    {
        config.gateway.port = port;
    }
}

/// Reject malformed endpoint URLs up front so a typo surfaces at startup
/// instead of as a failed lookup later.
fn validate(config: &AppConfig) -> Result<()> {
    url::Url::parse(&config.relay.api_base)
        .map_err(|e| Error::Config(format!("invalid relay api_base: {e}")))?;
    for provider in &config.geo.providers {
        url::Url::parse(&provider.url).map_err(|e| {
            Error::Config(format!("invalid url for geo provider '{}': {e}", provider.name))
        })?;
    }
    Ok(())
}
