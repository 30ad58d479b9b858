use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use doorstep_common::{Error, Result};
use doorstep_config::AppConfig;
use doorstep_db::ConversationStore;
use doorstep_geo::{GeoProvider, GeolocationProber};
use doorstep_relay::{RelayDispatcher, RelaySettings};

use crate::router::build_router;
use crate::state::{AppState, SharedState};

/// The gateway process: configuration in, serving axum router out.
pub struct GatewayServer {
    config: AppConfig,
}

impl GatewayServer {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub async fn run(self) -> Result<()> {
        let state = build_state(&self.config)?;
        let addr = format!("{}:{}", self.config.gateway.host, self.config.gateway.port);
        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::Gateway(format!("failed to bind {addr}: {e}")))?;

        info!("doorstep gateway listening on {addr}");
        axum::serve(listener, build_router(state))
            .await
            .map_err(|e| Error::Gateway(format!("server error: {e}")))?;
        Ok(())
    }
}

/// Wire the configured components into shared gateway state.
///
/// Fails fast on unusable configuration (bad store path, missing relay
/// credentials) before the listener binds.
pub fn build_state(config: &AppConfig) -> Result<SharedState> {
    let store = Arc::new(ConversationStore::open(&config.store.db_path)?);

    let providers = config
        .geo
        .providers
        .iter()
        .map(|provider| GeoProvider::new(provider.name.clone(), provider.url.clone()))
        .collect();
    let prober = Arc::new(GeolocationProber::new(
        providers,
        Duration::from_millis(config.geo.timeout_ms),
    ));

    let dispatcher = Arc::new(RelayDispatcher::new(RelaySettings {
        api_base: config.relay.api_base.clone(),
        bot_token: config.relay.bot_token.clone(),
        chat_id: config.relay.chat_id.clone(),
        timeout_ms: config.relay.timeout_ms,
    })?);

    Ok(Arc::new(AppState::new(store, prober, dispatcher)))
}
