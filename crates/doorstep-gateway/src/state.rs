use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, broadcast};

use doorstep_chat::ChatSessionController;
use doorstep_common::ChatMessage;
use doorstep_db::ConversationStore;
use doorstep_geo::GeolocationProber;
use doorstep_relay::RelayDispatcher;

pub type SharedState = Arc<AppState>;

/// Shared state behind the gateway routes.
pub struct AppState {
    pub store: Arc<ConversationStore>,
    pub prober: Arc<GeolocationProber>,
    pub dispatcher: Arc<RelayDispatcher>,
    /// Open widget sessions keyed by session key.
    pub sessions: DashMap<String, Arc<Mutex<ChatSessionController>>>,
    /// Live transcript feeds keyed by session key.
    updates: DashMap<String, broadcast::Sender<Vec<ChatMessage>>>,
}

impl AppState {
    pub fn new(
        store: Arc<ConversationStore>,
        prober: Arc<GeolocationProber>,
        dispatcher: Arc<RelayDispatcher>,
    ) -> Self {
        Self {
            store,
            prober,
            dispatcher,
            sessions: DashMap::new(),
            updates: DashMap::new(),
        }
    }

    /// Broadcast feed for a session, created on first use. WebSocket clients
    /// subscribe to it; the open session's subscription publishes into it.
    pub fn update_feed(&self, session: &str) -> broadcast::Sender<Vec<ChatMessage>> {
        self.updates
            .entry(session.to_string())
            .or_insert_with(|| broadcast::channel(32).0)
            .clone()
    }
}
