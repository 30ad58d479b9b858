use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use doorstep_common::{ChatMessage, Error, GeolocationResult, Result, SessionKey};
use doorstep_db::{ConversationStore, Subscription};
use doorstep_geo::GeolocationProber;
use doorstep_relay::{
    ClientMeta, OutboundEnvelope, RelayDispatcher, RelayOutcome, VisitorSubmission,
};

use crate::resolver;

/// Acknowledgement appended to the transcript after a successful relay.
pub const ACK_TEXT: &str = "Message received. I will get back to you shortly.";

/// Lifecycle states of one widget session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Closed,
    Resolving,
    Ready,
    Sending,
    Failed,
}

/// Composition root for one visitor chat session.
///
/// Orchestrates resolver, store and dispatcher: open resolves a session key
/// and attaches the live transcript subscription; submit appends the
/// visitor message optimistically, relays it and appends the system
/// acknowledgement; close drops the subscription but never transcript data.
pub struct ChatSessionController {
    prober: Arc<GeolocationProber>,
    store: Arc<ConversationStore>,
    dispatcher: Arc<RelayDispatcher>,
    state: SessionState,
    session: Option<SessionKey>,
    geo: Option<GeolocationResult>,
    subscription: Option<Subscription>,
}

impl ChatSessionController {
    pub fn new(
        prober: Arc<GeolocationProber>,
        store: Arc<ConversationStore>,
        dispatcher: Arc<RelayDispatcher>,
    ) -> Self {
        Self {
            prober,
            store,
            dispatcher,
            state: SessionState::Closed,
            session: None,
            geo: None,
            subscription: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session(&self) -> Option<&SessionKey> {
        self.session.as_ref()
    }

    pub fn geolocation(&self) -> Option<&GeolocationResult> {
        self.geo.as_ref()
    }

    /// Open the session: resolve the network identity, derive the session
    /// key and attach `on_update` as the live transcript subscriber.
    ///
    /// The callback fires immediately with the current transcript (possibly
    /// from an earlier visit keyed by the same origin) and on every append
    /// until the session closes.
    pub async fn open(
        &mut self,
        on_update: impl Fn(&[ChatMessage]) + Send + Sync + 'static,
    ) -> Result<SessionKey> {
        if self.state != SessionState::Closed {
            return Err(Error::Session("chat session is already open".to_string()));
        }
        self.state = SessionState::Resolving;

        let geo = self.prober.resolve().await;
        let session = resolver::derive_key(&geo);

        let subscription = match self.store.subscribe(&session, on_update) {
            Ok(subscription) => subscription,
            Err(e) => {
                self.state = SessionState::Closed;
                return Err(e);
            }
        };

        info!(session = %session, "chat session ready");
        self.geo = Some(geo);
        self.session = Some(session.clone());
        self.subscription = Some(subscription);
        self.state = SessionState::Ready;
        Ok(session)
    }

    /// Submit one visitor message.
    ///
    /// The visitor message is appended to the transcript before the relay
    /// attempt and stays there whatever the outcome, so the transcript
    /// reflects what the visitor said independent of delivery.
    pub async fn submit(
        &mut self,
        submission: VisitorSubmission,
        client: ClientMeta,
    ) -> Result<RelayOutcome> {
        if !matches!(self.state, SessionState::Ready | SessionState::Failed) {
            return Err(Error::Session(format!(
                "cannot submit while the session is {:?}",
                self.state
            )));
        }
        let session = self
            .session
            .clone()
            .ok_or_else(|| Error::Session("no session key resolved".to_string()))?;

        self.state = SessionState::Sending;

        if let Err(e) = self
            .store
            .append(&session, &ChatMessage::visitor(submission.message.clone()))
        {
            self.state = SessionState::Failed;
            return Err(e);
        }

        let envelope = OutboundEnvelope {
            session: session.clone(),
            submission,
            geo: self
                .geo
                .clone()
                .unwrap_or_else(GeolocationResult::unavailable),
            client,
            submitted_at: Utc::now(),
        };

        let outcome = self.dispatcher.send(&envelope).await;
        match &outcome {
            RelayOutcome::Delivered | RelayOutcome::DeliveredDegraded => {
                if let Err(e) = self.store.append(&session, &ChatMessage::system(ACK_TEXT)) {
                    self.state = SessionState::Failed;
                    return Err(e);
                }
                self.state = SessionState::Ready;
            }
            RelayOutcome::Failed(failure) => {
                warn!(session = %session, "relay delivery failed: {failure}");
                self.state = SessionState::Failed;
            }
        }
        Ok(outcome)
    }

    /// Close the widget session.
    ///
    /// Drops the live subscription deterministically; transcript data stays.
    /// An in-flight relay send is never cancelled here because submits are
    /// awaited to completion, so a close-then-reopen cannot duplicate one.
    pub fn close(&mut self) {
        self.subscription.take();
        self.state = SessionState::Closed;
    }
}
