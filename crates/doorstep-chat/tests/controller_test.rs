use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use doorstep_chat::{ACK_TEXT, ChatSessionController, SessionState};
use doorstep_common::MessageSender;
use doorstep_db::ConversationStore;
use doorstep_geo::{GeoProvider, GeolocationProber};
use doorstep_relay::{ClientMeta, RelayDispatcher, RelaySettings, VisitorSubmission};

const BOT_TOKEN: &str = "123:test-token";

type TranscriptLog = Arc<Mutex<Vec<Vec<String>>>>;

async fn geo_server_with_ip(ip: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ip": ip,
            "country_name": "Brazil",
            "region": "Sao Paulo",
            "city": "Campinas",
            "org": "Example Telecom"
        })))
        .mount(&server)
        .await;
    server
}

fn controller_for(
    geo: &MockServer,
    relay: &MockServer,
    store: Arc<ConversationStore>,
) -> ChatSessionController {
    let prober = Arc::new(GeolocationProber::new(
        vec![GeoProvider::new("test", format!("{}/json/", geo.uri()))],
        Duration::from_secs(1),
    ));
    let dispatcher = Arc::new(
        RelayDispatcher::new(RelaySettings {
            api_base: relay.uri(),
            bot_token: BOT_TOKEN.to_string(),
            chat_id: "42".to_string(),
            timeout_ms: 2_000,
        })
        .expect("dispatcher should construct"),
    );
    ChatSessionController::new(prober, store, dispatcher)
}

fn collecting(log: TranscriptLog) -> impl Fn(&[doorstep_common::ChatMessage]) + Send + Sync {
    move |transcript| {
        let texts = transcript.iter().map(|m| m.text.clone()).collect();
        log.lock().unwrap().push(texts);
    }
}

fn submission(message: &str) -> VisitorSubmission {
    VisitorSubmission {
        name: "Ana".to_string(),
        phone: None,
        message: message.to_string(),
    }
}

#[tokio::test]
async fn happy_path_appends_visitor_message_and_ack() {
    let geo = geo_server_with_ip("203.0.113.5").await;
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("/bot{BOT_TOKEN}/sendMessage")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .expect(1)
        .mount(&relay)
        .await;

    let store = Arc::new(ConversationStore::in_memory().unwrap());
    let mut controller = controller_for(&geo, &relay, Arc::clone(&store));

    let log: TranscriptLog = Arc::new(Mutex::new(Vec::new()));
    let session = controller
        .open(collecting(Arc::clone(&log)))
        .await
        .expect("open should succeed");

    assert_eq!(session.as_str(), "203-0-113-5");
    assert_eq!(controller.state(), SessionState::Ready);

    let outcome = controller
        .submit(submission("hello there"), ClientMeta::default())
        .await
        .expect("submit should succeed");
    assert_eq!(outcome, doorstep_relay::RelayOutcome::Delivered);
    assert_eq!(controller.state(), SessionState::Ready);

    let transcript = store.transcript(&session).unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].sender, MessageSender::Visitor);
    assert_eq!(transcript[0].text, "hello there");
    assert_eq!(transcript[1].sender, MessageSender::System);
    assert_eq!(transcript[1].text, ACK_TEXT);

    // Initial snapshot, visitor append, system ack.
    let calls = log.lock().unwrap().clone();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].is_empty());
    assert_eq!(calls[2], vec!["hello there".to_string(), ACK_TEXT.to_string()]);
}

#[tokio::test]
async fn relay_failure_keeps_optimistic_append() {
    let geo = geo_server_with_ip("203.0.113.9").await;
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "ok": false,
            "description": "Internal Server Error"
        })))
        .expect(1)
        .mount(&relay)
        .await;

    let store = Arc::new(ConversationStore::in_memory().unwrap());
    let mut controller = controller_for(&geo, &relay, Arc::clone(&store));
    let session = controller.open(|_| {}).await.unwrap();

    let outcome = controller
        .submit(submission("did this arrive?"), ClientMeta::default())
        .await
        .unwrap();
    assert!(matches!(outcome, doorstep_relay::RelayOutcome::Failed(_)));
    assert_eq!(controller.state(), SessionState::Failed);

    // No rollback: exactly the one visitor message, no ack.
    let transcript = store.transcript(&session).unwrap();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].sender, MessageSender::Visitor);
    assert_eq!(transcript[0].text, "did this arrive?");
}

#[tokio::test]
async fn failed_session_accepts_a_retry_submit() {
    let geo = geo_server_with_ip("203.0.113.9").await;
    let relay = MockServer::start().await;
    // First attempt fails outright, the retry goes through.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&relay)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&relay)
        .await;

    let store = Arc::new(ConversationStore::in_memory().unwrap());
    let mut controller = controller_for(&geo, &relay, Arc::clone(&store));
    let session = controller.open(|_| {}).await.unwrap();

    let first = controller
        .submit(submission("first try"), ClientMeta::default())
        .await
        .unwrap();
    assert!(matches!(first, doorstep_relay::RelayOutcome::Failed(_)));

    let second = controller
        .submit(submission("second try"), ClientMeta::default())
        .await
        .unwrap();
    assert_eq!(second, doorstep_relay::RelayOutcome::Delivered);
    assert_eq!(controller.state(), SessionState::Ready);

    // first try (no ack), second try, ack.
    let transcript = store.transcript(&session).unwrap();
    assert_eq!(transcript.len(), 3);
}

#[tokio::test]
async fn geolocation_exhaustion_still_opens_anonymous_session() {
    let geo = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&geo)
        .await;
    let relay = MockServer::start().await;

    let store = Arc::new(ConversationStore::in_memory().unwrap());
    let mut controller = controller_for(&geo, &relay, store);

    let session = controller.open(|_| {}).await.expect("open should succeed");
    assert!(session.as_str().starts_with("anon-"));
    assert_eq!(controller.state(), SessionState::Ready);
}

#[tokio::test]
async fn close_stops_updates_but_keeps_transcript() {
    let geo = geo_server_with_ip("198.51.100.20").await;
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "ok": true })))
        .mount(&relay)
        .await;

    let store = Arc::new(ConversationStore::in_memory().unwrap());
    let mut controller = controller_for(&geo, &relay, Arc::clone(&store));

    let log: TranscriptLog = Arc::new(Mutex::new(Vec::new()));
    let session = controller.open(collecting(Arc::clone(&log))).await.unwrap();
    controller
        .submit(submission("before close"), ClientMeta::default())
        .await
        .unwrap();

    let calls_before = log.lock().unwrap().len();
    controller.close();
    assert_eq!(controller.state(), SessionState::Closed);

    // Appends after close no longer reach the old callback.
    store
        .append(&session, &doorstep_common::ChatMessage::system("late reply"))
        .unwrap();
    assert_eq!(log.lock().unwrap().len(), calls_before);

    // The transcript itself survives the close.
    assert_eq!(store.transcript(&session).unwrap().len(), 3);
}

#[tokio::test]
async fn reopening_after_close_reuses_the_ip_keyed_session() {
    let geo = geo_server_with_ip("198.51.100.21").await;
    let relay = MockServer::start().await;

    let store = Arc::new(ConversationStore::in_memory().unwrap());
    let mut controller = controller_for(&geo, &relay, Arc::clone(&store));

    let first = controller.open(|_| {}).await.unwrap();
    controller.close();

    let log: TranscriptLog = Arc::new(Mutex::new(Vec::new()));
    store
        .append(&first, &doorstep_common::ChatMessage::system("while away"))
        .unwrap();

    let second = controller.open(collecting(Arc::clone(&log))).await.unwrap();
    assert_eq!(first, second);

    // The initial snapshot carries history from the earlier visit.
    let calls = log.lock().unwrap().clone();
    assert_eq!(calls[0], vec!["while away".to_string()]);
}

#[tokio::test]
async fn submit_while_closed_is_rejected() {
    let geo = geo_server_with_ip("198.51.100.22").await;
    let relay = MockServer::start().await;

    let store = Arc::new(ConversationStore::in_memory().unwrap());
    let mut controller = controller_for(&geo, &relay, store);

    let result = controller
        .submit(submission("too early"), ClientMeta::default())
        .await;
    assert!(matches!(result, Err(doorstep_common::Error::Session(_))));
}

#[tokio::test]
async fn double_open_is_rejected() {
    let geo = geo_server_with_ip("198.51.100.23").await;
    let relay = MockServer::start().await;

    let store = Arc::new(ConversationStore::in_memory().unwrap());
    let mut controller = controller_for(&geo, &relay, store);

    controller.open(|_| {}).await.unwrap();
    let result = controller.open(|_| {}).await;
    assert!(matches!(result, Err(doorstep_common::Error::Session(_))));
}
