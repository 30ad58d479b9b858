use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::SecondsFormat;
use dashmap::DashMap;
use rusqlite::{Connection, params};
use tracing::{info, warn};

use doorstep_common::{ChatMessage, Error, MessageSender, Result, SessionKey};

type UpdateFn = Arc<dyn Fn(&[ChatMessage]) + Send + Sync>;

struct Subscriber {
    id: u64,
    on_update: UpdateFn,
}

/// Append-only transcript store with live per-session subscriptions.
///
/// Every successful append re-reads the full ordered transcript for that
/// session and hands it to each registered subscriber. Callbacks run while
/// the session's subscriber entry is held, so they must not call back into
/// the store for the same session.
pub struct ConversationStore {
    conn: Mutex<Connection>,
    subscribers: Arc<DashMap<String, Vec<Subscriber>>>,
    next_subscriber_id: AtomicU64,
}

impl ConversationStore {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening conversation store at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Store(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Store(format!("failed to set pragmas: {e}")))?;

        Self::run_migrations(&conn)?;
        Ok(Self::with_connection(conn))
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Store(format!("failed to open in-memory database: {e}")))?;

        Self::run_migrations(&conn)?;
        Ok(Self::with_connection(conn))
    }

    fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            subscribers: Arc::new(DashMap::new()),
            next_subscriber_id: AtomicU64::new(0),
        }
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                session_key TEXT NOT NULL,
                sender TEXT NOT NULL,
                body TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_chat_messages_session
                ON chat_messages(session_key, timestamp);",
        )
        .map_err(|e| Error::Store(format!("migration failed: {e}")))?;
        Ok(())
    }

    /// Append one message to a session's transcript.
    ///
    /// The write is durable once this returns; other readers observe it
    /// through their subscription callback, not synchronously.
    pub fn append(&self, session: &SessionKey, message: &ChatMessage) -> Result<()> {
        {
            let conn = self
                .conn
                .lock()
                .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
            conn.execute(
                "INSERT INTO chat_messages (id, session_key, sender, body, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    message.id,
                    session.as_str(),
                    message.sender.as_str(),
                    message.text,
                    // Fixed-width UTC keys so the timestamp column sorts
                    // lexicographically; ties fall back to rowid order.
                    message
                        .created_at
                        .to_rfc3339_opts(SecondsFormat::Millis, true),
                ],
            )
            .map_err(|e| Error::Store(format!("failed to append message: {e}")))?;
        }
        self.notify(session)
    }

    /// Full transcript for a session in non-decreasing timestamp order.
    /// Messages sharing a timestamp keep their insertion order.
    pub fn transcript(&self, session: &SessionKey) -> Result<Vec<ChatMessage>> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| Error::Store("store lock poisoned".to_string()))?;
        let mut stmt = conn
            .prepare(
                "SELECT id, sender, body, timestamp FROM chat_messages
                 WHERE session_key = ?1
                 ORDER BY timestamp ASC, rowid ASC",
            )
            .map_err(|e| Error::Store(format!("failed to prepare transcript query: {e}")))?;

        let rows = stmt
            .query_map(params![session.as_str()], |row| {
                let sender_raw: String = row.get(1)?;
                let timestamp_raw: String = row.get(3)?;
                Ok((row.get::<_, String>(0)?, sender_raw, row.get::<_, String>(2)?, timestamp_raw))
            })
            .map_err(|e| Error::Store(format!("failed to load transcript: {e}")))?;

        let mut messages = Vec::new();
        for row in rows {
            let (id, sender_raw, body, timestamp_raw) =
                row.map_err(|e| Error::Store(format!("failed to read message row: {e}")))?;
            messages.push(ChatMessage {
                id,
                sender: parse_sender(&sender_raw)?,
                text: body,
                created_at: parse_timestamp(&timestamp_raw),
            });
        }
        Ok(messages)
    }

    /// Register a live subscriber for a session.
    ///
    /// The callback fires once immediately with the current transcript and
    /// again after every append, always with the full sorted transcript.
    /// Dropping the returned [`Subscription`] deregisters it; no callback
    /// fires after the drop returns.
    pub fn subscribe(
        &self,
        session: &SessionKey,
        on_update: impl Fn(&[ChatMessage]) + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let snapshot = self.transcript(session)?;
        let id = self.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let on_update: UpdateFn = Arc::new(on_update);

        {
            // Registration and the initial snapshot happen under the entry
            // guard so they serialize against concurrent appends.
            let mut entry = self
                .subscribers
                .entry(session.as_str().to_string())
                .or_default();
            entry.push(Subscriber {
                id,
                on_update: Arc::clone(&on_update),
            });
            on_update(&snapshot);
        }

        Ok(Subscription {
            subscribers: Arc::clone(&self.subscribers),
            session: session.as_str().to_string(),
            id,
        })
    }

    fn notify(&self, session: &SessionKey) -> Result<()> {
        let has_subscribers = self
            .subscribers
            .get(session.as_str())
            .map(|entry| !entry.is_empty())
            .unwrap_or(false);
        if !has_subscribers {
            return Ok(());
        }

        let transcript = self.transcript(session)?;
        if let Some(entry) = self.subscribers.get(session.as_str()) {
            for subscriber in entry.iter() {
                (subscriber.on_update)(&transcript);
            }
        }
        Ok(())
    }
}

/// Disposer returned by [`ConversationStore::subscribe`].
///
/// Unsubscription takes the session's subscriber entry, so once it returns
/// the callback cannot fire again.
pub struct Subscription {
    subscribers: Arc<DashMap<String, Vec<Subscriber>>>,
    session: String,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(self) {
        // Drop does the work.
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(mut entry) = self.subscribers.get_mut(&self.session) {
            entry.retain(|subscriber| subscriber.id != self.id);
        }
    }
}

fn parse_sender(value: &str) -> Result<MessageSender> {
    match value {
        "visitor" => Ok(MessageSender::Visitor),
        "system" => Ok(MessageSender::System),
        other => Err(Error::Store(format!("unknown message sender '{other}'"))),
    }
}

fn parse_timestamp(value: &str) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&chrono::Utc))
        .unwrap_or_else(|e| {
            warn!(
                "failed to parse timestamp '{}': {e}, falling back to now",
                value
            );
            chrono::Utc::now()
        })
}
