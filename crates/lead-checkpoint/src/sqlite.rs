use std::sync::Mutex;

use async_trait::async_trait;
use lead_core::types::{ConversationState, ThreadId};
use rusqlite::Connection;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::store::CheckpointStore;

/// SQLite-backed [`CheckpointStore`].
///
/// Wraps a single connection in a `Mutex` — sufficient for the single-node
/// target; a connection pool would be the next step under real concurrent
/// load. State is stored as a JSON blob keyed by `thread_id`; the schema
/// does not need to know the shape of `ConversationState`.
pub struct SqliteCheckpointStore {
    db: Mutex<Connection>,
}

impl SqliteCheckpointStore {
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                thread_id  TEXT PRIMARY KEY,
                state_json TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self { db: Mutex::new(conn) })
    }

    pub fn open(path: &str) -> Result<Self> {
        Self::new(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::new(Connection::open_in_memory()?)
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    #[instrument(skip(self), fields(thread_id = %thread_id))]
    async fn load(&self, thread_id: &ThreadId) -> Result<Option<ConversationState>> {
        let db = self.db.lock().unwrap();
        let result = db.query_row(
            "SELECT state_json FROM checkpoints WHERE thread_id = ?1",
            rusqlite::params![thread_id.as_str()],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(json) => {
                debug!("checkpoint hit");
                Ok(Some(serde_json::from_str(&json)?))
            }
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, state), fields(thread_id = %thread_id))]
    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> Result<()> {
        let json = serde_json::to_string(state)?;
        let now = chrono::Utc::now().to_rfc3339();
        let db = self.db.lock().unwrap();
        db.execute(
            "INSERT INTO checkpoints (thread_id, state_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(thread_id) DO UPDATE SET
                state_json = excluded.state_json,
                updated_at = excluded.updated_at",
            rusqlite::params![thread_id.as_str(), json, now],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lead_core::types::ContactId;

    #[tokio::test]
    async fn round_trips_saved_state() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        let thread_id = ThreadId("contact-c1".to_string());
        let mut state = ConversationState::new(thread_id.clone(), ContactId::from("c1"));
        state.lead_score = 7;

        store.save(&thread_id, &state).await.unwrap();
        let loaded = store.load(&thread_id).await.unwrap().unwrap();
        assert_eq!(loaded, state);
    }

    #[tokio::test]
    async fn missing_thread_returns_none() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        let thread_id = ThreadId("contact-unknown".to_string());
        assert!(store.load(&thread_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_overwrites_previous_state() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        let thread_id = ThreadId("contact-c2".to_string());
        let mut state = ConversationState::new(thread_id.clone(), ContactId::from("c2"));
        store.save(&thread_id, &state).await.unwrap();

        state.lead_score = 9;
        store.save(&thread_id, &state).await.unwrap();

        let loaded = store.load(&thread_id).await.unwrap().unwrap();
        assert_eq!(loaded.lead_score, 9);
    }
}
