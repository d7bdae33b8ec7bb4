//! Conversation sessions and the in-memory checkpoint store.
//!
//! A session is a resumable conversation identified by an opaque id. The
//! store hands out at most one [`TurnPermit`] per session at a time, so two
//! requests can never interleave appends to the same history. A turn's
//! messages are committed in a single append once the turn completes; a turn
//! that fails or is abandoned commits nothing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique within the assistant message that issued it.
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

/// A single unit of conversation history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Message {
    /// What the user typed.
    User { text: String },
    /// A model response, possibly carrying tool-call requests.
    Assistant {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCall>,
    },
    /// The outcome of one tool invocation, fed back to the model.
    ToolResult {
        tool_call_id: String,
        tool_name: String,
        payload: Value,
    },
}

/// A resumable conversation.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub history: Vec<Message>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unknown session: {0}")]
    UnknownSession(Uuid),

    #[error("session {0} already has a turn in progress")]
    SessionBusy(Uuid),
}

/// Exclusive right to run one turn against a session.
///
/// Dropping the permit without committing releases the session with its
/// history unchanged.
#[derive(Debug)]
pub struct TurnPermit {
    session_id: Uuid,
    _guard: OwnedMutexGuard<()>,
}

impl TurnPermit {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }
}

/// Checkpoint store: sessions keyed by id, alive for the process lifetime.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Mint a new session with a fresh id and empty history.
    async fn create_session(&self) -> Session;

    /// Fetch a session snapshot by id.
    async fn get_session(&self, id: Uuid) -> Option<Session>;

    /// Claim the session for one turn and snapshot its history.
    ///
    /// Fails with [`StoreError::SessionBusy`] while another turn holds the
    /// permit for the same session.
    async fn begin_turn(&self, id: Uuid) -> Result<(Vec<Message>, TurnPermit), StoreError>;

    /// Append a completed turn's messages in one step, releasing the permit.
    async fn commit_turn(
        &self,
        permit: TurnPermit,
        messages: Vec<Message>,
    ) -> Result<(), StoreError>;
}

struct SessionEntry {
    session: Session,
    turn_lock: Arc<Mutex<()>>,
}

/// In-memory session store (non-persistent). No eviction: the store grows
/// for the lifetime of the process.
#[derive(Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

fn now_string() -> String {
    Utc::now().to_rfc3339()
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create_session(&self) -> Session {
        let now = now_string();
        let session = Session {
            id: Uuid::new_v4(),
            history: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        };
        self.sessions.write().await.insert(
            session.id,
            SessionEntry {
                session: session.clone(),
                turn_lock: Arc::new(Mutex::new(())),
            },
        );
        session
    }

    async fn get_session(&self, id: Uuid) -> Option<Session> {
        self.sessions.read().await.get(&id).map(|e| e.session.clone())
    }

    async fn begin_turn(&self, id: Uuid) -> Result<(Vec<Message>, TurnPermit), StoreError> {
        let sessions = self.sessions.read().await;
        let entry = sessions.get(&id).ok_or(StoreError::UnknownSession(id))?;
        let guard = entry
            .turn_lock
            .clone()
            .try_lock_owned()
            .map_err(|_| StoreError::SessionBusy(id))?;
        Ok((
            entry.session.history.clone(),
            TurnPermit {
                session_id: id,
                _guard: guard,
            },
        ))
    }

    async fn commit_turn(
        &self,
        permit: TurnPermit,
        messages: Vec<Message>,
    ) -> Result<(), StoreError> {
        let mut sessions = self.sessions.write().await;
        let entry = sessions
            .get_mut(&permit.session_id)
            .ok_or(StoreError::UnknownSession(permit.session_id))?;
        entry.session.history.extend(messages);
        entry.session.updated_at = now_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_and_get_session() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await;
        assert!(session.history.is_empty());

        let fetched = store
            .get_session(session.id)
            .await
            .expect("session exists");
        assert_eq!(fetched.id, session.id);
    }

    #[tokio::test]
    async fn begin_turn_on_unknown_session_fails() {
        let store = InMemorySessionStore::new();
        let err = store
            .begin_turn(Uuid::new_v4())
            .await
            .expect_err("unknown session should be rejected");
        assert!(matches!(err, StoreError::UnknownSession(_)));
    }

    #[tokio::test]
    async fn second_turn_is_rejected_while_first_in_progress() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await;

        let (_history, permit) = store
            .begin_turn(session.id)
            .await
            .expect("first turn claims the session");

        let err = store
            .begin_turn(session.id)
            .await
            .expect_err("concurrent turn should be rejected");
        assert!(matches!(err, StoreError::SessionBusy(_)));

        drop(permit);
        store
            .begin_turn(session.id)
            .await
            .expect("session is free again after the permit drops");
    }

    #[tokio::test]
    async fn commit_appends_in_order_and_releases_the_session() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await;

        let (history, permit) = store.begin_turn(session.id).await.expect("claim turn");
        assert!(history.is_empty());

        let turn = vec![
            Message::User {
                text: "hi".to_string(),
            },
            Message::Assistant {
                text: "hello".to_string(),
                tool_calls: vec![],
            },
        ];
        store
            .commit_turn(permit, turn.clone())
            .await
            .expect("commit turn");

        let (history, _permit) = store
            .begin_turn(session.id)
            .await
            .expect("session released after commit");
        assert_eq!(history, turn);
    }

    #[tokio::test]
    async fn abandoned_turn_leaves_history_unchanged() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await;

        let (_history, permit) = store.begin_turn(session.id).await.expect("claim turn");
        store
            .commit_turn(permit, vec![Message::User { text: "one".to_string() }])
            .await
            .expect("commit first turn");

        // Second turn is abandoned: the permit drops without a commit.
        {
            let (_history, _permit) = store.begin_turn(session.id).await.expect("claim turn");
        }

        let fetched = store.get_session(session.id).await.expect("session exists");
        assert_eq!(fetched.history.len(), 1);
    }

    #[tokio::test]
    async fn tool_result_messages_round_trip_through_commit() {
        let store = InMemorySessionStore::new();
        let session = store.create_session().await;
        let (_history, permit) = store.begin_turn(session.id).await.expect("claim turn");

        let call = ToolCall {
            id: "call_1".to_string(),
            name: "web_search".to_string(),
            arguments: json!({ "query": "weather" }),
        };
        store
            .commit_turn(
                permit,
                vec![
                    Message::User { text: "weather?".to_string() },
                    Message::Assistant {
                        text: String::new(),
                        tool_calls: vec![call.clone()],
                    },
                    Message::ToolResult {
                        tool_call_id: call.id.clone(),
                        tool_name: call.name.clone(),
                        payload: json!([{ "url": "https://example.com" }]),
                    },
                ],
            )
            .await
            .expect("commit turn");

        let fetched = store.get_session(session.id).await.expect("session exists");
        assert_eq!(fetched.history.len(), 3);
        match &fetched.history[2] {
            Message::ToolResult { tool_call_id, .. } => assert_eq!(tool_call_id, &call.id),
            other => panic!("expected tool result, got {:?}", other),
        }
    }
}
