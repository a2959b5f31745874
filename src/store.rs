//! Session repository
//!
//! Sessions live for the lifetime of the process; nothing is written to
//! disk.

use crate::runtime::SessionStore;
use crate::session::{CallSession, CallStatus, SessionUpdate, Speaker, Turn};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Session not found: {0}")]
    SessionNotFound(String),
    #[error("Session already exists: {0}")]
    SessionExists(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Thread-safe in-memory session store
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, CallSession>,
    /// Creation order, for listing
    order: Vec<String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert_session(&self, session: CallSession) -> StoreResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.sessions.contains_key(&session.id) {
            return Err(StoreError::SessionExists(session.id));
        }
        inner.order.push(session.id.clone());
        inner.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    async fn get_session(&self, id: &str) -> StoreResult<CallSession> {
        self.inner
            .lock()
            .unwrap()
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))
    }

    async fn list_sessions(&self) -> StoreResult<Vec<CallSession>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.sessions.get(id).cloned())
            .collect())
    }

    async fn append_turn(
        &self,
        session_id: &str,
        speaker: Speaker,
        message: &str,
    ) -> StoreResult<Turn> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| StoreError::SessionNotFound(session_id.to_string()))?;
        let turn = Turn::new(session_id, speaker, message);
        session.turns.push(turn.clone());
        Ok(turn)
    }

    async fn update_session(&self, id: &str, update: SessionUpdate) -> StoreResult<CallSession> {
        let mut inner = self.inner.lock().unwrap();
        let session = inner
            .sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::SessionNotFound(id.to_string()))?;
        session.apply(update);
        Ok(session.clone())
    }
}

/// Calls that have finished talking, newest last
pub fn finished_calls(sessions: &[CallSession]) -> Vec<&CallSession> {
    sessions
        .iter()
        .filter(|s| matches!(s.status, CallStatus::Completed | CallStatus::Transferred))
        .collect()
}
