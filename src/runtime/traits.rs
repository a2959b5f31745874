//! Trait abstractions for runtime I/O
//!
//! The runtime only talks to storage through `SessionStore`, so tests can
//! swap in a failing or recording implementation.

use crate::session::{CallSession, SessionUpdate, Speaker, Turn};
use crate::store::StoreResult;
use async_trait::async_trait;
use std::sync::Arc;

/// Repository for call sessions, keyed by session id
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Add a new session. Fails if the id is taken.
    async fn insert_session(&self, session: CallSession) -> StoreResult<()>;

    async fn get_session(&self, id: &str) -> StoreResult<CallSession>;

    /// All sessions in creation order
    async fn list_sessions(&self) -> StoreResult<Vec<CallSession>>;

    /// Append a transcript turn stamped with the current time
    async fn append_turn(
        &self,
        session_id: &str,
        speaker: Speaker,
        message: &str,
    ) -> StoreResult<Turn>;

    /// Apply a partial update and return the updated record
    async fn update_session(&self, id: &str, update: SessionUpdate) -> StoreResult<CallSession>;
}

// ============================================================================
// Arc implementation for trait objects
// ============================================================================

#[async_trait]
impl<T: SessionStore + ?Sized> SessionStore for Arc<T> {
    async fn insert_session(&self, session: CallSession) -> StoreResult<()> {
        (**self).insert_session(session).await
    }

    async fn get_session(&self, id: &str) -> StoreResult<CallSession> {
        (**self).get_session(id).await
    }

    async fn list_sessions(&self) -> StoreResult<Vec<CallSession>> {
        (**self).list_sessions().await
    }

    async fn append_turn(
        &self,
        session_id: &str,
        speaker: Speaker,
        message: &str,
    ) -> StoreResult<Turn> {
        (**self).append_turn(session_id, speaker, message).await
    }

    async fn update_session(&self, id: &str, update: SessionUpdate) -> StoreResult<CallSession> {
        (**self).update_session(id, update).await
    }
}
