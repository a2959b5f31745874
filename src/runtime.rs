//! Runtime for executing calls
//!
//! Each call gets its own task that owns the conversation engine and
//! serializes every event through the state machine.

mod executor;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::CallRuntime;
pub use traits::*;

use crate::config::CallConfig;
use crate::engine::{ConversationEngine, TransferReason};
use crate::session::{CallSession, CallStatus, Turn};
use crate::state_machine::{CallContext, Event, TransitionError};
use crate::store::{finished_calls, StoreError};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Error)]
pub enum CallError {
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("Call runtime has stopped")]
    RuntimeStopped,
}

/// Updates pushed to whoever is rendering the call
#[derive(Debug, Clone)]
pub enum CallUpdate {
    Turn {
        turn: Turn,
    },
    Status {
        status: CallStatus,
        transfer_reason: Option<TransferReason>,
    },
    Silence {
        elapsed: u32,
        threshold: u32,
    },
    Summary {
        summary: String,
    },
    Error {
        message: String,
    },
}

/// Creates calls and spawns their runtimes
pub struct SessionManager<S>
where
    S: SessionStore + Clone + 'static,
{
    store: S,
    tick_period: Option<Duration>,
}

impl<S> SessionManager<S>
where
    S: SessionStore + Clone + 'static,
{
    pub fn new(store: S, tick_period: Option<Duration>) -> Self {
        Self { store, tick_period }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create a pending call with a fresh engine and start its runtime
    pub async fn create_call(&self, config: CallConfig) -> Result<CallHandle, CallError> {
        self.create_call_with_engine(ConversationEngine::new(config))
            .await
    }

    pub async fn create_call_with_engine(
        &self,
        engine: ConversationEngine,
    ) -> Result<CallHandle, CallError> {
        let session = CallSession::new(engine.config().clone());
        let session_id = session.id.clone();
        let context = CallContext::new(&session_id, session.config.silence_threshold_secs());
        self.store.insert_session(session).await?;

        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);

        let runtime = CallRuntime::new(
            context,
            engine,
            self.store.clone(),
            event_rx,
            broadcast_tx.clone(),
        )
        .with_silence_timer(self.tick_period);

        tokio::spawn(runtime.run());
        tracing::info!(session_id = %session_id, "Call created");

        Ok(CallHandle {
            session_id,
            event_tx,
            broadcast_tx,
        })
    }

    /// Completed and transferred calls, oldest first
    pub async fn history(&self) -> Result<Vec<CallSession>, CallError> {
        let sessions = self.store.list_sessions().await?;
        Ok(finished_calls(&sessions).into_iter().cloned().collect())
    }
}

/// Handle to interact with a running call
#[derive(Clone)]
pub struct CallHandle {
    pub session_id: String,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<CallUpdate>,
}

impl CallHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<CallUpdate> {
        self.broadcast_tx.subscribe()
    }

    pub async fn send(&self, event: Event) -> Result<(), CallError> {
        self.event_tx
            .send(event)
            .await
            .map_err(|_| CallError::RuntimeStopped)
    }

    pub async fn start(&self) -> Result<(), CallError> {
        self.send(Event::StartCall).await
    }

    pub async fn say(&self, text: impl Into<String>) -> Result<(), CallError> {
        self.send(Event::CallerUtterance { text: text.into() }).await
    }

    pub async fn transfer(&self) -> Result<(), CallError> {
        self.send(Event::TransferRequested).await
    }

    pub async fn end(&self) -> Result<(), CallError> {
        self.send(Event::EndCall).await
    }

    pub async fn fail(&self, message: impl Into<String>) -> Result<(), CallError> {
        self.send(Event::Fail {
            message: message.into(),
        })
        .await
    }
}
