//! Test harness for the call runtime
//!
//! Drives a `CallRuntime` directly, without spawning, so every event is
//! fully processed before the test inspects the store.

use super::executor::CallRuntime;
use super::traits::SessionStore;
use super::{CallError, CallUpdate};
use crate::config::tests::sample_input;
use crate::config::CallConfig;
use crate::engine::{ConversationEngine, FixedLeadIn};
use crate::session::{CallSession, SessionUpdate, Speaker, Turn};
use crate::state_machine::{CallContext, Event};
use crate::store::{InMemorySessionStore, StoreError, StoreResult};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

// ============================================================================
// Store that can be switched into a failing mode
// ============================================================================

/// Wraps the in-memory store; once tripped, every write fails
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: InMemorySessionStore,
    broken: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn trip(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    pub fn repair(&self) {
        self.broken.store(false, Ordering::SeqCst);
    }

    fn check(&self, id: &str) -> StoreResult<()> {
        if self.broken.load(Ordering::SeqCst) {
            Err(StoreError::SessionNotFound(id.to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn insert_session(&self, session: CallSession) -> StoreResult<()> {
        self.check(&session.id)?;
        self.inner.insert_session(session).await
    }

    async fn get_session(&self, id: &str) -> StoreResult<CallSession> {
        self.inner.get_session(id).await
    }

    async fn list_sessions(&self) -> StoreResult<Vec<CallSession>> {
        self.inner.list_sessions().await
    }

    async fn append_turn(
        &self,
        session_id: &str,
        speaker: Speaker,
        message: &str,
    ) -> StoreResult<Turn> {
        self.check(session_id)?;
        self.inner.append_turn(session_id, speaker, message).await
    }

    async fn update_session(&self, id: &str, update: SessionUpdate) -> StoreResult<CallSession> {
        self.check(id)?;
        self.inner.update_session(id, update).await
    }
}

// ============================================================================
// Test call builder
// ============================================================================

pub struct TestCall<S: SessionStore + Clone + 'static> {
    pub runtime: CallRuntime<S>,
    pub store: S,
    pub session_id: String,
    pub updates: broadcast::Receiver<CallUpdate>,
    /// Kept so the runtime's receiver stays open
    _event_tx: mpsc::Sender<Event>,
}

impl<S: SessionStore + Clone + 'static> TestCall<S> {
    pub async fn with_store(store: S, config: CallConfig) -> Self {
        let session = CallSession::new(config.clone());
        let session_id = session.id.clone();
        store.insert_session(session).await.unwrap();

        let engine = ConversationEngine::with_picker(config.clone(), Box::new(FixedLeadIn(0)));
        let (event_tx, event_rx) = mpsc::channel(8);
        let (broadcast_tx, updates) = broadcast::channel(64);
        let runtime = CallRuntime::new(
            CallContext::new(&session_id, config.silence_threshold_secs()),
            engine,
            store.clone(),
            event_rx,
            broadcast_tx,
        );

        Self {
            runtime,
            store,
            session_id,
            updates,
            _event_tx: event_tx,
        }
    }

    pub async fn process(&mut self, event: Event) -> Result<(), CallError> {
        self.runtime.process_event(event).await
    }

    pub async fn say(&mut self, text: &str) -> Result<(), CallError> {
        self.process(Event::CallerUtterance {
            text: text.to_string(),
        })
        .await
    }

    pub async fn session(&self) -> CallSession {
        self.store.get_session(&self.session_id).await.unwrap()
    }

    pub async fn messages(&self) -> Vec<(Speaker, String)> {
        self.session()
            .await
            .turns
            .into_iter()
            .map(|t| (t.speaker, t.message))
            .collect()
    }

    pub fn drain_updates(&mut self) -> Vec<CallUpdate> {
        let mut out = Vec::new();
        while let Ok(update) = self.updates.try_recv() {
            out.push(update);
        }
        out
    }
}

impl TestCall<InMemorySessionStore> {
    pub async fn new() -> Self {
        Self::with_store(InMemorySessionStore::new(), sample_input().into_config().unwrap()).await
    }

    pub async fn with_silence_threshold(secs: u32) -> Self {
        let mut input = sample_input();
        input.handoff_conditions.silence_threshold = secs;
        Self::with_store(InMemorySessionStore::new(), input.into_config().unwrap()).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{
        TransferReason, CLARIFY_REPLY, HUMAN_REQUEST_REPLY, OUT_OF_SCOPE_HANDOFF_REPLY,
        REPROMPT_REPLY,
    };
    use crate::runtime::SessionManager;
    use crate::session::CallStatus;
    use crate::state_machine::{CallState, TransitionError};
    use std::time::Duration;

    const OPENING: &str = "Hello, this is NovaCall, an AI assistant calling on behalf of Manohar Kumar Sah. The purpose of this call is: Follow up on AI/ML job application. How are you today?";

    #[tokio::test]
    async fn test_start_records_opening_turn() {
        let mut call = TestCall::new().await;
        call.process(Event::StartCall).await.unwrap();

        let session = call.session().await;
        assert_eq!(session.status, CallStatus::Active);
        assert!(session.start_time.is_some());
        assert!(session.end_time.is_none());
        assert_eq!(
            call.messages().await,
            vec![(Speaker::Assistant, OPENING.to_string())]
        );
    }

    #[tokio::test]
    async fn test_in_scope_exchange() {
        let mut call = TestCall::new().await;
        call.process(Event::StartCall).await.unwrap();
        call.say("I want to talk about the job application").await.unwrap();

        let messages = call.messages().await;
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages[1],
            (
                Speaker::Caller,
                "I want to talk about the job application".to_string()
            )
        );
        assert_eq!(
            messages[2],
            (
                Speaker::Assistant,
                "Absolutely, Follow up on job application".to_string()
            )
        );
        assert_eq!(call.session().await.status, CallStatus::Active);
        assert_eq!(
            *call.runtime.state(),
            CallState::Active {
                silent_secs: 0,
                awaiting_reply: false
            }
        );
    }

    #[tokio::test]
    async fn test_blank_utterance_reprompts_without_turn() {
        let mut call = TestCall::new().await;
        call.process(Event::StartCall).await.unwrap();
        call.say("   ").await.unwrap();

        let messages = call.messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], (Speaker::Assistant, REPROMPT_REPLY.to_string()));
        assert_eq!(call.session().await.clarification_attempts, 0);
    }

    #[tokio::test]
    async fn test_human_request_transfers() {
        let mut call = TestCall::new().await;
        call.process(Event::StartCall).await.unwrap();
        call.say("Can I speak with Manohar?").await.unwrap();

        let session = call.session().await;
        assert_eq!(session.status, CallStatus::Transferred);
        assert_eq!(session.transfer_reason, Some(TransferReason::CallerRequested));
        assert!(session.end_time.is_some());
        assert!(session.summary.is_none());

        let messages = call.messages().await;
        assert_eq!(messages[2].1, HUMAN_REQUEST_REPLY);
        assert_eq!(
            messages[3],
            (
                Speaker::Assistant,
                "Call transferred to Manohar. Reason: Caller requested to speak with Manohar"
                    .to_string()
            )
        );
    }

    #[tokio::test]
    async fn test_out_of_scope_twice_transfers_and_mirrors_counter() {
        let mut call = TestCall::new().await;
        call.process(Event::StartCall).await.unwrap();

        call.say("What's the weather today?").await.unwrap();
        let session = call.session().await;
        assert_eq!(session.clarification_attempts, 1);
        assert_eq!(session.status, CallStatus::Active);
        assert_eq!(session.turns.last().unwrap().message, CLARIFY_REPLY);

        call.say("What's the weather today?").await.unwrap();
        let session = call.session().await;
        assert_eq!(session.clarification_attempts, 2);
        assert_eq!(session.status, CallStatus::Transferred);
        assert_eq!(session.transfer_reason, Some(TransferReason::OutOfScope));
        let n = session.turns.len();
        assert_eq!(session.turns[n - 2].message, OUT_OF_SCOPE_HANDOFF_REPLY);
        assert_eq!(
            session.turns[n - 1].message,
            "Call transferred to Manohar. Reason: Question outside prepared scope after 2 clarification attempts"
        );
    }

    #[tokio::test]
    async fn test_end_call_stores_summary() {
        let mut call = TestCall::new().await;
        call.process(Event::StartCall).await.unwrap();
        call.say("about the interview").await.unwrap();
        call.process(Event::EndCall).await.unwrap();

        let session = call.session().await;
        assert_eq!(session.status, CallStatus::Completed);
        let summary = session.summary.clone().unwrap();
        assert!(summary.starts_with("Call Summary:\nDuration: 0 minutes 0 seconds"));
        assert!(summary.contains("- Total exchanges: 3"));
        assert!(summary.contains("- Caller responses: 1"));
        assert!(summary.contains("- AI responses: 2"));

        let updates = call.drain_updates();
        assert!(updates
            .iter()
            .any(|u| matches!(u, CallUpdate::Summary { summary: s } if *s == summary)));
    }

    #[tokio::test]
    async fn test_silence_ticks_transfer_at_threshold() {
        let mut call = TestCall::with_silence_threshold(3).await;
        call.process(Event::StartCall).await.unwrap();

        call.process(Event::SilenceTick).await.unwrap();
        call.process(Event::SilenceTick).await.unwrap();
        assert_eq!(call.session().await.status, CallStatus::Active);

        // Speaking resets the count
        call.say("about the interview").await.unwrap();
        call.process(Event::SilenceTick).await.unwrap();
        call.process(Event::SilenceTick).await.unwrap();
        assert_eq!(call.session().await.status, CallStatus::Active);

        call.process(Event::SilenceTick).await.unwrap();
        let session = call.session().await;
        assert_eq!(session.status, CallStatus::Transferred);
        assert_eq!(session.transfer_reason, Some(TransferReason::SilenceThreshold));

        let silence: Vec<_> = call
            .drain_updates()
            .into_iter()
            .filter_map(|u| match u {
                CallUpdate::Silence { elapsed, threshold } => Some((elapsed, threshold)),
                _ => None,
            })
            .collect();
        assert_eq!(silence, vec![(1, 3), (2, 3), (1, 3), (2, 3)]);
    }

    #[tokio::test]
    async fn test_manual_transfer_then_events_rejected() {
        let mut call = TestCall::new().await;
        call.process(Event::StartCall).await.unwrap();
        call.process(Event::TransferRequested).await.unwrap();

        let session = call.session().await;
        assert_eq!(session.transfer_reason, Some(TransferReason::Manual));

        let err = call.say("hello?").await.unwrap_err();
        assert!(matches!(
            err,
            CallError::Transition(TransitionError::CallEnded(_))
        ));
        assert!(call
            .drain_updates()
            .iter()
            .any(|u| matches!(u, CallUpdate::Error { .. })));
        // Rejected turns leave the transcript alone
        assert_eq!(call.session().await.turns.len(), 2);
    }

    #[tokio::test]
    async fn test_utterance_before_start_is_rejected() {
        let mut call = TestCall::new().await;
        let err = call.say("hello").await.unwrap_err();
        assert!(matches!(
            err,
            CallError::Transition(TransitionError::NotStarted)
        ));
        assert!(call.session().await.turns.is_empty());
    }

    #[tokio::test]
    async fn test_fail_marks_session_failed() {
        let mut call = TestCall::new().await;
        call.process(Event::Fail {
            message: "line busy".into(),
        })
        .await
        .unwrap();
        let session = call.session().await;
        assert_eq!(session.status, CallStatus::Failed);
        assert!(session.summary.is_none());
    }

    #[tokio::test]
    async fn test_store_errors_propagate() {
        let store = FlakyStore::default();
        let mut call = TestCall::with_store(store.clone(), sample_input().into_config().unwrap()).await;
        store.trip();
        let err = call.process(Event::StartCall).await.unwrap_err();
        assert!(matches!(err, CallError::Store(_)));
        assert_eq!(*call.runtime.state(), CallState::Pending);
    }

    #[tokio::test]
    async fn test_failed_turn_restores_state_and_call_continues() {
        let store = FlakyStore::default();
        let mut call = TestCall::with_store(store.clone(), sample_input().into_config().unwrap()).await;
        call.process(Event::StartCall).await.unwrap();

        store.trip();
        let err = call.say("about the interview").await.unwrap_err();
        assert!(matches!(err, CallError::Store(_)));
        assert_eq!(*call.runtime.state(), CallState::active());
        assert!(call
            .drain_updates()
            .iter()
            .any(|u| matches!(u, CallUpdate::Error { .. })));

        store.repair();
        call.say("about the interview").await.unwrap();
        let messages = call.messages().await;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1].1, "about the interview");
        assert_eq!(
            *call.runtime.state(),
            CallState::Active {
                silent_secs: 0,
                awaiting_reply: false
            }
        );

        // Silence ticks count again once the turn went through
        call.process(Event::SilenceTick).await.unwrap();
        assert_eq!(
            *call.runtime.state(),
            CallState::Active {
                silent_secs: 1,
                awaiting_reply: false
            }
        );
    }

    #[tokio::test]
    async fn test_failed_transfer_persist_keeps_call_live() {
        let store = FlakyStore::default();
        let mut call = TestCall::with_store(store.clone(), sample_input().into_config().unwrap()).await;
        call.process(Event::StartCall).await.unwrap();

        store.trip();
        assert!(call.process(Event::TransferRequested).await.is_err());
        assert_eq!(*call.runtime.state(), CallState::active());
        assert_eq!(call.session().await.status, CallStatus::Active);

        store.repair();
        call.process(Event::TransferRequested).await.unwrap();
        assert_eq!(call.session().await.status, CallStatus::Transferred);
    }

    #[tokio::test]
    async fn test_runtime_future_can_be_spawned() {
        fn assert_send<T: Send>(_: &T) {}

        let call = TestCall::new().await;
        let run = call.runtime.run();
        assert_send(&run);
    }

    #[tokio::test]
    async fn test_spawned_call_through_manager() {
        let manager = SessionManager::new(InMemorySessionStore::new(), None);
        let handle = manager
            .create_call(sample_input().into_config().unwrap())
            .await
            .unwrap();
        let mut updates = handle.subscribe();

        handle.start().await.unwrap();
        handle.say("talk to a real person").await.unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(CallUpdate::Status {
                    status: CallStatus::Transferred,
                    transfer_reason,
                }) = updates.recv().await
                {
                    return transfer_reason;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(reason, Some(TransferReason::CallerRequested));

        let history = manager.history().await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, handle.session_id);
        assert_eq!(history[0].turns.len(), 4);
    }

    #[tokio::test]
    async fn test_silence_timer_fires_in_spawned_runtime() {
        let mut input = sample_input();
        input.handoff_conditions.silence_threshold = 2;
        let manager = SessionManager::new(InMemorySessionStore::new(), Some(Duration::from_millis(20)));
        let handle = manager.create_call(input.into_config().unwrap()).await.unwrap();
        let mut updates = handle.subscribe();
        handle.start().await.unwrap();

        let reason = tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if let Ok(CallUpdate::Status {
                    status: CallStatus::Transferred,
                    transfer_reason,
                }) = updates.recv().await
                {
                    return transfer_reason;
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(reason, Some(TransferReason::SilenceThreshold));
    }
}
