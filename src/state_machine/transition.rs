//! Pure state transition function
//!
//! Given the same state, context and event this always produces the same
//! result. All I/O happens in the runtime when it executes the effects.

use super::{CallContext, CallState, Effect, Event};
use crate::engine::TransferReason;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: CallState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: CallState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Call has not started yet")]
    NotStarted,
    #[error("Call is already in progress")]
    AlreadyStarted,
    #[error("Call has already ended ({0})")]
    CallEnded(String),
    #[error("Assistant is still answering the previous turn")]
    AssistantBusy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
pub fn transition(
    state: &CallState,
    context: &CallContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Terminal states accept nothing
        // ============================================================
        (state, _) if state.is_terminal() => {
            Err(TransitionError::CallEnded(state.status().to_string()))
        }

        // ============================================================
        // Starting
        // ============================================================
        (CallState::Pending, Event::StartCall) => Ok(TransitionResult::new(CallState::active())
            .with_effect(Effect::StampStart)
            .with_effect(Effect::SpeakOpening)
            .with_effect(Effect::PersistState)),

        (CallState::Active { .. }, Event::StartCall) => Err(TransitionError::AlreadyStarted),

        // ============================================================
        // Failure (reachable before or during the call)
        // ============================================================
        (CallState::Pending | CallState::Active { .. }, Event::Fail { message }) => {
            Ok(TransitionResult::new(CallState::Failed { message })
                .with_effect(Effect::StampEnd)
                .with_effect(Effect::PersistState))
        }

        (CallState::Pending, _) => Err(TransitionError::NotStarted),

        // ============================================================
        // Caller turns
        // ============================================================
        (CallState::Active { awaiting_reply: true, .. }, Event::CallerUtterance { .. }) => {
            Err(TransitionError::AssistantBusy)
        }

        (CallState::Active { silent_secs, .. }, Event::CallerUtterance { text }) => {
            // Blank input still gets the re-prompt but is not a turn
            // and does not count as the caller speaking.
            let spoke = !text.trim().is_empty();
            let silent_secs = if spoke { 0 } else { *silent_secs };

            let mut result = TransitionResult::new(CallState::Active {
                silent_secs,
                awaiting_reply: true,
            });
            if spoke {
                result = result.with_effect(Effect::caller_turn(text.clone()));
            }
            Ok(result.with_effect(Effect::ConsultEngine { utterance: text }))
        }

        (CallState::Active { awaiting_reply: true, silent_secs }, Event::AssistantReply { reply }) => {
            match reply.transfer {
                Some(reason) => Ok(transfer_to_human(reason)
                    .with_effect(Effect::assistant_turn(reply.reply))
                    .with_effects(transfer_effects(reason))),
                None => Ok(TransitionResult::new(CallState::Active {
                    silent_secs: *silent_secs,
                    awaiting_reply: false,
                })
                .with_effect(Effect::assistant_turn(reply.reply))),
            }
        }

        (CallState::Active { awaiting_reply: false, .. }, Event::AssistantReply { .. }) => Err(
            TransitionError::InvalidTransition("Reply received with no caller turn pending".into()),
        ),

        // ============================================================
        // Silence timer
        // ============================================================
        (CallState::Active { awaiting_reply: true, silent_secs }, Event::SilenceTick) => {
            Ok(TransitionResult::new(CallState::Active {
                silent_secs: *silent_secs,
                awaiting_reply: true,
            }))
        }

        (CallState::Active { silent_secs, .. }, Event::SilenceTick) => {
            let elapsed = silent_secs.saturating_add(1);
            if elapsed >= context.silence_threshold {
                let reason = TransferReason::SilenceThreshold;
                Ok(transfer_to_human(reason).with_effects(transfer_effects(reason)))
            } else {
                Ok(TransitionResult::new(CallState::Active {
                    silent_secs: elapsed,
                    awaiting_reply: false,
                })
                .with_effect(Effect::NotifySilence {
                    elapsed,
                    threshold: context.silence_threshold,
                }))
            }
        }

        // ============================================================
        // Operator actions
        // ============================================================
        (CallState::Active { .. }, Event::TransferRequested) => {
            let reason = TransferReason::Manual;
            Ok(transfer_to_human(reason).with_effects(transfer_effects(reason)))
        }

        (CallState::Active { .. }, Event::EndCall) => Ok(TransitionResult::new(CallState::Completed)
            .with_effect(Effect::StampEnd)
            .with_effect(Effect::GenerateSummary)
            .with_effect(Effect::PersistState)),

        // Unreachable in practice: terminal states are rejected first
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

fn transfer_to_human(reason: TransferReason) -> TransitionResult {
    TransitionResult::new(CallState::Transferred { reason })
}

/// Announce the hand-off and close the call
fn transfer_effects(reason: TransferReason) -> [Effect; 3] {
    [
        Effect::assistant_turn(transfer_notice(reason)),
        Effect::StampEnd,
        Effect::PersistState,
    ]
}

pub fn transfer_notice(reason: TransferReason) -> String {
    format!("Call transferred to Manohar. Reason: {reason}")
}
