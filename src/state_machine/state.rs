//! Call state types

use crate::engine::TransferReason;
use crate::session::CallStatus;
use serde::{Deserialize, Serialize};

/// Call state
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CallState {
    /// Configured, not yet dialed
    #[default]
    Pending,

    /// Call in progress
    Active {
        /// Whole timer periods since the caller last spoke
        silent_secs: u32,
        /// A caller turn is with the engine
        awaiting_reply: bool,
    },

    /// Ended by the operator, summary stored
    Completed,

    /// Handed to a human
    Transferred { reason: TransferReason },

    Failed { message: String },
}

impl CallState {
    pub fn active() -> Self {
        CallState::Active {
            silent_secs: 0,
            awaiting_reply: false,
        }
    }

    pub fn status(&self) -> CallStatus {
        match self {
            CallState::Pending => CallStatus::Pending,
            CallState::Active { .. } => CallStatus::Active,
            CallState::Completed => CallStatus::Completed,
            CallState::Transferred { .. } => CallStatus::Transferred,
            CallState::Failed { .. } => CallStatus::Failed,
        }
    }

    /// Check if this is a terminal state (cannot transition out)
    pub fn is_terminal(&self) -> bool {
        self.status().is_final()
    }
}

/// Context for a call (immutable configuration)
#[derive(Debug, Clone)]
pub struct CallContext {
    pub session_id: String,
    /// Seconds of silence before the call is transferred
    pub silence_threshold: u32,
}

impl CallContext {
    pub fn new(session_id: impl Into<String>, silence_threshold: u32) -> Self {
        Self {
            session_id: session_id.into(),
            silence_threshold,
        }
    }
}
