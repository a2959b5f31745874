//! Effects produced by state transitions

use crate::session::Speaker;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Record the opening statement as the first assistant turn
    SpeakOpening,

    /// Append a transcript turn
    AppendTurn { speaker: Speaker, message: String },

    /// Ask the engine for a reply to the caller's turn
    ConsultEngine { utterance: String },

    StampStart,
    StampEnd,

    /// Build and store the post-call summary from the elapsed time
    GenerateSummary,

    /// Persist the new state
    PersistState,

    /// Tell subscribers how long the caller has been silent
    NotifySilence { elapsed: u32, threshold: u32 },
}

impl Effect {
    pub fn caller_turn(message: impl Into<String>) -> Self {
        Effect::AppendTurn {
            speaker: Speaker::Caller,
            message: message.into(),
        }
    }

    pub fn assistant_turn(message: impl Into<String>) -> Self {
        Effect::AppendTurn {
            speaker: Speaker::Assistant,
            message: message.into(),
        }
    }
}
