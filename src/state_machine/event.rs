//! Events that can occur during a call

use crate::engine::EngineReply;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // Operator events
    StartCall,
    TransferRequested,
    EndCall,
    Fail { message: String },

    // Caller events
    CallerUtterance { text: String },

    // Engine events
    AssistantReply { reply: EngineReply },

    // Timer events
    /// One period of the silence timer elapsed
    SilenceTick,
}
