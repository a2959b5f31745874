//! Conversation decision engine
//!
//! Classifies each caller turn against the call's talking points and
//! decides whether to answer, ask for clarification, or hand off to
//! Manohar. One engine per call; the only mutable state is the
//! clarification counter.

mod lead_in;
pub mod scope;
mod summary;

pub use lead_in::{LeadInPicker, RandomLeadIn};
#[cfg(test)]
pub use lead_in::{FixedLeadIn, LEAD_IN_PHRASES};

use crate::config::CallConfig;
use crate::session::Turn;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ASSISTANT_NAME: &str = "NovaCall";
pub const PRINCIPAL_NAME: &str = "Manohar Kumar Sah";

/// Out-of-scope turns allowed before handing off
pub const CLARIFICATION_LIMIT: u32 = 2;

pub const REPROMPT_REPLY: &str = "I didn't catch that. Could you please repeat?";
pub const HUMAN_REQUEST_REPLY: &str = "Of course, let me connect you directly with Manohar.";
pub const CLARIFY_REPLY: &str = "I'm helping Manohar with scheduling and follow-ups. Could you clarify your question or let me know if you'd like to speak with Manohar directly?";
pub const OUT_OF_SCOPE_HANDOFF_REPLY: &str =
    "I want to make sure you get the best assistance. Let me connect you directly with Manohar.";

const RECORDING_DISCLOSURE: &str = "For quality and training purposes, this call may be recorded. ";

/// Why a call was handed to a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferReason {
    CallerRequested,
    OutOfScope,
    SilenceThreshold,
    Manual,
}

impl TransferReason {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferReason::CallerRequested => "Caller requested to speak with Manohar",
            TransferReason::OutOfScope => {
                "Question outside prepared scope after 2 clarification attempts"
            }
            TransferReason::SilenceThreshold => "Silence threshold exceeded",
            TransferReason::Manual => "Manual transfer requested",
        }
    }
}

impl fmt::Display for TransferReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's decision for one caller turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineReply {
    pub reply: String,
    /// Set when the call must be handed off
    pub transfer: Option<TransferReason>,
}

impl EngineReply {
    fn respond(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            transfer: None,
        }
    }

    fn hand_off(reply: impl Into<String>, reason: TransferReason) -> Self {
        Self {
            reply: reply.into(),
            transfer: Some(reason),
        }
    }

    pub fn should_transfer(&self) -> bool {
        self.transfer.is_some()
    }

    #[allow(dead_code)] // API completeness
    pub fn reason(&self) -> Option<&'static str> {
        self.transfer.map(TransferReason::as_str)
    }
}

pub struct ConversationEngine {
    config: CallConfig,
    clarification_count: u32,
    lead_in: Box<dyn LeadInPicker>,
}

impl ConversationEngine {
    pub fn new(config: CallConfig) -> Self {
        Self::with_picker(config, Box::new(RandomLeadIn::from_entropy()))
    }

    pub fn with_picker(config: CallConfig, lead_in: Box<dyn LeadInPicker>) -> Self {
        Self {
            config,
            clarification_count: 0,
            lead_in,
        }
    }

    pub fn config(&self) -> &CallConfig {
        &self.config
    }

    pub fn clarification_count(&self) -> u32 {
        self.clarification_count
    }

    /// Only needed when one engine is reused across unrelated calls
    #[allow(dead_code)]
    pub fn reset_clarification_count(&mut self) {
        self.clarification_count = 0;
    }

    pub fn produce_opening_statement(&self) -> String {
        let disclosure = if self.config.recording_consent {
            RECORDING_DISCLOSURE
        } else {
            ""
        };
        format!(
            "Hello, this is {ASSISTANT_NAME}, an AI assistant calling on behalf of {PRINCIPAL_NAME}. {disclosure}The purpose of this call is: {}. How are you today?",
            self.config.purpose
        )
    }

    /// Decide how to answer one caller turn.
    ///
    /// Rules are checked in order and the first match wins: blank input,
    /// explicit request for a person, out-of-scope question, in-scope
    /// answer. `_prior_turns` is accepted for callers that pass the
    /// transcript but is not consulted.
    pub fn produce_reply(&mut self, utterance: &str, _prior_turns: &[Turn]) -> EngineReply {
        if utterance.trim().is_empty() {
            return EngineReply::respond(REPROMPT_REPLY);
        }

        if scope::requests_human(utterance) {
            tracing::info!(config_id = %self.config.id, "Caller asked for a human");
            return EngineReply::hand_off(HUMAN_REQUEST_REPLY, TransferReason::CallerRequested);
        }

        if !scope::is_in_scope(&self.config.talking_points, utterance) {
            self.clarification_count += 1;
            tracing::debug!(
                config_id = %self.config.id,
                clarifications = self.clarification_count,
                "Utterance outside talking points"
            );

            if self.clarification_count >= CLARIFICATION_LIMIT {
                return EngineReply::hand_off(OUT_OF_SCOPE_HANDOFF_REPLY, TransferReason::OutOfScope);
            }
            return EngineReply::respond(CLARIFY_REPLY);
        }

        EngineReply::respond(self.contextual_reply(utterance))
    }

    fn contextual_reply(&mut self, utterance: &str) -> String {
        let point = scope::most_relevant_point(&self.config.talking_points, utterance)
            .and_then(|index| self.config.talking_points.get(index))
            .map_or("", String::as_str);
        let phrase = lead_in::choose(self.lead_in.as_mut());
        format!("{phrase}{point}")
    }

    pub fn produce_summary(&self, turns: &[Turn], duration_secs: u64) -> String {
        summary::render_summary(&self.config, turns, duration_secs)
    }
}
