//! Call session records
//!
//! The transcript and lifecycle data the runtime keeps for each call.

use crate::config::CallConfig;
use crate::engine::TransferReason;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Who said a transcript line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Assistant,
    Caller,
}

impl Speaker {
    pub fn label(self) -> &'static str {
        match self {
            Speaker::Assistant => "AI",
            Speaker::Caller => "Caller",
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single transcript entry. Never edited once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: String,
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub speaker: Speaker,
    pub message: String,
}

impl Turn {
    pub fn new(session_id: impl Into<String>, speaker: Speaker, message: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            timestamp: Utc::now(),
            speaker,
            message: message.into(),
        }
    }
}

/// Coarse lifecycle status of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CallStatus {
    #[default]
    Pending,
    Active,
    Completed,
    Transferred,
    Failed,
}

impl CallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            CallStatus::Pending => "pending",
            CallStatus::Active => "active",
            CallStatus::Completed => "completed",
            CallStatus::Transferred => "transferred",
            CallStatus::Failed => "failed",
        }
    }

    /// Completed, transferred and failed calls accept no further events
    pub fn is_final(self) -> bool {
        matches!(
            self,
            CallStatus::Completed | CallStatus::Transferred | CallStatus::Failed
        )
    }
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Call session record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallSession {
    pub id: String,
    pub config: CallConfig,
    pub status: CallStatus,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub turns: Vec<Turn>,
    /// Set once, when the call completes
    pub summary: Option<String>,
    pub clarification_attempts: u32,
    pub transfer_reason: Option<TransferReason>,
}

impl CallSession {
    pub fn new(config: CallConfig) -> Self {
        Self {
            id: format!("session_{}", uuid::Uuid::new_v4()),
            config,
            status: CallStatus::Pending,
            start_time: None,
            end_time: None,
            turns: Vec::new(),
            summary: None,
            clarification_attempts: 0,
            transfer_reason: None,
        }
    }

    /// Whole seconds between start and end, 0 if either is missing
    pub fn duration_secs(&self) -> u64 {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => {
                u64::try_from((end - start).num_seconds()).unwrap_or_default()
            }
            _ => 0,
        }
    }

    /// Apply a partial update. Fields left as `None` are untouched.
    pub fn apply(&mut self, update: SessionUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(start) = update.start_time {
            self.start_time = Some(start);
        }
        if let Some(end) = update.end_time {
            self.end_time = Some(end);
        }
        if let Some(summary) = update.summary {
            self.summary = Some(summary);
        }
        if let Some(count) = update.clarification_attempts {
            self.clarification_attempts = count;
        }
        if let Some(reason) = update.transfer_reason {
            self.transfer_reason = Some(reason);
        }
    }
}

/// Partial update for a session record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionUpdate {
    pub status: Option<CallStatus>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub clarification_attempts: Option<u32>,
    pub transfer_reason: Option<TransferReason>,
}

impl SessionUpdate {
    pub fn status(status: CallStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}
