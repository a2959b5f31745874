//! Call configuration
//!
//! A `CallConfig` can only be obtained through validation, either from a
//! JSON file or from the interactive form, so the engine never sees an
//! empty talking-point list.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Silence threshold used when the form leaves it blank
pub const DEFAULT_SILENCE_THRESHOLD_SECS: u32 = 5;

const DEFAULT_TICK_MS: u64 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Phone number is required")]
    MissingPhoneNumber,
    #[error("Call purpose is required")]
    MissingPurpose,
    #[error("At least one talking point is required")]
    NoTalkingPoints,
    #[error("Silence threshold must be at least 1 second")]
    ZeroSilenceThreshold,
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid call configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// When the assistant should hand the call to a human
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HandoffConditions {
    pub request_for_human: bool,
    /// Seconds of caller silence before transferring
    pub silence_threshold: u32,
    pub unanticipated_questions: bool,
}

impl Default for HandoffConditions {
    fn default() -> Self {
        Self {
            request_for_human: true,
            silence_threshold: DEFAULT_SILENCE_THRESHOLD_SECS,
            unanticipated_questions: true,
        }
    }
}

/// Validated, immutable configuration for one outbound call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "CallConfigInput")]
pub struct CallConfig {
    pub id: String,
    pub phone_number: String,
    pub purpose: String,
    pub talking_points: Vec<String>,
    /// Display only; the engine never reads it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    pub handoff_conditions: HandoffConditions,
    pub recording_consent: bool,
}

impl CallConfig {
    pub fn silence_threshold_secs(&self) -> u32 {
        self.handoff_conditions.silence_threshold
    }
}

/// Raw configuration as collected from a form or a JSON file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CallConfigInput {
    pub id: Option<String>,
    pub phone_number: String,
    pub purpose: String,
    pub talking_points: Vec<String>,
    pub script: Option<String>,
    pub handoff_conditions: HandoffConditions,
    pub recording_consent: bool,
}

impl CallConfigInput {
    /// Validate at the boundary. Talking points are trimmed and blank
    /// entries dropped before the emptiness check.
    pub fn into_config(self) -> Result<CallConfig, ConfigError> {
        let phone_number = self.phone_number.trim().to_string();
        if phone_number.is_empty() {
            return Err(ConfigError::MissingPhoneNumber);
        }

        let purpose = self.purpose.trim().to_string();
        if purpose.is_empty() {
            return Err(ConfigError::MissingPurpose);
        }

        let talking_points: Vec<String> = self
            .talking_points
            .iter()
            .map(String::as_str)
            .map(str::trim)
            .filter(|point| !point.is_empty())
            .map(String::from)
            .collect();
        if talking_points.is_empty() {
            return Err(ConfigError::NoTalkingPoints);
        }

        if self.handoff_conditions.silence_threshold == 0 {
            return Err(ConfigError::ZeroSilenceThreshold);
        }

        let script = self.script.filter(|s| !s.trim().is_empty());

        Ok(CallConfig {
            id: self
                .id
                .unwrap_or_else(|| format!("call_{}", uuid::Uuid::new_v4())),
            phone_number,
            purpose,
            talking_points,
            script,
            handoff_conditions: self.handoff_conditions,
            recording_consent: self.recording_consent,
        })
    }
}

impl TryFrom<CallConfigInput> for CallConfig {
    type Error = ConfigError;

    fn try_from(input: CallConfigInput) -> Result<Self, Self::Error> {
        input.into_config()
    }
}

/// Split form text into talking points, one per non-blank line
pub fn parse_talking_points(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}

/// Load and validate a call configuration from a JSON file
pub fn load_call_config(path: &Path) -> Result<CallConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let input: CallConfigInput = serde_json::from_str(&raw)?;
    input.into_config()
}

/// Process settings read once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// JSON call configuration; prompts interactively when absent
    pub call_config_path: Option<PathBuf>,
    /// Silence timer period, `None` disables the timer
    pub tick_period: Option<Duration>,
}

impl AppConfig {
    /// `NOVACALL_CONFIG` (or the first positional argument) and
    /// `NOVACALL_TICK_MS`. A tick period of 0 disables the silence timer.
    pub fn from_env(mut args: impl Iterator<Item = String>) -> Self {
        let call_config_path = args
            .next()
            .or_else(|| std::env::var("NOVACALL_CONFIG").ok())
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);

        let tick_ms = std::env::var("NOVACALL_TICK_MS")
            .ok()
            .and_then(|ms| ms.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TICK_MS);

        Self {
            call_config_path,
            tick_period: (tick_ms > 0).then(|| Duration::from_millis(tick_ms)),
        }
    }
}
