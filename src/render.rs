//! Plain-text rendering for the terminal front end

use crate::runtime::CallUpdate;
use crate::session::{CallSession, Turn};
use std::fmt::Write;

pub fn short_duration(secs: u64) -> String {
    format!("{}m {}s", secs / 60, secs % 60)
}

pub fn transcript_line(turn: &Turn) -> String {
    format!(
        "[{}] {}: {}",
        turn.timestamp.format("%H:%M:%S"),
        turn.speaker,
        turn.message
    )
}

/// Line to print for a live update, if any
pub fn update_line(update: &CallUpdate) -> Option<String> {
    match update {
        CallUpdate::Turn { turn } => Some(transcript_line(turn)),
        CallUpdate::Status {
            status,
            transfer_reason,
        } => Some(match transfer_reason {
            Some(reason) => format!("-- status: {} ({reason})", status.as_str().to_uppercase()),
            None => format!("-- status: {}", status.as_str().to_uppercase()),
        }),
        CallUpdate::Silence { elapsed, threshold } => {
            Some(format!("-- silence: {elapsed}s / {threshold}s"))
        }
        CallUpdate::Summary { .. } => None,
        CallUpdate::Error { message } => Some(format!("!! {message}")),
    }
}

/// Full post-call card: details, talking points, summary and transcript
pub fn call_card(session: &CallSession) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Phone Number: {}", session.config.phone_number);
    let _ = writeln!(out, "Duration:     {}", short_duration(session.duration_secs()));
    let _ = writeln!(out, "Status:       {}", session.status);
    let _ = writeln!(out, "Exchanges:    {}", session.turns.len());
    if let Some(reason) = session.transfer_reason {
        let _ = writeln!(out, "Transferred:  {reason}");
    }
    let _ = writeln!(out, "\nPurpose\n  {}", session.config.purpose);

    let _ = writeln!(out, "\nTalking Points");
    for point in &session.config.talking_points {
        let _ = writeln!(out, "  - {point}");
    }

    if let Some(script) = &session.config.script {
        let _ = writeln!(out, "\nScript\n  {script}");
    }

    if let Some(summary) = &session.summary {
        let _ = writeln!(out, "\nAI Summary");
        for line in summary.lines() {
            let _ = writeln!(out, "  {line}");
        }
    }

    let _ = writeln!(out, "\nFull Transcript");
    for turn in &session.turns {
        let _ = writeln!(out, "  {}", transcript_line(turn));
    }
    out
}

/// One line per finished call
pub fn history_line(session: &CallSession) -> String {
    let started = session.start_time.map_or_else(
        || "N/A".to_string(),
        |t| t.format("%Y-%m-%d %H:%M:%S").to_string(),
    );
    let mut line = format!(
        "{}  [{}]  {}  Duration: {}",
        session.config.phone_number,
        session.status,
        started,
        short_duration(session.duration_secs())
    );
    if !session.turns.is_empty() {
        let _ = write!(line, "  {} exchanges", session.turns.len());
    }
    line
}
