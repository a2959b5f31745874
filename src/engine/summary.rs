//! Post-call summary text

use crate::config::CallConfig;
use crate::session::{Speaker, Turn};
use std::fmt::Write;

/// Render the summary block for a completed call.
///
/// Pure: the same config, turns and duration always give the same text.
pub fn render_summary(config: &CallConfig, turns: &[Turn], duration_secs: u64) -> String {
    let caller_turns = turns.iter().filter(|t| t.speaker == Speaker::Caller).count();
    let assistant_turns = turns
        .iter()
        .filter(|t| t.speaker == Speaker::Assistant)
        .count();

    let mut points = String::new();
    for (i, point) in config.talking_points.iter().enumerate() {
        if i > 0 {
            points.push('\n');
        }
        let _ = write!(points, "{}. {point}", i + 1);
    }

    format!(
        "Call Summary:\n\
         Duration: {minutes} minutes {seconds} seconds\n\
         Purpose: {purpose}\n\
         \n\
         Key Discussion Points:\n\
         {points}\n\
         \n\
         Conversation Flow:\n\
         - Total exchanges: {total}\n\
         - Caller responses: {caller_turns}\n\
         - AI responses: {assistant_turns}\n\
         \n\
         Outcome: Call completed successfully",
        minutes = duration_secs / 60,
        seconds = duration_secs % 60,
        purpose = config.purpose,
        total = turns.len(),
    )
}
