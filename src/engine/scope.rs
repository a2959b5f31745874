//! Keyword heuristics for classifying caller turns
//!
//! All matching is plain lowercase substring search with no word
//! boundaries, so "humanity" counts as asking for a human.

/// Phrases that mean the caller wants a person on the line
pub const HUMAN_REQUEST_KEYWORDS: &[&str] = &[
    "speak with manohar",
    "talk to manohar",
    "connect me to manohar",
    "human",
    "real person",
    "actual person",
];

/// Talking-point words at or below this many characters never count
const MIN_KEYWORD_CHARS: usize = 3;

/// Does the caller ask to be handed to a person?
pub fn requests_human(utterance: &str) -> bool {
    let input = utterance.to_lowercase();
    HUMAN_REQUEST_KEYWORDS
        .iter()
        .any(|keyword| input.contains(keyword))
}

/// Number of words from `point` found in the already-lowercased `input`.
///
/// The point is split on single spaces, so punctuation stays attached to
/// its word and repeated spaces yield empty words that never count.
pub fn match_count(point: &str, input: &str) -> usize {
    point
        .to_lowercase()
        .split(' ')
        .filter(|word| word.chars().count() > MIN_KEYWORD_CHARS && input.contains(word))
        .count()
}

/// True iff any talking point shares at least one keyword with the utterance
pub fn is_in_scope(talking_points: &[String], utterance: &str) -> bool {
    let input = utterance.to_lowercase();
    talking_points
        .iter()
        .any(|point| match_count(point, &input) > 0)
}

/// Index of the talking point with the most keyword matches.
///
/// Ties keep the earliest point. Returns `None` only for an empty list; a
/// list where nothing matches yields the first point.
pub fn most_relevant_point(talking_points: &[String], utterance: &str) -> Option<usize> {
    if talking_points.is_empty() {
        return None;
    }

    let input = utterance.to_lowercase();
    let mut best = 0;
    let mut best_matches = 0;
    for (index, point) in talking_points.iter().enumerate() {
        let matches = match_count(point, &input);
        if matches > best_matches {
            best = index;
            best_matches = matches;
        }
    }
    Some(best)
}
