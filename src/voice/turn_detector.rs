//! End-of-turn detection
//!
//! Given the transcript of a suspected turn, produce a confidence that the
//! speaker is actually done. Consulted only in the `Detecting` state; a low
//! score sends the controller back to `Listening` without losing the buffer.

use async_trait::async_trait;

use crate::Result;

/// Scores whether a transcript looks like a finished turn
#[async_trait]
pub trait TurnDetector: Send + Sync {
    /// Confidence in `[0.0, 1.0]` that the turn has ended
    async fn end_of_turn_confidence(&self, transcript: &str) -> Result<f32>;
}

/// Words that usually mean the speaker is mid-sentence
const TRAILING_CONTINUATIONS: &[&str] = &[
    "and", "but", "or", "so", "because", "then", "um", "uh", "like", "the", "a", "to",
];

/// Punctuation- and phrasing-based detector
///
/// Stands in for a hosted turn-detection model: terminal punctuation is a
/// strong end signal, a trailing conjunction or filler word a strong
/// continuation signal.
pub struct HeuristicTurnDetector;

#[async_trait]
impl TurnDetector for HeuristicTurnDetector {
    async fn end_of_turn_confidence(&self, transcript: &str) -> Result<f32> {
        let trimmed = transcript.trim();
        if trimmed.is_empty() {
            return Ok(0.0);
        }

        if trimmed.ends_with(['.', '!', '?']) {
            return Ok(0.95);
        }

        let last_word = trimmed
            .rsplit(|c: char| c.is_whitespace())
            .next()
            .unwrap_or("")
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        if TRAILING_CONTINUATIONS.contains(&last_word.as_str()) {
            return Ok(0.15);
        }

        Ok(0.7)
    }
}
