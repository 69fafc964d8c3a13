//! Companion prompt construction

/// Fixed system instruction for the memory-companion persona
pub const SYSTEM_INSTRUCTION: &str = "\
You are a calm, supportive memory companion for individuals experiencing \
early-stage memory loss. Speak slowly, warmly, and reassuringly. Encourage \
recall gently and never mention \"forgetting\" or memory failure.";

/// Build the generation prompt for one utterance
///
/// The prompt is the fixed system instruction concatenated with the
/// transcript; no per-turn prompt engineering happens here.
#[must_use]
pub fn build_prompt(transcript: &str) -> String {
    format!("{SYSTEM_INSTRUCTION}\n\n{}", transcript.trim())
}
