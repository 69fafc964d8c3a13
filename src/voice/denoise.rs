//! Noise filtering
//!
//! Applied to inbound audio before voice-activity detection. The contract
//! is pass-through: a filter may rewrite samples in place but never changes
//! frame timing or rate.

use super::AudioFrame;

/// Filters noise out of inbound audio frames
pub trait NoiseFilter: Send + Sync {
    /// Rewrite the frame's samples in place
    fn apply(&mut self, frame: &mut AudioFrame);
}

/// The identity filter
pub struct Passthrough;

impl NoiseFilter for Passthrough {
    fn apply(&mut self, _frame: &mut AudioFrame) {}
}
