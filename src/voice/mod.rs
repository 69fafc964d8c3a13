//! Voice pipeline collaborators
//!
//! Narrow contracts for the external audio-processing stages: voice-activity
//! detection, end-of-turn detection, noise filtering, transcription, and
//! synthesis. The session orchestrator only ever talks to these traits.

mod denoise;
mod stt;
mod tts;
mod turn_detector;
mod vad;

pub use denoise::{NoiseFilter, Passthrough};
pub use stt::{AssemblyAi, SpeechToText, samples_to_wav};
pub use tts::{AudioStream, Cartesia, OUTPUT_SAMPLE_RATE, SpeechSynthesizer};
pub use turn_detector::{HeuristicTurnDetector, TurnDetector};
pub use vad::{EnergyVad, VadEvent, VoiceActivityDetector};

use chrono::{DateTime, Utc};

/// One frame of PCM audio moving through the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame {
    /// Signed 16-bit mono samples
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Capture time
    pub timestamp: DateTime<Utc>,
}

impl AudioFrame {
    /// Frame length in seconds
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_duration() {
        let frame = AudioFrame {
            samples: vec![0; 16_000],
            sample_rate: 16_000,
            timestamp: Utc::now(),
        };
        assert!((frame.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zero_rate_frame_has_no_duration() {
        let frame = AudioFrame {
            samples: vec![0; 100],
            sample_rate: 0,
            timestamp: Utc::now(),
        };
        assert!(frame.duration_secs().abs() < f64::EPSILON);
    }
}
