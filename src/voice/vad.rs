//! Voice activity detection
//!
//! The detector contract is one `{active, timestamp}` event per frame; the
//! built-in implementation is a plain RMS energy gate. Model-backed
//! detectors plug in through the same trait.

use chrono::{DateTime, Utc};

use super::AudioFrame;

/// Minimum normalized RMS energy to consider speech
const ENERGY_THRESHOLD: f32 = 0.03;

/// One voice-activity observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VadEvent {
    /// Whether the frame contains speech
    pub active: bool,
    /// Timestamp of the observed frame
    pub timestamp: DateTime<Utc>,
}

/// Detects speech in audio frames
pub trait VoiceActivityDetector: Send + Sync {
    /// Load models or otherwise warm up before the session connects
    fn prewarm(&mut self) {}

    /// Classify one frame
    fn process(&mut self, frame: &AudioFrame) -> VadEvent;
}

/// Energy-gate detector over normalized RMS
pub struct EnergyVad {
    threshold: f32,
}

impl EnergyVad {
    /// Detector with the default speech threshold
    #[must_use]
    pub const fn new() -> Self {
        Self {
            threshold: ENERGY_THRESHOLD,
        }
    }

    /// Detector with a custom threshold
    #[must_use]
    pub const fn with_threshold(threshold: f32) -> Self {
        Self { threshold }
    }
}

impl Default for EnergyVad {
    fn default() -> Self {
        Self::new()
    }
}

impl VoiceActivityDetector for EnergyVad {
    fn prewarm(&mut self) {
        tracing::debug!(threshold = self.threshold, "energy VAD ready");
    }

    fn process(&mut self, frame: &AudioFrame) -> VadEvent {
        let energy = calculate_energy(&frame.samples);
        VadEvent {
            active: energy > self.threshold,
            timestamp: frame.timestamp,
        }
    }
}

/// Normalized RMS energy of signed 16-bit samples
#[allow(clippy::cast_precision_loss)]
fn calculate_energy(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples
        .iter()
        .map(|&s| {
            let normalized = f32::from(s) / f32::from(i16::MAX);
            normalized * normalized
        })
        .sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(samples: Vec<i16>) -> AudioFrame {
        AudioFrame {
            samples,
            sample_rate: 16_000,
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn silence_has_no_energy() {
        assert!(calculate_energy(&vec![0; 100]) < 0.001);
        assert!(calculate_energy(&[]) < 0.001);
    }

    #[test]
    fn loud_samples_have_energy() {
        let loud = vec![i16::MAX / 2; 100];
        assert!(calculate_energy(&loud) > 0.4);
    }

    #[test]
    fn detector_classifies_frames() {
        let mut vad = EnergyVad::new();

        let quiet = vad.process(&frame(vec![0; 160]));
        assert!(!quiet.active);

        let loud = vad.process(&frame(vec![8000; 160]));
        assert!(loud.active);
    }

    #[test]
    fn event_carries_frame_timestamp() {
        let mut vad = EnergyVad::new();
        let f = frame(vec![0; 160]);
        let event = vad.process(&f);
        assert_eq!(event.timestamp, f.timestamp);
    }
}
