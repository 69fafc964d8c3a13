//! Conversational turn state machine
//!
//! [`TurnController`] decides utterance boundaries from voice-activity
//! events and turn-detector verdicts. It is synchronous and clock-free: all
//! timing comes from event timestamps, which keeps every transition
//! deterministic under test.
//!
//! The `Detecting` state sits between `Listening` and `Thinking` so the
//! turn detector can veto a premature end-of-speech without losing buffered
//! audio; a vetoed boundary resumes `Listening` with the buffer intact.

use chrono::{DateTime, TimeDelta, Utc};

use crate::voice::VadEvent;

/// Conversation phase of a session
///
/// Exactly one state is active per session at any instant; transitions are
/// strictly sequential and never skip from `Listening` to `Speaking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    /// Waiting for speech
    Idle,
    /// Speech active, buffering the utterance
    Listening,
    /// Silence observed, awaiting the turn-detector verdict
    Detecting,
    /// Utterance handed to generation, reply pending
    Thinking,
    /// Reply synthesis playing back
    Speaking,
    /// Session torn down; no further transitions
    Closed,
}

impl std::fmt::Display for TurnState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Listening => "listening",
            Self::Detecting => "detecting",
            Self::Thinking => "thinking",
            Self::Speaking => "speaking",
            Self::Closed => "closed",
        };
        write!(f, "{name}")
    }
}

/// One finalized unit of speech by a single party
///
/// Immutable; produced when a turn boundary is confirmed and consumed once
/// by the session orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    /// Identity of the speaker
    pub speaker: String,
    /// Transcript text
    pub text: String,
    /// When speech began
    pub started_at: DateTime<Utc>,
    /// When the turn boundary was observed
    pub ended_at: DateTime<Utc>,
}

/// Action the orchestrator must take after feeding an event in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnSignal {
    /// Nothing to do
    None,
    /// Entered `Detecting`: transcribe the buffer and query the turn detector
    EvaluateTurn,
    /// Barge-in: abort the in-flight synthesis task now
    CancelSynthesis,
}

/// The turn-taking state machine
pub struct TurnController {
    speaker: String,
    state: TurnState,
    silence_threshold: TimeDelta,
    audio: Vec<i16>,
    transcript: String,
    started_at: Option<DateTime<Utc>>,
    last_voice: Option<DateTime<Utc>>,
    pending_end: Option<DateTime<Utc>>,
}

impl TurnController {
    /// Create a controller for one speaker
    ///
    /// `silence_threshold` is the quiet period after which a turn boundary
    /// is suspected.
    #[must_use]
    pub fn new(speaker: &str, silence_threshold: std::time::Duration) -> Self {
        Self {
            speaker: speaker.to_string(),
            state: TurnState::Idle,
            silence_threshold: TimeDelta::from_std(silence_threshold)
                .unwrap_or(TimeDelta::MAX),
            audio: Vec::new(),
            transcript: String::new(),
            started_at: None,
            last_voice: None,
            pending_end: None,
        }
    }

    /// Current state
    #[must_use]
    pub const fn state(&self) -> TurnState {
        self.state
    }

    /// Buffered PCM for the turn in progress
    #[must_use]
    pub fn audio(&self) -> &[i16] {
        &self.audio
    }

    /// Transcript accumulated for the turn in progress
    #[must_use]
    pub fn transcript(&self) -> &str {
        &self.transcript
    }

    /// When the buffered turn began, if one is in progress
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Feed one voice-activity event
    pub fn on_voice_activity(&mut self, event: &VadEvent) -> TurnSignal {
        match (self.state, event.active) {
            (TurnState::Idle, true) => {
                self.begin_turn(event.timestamp);
                tracing::debug!(speaker = %self.speaker, "voice detected, listening");
                TurnSignal::None
            }
            (TurnState::Listening, true) => {
                self.last_voice = Some(event.timestamp);
                TurnSignal::None
            }
            (TurnState::Listening, false) => {
                let silent_for = self
                    .last_voice
                    .map_or(TimeDelta::zero(), |last| event.timestamp - last);
                if silent_for >= self.silence_threshold {
                    self.state = TurnState::Detecting;
                    self.pending_end = Some(event.timestamp);
                    tracing::debug!(
                        silent_ms = silent_for.num_milliseconds(),
                        "silence threshold exceeded, detecting turn end"
                    );
                    TurnSignal::EvaluateTurn
                } else {
                    TurnSignal::None
                }
            }
            (TurnState::Detecting, true) => {
                // False end-of-speech: the speaker kept going. Resume
                // buffering, nothing emitted, nothing lost.
                self.state = TurnState::Listening;
                self.last_voice = Some(event.timestamp);
                self.pending_end = None;
                tracing::debug!("voice resumed during detection, back to listening");
                TurnSignal::None
            }
            (TurnState::Speaking, true) => {
                // Barge-in: the user talks over playback. The reply is
                // cancelled and a fresh turn starts at this instant.
                self.begin_turn(event.timestamp);
                tracing::info!(speaker = %self.speaker, "barge-in, cancelling playback");
                TurnSignal::CancelSynthesis
            }
            (TurnState::Thinking, true) => {
                tracing::trace!("voice activity during generation ignored");
                TurnSignal::None
            }
            _ => TurnSignal::None,
        }
    }

    /// Explicit end-of-turn signal from the audio pipeline
    pub fn on_end_of_turn(&mut self, timestamp: DateTime<Utc>) -> TurnSignal {
        if self.state == TurnState::Listening {
            self.state = TurnState::Detecting;
            self.pending_end = Some(timestamp);
            TurnSignal::EvaluateTurn
        } else {
            tracing::warn!(state = %self.state, "end-of-turn signal ignored");
            TurnSignal::None
        }
    }

    /// Append captured PCM to the turn buffer
    ///
    /// Only `Listening` and `Detecting` accumulate; other states discard.
    pub fn push_audio(&mut self, samples: &[i16]) {
        if matches!(self.state, TurnState::Listening | TurnState::Detecting) {
            self.audio.extend_from_slice(samples);
        }
    }

    /// Replace the transcript for the buffered turn (full-buffer STT)
    pub fn set_transcript(&mut self, text: &str) {
        self.transcript.clear();
        self.transcript.push_str(text);
    }

    /// Append a streamed transcript segment
    pub fn push_transcript(&mut self, text: &str) {
        if !self.transcript.is_empty() {
            self.transcript.push(' ');
        }
        self.transcript.push_str(text);
    }

    /// Turn detector confirmed the boundary: emit the utterance
    ///
    /// Returns `None` (and warns) outside `Detecting`; the single-flight
    /// invariant holds because this is the only place an utterance is born.
    pub fn confirm_turn(&mut self) -> Option<Utterance> {
        if self.state != TurnState::Detecting {
            tracing::warn!(state = %self.state, "turn confirmation ignored");
            return None;
        }
        let started_at = self.started_at.take()?;
        let ended_at = self.pending_end.take().unwrap_or(started_at);

        self.state = TurnState::Thinking;
        self.audio.clear();
        self.last_voice = None;

        let utterance = Utterance {
            speaker: self.speaker.clone(),
            text: std::mem::take(&mut self.transcript),
            started_at,
            ended_at,
        };
        tracing::info!(
            speaker = %utterance.speaker,
            chars = utterance.text.len(),
            "utterance finalized"
        );
        Some(utterance)
    }

    /// Turn detector rejected the boundary: resume listening
    ///
    /// All buffered audio and transcript are preserved.
    pub fn reject_turn(&mut self) {
        if self.state == TurnState::Detecting {
            self.state = TurnState::Listening;
            self.pending_end = None;
            tracing::debug!("turn end rejected, resuming");
        } else {
            tracing::warn!(state = %self.state, "turn rejection ignored");
        }
    }

    /// Generation produced a reply: move to playback
    pub fn on_generation_ready(&mut self) {
        if self.state == TurnState::Thinking {
            self.state = TurnState::Speaking;
        } else {
            tracing::warn!(state = %self.state, "generation result ignored");
        }
    }

    /// Generation failed or timed out: back to idle, no speech
    pub fn on_generation_failed(&mut self) {
        if self.state == TurnState::Thinking {
            self.state = TurnState::Idle;
        } else {
            tracing::warn!(state = %self.state, "generation failure ignored");
        }
    }

    /// Playback ran to completion
    pub fn on_playback_complete(&mut self) {
        if self.state == TurnState::Speaking {
            self.state = TurnState::Idle;
        } else {
            tracing::warn!(state = %self.state, "playback completion ignored");
        }
    }

    /// Force the terminal state; any buffered turn is dropped
    pub fn close(&mut self) {
        self.state = TurnState::Closed;
        self.audio.clear();
        self.transcript.clear();
        self.started_at = None;
        self.last_voice = None;
        self.pending_end = None;
    }

    fn begin_turn(&mut self, timestamp: DateTime<Utc>) {
        self.state = TurnState::Listening;
        self.audio.clear();
        self.transcript.clear();
        self.started_at = Some(timestamp);
        self.last_voice = Some(timestamp);
        self.pending_end = None;
    }
}
