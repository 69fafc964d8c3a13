//! Solace Companion - real-time voice companion session core
//!
//! This library provides the orchestration core of a conversational voice
//! companion:
//! - Turn-taking state machine (listen → detect → think → speak)
//! - Session lifecycle with cooperative cancellation and barge-in
//! - Time-bounded room access grants
//! - Usage metric aggregation
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                     Room Transport                   │
//! │        audio in  │  audio out  │  access grant       │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │               Session Orchestrator                   │
//! │  Noise Filter → VAD → Turn Controller → STT/Detect  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              Generation & Synthesis                  │
//! │          LLM (reply)  │  TTS (playback)             │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! Transcription, synthesis, voice-activity detection, turn detection, and
//! the media transport are external collaborators behind narrow traits; the
//! state machine and its cancellation semantics live here.

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod prompt;
pub mod room;
pub mod session;
pub mod turn;
pub mod voice;

pub use auth::{AccessGrant, CredentialIssuer, RoomPermissions};
pub use config::{ApiKeys, Config, VoiceConfig};
pub use error::{Error, Result};
pub use llm::{AnthropicClient, LanguageModel};
pub use metrics::{MetricValue, UsageAggregator, UsageRecord, UsageSummary};
pub use room::{RoomConnection, RoomEvent, RoomTransport, WsRoomTransport};
pub use session::{Adapters, Session, SessionHandle, SessionOrchestrator};
pub use turn::{TurnController, TurnSignal, TurnState, Utterance};
