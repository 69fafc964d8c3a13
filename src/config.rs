//! Configuration for the Solace companion
//!
//! All process-boundary configuration (room URL, signing credentials, vendor
//! API keys) is read once at startup. A missing required secret is a fatal
//! `Error::Config` at launch, never a runtime-recoverable condition.

use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

/// Companion configuration
#[derive(Debug)]
pub struct Config {
    /// Room media server URL (ws:// or wss://)
    pub room_url: String,

    /// Room to join
    pub room_name: String,

    /// Participant identity published to the room
    pub identity: String,

    /// Voice pipeline tuning
    pub voice: VoiceConfig,

    /// External service credentials
    pub api_keys: ApiKeys,
}

/// Voice pipeline configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Silence duration that closes a turn
    pub silence_threshold: Duration,

    /// End-of-turn confidence required to confirm a boundary
    pub turn_confidence: f32,

    /// Hard deadline for a single LLM generation, measured from dispatch
    pub generation_timeout: Duration,

    /// STT model identifier (e.g. "universal-streaming")
    pub stt_model: String,

    /// TTS model identifier (e.g. "sonic-2")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// LLM model identifier
    pub llm_model: String,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            silence_threshold: Duration::from_millis(1500),
            turn_confidence: 0.6,
            generation_timeout: Duration::from_secs(15),
            stt_model: "universal-streaming".to_string(),
            tts_model: "sonic-2".to_string(),
            tts_voice: "9626c31c-bec5-4cca-baa8-f8ba9e84c8bc".to_string(),
            llm_model: "claude-3-5-sonnet-20240620".to_string(),
        }
    }
}

/// API keys for external services
#[derive(Default)]
pub struct ApiKeys {
    /// Room API key (grant issuer id)
    pub room_api_key: String,

    /// Room API secret (grant signing key)
    pub room_api_secret: Option<SecretString>,

    /// Anthropic API key (generation)
    pub anthropic: Option<SecretString>,

    /// Cartesia API key (synthesis)
    pub cartesia: Option<SecretString>,

    /// AssemblyAI API key (transcription)
    pub assemblyai: Option<SecretString>,
}

impl std::fmt::Debug for ApiKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeys")
            .field("room_api_key", &self.room_api_key)
            .field("room_api_secret", &self.room_api_secret.is_some())
            .field("anthropic", &self.anthropic.is_some())
            .field("cartesia", &self.cartesia.is_some())
            .field("assemblyai", &self.assemblyai.is_some())
            .finish()
    }
}

impl Config {
    /// Load configuration from the environment
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if any required variable is absent or empty
    pub fn load(room_name: &str, identity: &str) -> Result<Self> {
        let room_url = require_env("SOLACE_ROOM_URL")?;
        let api_keys = ApiKeys {
            room_api_key: require_env("SOLACE_API_KEY")?,
            room_api_secret: Some(require_env("SOLACE_API_SECRET")?.into()),
            anthropic: optional_env("ANTHROPIC_API_KEY").map(Into::into),
            cartesia: optional_env("CARTESIA_API_KEY").map(Into::into),
            assemblyai: optional_env("ASSEMBLYAI_API_KEY").map(Into::into),
        };

        let mut voice = VoiceConfig::default();
        if let Some(ms) = optional_env("SOLACE_SILENCE_THRESHOLD_MS") {
            let ms = ms
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("SOLACE_SILENCE_THRESHOLD_MS: {e}")))?;
            voice.silence_threshold = Duration::from_millis(ms);
        }
        if let Some(secs) = optional_env("SOLACE_GENERATION_TIMEOUT_SECS") {
            let secs = secs
                .parse::<u64>()
                .map_err(|e| Error::Config(format!("SOLACE_GENERATION_TIMEOUT_SECS: {e}")))?;
            voice.generation_timeout = Duration::from_secs(secs);
        }
        if let Some(model) = optional_env("SOLACE_LLM_MODEL") {
            voice.llm_model = model;
        }

        Ok(Self {
            room_url,
            room_name: room_name.to_string(),
            identity: identity.to_string(),
            voice,
            api_keys,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| Error::Config(format!("{name} is required")))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_defaults() {
        let voice = VoiceConfig::default();
        assert_eq!(voice.silence_threshold, Duration::from_millis(1500));
        assert_eq!(voice.generation_timeout, Duration::from_secs(15));
        assert!(voice.turn_confidence > 0.0 && voice.turn_confidence < 1.0);
    }

    #[test]
    fn api_keys_debug_hides_secrets() {
        let keys = ApiKeys {
            room_api_key: "key".to_string(),
            room_api_secret: Some("very-secret".to_string().into()),
            ..Default::default()
        };
        let rendered = format!("{keys:?}");
        assert!(!rendered.contains("very-secret"));
    }
}
