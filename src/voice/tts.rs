//! Speech synthesis

use std::pin::Pin;

use futures::{Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// PCM sample rate requested from the synthesizer
pub const OUTPUT_SAMPLE_RATE: u32 = 16_000;

/// Streamed synthesis output: raw PCM chunks as they arrive
///
/// The stream is cancellable mid-flight; dropping it aborts the transfer.
pub type AudioStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Synthesizes speech from text
#[async_trait::async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Start synthesis and stream audio bytes back
    async fn synthesize(&self, text: &str) -> Result<AudioStream>;
}

/// Cartesia streaming TTS client
#[derive(Debug)]
pub struct Cartesia {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    voice: String,
}

impl Cartesia {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the API key is empty
    pub fn new(api_key: SecretString, model: &str, voice: &str) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "Cartesia API key required for synthesis".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: model.to_string(),
            voice: voice.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl SpeechSynthesizer for Cartesia {
    async fn synthesize(&self, text: &str) -> Result<AudioStream> {
        #[derive(serde::Serialize)]
        struct Voice<'a> {
            mode: &'a str,
            id: &'a str,
        }

        #[derive(serde::Serialize)]
        struct OutputFormat<'a> {
            container: &'a str,
            encoding: &'a str,
            sample_rate: u32,
        }

        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model_id: &'a str,
            transcript: &'a str,
            voice: Voice<'a>,
            output_format: OutputFormat<'a>,
        }

        let request = TtsRequest {
            model_id: &self.model,
            transcript: text,
            voice: Voice {
                mode: "id",
                id: &self.voice,
            },
            output_format: OutputFormat {
                container: "raw",
                encoding: "pcm_s16le",
                sample_rate: OUTPUT_SAMPLE_RATE,
            },
        };

        let response = self
            .client
            .post("https://api.cartesia.ai/tts/bytes")
            .header("X-API-Key", self.api_key.expose_secret())
            .header("Cartesia-Version", "2024-06-10")
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Synthesis(format!(
                "Cartesia TTS error {status}: {body}"
            )));
        }

        tracing::debug!(chars = text.len(), "synthesis stream opened");

        let stream = response
            .bytes_stream()
            .map(|chunk| match chunk {
                Ok(bytes) => Ok(bytes.to_vec()),
                Err(e) => Err(Error::Synthesis(e.to_string())),
            });

        Ok(Box::pin(stream))
    }
}
