//! Speech-to-text transcription

use std::io::Cursor;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use crate::{Error, Result};

/// How long to wait between transcript status polls
const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Give up polling after this many attempts
const MAX_POLLS: u32 = 120;

/// Transcribes buffered speech to text
#[async_trait::async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe mono PCM to text
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<String>;
}

/// Response from the AssemblyAI upload endpoint
#[derive(serde::Deserialize)]
struct UploadResponse {
    upload_url: String,
}

/// Transcript job state
#[derive(serde::Deserialize)]
struct TranscriptResponse {
    id: String,
    status: String,
    text: Option<String>,
    error: Option<String>,
}

/// AssemblyAI transcription client
#[derive(Debug)]
pub struct AssemblyAi {
    client: reqwest::Client,
    api_key: SecretString,
    base_url: String,
}

impl AssemblyAi {
    /// Create a new client
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the API key is empty
    pub fn new(api_key: SecretString) -> Result<Self> {
        if api_key.expose_secret().is_empty() {
            return Err(Error::Config(
                "AssemblyAI API key required for transcription".to_string(),
            ));
        }

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.assemblyai.com/v2".to_string(),
        })
    }

    async fn upload(&self, wav: Vec<u8>) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/upload", self.base_url))
            .header("Authorization", self.api_key.expose_secret())
            .body(wav)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transcription(format!(
                "upload failed {status}: {body}"
            )));
        }

        let uploaded: UploadResponse = response.json().await?;
        Ok(uploaded.upload_url)
    }

    async fn start_transcript(&self, audio_url: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/transcript", self.base_url))
            .header("Authorization", self.api_key.expose_secret())
            .json(&serde_json::json!({ "audio_url": audio_url }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transcription(format!(
                "transcript request failed {status}: {body}"
            )));
        }

        let job: TranscriptResponse = response.json().await?;
        Ok(job.id)
    }

    async fn poll_transcript(&self, id: &str) -> Result<String> {
        for _ in 0..MAX_POLLS {
            let job: TranscriptResponse = self
                .client
                .get(format!("{}/transcript/{id}", self.base_url))
                .header("Authorization", self.api_key.expose_secret())
                .send()
                .await?
                .json()
                .await?;

            match job.status.as_str() {
                "completed" => return Ok(job.text.unwrap_or_default()),
                "error" => {
                    return Err(Error::Transcription(
                        job.error.unwrap_or_else(|| "unknown failure".to_string()),
                    ));
                }
                _ => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }

        Err(Error::Transcription(format!(
            "transcript {id} did not complete in time"
        )))
    }
}

#[async_trait::async_trait]
impl SpeechToText for AssemblyAi {
    async fn transcribe(&self, samples: &[i16], sample_rate: u32) -> Result<String> {
        tracing::debug!(samples = samples.len(), sample_rate, "starting transcription");

        let wav = samples_to_wav(samples, sample_rate)?;
        let audio_url = self.upload(wav).await?;
        let id = self.start_transcript(&audio_url).await?;
        let text = self.poll_transcript(&id).await?;

        tracing::info!(transcript = %text, "transcription complete");
        Ok(text)
    }
}

/// Encode mono PCM as an in-memory WAV file
///
/// # Errors
///
/// Returns `Error::Transcription` if encoding fails
pub fn samples_to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| Error::Transcription(e.to_string()))?;
        for &sample in samples {
            writer
                .write_sample(sample)
                .map_err(|e| Error::Transcription(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| Error::Transcription(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
