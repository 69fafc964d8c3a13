//! Shared test fixtures: scripted collaborators and frame builders

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::mpsc;

use solace_companion::auth::{AccessGrant, CredentialIssuer, DEFAULT_TTL, RoomPermissions};
use solace_companion::room::{RoomConnection, RoomEvent, RoomTransport};
use solace_companion::voice::{AudioFrame, AudioStream, SpeechSynthesizer, SpeechToText, TurnDetector};
use solace_companion::{ApiKeys, Config, Error, LanguageModel, Result, VoiceConfig};

pub const SAMPLE_RATE: u32 = 16_000;

/// A loud 10ms frame (over the energy gate)
pub fn loud_frame(timestamp: DateTime<Utc>) -> AudioFrame {
    AudioFrame {
        samples: vec![8000; 160],
        sample_rate: SAMPLE_RATE,
        timestamp,
    }
}

/// A silent 10ms frame
pub fn quiet_frame(timestamp: DateTime<Utc>) -> AudioFrame {
    AudioFrame {
        samples: vec![0; 160],
        sample_rate: SAMPLE_RATE,
        timestamp,
    }
}

pub fn at(base: DateTime<Utc>, offset_ms: i64) -> DateTime<Utc> {
    base + TimeDelta::milliseconds(offset_ms)
}

/// Test config; no environment involved
pub fn test_config() -> Config {
    Config {
        room_url: "ws://rooms.test".to_string(),
        room_name: "memory-lane".to_string(),
        identity: "alice".to_string(),
        voice: VoiceConfig::default(),
        api_keys: ApiKeys::default(),
    }
}

pub fn test_grant() -> AccessGrant {
    CredentialIssuer::new("test-key", "test-secret".to_string().into())
        .unwrap()
        .issue(
            "alice",
            "memory-lane",
            RoomPermissions::participant("memory-lane"),
            DEFAULT_TTL,
        )
        .unwrap()
}

// --- Room transport ---

pub struct MockConnection {
    events: tokio::sync::Mutex<mpsc::Receiver<RoomEvent>>,
    pub published: Mutex<Vec<AudioFrame>>,
    pub closed: AtomicBool,
    pub log: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RoomConnection for MockConnection {
    async fn next_event(&self) -> Option<RoomEvent> {
        self.events.lock().await.recv().await
    }

    async fn publish_audio(&self, frame: AudioFrame) -> Result<()> {
        self.published.lock().unwrap().push(frame);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.log.lock().unwrap().push("close".to_string());
        Ok(())
    }
}

pub struct MockTransport {
    conn: Arc<MockConnection>,
    failures_left: AtomicU32,
    pub attempts: AtomicU32,
}

impl MockTransport {
    /// Transport plus the event feeder for the room
    pub fn new(failures_before_success: u32) -> (Arc<Self>, mpsc::Sender<RoomEvent>, Arc<MockConnection>) {
        let (tx, rx) = mpsc::channel(256);
        let conn = Arc::new(MockConnection {
            events: tokio::sync::Mutex::new(rx),
            published: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
            log: Arc::new(Mutex::new(Vec::new())),
        });
        let transport = Arc::new(Self {
            conn: Arc::clone(&conn),
            failures_left: AtomicU32::new(failures_before_success),
            attempts: AtomicU32::new(0),
        });
        (transport, tx, conn)
    }
}

#[async_trait]
impl RoomTransport for MockTransport {
    async fn connect(&self, _url: &str, _grant: &AccessGrant) -> Result<Arc<dyn RoomConnection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(Error::Connection("room unreachable".to_string()));
        }
        Ok(Arc::clone(&self.conn) as Arc<dyn RoomConnection>)
    }
}

// --- Language model ---

pub enum LlmScript {
    Reply(&'static str),
    Fail,
    Hang,
}

pub struct MockLlm {
    script: Mutex<VecDeque<LlmScript>>,
    pub prompts: Mutex<Vec<String>>,
}

impl MockLlm {
    pub fn new(script: Vec<LlmScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for MockLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(LlmScript::Reply(text)) => Ok(text.to_string()),
            Some(LlmScript::Fail) => Err(Error::Generation("model refused".to_string())),
            Some(LlmScript::Hang) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(Error::Generation("unreachable".to_string()))
            }
            None => Ok("okay".to_string()),
        }
    }
}

// --- Synthesis ---

pub struct MockTts {
    pub calls: AtomicU32,
    endless: bool,
}

impl MockTts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            endless: false,
        })
    }

    /// A synthesizer whose stream never finishes on its own
    pub fn endless() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicU32::new(0),
            endless: true,
        })
    }
}

#[async_trait]
impl SpeechSynthesizer for MockTts {
    async fn synthesize(&self, _text: &str) -> Result<AudioStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let chunk: Vec<u8> = vec![0; 320];

        if self.endless {
            let stream = futures::stream::unfold(chunk, |chunk| async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Some((Ok(chunk.clone()), chunk))
            });
            Ok(Box::pin(stream))
        } else {
            let chunks: Vec<Result<Vec<u8>>> =
                (0..3).map(|_| Ok(chunk.clone())).collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
    }
}

// --- Transcription ---

pub enum SttScript {
    Text(&'static str),
    Fail,
}

pub struct MockStt {
    script: Mutex<VecDeque<SttScript>>,
    /// Sample count of every transcription request
    pub seen_samples: Mutex<Vec<usize>>,
}

impl MockStt {
    /// Scripted responses; once the script is exhausted every call
    /// transcribes to a fixed phrase
    pub fn new(script: Vec<SttScript>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            seen_samples: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl SpeechToText for MockStt {
    async fn transcribe(&self, samples: &[i16], _sample_rate: u32) -> Result<String> {
        self.seen_samples.lock().unwrap().push(samples.len());
        match self.script.lock().unwrap().pop_front() {
            Some(SttScript::Text(text)) => Ok(text.to_string()),
            Some(SttScript::Fail) => Err(Error::Transcription("garbled audio".to_string())),
            None => Ok("where did I leave my glasses?".to_string()),
        }
    }
}

// --- Turn detection ---

pub struct MockDetector {
    confidences: Mutex<VecDeque<f32>>,
}

impl MockDetector {
    pub fn new(confidences: Vec<f32>) -> Arc<Self> {
        Arc::new(Self {
            confidences: Mutex::new(confidences.into()),
        })
    }

    pub fn always_confirms() -> Arc<Self> {
        Self::new(Vec::new())
    }
}

#[async_trait]
impl TurnDetector for MockDetector {
    async fn end_of_turn_confidence(&self, _transcript: &str) -> Result<f32> {
        Ok(self.confidences.lock().unwrap().pop_front().unwrap_or(0.95))
    }
}

/// Poll until `check` passes or a generous deadline lapses
pub async fn eventually(check: impl Fn() -> bool, what: &str) {
    for _ in 0..2000 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never held: {what}");
}
