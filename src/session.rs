//! Session orchestration
//!
//! One [`SessionOrchestrator`] owns one room connection and drives the full
//! pipeline: inbound audio → noise filter → VAD → [`TurnController`] →
//! STT + turn detector → LLM generation → TTS playback. Generation and
//! playback run as short-lived tasks whose handles the orchestrator keeps,
//! so barge-in and shutdown can cancel them cooperatively.
//!
//! Shutdown ordering is strict: the controller closes, in-flight tasks are
//! cancelled and awaited, and only then is the usage summary flushed to the
//! registered hook and the connection released.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::{Config, VoiceConfig};
use crate::llm::LanguageModel;
use crate::metrics::{MetricValue, UsageAggregator, UsageSummary};
use crate::prompt;
use crate::room::{RoomConnection, RoomEvent, RoomTransport};
use crate::turn::{TurnController, TurnSignal, TurnState, Utterance};
use crate::voice::{
    AudioFrame, NoiseFilter, OUTPUT_SAMPLE_RATE, SpeechSynthesizer, SpeechToText,
    TurnDetector, VoiceActivityDetector,
};
use crate::{Error, Result};

/// One active room connection
#[derive(Debug, Clone)]
pub struct Session {
    /// Unique session id
    pub id: Uuid,
    /// Room the session joined
    pub room: String,
    /// Participant identity of the remote speaker
    pub identity: String,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

/// External collaborators wired into a session
///
/// Every dependency is injected with session-scoped lifecycle; nothing in
/// the pipeline is process-global.
pub struct Adapters {
    /// Room media transport
    pub transport: Arc<dyn RoomTransport>,
    /// Reply generation
    pub llm: Arc<dyn LanguageModel>,
    /// Reply synthesis
    pub tts: Arc<dyn SpeechSynthesizer>,
    /// Utterance transcription
    pub stt: Arc<dyn SpeechToText>,
    /// End-of-turn scoring
    pub turn_detector: Arc<dyn TurnDetector>,
    /// Voice activity detection
    pub vad: Box<dyn VoiceActivityDetector>,
    /// Inbound noise filtering
    pub denoise: Box<dyn NoiseFilter>,
}

/// Callback invoked exactly once with the final usage summary
pub type ShutdownHook = Box<dyn FnOnce(UsageSummary) + Send + Sync>;

/// Remote control for a running session
#[derive(Clone)]
pub struct SessionHandle {
    stop: watch::Sender<bool>,
}

impl SessionHandle {
    /// Request an orderly shutdown
    pub fn stop(&self) {
        let _ = self.stop.send(true);
    }
}

/// Outcome of one generation task: reply text and latency, or the failure
type GenerationOutcome = Result<(String, Duration)>;

/// Drives one voice-companion session
pub struct SessionOrchestrator {
    session: Session,
    room_url: String,
    voice: VoiceConfig,
    turn: TurnController,
    adapters: Adapters,
    usage: Arc<UsageAggregator>,
    shutdown_hook: Option<ShutdownHook>,
    stop_rx: watch::Receiver<bool>,
}

impl SessionOrchestrator {
    /// Create an orchestrator and its stop handle
    #[must_use]
    pub fn new(config: &Config, adapters: Adapters) -> (Self, SessionHandle) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let session = Session {
            id: Uuid::new_v4(),
            room: config.room_name.clone(),
            identity: config.identity.clone(),
            created_at: Utc::now(),
        };

        let orchestrator = Self {
            turn: TurnController::new(&config.identity, config.voice.silence_threshold),
            session,
            room_url: config.room_url.clone(),
            voice: config.voice.clone(),
            adapters,
            usage: Arc::new(UsageAggregator::new()),
            shutdown_hook: None,
            stop_rx,
        };
        (orchestrator, SessionHandle { stop: stop_tx })
    }

    /// The session this orchestrator owns
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Shared usage aggregator, for stages that record from outside
    #[must_use]
    pub fn usage(&self) -> Arc<UsageAggregator> {
        Arc::clone(&self.usage)
    }

    /// Register the shutdown callback that receives the usage summary
    pub fn on_shutdown(&mut self, hook: impl FnOnce(UsageSummary) + Send + Sync + 'static) {
        self.shutdown_hook = Some(Box::new(hook));
    }

    /// Run the session until stopped or disconnected
    ///
    /// # Errors
    ///
    /// Returns `Error::Connection` if the room cannot be reached after one
    /// immediate reconnect attempt. Per-utterance failures are recovered
    /// internally and never surface here.
    pub async fn run(mut self, grant: &crate::auth::AccessGrant) -> Result<UsageSummary> {
        self.adapters.vad.prewarm();

        let conn = self.connect(grant).await?;
        tracing::info!(
            room = %self.session.room,
            session = %self.session.id,
            "session started"
        );

        let (gen_tx, mut gen_rx) = mpsc::channel::<GenerationOutcome>(1);
        let (synth_tx, mut synth_rx) = mpsc::channel::<Result<()>>(1);
        let mut gen_task: Option<JoinHandle<()>> = None;
        let mut synth_task: Option<JoinHandle<()>> = None;
        let mut stop_rx = self.stop_rx.clone();
        let mut last_sample_rate: u32 = 16_000;

        loop {
            tokio::select! {
                _ = stop_rx.changed() => {
                    tracing::info!(room = %self.session.room, "stop requested");
                    break;
                }
                outcome = gen_rx.recv() => {
                    if let Some(outcome) = outcome {
                        self.handle_generation_outcome(
                            outcome,
                            &conn,
                            &synth_tx,
                            &mut synth_task,
                        );
                    }
                }
                done = synth_rx.recv() => {
                    if let Some(done) = done {
                        self.handle_playback_done(done);
                    }
                }
                event = conn.next_event() => {
                    match event {
                        Some(RoomEvent::Audio(frame)) => {
                            last_sample_rate = frame.sample_rate;
                            self.handle_frame(frame, &gen_tx, &mut gen_task, &mut synth_task)
                                .await;
                        }
                        Some(RoomEvent::ParticipantJoined { identity }) => {
                            tracing::info!(identity, "participant joined");
                        }
                        Some(RoomEvent::ParticipantLeft { identity }) => {
                            tracing::info!(identity, "participant left");
                        }
                        Some(RoomEvent::EndOfTurn { timestamp }) => {
                            if self.turn.on_end_of_turn(timestamp) == TurnSignal::EvaluateTurn {
                                self.evaluate_turn(last_sample_rate, &gen_tx, &mut gen_task)
                                    .await;
                            }
                        }
                        Some(RoomEvent::Disconnected { reason }) => {
                            tracing::warn!(reason, "room disconnected");
                            break;
                        }
                        None => {
                            tracing::warn!("room event stream ended");
                            break;
                        }
                    }
                }
            }
        }

        self.shutdown(&conn, gen_task, synth_task).await
    }

    /// Connect with one immediate reconnect attempt
    async fn connect(&self, grant: &crate::auth::AccessGrant) -> Result<Arc<dyn RoomConnection>> {
        match self
            .adapters
            .transport
            .connect(&self.room_url, grant)
            .await
        {
            Ok(conn) => Ok(conn),
            Err(first) => {
                tracing::warn!(error = %first, "room connect failed, retrying once");
                self.adapters
                    .transport
                    .connect(&self.room_url, grant)
                    .await
                    .map_err(|e| Error::Connection(format!("reconnect failed: {e}")))
            }
        }
    }

    /// Feed one inbound frame through the pipeline
    async fn handle_frame(
        &mut self,
        mut frame: AudioFrame,
        gen_tx: &mpsc::Sender<GenerationOutcome>,
        gen_task: &mut Option<JoinHandle<()>>,
        synth_task: &mut Option<JoinHandle<()>>,
    ) {
        self.adapters.denoise.apply(&mut frame);
        let event = self.adapters.vad.process(&frame);
        let signal = self.turn.on_voice_activity(&event);
        self.turn.push_audio(&frame.samples);

        match signal {
            TurnSignal::None => {}
            TurnSignal::CancelSynthesis => {
                if let Some(task) = synth_task.take() {
                    task.abort();
                }
                self.usage.record_count("barge_ins");
            }
            TurnSignal::EvaluateTurn => {
                self.evaluate_turn(frame.sample_rate, gen_tx, gen_task).await;
            }
        }
    }

    /// Transcribe the buffered turn and ask the detector for a verdict
    async fn evaluate_turn(
        &mut self,
        sample_rate: u32,
        gen_tx: &mpsc::Sender<GenerationOutcome>,
        gen_task: &mut Option<JoinHandle<()>>,
    ) {
        let audio = self.turn.audio().to_vec();
        if audio.is_empty() {
            self.turn.reject_turn();
            return;
        }

        let transcript = match self.adapters.stt.transcribe(&audio, sample_rate).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(error = %e, "transcription failed, resuming listening");
                self.usage.record_count("transcription_failures");
                self.turn.reject_turn();
                return;
            }
        };

        if transcript.trim().is_empty() {
            tracing::debug!("empty transcript, not a turn");
            self.turn.reject_turn();
            return;
        }
        self.turn.set_transcript(&transcript);

        let confidence = match self
            .adapters
            .turn_detector
            .end_of_turn_confidence(&transcript)
            .await
        {
            Ok(confidence) => confidence,
            Err(e) => {
                tracing::warn!(error = %e, "turn detector failed, treating as mid-turn");
                0.0
            }
        };

        if confidence < self.voice.turn_confidence {
            tracing::debug!(confidence, "turn end rejected");
            self.turn.reject_turn();
            return;
        }

        let Some(utterance) = self.turn.confirm_turn() else {
            return;
        };

        #[allow(clippy::cast_precision_loss)]
        let audio_secs = audio.len() as f64 / f64::from(sample_rate.max(1));
        self.usage.record_count("utterances");
        self.usage
            .record_duration("stt_audio", Duration::from_secs_f64(audio_secs));

        self.spawn_generation(&utterance, gen_tx, gen_task);
    }

    /// Dispatch generation for one utterance under the hard deadline
    ///
    /// Single-flight is guaranteed by the state machine: a new utterance
    /// cannot be confirmed while this one is still `Thinking` or `Speaking`.
    fn spawn_generation(
        &self,
        utterance: &Utterance,
        gen_tx: &mpsc::Sender<GenerationOutcome>,
        gen_task: &mut Option<JoinHandle<()>>,
    ) {
        let llm = Arc::clone(&self.adapters.llm);
        let deadline = self.voice.generation_timeout;
        let prompt = prompt::build_prompt(&utterance.text);
        let tx = gen_tx.clone();

        tracing::info!(speaker = %utterance.speaker, chars = utterance.text.len(), "generating reply");
        self.usage.record_count("llm_requests");

        *gen_task = Some(tokio::spawn(async move {
            let started = Instant::now();
            let outcome = match tokio::time::timeout(deadline, llm.generate(&prompt)).await {
                Err(_) => Err(Error::GenerationTimeout(deadline)),
                Ok(Err(e)) => Err(e),
                Ok(Ok(reply)) => Ok((reply, started.elapsed())),
            };
            let _ = tx.send(outcome).await;
        }));
    }

    /// Act on a finished generation task
    fn handle_generation_outcome(
        &mut self,
        outcome: GenerationOutcome,
        conn: &Arc<dyn RoomConnection>,
        synth_tx: &mpsc::Sender<Result<()>>,
        synth_task: &mut Option<JoinHandle<()>>,
    ) {
        match outcome {
            Ok((reply, latency)) => {
                self.usage.record_duration("llm_latency", latency);
                self.turn.on_generation_ready();
                if self.turn.state() == TurnState::Speaking {
                    self.spawn_synthesis(reply, conn, synth_tx, synth_task);
                } else {
                    tracing::debug!(state = %self.turn.state(), "reply arrived late, dropped");
                }
            }
            Err(e) => {
                if matches!(e, Error::GenerationTimeout(_)) {
                    self.usage.record_count("generation_timeouts");
                } else {
                    self.usage.record_count("generation_failures");
                }
                // The user hears silence for this turn, never an error.
                tracing::warn!(error = %e, "generation failed, skipping reply");
                self.turn.on_generation_failed();
            }
        }
    }

    /// Stream the reply through TTS into the room
    fn spawn_synthesis(
        &self,
        reply: String,
        conn: &Arc<dyn RoomConnection>,
        synth_tx: &mpsc::Sender<Result<()>>,
        synth_task: &mut Option<JoinHandle<()>>,
    ) {
        let tts = Arc::clone(&self.adapters.tts);
        let conn = Arc::clone(conn);
        let tx = synth_tx.clone();

        self.usage
            .record("tts_characters", MetricValue::Count(reply.len() as u64));

        *synth_task = Some(tokio::spawn(async move {
            let result = speak(tts.as_ref(), conn.as_ref(), &reply).await;
            let _ = tx.send(result).await;
        }));
    }

    /// Act on playback finishing, successfully or not
    fn handle_playback_done(&mut self, result: Result<()>) {
        if let Err(e) = result {
            tracing::warn!(error = %e, "synthesis failed, reply dropped");
            self.usage.record_count("synthesis_failures");
        }
        self.turn.on_playback_complete();
    }

    /// Ordered teardown: cancel in-flight work, then flush usage, then
    /// release the connection
    async fn shutdown(
        mut self,
        conn: &Arc<dyn RoomConnection>,
        gen_task: Option<JoinHandle<()>>,
        synth_task: Option<JoinHandle<()>>,
    ) -> Result<UsageSummary> {
        self.turn.close();

        for task in [gen_task, synth_task].into_iter().flatten() {
            task.abort();
            let _ = task.await;
        }

        let summary = self.usage.summarize();
        tracing::info!(
            room = %self.session.room,
            session = %self.session.id,
            usage = %summary,
            "session usage"
        );
        if let Some(hook) = self.shutdown_hook.take() {
            hook(summary.clone());
        }

        if let Err(e) = conn.close().await {
            tracing::warn!(error = %e, "connection release failed");
        }
        tracing::info!(session = %self.session.id, "session stopped");
        Ok(summary)
    }
}

/// Synthesize `text` and publish the audio frame by frame
async fn speak(
    tts: &dyn SpeechSynthesizer,
    conn: &dyn RoomConnection,
    text: &str,
) -> Result<()> {
    let mut stream = tts.synthesize(text).await?;

    while let Some(chunk) = stream.next().await {
        let bytes = chunk?;
        let samples: Vec<i16> = bytes
            .chunks_exact(2)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
            .collect();
        conn.publish_audio(AudioFrame {
            samples,
            sample_rate: OUTPUT_SAMPLE_RATE,
            timestamp: Utc::now(),
        })
        .await?;
    }

    Ok(())
}
