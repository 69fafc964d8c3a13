//! Room media transport
//!
//! The session core only ever consumes the narrow
//! [`RoomTransport`]/[`RoomConnection`] contract: connect with a signed
//! grant, receive room events, publish audio, disconnect. The built-in
//! implementation bridges a WebSocket media gateway with JSON frames and
//! base64 PCM payloads; grant verification happens server-side.

use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

use crate::auth::AccessGrant;
use crate::voice::AudioFrame;
use crate::{Error, Result};

/// Events surfaced by a room connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Inbound audio from a remote participant
    Audio(AudioFrame),
    /// A participant joined the room
    ParticipantJoined {
        /// Participant identity
        identity: String,
    },
    /// A participant left the room
    ParticipantLeft {
        /// Participant identity
        identity: String,
    },
    /// Upstream end-of-turn marker (e.g. a client-side push-to-talk release)
    EndOfTurn {
        /// When the turn was declared over
        timestamp: DateTime<Utc>,
    },
    /// The connection ended; no further events will arrive
    Disconnected {
        /// Human-readable reason
        reason: String,
    },
}

/// Connects to rooms
#[async_trait::async_trait]
pub trait RoomTransport: Send + Sync {
    /// Establish a connection authorized by `grant`
    async fn connect(&self, url: &str, grant: &AccessGrant) -> Result<Arc<dyn RoomConnection>>;
}

/// One live room connection
#[async_trait::async_trait]
pub trait RoomConnection: Send + Sync {
    /// Next room event; `None` once the connection is gone
    async fn next_event(&self) -> Option<RoomEvent>;

    /// Publish one frame of audio into the room
    async fn publish_audio(&self, frame: AudioFrame) -> Result<()>;

    /// Release the connection
    async fn close(&self) -> Result<()>;
}

/// Wire frames exchanged with the media gateway
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireMessage {
    Audio {
        data: String,
        sample_rate: u32,
        timestamp: DateTime<Utc>,
    },
    ParticipantJoined {
        identity: String,
    },
    ParticipantLeft {
        identity: String,
    },
    EndOfTurn {
        timestamp: DateTime<Utc>,
    },
    Bye {
        reason: String,
    },
}

/// WebSocket media gateway transport
pub struct WsRoomTransport;

#[async_trait::async_trait]
impl RoomTransport for WsRoomTransport {
    async fn connect(&self, url: &str, grant: &AccessGrant) -> Result<Arc<dyn RoomConnection>> {
        let endpoint = format!("{url}?room={}&access_token={}", grant.room, grant.token);

        let (ws, _) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        let (mut write, mut read) = ws.split();

        tracing::info!(room = %grant.room, subject = %grant.subject, "room connected");

        let (event_tx, event_rx) = mpsc::channel::<RoomEvent>(256);
        let (out_tx, mut out_rx) = mpsc::channel::<WireMessage>(64);

        let send_pump = tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                match serde_json::to_string(&msg) {
                    Ok(text) => {
                        if let Err(e) = write.send(Message::Text(text)).await {
                            tracing::error!(error = %e, "failed to send frame");
                            break;
                        }
                    }
                    Err(e) => tracing::error!(error = %e, "failed to serialize frame"),
                }
            }
        });

        let recv_pump = tokio::spawn(async move {
            while let Some(message) = read.next().await {
                let message = match message {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::error!(error = %e, "failed to read frame");
                        let _ = event_tx
                            .send(RoomEvent::Disconnected {
                                reason: e.to_string(),
                            })
                            .await;
                        break;
                    }
                };

                match message {
                    Message::Text(text) => match serde_json::from_str::<WireMessage>(&text) {
                        Ok(wire) => {
                            if let Some(event) = wire_to_event(wire) {
                                if event_tx.send(event).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "unparseable frame dropped");
                        }
                    },
                    Message::Close(reason) => {
                        tracing::info!(?reason, "room closed the connection");
                        let _ = event_tx
                            .send(RoomEvent::Disconnected {
                                reason: "closed by server".to_string(),
                            })
                            .await;
                        break;
                    }
                    Message::Binary(_) => {
                        tracing::warn!("unexpected binary frame");
                    }
                    _ => {}
                }
            }
        });

        Ok(Arc::new(WsRoomConnection {
            events: tokio::sync::Mutex::new(event_rx),
            outbound: out_tx,
            pumps: std::sync::Mutex::new(vec![send_pump, recv_pump]),
        }))
    }
}

struct WsRoomConnection {
    events: tokio::sync::Mutex<mpsc::Receiver<RoomEvent>>,
    outbound: mpsc::Sender<WireMessage>,
    pumps: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

#[async_trait::async_trait]
impl RoomConnection for WsRoomConnection {
    async fn next_event(&self) -> Option<RoomEvent> {
        self.events.lock().await.recv().await
    }

    async fn publish_audio(&self, frame: AudioFrame) -> Result<()> {
        let msg = WireMessage::Audio {
            data: pcm_to_base64(&frame.samples),
            sample_rate: frame.sample_rate,
            timestamp: frame.timestamp,
        };
        self.outbound
            .send(msg)
            .await
            .map_err(|_| Error::Connection("connection is closed".to_string()))
    }

    async fn close(&self) -> Result<()> {
        let _ = self
            .outbound
            .send(WireMessage::Bye {
                reason: "session ended".to_string(),
            })
            .await;

        if let Ok(mut pumps) = self.pumps.lock() {
            for pump in pumps.drain(..) {
                pump.abort();
            }
        }
        Ok(())
    }
}

fn wire_to_event(wire: WireMessage) -> Option<RoomEvent> {
    match wire {
        WireMessage::Audio {
            data,
            sample_rate,
            timestamp,
        } => match base64_to_pcm(&data) {
            Ok(samples) => Some(RoomEvent::Audio(AudioFrame {
                samples,
                sample_rate,
                timestamp,
            })),
            Err(e) => {
                tracing::warn!(error = %e, "undecodable audio frame dropped");
                None
            }
        },
        WireMessage::ParticipantJoined { identity } => {
            Some(RoomEvent::ParticipantJoined { identity })
        }
        WireMessage::ParticipantLeft { identity } => {
            Some(RoomEvent::ParticipantLeft { identity })
        }
        WireMessage::EndOfTurn { timestamp } => Some(RoomEvent::EndOfTurn { timestamp }),
        WireMessage::Bye { reason } => Some(RoomEvent::Disconnected { reason }),
    }
}

/// Encode PCM samples as base64 little-endian bytes
fn pcm_to_base64(samples: &[i16]) -> String {
    let bytes: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
    BASE64.encode(bytes)
}

/// Decode base64 little-endian bytes into PCM samples
fn base64_to_pcm(data: &str) -> Result<Vec<i16>> {
    let bytes = BASE64
        .decode(data)
        .map_err(|e| Error::Connection(format!("bad audio payload: {e}")))?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}
