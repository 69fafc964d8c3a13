//! Turn state machine properties
//!
//! Exercises the controller against scripted and pseudo-random
//! voice-activity sequences without any audio hardware or async runtime.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

use solace_companion::voice::VadEvent;
use solace_companion::{TurnController, TurnSignal, TurnState};

const SILENCE_THRESHOLD: Duration = Duration::from_millis(1500);

fn at(base: DateTime<Utc>, offset_ms: i64) -> DateTime<Utc> {
    base + TimeDelta::milliseconds(offset_ms)
}

fn event(active: bool, ts: DateTime<Utc>) -> VadEvent {
    VadEvent {
        active,
        timestamp: ts,
    }
}

/// Tiny deterministic generator; keeps the sweep reproducible
struct Lcg(u64);

impl Lcg {
    fn next(&mut self) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.0 >> 33
    }
}

#[test]
fn scenario_voice_then_silence_then_reply_then_idle() {
    let mut turn = TurnController::new("alice", SILENCE_THRESHOLD);
    let t0 = Utc::now();

    // active at t0
    assert_eq!(turn.on_voice_activity(&event(true, t0)), TurnSignal::None);
    assert_eq!(turn.state(), TurnState::Listening);
    turn.push_audio(&[100; 320]);

    // inactive at t0+2s exceeds the 1.5s threshold
    let signal = turn.on_voice_activity(&event(false, at(t0, 2000)));
    assert_eq!(signal, TurnSignal::EvaluateTurn);
    assert_eq!(turn.state(), TurnState::Detecting);

    // turn detector confirms: exactly one utterance, spanning t0..t0+2s
    turn.set_transcript("text");
    let utterance = turn.confirm_turn().expect("utterance");
    assert_eq!(utterance.started_at, t0);
    assert_eq!(utterance.ended_at, at(t0, 2000));
    assert_eq!(turn.state(), TurnState::Thinking);

    // generation returns within the deadline, playback completes
    turn.on_generation_ready();
    assert_eq!(turn.state(), TurnState::Speaking);
    turn.on_playback_complete();
    assert_eq!(turn.state(), TurnState::Idle);
}

#[test]
fn barge_in_lands_in_listening_never_thinking_or_idle() {
    let mut turn = TurnController::new("alice", SILENCE_THRESHOLD);
    let t0 = Utc::now();

    turn.on_voice_activity(&event(true, t0));
    turn.on_voice_activity(&event(false, at(t0, 2000)));
    turn.set_transcript("first turn");
    turn.confirm_turn().unwrap();
    turn.on_generation_ready();
    assert_eq!(turn.state(), TurnState::Speaking);

    // cancellation is signalled in the same call that observes the voice
    let signal = turn.on_voice_activity(&event(true, at(t0, 4000)));
    assert_eq!(signal, TurnSignal::CancelSynthesis);
    assert_eq!(turn.state(), TurnState::Listening);
}

#[test]
fn rejection_never_drops_buffered_audio() {
    let mut turn = TurnController::new("alice", SILENCE_THRESHOLD);
    let t0 = Utc::now();

    turn.on_voice_activity(&event(true, t0));
    turn.push_audio(&[1; 480]);
    turn.push_transcript("I was going to say");
    turn.on_voice_activity(&event(false, at(t0, 2000)));
    assert_eq!(turn.state(), TurnState::Detecting);

    turn.reject_turn();
    assert_eq!(turn.state(), TurnState::Listening);
    assert_eq!(turn.audio().len(), 480);
    assert_eq!(turn.transcript(), "I was going to say");
}

#[test]
fn single_flight_holds_for_arbitrary_vad_sequences() {
    let mut rng = Lcg(0x5eed);
    let mut turn = TurnController::new("alice", SILENCE_THRESHOLD);
    let t0 = Utc::now();

    let mut utterances = 0_u32;
    let mut in_flight = false;

    for step in 0..5000_i64 {
        let ts = at(t0, step * 400);
        let roll = rng.next();
        let before = turn.state();

        let signal = turn.on_voice_activity(&event(roll % 3 != 0, ts));
        turn.push_audio(&[64; 160]);

        // listening never jumps straight to speaking
        if before == TurnState::Listening {
            assert_ne!(turn.state(), TurnState::Speaking);
        }

        if signal == TurnSignal::EvaluateTurn {
            if roll % 2 == 0 {
                turn.set_transcript("something complete.");
                if let Some(_utterance) = turn.confirm_turn() {
                    assert!(
                        !in_flight,
                        "second utterance emitted with one still in flight"
                    );
                    in_flight = true;
                    utterances += 1;
                }
            } else {
                turn.reject_turn();
            }
        }

        match turn.state() {
            TurnState::Thinking => {
                if roll % 5 == 0 {
                    turn.on_generation_failed();
                    in_flight = false;
                } else if roll % 5 == 1 {
                    turn.on_generation_ready();
                    in_flight = false;
                }
            }
            TurnState::Speaking => {
                if roll % 7 == 0 {
                    turn.on_playback_complete();
                }
            }
            _ => {}
        }
    }

    assert!(utterances > 5, "sweep never produced utterances");
}

#[test]
fn stray_lifecycle_events_never_move_the_machine() {
    let mut turn = TurnController::new("alice", SILENCE_THRESHOLD);

    turn.on_generation_ready();
    assert_eq!(turn.state(), TurnState::Idle);
    turn.on_generation_failed();
    assert_eq!(turn.state(), TurnState::Idle);
    turn.on_playback_complete();
    assert_eq!(turn.state(), TurnState::Idle);
    turn.reject_turn();
    assert_eq!(turn.state(), TurnState::Idle);
    assert!(turn.confirm_turn().is_none());
}

#[test]
fn teardown_closes_from_every_phase() {
    let t0 = Utc::now();

    for phase in 0..4 {
        let mut turn = TurnController::new("alice", SILENCE_THRESHOLD);
        if phase >= 1 {
            turn.on_voice_activity(&event(true, t0));
        }
        if phase >= 2 {
            turn.on_voice_activity(&event(false, at(t0, 2000)));
        }
        if phase >= 3 {
            turn.set_transcript("closing time");
            turn.confirm_turn();
        }

        turn.close();
        assert_eq!(turn.state(), TurnState::Closed);

        // closed is terminal
        turn.on_voice_activity(&event(true, at(t0, 9000)));
        assert_eq!(turn.state(), TurnState::Closed);
    }
}
