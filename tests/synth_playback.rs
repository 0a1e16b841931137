//! Integration test: demo soundbank → timed events → offline render →
//! verify output.

use ws_audio::{AudioOutput, MemoryOutput};
use ws_engine::CONTROL_BLOCK;
use ws_master::{demo_length, demo_phrase, Controller, Event, Frame, SynthConfig, TimedEvent};

fn has_nonsilent_frames(frames: &[Frame]) -> bool {
    frames.iter().any(|f| f.left != 0 || f.right != 0)
}

fn max_amplitude(frames: &[Frame]) -> i16 {
    frames
        .iter()
        .flat_map(|f| [f.left.saturating_abs(), f.right.saturating_abs()])
        .max()
        .unwrap_or(0)
}

fn dry() -> SynthConfig {
    SynthConfig {
        reverb_on: false,
        chorus_on: false,
        limiter_on: false,
        ..Default::default()
    }
}

fn note_on(frame: u64, channel: u8, note: u8) -> TimedEvent {
    TimedEvent::new(frame, Event::NoteOn { channel, note, velocity: 110 })
}

fn note_off(frame: u64, channel: u8, note: u8) -> TimedEvent {
    TimedEvent::new(frame, Event::NoteOff { channel, note })
}

#[test]
fn demo_phrase_produces_audio() {
    let mut ctl = Controller::with_demo(SynthConfig::default()).unwrap();
    let frames = ctl.render_frames(&demo_phrase(44100), demo_length(44100)).unwrap();
    assert!(has_nonsilent_frames(&frames));
    assert!(max_amplitude(&frames) > 1000);
}

#[test]
fn render_is_deterministic() {
    let mut a = Controller::with_demo(SynthConfig::default()).unwrap();
    let mut b = Controller::with_demo(SynthConfig::default()).unwrap();
    let events = demo_phrase(44100);
    let total = demo_length(44100);
    assert_eq!(a.render_frames(&events, total).unwrap(), b.render_frames(&events, total).unwrap());
}

#[test]
fn centred_note_is_balanced() {
    let mut ctl = Controller::with_demo(dry()).unwrap();
    let frames = ctl.render_frames(&[note_on(0, 0, 69)], 4410).unwrap();
    assert!(has_nonsilent_frames(&frames));
    for f in &frames {
        assert_eq!(f.left, f.right);
    }
}

#[test]
fn hard_left_pan_silences_right() {
    let mut ctl = Controller::with_demo(dry()).unwrap();
    let pan = TimedEvent::new(
        0,
        Event::ControlChange {
            channel: 0,
            controller: 10,
            value: 0,
        },
    );
    let frames = ctl.render_frames(&[pan, note_on(0, 0, 69)], 4410).unwrap();
    assert!(max_amplitude(&frames) > 1000);
    let right = frames.iter().map(|f| f.right.saturating_abs()).max().unwrap();
    assert!(right < 10, "right channel leaked {right}");
}

#[test]
fn release_decays_to_silence() {
    let mut ctl = Controller::with_demo(dry()).unwrap();
    let total = 44100 * 2;
    let frames = ctl
        .render_frames(&[note_on(0, 0, 60), note_off(4410, 0, 60)], total)
        .unwrap();
    assert!(max_amplitude(&frames[..4410]) > 1000);
    assert_eq!(max_amplitude(&frames[total - 4410..]), 0);
}

#[test]
fn events_after_render_are_ignored() {
    let mut ctl = Controller::with_demo(dry()).unwrap();
    ctl.render_frames(&[], CONTROL_BLOCK).unwrap();
    // Closed between renders: nothing carries into the next session.
    ctl.send(Event::NoteOn {
        channel: 0,
        note: 69,
        velocity: 100,
    });
    let frames = ctl.render_frames(&[], 3000).unwrap();
    assert!(!has_nonsilent_frames(&frames));
}

#[test]
fn percussion_channel_plays_kit() {
    let mut ctl = Controller::with_demo(dry()).unwrap();
    let frames = ctl.render_frames(&[note_on(0, 9, 38)], 4410).unwrap();
    assert!(has_nonsilent_frames(&frames));
    let melodic = ctl.render_frames(&[note_on(0, 1, 38)], 4410).unwrap();
    assert_ne!(frames, melodic);
}

#[test]
fn rendered_blocks_feed_memory_output() {
    let mut ctl = Controller::with_demo(SynthConfig::default()).unwrap();
    let frames = ctl.render_frames(&[note_on(0, 0, 64)], CONTROL_BLOCK * 10).unwrap();

    let mut out = MemoryOutput::new(44100);
    out.start().unwrap();
    for block in frames.chunks(CONTROL_BLOCK) {
        out.write(block).unwrap();
    }
    assert_eq!(out.frames.len(), CONTROL_BLOCK * 10);
    assert!(has_nonsilent_frames(&out.frames));
}

#[test]
fn wav_export_round_trips_frames() {
    let mut ctl = Controller::with_demo(SynthConfig::default()).unwrap();
    let events = [note_on(0, 0, 72)];
    let frames = ctl.render_frames(&events, 2000).unwrap();
    let wav = ctl.render_to_wav(&events, 2000).unwrap();
    assert_eq!(wav.len(), 44 + 2000 * 4);
    let first = i16::from_le_bytes([wav[44], wav[45]]);
    assert_eq!(first, frames[0].left);
    let last = &wav[wav.len() - 4..];
    assert_eq!(i16::from_le_bytes([last[2], last[3]]), frames[1999].right);
}
