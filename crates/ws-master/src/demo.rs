//! Built-in demo soundbank and phrase.
//!
//! Small enough to build at startup, so the CLI and tests need no
//! soundbank files.

use core::f32::consts::TAU;

use ws_engine::CONTROL_BLOCK;
use ws_model::{
    ConnectionBlock, Destination, EgStage, Instrument, LoopType, Oscillator, Patch, Performer, Sample, SampleData,
    Soundbank,
};

use crate::event::{Event, TimedEvent};

/// One sine cycle, tuned so the root key plays at exactly A440.
const CYCLE: usize = 100;
const SINE_RATE: u32 = 44_000;
const SINE_ROOT: u8 = 69;

fn seconds_to_timecents(s: f64) -> f64 {
    1200.0 * s.log2()
}

fn looped(name: &str, data: Vec<f32>) -> Sample {
    let mut s = Sample::new(name);
    s.loop_end = data.len() as u32;
    s.data = SampleData::Float(data);
    s.sample_rate = SINE_RATE;
    s.loop_type = LoopType::Forward;
    s
}

/// Attack and release for a melodic voice.
fn shape(p: Performer, attack: f64, release: f64) -> Performer {
    p.connection(ConnectionBlock::constant(
        seconds_to_timecents(attack),
        Destination::Eg(0, EgStage::Attack),
    ))
    .connection(ConnectionBlock::constant(
        seconds_to_timecents(release),
        Destination::Eg(0, EgStage::Release),
    ))
}

/// Program 0 sine, program 1 square, and a percussion kit with a closed
/// and open hat sharing an exclusive class.
pub fn demo_soundbank() -> Soundbank {
    let mut bank = Soundbank::new("demo");

    let sine: Vec<f32> = (0..CYCLE).map(|i| (TAU * i as f32 / CYCLE as f32).sin() * 0.5).collect();
    let sine = bank.add_sample(looped("sine", sine));
    let square: Vec<f32> = (0..CYCLE).map(|i| if i < CYCLE / 2 { 0.25 } else { -0.25 }).collect();
    let square = bank.add_sample(looped("square", square));

    let mut seed = 0x2545_f491u32;
    let noise: Vec<f32> = (0..4410)
        .map(|i| {
            seed ^= seed << 13;
            seed ^= seed >> 17;
            seed ^= seed << 5;
            let decay = 1.0 - i as f32 / 4410.0;
            (seed as f32 / u32::MAX as f32 - 0.5) * decay
        })
        .collect();
    let mut hat = Sample::new("noise");
    hat.data = SampleData::Float(noise);
    let hat = bank.add_sample(hat);

    bank.add_instrument(
        Instrument::new("Sine", Patch::new(0, 0))
            .with_performer(shape(Performer::new(Oscillator::new(sine, SINE_ROOT)), 0.005, 0.3)),
    );
    bank.add_instrument(
        Instrument::new("Square", Patch::new(0, 1))
            .with_performer(shape(Performer::new(Oscillator::new(square, SINE_ROOT)), 0.002, 0.1)),
    );

    let mut closed = Performer::new(Oscillator::new(hat, 60)).keys(42, 42);
    closed.exclusive_class = 1;
    let mut open = Performer::new(Oscillator::new(hat, 48)).keys(46, 46);
    open.exclusive_class = 1;
    let snare = Performer::new(Oscillator::new(hat, 72)).keys(38, 38);
    bank.add_instrument(
        Instrument::new("Kit", Patch::percussion(0, 0))
            .with_performer(snare)
            .with_performer(closed)
            .with_performer(open),
    );
    bank
}

/// A C major scale on channel 0 with a hat on every beat, at 120 bpm.
pub fn demo_phrase(sample_rate: u32) -> Vec<TimedEvent> {
    let beat = sample_rate as u64 / 2;
    let gate = beat * 3 / 4;
    let mut events = Vec::new();
    for (i, &note) in [60u8, 62, 64, 65, 67, 69, 71, 72].iter().enumerate() {
        let at = i as u64 * beat;
        events.push(TimedEvent::new(at, Event::NoteOn { channel: 0, note, velocity: 100 }));
        events.push(TimedEvent::new(at + gate, Event::NoteOff { channel: 0, note }));
        let hat = if i % 4 == 3 { 46 } else { 42 };
        events.push(TimedEvent::new(at, Event::NoteOn { channel: 9, note: hat, velocity: 90 }));
    }
    events
}

/// Frames needed to play `demo_phrase` plus a release tail, rounded up
/// to whole blocks.
pub fn demo_length(sample_rate: u32) -> usize {
    let frames = sample_rate as usize * 9 / 2;
    frames.div_ceil(CONTROL_BLOCK) * CONTROL_BLOCK
}
