//! Allocation-free render path tests.
//!
//! Once warmed up, pulling frames from the stream must not touch the heap:
//! controller resolution, voice rendering, bus mixing and the effect
//! chain all run on preallocated storage.
//!
//! Just run `cargo test`. No feature flags needed.

use assert_no_alloc::{assert_no_alloc, AllocDisabler};

#[cfg(debug_assertions)]
#[global_allocator]
static A: AllocDisabler = AllocDisabler;

use ws_engine::{Frame, SynthConfig, SynthStream, Synthesizer, CONTROL_BLOCK};
use ws_master::demo_soundbank;

fn open(config: SynthConfig) -> (Synthesizer, SynthStream) {
    let synth = Synthesizer::new(config).unwrap();
    synth.load_soundbank(demo_soundbank());
    let stream = synth.open().unwrap();
    (synth, stream)
}

/// Pull `blocks` cycles, aborting on any heap allocation.
fn assert_pull_alloc_free(stream: &mut SynthStream, blocks: usize) {
    let mut out = vec![Frame::silence(); CONTROL_BLOCK];
    // Warm-up: first cycle applies pending effect settings.
    stream.read_frames(&mut out);

    assert_no_alloc(|| {
        for _ in 0..blocks {
            stream.read_frames(&mut out);
        }
    });
}

#[test]
fn chord_with_effects_alloc_free() {
    let (synth, mut stream) = open(SynthConfig::default());
    let ch = synth.channel(0);
    ch.control_change(91, 100);
    ch.control_change(93, 80);
    for note in [60, 64, 67, 72] {
        ch.note_on(note, 100);
    }
    assert_pull_alloc_free(&mut stream, 150);
    for note in [60, 64, 67, 72] {
        ch.note_off(note, 0);
    }
    assert_pull_alloc_free(&mut stream, 150);
}

#[test]
fn one_shot_percussion_alloc_free() {
    let (synth, mut stream) = open(SynthConfig::default());
    let drums = synth.channel(9);
    drums.note_on(38, 120);
    drums.note_on(42, 100);
    // Runs past the end of the unlooped sample so voices finish mid-test.
    assert_pull_alloc_free(&mut stream, 60);
}

#[test]
fn full_pool_alloc_free() {
    let (synth, mut stream) = open(SynthConfig::default());
    for channel in 0..4u8 {
        let ch = synth.channel(channel);
        for note in 0..16u8 {
            ch.note_on_delayed(48 + note, 90, note as usize * 7);
        }
    }
    assert_eq!(synth.active_voice_count(), 64);
    assert_pull_alloc_free(&mut stream, 100);
}

#[test]
fn byte_reads_alloc_free() {
    let (synth, mut stream) = open(SynthConfig::default());
    synth.channel(0).note_on(69, 127);
    let mut buf = vec![0u8; 1024];
    stream.read(&mut buf, 0, 1024);
    assert_no_alloc(|| {
        for _ in 0..200 {
            stream.read(&mut buf, 0, 1024);
        }
    });
}
