//! Plays a two-octave scale on the demo sine through the default audio
//! device, driving the synthesizer stream by hand.
//!
//! Usage:
//!   cargo run --example play_scale
//!   cargo run --example play_scale -- 1      (program 1: square)

use std::env;

use ws_audio::{AudioOutput, CpalOutput};
use ws_engine::{Frame, SynthConfig, Synthesizer, CONTROL_BLOCK};
use ws_master::demo_soundbank;

fn main() {
    let program: u8 = env::args().nth(1).and_then(|a| a.parse().ok()).unwrap_or(0);

    let config = SynthConfig::default();
    let synth = Synthesizer::new(config.clone()).unwrap_or_else(|e| {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    });
    synth.load_soundbank(demo_soundbank());

    let mut output = CpalOutput::new(config.sample_rate).unwrap_or_else(|e| {
        eprintln!("Failed to initialize audio: {e}");
        std::process::exit(1);
    });
    output.start().unwrap_or_else(|e| {
        eprintln!("Failed to start audio stream: {e}");
        std::process::exit(1);
    });
    println!("Sample rate: {} Hz", output.sample_rate());

    let mut stream = synth.open().unwrap_or_else(|e| {
        eprintln!("Failed to open synthesizer: {e}");
        std::process::exit(1);
    });
    let ch = synth.channel(0);
    ch.program_change(program);
    ch.control_change(91, 64);

    let mut block = vec![Frame::silence(); CONTROL_BLOCK];
    let blocks_per_note = config.sample_rate as usize / 4 / CONTROL_BLOCK;
    let mut play = |blocks: usize| {
        for _ in 0..blocks {
            let n = stream.read_frames(&mut block);
            let _ = output.write(&block[..n]);
        }
    };

    let steps = [0u8, 2, 4, 5, 7, 9, 11];
    for octave in 0..2u8 {
        for &step in &steps {
            let note = 60 + octave * 12 + step;
            println!("note {note}");
            ch.note_on(note, 100);
            play(blocks_per_note);
            ch.note_off(note, 0);
        }
    }
    ch.note_on(84, 100);
    play(blocks_per_note * 4);
    ch.note_off(84, 0);

    // Let the release and reverb tail ring out
    play(blocks_per_note * 8);
    let _ = synth.close();
    println!("Done.");
}
