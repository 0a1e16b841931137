//! wavesynth CLI: play the demo phrase or render it to WAV.
//!
//! Usage:
//!   cargo run --bin ws-cli
//!   cargo run --bin ws-cli -- --wav output.wav --reverb large-hall

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tracing::info;
use ws_master::{demo_length, demo_phrase, Controller, ReverbPreset, SynthConfig, TimedEvent};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Reverb {
    SmallRoom,
    MediumRoom,
    LargeRoom,
    MediumHall,
    LargeHall,
    Plate,
}

impl From<Reverb> for ReverbPreset {
    fn from(r: Reverb) -> Self {
        match r {
            Reverb::SmallRoom => ReverbPreset::SmallRoom,
            Reverb::MediumRoom => ReverbPreset::MediumRoom,
            Reverb::LargeRoom => ReverbPreset::LargeRoom,
            Reverb::MediumHall => ReverbPreset::MediumHall,
            Reverb::LargeHall => ReverbPreset::LargeHall,
            Reverb::Plate => ReverbPreset::Plate,
        }
    }
}

#[derive(Parser)]
#[command(name = "ws-cli")]
#[command(about = "Plays the wavesynth demo phrase", long_about = None)]
struct Cli {
    /// Render to this WAV file instead of the audio device
    #[arg(long)]
    wav: Option<PathBuf>,

    /// Output sample rate in Hz
    #[arg(long, default_value_t = 44100)]
    sample_rate: u32,

    /// Voice pool size (1-64)
    #[arg(long, default_value_t = 64)]
    polyphony: usize,

    /// Reverb type
    #[arg(long, value_enum, default_value = "large-room")]
    reverb: Reverb,

    /// Program for channel 0
    #[arg(long, default_value_t = 0)]
    program: u8,

    #[arg(long)]
    no_reverb: bool,

    #[arg(long)]
    no_chorus: bool,

    #[arg(long)]
    no_limiter: bool,
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = SynthConfig {
        sample_rate: cli.sample_rate,
        max_polyphony: cli.polyphony,
        reverb_on: !cli.no_reverb,
        chorus_on: !cli.no_chorus,
        limiter_on: !cli.no_limiter,
        reverb_preset: cli.reverb.into(),
    };

    let mut ctrl = Controller::with_demo(config).unwrap_or_else(|e| {
        eprintln!("Failed to create synthesizer: {e}");
        std::process::exit(1);
    });

    let mut events = demo_phrase(cli.sample_rate);
    events.insert(
        0,
        TimedEvent::new(
            0,
            ws_master::Event::ProgramChange {
                channel: 0,
                program: cli.program,
            },
        ),
    );
    let total = demo_length(cli.sample_rate);
    info!(sample_rate = cli.sample_rate, events = events.len(), frames = total, "demo phrase ready");

    match cli.wav {
        Some(path) => render_to_wav(&mut ctrl, &events, total, &path),
        None => play_audio(&mut ctrl, &events, total, cli.sample_rate),
    }
}

fn play_audio(ctrl: &mut Controller, events: &[TimedEvent], total: usize, sample_rate: u32) {
    if let Err(e) = ctrl.start() {
        eprintln!("{e}");
        std::process::exit(1);
    }
    println!("Playing...");

    let mut pending = events.iter().peekable();
    while ctrl.is_playing() && (ctrl.frames_played() as usize) < total {
        let now = ctrl.frames_played();
        while let Some(e) = pending.next_if(|e| e.frame <= now) {
            ctrl.send(e.event);
        }
        print!(
            "\r{:5.2}s | voices: {:2}",
            now as f64 / sample_rate as f64,
            ctrl.synth().active_voice_count()
        );
        let _ = std::io::stdout().flush();
        std::thread::sleep(Duration::from_millis(2));
    }
    ctrl.stop();

    println!("\rDone.                    ");
}

fn render_to_wav(ctrl: &mut Controller, events: &[TimedEvent], total: usize, path: &std::path::Path) {
    println!("Rendering to {} ...", path.display());
    if let Err(e) = ctrl.render_to_file(events, total, path) {
        eprintln!("Failed to render {}: {e}", path.display());
        std::process::exit(1);
    }
    info!(frames = total, path = %path.display(), "render complete");
    println!("Done.");
}
