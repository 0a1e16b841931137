//! Headless controller for the wavesynth synthesizer.
//!
//! Owns a [`Synthesizer`], drives its stream into the platform sink on a
//! pump thread, and renders offline to frames or WAV. The CLI and the
//! tests share this API.

mod demo;
mod event;
mod wav;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::bounded;
use thiserror::Error;
use tracing::{debug, error};
use ws_audio::{AudioError, AudioOutput, CpalOutput};
use ws_engine::{SynthStream, CONTROL_BLOCK};

// Re-export common types so callers don't need ws-model/ws-engine directly.
pub use ws_engine::{ChannelHandle, Frame, ReverbPreset, SynthConfig, SynthError, Synthesizer, VoiceStatus};
pub use ws_model::{Patch, Soundbank};

pub use demo::{demo_length, demo_phrase, demo_soundbank};
pub use event::{Event, TimedEvent};
pub use wav::{frames_to_wav, write_wav, WavWriter};

/// Errors from the controller.
#[derive(Debug, Error)]
pub enum MasterError {
    /// The audio sink could not be opened.
    #[error("failed to open audio output: {0}")]
    Open(#[from] AudioError),
    #[error(transparent)]
    Synth(#[from] SynthError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, MasterError>;

/// Headless synthesizer controller: owns the synth and manages playback.
pub struct Controller {
    synth: Synthesizer,
    playback: Option<PlaybackHandle>,
}

struct PlaybackHandle {
    stop_signal: Arc<AtomicBool>,
    frames_played: Arc<AtomicU64>,
    finished: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Controller {
    pub fn new(config: SynthConfig) -> Result<Self> {
        Ok(Self {
            synth: Synthesizer::new(config)?,
            playback: None,
        })
    }

    /// Controller with the built-in demo soundbank loaded.
    pub fn with_demo(config: SynthConfig) -> Result<Self> {
        let ctl = Self::new(config)?;
        ctl.synth.load_soundbank(demo_soundbank());
        Ok(ctl)
    }

    pub fn synth(&self) -> &Synthesizer {
        &self.synth
    }

    pub fn load_soundbank(&self, bank: Soundbank) {
        self.synth.load_soundbank(bank);
    }

    pub fn channel(&self, index: u8) -> ChannelHandle<'_> {
        self.synth.channel(index)
    }

    /// Deliver an event now.
    pub fn send(&self, event: Event) {
        event.apply(&self.synth, 0);
    }

    // --- Real-time playback ---

    /// Open the synthesizer and start pumping it into the default device.
    ///
    /// Returns once the device is open, or with [`MasterError::Open`] if it
    /// could not be.
    pub fn start(&mut self) -> Result<()> {
        self.stop();

        let stream = self.synth.open()?;
        let sample_rate = self.synth.config().sample_rate;
        let stop_signal = Arc::new(AtomicBool::new(false));
        let frames_played = Arc::new(AtomicU64::new(0));
        let finished = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded::<std::result::Result<(), AudioError>>(1);

        let stop = stop_signal.clone();
        let played = frames_played.clone();
        let done = finished.clone();
        let thread = std::thread::spawn(move || {
            // The device stream is not Send: it is created on this thread.
            let output = CpalOutput::new(sample_rate).and_then(|mut out| {
                out.start()?;
                Ok(out)
            });
            let output = match output {
                Ok(out) => {
                    let _ = ready_tx.send(Ok(()));
                    out
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    done.store(true, Ordering::Relaxed);
                    return;
                }
            };
            pump(stream, output, &stop, &played);
            done.store(true, Ordering::Relaxed);
        });

        let opened = ready_rx.recv().unwrap_or_else(|_| {
            Err(AudioError::DeviceInit("audio thread exited".into()))
        });
        if let Err(e) = opened {
            error!(%e, "audio output failed to open");
            let _ = thread.join();
            let _ = self.synth.close();
            return Err(e.into());
        }

        debug!(sample_rate, "playback started");
        self.playback = Some(PlaybackHandle {
            stop_signal,
            frames_played,
            finished,
            thread: Some(thread),
        });
        Ok(())
    }

    /// Stop the pump thread and close the synthesizer.
    pub fn stop(&mut self) {
        if let Some(mut pb) = self.playback.take() {
            pb.stop_signal.store(true, Ordering::Relaxed);
            if let Some(handle) = pb.thread.take() {
                let _ = handle.join();
            }
            let _ = self.synth.close();
            debug!(frames = pb.frames_played.load(Ordering::Relaxed), "playback stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|p| !p.finished.load(Ordering::Relaxed))
    }

    /// Frames handed to the device since `start`.
    pub fn frames_played(&self) -> u64 {
        self.playback
            .as_ref()
            .map_or(0, |p| p.frames_played.load(Ordering::Relaxed))
    }

    // --- Offline rendering ---

    /// Render `total` frames, delivering `events` at their frame positions.
    ///
    /// Note-ons land on their exact frame; other events apply at the start
    /// of the block containing them.
    pub fn render_frames(&mut self, events: &[TimedEvent], total: usize) -> Result<Vec<Frame>> {
        let mut frames = Vec::with_capacity(total);
        self.render_with(events, total, |block| {
            frames.extend_from_slice(block);
            Ok(())
        })?;
        Ok(frames)
    }

    pub fn render_to_wav(&mut self, events: &[TimedEvent], total: usize) -> Result<Vec<u8>> {
        let frames = self.render_frames(events, total)?;
        Ok(frames_to_wav(&frames, self.synth.config().sample_rate))
    }

    /// Render straight into a WAV file.
    pub fn render_to_file(&mut self, events: &[TimedEvent], total: usize, path: &std::path::Path) -> Result<()> {
        let file = std::io::BufWriter::new(std::fs::File::create(path)?);
        let mut writer = WavWriter::new(file, self.synth.config().sample_rate)?;
        self.render_with(events, total, |block| Ok(writer.write_frames(block)?))?;
        writer.finish()?;
        Ok(())
    }

    fn render_with(
        &mut self,
        events: &[TimedEvent],
        total: usize,
        mut sink: impl FnMut(&[Frame]) -> Result<()>,
    ) -> Result<()> {
        self.stop();
        let mut stream = self.synth.open()?;
        let mut order: Vec<&TimedEvent> = events.iter().collect();
        order.sort_by_key(|e| e.frame);
        let mut pending = order.into_iter().peekable();

        let mut block = vec![Frame::silence(); CONTROL_BLOCK];
        let mut start = 0u64;
        let mut result = Ok(());
        while (start as usize) < total {
            let end = start + CONTROL_BLOCK as u64;
            while let Some(e) = pending.next_if(|e| e.frame < end) {
                let delay = e.frame.saturating_sub(start) as usize;
                e.event.apply(&self.synth, delay);
            }
            let n = stream.read_frames(&mut block);
            let take = n.min(total - start as usize);
            if let Err(e) = sink(&block[..take]) {
                result = Err(e);
                break;
            }
            start = end;
        }
        self.synth.close()?;
        result
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump(mut stream: SynthStream, mut output: CpalOutput, stop: &AtomicBool, played: &AtomicU64) {
    let mut chunk = vec![Frame::silence(); CONTROL_BLOCK];
    while !stop.load(Ordering::Relaxed) {
        let n = stream.read_frames(&mut chunk);
        if n == 0 {
            break;
        }
        if let Err(e) = output.write(&chunk[..n]) {
            error!(%e, "audio write failed");
            break;
        }
        played.fetch_add(n as u64, Ordering::Relaxed);
    }
    let _ = output.stop();
}
