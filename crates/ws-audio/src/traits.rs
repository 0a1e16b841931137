//! Audio output trait and error types.

use thiserror::Error;
use ws_engine::Frame;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    /// Failed to initialize audio device
    #[error("device init error: {0}")]
    DeviceInit(String),
    /// Failed to create audio stream
    #[error("stream create error: {0}")]
    StreamCreate(String),
    /// Playback error
    #[error("playback error: {0}")]
    Playback(String),
    /// No audio device available
    #[error("no audio device available")]
    NoDevice,
}

/// A sink for interleaved 16-bit stereo frames.
pub trait AudioOutput {
    /// Get the sample rate.
    fn sample_rate(&self) -> u32;

    /// Write frames, blocking until the device has taken them. Frames
    /// written while stopped are discarded.
    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError>;

    /// Start playback.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop playback.
    fn stop(&mut self) -> Result<(), AudioError>;
}

/// Sink that keeps everything written to it. Used for offline rendering
/// and in tests.
#[derive(Debug, Default)]
pub struct MemoryOutput {
    sample_rate: u32,
    running: bool,
    pub frames: Vec<Frame>,
}

impl MemoryOutput {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            running: false,
            frames: Vec::new(),
        }
    }
}

impl AudioOutput for MemoryOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn write(&mut self, frames: &[Frame]) -> Result<(), AudioError> {
        if self.running {
            self.frames.extend_from_slice(frames);
        }
        Ok(())
    }

    fn start(&mut self) -> Result<(), AudioError> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_output_drops_frames_while_stopped() {
        let mut out = MemoryOutput::new(44100);
        out.write(&[Frame::mono(1)]).unwrap();
        assert!(out.frames.is_empty());
        out.start().unwrap();
        out.write(&[Frame::mono(2), Frame::mono(3)]).unwrap();
        out.stop().unwrap();
        out.write(&[Frame::mono(4)]).unwrap();
        assert_eq!(out.frames, vec![Frame::mono(2), Frame::mono(3)]);
    }

    #[test]
    fn errors_display() {
        assert_eq!(AudioError::NoDevice.to_string(), "no audio device available");
        assert_eq!(
            AudioError::StreamCreate("busy".into()).to_string(),
            "stream create error: busy"
        );
    }
}
