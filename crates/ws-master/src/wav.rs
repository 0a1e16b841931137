//! WAV encoding for 16-bit stereo PCM.

use std::io::{self, Seek, SeekFrom, Write};

use ws_engine::{Frame, FRAME_BYTES};

const HEADER_LEN: usize = 44;
const CHANNELS: u16 = 2;
const BITS: u16 = 16;

/// Canonical 44-byte header for `data_len` bytes of PCM.
fn header(data_len: u32, sample_rate: u32) -> [u8; HEADER_LEN] {
    let block_align = CHANNELS * BITS / 8;
    let mut h = [0u8; HEADER_LEN];
    let mut at = 0;
    let mut put = |bytes: &[u8]| {
        h[at..at + bytes.len()].copy_from_slice(bytes);
        at += bytes.len();
    };
    put(b"RIFF");
    put(&(36u32.saturating_add(data_len)).to_le_bytes());
    put(b"WAVE");
    put(b"fmt ");
    put(&16u32.to_le_bytes());
    put(&1u16.to_le_bytes());
    put(&CHANNELS.to_le_bytes());
    put(&sample_rate.to_le_bytes());
    put(&(sample_rate * block_align as u32).to_le_bytes());
    put(&block_align.to_le_bytes());
    put(&BITS.to_le_bytes());
    put(b"data");
    put(&data_len.to_le_bytes());
    h
}

fn data_len(frames: usize) -> u32 {
    u32::try_from(frames * FRAME_BYTES).unwrap_or(u32::MAX)
}

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> io::Result<()> {
    w.write_all(&header(data_len(frames.len()), sample_rate))?;
    for frame in frames {
        w.write_all(&frame.to_le_bytes())?;
    }
    Ok(())
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + frames.len() * FRAME_BYTES);
    buf.extend_from_slice(&header(data_len(frames.len()), sample_rate));
    for frame in frames {
        buf.extend_from_slice(&frame.to_le_bytes());
    }
    buf
}

/// Streams frames of unknown total length; sizes are patched in `finish`.
pub struct WavWriter<W: Write + Seek> {
    inner: W,
    sample_rate: u32,
    frames: usize,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(mut inner: W, sample_rate: u32) -> io::Result<Self> {
        inner.write_all(&header(0, sample_rate))?;
        Ok(Self {
            inner,
            sample_rate,
            frames: 0,
        })
    }

    pub fn write_frames(&mut self, frames: &[Frame]) -> io::Result<()> {
        for frame in frames {
            self.inner.write_all(&frame.to_le_bytes())?;
        }
        self.frames += frames.len();
        Ok(())
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Rewrite the header with the final sizes and return the sink.
    pub fn finish(mut self) -> io::Result<W> {
        let end = self.inner.stream_position()?;
        self.inner.seek(SeekFrom::Start(0))?;
        self.inner
            .write_all(&header(data_len(self.frames), self.sample_rate))?;
        self.inner.seek(SeekFrom::Start(end))?;
        self.inner.flush()?;
        Ok(self.inner)
    }
}
