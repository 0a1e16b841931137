//! Pull-style output stream.

use std::sync::Arc;

use parking_lot::Mutex;
use ws_model::CONTROL_BLOCK;

use crate::config::SynthConfig;
use crate::frame::{Frame, FRAME_BYTES};
use crate::mixer::MainMixer;
use crate::synth::SynthState;

/// Interleaved 16-bit stereo PCM, rendered one mixer cycle at a time as
/// the reader asks for it.
///
/// Returns no data once its synthesizer is closed or reopened.
pub struct SynthStream {
    state: Arc<Mutex<SynthState>>,
    session: u64,
    mixer: MainMixer,
    block: Vec<Frame>,
    /// Next unread frame of `block`.
    pos: usize,
}

impl SynthStream {
    pub(crate) fn new(state: Arc<Mutex<SynthState>>, session: u64, config: &SynthConfig, voices: usize) -> Self {
        Self {
            state,
            session,
            mixer: MainMixer::new(config, voices),
            block: vec![Frame::silence(); CONTROL_BLOCK],
            pos: CONTROL_BLOCK,
        }
    }

    /// Run one mixer cycle. False when the synthesizer is gone.
    fn cycle(&mut self) -> bool {
        {
            let mut st = self.state.lock();
            if !st.open || st.session != self.session {
                return false;
            }
            if st.effects_changed {
                st.effects_changed = false;
                let e = st.effects;
                self.mixer.set_reverb_preset(e.reverb_preset);
                self.mixer.set_reverb(e.reverb_on);
                self.mixer.set_chorus(e.chorus_on);
                self.mixer.set_limiter(e.limiter_on);
            }
            let st = &mut *st;
            self.mixer.control(&mut st.pool, &st.channels, &st.master);
        }
        self.mixer.render(&mut self.block);
        self.pos = 0;
        true
    }

    /// Fill `out` with frames. Returns the number written: `out.len()`
    /// while open, fewer only if the synthesizer closes.
    pub fn read_frames(&mut self, out: &mut [Frame]) -> usize {
        let mut written = 0;
        while written < out.len() {
            if self.pos >= self.block.len() && !self.cycle() {
                break;
            }
            let n = (self.block.len() - self.pos).min(out.len() - written);
            out[written..written + n].copy_from_slice(&self.block[self.pos..self.pos + n]);
            self.pos += n;
            written += n;
        }
        written
    }

    /// Write up to `len` bytes of little-endian interleaved PCM into
    /// `buf[offset..]`, rounded down to whole frames. Returns bytes written;
    /// 0 once closed.
    pub fn read(&mut self, buf: &mut [u8], offset: usize, len: usize) -> usize {
        let Some(dst) = buf.get_mut(offset..) else {
            return 0;
        };
        let len = len.min(dst.len());
        let frames = len / FRAME_BYTES;
        let mut written = 0;
        while written < frames {
            if self.pos >= self.block.len() && !self.cycle() {
                break;
            }
            let n = (self.block.len() - self.pos).min(frames - written);
            let src = &self.block[self.pos..self.pos + n];
            let out = &mut dst[written * FRAME_BYTES..(written + n) * FRAME_BYTES];
            for (chunk, f) in out.chunks_exact_mut(FRAME_BYTES).zip(src) {
                chunk.copy_from_slice(&f.to_le_bytes());
            }
            self.pos += n;
            written += n;
        }
        written * FRAME_BYTES
    }

    /// Frames left in the current block before the next cycle runs.
    pub fn buffered(&self) -> usize {
        self.block.len() - self.pos
    }
}
