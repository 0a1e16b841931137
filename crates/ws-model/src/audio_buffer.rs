//! Fixed-length mono f32 block with a silence flag.

use alloc::vec;
use alloc::vec::Vec;

/// Frames rendered per control cycle.
pub const CONTROL_BLOCK: usize = 300;

/// A mono f32 block.
///
/// The silence flag is a promise that every sample is zero: it is set by
/// `clear()` and dropped as soon as mutable access is handed out. Consumers
/// use it to skip work on idle buses.
#[derive(Clone, Debug)]
pub struct AudioBuffer {
    data: Vec<f32>,
    silent: bool,
}

impl AudioBuffer {
    /// Create a new silent buffer of `frames` samples.
    pub fn new(frames: usize) -> Self {
        Self {
            data: vec![0.0; frames],
            silent: true,
        }
    }

    /// Number of frames.
    pub fn frames(&self) -> usize {
        self.data.len()
    }

    /// True when every sample is known to be zero.
    pub fn is_silent(&self) -> bool {
        self.silent
    }

    /// Zero the block and mark it silent.
    pub fn clear(&mut self) {
        if !self.silent {
            self.data.fill(0.0);
            self.silent = true;
        }
    }

    /// Read-only access to the samples.
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Mutable access to the samples. Marks the block non-silent.
    pub fn data_mut(&mut self) -> &mut [f32] {
        self.silent = false;
        &mut self.data
    }

    /// Exchange contents (samples and silence flag) with `other` without copying.
    pub fn swap(&mut self, other: &mut AudioBuffer) {
        core::mem::swap(&mut self.data, &mut other.data);
        core::mem::swap(&mut self.silent, &mut other.silent);
    }

    /// Sum `source` into this buffer.
    pub fn mix_from(&mut self, source: &AudioBuffer) {
        if source.silent {
            return;
        }
        let frs = self.data.len().min(source.data.len());
        let dst = self.data_mut();
        for i in 0..frs {
            dst[i] += source.data[i];
        }
    }

    /// Sum `source` into this buffer with gain.
    pub fn mix_from_scaled(&mut self, source: &AudioBuffer, gain: f32) {
        if source.silent || gain == 0.0 {
            return;
        }
        let frs = self.data.len().min(source.data.len());
        let dst = self.data_mut();
        for i in 0..frs {
            dst[i] += source.data[i] * gain;
        }
    }

    /// Scale all samples by `gain`.
    pub fn apply_gain(&mut self, gain: f32) {
        if self.silent {
            return;
        }
        for s in &mut self.data {
            *s *= gain;
        }
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        if self.silent {
            return 0.0;
        }
        self.data.iter().fold(0.0f32, |m, s| m.max(s.abs()))
    }
}
