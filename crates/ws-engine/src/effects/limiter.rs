//! Look-behind peak limiter.
//!
//! Output runs one block late: each call measures the incoming block
//! together with the held one, then releases the held block with a gain
//! ramp that keeps both under the ceiling. The held block lives in the
//! caller's buffers.

use ws_model::AudioBuffer;

/// Output peak never exceeds this.
pub const CEILING: f32 = 0.99;

#[derive(Clone, Debug)]
pub struct Limiter {
    gain: f32,
}

impl Default for Limiter {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

impl Limiter {
    pub fn gain(&self) -> f32 {
        self.gain
    }

    pub fn reset(&mut self) {
        self.gain = 1.0;
    }

    /// Swap `left`/`right` with the held block and limit what comes out.
    pub fn process(
        &mut self,
        left: &mut AudioBuffer,
        right: &mut AudioBuffer,
        held_left: &mut AudioBuffer,
        held_right: &mut AudioBuffer,
    ) {
        let peak = left
            .peak()
            .max(right.peak())
            .max(held_left.peak())
            .max(held_right.peak());
        let target = if peak > CEILING { CEILING / peak } else { 1.0 };
        let next = if target < self.gain {
            target
        } else {
            (self.gain * 9.0 + target) / 10.0
        };

        left.swap(held_left);
        right.swap(held_right);

        let start = self.gain;
        for buf in [left, right] {
            if buf.is_silent() {
                continue;
            }
            let data = buf.data_mut();
            let step = (next - start) / data.len().max(1) as f32;
            for (i, s) in data.iter_mut().enumerate() {
                *s *= start + step * (i + 1) as f32;
            }
        }
        self.gain = next;
    }
}
