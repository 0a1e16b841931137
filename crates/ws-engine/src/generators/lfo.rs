//! Sine LFO with start delay, advanced once per control cycle.

use core::f64::consts::TAU;

use crate::units::{abs_cents_to_hz, timecents_to_seconds};

/// Runtime state for one LFO.
///
/// Output is unipolar `0.0..=1.0` with 0.5 as the resting value, so a
/// bipolar source transform maps it to `-1.0..=1.0` around zero.
#[derive(Clone, Debug)]
pub struct Lfo {
    /// Seconds since the voice started.
    elapsed: f64,
    /// Cycles, `0.0..1.0`.
    phase: f64,
    value: f64,
}

impl Default for Lfo {
    fn default() -> Self {
        Self {
            elapsed: 0.0,
            phase: 0.0,
            value: 0.5,
        }
    }
}

impl Lfo {
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn start(&mut self) {
        *self = Self::default();
    }

    /// Advance by `dt` seconds. `delay` in timecents, `freq` in absolute cents.
    pub fn advance(&mut self, delay: f64, freq: f64, dt: f64) {
        self.elapsed += dt;
        let wait = timecents_to_seconds(delay);
        if self.elapsed <= wait {
            return;
        }
        let running = (self.elapsed - wait).min(dt);
        self.phase = (self.phase + abs_cents_to_hz(freq) * running).fract();
        self.value = 0.5 + 0.5 * libm::sin(TAU * self.phase);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rests_at_centre_during_delay() {
        let mut lfo = Lfo::default();
        // One second delay.
        lfo.advance(0.0, 0.0, 0.5);
        assert_eq!(lfo.value(), 0.5);
    }

    #[test]
    fn quarter_cycle_peaks() {
        let mut lfo = Lfo::default();
        // 1 Hz: 6900 cents is 440 Hz, so 1 Hz is 6900 - 1200*log2(440).
        let one_hz = 6900.0 - 1200.0 * 440f64.log2();
        lfo.advance(-12000.0, one_hz, 0.25 + 1.0 / 1024.0);
        assert_abs_diff_eq!(lfo.value(), 1.0, epsilon = 1e-6);
    }

    #[test]
    fn stays_in_unit_range() {
        let mut lfo = Lfo::default();
        for _ in 0..1000 {
            lfo.advance(-12000.0, 0.0, 300.0 / 44100.0);
            assert!((0.0..=1.0).contains(&lfo.value()));
        }
    }
}
