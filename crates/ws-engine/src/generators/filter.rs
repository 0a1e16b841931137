//! Resonant low-pass filter applied per voice at audio rate.

use core::f64::consts::{FRAC_1_SQRT_2, PI};

use crate::units::{abs_cents_to_hz, centibels_to_gain};

/// Magnitudes below this are flushed to zero to avoid denormal stalls.
const DENORMAL: f32 = 1.0e-20;

/// Transposed direct form II biquad low-pass.
#[derive(Clone, Debug, Default)]
pub struct LowPass {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
    z1: f32,
    z2: f32,
    bypass: bool,
    cutoff_cents: f64,
    q_cb: f64,
}

impl LowPass {
    pub fn new() -> Self {
        Self {
            bypass: true,
            cutoff_cents: f64::NAN,
            q_cb: f64::NAN,
            ..Default::default()
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.bypass
    }

    /// Clear the delay line.
    pub fn reset(&mut self) {
        self.z1 = 0.0;
        self.z2 = 0.0;
    }

    /// Set cutoff (absolute cents) and resonance (centibels).
    ///
    /// Cutoffs at or above 45% of the sample rate with no resonance bypass
    /// the filter.
    pub fn set(&mut self, cutoff_cents: f64, q_cb: f64, sample_rate: f64) {
        if cutoff_cents == self.cutoff_cents && q_cb == self.q_cb {
            return;
        }
        self.cutoff_cents = cutoff_cents;
        self.q_cb = q_cb;

        let hz = abs_cents_to_hz(cutoff_cents);
        let q_gain = centibels_to_gain(q_cb.max(0.0));
        if hz >= sample_rate * 0.45 && q_cb <= 0.0 {
            if !self.bypass {
                self.reset();
            }
            self.bypass = true;
            return;
        }
        self.bypass = false;

        let hz = hz.clamp(5.0, sample_rate * 0.49);
        let q = (q_gain * FRAC_1_SQRT_2).max(0.5);
        let w0 = 2.0 * PI * hz / sample_rate;
        let alpha = libm::sin(w0) / (2.0 * q);
        let cos = libm::cos(w0);
        let a0 = 1.0 + alpha;
        self.b0 = (((1.0 - cos) / 2.0) / a0) as f32;
        self.b1 = ((1.0 - cos) / a0) as f32;
        self.b2 = self.b0;
        self.a1 = ((-2.0 * cos) / a0) as f32;
        self.a2 = ((1.0 - alpha) / a0) as f32;
    }

    /// Filter `buf` in place.
    pub fn process(&mut self, buf: &mut [f32]) {
        if self.bypass {
            return;
        }
        for s in buf.iter_mut() {
            let x = *s;
            let y = self.b0 * x + self.z1;
            self.z1 = self.b1 * x - self.a1 * y + self.z2;
            self.z2 = self.b2 * x - self.a2 * y;
            *s = y;
        }
        if self.z1.abs() < DENORMAL {
            self.z1 = 0.0;
        }
        if self.z2.abs() < DENORMAL {
            self.z2 = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: f64 = 44100.0;

    fn sine(hz: f64, n: usize) -> Vec<f32> {
        (0..n).map(|i| (2.0 * PI * hz * i as f64 / SR).sin() as f32).collect()
    }

    fn rms(buf: &[f32]) -> f32 {
        (buf.iter().map(|s| s * s).sum::<f32>() / buf.len() as f32).sqrt()
    }

    #[test]
    fn default_cutoff_bypasses() {
        let mut f = LowPass::new();
        f.set(13500.0, 0.0, SR);
        assert!(f.is_bypassed());
        let mut buf = vec![0.5; 8];
        f.process(&mut buf);
        assert!(buf.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn attenuates_above_cutoff() {
        let mut f = LowPass::new();
        // ~500 Hz
        let cents = 6900.0 + 1200.0 * (500.0f64 / 440.0).log2();
        f.set(cents, 0.0, SR);
        assert!(!f.is_bypassed());

        let mut low = sine(100.0, 4410);
        let mut high = sine(8000.0, 4410);
        f.process(&mut low);
        f.reset();
        f.process(&mut high);
        assert!(rms(&low[2000..]) > 0.6);
        assert!(rms(&high[2000..]) < 0.02);
    }

    #[test]
    fn silence_decays_to_exact_zero() {
        let mut f = LowPass::new();
        f.set(6900.0, 100.0, SR);
        let mut buf = sine(440.0, 300);
        f.process(&mut buf);
        let mut silent = vec![0.0f32; 300];
        for _ in 0..2000 {
            silent.fill(0.0);
            f.process(&mut silent);
        }
        assert_eq!(silent[299], 0.0);
    }
}
