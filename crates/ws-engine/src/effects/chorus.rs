//! Stereo chorus: two LFO-swept delay lines, a quarter cycle apart.

use core::f32::consts::{FRAC_PI_2, TAU};

use ws_model::{AudioBuffer, CONTROL_BLOCK};

use super::delay::DelayLine;

const RATE_HZ: f32 = 0.4;
/// Centre delay in seconds.
const BASE_DELAY: f32 = 0.012;
/// Sweep depth in seconds either side of the centre.
const DEPTH: f32 = 0.003;
const FEEDBACK: f32 = 0.12;
const WET: f32 = 0.5;

/// Per-sample constants, derived from the sample rate on first use.
#[derive(Clone, Copy, Debug)]
struct Coefficients {
    phase_step: f32,
    base: f32,
    depth: f32,
    /// Blocks of silent input before the lines are empty.
    tail_blocks: usize,
}

impl Coefficients {
    fn new(sample_rate: f32) -> Self {
        let longest = (BASE_DELAY + DEPTH) * sample_rate;
        // Feedback decays by 60 dB within a handful of passes.
        let passes = (0.001f32.ln() / FEEDBACK.ln()).ceil();
        Self {
            phase_step: TAU * RATE_HZ / sample_rate,
            base: BASE_DELAY * sample_rate,
            depth: DEPTH * sample_rate,
            tail_blocks: (passes * longest / CONTROL_BLOCK as f32).ceil() as usize + 1,
        }
    }
}

/// Chorus stage fed from the chorus send bus.
#[derive(Clone, Debug)]
pub struct Chorus {
    sample_rate: f32,
    coefs: Option<Coefficients>,
    lines: [DelayLine; 2],
    last: [f32; 2],
    phase: f32,
    countdown: usize,
}

impl Chorus {
    pub fn new(sample_rate: u32) -> Self {
        let sr = sample_rate as f32;
        let capacity = ((BASE_DELAY + DEPTH) * sr).ceil() as usize + 4;
        Self {
            sample_rate: sr,
            coefs: None,
            lines: [DelayLine::new(capacity), DelayLine::new(capacity)],
            last: [0.0; 2],
            phase: 0.0,
            countdown: 0,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.countdown == 0
    }

    pub fn clear(&mut self) {
        for line in &mut self.lines {
            line.clear();
        }
        self.last = [0.0; 2];
        self.countdown = 0;
    }

    /// Write the wet stereo signal for `input` into `left`/`right` (added).
    pub fn process(&mut self, input: &AudioBuffer, left: &mut AudioBuffer, right: &mut AudioBuffer) {
        let c = *self.coefs.get_or_insert_with(|| Coefficients::new(self.sample_rate));
        if input.is_silent() {
            if self.countdown == 0 {
                return;
            }
            self.countdown -= 1;
            if self.countdown == 0 {
                self.clear();
                return;
            }
        } else {
            self.countdown = c.tail_blocks;
        }

        let src = input.data();
        let (l, r) = (left.data_mut(), right.data_mut());
        let n = src.len().min(l.len()).min(r.len());
        for i in 0..n {
            let mut out = [0.0f32; 2];
            for (side, o) in out.iter_mut().enumerate() {
                let lfo = libm::sinf(self.phase + side as f32 * FRAC_PI_2);
                let line = &mut self.lines[side];
                line.write(src[i] + self.last[side] * FEEDBACK);
                let y = line.read(c.base + c.depth * lfo);
                self.last[side] = y;
                *o = y * WET;
            }
            l[i] += out[0];
            r[i] += out[1];
            self.phase += c.phase_step;
            if self.phase >= TAU {
                self.phase -= TAU;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn impulse_arrives_after_base_delay() {
        let mut chorus = Chorus::new(44100);
        let mut input = AudioBuffer::new(CONTROL_BLOCK);
        input.data_mut()[0] = 1.0;
        let mut l = AudioBuffer::new(CONTROL_BLOCK);
        let mut r = AudioBuffer::new(CONTROL_BLOCK);
        chorus.process(&input, &mut l, &mut r);
        // Shortest delay is 9 ms: 396 frames, past the first block.
        assert_eq!(l.peak(), 0.0);

        let mut l = AudioBuffer::new(CONTROL_BLOCK);
        let mut r = AudioBuffer::new(CONTROL_BLOCK);
        chorus.process(&AudioBuffer::new(CONTROL_BLOCK), &mut l, &mut r);
        chorus.process(&AudioBuffer::new(CONTROL_BLOCK), &mut l, &mut r);
        assert!(l.peak() > 0.0);
        assert!(r.peak() > 0.0);
    }

    #[test]
    fn sides_differ() {
        let mut chorus = Chorus::new(44100);
        let mut input = AudioBuffer::new(CONTROL_BLOCK);
        for (i, s) in input.data_mut().iter_mut().enumerate() {
            *s = libm::sinf(i as f32 * 0.05);
        }
        let mut l = AudioBuffer::new(CONTROL_BLOCK);
        let mut r = AudioBuffer::new(CONTROL_BLOCK);
        for _ in 0..20 {
            chorus.process(&input, &mut l, &mut r);
        }
        assert_ne!(l.data(), r.data());
    }

    #[test]
    fn goes_idle_after_input_stops() {
        let mut chorus = Chorus::new(44100);
        let mut input = AudioBuffer::new(CONTROL_BLOCK);
        input.data_mut().fill(0.5);
        let mut l = AudioBuffer::new(CONTROL_BLOCK);
        let mut r = AudioBuffer::new(CONTROL_BLOCK);
        chorus.process(&input, &mut l, &mut r);
        let silence = AudioBuffer::new(CONTROL_BLOCK);
        let mut blocks = 0;
        while !chorus.is_idle() {
            chorus.process(&silence, &mut l, &mut r);
            blocks += 1;
            assert!(blocks < 100);
        }
    }
}
