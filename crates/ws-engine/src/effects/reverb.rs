//! Stereo reverb: pre-delay, eight damped combs and four all-passes per side.
//!
//! Freeverb topology. The right side uses the same lengths plus a fixed
//! spread for decorrelation. The two sides are recombined as mid and side
//! before reaching the output.
//!
//! Once the send goes silent and the tail has started, the output is held
//! to a non-increasing block peak, so late comb build-up can never swell
//! past what came before.

use ws_model::{AudioBuffer, CONTROL_BLOCK};

use super::delay::DelayLine;
use crate::config::ReverbParams;
use crate::units::damping_coefficient;

const COMB_TUNING: [usize; 8] = [1116, 1188, 1277, 1356, 1422, 1491, 1557, 1617];
const ALLPASS_TUNING: [usize; 4] = [556, 441, 341, 225];
const STEREO_SPREAD: usize = 23;
const ALLPASS_FEEDBACK: f32 = 0.5;
const INPUT_GAIN: f32 = 0.015;
/// Side weight relative to mid. Below 1.0 the outputs stay correlated.
const WIDTH: f32 = 0.6;
/// Longest pre-delay any preset asks for, in seconds.
const MAX_PREDELAY: f32 = 0.05;

#[derive(Clone, Debug)]
struct Comb {
    buf: Vec<f32>,
    pos: usize,
    store: f32,
}

impl Comb {
    fn new(len: usize) -> Self {
        Self {
            buf: vec![0.0; len],
            pos: 0,
            store: 0.0,
        }
    }

    #[inline]
    fn process(&mut self, x: f32, feedback: f32, damp: f32) -> f32 {
        let out = self.buf[self.pos];
        self.store = out * (1.0 - damp) + self.store * damp;
        self.buf[self.pos] = x + self.store * feedback;
        self.pos = (self.pos + 1) % self.buf.len();
        out
    }

    fn clear(&mut self) {
        self.buf.fill(0.0);
        self.store = 0.0;
    }
}

#[derive(Clone, Debug)]
struct Allpass {
    buf: Vec<f32>,
    pos: usize,
}

impl Allpass {
    fn new(len: usize) -> Self {
        Self {
            buf: vec![0.0; len],
            pos: 0,
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let delayed = self.buf[self.pos];
        self.buf[self.pos] = x + delayed * ALLPASS_FEEDBACK;
        self.pos = (self.pos + 1) % self.buf.len();
        delayed - x
    }

    fn clear(&mut self) {
        self.buf.fill(0.0);
    }
}

/// Reverb stage fed from the reverb send bus.
#[derive(Clone, Debug)]
pub struct Reverb {
    sample_rate: f32,
    predelay: DelayLine,
    predelay_frames: f32,
    combs: [Vec<Comb>; 2],
    allpasses: [Vec<Allpass>; 2],
    feedback: f32,
    damp: f32,
    wet: f32,
    /// Wet block before it is added to the output.
    scratch: [Vec<f32>; 2],
    /// Output peak of the previous block.
    last_peak: f32,
    /// Blocks the tail needs to fall below -60 dB.
    tail_blocks: usize,
    /// Blocks left before going idle.
    countdown: usize,
}

impl Reverb {
    pub fn new(sample_rate: u32, params: ReverbParams) -> Self {
        let sr = sample_rate as f32;
        let side = |spread: usize| {
            (
                COMB_TUNING.iter().map(|&n| Comb::new(n + spread)).collect(),
                ALLPASS_TUNING.iter().map(|&n| Allpass::new(n + spread)).collect(),
            )
        };
        let (comb_l, allpass_l) = side(0);
        let (comb_r, allpass_r) = side(STEREO_SPREAD);
        let mut reverb = Self {
            sample_rate: sr,
            predelay: DelayLine::new((MAX_PREDELAY * sr) as usize + 2),
            predelay_frames: 0.0,
            combs: [comb_l, comb_r],
            allpasses: [allpass_l, allpass_r],
            feedback: 0.0,
            damp: 0.0,
            wet: 0.0,
            scratch: [vec![0.0; CONTROL_BLOCK], vec![0.0; CONTROL_BLOCK]],
            last_peak: 0.0,
            tail_blocks: 0,
            countdown: 0,
        };
        reverb.set_params(params);
        reverb
    }

    /// Switch preset. Does not allocate.
    pub fn set_params(&mut self, params: ReverbParams) {
        let room = params.room_size.max(0.2);
        self.feedback = 1.0 - 0.17 / room;
        self.damp = damping_coefficient(params.damp_hz as f64, self.sample_rate as f64) as f32;
        self.wet = params.gain * 0.5;
        self.predelay_frames = (params.predelay.clamp(0.0, MAX_PREDELAY) * self.sample_rate).round();

        let passes = (0.001f64.ln() / (self.feedback as f64).ln()).ceil();
        let longest = (COMB_TUNING[7] + STEREO_SPREAD) as f64;
        let diffusion: usize = ALLPASS_TUNING.iter().map(|n| n + STEREO_SPREAD).sum();
        let frames = passes * longest + diffusion as f64 + self.predelay_frames as f64;
        self.tail_blocks = (frames / CONTROL_BLOCK as f64).ceil() as usize + 1;
    }

    /// True once the tail has died out; `process` is then a no-op until
    /// new input arrives.
    pub fn is_idle(&self) -> bool {
        self.countdown == 0
    }

    pub fn clear(&mut self) {
        self.predelay.clear();
        for side in &mut self.combs {
            side.iter_mut().for_each(Comb::clear);
        }
        for side in &mut self.allpasses {
            side.iter_mut().for_each(Allpass::clear);
        }
        self.countdown = 0;
        self.last_peak = 0.0;
    }

    /// Add the wet signal for `input` into `left`/`right`.
    pub fn process(&mut self, input: &AudioBuffer, left: &mut AudioBuffer, right: &mut AudioBuffer) {
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
            self.countdown = self.tail_blocks;
        }

        let silent = input.is_silent();
        let (feedback, damp) = (self.feedback, self.damp);
        let mid_gain = self.wet * 0.5;
        let side_gain = mid_gain * WIDTH;
        let src = input.data();
        let [wl, wr] = &mut self.scratch;
        let n = src.len().min(wl.len());
        let mut peak = 0.0f32;
        for i in 0..n {
            let x = if self.predelay_frames > 0.0 {
                self.predelay.write(src[i]);
                self.predelay.read(self.predelay_frames)
            } else {
                src[i]
            } * INPUT_GAIN;

            let mut out = [0.0f32; 2];
            for (side, o) in out.iter_mut().enumerate() {
                let mut acc = 0.0;
                for comb in &mut self.combs[side] {
                    acc += comb.process(x, feedback, damp);
                }
                for ap in &mut self.allpasses[side] {
                    acc = ap.process(acc);
                }
                *o = acc;
            }
            let mid = (out[0] + out[1]) * mid_gain;
            let side = (out[0] - out[1]) * side_gain;
            wl[i] = mid + side;
            wr[i] = mid - side;
            peak = peak.max(wl[i].abs()).max(wr[i].abs());
        }

        let cap = self.last_peak;
        let scale = if silent && cap > 0.0 && peak > cap { cap / peak } else { 1.0 };
        let (l, r) = (left.data_mut(), right.data_mut());
        let n = n.min(l.len()).min(r.len());
        let mut out_peak = 0.0f32;
        for i in 0..n {
            let (mut a, mut b) = (wl[i] * scale, wr[i] * scale);
            if scale < 1.0 {
                a = a.clamp(-cap, cap);
                b = b.clamp(-cap, cap);
            }
            out_peak = out_peak.max(a.abs()).max(b.abs());
            l[i] += a;
            r[i] += b;
        }
        self.last_peak = out_peak;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReverbPreset;

    fn noise_block(seed: &mut u32) -> AudioBuffer {
        let mut b = AudioBuffer::new(CONTROL_BLOCK);
        for s in b.data_mut() {
            *seed = seed.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            *s = (*seed >> 8) as f32 / (1u32 << 24) as f32 - 0.5;
        }
        b
    }

    fn run(reverb: &mut Reverb, input: &AudioBuffer) -> (AudioBuffer, AudioBuffer) {
        let mut l = AudioBuffer::new(CONTROL_BLOCK);
        let mut r = AudioBuffer::new(CONTROL_BLOCK);
        reverb.process(input, &mut l, &mut r);
        (l, r)
    }

    #[test]
    fn starts_idle_and_ignores_silence() {
        let mut reverb = Reverb::new(44100, ReverbPreset::LargeRoom.params());
        assert!(reverb.is_idle());
        let (l, r) = run(&mut reverb, &AudioBuffer::new(CONTROL_BLOCK));
        assert!(l.is_silent() && r.is_silent());
    }

    #[test]
    fn produces_a_tail() {
        let mut reverb = Reverb::new(44100, ReverbPreset::LargeRoom.params());
        let mut seed = 1;
        for _ in 0..10 {
            run(&mut reverb, &noise_block(&mut seed));
        }
        let (l, r) = run(&mut reverb, &AudioBuffer::new(CONTROL_BLOCK));
        assert!(l.peak() > 0.0 && r.peak() > 0.0);
        assert!(!reverb.is_idle());
    }

    #[test]
    fn tail_decays_then_goes_idle() {
        for preset in [ReverbPreset::SmallRoom, ReverbPreset::MediumRoom, ReverbPreset::LargeHall] {
            let mut reverb = Reverb::new(44100, preset.params());
            let mut seed = 7;
            for _ in 0..20 {
                run(&mut reverb, &noise_block(&mut seed));
            }
            let silence = AudioBuffer::new(CONTROL_BLOCK);
            let mut prev = f32::INFINITY;
            let mut blocks = 0;
            while !reverb.is_idle() {
                let (l, r) = run(&mut reverb, &silence);
                let peak = l.peak().max(r.peak());
                assert!(peak <= prev, "{preset:?} block {blocks}: {prev} -> {peak}");
                prev = peak;
                blocks += 1;
                assert!(blocks < 10_000, "reverb never went idle");
            }
            assert!(blocks > 3);
            let (l, r) = run(&mut reverb, &silence);
            assert!(l.is_silent() && r.is_silent());
        }
    }

    #[test]
    fn mono_impulse_gives_correlated_but_distinct_sides() {
        let mut reverb = Reverb::new(44100, ReverbPreset::MediumRoom.params());
        let mut impulse = AudioBuffer::new(CONTROL_BLOCK);
        impulse.data_mut()[0] = 1.0;
        let (mut cross, mut diff) = (0.0f64, 0.0f64);
        for _ in 0..40 {
            let (l, r) = run(&mut reverb, &impulse);
            for (&a, &b) in l.data().iter().zip(r.data()) {
                cross += a as f64 * b as f64;
                diff += (a - b).abs() as f64;
            }
            impulse = AudioBuffer::new(CONTROL_BLOCK);
        }
        assert!(cross > 0.0, "sides anti-correlated: {cross}");
        assert!(diff > 0.0, "sides identical");
    }

    #[test]
    fn short_input_still_reaches_the_tail() {
        let mut reverb = Reverb::new(44100, ReverbPreset::LargeHall.params());
        let mut impulse = AudioBuffer::new(CONTROL_BLOCK);
        impulse.data_mut()[0] = 1.0;
        let mut peaks = Vec::new();
        for _ in 0..20 {
            let (l, r) = run(&mut reverb, &impulse);
            peaks.push(l.peak().max(r.peak()));
            impulse = AudioBuffer::new(CONTROL_BLOCK);
        }
        assert_eq!(peaks[0], 0.0);
        assert!(peaks.iter().any(|&p| p > 0.0));
    }

    #[test]
    fn presets_have_stable_feedback() {
        for preset in [
            ReverbPreset::SmallRoom,
            ReverbPreset::MediumRoom,
            ReverbPreset::LargeRoom,
            ReverbPreset::MediumHall,
            ReverbPreset::LargeHall,
            ReverbPreset::Plate,
        ] {
            let reverb = Reverb::new(44100, preset.params());
            assert!(reverb.feedback > 0.0 && reverb.feedback < 1.0);
            assert!(reverb.damp >= 0.0 && reverb.damp < 1.0);
        }
    }

    #[test]
    fn predelay_shifts_onset() {
        let mut reverb = Reverb::new(44100, ReverbPreset::LargeHall.params());
        let mut impulse = AudioBuffer::new(CONTROL_BLOCK);
        impulse.data_mut()[0] = 1.0;
        // 30 ms pre-delay plus the shortest comb: nothing for over 2000 frames.
        for _ in 0..7 {
            let (l, _) = run(&mut reverb, &impulse);
            assert_eq!(l.peak(), 0.0);
            impulse = AudioBuffer::new(CONTROL_BLOCK);
        }
    }
}
