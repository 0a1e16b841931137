//! Audio-rate half of a voice.
//!
//! One renderer per pool slot, owned by the mixer. `sync` copies the
//! control values of its slot while the synthesizer lock is held;
//! `render` then runs without the lock.

use core::f32::consts::{FRAC_1_SQRT_2, FRAC_PI_2};
use std::sync::Arc;

use crate::generators::{LowPass, Wavetable};
use crate::mixer::{Bus, BusBank};
use crate::performer::{slot, CompiledPerformer, MAX_OSCILLATORS};
use crate::units::{centibels_to_gain, cents_to_ratio};
use crate::voice::Voice;

/// Pan positions within this many per-mille of centre use the mono bus.
const CENTRE_WIDTH: f64 = 0.5;

pub struct VoiceRenderer {
    id: u64,
    live: bool,
    ended: bool,
    released: bool,
    audible: bool,
    performer: Option<Arc<CompiledPerformer>>,
    oscillators: [Wavetable; MAX_OSCILLATORS],
    filter: LowPass,
    /// Amplitude at the end of the previous block.
    prev_gain: Option<f32>,
    delay: usize,
    pitch: f64,
    gain_cb: f64,
    pan: f64,
    reverb: f64,
    chorus: f64,
    filter_freq: f64,
    filter_q: f64,
    scratch: Vec<f32>,
}

impl VoiceRenderer {
    pub fn new(frames: usize) -> Self {
        Self {
            id: 0,
            live: false,
            ended: false,
            released: false,
            audible: true,
            performer: None,
            oscillators: Default::default(),
            filter: LowPass::new(),
            prev_gain: None,
            delay: 0,
            pitch: 0.0,
            gain_cb: 0.0,
            pan: 500.0,
            reverb: 0.0,
            chorus: 0.0,
            filter_freq: 13500.0,
            filter_q: 0.0,
            scratch: vec![0.0; frames],
        }
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    /// Voice id of a finished one-shot, once. The pool must then end it.
    pub fn take_ended(&mut self) -> Option<u64> {
        if self.live && self.ended {
            self.live = false;
            return Some(self.id);
        }
        None
    }

    /// Copy control state from the pool slot.
    pub fn sync(&mut self, voice: &Voice, audible: bool) {
        if !voice.active {
            self.live = false;
            return;
        }
        if !self.live || voice.id != self.id {
            self.id = voice.id;
            self.live = true;
            self.ended = false;
            self.released = false;
            self.performer.clone_from(&voice.performer);
            for osc in &mut self.oscillators {
                osc.start();
            }
            self.filter.reset();
            self.prev_gain = None;
            self.delay = voice.delay;
        }
        if !voice.on && !self.released {
            self.released = true;
            for osc in &mut self.oscillators {
                osc.release();
            }
        }
        self.audible = audible;
        self.pitch = voice.destination(slot::PITCH);
        self.gain_cb = voice.destination(slot::GAIN);
        self.pan = voice.destination(slot::PAN);
        self.reverb = voice.destination(slot::REVERB);
        self.chorus = voice.destination(slot::CHORUS);
        self.filter_freq = voice.destination(slot::FILTER_FREQ);
        self.filter_q = voice.destination(slot::FILTER_Q);
    }

    /// Render one block and add it to the buses.
    pub fn render(&mut self, buses: &mut BusBank, sample_rate: f64) {
        if !self.live || self.ended {
            return;
        }
        let Some(perf) = self.performer.as_ref() else {
            self.ended = true;
            return;
        };

        self.scratch.fill(0.0);
        let mut ended = true;
        for (osc, res) in self.oscillators.iter_mut().zip(&perf.oscillators) {
            let cents = self.pitch + res.pitch_correction - res.root_key as f64 * 100.0;
            let step = cents_to_ratio(cents) * res.sample.sample_rate as f64 / sample_rate;
            let gain = centibels_to_gain(-res.attenuation) as f32;
            osc.render(&res.sample, step, gain, &mut self.scratch);
            ended &= osc.is_ended();
        }
        self.ended = ended;

        let target = if self.audible {
            centibels_to_gain(self.gain_cb) as f32
        } else {
            0.0
        };
        let start = self.prev_gain.unwrap_or(target);
        self.prev_gain = Some(target);
        if start == 0.0 && target == 0.0 {
            return;
        }

        self.filter.set(self.filter_freq, self.filter_q, sample_rate);
        self.filter.process(&mut self.scratch);

        let n = self.scratch.len();
        let step = (target - start) / n as f32;
        for (i, s) in self.scratch.iter_mut().enumerate() {
            *s *= start + step * (i + 1) as f32;
        }

        let delay = self.delay;
        if (self.pan - 500.0).abs() < CENTRE_WIDTH {
            buses.add_shifted(Bus::Mono, &self.scratch, FRAC_1_SQRT_2, delay);
        } else {
            let p = (self.pan / 1000.0).clamp(0.0, 1.0) as f32 * FRAC_PI_2;
            buses.add_shifted(Bus::Left, &self.scratch, libm::cosf(p), delay);
            buses.add_shifted(Bus::Right, &self.scratch, libm::sinf(p), delay);
        }
        let send = |v: f64| (v / 1000.0).clamp(0.0, 1.0) as f32;
        buses.add_shifted(Bus::ReverbSend, &self.scratch, send(self.reverb), delay);
        buses.add_shifted(Bus::ChorusSend, &self.scratch, send(self.chorus), delay);
    }
}
