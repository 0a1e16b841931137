//! Main mixer: bus bank, per-cycle control and render passes.
//!
//! A cycle is split in two so the synthesizer lock is only held for the
//! cheap half. [`MainMixer::control`] runs under the lock: it advances
//! every voice one control step and copies the results into the voice
//! renderers. [`MainMixer::render`] runs without the lock and produces
//! one block of output frames.

use ws_model::AudioBuffer;

use crate::channel::Channel;
use crate::config::{ReverbPreset, SynthConfig};
use crate::controls::MasterControls;
use crate::effects::{Chorus, Limiter, Reverb};
use crate::frame::Frame;
use crate::renderer::VoiceRenderer;
use crate::voice_pool::VoicePool;

/// The fourteen buses of the bank.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Bus {
    Left,
    Right,
    Mono,
    ReverbSend,
    ChorusSend,
    DelayedLeft,
    DelayedRight,
    DelayedMono,
    DelayedReverb,
    DelayedChorus,
    /// Limiter look-behind, left.
    DryLeft,
    /// Limiter look-behind, right.
    DryRight,
    Scratch1,
    Scratch2,
}

pub const BUS_COUNT: usize = 14;

/// Live buses paired with the bus that carries their tail into the next cycle.
const CARRY: [(Bus, Bus); 5] = [
    (Bus::Left, Bus::DelayedLeft),
    (Bus::Right, Bus::DelayedRight),
    (Bus::Mono, Bus::DelayedMono),
    (Bus::ReverbSend, Bus::DelayedReverb),
    (Bus::ChorusSend, Bus::DelayedChorus),
];

impl Bus {
    /// Carry-over bus for a live bus. Other buses have none.
    pub fn delayed(self) -> Option<Bus> {
        CARRY.iter().find(|(live, _)| *live == self).map(|&(_, d)| d)
    }

    fn is_persistent(self) -> bool {
        matches!(
            self,
            Bus::DelayedLeft
                | Bus::DelayedRight
                | Bus::DelayedMono
                | Bus::DelayedReverb
                | Bus::DelayedChorus
                | Bus::DryLeft
                | Bus::DryRight
        )
    }
}

/// Fixed set of named mono buffers.
pub struct BusBank {
    buses: [AudioBuffer; BUS_COUNT],
}

impl BusBank {
    pub fn new(frames: usize) -> Self {
        Self {
            buses: core::array::from_fn(|_| AudioBuffer::new(frames)),
        }
    }

    pub fn get(&self, bus: Bus) -> &AudioBuffer {
        &self.buses[bus as usize]
    }

    pub fn get_mut(&mut self, bus: Bus) -> &mut AudioBuffer {
        &mut self.buses[bus as usize]
    }

    /// Mutable references to several distinct buses at once. A bus named
    /// twice yields `None` in its later positions.
    pub fn disjoint_mut<const N: usize>(&mut self, which: [Bus; N]) -> [Option<&mut AudioBuffer>; N] {
        let mut out: [Option<&mut AudioBuffer>; N] = core::array::from_fn(|_| None);
        for (i, buf) in self.buses.iter_mut().enumerate() {
            if let Some(k) = which.iter().position(|b| *b as usize == i) {
                out[k] = Some(buf);
            }
        }
        out
    }

    /// Add `src × gain` to `bus`, starting `delay` frames in. Frames that
    /// run past the block go to the start of the bus's carry-over.
    pub fn add_shifted(&mut self, bus: Bus, src: &[f32], gain: f32, delay: usize) {
        if gain == 0.0 {
            return;
        }
        let carry = bus.delayed().filter(|_| delay > 0);
        let Some(carry) = carry else {
            let dst = self.get_mut(bus).data_mut();
            for (d, s) in dst.iter_mut().zip(src) {
                *d += s * gain;
            }
            return;
        };
        let [Some(live), Some(tail)] = self.disjoint_mut([bus, carry]) else {
            return;
        };
        let live = live.data_mut();
        let n = live.len().min(src.len());
        let delay = delay.min(n);
        let split = n - delay;
        for (d, s) in live[delay..n].iter_mut().zip(&src[..split]) {
            *d += s * gain;
        }
        for (d, s) in tail.data_mut().iter_mut().zip(&src[split..n]) {
            *d += s * gain;
        }
    }

    /// Start a cycle: clear the transient buses, then bring in last
    /// cycle's carry-over.
    pub fn begin_cycle(&mut self) {
        for (i, buf) in self.buses.iter_mut().enumerate() {
            if !BUSES[i].is_persistent() {
                buf.clear();
            }
        }
        for (live, delayed) in CARRY {
            if self.get(delayed).is_silent() {
                continue;
            }
            if let [Some(a), Some(b)] = self.disjoint_mut([live, delayed]) {
                a.swap(b);
            }
        }
    }

    pub fn clear(&mut self) {
        for buf in &mut self.buses {
            buf.clear();
        }
    }
}

const BUSES: [Bus; BUS_COUNT] = [
    Bus::Left,
    Bus::Right,
    Bus::Mono,
    Bus::ReverbSend,
    Bus::ChorusSend,
    Bus::DelayedLeft,
    Bus::DelayedRight,
    Bus::DelayedMono,
    Bus::DelayedReverb,
    Bus::DelayedChorus,
    Bus::DryLeft,
    Bus::DryRight,
    Bus::Scratch1,
    Bus::Scratch2,
];

/// Owns the buses, one renderer per voice slot and the master effects.
pub struct MainMixer {
    buses: BusBank,
    renderers: Vec<VoiceRenderer>,
    reverb: Reverb,
    chorus: Chorus,
    limiter: Limiter,
    reverb_on: bool,
    chorus_on: bool,
    limiter_on: bool,
    sample_rate: f64,
    /// Seconds per control cycle.
    dt: f64,
    /// Master (left, right) gain applied at the end of the last block.
    gain: Option<(f32, f32)>,
    target: (f32, f32),
}

impl MainMixer {
    pub fn new(config: &SynthConfig, voices: usize) -> Self {
        let frames = config.control_block();
        Self {
            buses: BusBank::new(frames),
            renderers: (0..voices).map(|_| VoiceRenderer::new(frames)).collect(),
            reverb: Reverb::new(config.sample_rate, config.reverb_preset.params()),
            chorus: Chorus::new(config.sample_rate),
            limiter: Limiter::default(),
            reverb_on: config.reverb_on,
            chorus_on: config.chorus_on,
            limiter_on: config.limiter_on,
            sample_rate: config.sample_rate as f64,
            dt: 1.0 / config.control_rate(),
            gain: None,
            target: (1.0, 1.0),
        }
    }

    pub fn set_reverb_preset(&mut self, preset: ReverbPreset) {
        self.reverb.set_params(preset.params());
    }

    pub fn set_reverb(&mut self, on: bool) {
        if !on {
            self.reverb.clear();
        }
        self.reverb_on = on;
    }

    pub fn set_chorus(&mut self, on: bool) {
        if !on {
            self.chorus.clear();
        }
        self.chorus_on = on;
    }

    pub fn set_limiter(&mut self, on: bool) {
        self.limiter.reset();
        self.buses.get_mut(Bus::DryLeft).clear();
        self.buses.get_mut(Bus::DryRight).clear();
        self.limiter_on = on;
    }

    pub fn buses(&self) -> &BusBank {
        &self.buses
    }

    /// Drop all audio state: buses, effect tails and voice renderers.
    pub fn reset(&mut self) {
        self.buses.clear();
        self.reverb.clear();
        self.chorus.clear();
        self.limiter.reset();
        self.gain = None;
        for r in &mut self.renderers {
            r.sync(&Default::default(), true);
        }
    }

    /// Control pass. Call with the synthesizer lock held.
    pub fn control(&mut self, pool: &mut VoicePool, channels: &[Channel], master: &MasterControls) {
        for (slot, r) in self.renderers.iter_mut().enumerate() {
            if let Some(id) = r.take_ended() {
                pool.end_voice(slot, id);
            }
        }

        pool.control_pass(|ch| channels[ch as usize % channels.len()].context(master), self.dt);

        let any_solo = channels.iter().any(|c| c.solo);
        for (r, v) in self.renderers.iter_mut().zip(pool.voices()) {
            let audible = channels
                .get(v.channel as usize)
                .map_or(false, |c| !c.mute && (!any_solo || c.solo));
            r.sync(v, audible);
        }

        let (l, r) = master.balance_gains();
        let g = master.gain();
        self.target = (g * l, g * r);
    }

    /// Render pass: one block into `out`, which must be a full block long.
    pub fn render(&mut self, out: &mut [Frame]) {
        self.buses.begin_cycle();

        #[cfg(feature = "alloc_check")]
        assert_no_alloc::assert_no_alloc(|| self.render_voices());
        #[cfg(not(feature = "alloc_check"))]
        self.render_voices();

        self.run_effects();
        self.apply_master_gain();

        if self.limiter_on {
            if let [Some(l), Some(r), Some(hl), Some(hr)] =
                self.buses
                    .disjoint_mut([Bus::Left, Bus::Right, Bus::DryLeft, Bus::DryRight])
            {
                self.limiter.process(l, r, hl, hr);
            }
        }

        let left = self.buses.get(Bus::Left).data();
        let right = self.buses.get(Bus::Right).data();
        for ((f, &l), &r) in out.iter_mut().zip(left).zip(right) {
            *f = Frame::from_f32(l, r);
        }
    }

    fn render_voices(&mut self) {
        let sr = self.sample_rate;
        for r in &mut self.renderers {
            r.render(&mut self.buses, sr);
        }
    }

    fn run_effects(&mut self) {
        if let [Some(l), Some(r), Some(mono)] = self.buses.disjoint_mut([Bus::Left, Bus::Right, Bus::Mono]) {
            l.mix_from(mono);
            r.mix_from(mono);
        }

        if self.chorus_on {
            if let [Some(send), Some(wl), Some(wr)] =
                self.buses
                    .disjoint_mut([Bus::ChorusSend, Bus::Scratch1, Bus::Scratch2])
            {
                wl.clear();
                wr.clear();
                self.chorus.process(send, wl, wr);
            }
            if let [Some(l), Some(r), Some(wl), Some(wr)] =
                self.buses
                    .disjoint_mut([Bus::Left, Bus::Right, Bus::Scratch1, Bus::Scratch2])
            {
                l.mix_from(wl);
                r.mix_from(wr);
            }
        }

        if self.reverb_on {
            if let [Some(send), Some(l), Some(r)] =
                self.buses.disjoint_mut([Bus::ReverbSend, Bus::Left, Bus::Right])
            {
                self.reverb.process(send, l, r);
            }
        }
    }

    fn apply_master_gain(&mut self) {
        let target = self.target;
        let start = self.gain.unwrap_or(target);
        self.gain = Some(target);
        for (bus, from, to) in [(Bus::Left, start.0, target.0), (Bus::Right, start.1, target.1)] {
            let buf = self.buses.get_mut(bus);
            if buf.is_silent() {
                continue;
            }
            if from == to {
                buf.apply_gain(to);
                continue;
            }
            let data = buf.data_mut();
            let step = (to - from) / data.len().max(1) as f32;
            for (i, s) in data.iter_mut().enumerate() {
                *s *= from + step * (i + 1) as f32;
            }
        }
    }
}
