//! Synthesizer lifecycle and the channel event surface.
//!
//! All mutable state lives in one [`SynthState`] behind a single mutex.
//! Channel events, the control pass of each mixing cycle and open/close
//! all take that lock. The audio half of a cycle runs in
//! [`SynthStream`](crate::SynthStream) without it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, warn};
use ws_model::{Patch, Soundbank};

use crate::channel::Channel;
use crate::config::{ReverbPreset, SynthConfig};
use crate::controls::MasterControls;
use crate::error::{Result, SynthError};
use crate::performer::{CompiledPerformer, ResolvedInstrument};
use crate::stream::SynthStream;
use crate::voice::VoiceStatus;
use crate::voice_pool::VoicePool;

/// Number of MIDI channels.
pub const CHANNELS: usize = 16;

/// Effect switches, applied by the stream at the next cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct EffectSettings {
    pub reverb_on: bool,
    pub chorus_on: bool,
    pub limiter_on: bool,
    pub reverb_preset: ReverbPreset,
}

impl EffectSettings {
    fn from_config(config: &SynthConfig) -> Self {
        Self {
            reverb_on: config.reverb_on,
            chorus_on: config.chorus_on,
            limiter_on: config.limiter_on,
            reverb_preset: config.reverb_preset,
        }
    }
}

/// Identity of one raw performer within a loaded soundbank.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct PerformerId {
    bank: u64,
    instrument: usize,
    performer: usize,
}

#[derive(Debug)]
struct LoadedBank {
    id: u64,
    bank: Arc<Soundbank>,
}

/// State shared between the event surface and the audio stream.
pub struct SynthState {
    pub(crate) open: bool,
    /// Bumped on every open so a stream from an earlier session goes quiet.
    pub(crate) session: u64,
    pub(crate) pool: VoicePool,
    pub(crate) channels: Vec<Channel>,
    pub(crate) master: MasterControls,
    pub(crate) effects: EffectSettings,
    pub(crate) effects_changed: bool,
    soundbanks: Vec<LoadedBank>,
    next_bank: u64,
    /// Patch lookups. Cleared whenever the set of soundbanks changes.
    cache: HashMap<Patch, Option<ResolvedInstrument>>,
    /// Compiled performers, kept until their soundbank is unloaded.
    compiled: HashMap<PerformerId, Arc<CompiledPerformer>>,
    control_rate: f64,
}

impl SynthState {
    fn new(config: &SynthConfig) -> Self {
        Self {
            open: false,
            session: 0,
            pool: VoicePool::new(config.max_polyphony),
            channels: Vec::new(),
            master: MasterControls::default(),
            effects: EffectSettings::from_config(config),
            effects_changed: false,
            soundbanks: Vec::new(),
            next_bank: 0,
            cache: HashMap::new(),
            compiled: HashMap::new(),
            control_rate: config.control_rate(),
        }
    }

    /// Find and compile the instrument for `patch`. Later soundbanks win.
    fn resolve(&mut self, patch: Patch) -> Option<ResolvedInstrument> {
        if let Some(hit) = self.cache.get(&patch) {
            return hit.clone();
        }
        let Self { soundbanks, compiled, .. } = self;
        let resolved = soundbanks.iter().rev().find_map(|loaded| {
            let instrument = loaded.bank.find_instrument_index(patch)?;
            let inst = &loaded.bank.instruments[instrument];
            Some(ResolvedInstrument::resolve_with(inst, |performer, raw| {
                let id = PerformerId {
                    bank: loaded.id,
                    instrument,
                    performer,
                };
                let entry = compiled
                    .entry(id)
                    .or_insert_with(|| Arc::new(CompiledPerformer::compile(raw, &loaded.bank)));
                Arc::clone(entry)
            }))
        });
        if resolved.is_none() {
            debug!(bank = patch.bank, program = patch.program, "no instrument for patch");
        }
        self.cache.insert(patch, resolved.clone());
        resolved
    }

    fn program_change(&mut self, channel: usize, program: u8) {
        let Some(ch) = self.channels.get(channel) else {
            return;
        };
        let program = program.min(127);
        let patch = Patch {
            bank: ch.bank(),
            program,
            percussion: ch.is_percussion(),
        };
        let instrument = self.resolve(patch);
        if let Some(ch) = self.channels.get_mut(channel) {
            ch.set_instrument(program, instrument);
        }
    }

    /// Re-resolve every channel's current program.
    fn refresh_programs(&mut self) {
        for i in 0..self.channels.len() {
            let program = self.channels[i].program;
            self.program_change(i, program);
        }
    }
}

/// The synthesizer: owns the shared state and hands out streams.
pub struct Synthesizer {
    config: SynthConfig,
    state: Arc<Mutex<SynthState>>,
}

impl Synthesizer {
    pub fn new(config: SynthConfig) -> Result<Self> {
        config.validate()?;
        let state = Arc::new(Mutex::new(SynthState::new(&config)));
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &SynthConfig {
        &self.config
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    /// Open the synthesizer and return the stream that renders it.
    ///
    /// Channels start fresh with program 0 on every open. Soundbanks stay
    /// loaded across close and reopen.
    pub fn open(&self) -> Result<SynthStream> {
        let mut st = self.state.lock();
        if st.open {
            return Err(SynthError::AlreadyOpen);
        }
        st.open = true;
        st.session += 1;
        st.pool = VoicePool::new(self.config.max_polyphony);
        let rate = st.control_rate;
        st.channels = (0..CHANNELS as u8).map(|i| Channel::new(i, rate)).collect();
        st.master = MasterControls::default();
        st.effects = EffectSettings::from_config(&self.config);
        st.effects_changed = false;
        st.refresh_programs();
        let session = st.session;
        let voices = st.pool.len();
        drop(st);

        debug!(
            sample_rate = self.config.sample_rate,
            polyphony = voices,
            "synthesizer opened"
        );
        Ok(SynthStream::new(Arc::clone(&self.state), session, &self.config, voices))
    }

    /// Close the synthesizer. Any stream from this session returns no more data.
    pub fn close(&self) -> Result<()> {
        let mut st = self.state.lock();
        if !st.open {
            return Err(SynthError::NotOpen);
        }
        st.open = false;
        st.pool.clear();
        st.channels.clear();
        debug!("synthesizer closed");
        Ok(())
    }

    /// Add a soundbank. Its instruments take precedence over earlier banks.
    pub fn load_soundbank(&self, bank: Soundbank) -> Arc<Soundbank> {
        let bank = Arc::new(bank);
        let mut st = self.state.lock();
        debug!(
            soundbank = bank.name.as_str(),
            instruments = bank.instruments.len(),
            samples = bank.samples.len(),
            "soundbank loaded"
        );
        let id = st.next_bank;
        st.next_bank += 1;
        st.soundbanks.push(LoadedBank {
            id,
            bank: Arc::clone(&bank),
        });
        st.cache.clear();
        st.refresh_programs();
        bank
    }

    pub fn unload_soundbanks(&self) {
        let mut st = self.state.lock();
        st.soundbanks.clear();
        st.cache.clear();
        st.compiled.clear();
        st.refresh_programs();
    }

    /// Handle for channel `index` (0..16). Out-of-range indices wrap.
    pub fn channel(&self, index: u8) -> ChannelHandle<'_> {
        ChannelHandle {
            synth: self,
            index: index as usize % CHANNELS,
        }
    }

    /// Master volume, 0..=16383.
    pub fn set_master_volume(&self, volume: u16) {
        self.state.lock().master.volume = volume.min(16383);
    }

    /// Master balance, 0..=16383 with 8192 centred.
    pub fn set_master_balance(&self, balance: u16) {
        self.state.lock().master.balance = balance.min(16383);
    }

    /// Master fine tuning in cents, clamped to ±100.
    pub fn set_master_fine_tuning(&self, cents: f64) {
        self.state.lock().master.fine_tuning = cents.clamp(-100.0, 100.0);
    }

    /// Master coarse tuning in semitones, clamped to -64..=63.
    pub fn set_master_coarse_tuning(&self, semitones: i8) {
        self.state.lock().master.coarse_tuning = semitones.clamp(-64, 63);
    }

    pub fn master(&self) -> MasterControls {
        self.state.lock().master.clone()
    }

    pub fn set_reverb_preset(&self, preset: ReverbPreset) {
        self.update_effects(|e| e.reverb_preset = preset);
    }

    pub fn set_reverb(&self, on: bool) {
        self.update_effects(|e| e.reverb_on = on);
    }

    pub fn set_chorus(&self, on: bool) {
        self.update_effects(|e| e.chorus_on = on);
    }

    pub fn set_limiter(&self, on: bool) {
        self.update_effects(|e| e.limiter_on = on);
    }

    fn update_effects(&self, f: impl FnOnce(&mut EffectSettings)) {
        let mut st = self.state.lock();
        let before = st.effects;
        f(&mut st.effects);
        if st.effects != before {
            st.effects_changed = true;
        }
    }

    /// One entry per pool slot.
    pub fn voice_status(&self) -> Vec<VoiceStatus> {
        self.state.lock().pool.status()
    }

    pub fn active_voice_count(&self) -> usize {
        self.state.lock().pool.active_count()
    }

    /// Run `f` on an open channel with the pool and master controls.
    fn with_channel<R>(
        &self,
        index: usize,
        f: impl FnOnce(&mut Channel, &mut VoicePool, &MasterControls) -> R,
    ) -> Option<R> {
        let mut st = self.state.lock();
        if !st.open {
            return None;
        }
        let SynthState {
            channels, pool, master, ..
        } = &mut *st;
        let ch = channels.get_mut(index)?;
        Some(f(ch, pool, master))
    }
}

impl Drop for Synthesizer {
    fn drop(&mut self) {
        let mut st = self.state.lock();
        if st.open {
            warn!("synthesizer dropped while open");
            st.open = false;
        }
    }
}

/// Event surface of one channel. Calls on a closed synthesizer are ignored.
pub struct ChannelHandle<'a> {
    synth: &'a Synthesizer,
    index: usize,
}

impl ChannelHandle<'_> {
    pub fn index(&self) -> u8 {
        self.index as u8
    }

    pub fn note_on(&self, note: u8, velocity: u8) {
        self.synth
            .with_channel(self.index, |ch, pool, master| ch.note_on(pool, master, note, velocity));
    }

    /// Note-on that starts `frames` into the next block (0..300).
    pub fn note_on_delayed(&self, note: u8, velocity: u8, frames: usize) {
        self.synth.with_channel(self.index, |ch, pool, master| {
            ch.note_on_delayed(pool, master, note, velocity, frames)
        });
    }

    pub fn note_off(&self, note: u8, velocity: u8) {
        self.synth
            .with_channel(self.index, |ch, pool, master| ch.note_off(pool, master, note, velocity));
    }

    pub fn control_change(&self, ctrl: u8, value: u8) {
        self.synth.with_channel(self.index, |ch, pool, master| {
            ch.control_change(pool, master, ctrl, value)
        });
    }

    pub fn controller(&self, ctrl: u8) -> u8 {
        self.synth
            .with_channel(self.index, |ch, _, _| ch.controls.cc[ctrl as usize & 127])
            .unwrap_or(0)
    }

    /// Select an instrument by program using the current CC0/CC32 bank.
    pub fn program_change(&self, program: u8) {
        let mut st = self.synth.state.lock();
        if st.open {
            st.program_change(self.index, program);
        }
    }

    /// Set bank select and program together.
    pub fn bank_program_change(&self, bank: u16, program: u8) {
        let mut st = self.synth.state.lock();
        if !st.open {
            return;
        }
        if let Some(ch) = st.channels.get_mut(self.index) {
            let bank = bank.min(16383);
            ch.controls.cc[0] = (bank >> 7) as u8;
            ch.controls.cc[32] = (bank & 127) as u8;
        }
        st.program_change(self.index, program);
    }

    pub fn program(&self) -> u8 {
        self.synth
            .with_channel(self.index, |ch, _, _| ch.program)
            .unwrap_or(0)
    }

    /// Patch of the resolved instrument, if the program found one.
    pub fn instrument_patch(&self) -> Option<Patch> {
        self.synth
            .with_channel(self.index, |ch, _, _| ch.instrument.as_ref().map(|i| i.patch))
            .flatten()
    }

    pub fn set_pitch_bend(&self, value: u16) {
        self.synth
            .with_channel(self.index, |ch, pool, master| ch.set_pitch_bend(pool, master, value));
    }

    pub fn pitch_bend(&self) -> u16 {
        self.synth
            .with_channel(self.index, |ch, _, _| ch.controls.pitch_bend)
            .unwrap_or(8192)
    }

    pub fn set_channel_pressure(&self, value: u8) {
        self.synth.with_channel(self.index, |ch, pool, master| {
            ch.set_channel_pressure(pool, master, value)
        });
    }

    pub fn set_poly_pressure(&self, note: u8, value: u8) {
        self.synth.with_channel(self.index, |ch, pool, master| {
            ch.set_poly_pressure(pool, master, note, value)
        });
    }

    pub fn set_rpn(&self, param: u16, value: u16) {
        self.synth
            .with_channel(self.index, |ch, pool, master| ch.set_rpn(pool, master, param, value));
    }

    pub fn set_nrpn(&self, param: u16, value: u16) {
        self.synth
            .with_channel(self.index, |ch, pool, master| ch.set_nrpn(pool, master, param, value));
    }

    pub fn set_key_controller(&self, note: u8, ctrl: u8, value: u8) {
        self.synth.with_channel(self.index, |ch, pool, master| {
            ch.set_key_controller(pool, master, note, ctrl, value)
        });
    }

    pub fn clear_key_controllers(&self, note: u8) {
        self.synth.with_channel(self.index, |ch, pool, master| {
            ch.clear_key_controllers(pool, master, note)
        });
    }

    pub fn all_notes_off(&self) {
        self.synth
            .with_channel(self.index, |ch, pool, _| ch.all_notes_off(pool));
    }

    pub fn all_sound_off(&self) {
        self.synth
            .with_channel(self.index, |ch, pool, _| ch.all_sound_off(pool));
    }

    pub fn reset_all_controllers(&self, full: bool) {
        self.synth.with_channel(self.index, |ch, pool, master| {
            ch.reset_all_controllers(pool, master, full)
        });
    }

    pub fn set_mono(&self, mono: bool) {
        self.synth
            .with_channel(self.index, |ch, pool, _| ch.set_mono(pool, mono));
    }

    pub fn set_omni(&self, omni: bool) {
        self.synth
            .with_channel(self.index, |ch, pool, _| ch.set_omni(pool, omni));
    }

    pub fn set_mute(&self, mute: bool) {
        self.synth.with_channel(self.index, |ch, _, _| ch.mute = mute);
    }

    pub fn set_solo(&self, solo: bool) {
        self.synth.with_channel(self.index, |ch, _, _| ch.solo = solo);
    }
}
