//! MIDI channel state machine.
//!
//! A channel owns its controller state and mode flags. Notes live in the
//! voice pool; every handler here takes the pool explicitly and runs under
//! the synthesizer lock.

use std::sync::Arc;

use tracing::trace;
use ws_model::CONTROL_BLOCK;

use crate::controls::{default_controller, ChannelControls, MasterControls, SourceContext};
use crate::performer::{CompiledPerformer, MidiScalar, ResolvedInstrument};
use crate::units::portamento_rate;
use crate::voice::{Bucket, NoteRequest, Voice};
use crate::voice_pool::VoicePool;

/// Parameter selection byte meaning "none".
const NULL_SELECT: u8 = 127;

/// Which parameter table data entry writes to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ParamSelect {
    #[default]
    None,
    Rpn(u16),
    Nrpn(u16),
}

/// Controllers a reset leaves alone.
fn reset_exempt(cc: u8) -> bool {
    matches!(cc, 0 | 32 | 7 | 10 | 11 | 39 | 42 | 43 | 91..=95 | 70..=79 | 120..=127 | 6 | 38 | 98..=101)
}

/// Persistent state of one MIDI channel.
#[derive(Clone, Debug)]
pub struct Channel {
    pub index: u8,
    pub controls: ChannelControls,
    pub instrument: Option<ResolvedInstrument>,
    pub program: u8,
    pub mono: bool,
    /// Accepted but not enforced.
    pub omni: bool,
    pub mute: bool,
    pub solo: bool,
    sustain: bool,
    sostenuto: bool,
    portamento: bool,
    /// CC84 source key for the next note.
    portamento_control: Option<u8>,
    last_note: Option<u8>,
    /// Note-on velocity per key, for release-triggered performers.
    note_velocity: [u8; 128],
    select: ParamSelect,
    rpn_msb: u8,
    rpn_lsb: u8,
    nrpn_msb: u8,
    nrpn_lsb: u8,
    control_rate: f64,
}

impl Channel {
    pub fn new(index: u8, control_rate: f64) -> Self {
        Self {
            index,
            controls: ChannelControls::default(),
            instrument: None,
            program: 0,
            mono: false,
            omni: true,
            mute: false,
            solo: false,
            sustain: false,
            sostenuto: false,
            portamento: false,
            portamento_control: None,
            last_note: None,
            note_velocity: [0; 128],
            select: ParamSelect::None,
            rpn_msb: NULL_SELECT,
            rpn_lsb: NULL_SELECT,
            nrpn_msb: NULL_SELECT,
            nrpn_lsb: NULL_SELECT,
            control_rate,
        }
    }

    /// Bank number from CC0/CC32.
    pub fn bank(&self) -> u16 {
        (self.controls.cc[0] as u16) << 7 | self.controls.cc[32] as u16
    }

    pub fn is_percussion(&self) -> bool {
        self.index == 9
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    pub fn sostenuto(&self) -> bool {
        self.sostenuto
    }

    pub fn portamento(&self) -> bool {
        self.portamento
    }

    pub fn param_select(&self) -> ParamSelect {
        self.select
    }

    pub fn context<'a>(&'a self, master: &'a MasterControls) -> SourceContext<'a> {
        SourceContext {
            controls: &self.controls,
            master,
        }
    }

    fn voices<'p>(&self, pool: &'p mut VoicePool) -> impl Iterator<Item = &'p mut Voice> {
        let index = self.index;
        pool.voices_mut().iter_mut().filter(move |v| v.active && v.channel == index)
    }

    fn update_voices(&self, pool: &mut VoicePool, master: &MasterControls, note: Option<u8>, bucket: Bucket) {
        let ctx = self.context(master);
        for v in self.voices(pool) {
            if note.map_or(true, |n| v.note == n) {
                v.update(bucket, &ctx);
            }
        }
    }

    fn portamento_rate(&self) -> f64 {
        portamento_rate(self.controls.cc[5], self.control_rate)
    }

    pub fn note_on(&mut self, pool: &mut VoicePool, master: &MasterControls, note: u8, velocity: u8) {
        self.note_on_delayed(pool, master, note, velocity, 0);
    }

    /// Note-on starting `delay` frames into the next block.
    pub fn note_on_delayed(
        &mut self,
        pool: &mut VoicePool,
        master: &MasterControls,
        note: u8,
        velocity: u8,
        delay: usize,
    ) {
        let (note, velocity) = (note.min(127), velocity.min(127));
        if velocity == 0 {
            self.note_off(pool, master, note, 0);
            return;
        }
        self.note_velocity[note as usize] = velocity;

        if self.mono && self.portamento {
            let rate = self.portamento_rate();
            let ctx = self.context(master);
            let mut retuned = false;
            for v in self.voices(pool).filter(|v| v.on && !v.release_triggered) {
                v.retune(note, rate, &ctx);
                retuned = true;
            }
            if retuned {
                self.last_note = Some(note);
                return;
            }
        }
        if self.mono {
            self.release_all(pool);
        }

        let glide_from = match self.portamento_control.take() {
            Some(from) => Some(from),
            None if self.portamento => self.last_note,
            None => None,
        }
        .filter(|&from| from != note)
        .map(f64::from);
        self.last_note = Some(note);

        let Some(instrument) = self.instrument.as_ref() else {
            trace!(channel = self.index, note, "note-on without instrument");
            return;
        };
        let request = |pool: &mut VoicePool, perf: &Arc<CompiledPerformer>, group| NoteRequest {
            id: pool.next_id(),
            group,
            channel: self.index,
            note,
            velocity,
            performer: Arc::clone(perf),
            delay: delay.min(CONTROL_BLOCK - 1),
            glide_from,
            glide_rate: self.portamento_rate(),
        };

        pool.begin_note();
        let group = pool.next_group();
        let ctx = self.context(master);
        let mut first = true;
        for &ix in instrument.director.lookup(note, velocity) {
            let perf = &instrument.performers[ix];
            if perf.release_triggered {
                continue;
            }
            if first {
                first = false;
                if perf.exclusive_class != 0 {
                    self.exclusive_shutoff(pool, perf, note);
                }
            }
            let req = request(pool, perf, group);
            pool.request(req, &ctx);
        }
    }

    fn exclusive_shutoff(&self, pool: &mut VoicePool, perf: &CompiledPerformer, note: u8) {
        for v in self.voices(pool) {
            if v.exclusive_class() != perf.exclusive_class || v.release_triggered {
                continue;
            }
            if perf.self_non_exclusive && v.note == note {
                continue;
            }
            v.sound_off();
        }
    }

    pub fn note_off(&mut self, pool: &mut VoicePool, master: &MasterControls, note: u8, _velocity: u8) {
        let note = note.min(127);
        pool.cancel_pending(self.index, note);
        let sustain = self.sustain;
        for v in self.voices(pool).filter(|v| v.on && v.note == note && !v.release_triggered) {
            if sustain || v.sostenuto {
                v.held_off = true;
            } else {
                v.release();
            }
        }

        let velocity = std::mem::take(&mut self.note_velocity[note as usize]);
        if velocity == 0 {
            return;
        }
        let Some(instrument) = self.instrument.as_ref() else { return };
        let ctx = self.context(master);
        pool.begin_note();
        let group = pool.next_group();
        for &ix in instrument.director.lookup(note, velocity) {
            let perf = &instrument.performers[ix];
            if !perf.release_triggered {
                continue;
            }
            let req = NoteRequest {
                id: pool.next_id(),
                group,
                channel: self.index,
                note,
                velocity,
                performer: Arc::clone(perf),
                delay: 0,
                glide_from: None,
                glide_rate: 0.0,
            };
            pool.request(req, &ctx);
        }
    }

    /// Release every sounding note regardless of pedals.
    fn release_all(&self, pool: &mut VoicePool) {
        for v in self.voices(pool).filter(|v| v.on && !v.release_triggered) {
            v.release();
        }
    }

    pub fn all_notes_off(&mut self, pool: &mut VoicePool) {
        self.release_all(pool);
    }

    pub fn all_sound_off(&mut self, pool: &mut VoicePool) {
        pool.cancel_channel(self.index);
        for v in self.voices(pool) {
            v.sound_off();
        }
    }

    fn set_sustain(&mut self, pool: &mut VoicePool, down: bool) {
        let was = std::mem::replace(&mut self.sustain, down);
        if was && !down {
            for v in self.voices(pool).filter(|v| v.held_off && !v.sostenuto) {
                v.release();
            }
        }
    }

    fn set_sostenuto(&mut self, pool: &mut VoicePool, down: bool) {
        let was = std::mem::replace(&mut self.sostenuto, down);
        let sustain = self.sustain;
        if !was && down {
            for v in self.voices(pool).filter(|v| v.on) {
                v.sostenuto = true;
            }
        } else if was && !down {
            for v in self.voices(pool).filter(|v| v.sostenuto) {
                v.sostenuto = false;
                if v.held_off && !sustain {
                    v.release();
                }
            }
        }
    }

    pub fn control_change(&mut self, pool: &mut VoicePool, master: &MasterControls, ctrl: u8, value: u8) {
        let (ctrl, value) = (ctrl.min(127), value.min(127));
        match ctrl {
            120 => return self.all_sound_off(pool),
            121 => return self.reset_all_controllers(pool, master, false),
            123 => return self.all_notes_off(pool),
            124 | 125 => return self.set_omni(pool, ctrl == 125),
            126 | 127 => return self.set_mono(pool, ctrl == 126),
            _ => {}
        }

        self.controls.cc[ctrl as usize] = value;
        if ctrl < 32 {
            self.controls.cc[ctrl as usize + 32] = 0;
        }

        match ctrl {
            6 => self.data_entry(pool, master, |old| (value as u16) << 7 | (old & 0x7f)),
            38 => self.data_entry(pool, master, |old| (old & !0x7f) | value as u16),
            96 => self.data_entry(pool, master, |old| (old + 1).min(16383)),
            97 => self.data_entry(pool, master, |old| old.saturating_sub(1)),
            98 => self.select_param(true, None, Some(value)),
            99 => self.select_param(true, Some(value), None),
            100 => self.select_param(false, None, Some(value)),
            101 => self.select_param(false, Some(value), None),
            64 => self.set_sustain(pool, value >= 64),
            65 => self.portamento = value >= 64,
            66 => self.set_sostenuto(pool, value >= 64),
            84 => self.portamento_control = Some(value),
            _ => {}
        }

        self.update_voices(pool, master, None, Bucket::Cc(ctrl));
        match ctrl {
            0..=31 => self.update_voices(pool, master, None, Bucket::Cc(ctrl + 32)),
            32..=63 => self.update_voices(pool, master, None, Bucket::Cc(ctrl - 32)),
            _ => {}
        }
    }

    fn select_param(&mut self, nrpn: bool, msb: Option<u8>, lsb: Option<u8>) {
        let (m, l) = if nrpn {
            (&mut self.nrpn_msb, &mut self.nrpn_lsb)
        } else {
            (&mut self.rpn_msb, &mut self.rpn_lsb)
        };
        if let Some(msb) = msb {
            *m = msb;
        }
        if let Some(lsb) = lsb {
            *l = lsb;
        }
        let (msb, lsb) = (*m, *l);
        self.select = if msb == NULL_SELECT && lsb == NULL_SELECT {
            ParamSelect::None
        } else {
            let param = (msb as u16) << 7 | lsb as u16;
            if nrpn {
                ParamSelect::Nrpn(param)
            } else {
                ParamSelect::Rpn(param)
            }
        };
    }

    fn data_entry(&mut self, pool: &mut VoicePool, master: &MasterControls, f: impl Fn(u16) -> u16) {
        let (nrpn, param) = match self.select {
            ParamSelect::None => return,
            ParamSelect::Rpn(p) => (false, p),
            ParamSelect::Nrpn(p) => (true, p),
        };
        let old = self.controls.param_raw(nrpn, param);
        self.controls.set_param(nrpn, param, f(old));
        let bucket = if nrpn { Bucket::Nrpn(param) } else { Bucket::Rpn(param) };
        self.update_voices(pool, master, None, bucket);
    }

    /// Write a registered parameter directly.
    pub fn set_rpn(&mut self, pool: &mut VoicePool, master: &MasterControls, param: u16, value: u16) {
        let param = param.min(16383);
        self.controls.set_param(false, param, value);
        self.update_voices(pool, master, None, Bucket::Rpn(param));
    }

    /// Write a non-registered parameter directly.
    pub fn set_nrpn(&mut self, pool: &mut VoicePool, master: &MasterControls, param: u16, value: u16) {
        let param = param.min(16383);
        self.controls.set_param(true, param, value);
        self.update_voices(pool, master, None, Bucket::Nrpn(param));
    }

    pub fn set_pitch_bend(&mut self, pool: &mut VoicePool, master: &MasterControls, value: u16) {
        self.controls.pitch_bend = value.min(16383);
        self.update_voices(pool, master, None, Bucket::Midi(MidiScalar::PitchBend));
    }

    pub fn set_channel_pressure(&mut self, pool: &mut VoicePool, master: &MasterControls, value: u8) {
        self.controls.channel_pressure = value.min(127);
        self.update_voices(pool, master, None, Bucket::Midi(MidiScalar::ChannelPressure));
    }

    pub fn set_poly_pressure(&mut self, pool: &mut VoicePool, master: &MasterControls, note: u8, value: u8) {
        let note = note.min(127);
        self.controls.poly_pressure[note as usize] = value.min(127);
        self.update_voices(pool, master, Some(note), Bucket::Midi(MidiScalar::PolyPressure));
    }

    pub fn set_key_controller(&mut self, pool: &mut VoicePool, master: &MasterControls, note: u8, ctrl: u8, value: u8) {
        let (note, ctrl) = (note.min(127), ctrl.min(127));
        self.controls.set_key_controller(note, ctrl, value);
        self.update_voices(pool, master, Some(note), Bucket::Cc(ctrl));
        if (32..64).contains(&ctrl) {
            self.update_voices(pool, master, Some(note), Bucket::Cc(ctrl - 32));
        }
    }

    pub fn clear_key_controllers(&mut self, pool: &mut VoicePool, master: &MasterControls, note: u8) {
        let note = note.min(127);
        self.controls.clear_key_controllers(note);
        let ctx = self.context(master);
        for v in self.voices(pool).filter(|v| v.note == note) {
            v.refresh_controllers(&ctx);
        }
    }

    pub fn set_mono(&mut self, pool: &mut VoicePool, mono: bool) {
        self.all_notes_off(pool);
        self.mono = mono;
    }

    pub fn set_omni(&mut self, pool: &mut VoicePool, omni: bool) {
        self.all_notes_off(pool);
        self.omni = omni;
    }

    /// Install a resolved instrument for the current program.
    pub fn set_instrument(&mut self, program: u8, instrument: Option<ResolvedInstrument>) {
        self.program = program.min(127);
        self.instrument = instrument;
    }

    pub fn reset_all_controllers(&mut self, pool: &mut VoicePool, master: &MasterControls, full: bool) {
        for cc in 0..128u8 {
            if reset_exempt(cc) || matches!(cc, 64 | 66) {
                continue;
            }
            self.controls.cc[cc as usize] = default_controller(cc);
        }
        self.controls.cc[64] = 0;
        self.controls.cc[66] = 0;
        self.set_sustain(pool, false);
        self.set_sostenuto(pool, false);
        self.portamento = false;
        self.portamento_control = None;

        for cc in 98..=101 {
            self.controls.cc[cc] = NULL_SELECT;
        }
        self.rpn_msb = NULL_SELECT;
        self.rpn_lsb = NULL_SELECT;
        self.nrpn_msb = NULL_SELECT;
        self.nrpn_lsb = NULL_SELECT;
        self.select = ParamSelect::None;

        self.controls.pitch_bend = 8192;
        self.controls.channel_pressure = 0;
        self.controls.poly_pressure = [0; 128];

        if full {
            self.controls.key_controllers = None;
            self.controls.rpn.clear();
            self.controls.nrpn.clear();
        }

        let ctx = self.context(master);
        for v in self.voices(pool) {
            v.refresh_controllers(&ctx);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ws_model::{ConnectionBlock, Destination, Instrument, Oscillator, Patch, Performer, Sample, Soundbank};

    use crate::performer::slot;

    const RATE: f64 = 44100.0 / 300.0;

    struct Rig {
        pool: VoicePool,
        master: MasterControls,
        ch: Channel,
    }

    fn instrument(performers: Vec<Performer>) -> ResolvedInstrument {
        let mut bank = Soundbank::new("t");
        let key = bank.add_sample(Sample::new("s"));
        let mut inst = Instrument::new("i", Patch::new(0, 0));
        for mut p in performers {
            p.oscillators.push(Oscillator::new(key, 60));
            inst.performers.push(p);
        }
        ResolvedInstrument::resolve(&inst, &bank)
    }

    fn rig_with(performers: Vec<Performer>) -> Rig {
        let mut ch = Channel::new(0, RATE);
        ch.set_instrument(0, Some(instrument(performers)));
        Rig {
            pool: VoicePool::new(64),
            master: MasterControls::default(),
            ch,
        }
    }

    fn rig() -> Rig {
        rig_with(vec![Performer::default()])
    }

    impl Rig {
        fn on(&mut self, note: u8, vel: u8) {
            self.ch.note_on(&mut self.pool, &self.master, note, vel);
        }

        fn off(&mut self, note: u8) {
            self.ch.note_off(&mut self.pool, &self.master, note, 0);
        }

        fn cc(&mut self, ctrl: u8, value: u8) {
            self.ch.control_change(&mut self.pool, &self.master, ctrl, value);
        }

        fn sounding(&self) -> Vec<&Voice> {
            self.pool.voices().iter().filter(|v| v.active).collect()
        }
    }

    #[test]
    fn note_on_starts_one_voice_per_performer() {
        let mut r = rig_with(vec![Performer::default(), Performer::default().keys(0, 59)]);
        r.on(60, 100);
        assert_eq!(r.sounding().len(), 1);
        r.on(40, 100);
        assert_eq!(r.sounding().len(), 3);
    }

    #[test]
    fn zero_velocity_is_note_off() {
        let mut r = rig();
        r.on(60, 100);
        r.on(60, 0);
        assert!(!r.sounding()[0].on);
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let mut r = rig();
        r.on(200, 200);
        let v = r.sounding()[0];
        assert_eq!((v.note, v.velocity), (127, 127));
    }

    #[test]
    fn sustain_holds_note_until_pedal_up() {
        let mut r = rig();
        r.on(60, 100);
        r.cc(64, 127);
        r.off(60);
        let v = r.sounding()[0];
        assert!(v.on && v.held_off);

        r.cc(64, 0);
        let v = r.sounding()[0];
        assert!(!v.on && !v.held_off);
        assert_eq!(v.envelope(0).phase(), crate::generators::EnvelopePhase::Release);

        // A second pedal-up must not release again.
        r.cc(64, 127);
        r.cc(64, 0);
        assert_eq!(r.sounding()[0].envelope(0).phase(), crate::generators::EnvelopePhase::Release);
    }

    #[test]
    fn sostenuto_captures_only_sounding_notes() {
        let mut r = rig();
        r.on(60, 100);
        r.cc(66, 127);
        r.on(64, 100);
        r.off(60);
        r.off(64);
        let on: Vec<u8> = r.sounding().iter().filter(|v| v.on).map(|v| v.note).collect();
        assert_eq!(on, vec![60]);
        r.cc(66, 0);
        assert!(r.sounding().iter().all(|v| !v.on));
    }

    #[test]
    fn rpn_pitch_bend_range_round_trip() {
        let mut r = rig();
        r.on(60, 100);
        let base = r.sounding()[0].destination(slot::PITCH);

        r.cc(101, 0);
        r.cc(100, 0);
        assert_eq!(r.ch.param_select(), ParamSelect::Rpn(0));
        r.cc(6, 2);
        r.cc(38, 0);
        assert_eq!(r.ch.controls.rpn_raw(0), 2 << 7);

        r.ch.set_pitch_bend(&mut r.pool, &r.master, 16383);
        let pitch = r.sounding()[0].destination(slot::PITCH);
        assert_abs_diff_eq!(pitch - base, 200.0, epsilon = 1e-9);
    }

    #[test]
    fn rpn_range_change_applies_to_sounding_voice() {
        let mut r = rig();
        r.on(60, 100);
        let base = r.sounding()[0].destination(slot::PITCH);
        r.ch.set_pitch_bend(&mut r.pool, &r.master, 16383);
        r.cc(101, 0);
        r.cc(100, 0);
        r.cc(6, 12);
        let pitch = r.sounding()[0].destination(slot::PITCH);
        assert_abs_diff_eq!(pitch - base, 1200.0, epsilon = 1e-9);
    }

    #[test]
    fn null_selection_ignores_data_entry() {
        let mut r = rig();
        r.cc(101, 0);
        r.cc(100, 0);
        r.cc(101, 127);
        r.cc(100, 127);
        assert_eq!(r.ch.param_select(), ParamSelect::None);
        r.cc(6, 24);
        assert_eq!(r.ch.controls.rpn_raw(0), 2 << 7);
    }

    #[test]
    fn increment_and_decrement_clamp() {
        let mut r = rig();
        r.cc(99, 1);
        r.cc(98, 2);
        assert_eq!(r.ch.param_select(), ParamSelect::Nrpn(130));
        r.cc(97, 0);
        assert_eq!(r.ch.controls.nrpn_raw(130), 0);
        r.cc(96, 0);
        r.cc(96, 0);
        assert_eq!(r.ch.controls.nrpn_raw(130), 2);
    }

    #[test]
    fn data_entry_keeps_every_parameter() {
        let mut r = rig();
        for p in 0..40u8 {
            r.cc(99, 1);
            r.cc(98, p);
            r.cc(6, 100);
        }
        for p in 0..40u16 {
            assert_eq!(r.ch.controls.nrpn_raw((1 << 7) | p), 100 << 7, "nrpn {p}");
        }
        for p in 0..40u8 {
            r.cc(101, 0);
            r.cc(100, p + 10);
            r.cc(6, 3);
        }
        assert_eq!(r.ch.controls.rpn.len(), 40);
        assert_eq!(r.ch.controls.rpn_raw(49), 3 << 7);
    }

    #[test]
    fn msb_write_zeroes_lsb() {
        let mut r = rig();
        r.cc(33, 50);
        r.cc(1, 10);
        assert_eq!(r.ch.controls.cc[33], 0);
        assert_eq!(r.ch.controls.cc[1], 10);
    }

    #[test]
    fn bank_select_combines_msb_lsb() {
        let mut r = rig();
        r.cc(0, 1);
        r.cc(32, 3);
        assert_eq!(r.ch.bank(), 131);
    }

    #[test]
    fn volume_controller_updates_gain() {
        let mut r = rig();
        r.on(60, 127);
        let before = r.sounding()[0].destination(slot::GAIN);
        r.cc(7, 127);
        assert!(r.sounding()[0].destination(slot::GAIN) > before);
    }

    #[test]
    fn reset_keeps_volume_and_clears_modulation() {
        let mut r = rig();
        r.cc(7, 30);
        r.cc(1, 90);
        r.cc(64, 127);
        r.ch.set_pitch_bend(&mut r.pool, &r.master, 0);
        r.cc(121, 0);
        assert_eq!(r.ch.controls.cc[7], 30);
        assert_eq!(r.ch.controls.cc[1], 0);
        assert!(!r.ch.sustain());
        assert_eq!(r.ch.controls.pitch_bend, 8192);
    }

    #[test]
    fn full_reset_restores_rpn_defaults() {
        let mut r = rig();
        r.ch.set_rpn(&mut r.pool, &r.master, 0, 12 << 7);
        r.ch.set_key_controller(&mut r.pool, &r.master, 60, 7, 10);
        r.ch.reset_all_controllers(&mut r.pool, &r.master, false);
        assert_eq!(r.ch.controls.rpn_raw(0), 12 << 7);
        r.ch.reset_all_controllers(&mut r.pool, &r.master, true);
        assert_eq!(r.ch.controls.rpn_raw(0), 2 << 7);
        assert!(r.ch.controls.key_controllers.is_none());
    }

    #[test]
    fn all_notes_off_releases_sustained_notes() {
        let mut r = rig();
        r.on(60, 100);
        r.cc(64, 127);
        r.off(60);
        r.cc(123, 0);
        assert!(!r.sounding()[0].on);
    }

    #[test]
    fn all_sound_off_shuts_down() {
        let mut r = rig();
        r.on(60, 100);
        r.on(64, 100);
        r.cc(120, 0);
        assert!(r.sounding().iter().all(|v| v.stopping));
    }

    #[test]
    fn mono_mode_releases_previous_note() {
        let mut r = rig();
        r.cc(126, 0);
        r.on(60, 100);
        r.on(64, 100);
        let on: Vec<u8> = r.sounding().iter().filter(|v| v.on).map(|v| v.note).collect();
        assert_eq!(on, vec![64]);
    }

    #[test]
    fn mono_portamento_retunes_in_place() {
        let mut r = rig();
        r.cc(126, 0);
        r.cc(65, 127);
        r.on(60, 100);
        r.on(67, 100);
        let v = r.sounding();
        assert_eq!(v.len(), 1);
        assert_eq!(v[0].note, 67);
        assert!(v[0].is_gliding());
    }

    #[test]
    fn poly_portamento_glides_from_last_note() {
        let mut r = rig();
        r.cc(65, 127);
        r.on(60, 100);
        r.on(64, 100);
        let v: Vec<&Voice> = r.sounding();
        assert!(!v[0].is_gliding());
        assert!(v[1].is_gliding());
        assert_abs_diff_eq!(v[1].key(), 60.0);
    }

    #[test]
    fn portamento_control_sets_glide_source_once() {
        let mut r = rig();
        r.cc(84, 48);
        r.on(60, 100);
        r.on(62, 100);
        let v = r.sounding();
        assert_abs_diff_eq!(v[0].key(), 48.0);
        assert!(!v[1].is_gliding());
    }

    #[test]
    fn exclusive_class_silences_same_class() {
        let hat = Performer {
            exclusive_class: 1,
            ..Default::default()
        };
        let mut r = rig_with(vec![hat.clone().keys(42, 42), hat.keys(46, 46)]);
        r.on(46, 100);
        r.on(42, 100);
        let v = r.sounding();
        assert!(v[0].stopping);
        assert!(!v[1].stopping);
    }

    #[test]
    fn self_non_exclusive_keeps_same_note() {
        let p = Performer {
            exclusive_class: 2,
            self_non_exclusive: true,
            ..Default::default()
        };
        let mut r = rig_with(vec![p]);
        r.on(50, 100);
        r.on(50, 100);
        let v = r.sounding();
        assert!(!v[0].stopping && !v[1].stopping);
        r.on(51, 100);
        let v = r.sounding();
        assert!(v[0].stopping && v[1].stopping);
        assert!(!v[2].stopping);
    }

    #[test]
    fn release_triggered_performer_sounds_on_note_off() {
        let release = Performer {
            release_triggered: true,
            ..Default::default()
        };
        let mut r = rig_with(vec![Performer::default(), release]);
        r.on(60, 90);
        assert_eq!(r.sounding().len(), 1);
        r.off(60);
        let v = r.sounding();
        assert_eq!(v.len(), 2);
        assert!(v[1].release_triggered && v[1].on);
        assert_eq!(v[1].velocity, 90);
        // Another note-off does not touch it or retrigger.
        r.off(60);
        assert_eq!(r.sounding().len(), 2);
        assert!(r.sounding()[1].on);
    }

    #[test]
    fn poly_pressure_targets_one_note() {
        let block = ConnectionBlock::new(
            ws_model::ModelSource::new(ws_model::Source::PolyPressure),
            1000.0,
            Destination::FilterQ,
        );
        let mut r = rig_with(vec![Performer::default().connection(block)]);
        r.on(60, 100);
        r.on(62, 100);
        r.ch.set_poly_pressure(&mut r.pool, &r.master, 62, 64);
        let v = r.sounding();
        assert_eq!(v[0].destination(slot::FILTER_Q), 0.0);
        assert_abs_diff_eq!(v[1].destination(slot::FILTER_Q), 500.0);
    }

    #[test]
    fn key_controller_changes_one_voice() {
        let mut r = rig();
        r.on(60, 100);
        r.on(62, 100);
        let before = r.sounding()[1].destination(slot::PAN);
        r.ch.set_key_controller(&mut r.pool, &r.master, 62, 10, 0);
        let v = r.sounding();
        assert_abs_diff_eq!(v[0].destination(slot::PAN), before);
        assert_abs_diff_eq!(v[1].destination(slot::PAN), 0.0);
        r.ch.clear_key_controllers(&mut r.pool, &r.master, 62);
        assert_abs_diff_eq!(r.sounding()[1].destination(slot::PAN), before);
    }

    #[test]
    fn note_off_cancels_pending_steal() {
        let mut r = rig();
        r.pool = VoicePool::new(1);
        r.on(60, 100);
        r.on(62, 100);
        assert!(r.pool.voices()[0].pending.is_some());
        r.off(62);
        assert!(r.pool.voices()[0].pending.is_none());
    }

    #[test]
    fn no_instrument_is_silent() {
        let mut r = rig();
        r.ch.set_instrument(0, None);
        r.on(60, 100);
        assert!(r.sounding().is_empty());
    }
}
