//! Voice: control-rate state of one sounding performer instance.
//!
//! The voice owns the modulation accumulators and the envelope/LFO state.
//! Audio-rate state (oscillator cursors, filter memory) lives in the
//! mixer's `VoiceRenderer`, which copies what it needs from the voice at
//! the end of each control pass.

use std::sync::Arc;

use ws_model::Source;

use crate::controls::SourceContext;
use crate::generators::{Envelope, EnvelopeParams, Lfo};
use crate::performer::{slot, CompiledPerformer, MidiScalar, DEST_COUNT, MAX_CONNECTIONS};

/// A portamento glide in progress.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Glide {
    /// Target key.
    pub target: f64,
    /// Semitones per control cycle.
    pub rate: f64,
}

/// A note request bound to one performer, either started at once or
/// parked on a voice being stolen.
#[derive(Clone, Debug)]
pub struct NoteRequest {
    pub id: u64,
    pub group: u64,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub performer: Arc<CompiledPerformer>,
    /// Start offset into the block, in frames.
    pub delay: usize,
    /// Glide from this key to `note`.
    pub glide_from: Option<f64>,
    pub glide_rate: f64,
}

/// Connection subset to re-evaluate after a source change.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bucket {
    Cc(u8),
    Rpn(u16),
    Nrpn(u16),
    Midi(MidiScalar),
    NoteOn,
}

/// Introspection snapshot of one pool slot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoiceStatus {
    pub active: bool,
    pub on: bool,
    pub channel: u8,
    pub note: u8,
    pub id: u64,
    pub pending_steal: bool,
}

/// Modulation state: accumulators, per-connection memory, generators.
#[derive(Clone, Debug, Default)]
struct Modulation {
    /// Played key, fractional while gliding.
    key: f64,
    velocity: f64,
    /// Key and velocity after note-on destination overrides.
    effective_key: f64,
    effective_velocity: f64,
    dst: [f64; DEST_COUNT],
    last: heapless::Vec<f64, MAX_CONNECTIONS>,
    eg: [Envelope; 2],
    lfo: [Lfo; 2],
    glide: Option<Glide>,
}

impl Modulation {
    fn source_value(&self, source: Source, note: u8, ctx: &SourceContext, raw: bool) -> f64 {
        match source {
            Source::NoteOnKey => {
                if raw {
                    self.key / 128.0
                } else {
                    self.effective_key / 128.0
                }
            }
            Source::NoteOnVelocity => {
                if raw {
                    self.velocity / 128.0
                } else {
                    self.effective_velocity / 128.0
                }
            }
            Source::Eg(i) => self.eg.get(i as usize).map_or(0.0, Envelope::value),
            Source::Lfo(i) => self.lfo.get(i as usize).map_or(0.5, Lfo::value),
            Source::PitchBend => ctx.controls.bend_value(),
            Source::ChannelPressure => ctx.controls.channel_pressure_value(),
            Source::PolyPressure => ctx.controls.poly_pressure_value(note),
            Source::Cc(n) => ctx.controls.cc_value(note, n),
            Source::Rpn(n) => ctx.controls.rpn_value(n),
            Source::Nrpn(n) => ctx.controls.nrpn_value(n),
            Source::MasterFineTuning => ctx.master.fine_tuning_value(),
            Source::MasterCoarseTuning => ctx.master.coarse_tuning_value(),
        }
    }

    /// Re-evaluate connection `ix`, replacing its previous contribution.
    fn evaluate(&mut self, perf: &CompiledPerformer, ix: usize, note: u8, ctx: &SourceContext) {
        let Some(slot) = perf.targets[ix] else { return };
        let block = &perf.connections[ix];
        let raw = ix < perf.note_on_count;
        let mut value = block.scale;
        for source in block.sources() {
            value *= source.transform.apply(self.source_value(source.id, note, ctx, raw));
        }
        let value = block.destination.transform.apply(value);
        self.dst[slot] += value - self.last[ix];
        self.last[ix] = value;
    }

    fn apply_note_overrides(&mut self, perf: &CompiledPerformer) {
        self.effective_key = if perf.overrides_key {
            self.dst[slot::KEYNUMBER].clamp(0.0, 127.0)
        } else {
            self.key
        };
        self.effective_velocity = if perf.overrides_velocity {
            self.dst[slot::VELOCITY].clamp(0.0, 127.0)
        } else {
            self.velocity
        };
    }

    /// Evaluate key/velocity readers, resolving overrides between the
    /// note-on prefix and the rest.
    fn evaluate_note_on(&mut self, perf: &CompiledPerformer, list: &[usize], note: u8, ctx: &SourceContext) {
        let mut applied = false;
        for &ix in list {
            if !applied && ix >= perf.note_on_count {
                self.apply_note_overrides(perf);
                applied = true;
            }
            self.evaluate(perf, ix, note, ctx);
        }
        if !applied {
            self.apply_note_overrides(perf);
        }
    }

    fn eg_params(&self, eg: usize) -> EnvelopeParams {
        let base = slot::EG + eg * 7;
        EnvelopeParams::from_slots(&self.dst[base..base + 7])
    }
}

/// One pool slot.
#[derive(Clone, Debug, Default)]
pub struct Voice {
    /// Allocation order; lower is older.
    pub id: u64,
    /// Shared by every voice started from one note-on.
    pub group: u64,
    pub active: bool,
    /// Gate is on: the note has not been released.
    pub on: bool,
    /// Note-off arrived while a pedal held the note.
    pub held_off: bool,
    /// Captured by the sostenuto pedal.
    pub sostenuto: bool,
    /// Forced shutoff in progress.
    pub stopping: bool,
    pub release_triggered: bool,
    pub channel: u8,
    pub note: u8,
    pub velocity: u8,
    pub delay: usize,
    pub performer: Option<Arc<CompiledPerformer>>,
    /// Deferred note waiting for this voice's shutoff to finish.
    pub pending: Option<NoteRequest>,
    modulation: Modulation,
}

impl Voice {
    /// Bind this slot to `req` and evaluate every connection once.
    pub fn start(&mut self, req: NoteRequest, ctx: &SourceContext) {
        let perf = req.performer;
        self.id = req.id;
        self.group = req.group;
        self.active = true;
        self.on = true;
        self.held_off = false;
        self.sostenuto = false;
        self.stopping = false;
        self.release_triggered = perf.release_triggered;
        self.channel = req.channel;
        self.note = req.note;
        self.velocity = req.velocity;
        self.delay = req.delay;
        self.pending = None;

        let m = &mut self.modulation;
        m.key = req.glide_from.unwrap_or(req.note as f64);
        m.velocity = req.velocity as f64;
        m.glide = req.glide_from.map(|_| Glide {
            target: req.note as f64,
            rate: req.glide_rate,
        });
        m.dst = [0.0; DEST_COUNT];
        m.last.clear();
        let _ = m.last.resize(perf.connections.len(), 0.0);
        for eg in &mut m.eg {
            eg.start();
        }
        for lfo in &mut m.lfo {
            lfo.start();
        }

        m.apply_note_overrides(&perf);
        for ix in 0..perf.connections.len() {
            if ix == perf.note_on_count {
                m.apply_note_overrides(&perf);
            }
            m.evaluate(&perf, ix, req.note, ctx);
        }
        if perf.note_on_count == perf.connections.len() {
            m.apply_note_overrides(&perf);
        }
        self.performer = Some(perf);
    }

    /// Advance generators by `dt` seconds and re-evaluate generator-driven
    /// connections. Deactivates the voice when the volume envelope ends.
    pub fn control(&mut self, ctx: &SourceContext, dt: f64) {
        if !self.active {
            return;
        }
        let Some(perf) = self.performer.as_ref() else {
            self.active = false;
            return;
        };
        let m = &mut self.modulation;

        if let Some(glide) = m.glide {
            let delta = glide.target - m.key;
            if delta.abs() <= glide.rate {
                m.key = glide.target;
                m.glide = None;
            } else {
                m.key += glide.rate * delta.signum();
            }
            m.evaluate_note_on(perf, &perf.glide, self.note, ctx);
        }

        for i in 0..2 {
            let params = m.eg_params(i);
            m.eg[i].advance(&params, dt);
            let (delay, freq) = (m.dst[slot::LFO_DELAY + i], m.dst[slot::LFO_FREQ + i]);
            m.lfo[i].advance(delay, freq, dt);
        }
        for &ix in &perf.other {
            m.evaluate(perf, ix, self.note, ctx);
        }

        if m.eg[0].is_finished() {
            self.active = false;
            self.on = false;
        }
    }

    /// Re-evaluate the connections driven by one source.
    pub fn update(&mut self, bucket: Bucket, ctx: &SourceContext) {
        if !self.active {
            return;
        }
        let Some(perf) = self.performer.as_ref() else { return };
        let m = &mut self.modulation;
        let list: &[usize] = match bucket {
            Bucket::NoteOn => {
                m.evaluate_note_on(perf, &perf.note_on, self.note, ctx);
                return;
            }
            Bucket::Cc(n) => &perf.cc[(n & 0x7f) as usize],
            Bucket::Rpn(n) => perf.rpn_bucket(false, n),
            Bucket::Nrpn(n) => perf.rpn_bucket(true, n),
            Bucket::Midi(s) => &perf.midi[s as usize],
        };
        for &ix in list {
            m.evaluate(perf, ix, self.note, ctx);
        }
    }

    /// Re-evaluate every controller-driven connection.
    pub fn refresh_controllers(&mut self, ctx: &SourceContext) {
        if !self.active {
            return;
        }
        let Some(perf) = self.performer.as_ref() else { return };
        let m = &mut self.modulation;
        for (ix, block) in perf.connections.iter().enumerate().skip(perf.note_on_count) {
            let controller_driven = block.sources().any(|s| {
                matches!(
                    s.id,
                    Source::Cc(_)
                        | Source::Rpn(_)
                        | Source::Nrpn(_)
                        | Source::PitchBend
                        | Source::ChannelPressure
                        | Source::PolyPressure
                )
            });
            if controller_driven {
                m.evaluate(perf, ix, self.note, ctx);
            }
        }
    }

    /// Gate off.
    pub fn release(&mut self) {
        self.on = false;
        self.held_off = false;
        for eg in &mut self.modulation.eg {
            eg.release();
        }
    }

    /// Forced fast fade, used for stealing and exclusive classes.
    pub fn sound_off(&mut self) {
        self.on = false;
        self.held_off = false;
        self.stopping = true;
        for eg in &mut self.modulation.eg {
            eg.shutdown();
        }
    }

    /// Move to a new key in place (mono portamento).
    pub fn retune(&mut self, note: u8, rate: f64, ctx: &SourceContext) {
        self.note = note.min(127);
        let m = &mut self.modulation;
        if rate > 0.0 {
            m.glide = Some(Glide {
                target: self.note as f64,
                rate,
            });
        } else {
            m.key = self.note as f64;
            m.glide = None;
            self.update(Bucket::NoteOn, ctx);
        }
    }

    pub fn exclusive_class(&self) -> u32 {
        self.performer.as_ref().map_or(0, |p| p.exclusive_class)
    }

    /// Accumulated value of a destination slot.
    pub fn destination(&self, slot: usize) -> f64 {
        self.modulation.dst[slot]
    }

    /// Current (possibly gliding) key.
    pub fn key(&self) -> f64 {
        self.modulation.key
    }

    pub fn is_gliding(&self) -> bool {
        self.modulation.glide.is_some()
    }

    pub fn envelope(&self, eg: usize) -> &Envelope {
        &self.modulation.eg[eg]
    }

    pub fn status(&self) -> VoiceStatus {
        VoiceStatus {
            active: self.active,
            on: self.on,
            channel: self.channel,
            note: self.note,
            id: self.id,
            pending_steal: self.pending.is_some(),
        }
    }
}
