//! Performer resolver: compiles soundbank performers into control-rate tables.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use arrayvec::ArrayVec;
use tracing::{debug, warn};
use ws_model::{ConnectionBlock, Destination, EgStage, Instrument, Patch, Performer, Sample, Soundbank, Source};

use crate::defaults::default_connections;
use crate::region::RegionDirector;

/// Connections kept per compiled performer.
pub const MAX_CONNECTIONS: usize = 128;

/// Oscillators played per voice.
pub const MAX_OSCILLATORS: usize = 4;

/// Number of destination slots a voice accumulates into.
pub const DEST_COUNT: usize = 27;

/// Fixed destination slots.
pub mod slot {
    pub const KEYNUMBER: usize = 0;
    pub const VELOCITY: usize = 1;
    pub const PITCH: usize = 2;
    pub const GAIN: usize = 3;
    pub const PAN: usize = 4;
    pub const REVERB: usize = 5;
    pub const CHORUS: usize = 6;
    pub const FILTER_FREQ: usize = 7;
    pub const FILTER_Q: usize = 8;
    pub const LFO_DELAY: usize = 9;
    pub const LFO_FREQ: usize = 11;
    /// Seven slots per EG, in `EgStage` order.
    pub const EG: usize = 13;
}

/// Map a destination to its accumulator slot. `None` for unresolvable ones.
pub fn destination_slot(dest: Destination) -> Option<usize> {
    let ix = match dest {
        Destination::None => return None,
        Destination::Keynumber => slot::KEYNUMBER,
        Destination::Velocity => slot::VELOCITY,
        Destination::Pitch => slot::PITCH,
        Destination::Gain => slot::GAIN,
        Destination::Pan => slot::PAN,
        Destination::Reverb => slot::REVERB,
        Destination::Chorus => slot::CHORUS,
        Destination::FilterFreq => slot::FILTER_FREQ,
        Destination::FilterQ => slot::FILTER_Q,
        Destination::LfoDelay(i) if i < 2 => slot::LFO_DELAY + i as usize,
        Destination::LfoFreq(i) if i < 2 => slot::LFO_FREQ + i as usize,
        Destination::Eg(i, stage) if i < 2 => slot::EG + i as usize * 7 + stage_offset(stage),
        _ => return None,
    };
    Some(ix)
}

fn stage_offset(stage: EgStage) -> usize {
    match stage {
        EgStage::Delay => 0,
        EgStage::Attack => 1,
        EgStage::Hold => 2,
        EgStage::Decay => 3,
        EgStage::Sustain => 4,
        EgStage::Release => 5,
        EgStage::Shutdown => 6,
    }
}

/// Channel-wide scalar sources with their own bucket.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiScalar {
    PitchBend = 0,
    ChannelPressure = 1,
    PolyPressure = 2,
}

/// An oscillator with its wavetable resolved.
#[derive(Clone, Debug)]
pub struct ResolvedOscillator {
    pub sample: Arc<Sample>,
    pub root_key: u8,
    pub pitch_correction: f64,
    pub attenuation: f64,
}

/// A performer compiled for control-rate evaluation.
///
/// `connections` holds the merged default and authored list with note-on
/// destinations first. Each bucket lists the connection indices a change
/// of that source must re-evaluate.
#[derive(Debug)]
pub struct CompiledPerformer {
    pub key_from: u8,
    pub key_to: u8,
    pub vel_from: u8,
    pub vel_to: u8,
    pub exclusive_class: u32,
    pub self_non_exclusive: bool,
    pub release_triggered: bool,
    pub oscillators: ArrayVec<ResolvedOscillator, MAX_OSCILLATORS>,
    pub connections: Vec<ConnectionBlock>,
    /// Accumulator slot per connection, parallel to `connections`.
    pub targets: Vec<Option<usize>>,
    /// Leading connections that target `Keynumber`/`Velocity`.
    pub note_on_count: usize,
    pub overrides_key: bool,
    pub overrides_velocity: bool,
    pub cc: [Vec<usize>; 128],
    pub rpn: BTreeMap<u16, Vec<usize>>,
    pub nrpn: BTreeMap<u16, Vec<usize>>,
    pub midi: [Vec<usize>; 3],
    /// Connections reading the note-on key or velocity.
    pub note_on: Vec<usize>,
    /// `note_on` minus what the per-cycle `other` pass already covers.
    /// Re-evaluated each cycle while the key glides.
    pub glide: Vec<usize>,
    /// Connections reading generators or master tuning: evaluated every cycle.
    pub other: Vec<usize>,
}

/// Record `ix` unless it was the last entry, so one pass visits it once.
fn push_once(bucket: &mut Vec<usize>, ix: usize) {
    if bucket.last() != Some(&ix) {
        bucket.push(ix);
    }
}

/// Merge defaults under the authored list, de-duplicate, and move note-on
/// destinations to the front.
fn merge_connections(performer: &Performer) -> Vec<ConnectionBlock> {
    let mut merged: Vec<ConnectionBlock> = Vec::new();
    let mut index = HashMap::new();
    let defaults = performer
        .default_connections
        .then(default_connections)
        .into_iter()
        .flatten()
        .copied();
    for block in defaults.chain(performer.connections.iter().copied()) {
        match index.get(&block.key()) {
            Some(&at) => merged[at] = block,
            None => {
                index.insert(block.key(), merged.len());
                merged.push(block);
            }
        }
    }
    let (mut front, back): (Vec<_>, Vec<_>) = merged.into_iter().partition(|c| c.destination.id.is_note_on());
    front.extend(back);
    front
}

impl CompiledPerformer {
    /// Compile a raw performer. Oscillators whose sample is missing are dropped.
    pub fn compile(performer: &Performer, bank: &Soundbank) -> Self {
        let mut connections = merge_connections(performer);
        if connections.len() > MAX_CONNECTIONS {
            warn!(
                performer = performer.name.as_str(),
                count = connections.len(),
                "connection list truncated"
            );
            connections.truncate(MAX_CONNECTIONS);
        }

        let mut oscillators = ArrayVec::new();
        for osc in &performer.oscillators {
            let Some(sample) = bank.sample(osc.sample) else {
                warn!(performer = performer.name.as_str(), "oscillator sample not found");
                continue;
            };
            if oscillators.is_full() {
                warn!(performer = performer.name.as_str(), "extra oscillators ignored");
                break;
            }
            oscillators.push(ResolvedOscillator {
                sample: Arc::clone(sample),
                root_key: osc.root_key,
                pitch_correction: osc.pitch_correction,
                attenuation: osc.attenuation,
            });
        }

        let note_on_count = connections.iter().take_while(|c| c.destination.id.is_note_on()).count();
        let mut compiled = Self {
            key_from: performer.key_from,
            key_to: performer.key_to,
            vel_from: performer.vel_from,
            vel_to: performer.vel_to,
            exclusive_class: performer.exclusive_class,
            self_non_exclusive: performer.self_non_exclusive,
            release_triggered: performer.release_triggered,
            oscillators,
            targets: connections.iter().map(|c| destination_slot(c.destination.id)).collect(),
            note_on_count,
            overrides_key: connections[..note_on_count]
                .iter()
                .any(|c| c.destination.id == Destination::Keynumber),
            overrides_velocity: connections[..note_on_count]
                .iter()
                .any(|c| c.destination.id == Destination::Velocity),
            connections,
            cc: core::array::from_fn(|_| Vec::new()),
            rpn: BTreeMap::new(),
            nrpn: BTreeMap::new(),
            midi: Default::default(),
            note_on: Vec::new(),
            glide: Vec::new(),
            other: Vec::new(),
        };
        compiled.build_buckets();
        compiled
    }

    fn build_buckets(&mut self) {
        for (ix, block) in self.connections.iter().enumerate() {
            if self.targets[ix].is_none() {
                continue;
            }
            for source in block.sources() {
                let bucket = match source.id {
                    Source::Cc(n) => &mut self.cc[(n & 0x7f) as usize],
                    Source::Rpn(n) => self.rpn.entry(n).or_default(),
                    Source::Nrpn(n) => self.nrpn.entry(n).or_default(),
                    Source::PitchBend => &mut self.midi[MidiScalar::PitchBend as usize],
                    Source::ChannelPressure => &mut self.midi[MidiScalar::ChannelPressure as usize],
                    Source::PolyPressure => &mut self.midi[MidiScalar::PolyPressure as usize],
                    Source::NoteOnKey | Source::NoteOnVelocity => &mut self.note_on,
                    Source::Eg(_) | Source::Lfo(_) | Source::MasterFineTuning | Source::MasterCoarseTuning => {
                        &mut self.other
                    }
                };
                push_once(bucket, ix);
            }
        }
        self.glide = self
            .note_on
            .iter()
            .copied()
            .filter(|&ix| ix < self.note_on_count || !self.other.contains(&ix))
            .collect();
    }

    pub fn covers(&self, key: u8, velocity: u8) -> bool {
        (self.key_from..=self.key_to).contains(&key) && (self.vel_from..=self.vel_to).contains(&velocity)
    }

    pub fn rpn_bucket(&self, nrpn: bool, param: u16) -> &[usize] {
        let map = if nrpn { &self.nrpn } else { &self.rpn };
        map.get(&param).map_or(&[], |v| v.as_slice())
    }
}

/// An instrument ready to play: compiled performers plus their region index.
#[derive(Clone, Debug)]
pub struct ResolvedInstrument {
    pub patch: Patch,
    pub performers: Arc<[Arc<CompiledPerformer>]>,
    pub director: Arc<RegionDirector>,
}

impl ResolvedInstrument {
    pub fn resolve(instrument: &Instrument, bank: &Soundbank) -> Self {
        Self::resolve_with(instrument, |_, p| Arc::new(CompiledPerformer::compile(p, bank)))
    }

    /// Resolve with `compile` supplying each performer, given its index in
    /// the instrument. Lets the caller reuse earlier compilations.
    pub fn resolve_with(
        instrument: &Instrument,
        mut compile: impl FnMut(usize, &Performer) -> Arc<CompiledPerformer>,
    ) -> Self {
        let performers: Vec<_> = instrument
            .performers
            .iter()
            .enumerate()
            .map(|(ix, p)| compile(ix, p))
            .collect();
        debug!(
            instrument = instrument.name.as_str(),
            performers = performers.len(),
            "instrument resolved"
        );
        Self {
            patch: instrument.patch,
            performers: performers.into(),
            director: Arc::new(RegionDirector::new(&instrument.performers)),
        }
    }
}
