//! Modulation graph edges: sources, destinations, and connection blocks.

use crate::transform::Transform;

/// Maximum number of sources on one connection.
pub const MAX_SOURCES: usize = 2;

/// A control value a connection can read.
///
/// Each variant is one kind of value the engine tracks; the engine decides
/// once, when compiling a performer, which incoming event can change it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Source {
    /// Note number of the note-on (or its override).
    NoteOnKey,
    /// Velocity of the note-on (or its override).
    NoteOnVelocity,
    /// Envelope generator output (0 = volume EG, 1 = modulation EG).
    Eg(u8),
    /// LFO output (0 = modulation LFO, 1 = vibrato LFO).
    Lfo(u8),
    /// Channel pitch bend.
    PitchBend,
    /// Channel (mono) aftertouch.
    ChannelPressure,
    /// Polyphonic aftertouch for the voice's note.
    PolyPressure,
    /// MIDI controller 0-127.
    Cc(u8),
    /// Registered parameter 0-16383.
    Rpn(u16),
    /// Non-registered parameter 0-16383.
    Nrpn(u16),
    /// Synthesizer master fine tuning.
    MasterFineTuning,
    /// Synthesizer master coarse tuning.
    MasterCoarseTuning,
}

/// A source plus the transform applied to its normalised value.
#[derive(Clone, Copy, Debug)]
pub struct ModelSource {
    pub id: Source,
    pub transform: Transform,
}

impl ModelSource {
    pub const fn new(id: Source) -> Self {
        Self { id, transform: Transform::LINEAR }
    }

    pub const fn with_transform(id: Source, transform: Transform) -> Self {
        Self { id, transform }
    }
}

/// Envelope generator segment parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EgStage {
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    Shutdown,
}

/// A synthesis parameter a connection writes to.
///
/// Units: `Pitch` cents, `Gain` centibels, `Pan` per-mille (500 = centre),
/// `Reverb`/`Chorus` per-mille, `FilterFreq` absolute cents, `FilterQ`
/// centibels, `LfoFreq` absolute cents, time parameters timecents,
/// `Eg(_, Sustain)` per-mille, `Keynumber`/`Velocity` MIDI units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Unresolvable destination; the connection contributes nothing.
    #[default]
    None,
    Keynumber,
    Velocity,
    Pitch,
    Gain,
    Pan,
    Reverb,
    Chorus,
    FilterFreq,
    FilterQ,
    LfoDelay(u8),
    LfoFreq(u8),
    Eg(u8, EgStage),
}

impl Destination {
    /// Destinations that override note-on values and must resolve first.
    pub fn is_note_on(&self) -> bool {
        matches!(self, Destination::Keynumber | Destination::Velocity)
    }
}

/// A destination plus the transform applied to the connection's output.
#[derive(Clone, Copy, Debug)]
pub struct ModelDestination {
    pub id: Destination,
    pub transform: Transform,
}

impl ModelDestination {
    pub const fn new(id: Destination) -> Self {
        Self { id, transform: Transform::LINEAR }
    }
}

/// Identity of a connection for de-duplication: its sources and destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub sources: [Option<Source>; MAX_SOURCES],
    pub destination: Destination,
}

/// One edge of the modulation graph.
///
/// Contributes `destination.transform(scale × Π source.transform(value))`
/// to the destination's running total. With no sources the contribution is
/// the constant `scale`.
#[derive(Clone, Copy, Debug)]
pub struct ConnectionBlock {
    pub sources: [Option<ModelSource>; MAX_SOURCES],
    pub scale: f64,
    pub destination: ModelDestination,
}

impl ConnectionBlock {
    /// A sourceless connection: a constant offset on `destination`.
    pub const fn constant(scale: f64, destination: Destination) -> Self {
        Self {
            sources: [None, None],
            scale,
            destination: ModelDestination::new(destination),
        }
    }

    pub const fn new(source: ModelSource, scale: f64, destination: Destination) -> Self {
        Self {
            sources: [Some(source), None],
            scale,
            destination: ModelDestination::new(destination),
        }
    }

    pub const fn with_sources(
        first: ModelSource,
        second: ModelSource,
        scale: f64,
        destination: Destination,
    ) -> Self {
        Self {
            sources: [Some(first), Some(second)],
            scale,
            destination: ModelDestination::new(destination),
        }
    }

    /// Iterate over the populated sources.
    pub fn sources(&self) -> impl Iterator<Item = &ModelSource> {
        self.sources.iter().flatten()
    }

    /// De-duplication key.
    pub fn key(&self) -> ConnectionKey {
        ConnectionKey {
            sources: [self.sources[0].map(|s| s.id), self.sources[1].map(|s| s.id)],
            destination: self.destination.id,
        }
    }
}
