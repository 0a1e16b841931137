//! Performers: key/velocity regions with oscillators and modulation.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::connection::ConnectionBlock;
use crate::sample::SampleKey;

/// One wavetable played by a performer.
#[derive(Clone, Copy, Debug)]
pub struct Oscillator {
    pub sample: SampleKey,
    /// MIDI note at which the sample plays at its native rate.
    pub root_key: u8,
    /// Fine tuning in cents added to the played pitch.
    pub pitch_correction: f64,
    /// Static attenuation in centibels.
    pub attenuation: f64,
}

impl Oscillator {
    pub fn new(sample: SampleKey, root_key: u8) -> Self {
        Self {
            sample,
            root_key,
            pitch_correction: 0.0,
            attenuation: 0.0,
        }
    }
}

/// A raw, soundbank-authored performer.
///
/// Immutable once the soundbank is built; the engine compiles it into
/// control-rate lookup tables on first use.
#[derive(Clone, Debug)]
pub struct Performer {
    pub name: ArrayString<32>,
    pub key_from: u8,
    pub key_to: u8,
    pub vel_from: u8,
    pub vel_to: u8,
    /// Non-zero: a new note in this class silences others in the same class.
    pub exclusive_class: u32,
    /// Same-note voices are exempt from exclusive-class shutoff.
    pub self_non_exclusive: bool,
    /// Sounds on note-off instead of note-on.
    pub release_triggered: bool,
    /// Merge the engine's default connection table under `connections`.
    pub default_connections: bool,
    pub oscillators: Vec<Oscillator>,
    pub connections: Vec<ConnectionBlock>,
}

impl Default for Performer {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            key_from: 0,
            key_to: 127,
            vel_from: 0,
            vel_to: 127,
            exclusive_class: 0,
            self_non_exclusive: false,
            release_triggered: false,
            default_connections: true,
            oscillators: Vec::new(),
            connections: Vec::new(),
        }
    }
}

impl Performer {
    /// A full-range performer playing one oscillator.
    pub fn new(oscillator: Oscillator) -> Self {
        let mut p = Self::default();
        p.oscillators.push(oscillator);
        p
    }

    /// Restrict the key range (inclusive).
    pub fn keys(mut self, from: u8, to: u8) -> Self {
        self.key_from = from;
        self.key_to = to;
        self
    }

    /// Restrict the velocity range (inclusive).
    pub fn velocities(mut self, from: u8, to: u8) -> Self {
        self.vel_from = from;
        self.vel_to = to;
        self
    }

    pub fn connection(mut self, block: ConnectionBlock) -> Self {
        self.connections.push(block);
        self
    }

    /// True if the region covers `(key, velocity)`.
    pub fn covers(&self, key: u8, velocity: u8) -> bool {
        (self.key_from..=self.key_to).contains(&key) && (self.vel_from..=self.vel_to).contains(&velocity)
    }
}
