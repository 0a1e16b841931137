//! A loaded soundbank: sample table plus instruments.

use alloc::sync::Arc;
use alloc::vec::Vec;
use arrayvec::ArrayString;
use slotmap::SlotMap;

use crate::instrument::{Instrument, Patch};
use crate::sample::{Sample, SampleKey};

/// Samples and instruments produced by a soundbank loader.
///
/// Samples are shared (`Arc`) so compiled performers can hold them without
/// borrowing the bank.
#[derive(Clone, Debug, Default)]
pub struct Soundbank {
    pub name: ArrayString<32>,
    pub samples: SlotMap<SampleKey, Arc<Sample>>,
    pub instruments: Vec<Instrument>,
}

impl Soundbank {
    pub fn new(name: &str) -> Self {
        let mut bank = Self::default();
        for c in name.chars() {
            if bank.name.try_push(c).is_err() {
                break;
            }
        }
        bank
    }

    /// Store a sample and return its key.
    pub fn add_sample(&mut self, sample: Sample) -> SampleKey {
        self.samples.insert(Arc::new(sample))
    }

    pub fn sample(&self, key: SampleKey) -> Option<&Arc<Sample>> {
        self.samples.get(key)
    }

    pub fn add_instrument(&mut self, instrument: Instrument) {
        self.instruments.push(instrument);
    }

    /// Exact patch match.
    pub fn instrument(&self, patch: Patch) -> Option<&Instrument> {
        self.instruments.iter().find(|i| i.patch == patch)
    }

    /// Exact match, else the same program in bank 0 (GM fallback).
    pub fn find_instrument(&self, patch: Patch) -> Option<&Instrument> {
        self.find_instrument_index(patch).map(|ix| &self.instruments[ix])
    }

    /// Position in `instruments` of what `find_instrument` returns.
    pub fn find_instrument_index(&self, patch: Patch) -> Option<usize> {
        let exact = |patch: Patch| self.instruments.iter().position(|i| i.patch == patch);
        exact(patch).or_else(|| if patch.bank == 0 { None } else { exact(Patch { bank: 0, ..patch }) })
    }
}
