//! Soundbank data model for the wavesynth engine.
//!
//! This crate defines what a soundbank loader hands to the engine:
//! samples, performers with their modulation connections, and
//! instruments addressed by patch. The engine compiles these into its
//! own control-rate tables.
//!
//! Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod audio_buffer;
mod connection;
mod instrument;
mod performer;
mod sample;
mod soundbank;
mod transform;

pub use audio_buffer::{AudioBuffer, CONTROL_BLOCK};
pub use connection::{
    ConnectionBlock, ConnectionKey, Destination, EgStage, ModelDestination, ModelSource, Source, MAX_SOURCES,
};
pub use instrument::{Instrument, Patch};
pub use performer::{Oscillator, Performer};
pub use sample::{LoopType, Sample, SampleData, SampleKey};
pub use soundbank::Soundbank;
pub use transform::{Direction, Polarity, Shape, Transform};
