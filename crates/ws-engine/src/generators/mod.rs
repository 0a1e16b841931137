//! Per-voice signal generators.

mod envelope;
mod filter;
mod lfo;
mod oscillator;

pub use envelope::{Envelope, EnvelopeParams, EnvelopePhase};
pub use filter::LowPass;
pub use lfo::Lfo;
pub use oscillator::Wavetable;
