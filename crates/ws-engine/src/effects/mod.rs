//! Master effects: reverb and chorus sends, output limiter.

mod chorus;
mod delay;
mod limiter;
mod reverb;

pub use chorus::Chorus;
pub use delay::DelayLine;
pub use limiter::{Limiter, CEILING};
pub use reverb::Reverb;
