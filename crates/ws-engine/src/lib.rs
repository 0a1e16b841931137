//! Voice, modulation and mixing engine for the wavesynth synthesizer.
//!
//! Channels turn performance events into voice requests against a fixed
//! voice pool. Each control cycle the mixer advances every voice's
//! modulation graph, renders the voices into a bus bank, runs the master
//! effects and frames the result as 16-bit stereo PCM.

mod channel;
mod config;
mod controls;
mod defaults;
mod effects;
mod error;
mod frame;
mod generators;
mod mixer;
mod performer;
mod region;
mod renderer;
mod stream;
mod synth;
pub mod units;
mod voice;
mod voice_pool;

pub use channel::{Channel, ParamSelect};
pub use config::{ReverbParams, ReverbPreset, SynthConfig};
pub use controls::{ChannelControls, MasterControls, SourceContext};
pub use defaults::default_connections;
pub use effects::{Chorus, DelayLine, Limiter, Reverb, CEILING};
pub use error::{Result, SynthError};
pub use frame::{Frame, FRAME_BYTES};
pub use generators::{Envelope, EnvelopeParams, EnvelopePhase, Lfo, LowPass, Wavetable};
pub use mixer::{Bus, BusBank, MainMixer, BUS_COUNT};
pub use performer::{
    slot, CompiledPerformer, MidiScalar, ResolvedInstrument, ResolvedOscillator, DEST_COUNT, MAX_CONNECTIONS,
    MAX_OSCILLATORS,
};
pub use region::RegionDirector;
pub use renderer::VoiceRenderer;
pub use stream::SynthStream;
pub use synth::{ChannelHandle, SynthState, Synthesizer, CHANNELS};
pub use voice::{Bucket, NoteRequest, Voice, VoiceStatus};
pub use voice_pool::{VoicePool, MAX_VOICES};
pub use ws_model::CONTROL_BLOCK;
