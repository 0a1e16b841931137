//! Built-in connections merged under every performer's own list.
//!
//! These establish the GM baseline: key tracking, velocity and volume
//! curves, pan, effect sends, pitch bend through RPN 0, vibrato from the
//! mod wheel and aftertouch, and neutral envelope/LFO/filter settings.

use ws_model::{
    ConnectionBlock, Destination, Direction, EgStage, ModelSource, Polarity, Shape, Source, Transform,
};

const CONCAVE_INVERTED: Transform = Transform::standard(Direction::MaxToMin, Polarity::Unipolar, Shape::Concave);
const LINEAR_INVERTED: Transform = Transform::standard(Direction::MaxToMin, Polarity::Unipolar, Shape::Linear);

/// RPN value as `msb` semitones plus `lsb` cents.
fn semitones_and_cents(v: f64) -> f64 {
    let raw = (v * 16384.0) as i32;
    ((raw >> 7) * 100 + (raw & 0x7f)) as f64
}

/// RPN value as signed semitones around MSB 64, in cents.
fn coarse_tuning_cents(v: f64) -> f64 {
    let raw = (v * 16384.0) as i32;
    ((raw >> 7) - 64) as f64 * 100.0
}

const fn src(id: Source) -> ModelSource {
    ModelSource::new(id)
}

const fn src_t(id: Source, transform: Transform) -> ModelSource {
    ModelSource::with_transform(id, transform)
}

const fn eg_stages(eg: u8) -> [ConnectionBlock; 7] {
    [
        ConnectionBlock::constant(-12000.0, Destination::Eg(eg, EgStage::Delay)),
        ConnectionBlock::constant(-12000.0, Destination::Eg(eg, EgStage::Attack)),
        ConnectionBlock::constant(-12000.0, Destination::Eg(eg, EgStage::Hold)),
        ConnectionBlock::constant(-12000.0, Destination::Eg(eg, EgStage::Decay)),
        ConnectionBlock::constant(1000.0, Destination::Eg(eg, EgStage::Sustain)),
        ConnectionBlock::constant(-12000.0, Destination::Eg(eg, EgStage::Release)),
        ConnectionBlock::constant(-8000.0, Destination::Eg(eg, EgStage::Shutdown)),
    ]
}

const VOLUME_EG: [ConnectionBlock; 7] = eg_stages(0);
const MOD_EG: [ConnectionBlock; 7] = eg_stages(1);

const ROUTING: [ConnectionBlock; 16] = [
    ConnectionBlock::new(src(Source::NoteOnKey), 12800.0, Destination::Pitch),
    ConnectionBlock::new(src_t(Source::NoteOnVelocity, CONCAVE_INVERTED), -960.0, Destination::Gain),
    ConnectionBlock::with_sources(
        src_t(Source::PitchBend, Transform::BIPOLAR),
        src_t(Source::Rpn(0), Transform::Custom(semitones_and_cents)),
        1.0,
        Destination::Pitch,
    ),
    ConnectionBlock::new(src_t(Source::Rpn(1), Transform::BIPOLAR), 100.0, Destination::Pitch),
    ConnectionBlock::new(src_t(Source::Rpn(2), Transform::Custom(coarse_tuning_cents)), 1.0, Destination::Pitch),
    ConnectionBlock::with_sources(
        src(Source::Cc(1)),
        src_t(Source::Lfo(1), Transform::BIPOLAR),
        50.0,
        Destination::Pitch,
    ),
    ConnectionBlock::with_sources(
        src(Source::ChannelPressure),
        src_t(Source::Lfo(1), Transform::BIPOLAR),
        50.0,
        Destination::Pitch,
    ),
    ConnectionBlock::with_sources(
        src(Source::PolyPressure),
        src_t(Source::Lfo(1), Transform::BIPOLAR),
        50.0,
        Destination::Pitch,
    ),
    ConnectionBlock::new(src_t(Source::Cc(7), CONCAVE_INVERTED), -960.0, Destination::Gain),
    ConnectionBlock::new(src_t(Source::Cc(11), CONCAVE_INVERTED), -960.0, Destination::Gain),
    ConnectionBlock::new(src(Source::Cc(10)), 1000.0, Destination::Pan),
    ConnectionBlock::new(src(Source::Cc(91)), 1000.0, Destination::Reverb),
    ConnectionBlock::new(src(Source::Cc(93)), 1000.0, Destination::Chorus),
    ConnectionBlock::new(src_t(Source::Eg(0), LINEAR_INVERTED), -960.0, Destination::Gain),
    ConnectionBlock::new(src_t(Source::MasterFineTuning, Transform::BIPOLAR), 100.0, Destination::Pitch),
    ConnectionBlock::new(src_t(Source::MasterCoarseTuning, Transform::BIPOLAR), 6400.0, Destination::Pitch),
];

const GENERATORS: [ConnectionBlock; 6] = [
    ConnectionBlock::constant(0.0, Destination::LfoFreq(0)),
    ConnectionBlock::constant(-12000.0, Destination::LfoDelay(0)),
    ConnectionBlock::constant(0.0, Destination::LfoFreq(1)),
    ConnectionBlock::constant(-12000.0, Destination::LfoDelay(1)),
    ConnectionBlock::constant(13500.0, Destination::FilterFreq),
    ConnectionBlock::constant(0.0, Destination::FilterQ),
];

/// Iterate over the default table in merge order.
pub fn default_connections() -> impl Iterator<Item = &'static ConnectionBlock> {
    ROUTING.iter().chain(VOLUME_EG.iter()).chain(MOD_EG.iter()).chain(GENERATORS.iter())
}
