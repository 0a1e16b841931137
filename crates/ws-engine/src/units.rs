//! Unit conversions between the modulation model and the DSP.
//!
//! Pitch is carried in cents, gain in centibels, times in timecents and
//! frequencies in absolute cents (0 = 8.176 Hz, MIDI note 0).

use core::f64::consts::PI;

/// Frequency of absolute-cents zero: MIDI note 0.
pub const ABS_CENTS_BASE_HZ: f64 = 8.175_798_915_643_707;

/// Convert absolute cents to Hz.
pub fn abs_cents_to_hz(cents: f64) -> f64 {
    ABS_CENTS_BASE_HZ * libm::exp2(cents / 1200.0)
}

/// Convert a relative pitch in cents to a frequency ratio.
pub fn cents_to_ratio(cents: f64) -> f64 {
    libm::exp2(cents / 1200.0)
}

/// Convert timecents to seconds.
pub fn timecents_to_seconds(tc: f64) -> f64 {
    libm::exp2(tc / 1200.0)
}

/// Convert centibels to linear amplitude. -960 cB and below is silence.
pub fn centibels_to_gain(cb: f64) -> f64 {
    if cb <= -960.0 {
        return 0.0;
    }
    libm::pow(10.0, cb / 200.0)
}

/// Normalise a 7-bit value to `0.0..1.0`.
pub fn unit7(value: u8) -> f64 {
    value as f64 / 128.0
}

/// Normalise a 14-bit value to `0.0..1.0`.
pub fn unit14(value: u16) -> f64 {
    value as f64 / 16384.0
}

/// Normalise pitch bend so that 0, 8192 and 16383 map to 0, 0.5 and 1.
pub fn bend_to_unit(bend: u16) -> f64 {
    let bend = bend.min(16383);
    if bend >= 8192 {
        0.5 + 0.5 * (bend - 8192) as f64 / 8191.0
    } else {
        0.5 * bend as f64 / 8192.0
    }
}

/// Portamento speed for a CC5 value, in semitones per control cycle.
///
/// GM2 curve: 0 is effectively instant, 127 takes several seconds per
/// semitone.
pub fn portamento_rate(time: u8, control_rate: f64) -> f64 {
    let x = time.min(127) as f64 / 128.0;
    let x = -libm::asin(x * 2.0 - 1.0) / PI + 0.5;
    let x = libm::pow(100000.0, x) / 100.0;
    x / 100.0 * 1000.0 / control_rate
}

/// One-pole damping coefficient for a cutoff in Hz.
///
/// Stable for every input: the cutoff is clamped to Nyquist.
pub fn damping_coefficient(cutoff_hz: f64, sample_rate: f64) -> f64 {
    let x = (cutoff_hz.clamp(0.0, sample_rate / 2.0) / sample_rate) * 2.0 * PI;
    let cx = 2.0 - libm::cos(x);
    cx - libm::sqrt(cx * cx - 1.0)
}
