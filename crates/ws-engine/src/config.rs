//! Synthesizer configuration.

use ws_model::CONTROL_BLOCK;

use crate::error::{Result, SynthError};
use crate::voice_pool::MAX_VOICES;

/// GS reverb types.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReverbPreset {
    SmallRoom,
    MediumRoom,
    #[default]
    LargeRoom,
    MediumHall,
    LargeHall,
    Plate,
}

/// Reverb network parameters for one preset.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReverbParams {
    pub room_size: f32,
    /// Damping cutoff in Hz.
    pub damp_hz: f32,
    /// Pre-delay in seconds.
    pub predelay: f32,
    pub gain: f32,
}

impl ReverbPreset {
    pub fn params(self) -> ReverbParams {
        let (room_size, damp_hz, predelay, gain) = match self {
            ReverbPreset::SmallRoom => (1.1, 5000.0, 0.0, 4.0),
            ReverbPreset::MediumRoom => (1.3, 5000.0, 0.0, 3.0),
            ReverbPreset::LargeRoom => (1.5, 5000.0, 0.0, 2.0),
            ReverbPreset::MediumHall => (1.8, 24000.0, 0.02, 1.5),
            ReverbPreset::LargeHall => (1.8, 24000.0, 0.03, 1.5),
            ReverbPreset::Plate => (1.3, 2500.0, 0.0, 6.0),
        };
        ReverbParams { room_size, damp_hz, predelay, gain }
    }
}

/// Engine configuration, fixed for the lifetime of an open synthesizer.
#[derive(Clone, Debug)]
pub struct SynthConfig {
    /// Output sample rate in Hz.
    pub sample_rate: u32,
    /// Voice pool size, at most 64.
    pub max_polyphony: usize,
    pub reverb_on: bool,
    pub chorus_on: bool,
    pub limiter_on: bool,
    pub reverb_preset: ReverbPreset,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            max_polyphony: MAX_VOICES,
            reverb_on: true,
            chorus_on: true,
            limiter_on: true,
            reverb_preset: ReverbPreset::default(),
        }
    }
}

impl SynthConfig {
    /// Frames per control cycle. Not configurable.
    pub const fn control_block(&self) -> usize {
        CONTROL_BLOCK
    }

    /// Control cycles per second.
    pub fn control_rate(&self) -> f64 {
        self.sample_rate as f64 / CONTROL_BLOCK as f64
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(SynthError::InvalidConfig("sample rate must be non-zero".into()));
        }
        if self.max_polyphony == 0 || self.max_polyphony > MAX_VOICES {
            return Err(SynthError::InvalidConfig(format!(
                "polyphony {} outside 1..={}",
                self.max_polyphony, MAX_VOICES
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = SynthConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.control_block(), 300);
        assert!((config.control_rate() - 147.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_zero_sample_rate() {
        let config = SynthConfig { sample_rate: 0, ..Default::default() };
        assert!(matches!(config.validate(), Err(SynthError::InvalidConfig(_))));
    }

    #[test]
    fn rejects_polyphony_above_cap() {
        let config = SynthConfig { max_polyphony: 65, ..Default::default() };
        assert!(config.validate().is_err());
        let config = SynthConfig { max_polyphony: 0, ..Default::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn hall_presets_use_predelay() {
        assert_eq!(ReverbPreset::SmallRoom.params().predelay, 0.0);
        assert!(ReverbPreset::LargeHall.params().predelay > ReverbPreset::MediumHall.params().predelay);
    }
}
