//! Wavetable sample data.

use alloc::vec::Vec;
use arrayvec::ArrayString;

slotmap::new_key_type! {
    /// Key for referencing samples in a soundbank's sample table.
    pub struct SampleKey;
}

/// A wavetable: mono PCM data plus its loop descriptor.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<32>,
    /// Audio data
    pub data: SampleData,
    /// Native sample rate in Hz
    pub sample_rate: u32,
    /// Loop start (in frames)
    pub loop_start: u32,
    /// Loop end, exclusive (in frames)
    pub loop_end: u32,
    /// Loop type
    pub loop_type: LoopType,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::Mono16(Vec::new()),
            sample_rate: 44100,
            loop_start: 0,
            loop_end: 0,
            loop_type: LoopType::None,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        let _ = sample.name.try_push_str(name);
        sample
    }

    /// Length in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the sample has a usable loop.
    pub fn has_loop(&self) -> bool {
        self.loop_type != LoopType::None
            && self.loop_end > self.loop_start
            && self.loop_end as usize <= self.len()
    }
}

/// Sample audio data.
#[derive(Clone, Debug)]
pub enum SampleData {
    /// 8-bit signed samples
    Mono8(Vec<i8>),
    /// 16-bit signed samples
    Mono16(Vec<i16>),
    /// Float samples in `-1.0..=1.0`
    Float(Vec<f32>),
}

impl SampleData {
    /// Number of frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono8(v) => v.len(),
            SampleData::Mono16(v) => v.len(),
            SampleData::Float(v) => v.len(),
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Frame value as f32 in `-1.0..=1.0`. Out of range reads as silence.
    pub fn get(&self, pos: usize) -> f32 {
        match self {
            SampleData::Mono8(v) => v.get(pos).map_or(0.0, |&s| s as f32 / 128.0),
            SampleData::Mono16(v) => v.get(pos).map_or(0.0, |&s| s as f32 / 32768.0),
            SampleData::Float(v) => v.get(pos).copied().unwrap_or(0.0),
        }
    }
}

/// Wavetable loop mode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopType {
    /// Play once to the end
    #[default]
    None,
    /// Loop forever
    Forward,
    /// Loop until note-off, then play through to the end
    UntilRelease,
    /// Bidirectional loop
    PingPong,
}
