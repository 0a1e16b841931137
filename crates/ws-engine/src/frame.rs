//! Audio frame type.

/// A stereo audio frame (16-bit integer), the unit of the output stream.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

/// Bytes per interleaved 16-bit stereo frame.
pub const FRAME_BYTES: usize = 4;

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: i16) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Convert float samples, clipping to the 16-bit range.
    pub fn from_f32(left: f32, right: f32) -> Self {
        Self {
            left: to_i16(left),
            right: to_i16(right),
        }
    }

    /// Little-endian interleaved bytes: left then right.
    pub fn to_le_bytes(self) -> [u8; FRAME_BYTES] {
        let l = self.left.to_le_bytes();
        let r = self.right.to_le_bytes();
        [l[0], l[1], r[0], r[1]]
    }
}

fn to_i16(sample: f32) -> i16 {
    (sample * 32767.0).clamp(-32768.0, 32767.0) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_f32_scales_and_clips() {
        assert_eq!(Frame::from_f32(0.0, 1.0), Frame { left: 0, right: 32767 });
        assert_eq!(Frame::from_f32(-2.0, 2.0), Frame { left: -32768, right: 32767 });
        assert_eq!(Frame::from_f32(0.5, -0.5), Frame { left: 16383, right: -16383 });
    }

    #[test]
    fn bytes_are_interleaved_little_endian() {
        let f = Frame { left: 0x0102, right: -2 };
        assert_eq!(f.to_le_bytes(), [0x02, 0x01, 0xFE, 0xFF]);
    }

    #[test]
    fn mono_duplicates() {
        assert_eq!(Frame::mono(7), Frame { left: 7, right: 7 });
        assert_eq!(Frame::silence(), Frame::default());
    }
}
