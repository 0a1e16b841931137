//! Instruments and patch addressing.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::performer::Performer;

/// Bank/program address of an instrument.
///
/// `bank` is the 14-bit bank select value (`msb << 7 | lsb`).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Patch {
    pub bank: u16,
    pub program: u8,
    /// Drum kit patches answer only on the percussion channel.
    pub percussion: bool,
}

impl Patch {
    pub const fn new(bank: u16, program: u8) -> Self {
        Self { bank, program, percussion: false }
    }

    pub const fn percussion(bank: u16, program: u8) -> Self {
        Self { bank, program, percussion: true }
    }
}

/// An instrument: an ordered list of performers addressed by a patch.
///
/// Performer order matters. The first performer matched by a note-on is the
/// one that applies exclusive-class shutoff.
#[derive(Clone, Debug, Default)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<32>,
    pub patch: Patch,
    pub performers: Vec<Performer>,
}

impl Instrument {
    /// Create an empty instrument.
    pub fn new(name: &str, patch: Patch) -> Self {
        let mut inst = Self {
            patch,
            ..Self::default()
        };
        for c in name.chars() {
            if inst.name.try_push(c).is_err() {
                break;
            }
        }
        inst
    }

    /// Append a performer.
    pub fn with_performer(mut self, performer: Performer) -> Self {
        self.performers.push(performer);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_name_is_truncated() {
        let inst = Instrument::new("an instrument name longer than thirty two bytes", Patch::default());
        assert_eq!(inst.name.as_str(), "an instrument name longer than t");
    }

    #[test]
    fn percussion_patch_differs_from_melodic() {
        assert_ne!(Patch::new(0, 0), Patch::percussion(0, 0));
    }
}
