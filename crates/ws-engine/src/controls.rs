//! Controller state read by the modulation model.
//!
//! `ChannelControls` holds every value a channel exposes as a modulation
//! source. `MasterControls` holds the synthesizer-wide values.

use std::collections::BTreeMap;

use crate::units::{bend_to_unit, unit14, unit7};

/// Controller values after a power-on or full reset.
pub fn default_controller(cc: u8) -> u8 {
    match cc {
        7 => 100,
        8 | 10 => 64,
        11 => 127,
        70..=79 => 64,
        91 => 40,
        _ => 0,
    }
}

/// Registered parameter values until a data entry overrides them.
pub fn default_rpn(param: u16) -> u16 {
    match param {
        0 => 2 << 7,
        1 | 2 => 8192,
        5 => 64,
        _ => 0,
    }
}

/// Per-channel source values.
#[derive(Clone, Debug)]
pub struct ChannelControls {
    pub cc: [u8; 128],
    pub rpn: BTreeMap<u16, u16>,
    pub nrpn: BTreeMap<u16, u16>,
    pub pitch_bend: u16,
    pub channel_pressure: u8,
    pub poly_pressure: [u8; 128],
    /// Per-note controller overrides, `[note][cc]`. Allocated on first use.
    pub key_controllers: Option<Box<[[Option<u8>; 128]; 128]>>,
}

impl Default for ChannelControls {
    fn default() -> Self {
        Self {
            cc: core::array::from_fn(|i| default_controller(i as u8)),
            rpn: BTreeMap::new(),
            nrpn: BTreeMap::new(),
            pitch_bend: 8192,
            channel_pressure: 0,
            poly_pressure: [0; 128],
            key_controllers: None,
        }
    }
}

impl ChannelControls {
    /// Controller value as seen by a voice playing `note`.
    pub fn controller(&self, note: u8, cc: u8) -> u8 {
        let cc = cc & 0x7f;
        self.key_controllers
            .as_ref()
            .and_then(|table| table[(note & 0x7f) as usize][cc as usize])
            .unwrap_or(self.cc[cc as usize])
    }

    /// Normalised controller value. CC 0-31 read as 14-bit MSB/LSB pairs.
    pub fn cc_value(&self, note: u8, cc: u8) -> f64 {
        if cc < 32 {
            let msb = self.controller(note, cc) as u16;
            let lsb = self.controller(note, cc + 32) as u16;
            unit14((msb << 7) | lsb)
        } else {
            unit7(self.controller(note, cc))
        }
    }

    pub fn rpn_raw(&self, param: u16) -> u16 {
        self.rpn.get(&param).copied().unwrap_or_else(|| default_rpn(param))
    }

    pub fn nrpn_raw(&self, param: u16) -> u16 {
        self.nrpn.get(&param).copied().unwrap_or(0)
    }

    pub fn rpn_value(&self, param: u16) -> f64 {
        unit14(self.rpn_raw(param))
    }

    pub fn nrpn_value(&self, param: u16) -> f64 {
        unit14(self.nrpn_raw(param))
    }

    pub fn bend_value(&self) -> f64 {
        bend_to_unit(self.pitch_bend)
    }

    pub fn channel_pressure_value(&self) -> f64 {
        unit7(self.channel_pressure)
    }

    pub fn poly_pressure_value(&self, note: u8) -> f64 {
        unit7(self.poly_pressure[(note & 0x7f) as usize])
    }

    /// Store a parameter value.
    pub fn set_param(&mut self, nrpn: bool, param: u16, value: u16) {
        let map = if nrpn { &mut self.nrpn } else { &mut self.rpn };
        map.insert(param, value.min(16383));
    }

    pub fn param_raw(&self, nrpn: bool, param: u16) -> u16 {
        if nrpn {
            self.nrpn_raw(param)
        } else {
            self.rpn_raw(param)
        }
    }

    pub fn set_key_controller(&mut self, note: u8, cc: u8, value: u8) {
        let table = self
            .key_controllers
            .get_or_insert_with(|| Box::new([[None; 128]; 128]));
        table[(note & 0x7f) as usize][(cc & 0x7f) as usize] = Some(value.min(127));
    }

    pub fn clear_key_controllers(&mut self, note: u8) {
        if let Some(table) = self.key_controllers.as_mut() {
            table[(note & 0x7f) as usize] = [None; 128];
        }
    }
}

/// Synthesizer-wide controls.
#[derive(Clone, Debug)]
pub struct MasterControls {
    /// 0..=16383
    pub volume: u16,
    /// 0..=16383, centre 8192
    pub balance: u16,
    /// Cents, -100..=100
    pub fine_tuning: f64,
    /// Semitones, -64..=63
    pub coarse_tuning: i8,
}

impl Default for MasterControls {
    fn default() -> Self {
        Self {
            volume: 16383,
            balance: 8192,
            fine_tuning: 0.0,
            coarse_tuning: 0,
        }
    }
}

impl MasterControls {
    pub fn fine_tuning_value(&self) -> f64 {
        (self.fine_tuning.clamp(-100.0, 100.0) + 100.0) / 200.0
    }

    pub fn coarse_tuning_value(&self) -> f64 {
        (self.coarse_tuning.clamp(-64, 63) as f64 + 64.0) / 128.0
    }

    /// Linear output gain.
    pub fn gain(&self) -> f32 {
        self.volume.min(16383) as f32 / 16383.0
    }

    /// Left/right multipliers. Centre leaves both at unity.
    pub fn balance_gains(&self) -> (f32, f32) {
        let b = self.balance.min(16383) as f32 / 16384.0;
        ((2.0 * (1.0 - b)).min(1.0), (2.0 * b).min(1.0))
    }
}

/// Everything a voice reads while evaluating its connections.
pub struct SourceContext<'a> {
    pub controls: &'a ChannelControls,
    pub master: &'a MasterControls,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn power_on_values() {
        let c = ChannelControls::default();
        assert_eq!(c.cc[7], 100);
        assert_eq!(c.cc[10], 64);
        assert_eq!(c.cc[11], 127);
        assert_eq!(c.cc[91], 40);
        assert_eq!(c.cc[1], 0);
        assert_eq!(c.rpn_raw(0), 256);
        assert_abs_diff_eq!(c.bend_value(), 0.5);
    }

    #[test]
    fn fourteen_bit_controllers_combine_lsb() {
        let mut c = ChannelControls::default();
        c.cc[1] = 64;
        c.cc[33] = 64;
        assert_abs_diff_eq!(c.cc_value(60, 1), ((64 << 7) | 64) as f64 / 16384.0);
        c.cc[70] = 32;
        assert_abs_diff_eq!(c.cc_value(60, 70), 0.25);
    }

    #[test]
    fn key_controller_overrides_one_note() {
        let mut c = ChannelControls::default();
        c.set_key_controller(60, 7, 20);
        assert_eq!(c.controller(60, 7), 20);
        assert_eq!(c.controller(61, 7), 100);
        c.clear_key_controllers(60);
        assert_eq!(c.controller(60, 7), 100);
    }

    #[test]
    fn params_default_until_written() {
        let mut c = ChannelControls::default();
        assert_eq!(c.param_raw(false, 1), 8192);
        assert_eq!(c.param_raw(true, 1), 0);
        c.set_param(true, 1, 20000);
        assert_eq!(c.param_raw(true, 1), 16383);
    }

    #[test]
    fn master_defaults_are_neutral() {
        let m = MasterControls::default();
        assert_eq!(m.gain(), 1.0);
        assert_eq!(m.balance_gains(), (1.0, 1.0));
        assert_abs_diff_eq!(m.fine_tuning_value(), 0.5);
        assert_abs_diff_eq!(m.coarse_tuning_value(), 0.5);
    }

    #[test]
    fn hard_balance_mutes_one_side() {
        let m = MasterControls { balance: 0, ..Default::default() };
        assert_eq!(m.balance_gains(), (1.0, 0.0));
    }
}
