//! DAHDSR envelope generator, advanced once per control cycle.

use crate::units::timecents_to_seconds;

/// Envelope segment.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EnvelopePhase {
    #[default]
    Delay,
    Attack,
    Hold,
    Decay,
    Sustain,
    Release,
    /// Forced fast fade used for stealing and exclusive classes.
    Shutdown,
    /// Output reached zero after release or shutdown.
    End,
}

/// Stage parameters in connection-model units.
///
/// Times are timecents, `sustain` is per-mille of full scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnvelopeParams {
    pub delay: f64,
    pub attack: f64,
    pub hold: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
    pub shutdown: f64,
}

impl EnvelopeParams {
    /// Read the seven stage slots of one EG.
    pub fn from_slots(slots: &[f64]) -> Self {
        Self {
            delay: slots[0],
            attack: slots[1],
            hold: slots[2],
            decay: slots[3],
            sustain: slots[4],
            release: slots[5],
            shutdown: slots[6],
        }
    }

    fn sustain_level(&self) -> f64 {
        (self.sustain / 1000.0).clamp(0.0, 1.0)
    }
}

/// Runtime state for one envelope.
///
/// Output is linear `0.0..=1.0`. Attack, decay and release move at a
/// full-scale rate, so a decay to 50% sustain takes half the decay time.
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    phase: EnvelopePhase,
    /// Seconds spent in the current timed phase.
    elapsed: f64,
    value: f64,
}

impl Envelope {
    /// Current output.
    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn phase(&self) -> EnvelopePhase {
        self.phase
    }

    pub fn is_finished(&self) -> bool {
        self.phase == EnvelopePhase::End
    }

    /// Restart from the delay phase.
    pub fn start(&mut self) {
        *self = Self::default();
    }

    /// Gate off: enter release unless already fading.
    pub fn release(&mut self) {
        if matches!(
            self.phase,
            EnvelopePhase::Delay | EnvelopePhase::Attack | EnvelopePhase::Hold | EnvelopePhase::Decay | EnvelopePhase::Sustain
        ) {
            self.phase = EnvelopePhase::Release;
            self.elapsed = 0.0;
        }
    }

    /// Force a fast fade to silence.
    pub fn shutdown(&mut self) {
        if self.phase != EnvelopePhase::End {
            self.phase = EnvelopePhase::Shutdown;
            self.elapsed = 0.0;
        }
    }

    /// Advance by `dt` seconds.
    pub fn advance(&mut self, params: &EnvelopeParams, dt: f64) {
        let mut remaining = dt;
        while remaining > 0.0 {
            match self.phase {
                EnvelopePhase::Delay => {
                    remaining = self.timed(timecents_to_seconds(params.delay), remaining, EnvelopePhase::Attack);
                }
                EnvelopePhase::Attack => {
                    remaining = self.ramp(1.0, timecents_to_seconds(params.attack), remaining);
                    if self.value >= 1.0 {
                        self.phase = EnvelopePhase::Hold;
                    }
                }
                EnvelopePhase::Hold => {
                    remaining = self.timed(timecents_to_seconds(params.hold), remaining, EnvelopePhase::Decay);
                }
                EnvelopePhase::Decay => {
                    let sustain = params.sustain_level();
                    remaining = self.ramp(sustain, timecents_to_seconds(params.decay), remaining);
                    if self.value <= sustain {
                        self.phase = EnvelopePhase::Sustain;
                    }
                }
                EnvelopePhase::Sustain => {
                    self.value = self.value.min(params.sustain_level());
                    return;
                }
                EnvelopePhase::Release | EnvelopePhase::Shutdown => {
                    let time = if self.phase == EnvelopePhase::Release {
                        params.release
                    } else {
                        params.shutdown
                    };
                    remaining = self.ramp(0.0, timecents_to_seconds(time), remaining);
                    if self.value <= 0.0 {
                        self.phase = EnvelopePhase::End;
                    }
                }
                EnvelopePhase::End => {
                    self.value = 0.0;
                    return;
                }
            }
        }
    }

    /// Stay in a timed phase; returns leftover time once it has elapsed.
    fn timed(&mut self, duration: f64, dt: f64, next: EnvelopePhase) -> f64 {
        let left = duration - self.elapsed;
        if dt < left {
            self.elapsed += dt;
            return 0.0;
        }
        self.elapsed = 0.0;
        self.phase = next;
        dt - left.max(0.0)
    }

    /// Move toward `target` at full scale per `duration`; returns leftover time.
    fn ramp(&mut self, target: f64, duration: f64, dt: f64) -> f64 {
        let rate = 1.0 / duration.max(1e-9);
        let distance = (target - self.value).abs();
        let needed = distance / rate;
        if dt < needed {
            self.value += (target - self.value).signum() * rate * dt;
            return 0.0;
        }
        self.value = target;
        dt - needed
    }
}
