//! Wavetable playback with linear interpolation and loop handling.

use ws_model::{LoopType, Sample};

/// Playback cursor for one oscillator.
#[derive(Clone, Debug)]
pub struct Wavetable {
    /// Position in frames.
    pos: f64,
    forward: bool,
    /// Note released: `UntilRelease` loops stop looping.
    released: bool,
    ended: bool,
}

impl Default for Wavetable {
    fn default() -> Self {
        Self {
            pos: 0.0,
            forward: true,
            released: false,
            ended: false,
        }
    }
}

impl Wavetable {
    pub fn start(&mut self) {
        *self = Self::default();
    }

    pub fn release(&mut self) {
        self.released = true;
    }

    pub fn is_ended(&self) -> bool {
        self.ended
    }

    pub fn position(&self) -> f64 {
        self.pos
    }

    fn looping(&self, sample: &Sample) -> bool {
        sample.has_loop()
            && match sample.loop_type {
                LoopType::None => false,
                LoopType::Forward | LoopType::PingPong => true,
                LoopType::UntilRelease => !self.released,
            }
    }

    /// Add `gain`-scaled output to `out`, stepping `step` frames per sample.
    pub fn render(&mut self, sample: &Sample, step: f64, gain: f32, out: &mut [f32]) {
        let len = sample.len();
        if len == 0 {
            self.ended = true;
        }
        if self.ended {
            return;
        }
        let loop_start = sample.loop_start as f64;
        let loop_end = sample.loop_end as f64;

        for o in out.iter_mut() {
            let looping = self.looping(sample);
            let ix = self.pos as usize;
            let frac = (self.pos - ix as f64) as f32;
            let next = if looping && sample.loop_type != LoopType::PingPong && ix + 1 >= sample.loop_end as usize {
                sample.loop_start as usize
            } else {
                ix + 1
            };
            let a = sample.data.get(ix);
            let b = sample.data.get(next);
            *o += (a + (b - a) * frac) * gain;

            if self.forward {
                self.pos += step;
            } else {
                self.pos -= step;
            }

            if looping {
                let span = loop_end - loop_start;
                if sample.loop_type == LoopType::PingPong {
                    if self.forward && self.pos >= loop_end {
                        self.pos = (2.0 * loop_end - self.pos).max(loop_start);
                        self.forward = false;
                    } else if !self.forward && self.pos < loop_start {
                        self.pos = (2.0 * loop_start - self.pos).min(loop_end);
                        self.forward = true;
                    }
                } else if self.pos >= loop_end {
                    self.pos = loop_start + (self.pos - loop_start) % span;
                }
            } else if self.pos >= len as f64 {
                self.ended = true;
                break;
            }
        }
    }
}
