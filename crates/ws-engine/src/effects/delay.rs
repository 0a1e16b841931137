//! Fixed-capacity fractional delay line.

/// Ring buffer sized once at construction.
#[derive(Clone, Debug)]
pub struct DelayLine {
    buf: Vec<f32>,
    pos: usize,
}

impl DelayLine {
    /// A line that can delay by up to `capacity - 1` frames.
    pub fn new(capacity: usize) -> Self {
        Self {
            buf: vec![0.0; capacity.max(2)],
            pos: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.fill(0.0);
        self.pos = 0;
    }

    pub fn write(&mut self, x: f32) {
        self.buf[self.pos] = x;
        self.pos = (self.pos + 1) % self.buf.len();
    }

    /// Sample written `delay` frames before the most recent one, linearly
    /// interpolated. Clamped to the line's capacity.
    pub fn read(&self, delay: f32) -> f32 {
        let len = self.buf.len();
        let delay = delay.clamp(0.0, (len - 2) as f32);
        let whole = delay as usize;
        let frac = delay - whole as f32;
        let newest = (self.pos + len - 1) % len;
        let a = self.buf[(newest + len - whole) % len];
        let b = self.buf[(newest + len - whole - 1) % len];
        a + (b - a) * frac
    }
}
