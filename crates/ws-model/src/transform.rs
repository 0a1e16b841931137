//! Value transforms applied to modulation sources and destinations.
//!
//! A source value arrives normalised to `0.0..=1.0`. The standard transform
//! optionally flips it (direction), maps it to `-1.0..=1.0` (polarity), and
//! bends it through a curve (shape).

/// Which end of the controller range maps to the transform's maximum.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    MinToMax,
    MaxToMin,
}

/// Output range of a transform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Polarity {
    /// `0.0..=1.0`
    #[default]
    Unipolar,
    /// `-1.0..=1.0`
    Bipolar,
}

/// Curve applied after direction and polarity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shape {
    #[default]
    Linear,
    /// Slow start, fast finish (DLS concave: 20·log10 of the squared value, 96 dB range).
    Concave,
    /// Mirror image of `Concave`.
    Convex,
    /// On/off at the midpoint.
    Switch,
    /// Absolute value (meaningful for bipolar inputs).
    Absolute,
}

/// Log-curve constant shared by the concave and convex shapes: 5/12 / ln(10).
const CURVE_K: f64 = (5.0 / 12.0) / core::f64::consts::LN_10;

/// A source or destination transform.
#[derive(Clone, Copy, Debug)]
pub enum Transform {
    Standard {
        direction: Direction,
        polarity: Polarity,
        shape: Shape,
    },
    /// Arbitrary scalar mapping supplied by the soundbank.
    Custom(fn(f64) -> f64),
}

impl Default for Transform {
    fn default() -> Self {
        Self::LINEAR
    }
}

impl Transform {
    /// Identity: min→max, unipolar, linear.
    pub const LINEAR: Transform = Transform::standard(Direction::MinToMax, Polarity::Unipolar, Shape::Linear);

    /// Min→max, bipolar, linear.
    pub const BIPOLAR: Transform = Transform::standard(Direction::MinToMax, Polarity::Bipolar, Shape::Linear);

    pub const fn standard(direction: Direction, polarity: Polarity, shape: Shape) -> Self {
        Transform::Standard { direction, polarity, shape }
    }

    /// Apply the transform to a normalised value.
    pub fn apply(&self, value: f64) -> f64 {
        match *self {
            Transform::Custom(f) => f(value),
            Transform::Standard { direction, polarity, shape } => {
                let mut v = value;
                if direction == Direction::MaxToMin {
                    v = 1.0 - v;
                }
                if polarity == Polarity::Bipolar {
                    v = v * 2.0 - 1.0;
                }
                match shape {
                    Shape::Linear => v,
                    Shape::Concave => {
                        let a = -CURVE_K * libm::log(1.0 - v.abs());
                        libm::copysign(a.clamp(0.0, 1.0), v)
                    }
                    Shape::Convex => {
                        let a = 1.0 + CURVE_K * libm::log(v.abs());
                        libm::copysign(a.clamp(0.0, 1.0), v)
                    }
                    Shape::Switch => match polarity {
                        Polarity::Bipolar => {
                            if v > 0.0 {
                                1.0
                            } else {
                                -1.0
                            }
                        }
                        Polarity::Unipolar => {
                            if v > 0.5 {
                                1.0
                            } else {
                                0.0
                            }
                        }
                    },
                    Shape::Absolute => v.abs(),
                }
            }
        }
    }
}
