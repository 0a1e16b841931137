//! Error types for ws-engine.

use thiserror::Error;

/// Result type alias for synthesizer operations.
pub type Result<T> = std::result::Result<T, SynthError>;

/// Errors surfaced by the synthesizer lifecycle.
///
/// Performance events never fail: out-of-range values are clamped and
/// requests that find no voice are dropped.
#[derive(Debug, Error)]
pub enum SynthError {
    /// `open()` called on an open synthesizer.
    #[error("synthesizer is already open")]
    AlreadyOpen,

    /// Operation requires an open synthesizer.
    #[error("synthesizer is not open")]
    NotOpen,

    /// Invalid configuration parameter.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
