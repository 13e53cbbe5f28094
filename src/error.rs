//! Error taxonomy.
//!
//! Configuration misuse fails fast (the stabilizing transform divides by the
//! noise gain, so a non-positive gain would silently produce NaNs downstream).
//! Data-level problems such as mosaic coverage gaps are *not* errors; they
//! propagate as undefined samples and an `incomplete` signal instead.

use thiserror::Error;

/// Errors surfaced by surface construction, configuration validation and I/O.
#[derive(Debug, Error)]
pub enum RawtrousError {
    /// Noise model with a non-positive gain. The forward transform divides
    /// by `a`, so this must be rejected up front.
    #[error("noise model gain must be positive, got a = {a}")]
    InvalidNoiseModel { a: f64 },

    /// A configuration struct failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation received a surface in the wrong storage mode.
    #[error("surface mode mismatch: expected {expected}, got {actual}")]
    ModeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    /// Surfaces passed to one pyramid operation must share dimensions.
    #[error("surface dimensions {got_w}x{got_h} do not match expected {want_w}x{want_h}")]
    DimensionMismatch {
        want_w: usize,
        want_h: usize,
        got_w: usize,
        got_h: usize,
    },

    /// Channel index outside the three mosaic channels.
    #[error("channel index {0} out of range (expected 0..3)")]
    ChannelOutOfRange(usize),

    /// Underlying I/O failure while loading or writing pixel files.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A pixel file did not match its expected format.
    #[error("malformed {format} data: {reason}")]
    Malformed {
        format: &'static str,
        reason: String,
    },
}

pub type Result<T> = std::result::Result<T, RawtrousError>;
