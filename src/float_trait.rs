//! Float trait abstraction for f32/f64 support.
//!
//! All numeric code in this crate is generic over a single trait so that the
//! same pyramid can run in single precision (the common case for camera raws)
//! or double precision (useful when validating the variance-stabilizing
//! transform against its closed forms).

use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::{Debug, Display};
use std::iter::Sum;

/// Trait alias for floating point types supported by the pyramid.
///
/// Combines the bounds needed throughout the crate:
/// - Basic float operations (`Float`, `NumAssign`)
/// - Conversion from primitive types (`FromPrimitive`)
/// - Iteration support (`Sum`)
/// - Thread safety for the row-parallel loops
pub trait RawFloat:
    Float + FromPrimitive + NumAssign + Sum + Debug + Display + Send + Sync + 'static
{
    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize count.
    fn usize_as(val: usize) -> Self;
}

impl RawFloat for f32 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }
}

impl RawFloat for f64 {
    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_trait_impl() {
        let val: f32 = RawFloat::from_f64_c(0.5);
        assert_eq!(val, 0.5f32);

        let usize_val: f32 = RawFloat::usize_as(42);
        assert_eq!(usize_val, 42.0f32);
    }

    #[test]
    fn test_f64_trait_impl() {
        let val: f64 = RawFloat::from_f64_c(std::f64::consts::PI);
        assert!((val - std::f64::consts::PI).abs() < 1e-15);

        let usize_val: f64 = RawFloat::usize_as(42);
        assert_eq!(usize_val, 42.0f64);
    }
}
