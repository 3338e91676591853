//! Float trait abstraction for f32/f64 support.
//!
//! Every table, accumulator and field in the crate is generic over
//! [`NlmFloat`], so the same denoiser runs in single or double precision.

use num_traits::{Float, FromPrimitive, NumAssign};
use std::fmt::Debug;
use std::iter::Sum;

/// Trait alias for floating point types supported by the denoiser.
///
/// This trait combines all the bounds needed by the environment tables and
/// the pairwise pass:
/// - Basic float operations (Float, NumAssign)
/// - Conversion from primitive types (FromPrimitive)
/// - Iteration support (Sum)
/// - Sharing across rayon workers (Send + Sync)
pub trait NlmFloat:
    Float + FromPrimitive + NumAssign + Sum + Debug + Send + Sync + 'static
{
    /// Size of one value in bytes, used for memory footprint estimates.
    const BYTES: usize;

    /// Create a value from an f64 constant.
    fn from_f64_c(val: f64) -> Self;

    /// Create a value from a usize constant.
    fn usize_as(val: usize) -> Self;

    /// Create a value from an isize constant.
    fn isize_as(val: isize) -> Self;
}

impl NlmFloat for f32 {
    const BYTES: usize = 4;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val as f32
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f32
    }

    #[inline]
    fn isize_as(val: isize) -> Self {
        val as f32
    }
}

impl NlmFloat for f64 {
    const BYTES: usize = 8;

    #[inline]
    fn from_f64_c(val: f64) -> Self {
        val
    }

    #[inline]
    fn usize_as(val: usize) -> Self {
        val as f64
    }

    #[inline]
    fn isize_as(val: isize) -> Self {
        val as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_f32_trait_impl() {
        let val: f32 = NlmFloat::from_f64_c(0.125);
        assert_eq!(val, 0.125f32);

        let usize_val: f32 = NlmFloat::usize_as(42);
        assert_eq!(usize_val, 42.0f32);

        let isize_val: f32 = NlmFloat::isize_as(-5);
        assert_eq!(isize_val, -5.0f32);
    }

    #[test]
    fn test_f64_trait_impl() {
        let val: f64 = NlmFloat::from_f64_c(std::f64::consts::E);
        assert!((val - std::f64::consts::E).abs() < 1e-15);

        let usize_val: f64 = NlmFloat::usize_as(42);
        assert_eq!(usize_val, 42.0f64);

        let isize_val: f64 = NlmFloat::isize_as(-5);
        assert_eq!(isize_val, -5.0f64);
    }

    #[test]
    fn test_byte_sizes() {
        assert_eq!(<f32 as NlmFloat>::BYTES, std::mem::size_of::<f32>());
        assert_eq!(<f64 as NlmFloat>::BYTES, std::mem::size_of::<f64>());
    }
}
