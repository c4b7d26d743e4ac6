//! Scalar trait for tensor element types.

use std::fmt::Debug;
use std::ops::{Add, AddAssign, Mul, Sub};

use faer_traits::ComplexField;

/// Trait for the real element types supported by blockcoo.
///
/// Wraps faer's `ComplexField` (so tiles can go through faer's GEMM and SVD)
/// together with the arithmetic and ordering the sparse kernels need.
pub trait Scalar:
    ComplexField
    + Copy
    + Debug
    + Default
    + PartialEq
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + AddAssign
    + Send
    + Sync
    + 'static
{
    /// Returns the additive identity (zero).
    fn zero() -> Self {
        Self::default()
    }

    /// Returns the multiplicative identity (one).
    fn one() -> Self;

    /// Lossy conversion from `f64`.
    fn from_f64(value: f64) -> Self;

    /// Widening conversion to `f64`, used for norms.
    fn to_f64(self) -> f64;
}

impl Scalar for f64 {
    fn one() -> Self {
        1.0
    }

    fn from_f64(value: f64) -> Self {
        value
    }

    fn to_f64(self) -> f64 {
        self
    }
}

impl Scalar for f32 {
    fn one() -> Self {
        1.0
    }

    fn from_f64(value: f64) -> Self {
        value as f32
    }

    fn to_f64(self) -> f64 {
        self as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_one() {
        assert_eq!(<f64 as Scalar>::zero(), 0.0);
        assert_eq!(<f64 as Scalar>::one(), 1.0);
        assert_eq!(<f32 as Scalar>::zero(), 0.0);
        assert_eq!(<f32 as Scalar>::one(), 1.0);
    }

    #[test]
    fn test_f64_roundtrip() {
        assert_eq!(<f32 as Scalar>::from_f64(2.5).to_f64(), 2.5);
        assert_eq!(<f64 as Scalar>::from_f64(-1.25), -1.25);
    }
}
