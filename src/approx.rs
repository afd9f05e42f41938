//! Graded approximate equality of floating point values.
//!
//! Used by [`gradcheck`](crate::gradcheck) to report how closely an analytic
//! gradient matches its finite-difference estimate.

use crate::tensors::Ten64;

/// The max absolute difference still considered [`ApproxEquality::Relative`].
pub const F64_MAX_ERROR: f64 = 1e-3;

/// The max absolute difference still considered [`ApproxEquality::Partial`].
pub const F64_AVG_ERROR: f64 = 1e-6;

/// The max absolute difference still considered [`ApproxEquality::Precise`].
pub const F64_MIN_ERROR: f64 = 1e-13;

/// The approximated equality enumerated, best first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ApproxEquality {
    /// Very strong epsilon.
    Precise = 0,

    /// Good epsilon.
    Partial = 1,

    /// Acceptable epsilon.
    Relative = 2,

    /// No relative equality.
    Scarce = 3,
}

impl ApproxEquality {
    /// Grades an absolute difference.
    #[must_use]
    pub fn of_difference(dif: f64) -> Self {
        if dif < F64_MIN_ERROR {
            Self::Precise
        } else if dif < F64_AVG_ERROR {
            Self::Partial
        } else if dif < F64_MAX_ERROR {
            Self::Relative
        } else {
            // NaN lands here too
            Self::Scarce
        }
    }
}

/// Checks the distance between two values against the graded epsilons.
pub trait RelativeEq<Rhs: ?Sized> {
    /// Grades the equality of `self` and `rhs`.
    fn approx_eq(&self, rhs: &Rhs) -> ApproxEquality;
}

impl RelativeEq<Self> for f64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        ApproxEquality::of_difference((self - rhs).abs())
    }
}

/// A collection is only as equal as its worst pair.
impl<T: RelativeEq<U>, U> RelativeEq<[U]> for [T] {
    fn approx_eq(&self, rhs: &[U]) -> ApproxEquality {
        if self.len() != rhs.len() {
            return ApproxEquality::Scarce;
        }
        self.iter()
            .zip(rhs)
            .map(|(t, u)| t.approx_eq(u))
            .max()
            .unwrap_or(ApproxEquality::Precise)
    }
}

impl RelativeEq<Self> for Ten64 {
    fn approx_eq(&self, rhs: &Self) -> ApproxEquality {
        if self.shape != rhs.shape {
            return ApproxEquality::Scarce;
        }
        self.data.as_slice().approx_eq(rhs.data.as_slice())
    }
}

/// Whether `a` and `b` are equal to within [`F64_MIN_ERROR`].
pub fn approx_eq<A: RelativeEq<B> + ?Sized, B: ?Sized>(a: &A, b: &B) -> bool {
    a.approx_eq(b) == ApproxEquality::Precise
}
