//! Floating point helpers for probability arithmetic, thin wrappers around the `approx` crate.

use approx::AbsDiffEq;

/// Tolerance used when checking that probabilities sum to at most one.
pub const PROBABILITY_TOLERANCE: f64 = 1e-9;

/// Compares if two floats are close via `approx::abs_diff_eq` using a maximum absolute difference
/// (epsilon) of `acc`.
#[must_use]
pub fn almost_eq(a: f64, b: f64, acc: f64) -> bool {
    if a.is_infinite() && b.is_infinite() {
        return a == b;
    }
    a.abs_diff_eq(&b, acc)
}

/// Returns true if `p` is a probability, i.e. a finite number in `[0, 1]`.
#[must_use]
pub fn is_probability(p: f64) -> bool {
    p.is_finite() && (0.0..=1.0).contains(&p)
}

/// Returns true if `total`, a sum of probabilities, does not exceed one beyond
/// `PROBABILITY_TOLERANCE`.
#[must_use]
pub fn sums_to_at_most_one(total: f64) -> bool {
    total <= 1.0 || almost_eq(total, 1.0, PROBABILITY_TOLERANCE)
}
