//! Assertion helpers for test bodies.
//!
//! Each helper returns a [`TestFault::Failure`] instead of panicking, so a failed check is recorded
//! as a `Fail` result and the run continues:
//!
//! ```rust,ignore
//! fn periodic(&mut self, _cx: &mut TestContext<'_>) -> TestResult {
//!     check::ensure_eq(2 + 2, 4)?;
//!     check::approx_eq(self.encoder.distance(), 1.0)
//! }
//! ```

use std::fmt::Debug;

use super::{TestFault, TestResult};

/// Relative tolerance used by [`approx_eq`]: one part in a million.
pub const DEFAULT_RELATIVE_TOLERANCE: f64 = 1e-6;

/// Fail with `message` unless `condition` holds.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(TestFault::failure(message))
    }
}

/// [`ensure`] with a generic message.
pub fn ensure_true(condition: bool) -> TestResult {
    ensure(condition, "Assertion failed")
}

/// Fail unless `left == right`.
pub fn ensure_eq<T: PartialEq + Debug>(left: T, right: T) -> TestResult {
    if left == right {
        Ok(())
    } else {
        Err(TestFault::Failure(format!("{:?} was not equal to {:?}", left, right)))
    }
}

/// Fail unless `left != right`.
pub fn ensure_ne<T: PartialEq + Debug>(left: T, right: T) -> TestResult {
    if left != right {
        Ok(())
    } else {
        Err(TestFault::Failure(format!("{:?} was equal to {:?}", left, right)))
    }
}

/// Fail unless `a` and `b` differ by at most `tolerance`.
pub fn approx_eq_within(a: f64, b: f64, tolerance: f64, message: impl Into<String>) -> TestResult {
    // NaN never compares within tolerance
    if (a - b).abs() <= tolerance {
        Ok(())
    } else {
        Err(TestFault::failure(message))
    }
}

/// Fail unless `a` and `b` agree to within one part in a million of their mean.
pub fn approx_eq(a: f64, b: f64) -> TestResult {
    let tolerance = ((a + b) / 2.0).abs() * DEFAULT_RELATIVE_TOLERANCE;
    approx_eq_within(a, b, tolerance, format!("{} was not equal to {}", a, b))
}

/// Explicitly fail with `message`.
pub fn fail<T>(message: impl Into<String>) -> TestResult<T> {
    Err(TestFault::failure(message))
}
