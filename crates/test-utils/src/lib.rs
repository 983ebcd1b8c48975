//! Shared test utilities for the DAL query workspace.
//!
//! This crate provides common testing infrastructure including:
//! - A small fixed image catalog with known positions
//! - Row generators for larger synthetic catalogs
//! - In-memory stand-ins for the catalog executor, dataset locator and
//!   cutout task
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, MemoryExecutor};
//! ```

pub mod doubles;
pub mod fixtures;
pub mod generators;

// Re-export commonly used items at the crate root
pub use doubles::*;
pub use fixtures::*;
pub use generators::*;

/// Assert that two floating-point values lie within `epsilon` of each
/// other. NaN on either side always fails.
///
/// ```
/// use test_utils::assert_approx_eq;
///
/// assert_approx_eq!(51544.5000001, 51544.5, 1e-6);
/// assert_approx_eq!(0.1 + 0.2, 0.3);
/// ```
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr $(,)?) => {
        $crate::assert_approx_eq!($left, $right, 1e-9)
    };
    ($left:expr, $right:expr, $epsilon:expr $(,)?) => {{
        let (left, right, epsilon) = ($left as f64, $right as f64, $epsilon as f64);
        if !((left - right).abs() <= epsilon) {
            panic!(
                "values differ by more than {}: {} vs {}",
                epsilon, left, right
            );
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_within_epsilon() {
        assert_approx_eq!(359.9999, 360.0, 1e-3);
        assert_approx_eq!(-0.0, 0.0);
    }

    #[test]
    #[should_panic(expected = "values differ")]
    fn test_outside_epsilon() {
        assert_approx_eq!(29.9, 30.0, 0.01);
    }

    #[test]
    #[should_panic(expected = "values differ")]
    fn test_nan_never_matches() {
        assert_approx_eq!(f64::NAN, f64::NAN, 1.0);
    }
}
