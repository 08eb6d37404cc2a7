//! Error types for structured error handling.
//!
//! This module provides:
//! - `DomainError`: A real-valued function applied outside its domain
//! - `InterpolationError`: Errors from interpolation operations

use thiserror::Error;

/// A real-valued function evaluated outside its real domain.
///
/// Raised by the fallible [`DualNumber`](crate::types::dual::DualNumber)
/// operations (`ln`, `sqrt`, `recip`, `checked_div`, powers). The offending
/// argument is the real part that violated the restriction.
///
/// # Examples
/// ```
/// use pricer_core::types::DomainError;
///
/// let err = DomainError::new("ln", -1.0);
/// assert_eq!(format!("{}", err), "ln is undefined at -1");
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{function} is undefined at {argument}")]
pub struct DomainError {
    /// Name of the function that was applied
    pub function: &'static str,
    /// Real argument outside the domain
    pub argument: f64,
}

impl DomainError {
    /// Create a domain error for `function` at `argument`.
    pub fn new(function: &'static str, argument: f64) -> Self {
        Self { function, argument }
    }
}

/// Interpolation-related errors.
///
/// # Variants
/// - `OutOfDomain`: Query point outside the interpolation domain
/// - `InsufficientData`: Not enough nodes for the selected scheme
/// - `NonIncreasing`: Node positions not strictly increasing
/// - `LengthMismatch`: Positions and values of different lengths
/// - `Domain`: A node value outside the domain of the scheme's transform
///
/// # Examples
/// ```
/// use pricer_core::types::InterpolationError;
///
/// let err = InterpolationError::OutOfDomain { x: 5.0, min: 0.0, max: 3.0 };
/// assert!(format!("{}", err).contains("outside valid domain"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum InterpolationError {
    /// Query point outside valid interpolation domain.
    #[error("Query point {x} outside valid domain [{min}, {max}]")]
    OutOfDomain {
        /// The query point
        x: f64,
        /// First node position
        min: f64,
        /// Last node position
        max: f64,
    },

    /// Insufficient nodes for interpolation.
    #[error("Insufficient data points: got {got}, need at least {need}")]
    InsufficientData {
        /// Number of nodes provided
        got: usize,
        /// Minimum number of nodes required
        need: usize,
    },

    /// Node positions are not strictly increasing.
    #[error("Node positions not strictly increasing at index {index}: {previous} then {position}")]
    NonIncreasing {
        /// Index of the offending node
        index: usize,
        /// Position of the preceding node
        previous: f64,
        /// Offending position
        position: f64,
    },

    /// Positions and values have different lengths.
    #[error("Length mismatch: {positions} positions, {values} values")]
    LengthMismatch {
        /// Number of positions
        positions: usize,
        /// Number of values
        values: usize,
    },

    /// Node value outside the domain of the scheme's transform.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_error_display() {
        let err = DomainError::new("sqrt", -4.0);
        assert_eq!(err.to_string(), "sqrt is undefined at -4");
    }

    #[test]
    fn test_interpolation_error_from_domain() {
        let err: InterpolationError = DomainError::new("ln", 0.0).into();
        assert!(matches!(err, InterpolationError::Domain(_)));
        assert!(err.to_string().contains("ln is undefined at 0"));
    }

    #[test]
    fn test_non_increasing_display() {
        let err = InterpolationError::NonIncreasing {
            index: 2,
            previous: 1.0,
            position: 1.0,
        };
        assert!(err.to_string().contains("index 2"));
    }
}
