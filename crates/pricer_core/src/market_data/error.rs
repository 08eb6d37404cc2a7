//! Market data error types.
//!
//! This module provides structured error handling for curve construction,
//! lookups and node updates.

use crate::market_data::curves::CurveKind;
use crate::types::{DomainError, InterpolationError};
use thiserror::Error;

/// Market data operation errors.
///
/// # Variants
///
/// - `InvalidConstruction`: Curve built from unusable nodes
/// - `OutOfDomain`: Query outside the curve's permitted range
/// - `InvalidMaturity`: Non-positive maturity or period for a rate query
/// - `LengthMismatch`: Node update with the wrong number of values
/// - `WrongCurveKind`: Curve used in a role its kind does not support
/// - `Interpolation`: Wrapped interpolation error
/// - `Domain`: Wrapped domain error from dual arithmetic
///
/// # Examples
///
/// ```
/// use pricer_core::market_data::MarketDataError;
///
/// let err = MarketDataError::InvalidMaturity { t: -1.0 };
/// assert!(format!("{}", err).contains("-1"));
/// ```
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    /// Curve construction rejected.
    #[error("Invalid construction of curve '{curve}': {reason}")]
    InvalidConstruction {
        /// Curve identifier
        curve: String,
        /// What was wrong
        reason: String,
    },

    /// Query point outside the curve's domain.
    #[error("Curve '{curve}': position {position} outside domain [{min}, {max}]")]
    OutOfDomain {
        /// Curve identifier
        curve: String,
        /// The query position
        position: f64,
        /// First node position
        min: f64,
        /// Last node position
        max: f64,
    },

    /// Invalid maturity or accrual period.
    #[error("Invalid maturity: t = {t}")]
    InvalidMaturity {
        /// The invalid maturity value
        t: f64,
    },

    /// Node update with the wrong number of values.
    #[error("Curve '{curve}': expected {expected} node values, got {got}")]
    LengthMismatch {
        /// Curve identifier
        curve: String,
        /// Number of free nodes
        expected: usize,
        /// Number of values supplied
        got: usize,
    },

    /// Curve kind does not support the requested operation.
    #[error("Curve '{curve}' is not a {expected} curve")]
    WrongCurveKind {
        /// Curve identifier
        curve: String,
        /// Kind the operation requires
        expected: CurveKind,
    },

    /// Interpolation error.
    #[error("Interpolation error: {0}")]
    Interpolation(#[from] InterpolationError),

    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

impl MarketDataError {
    /// Returns `true` for errors that indicate a construction bug rather
    /// than a bad query.
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            MarketDataError::InvalidConstruction { .. } | MarketDataError::LengthMismatch { .. }
        )
    }
}
