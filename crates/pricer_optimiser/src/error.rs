//! Error types for curve graph assembly and calibration.

use crate::calibration::ConfigError;
use pricer_core::market_data::MarketDataError;
use pricer_core::types::DomainError;
use thiserror::Error;

/// Calibration error types.
///
/// # Variants
///
/// - Graph construction: `DuplicateCurve`, `UnknownCurve`,
///   `CyclicDependency`, `UndeclaredDependency`, `InvalidConstruction`
/// - Solver failures: `SingularJacobian`, `NonConvergence`
/// - Pricing: `Instrument` wraps whatever an instrument's `price` raised
/// - Wrapped: `MarketData`, `Domain`, `Config`
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// A curve with this identifier is already in the graph.
    #[error("Curve '{curve}' is already in the graph")]
    DuplicateCurve {
        /// Curve identifier
        curve: String,
    },

    /// Reference to a curve that is not in the graph.
    #[error("Unknown curve '{curve}'")]
    UnknownCurve {
        /// Curve identifier
        curve: String,
    },

    /// The declared dependencies contain a cycle.
    #[error("Cyclic dependency among curves {curves:?}")]
    CyclicDependency {
        /// Curves on the cycle, each depending on the next
        curves: Vec<String>,
    },

    /// A curve read another curve it does not (transitively) depend on.
    #[error("Curve '{from}' has no declared dependency on '{to}'")]
    UndeclaredDependency {
        /// Curve doing the read
        from: String,
        /// Curve being read
        to: String,
    },

    /// The calibration problem is malformed.
    #[error("Invalid calibration setup: {reason}")]
    InvalidConstruction {
        /// What was wrong
        reason: String,
    },

    /// The Jacobian lost rank; the listed variables have no sensitivity.
    #[error(
        "Singular Jacobian at iteration {iteration}: rank {rank} < {expected} (unconstrained: {variables:?})"
    )]
    SingularJacobian {
        /// Iteration at which the rank check failed
        iteration: usize,
        /// Numerical rank
        rank: usize,
        /// Required rank, `min(instruments, variables)`
        expected: usize,
        /// Labels of variables whose Jacobian column is zero
        variables: Vec<String>,
    },

    /// Iteration limit reached above tolerance.
    #[error("Failed to converge after {iterations} iterations: residual norm = {residual_norm}")]
    NonConvergence {
        /// Iterations performed
        iterations: usize,
        /// Weighted residual norm at the last iterate
        residual_norm: f64,
    },

    /// An instrument failed to price.
    #[error("Instrument {index} ('{label}') failed to price: {source}")]
    Instrument {
        /// Position in the instrument slice
        index: usize,
        /// Instrument label
        label: String,
        /// Underlying failure
        source: Box<CalibrationError>,
    },

    /// Wrapped market data error.
    #[error("Market data error: {0}")]
    MarketData(#[from] MarketDataError),

    /// Wrapped domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Wrapped configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl CalibrationError {
    /// Create an invalid construction error.
    pub fn invalid_construction(reason: impl Into<String>) -> Self {
        Self::InvalidConstruction {
            reason: reason.into(),
        }
    }

    /// Create an unknown curve error.
    pub fn unknown_curve(curve: impl Into<String>) -> Self {
        Self::UnknownCurve {
            curve: curve.into(),
        }
    }

    /// Returns `true` when the solver ran but could not produce a solution
    /// from the supplied quotes.
    pub fn is_market_failure(&self) -> bool {
        matches!(
            self,
            Self::SingularJacobian { .. } | Self::NonConvergence { .. }
        )
    }

    /// Returns `true` for errors that indicate a wiring bug rather than bad
    /// market data.
    pub fn is_construction_error(&self) -> bool {
        match self {
            Self::DuplicateCurve { .. }
            | Self::UnknownCurve { .. }
            | Self::CyclicDependency { .. }
            | Self::UndeclaredDependency { .. }
            | Self::InvalidConstruction { .. }
            | Self::Config(_) => true,
            Self::MarketData(e) => e.is_construction_error(),
            Self::Instrument { source, .. } => source.is_construction_error(),
            _ => false,
        }
    }

    /// Check if this is a cyclic dependency error.
    pub fn is_cyclic_dependency(&self) -> bool {
        matches!(self, Self::CyclicDependency { .. })
    }

    /// Check if this is a singular Jacobian error.
    pub fn is_singular_jacobian(&self) -> bool {
        matches!(self, Self::SingularJacobian { .. })
    }

    /// Check if this is a non-convergence error.
    pub fn is_non_convergence(&self) -> bool {
        matches!(self, Self::NonConvergence { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_convergence_display() {
        let err = CalibrationError::NonConvergence {
            iterations: 100,
            residual_norm: 0.001,
        };
        let display = format!("{}", err);
        assert!(display.contains("100"));
        assert!(display.contains("0.001"));
        assert!(err.is_market_failure());
        assert!(!err.is_construction_error());
    }

    #[test]
    fn test_singular_jacobian_lists_variables() {
        let err = CalibrationError::SingularJacobian {
            iteration: 0,
            rank: 1,
            expected: 2,
            variables: vec!["ois2".to_string()],
        };
        assert!(format!("{}", err).contains("ois2"));
        assert!(err.is_singular_jacobian());
        assert!(err.is_market_failure());
    }

    #[test]
    fn test_cycle_is_construction_error() {
        let err = CalibrationError::CyclicDependency {
            curves: vec!["a".into(), "b".into()],
        };
        assert!(err.is_cyclic_dependency());
        assert!(err.is_construction_error());
        assert!(!err.is_market_failure());
    }

    #[test]
    fn test_instrument_error_delegates_classification() {
        let inner = CalibrationError::MarketData(MarketDataError::InvalidMaturity { t: -1.0 });
        let err = CalibrationError::Instrument {
            index: 3,
            label: "5Y".into(),
            source: Box::new(inner),
        };
        assert!(!err.is_construction_error());
        assert!(format!("{}", err).contains("5Y"));

        let wiring = CalibrationError::Instrument {
            index: 0,
            label: "fra".into(),
            source: Box::new(CalibrationError::unknown_curve("libor")),
        };
        assert!(wiring.is_construction_error());
    }

    #[test]
    fn test_from_domain_error() {
        let err: CalibrationError = DomainError::new("ln", -0.5).into();
        assert!(matches!(err, CalibrationError::Domain(_)));
        assert!(format!("{}", err).contains("ln"));
    }
}
