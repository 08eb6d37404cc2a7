//! Instrument contract consumed by the solver.

use crate::error::CalibrationError;
use crate::graph::CurveGraph;
use pricer_core::types::DualNumber;

/// A market quote the solver can reprice.
///
/// `price` must be a pure function of the graph's current node values. Its
/// gradient with respect to the node variables becomes one row of the
/// Jacobian, so the instrument must compute through `DualNumber` arithmetic
/// end to end. The residual is `price.real() - target_quote()`.
///
/// Instruments are priced concurrently within an iteration, hence the
/// `Send + Sync` bound.
pub trait CalibrationInstrument: Send + Sync {
    /// Price against the current curves.
    fn price(&self, graph: &CurveGraph) -> Result<DualNumber, CalibrationError>;

    /// Observed market value the price should match.
    fn target_quote(&self) -> f64;

    /// Human-readable label used in reports and errors.
    fn label(&self) -> Option<&str> {
        None
    }
}
