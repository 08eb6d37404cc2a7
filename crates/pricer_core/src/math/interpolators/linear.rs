//! Piecewise-linear interpolation in value, log-value and zero-rate space.
//!
//! Each function interpolates on the segment `[x0, x1]`; a query beyond `x1`
//! extends the same straight line in the scheme's transformed space.

use crate::types::{DomainError, DualNumber};

/// Linear in value: `y0 (1 - w) + y1 w` with `w = (x - x0) / (x1 - x0)`.
pub(super) fn linear(x0: f64, x1: f64, y0: &DualNumber, y1: &DualNumber, x: f64) -> DualNumber {
    let w = (x - x0) / (x1 - x0);
    y0 * (1.0 - w) + y1 * w
}

/// Linear in `ln y`, so a discount curve has a flat forward rate per segment.
pub(super) fn log_linear(
    x0: f64,
    x1: f64,
    y0: &DualNumber,
    y1: &DualNumber,
    x: f64,
) -> Result<DualNumber, DomainError> {
    Ok(linear(x0, x1, &y0.ln()?, &y1.ln()?, x).exp())
}

/// Linear in the continuously compounded zero rate `r(t) = -ln y / t`.
///
/// A node at `t = 0` has no zero rate of its own and borrows the rate of the
/// right-hand node.
pub(super) fn linear_zero_rate(
    x0: f64,
    x1: f64,
    y0: &DualNumber,
    y1: &DualNumber,
    x: f64,
) -> Result<DualNumber, DomainError> {
    let r1 = zero_rate(x1, y1)?;
    let r0 = if x0 == 0.0 {
        r1.clone()
    } else {
        zero_rate(x0, y0)?
    };
    Ok((linear(x0, x1, &r0, &r1, x) * -x).exp())
}

fn zero_rate(t: f64, y: &DualNumber) -> Result<DualNumber, DomainError> {
    if t == 0.0 {
        return Err(DomainError::new("zero_rate", t));
    }
    (-y.ln()?).checked_div_f64(t)
}
