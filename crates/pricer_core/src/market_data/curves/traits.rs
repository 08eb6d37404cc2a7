//! Yield curve trait definition.

use super::{Curve, CurveKind};
use crate::market_data::error::MarketDataError;
use crate::types::DualNumber;

/// Discount factor and rate queries with node sensitivities.
///
/// # Contract
///
/// - `discount_factor(t)` returns the discount factor D(t) for maturity t
/// - `zero_rate(t)` returns the continuously compounded zero rate r(t)
/// - `forward_rate(t1, t2)` returns the continuously compounded forward rate
/// - `simple_forward_rate(t1, t2)` returns the simply compounded forward rate
///
/// Every result is a [`DualNumber`], so rates carry the derivative with
/// respect to every node variable that enters D(t).
pub trait YieldCurve {
    /// Return the discount factor for maturity `t`.
    fn discount_factor(&self, t: f64) -> Result<DualNumber, MarketDataError>;

    /// Return the continuously compounded zero rate for maturity `t`.
    ///
    /// # Default Implementation
    ///
    /// ```text
    /// r(t) = -ln(D(t)) / t
    /// ```
    fn zero_rate(&self, t: f64) -> Result<DualNumber, MarketDataError> {
        if !(t > 0.0) {
            return Err(MarketDataError::InvalidMaturity { t });
        }
        let df = self.discount_factor(t)?;
        Ok((-df.ln()?).checked_div_f64(t)?)
    }

    /// Return the continuously compounded forward rate between `t1` and `t2`.
    ///
    /// # Default Implementation
    ///
    /// ```text
    /// f(t1, t2) = (ln D(t1) - ln D(t2)) / (t2 - t1)
    /// ```
    fn forward_rate(&self, t1: f64, t2: f64) -> Result<DualNumber, MarketDataError> {
        let dt = t2 - t1;
        if !(dt > 0.0) {
            return Err(MarketDataError::InvalidMaturity { t: dt });
        }
        let df1 = self.discount_factor(t1)?;
        let df2 = self.discount_factor(t2)?;
        Ok((df1.ln()? - df2.ln()?).checked_div_f64(dt)?)
    }

    /// Return the simply compounded forward rate between `t1` and `t2`.
    ///
    /// # Default Implementation
    ///
    /// ```text
    /// F(t1, t2) = (D(t1) / D(t2) - 1) / (t2 - t1)
    /// ```
    fn simple_forward_rate(&self, t1: f64, t2: f64) -> Result<DualNumber, MarketDataError> {
        let dt = t2 - t1;
        if !(dt > 0.0) {
            return Err(MarketDataError::InvalidMaturity { t: dt });
        }
        let df1 = self.discount_factor(t1)?;
        let df2 = self.discount_factor(t2)?;
        Ok((df1.checked_div(&df2)? - 1.0).checked_div_f64(dt)?)
    }
}

impl YieldCurve for Curve {
    /// Node values of a discount curve are discount factors.
    ///
    /// # Errors
    ///
    /// `WrongCurveKind` for line curves.
    fn discount_factor(&self, t: f64) -> Result<DualNumber, MarketDataError> {
        if self.kind() != CurveKind::Discount {
            return Err(MarketDataError::WrongCurveKind {
                curve: self.id().to_string(),
                expected: CurveKind::Discount,
            });
        }
        self.value_at(t)
    }
}
