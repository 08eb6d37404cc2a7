//! Reference calibration instruments.
//!
//! Deliberately simple quotes expressed directly in curve time (years), with
//! no calendar or day-count layer:
//!
//! - [`ZeroRateQuote`]: continuously compounded zero rate
//! - [`ParSwapQuote`]: par rate of a fixed/float swap, single-curve or with a
//!   separate forecast curve
//! - [`ForwardRateQuote`]: simply compounded forward rate
//! - [`CurveValueQuote`]: the curve value itself at a position

use super::instrument::CalibrationInstrument;
use crate::error::CalibrationError;
use crate::graph::CurveGraph;
use pricer_core::market_data::curves::{Curve, CurveId, CurveKind, YieldCurve};
use pricer_core::market_data::MarketDataError;
use pricer_core::types::DualNumber;

/// Payment frequency of a swap's legs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Frequency {
    /// One payment per year
    #[default]
    Annual,
    /// Two payments per year
    SemiAnnual,
    /// Four payments per year
    Quarterly,
}

impl Frequency {
    /// Number of payments per year.
    pub fn payments_per_year(&self) -> u32 {
        match self {
            Frequency::Annual => 1,
            Frequency::SemiAnnual => 2,
            Frequency::Quarterly => 4,
        }
    }

    /// Accrual period in years.
    pub fn period(&self) -> f64 {
        1.0 / f64::from(self.payments_per_year())
    }
}

/// Continuously compounded zero rate `-ln D(t) / t` on a discount curve.
///
/// # Examples
///
/// ```
/// use pricer_optimiser::calibration::{CalibrationInstrument, ZeroRateQuote};
///
/// let quote = ZeroRateQuote::new("ois", 2.0, 0.031).with_label("2Y");
/// assert_eq!(quote.target_quote(), 0.031);
/// assert_eq!(quote.label(), Some("2Y"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ZeroRateQuote {
    curve: CurveId,
    maturity: f64,
    rate: f64,
    label: Option<String>,
}

impl ZeroRateQuote {
    /// Quote `rate` for maturity `maturity` on discount curve `curve`.
    pub fn new(curve: impl Into<CurveId>, maturity: f64, rate: f64) -> Self {
        Self {
            curve: curve.into(),
            maturity,
            rate,
            label: None,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Maturity in years.
    pub fn maturity(&self) -> f64 {
        self.maturity
    }
}

impl CalibrationInstrument for ZeroRateQuote {
    fn price(&self, graph: &CurveGraph) -> Result<DualNumber, CalibrationError> {
        let view = graph.view(self.curve.as_str())?;
        Ok(view.curve().zero_rate(self.maturity)?)
    }

    fn target_quote(&self) -> f64 {
        self.rate
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Par rate of a fixed-for-floating swap starting today.
///
/// Both legs pay on the same schedule `tau, 2 tau, ..., T`. The par rate is
/// the float leg value over the annuity `sum tau D(t_k)`:
///
/// - single curve: float leg `D(0) - D(T)`
/// - discount forecast curve `F`: `sum D(t_k) (F(t_{k-1}) / F(t_k) - 1)`
/// - line forecast curve `L` of simple rates: `sum D(t_k) tau L(t_{k-1})`
///
/// With a forecast curve, the forecast curve must declare a dependency on
/// the discount curve in the graph.
#[derive(Debug, Clone, PartialEq)]
pub struct ParSwapQuote {
    discount: CurveId,
    forecast: Option<CurveId>,
    tenor: f64,
    frequency: Frequency,
    rate: f64,
    label: Option<String>,
}

impl ParSwapQuote {
    /// Annual swap of `tenor` years discounted and projected on `discount`.
    pub fn new(discount: impl Into<CurveId>, tenor: f64, rate: f64) -> Self {
        Self {
            discount: discount.into(),
            forecast: None,
            tenor,
            frequency: Frequency::Annual,
            rate,
            label: None,
        }
    }

    /// Project the float leg on a separate forecast curve.
    pub fn projected_on(mut self, forecast: impl Into<CurveId>) -> Self {
        self.forecast = Some(forecast.into());
        self
    }

    /// Set the payment frequency.
    pub fn with_frequency(mut self, frequency: Frequency) -> Self {
        self.frequency = frequency;
        self
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Tenor in years.
    pub fn tenor(&self) -> f64 {
        self.tenor
    }

    fn schedule(&self) -> Result<Vec<f64>, MarketDataError> {
        let tau = self.frequency.period();
        let periods = (self.tenor / tau).round();
        if !(periods >= 1.0) {
            return Err(MarketDataError::InvalidMaturity { t: self.tenor });
        }
        Ok((1..=periods as u32).map(|k| f64::from(k) * tau).collect())
    }

    fn float_leg(
        &self,
        discount: &Curve,
        forecast: Option<&Curve>,
        times: &[f64],
        dfs: &[DualNumber],
    ) -> Result<DualNumber, CalibrationError> {
        let tau = self.frequency.period();
        let Some(forecast) = forecast else {
            let last = dfs.last().cloned().unwrap_or_else(|| DualNumber::constant(1.0));
            return Ok(discount.discount_factor(0.0)? - last);
        };
        let mut leg = DualNumber::constant(0.0);
        let mut start = 0.0;
        for (&end, df) in times.iter().zip(dfs) {
            let coupon = match forecast.kind() {
                CurveKind::Discount => forecast.simple_forward_rate(start, end)? * tau,
                CurveKind::Line => forecast.value_at(start)? * tau,
            };
            leg = leg + coupon * df;
            start = end;
        }
        Ok(leg)
    }
}

impl CalibrationInstrument for ParSwapQuote {
    fn price(&self, graph: &CurveGraph) -> Result<DualNumber, CalibrationError> {
        let (discount, forecast) = match &self.forecast {
            Some(id) => {
                let view = graph.view(id.as_str())?;
                (view.dependency(self.discount.as_str())?, Some(view.curve()))
            }
            None => (graph.view(self.discount.as_str())?.curve(), None),
        };

        let times = self.schedule()?;
        let dfs = times
            .iter()
            .map(|&t| discount.discount_factor(t))
            .collect::<Result<Vec<_>, _>>()?;
        let annuity: DualNumber = dfs.iter().sum::<DualNumber>() * self.frequency.period();
        let float = self.float_leg(discount, forecast, &times, &dfs)?;
        Ok(float.checked_div(&annuity)?)
    }

    fn target_quote(&self) -> f64 {
        self.rate
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// Simply compounded forward rate over `[start, end]`.
///
/// On a discount curve this is `(D(start) / D(end) - 1) / (end - start)`; on
/// a line curve of forecast rates it is the curve value at `start`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForwardRateQuote {
    curve: CurveId,
    start: f64,
    end: f64,
    rate: f64,
    label: Option<String>,
}

impl ForwardRateQuote {
    /// Quote `rate` for the period `[start, end]` on `curve`.
    pub fn new(curve: impl Into<CurveId>, start: f64, end: f64, rate: f64) -> Self {
        Self {
            curve: curve.into(),
            start,
            end,
            rate,
            label: None,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl CalibrationInstrument for ForwardRateQuote {
    fn price(&self, graph: &CurveGraph) -> Result<DualNumber, CalibrationError> {
        let curve = graph.view(self.curve.as_str())?.curve();
        let rate = match curve.kind() {
            CurveKind::Discount => curve.simple_forward_rate(self.start, self.end)?,
            CurveKind::Line => curve.value_at(self.start)?,
        };
        Ok(rate)
    }

    fn target_quote(&self) -> f64 {
        self.rate
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

/// The interpolated curve value at a position.
#[derive(Debug, Clone, PartialEq)]
pub struct CurveValueQuote {
    curve: CurveId,
    position: f64,
    value: f64,
    label: Option<String>,
}

impl CurveValueQuote {
    /// Quote `value` for `curve` at `position`.
    pub fn new(curve: impl Into<CurveId>, position: f64, value: f64) -> Self {
        Self {
            curve: curve.into(),
            position,
            value,
            label: None,
        }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

impl CalibrationInstrument for CurveValueQuote {
    fn price(&self, graph: &CurveGraph) -> Result<DualNumber, CalibrationError> {
        let curve = graph.view(self.curve.as_str())?.curve();
        Ok(curve.value_at(self.position)?)
    }

    fn target_quote(&self) -> f64 {
        self.value
    }

    fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pricer_core::math::interpolators::Interpolation;
    use pricer_core::types::VariableSpace;

    fn flat_graph(rate: f64) -> CurveGraph {
        let mut space = VariableSpace::new();
        let ois = Curve::builder("ois")
            .nodes((0..=10).map(|t| (t as f64, (-rate * t as f64).exp())))
            .build(&mut space)
            .unwrap();
        let mut graph = CurveGraph::new();
        graph.add_curve(ois, &[]).unwrap();
        graph
    }

    #[test]
    fn test_zero_rate_on_flat_curve() {
        let graph = flat_graph(0.03);
        let price = ZeroRateQuote::new("ois", 3.5, 0.03).price(&graph).unwrap();
        assert_relative_eq!(price.real(), 0.03, epsilon = 1e-14);
    }

    #[test]
    fn test_single_curve_swap_par_rate() {
        let graph = flat_graph(0.03);
        let price = ParSwapQuote::new("ois", 5.0, 0.0).price(&graph).unwrap();
        // Annual par rate on a flat continuous curve is e^z - 1.
        assert_relative_eq!(price.real(), 0.03f64.exp() - 1.0, epsilon = 1e-12);
        assert_eq!(price.gradient().len(), 5);
    }

    #[test]
    fn test_semi_annual_schedule() {
        let quote = ParSwapQuote::new("ois", 2.0, 0.03).with_frequency(Frequency::SemiAnnual);
        assert_eq!(quote.schedule().unwrap(), vec![0.5, 1.0, 1.5, 2.0]);
        assert!(ParSwapQuote::new("ois", 0.1, 0.03).schedule().is_err());
    }

    #[test]
    fn test_projected_swap_with_line_forecast() {
        let mut space = VariableSpace::new();
        let ois = Curve::builder("ois")
            .nodes([(0.0, 1.0), (5.0, 0.9)])
            .build(&mut space)
            .unwrap();
        let libor = Curve::builder("libor")
            .kind(CurveKind::Line)
            .nodes([(0.0, 0.04), (5.0, 0.04)])
            .build(&mut space)
            .unwrap();
        let mut graph = CurveGraph::new();
        graph.add_curve(ois, &[]).unwrap();
        graph.add_curve(libor, &["ois"]).unwrap();

        // Flat forecast: the par rate equals the forecast rate.
        let swap = ParSwapQuote::new("ois", 3.0, 0.04).projected_on("libor");
        let price = swap.price(&graph).unwrap();
        assert_relative_eq!(price.real(), 0.04, epsilon = 1e-14);
    }

    #[test]
    fn test_projection_requires_declared_dependency() {
        let mut space = VariableSpace::new();
        let ois = Curve::builder("ois")
            .nodes([(0.0, 1.0), (5.0, 0.9)])
            .build(&mut space)
            .unwrap();
        let libor = Curve::builder("libor")
            .kind(CurveKind::Line)
            .nodes([(0.0, 0.04), (5.0, 0.04)])
            .build(&mut space)
            .unwrap();
        let mut graph = CurveGraph::new();
        graph.add_curve(ois, &[]).unwrap();
        graph.add_curve(libor, &[]).unwrap();

        let err = ParSwapQuote::new("ois", 3.0, 0.04)
            .projected_on("libor")
            .price(&graph)
            .unwrap_err();
        assert!(matches!(err, CalibrationError::UndeclaredDependency { .. }));
    }

    #[test]
    fn test_forward_rate_on_discount_and_line() {
        let graph = flat_graph(0.02);
        let fra = ForwardRateQuote::new("ois", 1.0, 1.5, 0.0);
        let expected = ((0.02f64 * 0.5).exp() - 1.0) / 0.5;
        assert_relative_eq!(fra.price(&graph).unwrap().real(), expected, epsilon = 1e-12);

        let mut space = VariableSpace::new();
        let line = Curve::builder("fwd")
            .kind(CurveKind::Line)
            .interpolation(Interpolation::Linear)
            .nodes([(0.0, 0.01), (2.0, 0.03)])
            .build(&mut space)
            .unwrap();
        let mut graph = CurveGraph::new();
        graph.add_curve(line, &[]).unwrap();
        let fra = ForwardRateQuote::new("fwd", 1.0, 1.25, 0.0);
        assert_relative_eq!(fra.price(&graph).unwrap().real(), 0.02, epsilon = 1e-14);
    }

    #[test]
    fn test_curve_value_quote_reads_node() {
        let graph = flat_graph(0.01);
        let quote = CurveValueQuote::new("ois", 4.0, 0.0).with_label("node4");
        let price = quote.price(&graph).unwrap();
        assert_relative_eq!(price.real(), (-0.04f64).exp(), epsilon = 1e-15);
        assert_eq!(price.gradient().len(), 1);
        assert_eq!(quote.label(), Some("node4"));
    }

    #[test]
    fn test_unknown_curve_is_reported() {
        let graph = flat_graph(0.01);
        let err = ZeroRateQuote::new("sofr", 1.0, 0.0)
            .price(&graph)
            .unwrap_err();
        assert!(err.is_construction_error());
    }
}
