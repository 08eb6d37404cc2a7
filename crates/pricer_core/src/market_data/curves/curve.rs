//! Node-based curve with dual-valued nodes.

use crate::market_data::error::MarketDataError;
use crate::math::interpolators::{Interpolation, Interpolator};
use crate::types::{AdOrder, DualNumber, InterpolationError, VariableId, VariableSpace};
use std::borrow::Borrow;
use std::fmt;

/// Curve identifier.
///
/// Also used as the prefix of node variable labels (`"{id}{index}"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct CurveId(String);

impl CurveId {
    /// Create a curve identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CurveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Borrow<str> for CurveId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl From<&str> for CurveId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CurveId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// What a curve's node values represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum CurveKind {
    /// Discount factors. The first node is pinned and is not a free variable.
    #[default]
    Discount,
    /// Arbitrary values (e.g. forecast rates). Every node is free.
    Line,
}

impl fmt::Display for CurveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurveKind::Discount => f.write_str("discount"),
            CurveKind::Line => f.write_str("line"),
        }
    }
}

/// Borrowed view of one curve node.
#[derive(Debug, Clone, Copy)]
pub struct Node<'a> {
    /// Node position (e.g. time to maturity in years)
    pub position: f64,
    /// Current node value
    pub value: &'a DualNumber,
    /// Variable identity, `None` for pinned nodes
    pub variable: Option<VariableId>,
}

/// Curve over strictly increasing node positions.
///
/// Each free node value is a [`DualNumber`] seeded against its own
/// [`VariableId`]; ids and positions never change after construction.
/// Values are replaced only through [`Curve::update_node_values`] and
/// [`Curve::set_ad_order`].
///
/// # Example
///
/// ```
/// use pricer_core::market_data::curves::{Curve, CurveKind, YieldCurve};
/// use pricer_core::math::interpolators::Interpolation;
/// use pricer_core::types::VariableSpace;
///
/// let mut space = VariableSpace::new();
/// let curve = Curve::builder("usd_ois")
///     .kind(CurveKind::Discount)
///     .interpolation(Interpolation::LogLinear)
///     .nodes([(0.0, 1.0), (1.0, 0.97), (5.0, 0.85)])
///     .build(&mut space)
///     .unwrap();
///
/// let df = curve.discount_factor(2.5).unwrap();
/// assert!(df.real() < 0.97 && df.real() > 0.85);
/// // Pinned first node plus two free nodes
/// assert_eq!(curve.free_variables().count(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct Curve {
    id: CurveId,
    kind: CurveKind,
    variables: Vec<Option<VariableId>>,
    interpolator: Interpolator,
    allow_extrapolation: bool,
    ad_order: AdOrder,
}

impl Curve {
    /// Start building a curve.
    pub fn builder(id: impl Into<CurveId>) -> CurveBuilder {
        CurveBuilder::new(id)
    }

    /// Curve identifier.
    pub fn id(&self) -> &CurveId {
        &self.id
    }

    /// Curve kind.
    pub fn kind(&self) -> CurveKind {
        self.kind
    }

    /// Interpolation scheme.
    pub fn interpolation(&self) -> Interpolation {
        self.interpolator.method()
    }

    /// Derivative order of the node seeds.
    pub fn ad_order(&self) -> AdOrder {
        self.ad_order
    }

    /// Whether queries right of the last node extrapolate.
    pub fn allow_extrapolation(&self) -> bool {
        self.allow_extrapolation
    }

    /// First and last node positions.
    pub fn domain(&self) -> (f64, f64) {
        self.interpolator.domain()
    }

    /// Number of nodes, pinned ones included.
    pub fn node_count(&self) -> usize {
        self.variables.len()
    }

    /// Node positions.
    pub fn positions(&self) -> &[f64] {
        self.interpolator.positions()
    }

    /// Current node values.
    pub fn node_values(&self) -> &[DualNumber] {
        self.interpolator.values()
    }

    /// Iterate over all nodes in position order.
    pub fn nodes(&self) -> impl Iterator<Item = Node<'_>> + '_ {
        self.positions()
            .iter()
            .zip(self.node_values())
            .zip(&self.variables)
            .map(|((&position, value), &variable)| Node {
                position,
                value,
                variable,
            })
    }

    /// Free variables in node order.
    pub fn free_variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.variables.iter().filter_map(|v| *v)
    }

    /// Number of free nodes.
    pub fn free_node_count(&self) -> usize {
        self.variables.iter().filter(|v| v.is_some()).count()
    }

    /// Real parts of the free nodes, in node order.
    pub fn free_node_values(&self) -> Vec<f64> {
        self.nodes()
            .filter(|n| n.variable.is_some())
            .map(|n| n.value.real())
            .collect()
    }

    /// Human-readable labels of the free variables: `"{id}{node_index}"`.
    pub fn variable_labels(&self) -> Vec<String> {
        self.variables
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_some())
            .map(|(i, _)| format!("{}{}", self.id, i))
            .collect()
    }

    /// Interpolated value at `position`.
    ///
    /// # Errors
    ///
    /// * `OutOfDomain` - left of the first node, or right of the last node
    ///   when extrapolation is disabled
    /// * `Interpolation` - the scheme's transform failed on the node values
    pub fn value_at(&self, position: f64) -> Result<DualNumber, MarketDataError> {
        self.interpolator
            .interpolate(position, self.allow_extrapolation)
            .map_err(|e| match e {
                InterpolationError::OutOfDomain { x, min, max } => MarketDataError::OutOfDomain {
                    curve: self.id.to_string(),
                    position: x,
                    min,
                    max,
                },
                other => MarketDataError::Interpolation(other),
            })
    }

    /// Replace the free node values in place.
    ///
    /// Positions and variable ids are preserved; each value is re-seeded at
    /// the curve's AD order. Pinned nodes are untouched. On error the curve
    /// is unchanged.
    ///
    /// # Errors
    ///
    /// * `LengthMismatch` - `values.len()` differs from the free node count
    /// * `Interpolation` - a log scheme received a non-positive value
    pub fn update_node_values(&mut self, values: &[f64]) -> Result<(), MarketDataError> {
        let expected = self.free_node_count();
        if values.len() != expected {
            return Err(MarketDataError::LengthMismatch {
                curve: self.id.to_string(),
                expected,
                got: values.len(),
            });
        }
        let mut free = values.iter().copied();
        let ys: Vec<DualNumber> = self
            .node_values()
            .iter()
            .zip(&self.variables)
            .map(|(current, var)| match (var, var.and_then(|_| free.next())) {
                (Some(id), Some(v)) => DualNumber::seed(v, *id, self.ad_order),
                _ => current.clone(),
            })
            .collect();
        self.interpolator.set_values(ys)?;
        Ok(())
    }

    /// Re-seed every free node at `order`, keeping real values.
    pub fn set_ad_order(&mut self, order: AdOrder) -> Result<(), MarketDataError> {
        if order == self.ad_order {
            return Ok(());
        }
        let ys: Vec<DualNumber> = self
            .node_values()
            .iter()
            .zip(&self.variables)
            .map(|(current, var)| match var {
                Some(id) => DualNumber::seed(current.real(), *id, order),
                None => current.clone(),
            })
            .collect();
        self.interpolator.set_values(ys)?;
        self.ad_order = order;
        Ok(())
    }
}

impl Curve {
    /// A copy moved in parallel by `spread_bp` basis points, with fresh
    /// variables from `space` and the same scheme, kind and AD order.
    ///
    /// Discount nodes take the spread as an extra continuously compounded
    /// rate from the first node, `D'(t) = D(t) exp(-s (t - t0))`: the pinned
    /// node stays at its value and, on log-linear curves starting at zero,
    /// every zero and forward rate moves by `s`. Line nodes add `s`.
    ///
    /// # Errors
    ///
    /// `InvalidConstruction` if the shifted nodes are rejected, e.g. a line
    /// curve on a log scheme pushed to a non-positive value.
    pub fn shift(
        &self,
        spread_bp: f64,
        id: impl Into<CurveId>,
        space: &mut VariableSpace,
    ) -> Result<Curve, MarketDataError> {
        let s = spread_bp / 10_000.0;
        let (t0, _) = self.domain();
        let nodes: Vec<(f64, f64)> = self
            .positions()
            .iter()
            .zip(self.node_values())
            .map(|(&t, v)| match self.kind {
                CurveKind::Discount => (t, v.real() * (-s * (t - t0)).exp()),
                CurveKind::Line => (t, v.real() + s),
            })
            .collect();
        Curve::builder(id)
            .kind(self.kind)
            .interpolation(self.interpolation())
            .nodes(nodes)
            .allow_extrapolation(self.allow_extrapolation)
            .ad_order(self.ad_order)
            .build(space)
    }
}

/// Builder for [`Curve`].
///
/// Defaults: discount kind, log-linear interpolation, no extrapolation,
/// first-order seeds.
#[derive(Debug, Clone)]
pub struct CurveBuilder {
    id: CurveId,
    kind: CurveKind,
    interpolation: Interpolation,
    nodes: Vec<(f64, f64)>,
    allow_extrapolation: bool,
    ad_order: AdOrder,
}

impl CurveBuilder {
    /// Create a builder for curve `id`.
    pub fn new(id: impl Into<CurveId>) -> Self {
        Self {
            id: id.into(),
            kind: CurveKind::default(),
            interpolation: Interpolation::default(),
            nodes: Vec::new(),
            allow_extrapolation: false,
            ad_order: AdOrder::First,
        }
    }

    /// Set the curve kind.
    pub fn kind(mut self, kind: CurveKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the interpolation scheme.
    pub fn interpolation(mut self, interpolation: Interpolation) -> Self {
        self.interpolation = interpolation;
        self
    }

    /// Append a node with its initial value.
    pub fn node(mut self, position: f64, value: f64) -> Self {
        self.nodes.push((position, value));
        self
    }

    /// Append several nodes.
    pub fn nodes(mut self, nodes: impl IntoIterator<Item = (f64, f64)>) -> Self {
        self.nodes.extend(nodes);
        self
    }

    /// Allow extrapolation right of the last node.
    pub fn allow_extrapolation(mut self, allow: bool) -> Self {
        self.allow_extrapolation = allow;
        self
    }

    /// Derivative order of the node seeds.
    pub fn ad_order(mut self, order: AdOrder) -> Self {
        self.ad_order = order;
        self
    }

    /// Validate the nodes, allocate free variables from `space` and build.
    ///
    /// # Errors
    ///
    /// `InvalidConstruction` when there are no nodes, positions are not
    /// strictly increasing (duplicates included), there are too few nodes
    /// for the scheme, or a log scheme receives a non-positive value.
    pub fn build(self, space: &mut VariableSpace) -> Result<Curve, MarketDataError> {
        let invalid = |reason: String| MarketDataError::InvalidConstruction {
            curve: self.id.to_string(),
            reason,
        };
        if self.nodes.is_empty() {
            return Err(invalid("no nodes".to_string()));
        }
        if let Some(&(t, v)) = self.nodes.iter().find(|(_, v)| !v.is_finite()) {
            return Err(invalid(format!("non-finite node value {} at {}", v, t)));
        }

        let variables: Vec<Option<VariableId>> = (0..self.nodes.len())
            .map(|i| match (self.kind, i) {
                (CurveKind::Discount, 0) => None,
                _ => Some(space.allocate()),
            })
            .collect();

        let xs: Vec<f64> = self.nodes.iter().map(|&(t, _)| t).collect();
        let ys: Vec<DualNumber> = self
            .nodes
            .iter()
            .zip(&variables)
            .map(|(&(_, v), var)| match var {
                Some(id) => DualNumber::seed(v, *id, self.ad_order),
                None => DualNumber::constant(v),
            })
            .collect();

        let interpolator =
            Interpolator::new(self.interpolation, xs, ys).map_err(|e| invalid(e.to_string()))?;

        Ok(Curve {
            id: self.id,
            kind: self.kind,
            variables,
            interpolator,
            allow_extrapolation: self.allow_extrapolation,
            ad_order: self.ad_order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn discount(space: &mut VariableSpace, interpolation: Interpolation) -> Curve {
        Curve::builder("ois")
            .interpolation(interpolation)
            .nodes([(0.0, 1.0), (1.0, 0.97), (2.0, 0.94), (5.0, 0.86)])
            .allow_extrapolation(true)
            .build(space)
            .unwrap()
    }

    // ========================================
    // Construction
    // ========================================

    #[test]
    fn test_discount_curve_pins_first_node() {
        let mut space = VariableSpace::new();
        let curve = discount(&mut space, Interpolation::LogLinear);
        assert_eq!(curve.node_count(), 4);
        assert_eq!(curve.free_node_count(), 3);
        assert_eq!(space.allocated(), 3);
        assert!(curve.nodes().next().unwrap().variable.is_none());
        assert_eq!(curve.variable_labels(), vec!["ois1", "ois2", "ois3"]);
    }

    #[test]
    fn test_line_curve_frees_all_nodes() {
        let mut space = VariableSpace::new();
        let curve = Curve::builder("fwd")
            .kind(CurveKind::Line)
            .interpolation(Interpolation::Linear)
            .nodes([(0.0, 0.02), (1.0, 0.025)])
            .build(&mut space)
            .unwrap();
        assert_eq!(curve.free_node_count(), 2);
        assert_eq!(curve.variable_labels(), vec!["fwd0", "fwd1"]);
    }

    #[test]
    fn test_rejects_duplicate_positions() {
        let mut space = VariableSpace::new();
        let err = Curve::builder("bad")
            .nodes([(0.0, 1.0), (1.0, 0.99), (1.0, 0.98)])
            .build(&mut space)
            .unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidConstruction { .. }));
        assert!(err.is_construction_error());
    }

    #[test]
    fn test_rejects_decreasing_positions() {
        let mut space = VariableSpace::new();
        let err = Curve::builder("bad")
            .nodes([(0.0, 1.0), (2.0, 0.99), (1.0, 0.98)])
            .build(&mut space)
            .unwrap_err();
        assert!(matches!(err, MarketDataError::InvalidConstruction { .. }));
    }

    #[test]
    fn test_rejects_empty() {
        let mut space = VariableSpace::new();
        assert!(Curve::builder("empty").build(&mut space).is_err());
    }

    // ========================================
    // Lookup
    // ========================================

    #[test]
    fn test_value_at_reports_curve_on_out_of_domain() {
        let mut space = VariableSpace::new();
        let curve = discount(&mut space, Interpolation::LogLinear);
        match curve.value_at(-1.0).unwrap_err() {
            MarketDataError::OutOfDomain { curve, position, .. } => {
                assert_eq!(curve, "ois");
                assert_eq!(position, -1.0);
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_value_at_node_is_exact_for_every_scheme() {
        for m in Interpolation::ALL {
            let mut space = VariableSpace::new();
            let curve = discount(&mut space, m);
            for node in curve.nodes() {
                let v = curve.value_at(node.position).unwrap();
                assert!(v.identical(node.value), "{m} at {}", node.position);
            }
        }
    }

    // ========================================
    // Mutation
    // ========================================

    #[test]
    fn test_update_preserves_ids_and_positions() {
        let mut space = VariableSpace::new();
        let mut curve = discount(&mut space, Interpolation::LogLinear);
        let ids: Vec<_> = curve.free_variables().collect();
        let positions = curve.positions().to_vec();

        curve.update_node_values(&[0.96, 0.93, 0.84]).unwrap();

        assert_eq!(curve.free_variables().collect::<Vec<_>>(), ids);
        assert_eq!(curve.positions(), positions.as_slice());
        assert_eq!(curve.free_node_values(), vec![0.96, 0.93, 0.84]);
        assert_eq!(curve.node_values()[0].real(), 1.0);
        assert_eq!(curve.node_values()[2].partial(ids[1]), 1.0);
    }

    #[test]
    fn test_update_length_mismatch() {
        let mut space = VariableSpace::new();
        let mut curve = discount(&mut space, Interpolation::LogLinear);
        let err = curve.update_node_values(&[0.9]).unwrap_err();
        assert!(matches!(
            err,
            MarketDataError::LengthMismatch {
                expected: 3,
                got: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_failed_update_leaves_curve_unchanged() {
        let mut space = VariableSpace::new();
        let mut curve = discount(&mut space, Interpolation::LogLinear);
        let before = curve.free_node_values();
        assert!(curve.update_node_values(&[0.96, -0.1, 0.84]).is_err());
        assert_eq!(curve.free_node_values(), before);
    }

    #[test]
    fn test_set_ad_order_reseeds() {
        let mut space = VariableSpace::new();
        let mut curve = discount(&mut space, Interpolation::LogLinear);
        curve.set_ad_order(AdOrder::Zero).unwrap();
        assert!(curve.value_at(1.5).unwrap().gradient().is_empty());

        curve.set_ad_order(AdOrder::Second).unwrap();
        let v = curve.value_at(1.5).unwrap();
        assert!(v.hessian().is_some());
        assert_relative_eq!(v.real(), (0.97_f64 * 0.94).sqrt(), epsilon = 1e-14);
    }

    #[test]
    fn test_shift_moves_discount_rates_in_parallel() {
        use crate::market_data::curves::YieldCurve;

        let mut space = VariableSpace::new();
        let base = discount(&mut space, Interpolation::LogLinear);
        let up = base.shift(25.0, "ois_up", &mut space).unwrap();
        assert_eq!(up.id().as_str(), "ois_up");
        assert_eq!(up.node_values()[0].real(), 1.0);
        assert_eq!(up.free_node_count(), base.free_node_count());
        assert!(up.free_variables().all(|id| base.free_variables().all(|b| b != id)));

        for t in [0.5, 1.0, 3.3, 5.0, 7.0] {
            let dz = up.zero_rate(t).unwrap().real() - base.zero_rate(t).unwrap().real();
            assert_relative_eq!(dz, 0.0025, epsilon = 1e-13);
        }
        let fwd = |c: &Curve| c.forward_rate(1.0, 2.0).unwrap().real();
        assert_relative_eq!(fwd(&up) - fwd(&base), 0.0025, epsilon = 1e-13);
    }

    #[test]
    fn test_shift_line_curve_adds_spread() {
        let mut space = VariableSpace::new();
        let line = Curve::builder("euribor_fwd")
            .kind(CurveKind::Line)
            .interpolation(Interpolation::Linear)
            .nodes([(1.0, 0.01), (2.0, 0.02)])
            .ad_order(AdOrder::Second)
            .build(&mut space)
            .unwrap();
        let down = line.shift(-10.0, "euribor_fwd_down", &mut space).unwrap();
        assert_eq!(down.ad_order(), AdOrder::Second);
        assert_relative_eq!(down.value_at(1.5).unwrap().real(), 0.014, epsilon = 1e-15);
        assert_eq!(down.free_node_count(), 2);
    }

    #[test]
    fn test_shift_rejects_non_positive_log_values() {
        let mut space = VariableSpace::new();
        let line = Curve::builder("spread")
            .kind(CurveKind::Line)
            .nodes([(1.0, 0.0005), (2.0, 0.001)])
            .build(&mut space)
            .unwrap();
        let err = line.shift(-10.0, "spread_down", &mut space).unwrap_err();
        assert!(err.is_construction_error());
    }
}
