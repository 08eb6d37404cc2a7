//! Serialisable curve snapshots.

use super::{Curve, CurveBuilder, CurveId, CurveKind};
use crate::market_data::error::MarketDataError;
use crate::math::interpolators::Interpolation;
use crate::types::{AdOrder, VariableSpace};

/// Persistable description of a curve.
///
/// Keeps node positions, node real values and the interpolation selection.
/// Sensitivities are scoped to one calibration run and are not stored; a
/// restored curve gets fresh variable ids.
///
/// # Example
///
/// ```
/// use pricer_core::market_data::curves::{Curve, CurveSnapshot};
/// use pricer_core::types::{AdOrder, VariableSpace};
///
/// let mut space = VariableSpace::new();
/// let curve = Curve::builder("ois")
///     .nodes([(0.0, 1.0), (1.0, 0.97), (2.0, 0.94)])
///     .build(&mut space)
///     .unwrap();
///
/// let snapshot = curve.to_snapshot();
/// let restored = snapshot.clone().into_curve(&mut space, AdOrder::First).unwrap();
/// assert_eq!(restored.to_snapshot(), snapshot);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CurveSnapshot {
    /// Curve identifier
    pub id: CurveId,
    /// Curve kind
    pub kind: CurveKind,
    /// Interpolation scheme
    pub interpolation: Interpolation,
    /// Whether the curve extrapolates right of the last node
    #[cfg_attr(feature = "serde", serde(default))]
    pub allow_extrapolation: bool,
    /// `(position, value)` pairs in position order
    pub nodes: Vec<(f64, f64)>,
}

impl CurveSnapshot {
    /// Rebuild a curve, allocating fresh variables from `space`.
    pub fn into_curve(
        self,
        space: &mut VariableSpace,
        ad_order: AdOrder,
    ) -> Result<Curve, MarketDataError> {
        CurveBuilder::new(self.id)
            .kind(self.kind)
            .interpolation(self.interpolation)
            .nodes(self.nodes)
            .allow_extrapolation(self.allow_extrapolation)
            .ad_order(ad_order)
            .build(space)
    }
}

impl Curve {
    /// Capture node positions, node real values and settings.
    pub fn to_snapshot(&self) -> CurveSnapshot {
        CurveSnapshot {
            id: self.id().clone(),
            kind: self.kind(),
            interpolation: self.interpolation(),
            allow_extrapolation: self.allow_extrapolation(),
            nodes: self
                .nodes()
                .map(|n| (n.position, n.value.real()))
                .collect(),
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn test_json_roundtrip() {
        let mut space = VariableSpace::new();
        let curve = Curve::builder("sofr")
            .kind(CurveKind::Line)
            .interpolation(Interpolation::FlatForward)
            .nodes([(0.0, 0.05), (0.5, 0.051), (1.0, 0.049)])
            .allow_extrapolation(true)
            .build(&mut space)
            .unwrap();

        let json = serde_json::to_string(&curve.to_snapshot()).unwrap();
        assert!(json.contains("\"flat_forward\""));
        assert!(json.contains("\"line\""));

        let snapshot: CurveSnapshot = serde_json::from_str(&json).unwrap();
        let restored = snapshot.into_curve(&mut space, AdOrder::Zero).unwrap();
        assert_eq!(restored.free_node_values(), curve.free_node_values());
        assert_eq!(restored.interpolation(), Interpolation::FlatForward);
        assert!(restored.value_at(0.75).unwrap().gradient().is_empty());
    }

    #[test]
    fn test_invalid_snapshot_is_rejected() {
        let json = r#"{"id":"x","kind":"discount","interpolation":"log_linear","nodes":[[0.0,1.0],[0.0,0.9]]}"#;
        let snapshot: CurveSnapshot = serde_json::from_str(json).unwrap();
        let mut space = VariableSpace::new();
        assert!(snapshot.into_curve(&mut space, AdOrder::First).is_err());
    }
}
