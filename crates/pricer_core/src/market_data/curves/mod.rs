//! Curves over dual-valued nodes.
//!
//! This module provides:
//! - [`Curve`]: Node-based curve with variable-tagged node values
//! - [`CurveBuilder`]: Validating builder for [`Curve`]
//! - [`CurveId`], [`CurveKind`], [`Node`]: Identity, role and node view
//! - [`YieldCurve`]: Discount factor and rate queries
//! - [`CurveSnapshot`]: Persistable node list plus interpolation selection

mod curve;
mod snapshot;
mod traits;

pub use curve::{Curve, CurveBuilder, CurveId, CurveKind, Node};
pub use snapshot::CurveSnapshot;
pub use traits::YieldCurve;
