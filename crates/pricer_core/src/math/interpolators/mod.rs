//! Interpolation of dual-valued nodes.
//!
//! Every scheme is expressed in [`DualNumber`] arithmetic, so the interpolated
//! value carries the exact derivative with respect to every node variable
//! that enters the formula (nodes are never treated as opaque constants).
//!
//! ## Available Schemes
//!
//! [`Interpolation`] is a closed set; each variant fixes its own extrapolation
//! rule to the right of the last node:
//!
//! | Variant | Between nodes | Beyond the last node |
//! |---------|---------------|----------------------|
//! | `Linear` | linear in value | last segment extended |
//! | `LogLinear` | linear in `ln v` | last segment extended in log space |
//! | `LinearZeroRate` | linear in `-ln v / t` | last zero-rate segment extended |
//! | `FlatForward` | left node value | last node value |
//! | `FlatBackward` | right node value | last node value |
//! | `CubicSpline` | natural cubic spline | tangent line at the last node |
//! | `LogCubicSpline` | monotone cubic Hermite in `ln v` | tangent line in log space |
//!
//! Queries left of the first node always fail with `OutOfDomain`; queries
//! right of the last node fail unless extrapolation is requested.
//!
//! Querying exactly at a node returns a clone of that node's value.
//!
//! ## Example
//!
//! ```
//! use pricer_core::math::interpolators::{Interpolation, Interpolator};
//! use pricer_core::types::{DualNumber, VariableSpace};
//!
//! let mut space = VariableSpace::new();
//! let ids: Vec<_> = (0..3).map(|_| space.allocate()).collect();
//! let ys: Vec<DualNumber> = [1.0, 0.97, 0.93]
//!     .iter()
//!     .zip(&ids)
//!     .map(|(&v, &id)| DualNumber::variable(v, id))
//!     .collect();
//!
//! let interp = Interpolator::new(Interpolation::LogLinear, vec![0.0, 1.0, 2.0], ys).unwrap();
//! let df = interp.interpolate(1.5, false).unwrap();
//! assert!(df.real() < 0.97 && df.real() > 0.93);
//! assert!(df.partial(ids[1]) > 0.0 && df.partial(ids[2]) > 0.0);
//! assert_eq!(df.partial(ids[0]), 0.0);
//! ```

mod cubic_spline;
mod linear;

use crate::types::{DualNumber, InterpolationError};
use cubic_spline::CubicSpline;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Interpolation scheme selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Interpolation {
    /// Piecewise linear in value.
    Linear,
    /// Piecewise linear in the logarithm of value (flat forwards for
    /// discount factors).
    #[default]
    LogLinear,
    /// Piecewise linear in the continuously compounded zero rate.
    LinearZeroRate,
    /// Step function holding the left node's value.
    FlatForward,
    /// Step function taking the right node's value.
    FlatBackward,
    /// Natural cubic spline in value.
    CubicSpline,
    /// Monotone (Fritsch-Carlson) cubic Hermite spline in the logarithm of
    /// value. Decreasing discount factor nodes give a decreasing curve.
    LogCubicSpline,
}

impl Interpolation {
    /// All schemes, in declaration order.
    pub const ALL: [Interpolation; 7] = [
        Interpolation::Linear,
        Interpolation::LogLinear,
        Interpolation::LinearZeroRate,
        Interpolation::FlatForward,
        Interpolation::FlatBackward,
        Interpolation::CubicSpline,
        Interpolation::LogCubicSpline,
    ];

    /// Minimum number of nodes the scheme needs.
    pub fn min_nodes(&self) -> usize {
        match self {
            Interpolation::Linear | Interpolation::FlatForward | Interpolation::FlatBackward => 1,
            Interpolation::LogLinear | Interpolation::LinearZeroRate => 2,
            Interpolation::CubicSpline | Interpolation::LogCubicSpline => 3,
        }
    }

    /// Returns `true` if the scheme takes logarithms of node values, which
    /// must then be strictly positive.
    pub fn requires_positive_values(&self) -> bool {
        matches!(
            self,
            Interpolation::LogLinear | Interpolation::LinearZeroRate | Interpolation::LogCubicSpline
        )
    }

    /// Canonical lowercase name.
    pub fn name(&self) -> &'static str {
        match self {
            Interpolation::Linear => "linear",
            Interpolation::LogLinear => "log_linear",
            Interpolation::LinearZeroRate => "linear_zero_rate",
            Interpolation::FlatForward => "flat_forward",
            Interpolation::FlatBackward => "flat_backward",
            Interpolation::CubicSpline => "cubic_spline",
            Interpolation::LogCubicSpline => "log_cubic_spline",
        }
    }
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Interpolation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Interpolation::ALL
            .into_iter()
            .find(|m| m.name() == lower)
            .ok_or_else(|| format!("Unknown interpolation: {}", s))
    }
}

/// Interpolator over dual-valued nodes.
///
/// Owns the node positions and values. Spline schemes cache their
/// coefficients; [`Interpolator::set_values`] recomputes them.
#[derive(Debug, Clone)]
pub struct Interpolator {
    method: Interpolation,
    xs: Vec<f64>,
    ys: Vec<DualNumber>,
    spline: Option<CubicSpline>,
}

impl Interpolator {
    /// Construct an interpolator.
    ///
    /// # Arguments
    ///
    /// * `method` - Interpolation scheme
    /// * `xs` - Node positions, strictly increasing and finite
    /// * `ys` - Node values
    ///
    /// # Returns
    ///
    /// * `Ok(Interpolator)` - Successfully constructed interpolator
    /// * `Err(InterpolationError::LengthMismatch)` - `xs` and `ys` differ in length
    /// * `Err(InterpolationError::InsufficientData)` - Fewer nodes than the scheme needs
    /// * `Err(InterpolationError::NonIncreasing)` - Duplicate or decreasing positions
    /// * `Err(InterpolationError::Domain)` - Non-positive value under a log scheme
    pub fn new(
        method: Interpolation,
        xs: Vec<f64>,
        ys: Vec<DualNumber>,
    ) -> Result<Self, InterpolationError> {
        if xs.len() != ys.len() {
            return Err(InterpolationError::LengthMismatch {
                positions: xs.len(),
                values: ys.len(),
            });
        }
        if xs.len() < method.min_nodes() {
            return Err(InterpolationError::InsufficientData {
                got: xs.len(),
                need: method.min_nodes(),
            });
        }
        validate_positions(&xs)?;

        let spline = build_spline(method, &xs, &ys)?;
        Ok(Self {
            method,
            xs,
            ys,
            spline,
        })
    }

    /// Interpolation scheme.
    pub fn method(&self) -> Interpolation {
        self.method
    }

    /// Node positions.
    pub fn positions(&self) -> &[f64] {
        &self.xs
    }

    /// Node values.
    pub fn values(&self) -> &[DualNumber] {
        &self.ys
    }

    /// First and last node positions.
    pub fn domain(&self) -> (f64, f64) {
        (self.xs[0], self.xs[self.xs.len() - 1])
    }

    /// Replace node values, keeping positions, and refresh cached state.
    ///
    /// # Errors
    ///
    /// `LengthMismatch` if the count changes; `Domain` if a log scheme
    /// receives a non-positive value. The interpolator is unchanged on error.
    pub fn set_values(&mut self, ys: Vec<DualNumber>) -> Result<(), InterpolationError> {
        if ys.len() != self.xs.len() {
            return Err(InterpolationError::LengthMismatch {
                positions: self.xs.len(),
                values: ys.len(),
            });
        }
        self.spline = build_spline(self.method, &self.xs, &ys)?;
        self.ys = ys;
        Ok(())
    }

    /// Interpolate at `x`.
    ///
    /// # Arguments
    ///
    /// * `x` - Query position
    /// * `allow_extrapolation` - Apply the scheme's extrapolation rule right of
    ///   the last node instead of failing
    ///
    /// # Returns
    ///
    /// * `Ok(value)` - Interpolated value with node sensitivities
    /// * `Err(InterpolationError::OutOfDomain)` - Query outside the permitted range
    /// * `Err(InterpolationError::Domain)` - Log of a non-positive value
    pub fn interpolate(
        &self,
        x: f64,
        allow_extrapolation: bool,
    ) -> Result<DualNumber, InterpolationError> {
        let (min, max) = self.domain();
        if !x.is_finite() || x < min || (x > max && !allow_extrapolation) {
            return Err(InterpolationError::OutOfDomain { x, min, max });
        }

        if let Ok(i) = self
            .xs
            .binary_search_by(|p| p.partial_cmp(&x).unwrap_or(Ordering::Less))
        {
            return Ok(self.ys[i].clone());
        }

        let n = self.xs.len();
        if n == 1 {
            // Only the step and linear schemes accept a single node; all
            // hold the value flat to the right.
            return Ok(self.ys[0].clone());
        }

        let i = find_segment(&self.xs, x);
        let (x0, x1) = (self.xs[i], self.xs[i + 1]);
        let (y0, y1) = (&self.ys[i], &self.ys[i + 1]);
        let beyond = x > max;

        match self.method {
            Interpolation::Linear => Ok(linear::linear(x0, x1, y0, y1, x)),
            Interpolation::LogLinear => Ok(linear::log_linear(x0, x1, y0, y1, x)?),
            Interpolation::LinearZeroRate => Ok(linear::linear_zero_rate(x0, x1, y0, y1, x)?),
            Interpolation::FlatForward if beyond => Ok(y1.clone()),
            Interpolation::FlatForward => Ok(y0.clone()),
            Interpolation::FlatBackward => Ok(y1.clone()),
            Interpolation::CubicSpline | Interpolation::LogCubicSpline => {
                let spline = self.spline.as_ref().ok_or(InterpolationError::InsufficientData {
                    got: n,
                    need: self.method.min_nodes(),
                })?;
                let v = spline.evaluate(&self.xs, i, x);
                if self.method == Interpolation::LogCubicSpline {
                    Ok(v.exp())
                } else {
                    Ok(v)
                }
            }
        }
    }
}

/// Interpolate once without keeping an [`Interpolator`].
///
/// Convenient for one-off lookups; spline schemes recompute their
/// coefficients on every call.
pub fn interpolate(
    method: Interpolation,
    xs: &[f64],
    ys: &[DualNumber],
    x: f64,
    allow_extrapolation: bool,
) -> Result<DualNumber, InterpolationError> {
    Interpolator::new(method, xs.to_vec(), ys.to_vec())?.interpolate(x, allow_extrapolation)
}

/// Index `i` of the segment `[xs[i], xs[i + 1]]` used for `x`.
///
/// Points right of the last node map to the last segment.
fn find_segment(xs: &[f64], x: f64) -> usize {
    let idx = xs.partition_point(|&p| p <= x);
    idx.saturating_sub(1).min(xs.len() - 2)
}

fn validate_positions(xs: &[f64]) -> Result<(), InterpolationError> {
    for (i, &x) in xs.iter().enumerate() {
        if !x.is_finite() {
            return Err(InterpolationError::NonIncreasing {
                index: i,
                previous: if i > 0 { xs[i - 1] } else { f64::NEG_INFINITY },
                position: x,
            });
        }
        if i > 0 && !(x > xs[i - 1]) {
            return Err(InterpolationError::NonIncreasing {
                index: i,
                previous: xs[i - 1],
                position: x,
            });
        }
    }
    Ok(())
}

fn build_spline(
    method: Interpolation,
    xs: &[f64],
    ys: &[DualNumber],
) -> Result<Option<CubicSpline>, InterpolationError> {
    if method.requires_positive_values() {
        if let Some(bad) = ys.iter().find(|y| !(y.real() > 0.0)) {
            return Err(crate::types::DomainError::new("ln", bad.real()).into());
        }
    }
    match method {
        Interpolation::CubicSpline => Ok(Some(CubicSpline::natural(xs, ys))),
        Interpolation::LogCubicSpline => {
            let logs = ys
                .iter()
                .map(|y| y.ln())
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(CubicSpline::monotone(xs, &logs)?))
        }
        _ => Ok(None),
    }
}
