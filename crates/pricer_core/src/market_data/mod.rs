//! Market data structures for curve construction and lookup.
//!
//! # Components
//!
//! - [`curves`]: Curves over dual-valued nodes and the [`YieldCurve`] trait
//! - [`error`]: Market data error types ([`MarketDataError`])
//!
//! # Example
//!
//! ```
//! use pricer_core::market_data::curves::{Curve, YieldCurve};
//! use pricer_core::types::VariableSpace;
//!
//! let mut space = VariableSpace::new();
//! let curve = Curve::builder("ois")
//!     .nodes([(0.0, 1.0), (1.0, (-0.05_f64).exp()), (2.0, (-0.1_f64).exp())])
//!     .build(&mut space)
//!     .unwrap();
//!
//! let rate = curve.zero_rate(1.5).unwrap();
//! assert!((rate.real() - 0.05).abs() < 1e-12);
//! ```

pub mod curves;
pub mod error;

pub use curves::{Curve, CurveBuilder, CurveId, CurveKind, CurveSnapshot, YieldCurve};
pub use error::MarketDataError;
