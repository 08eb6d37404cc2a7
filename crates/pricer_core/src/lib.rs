//! # pricer_core: Differentiable Curve Foundation
//!
//! ## Layer 1 (Foundation) Role
//!
//! pricer_core serves as the bottom layer of the calibration stack, providing:
//! - Sparse forward-mode dual numbers with named variables (`types::dual`)
//! - An explicit variable allocator, so independent runs never share identities
//! - Interpolation schemes that differentiate through their own formulas (`math::interpolators`)
//! - Node-based curves and yield curve queries (`market_data::curves`)
//! - Error types: `DomainError`, `InterpolationError`, `MarketDataError`
//!
//! ## Zero Dependency Principle
//!
//! Layer 1 has no dependencies on other pricer_* crates, with minimal external dependencies:
//! - num-traits: `Zero`/`One` for generic numeric code
//! - num-dual: Single-direction interop for verification (optional)
//! - uuid: Random tags for variable spaces
//! - serde: Serialisation support (optional)
//!
//! ## Usage Examples
//!
//! ```rust
//! use pricer_core::market_data::curves::{Curve, YieldCurve};
//! use pricer_core::math::interpolators::Interpolation;
//! use pricer_core::types::VariableSpace;
//!
//! let mut space = VariableSpace::new();
//! let curve = Curve::builder("ois")
//!     .interpolation(Interpolation::LogLinear)
//!     .nodes([(0.0, 1.0), (1.0, 0.97), (2.0, 0.94)])
//!     .build(&mut space)
//!     .unwrap();
//!
//! // The discount factor carries its derivative to every node it depends on.
//! let df = curve.discount_factor(1.5).unwrap();
//! let nodes: Vec<_> = curve.free_variables().collect();
//! assert!(df.partial(nodes[0]) > 0.0);
//! assert!(df.partial(nodes[1]) > 0.0);
//!
//! // Dropping sensitivities is always explicit.
//! let plain: f64 = df.drop_sensitivities();
//! # assert!(plain > 0.94 && plain < 0.97);
//! ```
//!
//! ## Feature Flags
//!
//! - `num-dual-mode` (default): Conversions to and from `num_dual::Dual64`
//! - `serde` (default): Serialisation for curve snapshots and enum selections

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(rustdoc::private_intra_doc_links)]

pub mod market_data;
pub mod math;
pub mod types;
