//! # pricer_optimiser
//!
//! Multi-curve calibration and quote risk for Neutryx.
//!
//! This crate sits on top of `pricer_core` (L1) and solves the inverse
//! problem of finding curve node values that reprice a set of market
//! quotes, reading every Jacobian from the dual numbers the curves produce.
//!
//! ## Architecture Position
//!
//! Layer 2 in the **P**ricer layer. Depends only on `pricer_core`.
//!
//! ## Modules
//!
//! - `graph`: Curves plus declared dependencies, topological assembly of the
//!   free-variable vector, and dependency-checked read access
//! - `calibration`: Instrument contract, solver configuration, and the
//!   Gauss-Newton / Levenberg-Marquardt / gradient-descent solver
//! - `risk`: Mapping node-variable gradients and Hessians to quote delta and
//!   gamma across chained calibrations
//!
//! ## Example
//!
//! ```rust
//! use pricer_core::market_data::curves::Curve;
//! use pricer_core::types::VariableSpace;
//! use pricer_optimiser::calibration::{
//!     CalibrationInstrument, Solver, SolverConfig, ZeroRateQuote,
//! };
//! use pricer_optimiser::graph::CurveGraph;
//!
//! let mut space = VariableSpace::new();
//! let ois = Curve::builder("ois")
//!     .nodes([(0.0, 1.0), (1.0, 1.0), (2.0, 1.0)])
//!     .build(&mut space)
//!     .unwrap();
//!
//! let mut graph = CurveGraph::new();
//! graph.add_curve(ois, &[]).unwrap();
//!
//! let instruments: Vec<Box<dyn CalibrationInstrument>> = vec![
//!     Box::new(ZeroRateQuote::new("ois", 1.0, 0.03)),
//!     Box::new(ZeroRateQuote::new("ois", 2.0, 0.035)),
//! ];
//!
//! let result = Solver::new(SolverConfig::default())
//!     .calibrate(&mut graph, &instruments)
//!     .unwrap();
//! assert!(result.converged());
//! ```
//!
//! ## Feature Flags
//!
//! - `parallel` (default): Price instruments on the rayon pool
//! - `num-dual-mode` (default): Forwarded to `pricer_core`

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod calibration;
pub mod graph;
pub mod risk;

mod error;

pub use error::CalibrationError;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::calibration::*;
    pub use crate::graph::*;
    pub use crate::risk::*;
    pub use crate::CalibrationError;
}
