//! Curve calibration against market quotes.
//!
//! ## Overview
//!
//! - [`CalibrationInstrument`]: anything that prices to a `DualNumber` off a
//!   [`CurveGraph`](crate::graph::CurveGraph) and has a target quote
//! - [`SolverConfig`]: tolerances, algorithm and options, loadable from TOML
//!   or environment variables
//! - [`Solver`]: iterates `x <- x + a * dx` until the residuals vanish, then
//!   reports the converged state and the quote sensitivities
//!
//! Reference instruments ([`ZeroRateQuote`], [`ParSwapQuote`],
//! [`ForwardRateQuote`], [`CurveValueQuote`]) cover the common curve-building
//! quotes without a cashflow layer.

mod config;
mod instrument;
mod instruments;
mod linalg;
mod solver;

pub use config::{Algorithm, ConfigError, LmParameters, SolverConfig};
pub use instrument::CalibrationInstrument;
pub use instruments::{CurveValueQuote, ForwardRateQuote, Frequency, ParSwapQuote, ZeroRateQuote};
pub use solver::{Calibration, Solver, SolverState, SolverStatus};
