//! Numerical building blocks.
//!
//! - [`interpolators`]: Interpolation schemes over dual-valued nodes

pub mod interpolators;
