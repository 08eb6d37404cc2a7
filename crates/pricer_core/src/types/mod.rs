//! Core numeric types.
//!
//! This module provides:
//! - `dual`: Sparse forward-mode dual numbers, variable identities and their allocator
//! - `error`: Structured error types for domain and interpolation failures
//!
//! # Re-exports
//!
//! - [`DualNumber`], [`VariableId`], [`VariableSpace`], [`AdOrder`] from `dual`
//! - [`DomainError`], [`InterpolationError`] from `error`

pub mod dual;
pub mod error;

pub use dual::{AdOrder, DualNumber, Gradient, Hessian, VariableId, VariableSpace};
pub use error::{DomainError, InterpolationError};
