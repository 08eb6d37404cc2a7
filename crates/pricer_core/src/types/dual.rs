//! Sparse forward-mode dual numbers for automatic differentiation.
//!
//! This module provides [`DualNumber`], a real value carrying its exact
//! partial derivatives with respect to a sparse set of named risk variables,
//! and optionally the second-order partials (Hessian).
//!
//! ## Variable identity
//!
//! Variables are identified by [`VariableId`]s handed out by an explicit
//! [`VariableSpace`] allocator. There is no process-wide registry: two
//! independent spaces can never produce colliding ids.
//!
//! ## Usage
//!
//! ```
//! use pricer_core::types::dual::{AdOrder, DualNumber, VariableSpace};
//!
//! let mut space = VariableSpace::new();
//! let (a, b) = (space.allocate(), space.allocate());
//!
//! let x = DualNumber::seed(2.0, a, AdOrder::First);
//! let y = DualNumber::seed(3.0, b, AdOrder::First);
//!
//! // z = x * y + exp(x)
//! let z = &x * &y + x.exp();
//! assert!((z.real() - (6.0 + 2.0_f64.exp())).abs() < 1e-12);
//! assert!((z.partial(a) - (3.0 + 2.0_f64.exp())).abs() < 1e-12);
//! assert_eq!(z.partial(b), 2.0);
//! ```

use crate::types::error::DomainError;
use num_traits::{One, Zero};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, Mul, Neg, Sub};
use uuid::Uuid;

/// Opaque identity of a free risk variable.
///
/// Ids are ordered first by the space that allocated them and then by
/// allocation order, so iteration over a gradient map is deterministic
/// within one space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VariableId {
    space: Uuid,
    index: u32,
}

impl VariableId {
    /// Allocation index within the owning space.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Returns `true` if both ids were allocated by the same space.
    pub fn same_space(&self, other: &VariableId) -> bool {
        self.space == other.space
    }
}

impl fmt::Display for VariableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.space.simple().to_string();
        write!(f, "v{}:{}", &tag[..8], self.index)
    }
}

/// Allocator of [`VariableId`]s.
///
/// Each space draws a random tag on construction; all ids it allocates carry
/// that tag. Pass the same space to every curve that takes part in one
/// calibration so their variables share a namespace.
#[derive(Debug)]
pub struct VariableSpace {
    tag: Uuid,
    next: u32,
}

impl VariableSpace {
    /// Create an empty variable space.
    pub fn new() -> Self {
        Self {
            tag: Uuid::new_v4(),
            next: 0,
        }
    }

    /// Allocate a fresh variable id.
    pub fn allocate(&mut self) -> VariableId {
        let id = VariableId {
            space: self.tag,
            index: self.next,
        };
        self.next += 1;
        id
    }

    /// Number of ids allocated so far.
    pub fn allocated(&self) -> usize {
        self.next as usize
    }
}

impl Default for VariableSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// Order of derivatives carried by seeded values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum AdOrder {
    /// Plain values, no derivatives.
    Zero,
    /// Gradients only.
    #[default]
    First,
    /// Gradients and Hessians.
    Second,
}

/// Sparse gradient: variable to first partial derivative.
pub type Gradient = BTreeMap<VariableId, f64>;

/// Sparse Hessian keyed on the ordered pair `(min, max)` of two variables.
pub type Hessian = BTreeMap<(VariableId, VariableId), f64>;

#[inline]
fn pair(a: VariableId, b: VariableId) -> (VariableId, VariableId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

/// Real value with exact sparse partial derivatives.
///
/// # Invariants
///
/// - `gradient` contains a key exactly when the partial derivative is
///   non-zero; entries that evaluate to exactly `0.0` are pruned.
/// - `hessian` entries are stored once per unordered variable pair, so the
///   matrix is symmetric by construction.
///
/// # Comparison
///
/// `PartialEq` and `PartialOrd` compare the real part only. Branching on a
/// comparison never carries derivative information into the branch. Use
/// [`DualNumber::identical`] for structural equality.
///
/// # Conversion
///
/// There is no `From<DualNumber> for f64`; call
/// [`DualNumber::drop_sensitivities`] so discarding derivatives is visible.
#[derive(Debug, Clone, Default)]
pub struct DualNumber {
    real: f64,
    gradient: Gradient,
    hessian: Option<Hessian>,
}

impl DualNumber {
    /// A constant: no sensitivities.
    pub fn constant(real: f64) -> Self {
        Self {
            real,
            gradient: Gradient::new(),
            hessian: None,
        }
    }

    /// A first-order seed variable: gradient `{id: 1.0}`.
    pub fn variable(real: f64, id: VariableId) -> Self {
        Self::seed(real, id, AdOrder::First)
    }

    /// Seed `id` at the requested derivative order.
    ///
    /// `AdOrder::Zero` yields a constant, `AdOrder::Second` additionally
    /// carries an (empty) Hessian.
    pub fn seed(real: f64, id: VariableId, order: AdOrder) -> Self {
        match order {
            AdOrder::Zero => Self::constant(real),
            AdOrder::First => Self {
                real,
                gradient: Gradient::from([(id, 1.0)]),
                hessian: None,
            },
            AdOrder::Second => Self {
                real,
                gradient: Gradient::from([(id, 1.0)]),
                hessian: Some(Hessian::new()),
            },
        }
    }

    /// Assemble a value from explicit parts, pruning exact zeros.
    ///
    /// Hessian keys are normalised so `(a, b)` and `(b, a)` address the same
    /// entry; duplicates are summed.
    pub fn from_parts(real: f64, gradient: Gradient, hessian: Option<Hessian>) -> Self {
        let hessian = hessian.map(|h| {
            let mut normalised = Hessian::new();
            for ((a, b), v) in h {
                *normalised.entry(pair(a, b)).or_insert(0.0) += v;
            }
            normalised
        });
        let mut out = Self {
            real,
            gradient,
            hessian,
        };
        out.prune();
        out
    }

    /// Real part.
    #[inline]
    pub fn real(&self) -> f64 {
        self.real
    }

    /// Sparse first derivatives.
    #[inline]
    pub fn gradient(&self) -> &Gradient {
        &self.gradient
    }

    /// Sparse second derivatives, if this value is second order.
    #[inline]
    pub fn hessian(&self) -> Option<&Hessian> {
        self.hessian.as_ref()
    }

    /// First partial with respect to `id` (zero when absent).
    pub fn partial(&self, id: VariableId) -> f64 {
        self.gradient.get(&id).copied().unwrap_or(0.0)
    }

    /// Second partial with respect to `a` and `b` (zero when absent).
    pub fn second_partial(&self, a: VariableId, b: VariableId) -> f64 {
        self.hessian
            .as_ref()
            .and_then(|h| h.get(&pair(a, b)).copied())
            .unwrap_or(0.0)
    }

    /// Derivative order actually carried by this value.
    pub fn order(&self) -> AdOrder {
        if self.hessian.is_some() {
            AdOrder::Second
        } else if self.gradient.is_empty() {
            AdOrder::Zero
        } else {
            AdOrder::First
        }
    }

    /// Returns `true` if the value depends on no variable.
    pub fn is_constant(&self) -> bool {
        self.gradient.is_empty() && self.hessian.as_ref().map_or(true, |h| h.is_empty())
    }

    /// Iterator over the variables this value depends on.
    pub fn variables(&self) -> impl Iterator<Item = VariableId> + '_ {
        self.gradient.keys().copied()
    }

    /// Discard all sensitivities and return the real part.
    #[inline]
    pub fn drop_sensitivities(self) -> f64 {
        self.real
    }

    /// Structural equality: real part, gradient and Hessian all match exactly.
    pub fn identical(&self, other: &DualNumber) -> bool {
        self.real.to_bits() == other.real.to_bits()
            && self.gradient == other.gradient
            && self.hessian == other.hessian
    }

    /// Exponential.
    pub fn exp(&self) -> Self {
        let e = self.real.exp();
        self.chain(e, e, e)
    }

    /// Natural logarithm.
    ///
    /// # Errors
    ///
    /// `DomainError` if the real part is not strictly positive.
    pub fn ln(&self) -> Result<Self, DomainError> {
        if !(self.real > 0.0) {
            return Err(DomainError::new("ln", self.real));
        }
        let x = self.real;
        Ok(self.chain(x.ln(), 1.0 / x, -1.0 / (x * x)))
    }

    /// Square root.
    ///
    /// # Errors
    ///
    /// `DomainError` if the real part is negative, or zero while carrying
    /// sensitivities (the derivative is unbounded there).
    pub fn sqrt(&self) -> Result<Self, DomainError> {
        let x = self.real;
        if x < 0.0 || (x == 0.0 && !self.is_constant()) || x.is_nan() {
            return Err(DomainError::new("sqrt", x));
        }
        let s = x.sqrt();
        if self.is_constant() {
            return Ok(Self::constant(s));
        }
        Ok(self.chain(s, 0.5 / s, -0.25 / (s * x)))
    }

    /// Reciprocal `1 / x`.
    ///
    /// # Errors
    ///
    /// `DomainError` if the real part is zero.
    pub fn recip(&self) -> Result<Self, DomainError> {
        let x = self.real;
        if x == 0.0 || x.is_nan() {
            return Err(DomainError::new("recip", x));
        }
        let r = 1.0 / x;
        Ok(self.chain(r, -r * r, 2.0 * r * r * r))
    }

    /// Integer power.
    ///
    /// # Errors
    ///
    /// `DomainError` for a zero base with a negative exponent.
    pub fn powi(&self, n: i32) -> Result<Self, DomainError> {
        let x = self.real;
        if n < 0 && x == 0.0 {
            return Err(DomainError::new("powi", x));
        }
        match n {
            0 => Ok(Self::constant(1.0)),
            1 => Ok(self.clone()),
            _ => {
                // Lowered exponents in f64: `n - 2` overflows for i32::MIN.
                let nf = f64::from(n);
                Ok(self.chain(
                    x.powi(n),
                    nf * x.powf(nf - 1.0),
                    nf * (nf - 1.0) * x.powf(nf - 2.0),
                ))
            }
        }
    }

    /// Real power with a constant exponent.
    ///
    /// Integral exponents defer to [`DualNumber::powi`]; otherwise the base
    /// must be positive (or zero for exponents of at least one).
    ///
    /// # Errors
    ///
    /// `DomainError` outside the real domain of `x^p`.
    pub fn powf(&self, p: f64) -> Result<Self, DomainError> {
        if p.fract() == 0.0 && p.abs() <= f64::from(i32::MAX) {
            return self.powi(p as i32);
        }
        let x = self.real;
        if x < 0.0 || (x == 0.0 && p < 1.0) || x.is_nan() {
            return Err(DomainError::new("powf", x));
        }
        Ok(self.chain(
            x.powf(p),
            p * x.powf(p - 1.0),
            p * (p - 1.0) * x.powf(p - 2.0),
        ))
    }

    /// Power with a dual exponent, `x^y = exp(y ln x)`.
    ///
    /// # Errors
    ///
    /// `DomainError` if the base is not strictly positive.
    pub fn pow(&self, exponent: &DualNumber) -> Result<Self, DomainError> {
        if exponent.is_constant() {
            return self.powf(exponent.real);
        }
        if !(self.real > 0.0) {
            return Err(DomainError::new("pow", self.real));
        }
        let mut out = (exponent * &self.ln()?).exp();
        out.real = self.real.powf(exponent.real);
        Ok(out)
    }

    /// Division by another dual number.
    ///
    /// # Errors
    ///
    /// `DomainError` if the divisor's real part is zero.
    pub fn checked_div(&self, rhs: &DualNumber) -> Result<Self, DomainError> {
        if rhs.real == 0.0 || rhs.real.is_nan() {
            return Err(DomainError::new("div", rhs.real));
        }
        if rhs.is_constant() {
            return Ok(self.div_real(rhs.real));
        }
        let mut out = self * &rhs.recip()?;
        out.real = self.real / rhs.real;
        Ok(out)
    }

    /// Division by a scalar.
    ///
    /// There is no `Div<f64>` operator; a zero divisor has to surface here
    /// rather than as an infinite real part.
    ///
    /// # Errors
    ///
    /// `DomainError` if `rhs` is zero or NaN.
    ///
    /// # Examples
    ///
    /// ```
    /// use pricer_core::types::{DualNumber, VariableSpace};
    ///
    /// let mut space = VariableSpace::new();
    /// let x = DualNumber::variable(6.0, space.next_id());
    /// assert_eq!(x.checked_div_f64(3.0).unwrap().real(), 2.0);
    /// assert!(x.checked_div_f64(0.0).is_err());
    /// ```
    pub fn checked_div_f64(&self, rhs: f64) -> Result<Self, DomainError> {
        if rhs == 0.0 || rhs.is_nan() {
            return Err(DomainError::new("div", rhs));
        }
        Ok(self.div_real(rhs))
    }

    /// Apply a scalar function `f` with value `f0`, first derivative `f1`
    /// and second derivative `f2` at the real part.
    fn chain(&self, f0: f64, f1: f64, f2: f64) -> Self {
        let gradient: Gradient = self
            .gradient
            .iter()
            .map(|(&k, &g)| (k, f1 * g))
            .collect();

        let hessian = self.hessian.as_ref().map(|h| {
            let mut out: Hessian = h.iter().map(|(&k, &v)| (k, f1 * v)).collect();
            if f2 != 0.0 {
                add_outer(&mut out, &self.gradient, &self.gradient, f2, true);
            }
            out
        });

        let mut out = Self {
            real: f0,
            gradient,
            hessian,
        };
        out.prune();
        out
    }

    fn scale(&self, k: f64) -> Self {
        self.chain(self.real * k, k, 0.0)
    }

    fn div_real(&self, rhs: f64) -> Self {
        let mut out = self.scale(1.0 / rhs);
        out.real = self.real / rhs;
        out
    }

    fn prune(&mut self) {
        self.gradient.retain(|_, v| *v != 0.0);
        if let Some(h) = self.hessian.as_mut() {
            h.retain(|_, v| *v != 0.0);
        }
    }
}

/// Second order survives a binary operation when every non-constant operand
/// is second order and at least one operand carries a Hessian.
fn combined_hessian_order(a: &DualNumber, b: &DualNumber) -> bool {
    let a_ok = a.hessian.is_some() || a.gradient.is_empty();
    let b_ok = b.hessian.is_some() || b.gradient.is_empty();
    a_ok && b_ok && (a.hessian.is_some() || b.hessian.is_some())
}

/// `h += k * (u vᵀ)` restricted to normalised pairs.
///
/// With `symmetric` set, `u` and `v` are the same vector and each unordered
/// pair is visited once with the product `u_i u_j`. Otherwise the
/// symmetrised product `u vᵀ + v uᵀ` is accumulated, which doubles the
/// diagonal.
fn add_outer(h: &mut Hessian, u: &Gradient, v: &Gradient, k: f64, symmetric: bool) {
    if symmetric {
        let entries: Vec<(VariableId, f64)> = u.iter().map(|(&id, &g)| (id, g)).collect();
        for (i, &(a, ga)) in entries.iter().enumerate() {
            for &(b, gb) in &entries[i..] {
                *h.entry(pair(a, b)).or_insert(0.0) += k * ga * gb;
            }
        }
    } else {
        // Both orderings of a pair land in one local sum first so the value
        // added to `h` does not depend on how the ids of `u` and `v` sort.
        let mut outer = Hessian::new();
        for (&a, &ga) in u {
            for (&b, &gb) in v {
                let w = if a == b { 2.0 } else { 1.0 };
                *outer.entry(pair(a, b)).or_insert(0.0) += w * ga * gb;
            }
        }
        for (key, value) in outer {
            *h.entry(key).or_insert(0.0) += k * value;
        }
    }
}

fn merge(lhs: &Gradient, rhs: &Gradient, ka: f64, kb: f64) -> Gradient {
    let mut out: Gradient = lhs.iter().map(|(&k, &v)| (k, ka * v)).collect();
    for (&k, &v) in rhs {
        *out.entry(k).or_insert(0.0) += kb * v;
    }
    out
}

fn merge_hessian(lhs: Option<&Hessian>, rhs: Option<&Hessian>, ka: f64, kb: f64) -> Hessian {
    let mut out: Hessian = lhs
        .map(|h| h.iter().map(|(&k, &v)| (k, ka * v)).collect())
        .unwrap_or_default();
    if let Some(h) = rhs {
        for (&k, &v) in h {
            *out.entry(k).or_insert(0.0) += kb * v;
        }
    }
    out
}

fn add_duals(a: &DualNumber, b: &DualNumber, sign: f64) -> DualNumber {
    let hessian = combined_hessian_order(a, b)
        .then(|| merge_hessian(a.hessian.as_ref(), b.hessian.as_ref(), 1.0, sign));
    let mut out = DualNumber {
        real: a.real + sign * b.real,
        gradient: merge(&a.gradient, &b.gradient, 1.0, sign),
        hessian,
    };
    out.prune();
    out
}

fn mul_duals(a: &DualNumber, b: &DualNumber) -> DualNumber {
    let hessian = combined_hessian_order(a, b).then(|| {
        let mut h = merge_hessian(a.hessian.as_ref(), b.hessian.as_ref(), b.real, a.real);
        add_outer(&mut h, &a.gradient, &b.gradient, 1.0, false);
        h
    });
    let mut out = DualNumber {
        real: a.real * b.real,
        gradient: merge(&a.gradient, &b.gradient, b.real, a.real),
        hessian,
    };
    out.prune();
    out
}

// ============================================================
// Operator implementations
// ============================================================

impl<'a, 'b> Add<&'b DualNumber> for &'a DualNumber {
    type Output = DualNumber;
    fn add(self, rhs: &'b DualNumber) -> DualNumber {
        add_duals(self, rhs, 1.0)
    }
}

impl<'a, 'b> Sub<&'b DualNumber> for &'a DualNumber {
    type Output = DualNumber;
    fn sub(self, rhs: &'b DualNumber) -> DualNumber {
        add_duals(self, rhs, -1.0)
    }
}

impl<'a, 'b> Mul<&'b DualNumber> for &'a DualNumber {
    type Output = DualNumber;
    fn mul(self, rhs: &'b DualNumber) -> DualNumber {
        mul_duals(self, rhs)
    }
}

macro_rules! forward_owned_binop {
    ($trait:ident, $method:ident) => {
        impl $trait<DualNumber> for DualNumber {
            type Output = DualNumber;
            fn $method(self, rhs: DualNumber) -> DualNumber {
                (&self).$method(&rhs)
            }
        }

        impl<'a> $trait<&'a DualNumber> for DualNumber {
            type Output = DualNumber;
            fn $method(self, rhs: &'a DualNumber) -> DualNumber {
                (&self).$method(rhs)
            }
        }

        impl<'a> $trait<DualNumber> for &'a DualNumber {
            type Output = DualNumber;
            fn $method(self, rhs: DualNumber) -> DualNumber {
                self.$method(&rhs)
            }
        }
    };
}

forward_owned_binop!(Add, add);
forward_owned_binop!(Sub, sub);
forward_owned_binop!(Mul, mul);

impl<'a> Add<f64> for &'a DualNumber {
    type Output = DualNumber;
    fn add(self, rhs: f64) -> DualNumber {
        let mut out = self.clone();
        out.real += rhs;
        out
    }
}

impl<'a> Sub<f64> for &'a DualNumber {
    type Output = DualNumber;
    fn sub(self, rhs: f64) -> DualNumber {
        let mut out = self.clone();
        out.real -= rhs;
        out
    }
}

impl<'a> Mul<f64> for &'a DualNumber {
    type Output = DualNumber;
    fn mul(self, rhs: f64) -> DualNumber {
        self.scale(rhs)
    }
}

impl<'a> Add<&'a DualNumber> for f64 {
    type Output = DualNumber;
    fn add(self, rhs: &'a DualNumber) -> DualNumber {
        rhs + self
    }
}

impl<'a> Sub<&'a DualNumber> for f64 {
    type Output = DualNumber;
    fn sub(self, rhs: &'a DualNumber) -> DualNumber {
        let mut out = -rhs;
        out.real = self - rhs.real;
        out
    }
}

impl<'a> Mul<&'a DualNumber> for f64 {
    type Output = DualNumber;
    fn mul(self, rhs: &'a DualNumber) -> DualNumber {
        rhs.scale(self)
    }
}

macro_rules! forward_scalar_binop {
    ($trait:ident, $method:ident) => {
        impl $trait<f64> for DualNumber {
            type Output = DualNumber;
            fn $method(self, rhs: f64) -> DualNumber {
                (&self).$method(rhs)
            }
        }
    };
}

forward_scalar_binop!(Add, add);
forward_scalar_binop!(Sub, sub);
forward_scalar_binop!(Mul, mul);

macro_rules! forward_scalar_lhs_binop {
    ($trait:ident, $method:ident) => {
        impl $trait<DualNumber> for f64 {
            type Output = DualNumber;
            fn $method(self, rhs: DualNumber) -> DualNumber {
                self.$method(&rhs)
            }
        }
    };
}

forward_scalar_lhs_binop!(Add, add);
forward_scalar_lhs_binop!(Sub, sub);
forward_scalar_lhs_binop!(Mul, mul);

impl<'a> Neg for &'a DualNumber {
    type Output = DualNumber;
    fn neg(self) -> DualNumber {
        DualNumber {
            real: -self.real,
            gradient: self.gradient.iter().map(|(&k, &v)| (k, -v)).collect(),
            hessian: self
                .hessian
                .as_ref()
                .map(|h| h.iter().map(|(&k, &v)| (k, -v)).collect()),
        }
    }
}

impl Neg for DualNumber {
    type Output = DualNumber;
    fn neg(self) -> DualNumber {
        -&self
    }
}

impl From<f64> for DualNumber {
    fn from(real: f64) -> Self {
        Self::constant(real)
    }
}

impl PartialEq for DualNumber {
    fn eq(&self, other: &Self) -> bool {
        self.real == other.real
    }
}

impl PartialEq<f64> for DualNumber {
    fn eq(&self, other: &f64) -> bool {
        self.real == *other
    }
}

impl PartialOrd for DualNumber {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        self.real.partial_cmp(&other.real)
    }
}

impl PartialOrd<f64> for DualNumber {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.real.partial_cmp(other)
    }
}

impl Zero for DualNumber {
    fn zero() -> Self {
        Self::constant(0.0)
    }

    fn is_zero(&self) -> bool {
        self.real == 0.0 && self.is_constant()
    }
}

impl One for DualNumber {
    fn one() -> Self {
        Self::constant(1.0)
    }
}

impl Sum for DualNumber {
    fn sum<I: Iterator<Item = DualNumber>>(iter: I) -> Self {
        iter.fold(DualNumber::zero(), |acc, x| acc + x)
    }
}

impl<'a> Sum<&'a DualNumber> for DualNumber {
    fn sum<I: Iterator<Item = &'a DualNumber>>(iter: I) -> Self {
        iter.fold(DualNumber::zero(), |acc, x| acc + x)
    }
}

impl fmt::Display for DualNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.real)?;
        if !self.gradient.is_empty() {
            write!(f, " [")?;
            for (i, (k, v)) in self.gradient.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "d/d{}: {}", k, v)?;
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

// ============================================================
// num-dual interop
// ============================================================

#[cfg(feature = "num-dual-mode")]
impl DualNumber {
    /// Project onto a single direction as a `num_dual::Dual64`.
    ///
    /// The dual part is the directional derivative `Σ gradient[id] * dir[id]`
    /// (directions absent from `direction` count as zero).
    pub fn to_dual64_along(&self, direction: &Gradient) -> num_dual::Dual64 {
        let eps = self
            .gradient
            .iter()
            .map(|(k, v)| v * direction.get(k).copied().unwrap_or(0.0))
            .sum();
        num_dual::Dual64::new(self.real, eps)
    }

    /// Lift a `num_dual::Dual64` whose dual part is the derivative with
    /// respect to `id`.
    pub fn from_dual64(value: num_dual::Dual64, id: VariableId) -> Self {
        Self::from_parts(value.re, Gradient::from([(id, value.eps)]), None)
    }
}
