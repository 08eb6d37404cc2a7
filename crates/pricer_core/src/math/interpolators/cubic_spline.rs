//! Cubic splines over dual-valued nodes.
//!
//! Both fits store the same piecewise polynomial form and share evaluation
//! and tangent extrapolation; they differ in how the node slopes are chosen.

use crate::types::{DomainError, DualNumber};

/// Polynomial coefficients for a cubic spline segment.
///
/// Represents a cubic polynomial: `y = a + b*(x-xi) + c*(x-xi)² + d*(x-xi)³`
#[derive(Debug, Clone)]
struct SplineCoeffs {
    a: DualNumber,
    b: DualNumber,
    c: DualNumber,
    d: DualNumber,
}

/// Piecewise cubic through dual-valued nodes.
///
/// [`natural`](Self::natural) is C² with zero second derivative at both
/// ends. Its tridiagonal matrix depends only on the node positions, so the
/// Thomas sweep runs its pivots in `f64` and only the right-hand side carries
/// sensitivities.
///
/// [`monotone`](Self::monotone) is a C¹ Hermite cubic with Fritsch-Carlson
/// slopes: it never overshoots the data, so monotone nodes give a monotone
/// curve.
#[derive(Debug, Clone)]
pub(super) struct CubicSpline {
    coeffs: Vec<SplineCoeffs>,
    end_value: DualNumber,
    end_slope: DualNumber,
}

impl CubicSpline {
    /// Fit a natural spline; requires at least three nodes.
    pub(super) fn natural(xs: &[f64], ys: &[DualNumber]) -> Self {
        let n = xs.len();
        debug_assert!(n >= 3, "natural spline needs at least 3 nodes");
        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let slopes = secants(&h, ys);

        // Second derivatives M; the natural boundary pins M[0] = M[n-1] = 0.
        let m = n - 2;
        let mut c_prime: Vec<f64> = Vec::with_capacity(m);
        let mut d_prime: Vec<DualNumber> = Vec::with_capacity(m);
        for k in 0..m {
            let diag = 2.0 * (h[k] + h[k + 1]);
            let sup = if k + 1 < m { h[k + 1] } else { 0.0 };
            let rhs = (&slopes[k + 1] - &slopes[k]) * 6.0;
            if k == 0 {
                c_prime.push(sup / diag);
                d_prime.push(rhs * (1.0 / diag));
            } else {
                let sub = h[k];
                let denom = diag - sub * c_prime[k - 1];
                c_prime.push(sup / denom);
                d_prime.push((rhs - &d_prime[k - 1] * sub) * (1.0 / denom));
            }
        }

        let mut second = vec![DualNumber::constant(0.0); n];
        for k in (0..m).rev() {
            second[k + 1] = if k + 1 < m {
                &d_prime[k] - &second[k + 2] * c_prime[k]
            } else {
                d_prime[k].clone()
            };
        }

        let coeffs: Vec<SplineCoeffs> = (0..n - 1)
            .map(|i| {
                let hi = h[i];
                SplineCoeffs {
                    a: ys[i].clone(),
                    b: &slopes[i] - (&second[i] * 2.0 + &second[i + 1]) * (hi / 6.0),
                    c: &second[i] * 0.5,
                    d: (&second[i + 1] - &second[i]) * (1.0 / (6.0 * hi)),
                }
            })
            .collect();

        Self::from_coeffs(coeffs, &h, ys)
    }

    /// Fit a monotone Hermite spline; requires at least three nodes.
    ///
    /// Interior slopes are the weighted harmonic mean of the neighbouring
    /// secants, or zero where the data turns. End slopes use the one-sided
    /// three-point formula, clipped to keep the end segments monotone.
    ///
    /// # Errors
    ///
    /// `DomainError` if a harmonic mean has no real value, which only
    /// happens for non-finite node values.
    pub(super) fn monotone(xs: &[f64], ys: &[DualNumber]) -> Result<Self, DomainError> {
        let n = xs.len();
        debug_assert!(n >= 3, "monotone spline needs at least 3 nodes");
        let h: Vec<f64> = xs.windows(2).map(|w| w[1] - w[0]).collect();
        let delta = secants(&h, ys);

        let mut tangents = Vec::with_capacity(n);
        tangents.push(end_tangent(h[0], h[1], &delta[0], &delta[1]));
        for k in 1..n - 1 {
            let (left, right) = (&delta[k - 1], &delta[k]);
            if left.real() * right.real() <= 0.0 {
                tangents.push(DualNumber::constant(0.0));
                continue;
            }
            let w1 = 2.0 * h[k] + h[k - 1];
            let w2 = h[k] + 2.0 * h[k - 1];
            let numerator = (left * right) * (w1 + w2);
            let denominator = &(right * w1) + &(left * w2);
            tangents.push(numerator.checked_div(&denominator)?);
        }
        tangents.push(end_tangent(h[n - 2], h[n - 3], &delta[n - 2], &delta[n - 3]));

        let coeffs: Vec<SplineCoeffs> = (0..n - 1)
            .map(|i| {
                let hi = h[i];
                let (m0, m1) = (&tangents[i], &tangents[i + 1]);
                SplineCoeffs {
                    a: ys[i].clone(),
                    b: m0.clone(),
                    c: (&delta[i] * 3.0 - m0 * 2.0 - m1) * (1.0 / hi),
                    d: (m0 + m1 - &delta[i] * 2.0) * (1.0 / (hi * hi)),
                }
            })
            .collect();

        Ok(Self::from_coeffs(coeffs, &h, ys))
    }

    fn from_coeffs(coeffs: Vec<SplineCoeffs>, h: &[f64], ys: &[DualNumber]) -> Self {
        let n = ys.len();
        let last = &coeffs[n - 2];
        let hl = h[n - 2];
        let end_slope = &last.b + &last.c * (2.0 * hl) + &last.d * (3.0 * hl * hl);

        Self {
            coeffs,
            end_value: ys[n - 1].clone(),
            end_slope,
        }
    }

    /// Evaluate on segment `i`; right of the last node follow the tangent.
    pub(super) fn evaluate(&self, xs: &[f64], i: usize, x: f64) -> DualNumber {
        let last = xs[xs.len() - 1];
        if x > last {
            return &self.end_value + &self.end_slope * (x - last);
        }
        let s = &self.coeffs[i];
        let dx = x - xs[i];
        &s.a + (&s.b + (&s.c + &s.d * dx) * dx) * dx
    }
}

fn secants(h: &[f64], ys: &[DualNumber]) -> Vec<DualNumber> {
    h.iter()
        .enumerate()
        .map(|(i, &hi)| (&ys[i + 1] - &ys[i]) * (1.0 / hi))
        .collect()
}

/// One-sided slope at an end node from the adjacent interval `h0` with
/// secant `d0` and the next one in `h1`, `d1`.
fn end_tangent(h0: f64, h1: f64, d0: &DualNumber, d1: &DualNumber) -> DualNumber {
    let m = (d0 * (2.0 * h0 + h1) - d1 * h0) * (1.0 / (h0 + h1));
    if m.real() * d0.real() <= 0.0 {
        DualNumber::constant(0.0)
    } else if d0.real() * d1.real() <= 0.0 && m.real().abs() > 3.0 * d0.real().abs() {
        d0 * 3.0
    } else {
        m
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariableSpace;
    use approx::assert_relative_eq;

    fn constants(v: &[f64]) -> Vec<DualNumber> {
        v.iter().map(|&y| DualNumber::constant(y)).collect()
    }

    #[test]
    fn test_three_point_natural_spline() {
        // Symmetric data: the spline peaks at the middle node with zero slope.
        let xs = [0.0, 1.0, 2.0];
        let spline = CubicSpline::natural(&xs, &constants(&[0.0, 1.0, 0.0]));
        assert_relative_eq!(spline.evaluate(&xs, 0, 1.0).real(), 1.0, epsilon = 1e-14);
        let left = spline.evaluate(&xs, 0, 0.5).real();
        let right = spline.evaluate(&xs, 1, 1.5).real();
        assert_relative_eq!(left, right, epsilon = 1e-14);
    }

    #[test]
    fn test_continuity_at_interior_nodes() {
        let xs = [0.0, 1.0, 2.5, 4.0, 6.0];
        let spline = CubicSpline::natural(&xs, &constants(&[0.0, 0.8, 0.9, 1.4, 1.2]));
        for i in 1..xs.len() - 1 {
            let from_left = {
                let s = &spline.coeffs[i - 1];
                let h = xs[i] - xs[i - 1];
                (
                    (&s.a + (&s.b + (&s.c + &s.d * h) * h) * h).real(),
                    (&s.b + &s.c * (2.0 * h) + &s.d * (3.0 * h * h)).real(),
                    (&s.c * 2.0 + &s.d * (6.0 * h)).real(),
                )
            };
            let s = &spline.coeffs[i];
            assert_relative_eq!(from_left.0, s.a.real(), epsilon = 1e-12);
            assert_relative_eq!(from_left.1, s.b.real(), epsilon = 1e-12);
            assert_relative_eq!(from_left.2, 2.0 * s.c.real(), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_tangent_extrapolation() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let spline = CubicSpline::natural(&xs, &constants(&[0.0, 2.0, 4.0, 6.0]));
        assert_relative_eq!(spline.evaluate(&xs, 2, 4.0).real(), 8.0, epsilon = 1e-12);
    }

    // ========================================
    // Monotone Hermite
    // ========================================

    fn sample(spline: &CubicSpline, xs: &[f64], x: f64) -> f64 {
        let i = xs[..xs.len() - 1]
            .iter()
            .rposition(|&node| node <= x)
            .unwrap_or(0);
        spline.evaluate(xs, i, x).real()
    }

    #[test]
    fn test_monotone_spline_does_not_overshoot_a_steep_drop() {
        // Log discount factors with a near-flat first segment before a cliff.
        let xs = [0.0, 1.0, 2.0, 3.0];
        let logs: Vec<f64> = [1.0_f64, 0.999, 0.5, 0.499].iter().map(|d| d.ln()).collect();
        let spline = CubicSpline::monotone(&xs, &constants(&logs)).unwrap();

        let mut prev = sample(&spline, &xs, 0.0);
        assert_eq!(prev, 0.0);
        for k in 1..=300 {
            let v = sample(&spline, &xs, k as f64 * 0.01);
            assert!(v <= 0.0, "above ln 1 at {}", k as f64 * 0.01);
            assert!(v < prev, "not decreasing at {}", k as f64 * 0.01);
            prev = v;
        }

        // The natural fit of the same nodes rises above zero near the start.
        let natural = CubicSpline::natural(&xs, &constants(&logs));
        assert!(sample(&natural, &xs, 0.01) > 0.0);
    }

    #[test]
    fn test_monotone_spline_interpolates_nodes() {
        let xs = [0.0, 0.5, 2.0, 5.0, 10.0];
        let ys = [0.0, -0.01, -0.05, -0.16, -0.40];
        let spline = CubicSpline::monotone(&xs, &constants(&ys)).unwrap();
        for i in 0..xs.len() - 1 {
            assert_relative_eq!(spline.evaluate(&xs, i, xs[i]).real(), ys[i], epsilon = 1e-15);
            let h = xs[i + 1] - xs[i];
            let s = &spline.coeffs[i];
            let end = (&s.a + (&s.b + (&s.c + &s.d * h) * h) * h).real();
            assert_relative_eq!(end, ys[i + 1], epsilon = 1e-14);
        }
    }

    #[test]
    fn test_monotone_spline_reproduces_a_line() {
        let xs = [0.0, 1.0, 3.0, 7.0];
        let spline = CubicSpline::monotone(&xs, &constants(&[0.0, -0.03, -0.09, -0.21])).unwrap();
        assert_relative_eq!(sample(&spline, &xs, 2.2), -0.066, epsilon = 1e-14);
        assert_relative_eq!(sample(&spline, &xs, 9.0), -0.27, epsilon = 1e-14);
    }

    #[test]
    fn test_monotone_spline_flat_at_turning_node() {
        let xs = [0.0, 1.0, 2.0];
        let spline = CubicSpline::monotone(&xs, &constants(&[0.0, 1.0, 0.0])).unwrap();
        assert_eq!(spline.coeffs[1].b.real(), 0.0);
        for k in 0..=100 {
            assert!(sample(&spline, &xs, k as f64 * 0.02) <= 1.0);
        }
    }

    #[test]
    fn test_monotone_spline_carries_node_sensitivities() {
        let mut space = VariableSpace::new();
        let ids: Vec<_> = (0..4).map(|_| space.allocate()).collect();
        let xs = [0.0, 1.0, 2.0, 4.0];
        let ys: Vec<DualNumber> = [0.0, -0.02, -0.05, -0.12]
            .iter()
            .zip(&ids)
            .map(|(&v, &id)| DualNumber::variable(v, id))
            .collect();
        let spline = CubicSpline::monotone(&xs, &ys).unwrap();

        // At a node the value depends on that node alone.
        let at_node = spline.evaluate(&xs, 2, 2.0);
        assert_eq!(at_node.partial(ids[2]), 1.0);

        // Between nodes the weights of a Hermite cubic sum to one.
        let inside = spline.evaluate(&xs, 1, 1.4);
        let total: f64 = ids.iter().map(|&id| inside.partial(id)).sum();
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }
}
