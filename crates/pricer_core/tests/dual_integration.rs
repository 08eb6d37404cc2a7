//! Integration tests for the sparse dual number type.
//!
//! Verifies chain-rule exactness against central finite differences on
//! randomised inputs, union-of-variables behaviour for disjoint operands,
//! second-order propagation, and agreement with `num_dual::Dual64` along a
//! single direction.

use approx::assert_relative_eq;
use pricer_core::types::{AdOrder, DualNumber, DomainError, VariableId, VariableSpace};
use proptest::prelude::*;

/// f(x, y) = exp(x y) ln(y) / (1 + x²) + sqrt(y) x³ − y^1.5
fn expression(x: &DualNumber, y: &DualNumber) -> Result<DualNumber, DomainError> {
    let num = (x * y).exp() * y.ln()?;
    let den = x.powi(2)? + 1.0;
    Ok(num.checked_div(&den)? + y.sqrt()? * x.powi(3)? - y.powf(1.5)?)
}

fn expression_f64(x: f64, y: f64) -> f64 {
    (x * y).exp() * y.ln() / (1.0 + x * x) + y.sqrt() * x.powi(3) - y.powf(1.5)
}

fn seeded(order: AdOrder, x: f64, y: f64) -> (VariableId, VariableId, DualNumber, DualNumber) {
    let mut space = VariableSpace::new();
    let (a, b) = (space.allocate(), space.allocate());
    (a, b, DualNumber::seed(x, a, order), DualNumber::seed(y, b, order))
}

// ================================================================
// Chain rule against finite differences
// ================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn test_gradient_matches_central_difference(x in -1.5f64..1.5, y in 0.2f64..3.0) {
        let (a, b, dx, dy) = seeded(AdOrder::First, x, y);
        let z = expression(&dx, &dy).unwrap();
        prop_assert!((z.real() - expression_f64(x, y)).abs() < 1e-12 * (1.0 + z.real().abs()));

        let h = 1e-6;
        let fd_x = (expression_f64(x + h, y) - expression_f64(x - h, y)) / (2.0 * h);
        let fd_y = (expression_f64(x, y + h) - expression_f64(x, y - h)) / (2.0 * h);
        let tol = 1e-6 * (1.0 + fd_x.abs().max(fd_y.abs()));
        prop_assert!((z.partial(a) - fd_x).abs() < tol, "d/dx: {} vs {}", z.partial(a), fd_x);
        prop_assert!((z.partial(b) - fd_y).abs() < tol, "d/dy: {} vs {}", z.partial(b), fd_y);
    }

    #[test]
    fn test_hessian_matches_difference_of_gradients(x in -1.0f64..1.0, y in 0.5f64..2.0) {
        let (a, b, dx, dy) = seeded(AdOrder::Second, x, y);
        let z = expression(&dx, &dy).unwrap();

        let grad_at = |x: f64, y: f64| {
            let (a, b, dx, dy) = seeded(AdOrder::First, x, y);
            let z = expression(&dx, &dy).unwrap();
            (z.partial(a), z.partial(b))
        };
        let h = 1e-5;
        let (gxp, gyp) = grad_at(x + h, y);
        let (gxm, gym) = grad_at(x - h, y);
        let (gxq, _) = grad_at(x, y + h);
        let (gxr, _) = grad_at(x, y - h);

        let hxx = (gxp - gxm) / (2.0 * h);
        let hxy = (gyp - gym) / (2.0 * h);
        let hyx = (gxq - gxr) / (2.0 * h);
        let tol = 1e-5 * (1.0 + hxx.abs().max(hxy.abs()));

        prop_assert!((z.second_partial(a, a) - hxx).abs() < tol);
        prop_assert!((z.second_partial(a, b) - hxy).abs() < tol);
        prop_assert!((z.second_partial(b, a) - hyx).abs() < tol);
    }

    #[test]
    fn test_disjoint_operands_keep_all_sensitivities(
        a_vals in proptest::collection::vec(0.1f64..2.0, 1..5),
        b_vals in proptest::collection::vec(0.1f64..2.0, 1..5),
    ) {
        let mut space = VariableSpace::new();
        let a_ids: Vec<VariableId> = a_vals.iter().map(|_| space.allocate()).collect();
        let b_ids: Vec<VariableId> = b_vals.iter().map(|_| space.allocate()).collect();

        let a: DualNumber = a_vals.iter().zip(&a_ids)
            .map(|(&v, &id)| DualNumber::variable(v, id) * v)
            .sum();
        let b: DualNumber = b_vals.iter().zip(&b_ids)
            .map(|(&v, &id)| DualNumber::variable(v, id).exp())
            .sum();

        let z = &a * &b;
        prop_assert_eq!(z.gradient().len(), a_ids.len() + b_ids.len());
        for id in &a_ids {
            prop_assert!((z.partial(*id) - b.real() * a.partial(*id)).abs() < 1e-12 * (1.0 + z.partial(*id).abs()));
        }
        for id in &b_ids {
            prop_assert!((z.partial(*id) - a.real() * b.partial(*id)).abs() < 1e-12 * (1.0 + z.partial(*id).abs()));
        }

        let s = &a + &b;
        for id in a_ids.iter().chain(&b_ids) {
            prop_assert_eq!(s.partial(*id), a.partial(*id) + b.partial(*id));
        }
    }
}

// ================================================================
// Second order symmetry
// ================================================================

#[test]
fn test_hessian_is_symmetric_by_construction() {
    let (a, b, x, y) = seeded(AdOrder::Second, 0.3, 1.7);
    let z = expression(&x, &y).unwrap();
    assert_eq!(z.second_partial(a, b), z.second_partial(b, a));
    let h = z.hessian().unwrap();
    assert!(h.keys().all(|(p, q)| p <= q), "keys must be normalised");
}

#[test]
fn test_domain_errors_name_the_function() {
    let (_, _, x, _) = seeded(AdOrder::First, -0.5, 1.0);
    assert_eq!(x.ln().unwrap_err().function, "ln");
    assert_eq!(x.sqrt().unwrap_err().function, "sqrt");
    assert_eq!(x.powf(0.5).unwrap_err().function, "powf");
}

// ================================================================
// num-dual cross-check
// ================================================================

#[cfg(feature = "num-dual-mode")]
#[test]
fn test_directional_derivative_matches_num_dual() {
    use num_dual::{Dual64, DualNum};
    use pricer_core::types::Gradient;

    let (x0, y0) = (0.4, 1.3);
    let (a, b, x, y) = seeded(AdOrder::First, x0, y0);
    let z = (&x * &y).exp() * y.ln().unwrap() + &x * &x * &y;

    let xd = Dual64::new(x0, 1.0);
    let yd = Dual64::new(y0, 0.0);
    let zd = (xd * yd).exp() * yd.ln() + xd * xd * yd;

    let along_x = z.to_dual64_along(&Gradient::from([(a, 1.0)]));
    assert_relative_eq!(along_x.re, zd.re, epsilon = 1e-14);
    assert_relative_eq!(along_x.eps, zd.eps, epsilon = 1e-12);

    let lifted = DualNumber::from_dual64(zd, a);
    assert_relative_eq!(lifted.partial(a), z.partial(a), epsilon = 1e-12);
    assert_eq!(lifted.partial(b), 0.0);
}
