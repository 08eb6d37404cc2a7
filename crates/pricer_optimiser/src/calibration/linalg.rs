//! Dense linear algebra for solver steps.
//!
//! Every routine works on the row-weighted system `A = W^1/2 J`,
//! `b = W^1/2 r`, so the objective is `|b|` and the linearised problem is
//! `min |A dx + b|`.

use nalgebra::{DMatrix, DVector};

/// Numerical rank below what the system needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RankDeficiency {
    pub rank: usize,
    pub expected: usize,
}

/// Scale row `i` of `j` by `sqrt_w[i]`.
pub(crate) fn weight_rows(j: &DMatrix<f64>, sqrt_w: &DVector<f64>) -> DMatrix<f64> {
    let mut a = j.clone();
    for (i, &w) in sqrt_w.iter().enumerate() {
        a.row_mut(i).scale_mut(w);
    }
    a
}

/// `|W^1/2 r|`.
pub(crate) fn weighted_norm(r: &DVector<f64>, sqrt_w: &DVector<f64>) -> f64 {
    r.component_mul(sqrt_w).norm()
}

fn absolute_threshold(singular_values: &DVector<f64>, relative: f64) -> f64 {
    if singular_values.is_empty() {
        0.0
    } else {
        relative * singular_values.max()
    }
}

/// Least-squares step `dx = -A^+ b`.
///
/// Fails when the numerical rank (singular values above `relative_tol`
/// times the largest) is below `min(rows, cols)`.
pub(crate) fn gauss_newton_step(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    relative_tol: f64,
) -> Result<DVector<f64>, RankDeficiency> {
    let expected = a.nrows().min(a.ncols());
    let svd = a.clone().svd(true, true);
    let eps = absolute_threshold(&svd.singular_values, relative_tol);
    let rank = svd.rank(eps);
    if rank < expected {
        return Err(RankDeficiency { rank, expected });
    }
    svd.solve(b, eps)
        .map(|x| -x)
        .map_err(|_| RankDeficiency { rank, expected })
}

/// Damped step `(A'A + lambda I) dx = -A'b`.
pub(crate) fn levenberg_marquardt_step(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    lambda: f64,
) -> Option<DVector<f64>> {
    let mut normal = a.tr_mul(a);
    for i in 0..normal.nrows() {
        normal[(i, i)] += lambda;
    }
    let rhs = a.tr_mul(b);
    match normal.clone().cholesky() {
        Some(chol) => Some(-chol.solve(&rhs)),
        None => normal.lu().solve(&rhs).map(|x| -x),
    }
}

/// Steepest descent along `g = A'b` with the step length minimising the
/// linearised objective: `alpha = g'g / |A g|^2`.
pub(crate) fn gradient_descent_step(a: &DMatrix<f64>, b: &DVector<f64>) -> Option<DVector<f64>> {
    let g = a.tr_mul(b);
    let ag = a * &g;
    let denom = ag.norm_squared();
    if !(denom > 0.0) {
        return None;
    }
    let alpha = g.norm_squared() / denom;
    Some(g * -alpha)
}

/// Moore-Penrose pseudo-inverse with a relative singular value cut-off.
pub(crate) fn pseudo_inverse(a: &DMatrix<f64>, relative_tol: f64) -> Option<DMatrix<f64>> {
    let svd = a.clone().svd(true, true);
    let eps = absolute_threshold(&svd.singular_values, relative_tol);
    svd.pseudo_inverse(eps).ok()
}

/// Columns of `a` that are identically zero.
pub(crate) fn zero_columns(a: &DMatrix<f64>) -> Vec<usize> {
    a.column_iter()
        .enumerate()
        .filter(|(_, col)| col.iter().all(|&v| v == 0.0))
        .map(|(j, _)| j)
        .collect()
}
