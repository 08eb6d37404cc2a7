//! Quote-space risk.
//!
//! A priced [`DualNumber`] carries derivatives with respect to curve node
//! variables. [`RiskLadder`] turns them into derivatives with respect to the
//! quotes the curves were calibrated to, using the sensitivities each
//! [`Calibration`] reports:
//!
//! ```text
//! d price / d s = d price / d x * d x / d s
//! d price / d u += d price / d x * d x / d u
//! ```
//!
//! Calibrations are walked from the last pushed to the first, so the
//! gradient a downstream curve passes to its frozen upstream variables is
//! attributed to the upstream quotes in turn. A pre-solved ladder and a
//! single simultaneous calibration of the same quotes report the same
//! deltas.
//!
//! ## Gamma
//!
//! Second-order prices against calibrations run at [`AdOrder::Second`] give
//! quote gamma. Each step changes variables from `(x, y)` to `(s, y)`, where
//! `x` are the calibration's free nodes and `y` everything else:
//!
//! ```text
//! H_s = Eᵀ H E - Σ_i δ_i Zᵀ H_i Z
//! ```
//!
//! `E` is the Jacobian of the old variables in the new ones, `Z` that of
//! the calibration's free and upstream nodes, `H_i` the Hessian of
//! instrument `i` and `δ_i` the price's delta to quote `i`. The second term
//! is the curvature of the calibrated nodes themselves, taking the
//! instruments as repriced exactly at their quotes.
//!
//! [`AdOrder::Second`]: pricer_core::types::AdOrder::Second

use crate::calibration::Calibration;
use crate::error::CalibrationError;
use nalgebra::{DMatrix, DVector};
use pricer_core::types::{DualNumber, Gradient, VariableId};
use std::collections::{BTreeMap, BTreeSet};

/// Sensitivity to one calibration quote.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteDelta {
    /// Position of the calibration in the ladder
    pub calibration: usize,
    /// Row of the instrument in its calibration
    pub instrument: usize,
    /// Instrument label
    pub label: String,
    /// `d price / d quote`
    pub delta: f64,
}

/// Quote deltas of one price.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeltaReport {
    /// Every quote of every calibration, ladder order then row order
    pub quotes: Vec<QuoteDelta>,
    /// Gradient entries no calibration accounts for
    pub unattributed: Gradient,
}

impl DeltaReport {
    /// Delta to the first quote labelled `label`.
    pub fn by_label(&self, label: &str) -> Option<f64> {
        self.quotes
            .iter()
            .find(|q| q.label == label)
            .map(|q| q.delta)
    }

    /// Deltas of one calibration in row order.
    pub fn for_calibration(&self, calibration: usize) -> Vec<f64> {
        self.quotes
            .iter()
            .filter(|q| q.calibration == calibration)
            .map(|q| q.delta)
            .collect()
    }

    /// Whether every sensitivity was mapped to a quote.
    pub fn is_complete(&self) -> bool {
        self.unattributed.is_empty()
    }
}

/// One calibration quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteKey {
    /// Position of the calibration in the ladder
    pub calibration: usize,
    /// Row of the instrument in its calibration
    pub instrument: usize,
    /// Instrument label
    pub label: String,
}

/// Quote gamma of one price.
#[derive(Debug, Clone, PartialEq)]
pub struct GammaReport {
    /// Every quote of every calibration, ladder order then row order
    pub quotes: Vec<QuoteKey>,
    /// `d² price / d quote_a d quote_b`, rows and columns as `quotes`
    pub matrix: DMatrix<f64>,
    /// Quote deltas of the same price, in `quotes` order
    pub deltas: DVector<f64>,
    /// Variables no calibration accounts for
    pub unattributed: Vec<VariableId>,
}

impl GammaReport {
    /// Cross gamma of the first quotes labelled `a` and `b`.
    pub fn by_labels(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.quotes.iter().position(|q| q.label == a)?;
        let j = self.quotes.iter().position(|q| q.label == b)?;
        Some(self.matrix[(i, j)])
    }

    /// Gamma block of one calibration's quotes.
    pub fn for_calibration(&self, calibration: usize) -> DMatrix<f64> {
        let rows: Vec<usize> = self
            .quotes
            .iter()
            .enumerate()
            .filter(|(_, q)| q.calibration == calibration)
            .map(|(i, _)| i)
            .collect();
        DMatrix::from_fn(rows.len(), rows.len(), |a, b| self.matrix[(rows[a], rows[b])])
    }

    /// Whether every sensitivity was mapped to quotes.
    pub fn is_complete(&self) -> bool {
        self.unattributed.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum RiskKey {
    Variable(VariableId),
    Quote(usize, usize),
}

/// Dense gradient and Hessian of a price over a changing set of keys.
struct Expansion {
    keys: Vec<RiskKey>,
    gradient: DVector<f64>,
    hessian: DMatrix<f64>,
}

impl Expansion {
    fn new(price: &DualNumber) -> Result<Self, CalibrationError> {
        let second = match price.hessian() {
            Some(h) => h,
            None if price.gradient().is_empty() => {
                return Ok(Self {
                    keys: Vec::new(),
                    gradient: DVector::zeros(0),
                    hessian: DMatrix::zeros(0, 0),
                })
            }
            None => {
                return Err(CalibrationError::invalid_construction(
                    "quote gamma needs a price carrying second-order sensitivities",
                ))
            }
        };
        let ids: BTreeSet<VariableId> = price
            .gradient()
            .keys()
            .copied()
            .chain(second.keys().flat_map(|&(a, b)| [a, b]))
            .collect();
        let keys: Vec<RiskKey> = ids.into_iter().map(RiskKey::Variable).collect();
        let index: BTreeMap<RiskKey, usize> =
            keys.iter().enumerate().map(|(i, k)| (*k, i)).collect();

        let gradient = DVector::from_iterator(keys.len(), keys.iter().map(|k| match k {
            RiskKey::Variable(id) => price.partial(*id),
            RiskKey::Quote(..) => 0.0,
        }));
        let mut hessian = DMatrix::zeros(keys.len(), keys.len());
        for (&(a, b), &v) in second {
            let (i, j) = (index[&RiskKey::Variable(a)], index[&RiskKey::Variable(b)]);
            hessian[(i, j)] = v;
            hessian[(j, i)] = v;
        }
        Ok(Self {
            keys,
            gradient,
            hessian,
        })
    }

    fn position(&self, key: RiskKey) -> Option<usize> {
        self.keys.iter().position(|k| *k == key)
    }

    /// Position of `key`, appending it with zero sensitivity if absent.
    fn ensure(&mut self, key: RiskKey) -> usize {
        if let Some(i) = self.position(key) {
            return i;
        }
        let n = self.keys.len();
        self.keys.push(key);
        self.gradient = self.gradient.clone().insert_row(n, 0.0);
        self.hessian = self.hessian.clone().insert_row(n, 0.0).insert_column(n, 0.0);
        n
    }

    /// Replace the free nodes of calibration `c` by its quotes.
    fn substitute(&mut self, c: usize, calibration: &Calibration) -> Result<(), CalibrationError> {
        let n = calibration.variable_ids.len();
        let p = calibration.upstream_ids.len();
        let m = calibration.instrument_labels.len();
        if calibration.instrument_hessians.len() != m {
            return Err(CalibrationError::invalid_construction(format!(
                "calibration {} has no instrument Hessians; run it at second order",
                c
            )));
        }

        let upstream: Vec<usize> = calibration
            .upstream_ids
            .iter()
            .map(|id| self.ensure(RiskKey::Variable(*id)))
            .collect();
        let free: Vec<Option<usize>> = calibration
            .variable_ids
            .iter()
            .map(|id| self.position(RiskKey::Variable(*id)))
            .collect();

        // New keys: this calibration's quotes, then every old key that is
        // not one of its free nodes.
        let mut column = vec![None; self.keys.len()];
        let mut keys: Vec<RiskKey> = (0..m).map(|i| RiskKey::Quote(c, i)).collect();
        for (old, key) in self.keys.iter().enumerate() {
            if !free.contains(&Some(old)) {
                column[old] = Some(keys.len());
                keys.push(*key);
            }
        }
        let width = keys.len();
        let upstream_columns = upstream
            .iter()
            .map(|&old| column[old])
            .collect::<Option<Vec<usize>>>()
            .ok_or_else(|| {
                CalibrationError::invalid_construction("an upstream variable is also free")
            })?;

        // Z: free then upstream nodes in the new keys.
        let qs = &calibration.quote_sensitivity;
        let us = &calibration.upstream_sensitivity;
        let mut z = DMatrix::zeros(n + p, width);
        for j in 0..n {
            for i in 0..m {
                z[(j, i)] = qs[(j, i)];
            }
            for (k, &col) in upstream_columns.iter().enumerate() {
                z[(j, col)] = us[(j, k)];
            }
        }
        for (k, &col) in upstream_columns.iter().enumerate() {
            z[(n + k, col)] = 1.0;
        }

        // E: old keys in the new keys.
        let mut e = DMatrix::zeros(self.keys.len(), width);
        for (old, col) in column.iter().enumerate() {
            if let Some(col) = col {
                e[(old, *col)] = 1.0;
            }
        }
        for (j, old) in free.iter().enumerate() {
            if let Some(old) = old {
                e.set_row(*old, &z.row(j));
            }
        }

        let gx = DVector::from_iterator(
            n,
            free.iter().map(|old| old.map_or(0.0, |o| self.gradient[o])),
        );
        let deltas = qs.tr_mul(&gx);
        let mut curvature = DMatrix::zeros(n + p, n + p);
        for (delta, h) in deltas.iter().zip(&calibration.instrument_hessians) {
            if *delta != 0.0 {
                curvature += h * *delta;
            }
        }

        self.gradient = e.tr_mul(&self.gradient);
        self.hessian = e.transpose() * &self.hessian * &e - z.transpose() * curvature * &z;
        self.keys = keys;
        Ok(())
    }
}

/// Ordered calibrations, upstream first.
#[derive(Debug, Clone, Default)]
pub struct RiskLadder {
    calibrations: Vec<Calibration>,
}

impl RiskLadder {
    /// Empty ladder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a calibration. Curves it treated as frozen must have been
    /// calibrated by an earlier entry for their risk to chain.
    pub fn push(&mut self, calibration: Calibration) {
        self.calibrations.push(calibration);
    }

    /// Builder form of [`push`](Self::push).
    pub fn with(mut self, calibration: Calibration) -> Self {
        self.push(calibration);
        self
    }

    /// Number of calibrations.
    pub fn len(&self) -> usize {
        self.calibrations.len()
    }

    /// Whether the ladder is empty.
    pub fn is_empty(&self) -> bool {
        self.calibrations.is_empty()
    }

    /// The calibrations in ladder order.
    pub fn calibrations(&self) -> &[Calibration] {
        &self.calibrations
    }

    /// Quote deltas of `price`.
    pub fn delta(&self, price: &DualNumber) -> DeltaReport {
        let mut gradient = price.gradient().clone();
        let mut deltas: Vec<Vec<f64>> = vec![Vec::new(); self.calibrations.len()];

        for (c, calibration) in self.calibrations.iter().enumerate().rev() {
            let gx: Vec<f64> = calibration
                .variable_ids
                .iter()
                .map(|id| gradient.remove(id).unwrap_or(0.0))
                .collect();

            let qs = &calibration.quote_sensitivity;
            deltas[c] = (0..qs.ncols())
                .map(|i| gx.iter().enumerate().map(|(j, g)| g * qs[(j, i)]).sum())
                .collect();

            let us = &calibration.upstream_sensitivity;
            for (k, id) in calibration.upstream_ids.iter().enumerate() {
                let chained: f64 = gx.iter().enumerate().map(|(j, g)| g * us[(j, k)]).sum();
                if chained != 0.0 {
                    let entry = gradient.entry(*id).or_insert(0.0);
                    *entry += chained;
                    if *entry == 0.0 {
                        gradient.remove(id);
                    }
                }
            }
        }

        let quotes = self
            .calibrations
            .iter()
            .zip(deltas)
            .enumerate()
            .flat_map(|(c, (calibration, row))| {
                row.into_iter()
                    .enumerate()
                    .map(move |(i, delta)| QuoteDelta {
                        calibration: c,
                        instrument: i,
                        label: calibration.instrument_labels[i].clone(),
                        delta,
                    })
            })
            .collect();

        DeltaReport {
            quotes,
            unattributed: gradient,
        }
    }

    /// Quote gamma of `price`.
    ///
    /// Every calibration must have run at second order and `price` must
    /// carry a Hessian.
    ///
    /// # Errors
    ///
    /// `InvalidConstruction` for a first-order price or a calibration
    /// without instrument Hessians.
    pub fn gamma(&self, price: &DualNumber) -> Result<GammaReport, CalibrationError> {
        let mut expansion = Expansion::new(price)?;
        for (c, calibration) in self.calibrations.iter().enumerate().rev() {
            expansion.substitute(c, calibration)?;
        }

        let quotes: Vec<QuoteKey> = self
            .calibrations
            .iter()
            .enumerate()
            .flat_map(|(c, calibration)| {
                calibration
                    .instrument_labels
                    .iter()
                    .enumerate()
                    .map(move |(i, label)| QuoteKey {
                        calibration: c,
                        instrument: i,
                        label: label.clone(),
                    })
            })
            .collect();
        let rows: Vec<Option<usize>> = quotes
            .iter()
            .map(|q| expansion.position(RiskKey::Quote(q.calibration, q.instrument)))
            .collect();
        let at = |v: &DVector<f64>, i: usize| rows[i].map_or(0.0, |r| v[r]);
        let matrix = DMatrix::from_fn(quotes.len(), quotes.len(), |a, b| match (rows[a], rows[b]) {
            (Some(i), Some(j)) => expansion.hessian[(i, j)],
            _ => 0.0,
        });
        let deltas = DVector::from_fn(quotes.len(), |i, _| at(&expansion.gradient, i));

        let unattributed = expansion
            .keys
            .iter()
            .enumerate()
            .filter_map(|(i, key)| match key {
                RiskKey::Variable(id)
                    if expansion.gradient[i] != 0.0
                        || expansion.hessian.row(i).iter().any(|v| *v != 0.0) =>
                {
                    Some(*id)
                }
                _ => None,
            })
            .collect();

        Ok(GammaReport {
            quotes,
            matrix,
            deltas,
            unattributed,
        })
    }
}
