//! Curve graph: curves plus their declared dependencies.
//!
//! The graph owns every curve that takes part in a calibration. A curve may
//! read only itself and curves it depends on, directly or transitively; the
//! dependency relation must be acyclic. Assembly produces the evaluation
//! order and a stable mapping from node variables to Jacobian columns.
//!
//! Mutation of node values is reserved for the solver: the public API only
//! adds curves, freezes them, and reads.
//!
//! ## Example
//!
//! ```rust
//! use pricer_core::market_data::curves::{Curve, CurveKind};
//! use pricer_core::types::VariableSpace;
//! use pricer_optimiser::graph::CurveGraph;
//!
//! let mut space = VariableSpace::new();
//! let ois = Curve::builder("ois")
//!     .nodes([(0.0, 1.0), (5.0, 0.85)])
//!     .build(&mut space)
//!     .unwrap();
//! let libor = Curve::builder("libor")
//!     .kind(CurveKind::Line)
//!     .nodes([(0.0, 0.02), (5.0, 0.03)])
//!     .build(&mut space)
//!     .unwrap();
//!
//! let mut graph = CurveGraph::new();
//! graph.add_curve(libor, &["ois"]).unwrap();
//! graph.add_curve(ois, &[]).unwrap();
//!
//! let assembly = graph.assemble().unwrap();
//! assert_eq!(assembly.order()[0].as_str(), "ois");
//! assert_eq!(assembly.variables().len(), 1 + 2);
//! ```

mod assembly;
mod view;

pub use assembly::{Assembly, VariableIndex};
pub use view::CurveView;

use crate::error::CalibrationError;
use pricer_core::market_data::curves::{Curve, CurveId};
use pricer_core::types::AdOrder;
use std::collections::HashMap;

#[derive(Debug, Clone)]
struct Entry {
    curve: Curve,
    depends_on: Vec<CurveId>,
    frozen: bool,
}

/// Curves and their declared dependencies.
#[derive(Debug, Clone, Default)]
pub struct CurveGraph {
    entries: Vec<Entry>,
    index: HashMap<CurveId, usize>,
}

/// Saved node state of every curve, for rollback.
#[derive(Debug, Clone)]
pub(crate) struct Checkpoint {
    curves: Vec<Curve>,
}

impl CurveGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a curve reading the curves in `depends_on`.
    ///
    /// Dependencies may name curves added later; they are resolved at
    /// [`assemble`](Self::assemble) time.
    ///
    /// # Errors
    ///
    /// `DuplicateCurve` if a curve with the same id is already present.
    pub fn add_curve(&mut self, curve: Curve, depends_on: &[&str]) -> Result<(), CalibrationError> {
        if self.index.contains_key(curve.id().as_str()) {
            return Err(CalibrationError::DuplicateCurve {
                curve: curve.id().to_string(),
            });
        }
        let mut deps: Vec<CurveId> = Vec::with_capacity(depends_on.len());
        for dep in depends_on {
            if !deps.iter().any(|d| d.as_str() == *dep) {
                deps.push(CurveId::from(*dep));
            }
        }
        self.index.insert(curve.id().clone(), self.entries.len());
        self.entries.push(Entry {
            curve,
            depends_on: deps,
            frozen: false,
        });
        Ok(())
    }

    /// Mark a curve as already calibrated.
    ///
    /// Frozen curves keep their node values across later runs; their node
    /// variables are reported as upstream variables instead of being solved.
    pub fn freeze(&mut self, id: &str) -> Result<(), CalibrationError> {
        let i = self.position(id)?;
        self.entries[i].frozen = true;
        Ok(())
    }

    /// Make a frozen curve free again.
    pub fn unfreeze(&mut self, id: &str) -> Result<(), CalibrationError> {
        let i = self.position(id)?;
        self.entries[i].frozen = false;
        Ok(())
    }

    /// Whether the curve is frozen. Unknown ids are not frozen.
    pub fn is_frozen(&self, id: &str) -> bool {
        self.index.get(id).is_some_and(|&i| self.entries[i].frozen)
    }

    /// Look up a curve by id.
    pub fn curve(&self, id: &str) -> Option<&Curve> {
        self.index.get(id).map(|&i| &self.entries[i].curve)
    }

    /// Whether a curve with this id is present.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Declared direct dependencies of a curve.
    pub fn dependencies(&self, id: &str) -> Option<&[CurveId]> {
        self.index
            .get(id)
            .map(|&i| self.entries[i].depends_on.as_slice())
    }

    /// Curves in insertion order.
    pub fn curves(&self) -> impl Iterator<Item = &Curve> + '_ {
        self.entries.iter().map(|e| &e.curve)
    }

    /// Number of curves.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the graph has no curves.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Topologically sort the curves and index their free variables.
    ///
    /// Ties are broken by insertion order, so the result depends only on
    /// the sequence of `add_curve` calls.
    ///
    /// # Errors
    ///
    /// * `UnknownCurve` - a dependency names a curve not in the graph
    /// * `CyclicDependency` - the curves on one dependency cycle
    /// * `InvalidConstruction` - a node variable appears in two curves
    pub fn assemble(&self) -> Result<Assembly, CalibrationError> {
        assembly::assemble(self)
    }

    /// Dependency-checked read access on behalf of curve `id`.
    pub fn view(&self, id: &str) -> Result<CurveView<'_>, CalibrationError> {
        let i = self.position(id)?;
        CurveView::new(self, i)
    }

    fn position(&self, id: &str) -> Result<usize, CalibrationError> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| CalibrationError::unknown_curve(id))
    }

    fn dependency_positions(&self, i: usize) -> Result<Vec<usize>, CalibrationError> {
        self.entries[i]
            .depends_on
            .iter()
            .map(|d| self.position(d.as_str()))
            .collect()
    }

    // ---- solver-only mutation -------------------------------------------

    pub(crate) fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            curves: self.entries.iter().map(|e| e.curve.clone()).collect(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: Checkpoint) {
        for (entry, curve) in self.entries.iter_mut().zip(checkpoint.curves) {
            entry.curve = curve;
        }
    }

    /// Re-seed every curve, frozen ones included, at `order`.
    pub(crate) fn set_ad_order(&mut self, order: AdOrder) -> Result<(), CalibrationError> {
        for entry in &mut self.entries {
            entry.curve.set_ad_order(order)?;
        }
        Ok(())
    }

    /// Real parts of the solved variables in column order.
    pub(crate) fn free_values(&self, assembly: &Assembly) -> Vec<f64> {
        assembly
            .solved_curves()
            .flat_map(|i| self.entries[i].curve.free_node_values())
            .collect()
    }

    /// Write a full variable vector back to the solved curves.
    pub(crate) fn write_free_values(
        &mut self,
        assembly: &Assembly,
        values: &[f64],
    ) -> Result<(), CalibrationError> {
        let mut offset = 0;
        for i in assembly.solved_curves() {
            let curve = &mut self.entries[i].curve;
            let count = curve.free_node_count();
            let slice = values.get(offset..offset + count).ok_or_else(|| {
                CalibrationError::invalid_construction(format!(
                    "variable vector of length {} is too short for curve '{}'",
                    values.len(),
                    curve.id()
                ))
            })?;
            curve.update_node_values(slice)?;
            offset += count;
        }
        Ok(())
    }
}
