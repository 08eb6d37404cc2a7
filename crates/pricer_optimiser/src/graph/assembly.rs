//! Topological assembly of a curve graph.

use super::CurveGraph;
use crate::error::CalibrationError;
use pricer_core::market_data::curves::CurveId;
use pricer_core::types::VariableId;
use std::collections::{BTreeSet, HashMap};
use tracing::trace;

/// Stable mapping between node variables and matrix columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableIndex {
    ids: Vec<VariableId>,
    labels: Vec<String>,
    columns: HashMap<VariableId, usize>,
}

impl VariableIndex {
    fn push(&mut self, id: VariableId, label: String) {
        self.columns.insert(id, self.ids.len());
        self.ids.push(id);
        self.labels.push(label);
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Whether there are no variables.
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Variable ids in column order.
    pub fn ids(&self) -> &[VariableId] {
        &self.ids
    }

    /// Variable labels (`"{curve}{node}"`) in column order.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Column of `id`, if indexed.
    pub fn column(&self, id: VariableId) -> Option<usize> {
        self.columns.get(&id).copied()
    }
}

/// Result of [`CurveGraph::assemble`].
#[derive(Debug, Clone)]
pub struct Assembly {
    order: Vec<CurveId>,
    positions: Vec<usize>,
    frozen: Vec<bool>,
    variables: VariableIndex,
    upstream: VariableIndex,
}

impl Assembly {
    /// Curve evaluation order: every curve after all of its dependencies.
    pub fn order(&self) -> &[CurveId] {
        &self.order
    }

    /// Free variables of non-frozen curves, in evaluation order and node
    /// order within a curve.
    pub fn variables(&self) -> &VariableIndex {
        &self.variables
    }

    /// Node variables of frozen curves, in the same ordering.
    pub fn upstream(&self) -> &VariableIndex {
        &self.upstream
    }

    /// Graph positions of the non-frozen curves in evaluation order.
    pub(crate) fn solved_curves(&self) -> impl Iterator<Item = usize> + '_ {
        self.positions
            .iter()
            .zip(&self.frozen)
            .filter(|(_, &frozen)| !frozen)
            .map(|(&i, _)| i)
    }
}

pub(super) fn assemble(graph: &CurveGraph) -> Result<Assembly, CalibrationError> {
    let n = graph.entries.len();
    let mut deps: Vec<Vec<usize>> = Vec::with_capacity(n);
    for i in 0..n {
        deps.push(graph.dependency_positions(i)?);
    }

    // Kahn's algorithm; the ready set is ordered by insertion index.
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut pending: Vec<usize> = vec![0; n];
    for (i, ds) in deps.iter().enumerate() {
        pending[i] = ds.len();
        for &d in ds {
            dependents[d].push(i);
        }
    }
    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| pending[i] == 0).collect();
    let mut positions = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        positions.push(i);
        for &j in &dependents[i] {
            pending[j] -= 1;
            if pending[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if positions.len() < n {
        let cycle = find_cycle(&deps, &pending);
        return Err(CalibrationError::CyclicDependency {
            curves: cycle
                .into_iter()
                .map(|i| graph.entries[i].curve.id().to_string())
                .collect(),
        });
    }

    let mut variables = VariableIndex::default();
    let mut upstream = VariableIndex::default();
    let mut frozen = Vec::with_capacity(n);
    for &i in &positions {
        let entry = &graph.entries[i];
        for (id, label) in entry
            .curve
            .free_variables()
            .zip(entry.curve.variable_labels())
        {
            if variables.column(id).is_some() || upstream.column(id).is_some() {
                return Err(CalibrationError::invalid_construction(format!(
                    "variable {} of curve '{}' is shared with another curve",
                    id,
                    entry.curve.id()
                )));
            }
            if entry.frozen {
                upstream.push(id, label);
            } else {
                variables.push(id, label);
            }
        }
        frozen.push(entry.frozen);
    }

    let order: Vec<CurveId> = positions
        .iter()
        .map(|&i| graph.entries[i].curve.id().clone())
        .collect();
    trace!(
        curves = ?order,
        variables = variables.len(),
        upstream = upstream.len(),
        "assembled curve graph"
    );

    Ok(Assembly {
        order,
        positions,
        frozen,
        variables,
        upstream,
    })
}

/// Walk unresolved dependencies until a curve repeats.
///
/// Every curve Kahn left unprocessed has at least one unprocessed
/// dependency, so the walk cannot dead-end. The cycle is rotated to start at
/// its lowest insertion index.
fn find_cycle(deps: &[Vec<usize>], pending: &[usize]) -> Vec<usize> {
    let unresolved = |i: usize| pending[i] > 0;
    let Some(start) = (0..deps.len()).find(|&i| unresolved(i)) else {
        return Vec::new();
    };
    let mut path: Vec<usize> = vec![start];
    let mut seen: HashMap<usize, usize> = HashMap::from([(start, 0)]);
    let mut current = start;
    loop {
        let Some(&next) = deps[current].iter().find(|&&d| unresolved(d)) else {
            return path;
        };
        if let Some(&at) = seen.get(&next) {
            let mut cycle = path.split_off(at);
            if let Some(min_at) = cycle
                .iter()
                .enumerate()
                .min_by_key(|(_, &i)| i)
                .map(|(k, _)| k)
            {
                cycle.rotate_left(min_at);
            }
            return cycle;
        }
        seen.insert(next, path.len());
        path.push(next);
        current = next;
    }
}
