//! Dependency-checked read access to a curve graph.

use super::CurveGraph;
use crate::error::CalibrationError;
use pricer_core::market_data::curves::Curve;

/// Read access to one curve and the curves it transitively depends on.
///
/// Instruments price through a view so that reading a curve outside the
/// declared dependency closure is an error rather than a silent coupling.
#[derive(Debug, Clone)]
pub struct CurveView<'a> {
    graph: &'a CurveGraph,
    owner: usize,
    reachable: Vec<bool>,
}

impl<'a> CurveView<'a> {
    pub(super) fn new(graph: &'a CurveGraph, owner: usize) -> Result<Self, CalibrationError> {
        let mut reachable = vec![false; graph.len()];
        let mut stack = graph.dependency_positions(owner)?;
        while let Some(i) = stack.pop() {
            if i == owner || reachable[i] {
                continue;
            }
            reachable[i] = true;
            stack.extend(graph.dependency_positions(i)?);
        }
        Ok(Self {
            graph,
            owner,
            reachable,
        })
    }

    /// The curve this view belongs to.
    pub fn curve(&self) -> &'a Curve {
        &self.graph.entries[self.owner].curve
    }

    /// A curve the owner may read: itself or a transitive dependency.
    ///
    /// # Errors
    ///
    /// * `UnknownCurve` - no such curve in the graph
    /// * `UndeclaredDependency` - the curve exists but is not reachable
    pub fn dependency(&self, id: &str) -> Result<&'a Curve, CalibrationError> {
        let i = self.graph.position(id)?;
        if i == self.owner || self.reachable[i] {
            Ok(&self.graph.entries[i].curve)
        } else {
            Err(CalibrationError::UndeclaredDependency {
                from: self.curve().id().to_string(),
                to: id.to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pricer_core::market_data::curves::CurveKind;
    use pricer_core::types::VariableSpace;

    fn line(space: &mut VariableSpace, id: &str) -> Curve {
        Curve::builder(id)
            .kind(CurveKind::Line)
            .nodes([(0.0, 0.01), (1.0, 0.02)])
            .build(space)
            .unwrap()
    }

    fn chain() -> CurveGraph {
        let mut space = VariableSpace::new();
        let mut graph = CurveGraph::new();
        graph.add_curve(line(&mut space, "a"), &[]).unwrap();
        graph.add_curve(line(&mut space, "b"), &["a"]).unwrap();
        graph.add_curve(line(&mut space, "c"), &["b"]).unwrap();
        graph.add_curve(line(&mut space, "d"), &[]).unwrap();
        graph
    }

    #[test]
    fn test_transitive_dependency_is_readable() {
        let graph = chain();
        let view = graph.view("c").unwrap();
        assert_eq!(view.curve().id().as_str(), "c");
        assert_eq!(view.dependency("c").unwrap().id().as_str(), "c");
        assert_eq!(view.dependency("b").unwrap().id().as_str(), "b");
        assert_eq!(view.dependency("a").unwrap().id().as_str(), "a");
    }

    #[test]
    fn test_undeclared_dependency_rejected() {
        let graph = chain();
        let err = graph.view("c").unwrap().dependency("d").unwrap_err();
        assert_eq!(
            err,
            CalibrationError::UndeclaredDependency {
                from: "c".into(),
                to: "d".into()
            }
        );
        // Dependencies point one way only.
        assert!(graph.view("a").unwrap().dependency("b").is_err());
    }

    #[test]
    fn test_unknown_curve() {
        let graph = chain();
        assert!(graph.view("zz").is_err());
        assert_eq!(
            graph.view("a").unwrap().dependency("zz").unwrap_err(),
            CalibrationError::unknown_curve("zz")
        );
    }
}
