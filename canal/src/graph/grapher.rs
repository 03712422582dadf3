//! Fluent accumulator over [`StageGraph`] composition.

use super::StageGraph;
use crate::core::StageRecord;

/// Builds a stage graph one `then` at a time.
///
/// Each call attaches its argument after the current exit frontier:
///
/// ```
/// use canal::prelude::*;
///
/// # fn main() -> Result<(), canal::errors::CanalError> {
/// let scope = Scope::root();
/// let graph = Grapher::of(scope.stage(Wait::seconds(30))?)
///     .then_all([
///         scope.stage(Wait::seconds(10))?,
///         scope.stage(Wait::seconds(20))?,
///     ])
///     .then(scope.stage(ManualJudgment::new())?)
///     .into_graph();
///
/// assert_eq!(graph.len(), 4);
/// assert_eq!(graph.entry().len(), 1);
/// assert_eq!(graph.exit().len(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grapher {
    graph: StageGraph,
}

impl Grapher {
    /// Starts from an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from one stage or an existing graph.
    #[must_use]
    pub fn of(seed: impl Into<StageGraph>) -> Self {
        Self { graph: seed.into() }
    }

    /// Appends `next` after everything built so far.
    #[must_use]
    pub fn then(self, next: impl Into<StageGraph>) -> Self {
        Self {
            graph: self.graph.sequence(next.into()),
        }
    }

    /// Fans out to several branches after everything built so far.
    ///
    /// Equivalent to `then(parallel(branches))`. A following `then` joins all
    /// of the branches' exits.
    #[must_use]
    pub fn then_all<I>(self, branches: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<StageGraph>,
    {
        self.then(parallel(branches))
    }

    /// Returns the graph built so far.
    #[must_use]
    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }

    /// Finishes building.
    #[must_use]
    pub fn into_graph(self) -> StageGraph {
        self.graph
    }
}

/// Places branches side by side with no edges between them.
#[must_use]
pub fn parallel<I>(branches: I) -> StageGraph
where
    I: IntoIterator,
    I::Item: Into<StageGraph>,
{
    StageGraph::union(branches.into_iter().map(Into::into))
}

impl From<Grapher> for StageGraph {
    fn from(grapher: Grapher) -> Self {
        grapher.graph
    }
}

impl From<StageRecord> for Grapher {
    fn from(record: StageRecord) -> Self {
        Self::of(record)
    }
}

impl From<StageGraph> for Grapher {
    fn from(graph: StageGraph) -> Self {
        Self { graph }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assertions::{assert_acyclic, assert_depends_on_exactly};
    use crate::testing::fixtures::{stage, stages};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_new_grapher_is_empty() {
        let grapher = Grapher::new();
        assert!(grapher.graph().is_empty());

        let a = stage("a");
        assert_eq!(Grapher::new().then(a.clone()).graph(), &StageGraph::single(a));
    }

    #[test]
    fn test_linear_chain() {
        let [a, b, c] = stages(["a", "b", "c"]);

        let graph = Grapher::of(a.clone()).then(b.clone()).then(c.clone()).into_graph();

        assert_depends_on_exactly(&graph, a.id(), &[]);
        assert_depends_on_exactly(&graph, b.id(), &[a.id()]);
        assert_depends_on_exactly(&graph, c.id(), &[b.id()]);
        assert_eq!(graph.entry(), &[a.id().clone()]);
        assert_eq!(graph.exit(), &[c.id().clone()]);
    }

    #[test]
    fn test_fan_out_then_fan_in() {
        let [wait, d1, d2, d3, rollback] = stages(["wait", "d1", "d2", "d3", "rollback"]);

        let graph = Grapher::of(wait.clone())
            .then_all([d1.clone(), d2.clone(), d3.clone()])
            .then(rollback.clone())
            .into_graph();

        for deploy in [&d1, &d2, &d3] {
            assert_depends_on_exactly(&graph, deploy.id(), &[wait.id()]);
        }
        assert_depends_on_exactly(&graph, rollback.id(), &[d1.id(), d2.id(), d3.id()]);
        assert_acyclic(&graph);
        graph.validate().unwrap();
    }

    #[test]
    fn test_branches_can_be_subgraphs() {
        let [a, b1, b2, c1, d] = stages(["a", "b1", "b2", "c1", "d"]);
        let long_branch = Grapher::of(b1.clone()).then(b2.clone());

        let graph = Grapher::of(a.clone())
            .then_all([long_branch.into_graph(), StageGraph::single(c1.clone())])
            .then(d.clone())
            .into_graph();

        assert_depends_on_exactly(&graph, b1.id(), &[a.id()]);
        assert_depends_on_exactly(&graph, b2.id(), &[b1.id()]);
        assert_depends_on_exactly(&graph, c1.id(), &[a.id()]);
        assert_depends_on_exactly(&graph, d.id(), &[b2.id(), c1.id()]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_then_all_on_empty_grapher_fans_out_from_nothing() {
        let [a, b] = stages(["a", "b"]);

        let graph = Grapher::new().then_all([a.clone(), b.clone()]).into_graph();

        assert_eq!(graph.entry().len(), 2);
        assert_depends_on_exactly(&graph, a.id(), &[]);
        assert_depends_on_exactly(&graph, b.id(), &[]);
    }

    #[test]
    fn test_grapher_argument_is_accepted() {
        let [a, b, c] = stages(["a", "b", "c"]);
        let tail = Grapher::of(b.clone()).then(c.clone());

        let graph = Grapher::of(a.clone()).then(tail).into_graph();

        assert_eq!(graph.len(), 3);
        assert_depends_on_exactly(&graph, b.id(), &[a.id()]);
    }

    #[test]
    fn test_earlier_graphs_are_unchanged() {
        let [a, b] = stages(["a", "b"]);
        let start = Grapher::of(a.clone());
        let snapshot = start.graph().clone();

        let _extended = start.clone().then(b);

        assert_eq!(start.graph(), &snapshot);
        assert!(start.graph().get(a.id()).unwrap().depends_on().is_empty());
    }
}
