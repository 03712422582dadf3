//! The composed stage DAG and its composition operators.

use crate::core::{StageId, StageRecord};
use crate::errors::GraphInvariantError;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// A DAG of stage records with explicit entry and exit frontiers.
///
/// Graphs are values. Composition takes graphs by value and returns a new
/// graph, sharing unchanged records through [`Arc`]. Records that gain
/// dependencies are replaced by new records, so a graph handed out earlier
/// never changes underneath its holder.
///
/// [`single`](Self::single), [`sequence`](Self::sequence) and
/// [`union`](Self::union) are total: whatever their inputs, the result is
/// acyclic and its frontiers agree with its edges.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageGraph {
    stages: Vec<Arc<StageRecord>>,
    index: HashMap<StageId, usize>,
    entry: Vec<StageId>,
    exit: Vec<StageId>,
}

impl StageGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a one-node graph. The stage is both entry and exit.
    ///
    /// Any dependencies the record carried from another graph are dropped.
    #[must_use]
    pub fn single(record: StageRecord) -> Self {
        let record = record.detached();
        let id = record.id().clone();
        Self::assemble(vec![Arc::new(record)], vec![id.clone()], vec![id])
    }

    /// Runs `after` once everything in `self` has finished.
    ///
    /// Every entry stage of `after` gains a dependency on every exit stage of
    /// `self`. An empty graph on either side is the identity.
    #[must_use]
    pub fn sequence(self, after: Self) -> Self {
        if self.is_empty() {
            return after;
        }
        if after.is_empty() {
            return self;
        }

        let after = after.disjoint_from(&self);
        let after_entry: HashSet<&StageId> = after.entry.iter().collect();
        let mut stages = self.stages;
        stages.reserve(after.stages.len());
        for stage in &after.stages {
            if after_entry.contains(stage.id()) {
                stages.push(Arc::new(stage.with_dependencies(&self.exit)));
            } else {
                stages.push(Arc::clone(stage));
            }
        }

        let graph = Self::assemble(stages, self.entry, after.exit);
        debug!(
            stages = graph.len(),
            joined = self.exit.len() * after_entry.len(),
            "sequenced stage graphs"
        );
        graph
    }

    /// Places graphs side by side with no edges between them.
    ///
    /// Entry and exit frontiers are the unions of the inputs' frontiers, in
    /// input order. Empty inputs contribute nothing.
    #[must_use]
    pub fn union(graphs: impl IntoIterator<Item = Self>) -> Self {
        let mut merged = Self::new();
        let mut branches = 0_usize;
        for graph in graphs {
            if graph.is_empty() {
                continue;
            }
            branches += 1;
            if merged.is_empty() {
                merged = graph;
                continue;
            }

            let graph = graph.disjoint_from(&merged);
            let mut stages = merged.stages;
            stages.extend(graph.stages);
            let mut entry = merged.entry;
            entry.extend(graph.entry);
            let mut exit = merged.exit;
            exit.extend(graph.exit);
            merged = Self::assemble(stages, entry, exit);
        }

        debug!(branches, stages = merged.len(), "merged parallel stage graphs");
        merged
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Whether the graph has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Whether a stage with `id` belongs to this graph.
    #[must_use]
    pub fn contains(&self, id: &StageId) -> bool {
        self.index.contains_key(id)
    }

    /// Looks up a stage by id.
    #[must_use]
    pub fn get(&self, id: &StageId) -> Option<&StageRecord> {
        self.index.get(id).map(|&i| self.stages[i].as_ref())
    }

    /// Iterates over the stages in composition order.
    pub fn stages(&self) -> impl Iterator<Item = &StageRecord> {
        self.stages.iter().map(AsRef::as_ref)
    }

    /// Stages with no predecessor in this graph.
    #[must_use]
    pub fn entry(&self) -> &[StageId] {
        &self.entry
    }

    /// Stages with no successor in this graph.
    #[must_use]
    pub fn exit(&self) -> &[StageId] {
        &self.exit
    }

    /// Stages that depend directly on `id`, in construction order.
    #[must_use]
    pub fn dependents_of(&self, id: &StageId) -> Vec<&StageRecord> {
        let mut dependents: Vec<&StageRecord> = self
            .stages()
            .filter(|stage| stage.depends_on().contains(id))
            .collect();
        dependents.sort_by_key(|stage| stage.sequence());
        dependents
    }

    /// All stages in construction order (first built first).
    ///
    /// The order depends only on the order stages were built, never on the
    /// ids they were given.
    #[must_use]
    pub fn flatten(&self) -> Vec<&StageRecord> {
        let mut ordered: Vec<&StageRecord> = self.stages().collect();
        ordered.sort_by_key(|stage| stage.sequence());
        ordered
    }

    /// Orders stages so each follows all of its dependencies.
    ///
    /// Among stages that are ready at the same time, the earliest built comes
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`GraphInvariantError`] if the graph has a dangling edge or a cycle.
    pub fn topological_order(&self) -> Result<Vec<&StageRecord>, GraphInvariantError> {
        let mut remaining: Vec<usize> = Vec::with_capacity(self.len());
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); self.len()];
        for (i, stage) in self.stages.iter().enumerate() {
            for dep in stage.depends_on() {
                let Some(&d) = self.index.get(dep) else {
                    return Err(GraphInvariantError::dangling(stage.id().as_str(), dep.as_str()));
                };
                dependents[d].push(i);
            }
            remaining.push(stage.depends_on().len());
        }

        let mut ready: BinaryHeap<Reverse<(u64, usize)>> = remaining
            .iter()
            .enumerate()
            .filter(|(_, &count)| count == 0)
            .map(|(i, _)| Reverse((self.stages[i].sequence(), i)))
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(Reverse((_, i))) = ready.pop() {
            order.push(self.stages[i].as_ref());
            for &next in &dependents[i] {
                remaining[next] -= 1;
                if remaining[next] == 0 {
                    ready.push(Reverse((self.stages[next].sequence(), next)));
                }
            }
        }

        if order.len() < self.len() {
            let cycle = self.find_cycle().unwrap_or_default();
            return Err(GraphInvariantError::cycle(cycle));
        }
        Ok(order)
    }

    /// Checks the structural invariants.
    ///
    /// No stage depends on itself or on a stage outside the graph, the
    /// dependency relation is acyclic, and the entry and exit frontiers are
    /// exactly the stages without predecessors and without successors.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), GraphInvariantError> {
        for stage in self.stages() {
            for dep in stage.depends_on() {
                if dep == stage.id() {
                    return Err(GraphInvariantError::self_loop(stage.id().as_str()));
                }
                if !self.contains(dep) {
                    return Err(GraphInvariantError::dangling(stage.id().as_str(), dep.as_str()));
                }
            }
        }

        if let Some(cycle) = self.find_cycle() {
            return Err(GraphInvariantError::cycle(cycle));
        }

        let has_successor: HashSet<&StageId> =
            self.stages().flat_map(StageRecord::depends_on).collect();
        let sources: HashSet<&StageId> = self
            .stages()
            .filter(|stage| stage.depends_on().is_empty())
            .map(StageRecord::id)
            .collect();
        let sinks: HashSet<&StageId> = self
            .stages()
            .map(StageRecord::id)
            .filter(|id| !has_successor.contains(id))
            .collect();

        check_frontier("entry", &self.entry, &sources)?;
        check_frontier("exit", &self.exit, &sinks)?;
        Ok(())
    }

    fn assemble(stages: Vec<Arc<StageRecord>>, entry: Vec<StageId>, exit: Vec<StageId>) -> Self {
        let index = stages
            .iter()
            .enumerate()
            .map(|(i, stage)| (stage.id().clone(), i))
            .collect();
        Self {
            stages,
            index,
            entry,
            exit,
        }
    }

    /// Returns `self` unchanged if it shares no stage with `other`, otherwise
    /// a copy of `self` where every stage has a fresh identity.
    ///
    /// A copy of stage `id` is named `{id}#{n}` with the smallest `n >= 1`
    /// not already used by either graph, so the names depend only on the
    /// graphs involved.
    fn disjoint_from(self, other: &Self) -> Self {
        if !self.stages.iter().any(|stage| other.contains(stage.id())) {
            return self;
        }

        let mut originals: Vec<&Arc<StageRecord>> = self.stages.iter().collect();
        originals.sort_by_key(|stage| stage.sequence());
        let mut taken: HashSet<StageId> = other
            .index
            .keys()
            .chain(self.index.keys())
            .cloned()
            .collect();
        let renamed: HashMap<&StageId, StageId> = originals
            .iter()
            .map(|stage| {
                let fresh = (1_u64..)
                    .map(|copy| StageId::new(format!("{}#{copy}", stage.id())))
                    .find(|candidate| taken.insert(candidate.clone()))
                    .unwrap_or_else(|| stage.id().clone());
                (stage.id(), fresh)
            })
            .collect();
        let remap = |id: &StageId| renamed.get(id).cloned().unwrap_or_else(|| id.clone());

        let stages = originals
            .iter()
            .map(|stage| {
                let depends_on = stage.depends_on().iter().map(remap).collect();
                Arc::new(stage.reidentified(remap(stage.id()), depends_on))
            })
            .collect();
        let entry = self.entry.iter().map(remap).collect();
        let exit = self.exit.iter().map(remap).collect();

        trace!(stages = self.len(), "re-identified reused stage graph");
        Self::assemble(stages, entry, exit)
    }

    /// Depth-first search for a dependency cycle, returned as the closing path.
    fn find_cycle(&self) -> Option<Vec<String>> {
        let mut visited = HashSet::new();
        let mut on_path = HashSet::new();
        let mut path = Vec::new();

        for stage in self.flatten() {
            if !visited.contains(stage.id()) {
                if let Some(cycle) = self.dfs_cycle(stage.id(), &mut visited, &mut on_path, &mut path) {
                    return Some(cycle);
                }
            }
        }
        None
    }

    fn dfs_cycle<'g>(
        &'g self,
        node: &'g StageId,
        visited: &mut HashSet<&'g StageId>,
        on_path: &mut HashSet<&'g StageId>,
        path: &mut Vec<&'g StageId>,
    ) -> Option<Vec<String>> {
        visited.insert(node);
        on_path.insert(node);
        path.push(node);

        if let Some(stage) = self.get(node) {
            for dep in stage.depends_on() {
                if !visited.contains(dep) {
                    if let Some(cycle) = self.dfs_cycle(dep, visited, on_path, path) {
                        return Some(cycle);
                    }
                } else if on_path.contains(dep) {
                    let start = path.iter().position(|id| *id == dep).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..].iter().map(ToString::to_string).collect();
                    cycle.push(dep.to_string());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        on_path.remove(node);
        None
    }

    #[cfg(test)]
    pub(crate) fn from_parts(stages: Vec<StageRecord>, entry: Vec<StageId>, exit: Vec<StageId>) -> Self {
        Self::assemble(stages.into_iter().map(Arc::new).collect(), entry, exit)
    }
}

fn check_frontier(
    which: &str,
    declared: &[StageId],
    expected: &HashSet<&StageId>,
) -> Result<(), GraphInvariantError> {
    let declared_set: HashSet<&StageId> = declared.iter().collect();
    if declared_set == *expected && declared_set.len() == declared.len() {
        return Ok(());
    }

    let mut mismatched: Vec<String> = declared_set
        .symmetric_difference(expected)
        .map(ToString::to_string)
        .collect();
    mismatched.sort();
    Err(GraphInvariantError::frontier(
        format!("The {which} frontier of the stage graph does not match its edges"),
        mismatched,
    ))
}

impl From<StageRecord> for StageGraph {
    fn from(record: StageRecord) -> Self {
        Self::single(record)
    }
}

impl FromIterator<StageGraph> for StageGraph {
    fn from_iter<I: IntoIterator<Item = StageGraph>>(iter: I) -> Self {
        Self::union(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assertions::{assert_acyclic, assert_depends_on_exactly, assert_independent};
    use crate::testing::fixtures::{stage, stages};
    use pretty_assertions::assert_eq;

    fn ids(graph_ids: &[StageId]) -> Vec<&str> {
        graph_ids.iter().map(StageId::as_str).collect()
    }

    #[test]
    fn test_single_is_entry_and_exit() {
        let record = stage("a");
        let graph = StageGraph::single(record.clone());

        assert_eq!(graph.len(), 1);
        assert_eq!(graph.entry(), &[record.id().clone()]);
        assert_eq!(graph.exit(), &[record.id().clone()]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_single_drops_foreign_dependencies() {
        let record = stage("a").with_raw_dependencies(vec![StageId::new("elsewhere")]);
        let graph = StageGraph::single(record);

        assert!(graph.stages().all(|s| s.depends_on().is_empty()));
        graph.validate().unwrap();
    }

    #[test]
    fn test_sequence_links_exit_to_entry() {
        let [a, b] = stages(["a", "b"]);
        let graph = StageGraph::single(a.clone()).sequence(StageGraph::single(b.clone()));

        assert_depends_on_exactly(&graph, b.id(), &[a.id()]);
        assert_depends_on_exactly(&graph, a.id(), &[]);
        assert_eq!(ids(graph.entry()), vec!["a"]);
        assert_eq!(ids(graph.exit()), vec!["b"]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_sequence_does_not_touch_before_side() {
        let [a, b, c] = stages(["a", "b", "c"]);
        let before = StageGraph::single(a.clone()).sequence(StageGraph::single(b.clone()));
        let snapshot = before.clone();

        let graph = before.sequence(StageGraph::single(c.clone()));

        for record in snapshot.stages() {
            assert_eq!(graph.get(record.id()).unwrap().depends_on(), record.depends_on());
        }
        assert_depends_on_exactly(&graph, c.id(), &[b.id()]);
    }

    #[test]
    fn test_frontier_correctness_across_branches() {
        let [a1, a2, b1, b2] = stages(["a1", "a2", "b1", "b2"]);
        let before = StageGraph::union([StageGraph::single(a1.clone()), StageGraph::single(a2.clone())]);
        let after = StageGraph::union([StageGraph::single(b1.clone()), StageGraph::single(b2.clone())]);

        let graph = before.sequence(after);

        assert_depends_on_exactly(&graph, b1.id(), &[a1.id(), a2.id()]);
        assert_depends_on_exactly(&graph, b2.id(), &[a1.id(), a2.id()]);
        assert_eq!(ids(graph.entry()), vec!["a1", "a2"]);
        assert_eq!(ids(graph.exit()), vec!["b1", "b2"]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_union_adds_no_edges() {
        let [a, b, c] = stages(["a", "b", "c"]);
        let left = StageGraph::single(a).sequence(StageGraph::single(b));
        let right = StageGraph::single(c);

        let graph = StageGraph::union([left.clone(), right.clone()]);

        assert_independent(&graph, &left, &right);
        assert_eq!(ids(graph.entry()), vec!["a", "c"]);
        assert_eq!(ids(graph.exit()), vec!["b", "c"]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_empty_graph_is_identity() {
        let [a, b] = stages(["a", "b"]);
        let graph = StageGraph::single(a).sequence(StageGraph::single(b));

        assert_eq!(StageGraph::new().sequence(graph.clone()), graph);
        assert_eq!(graph.clone().sequence(StageGraph::new()), graph);
        assert_eq!(StageGraph::union([StageGraph::new(), graph.clone(), StageGraph::new()]), graph);
        assert!(StageGraph::union(Vec::new()).is_empty());
    }

    #[test]
    fn test_nested_subgraph_joins_through_frontier_only() {
        let [a, b1, b2, b3, c] = stages(["a", "b1", "b2", "b3", "c"]);
        let inner = StageGraph::single(b1.clone())
            .sequence(StageGraph::union([StageGraph::single(b2.clone()), StageGraph::single(b3.clone())]));

        let graph = StageGraph::single(a.clone())
            .sequence(inner)
            .sequence(StageGraph::single(c.clone()));

        assert_depends_on_exactly(&graph, b1.id(), &[a.id()]);
        assert_depends_on_exactly(&graph, b2.id(), &[b1.id()]);
        assert_depends_on_exactly(&graph, c.id(), &[b2.id(), b3.id()]);
        graph.validate().unwrap();
    }

    #[test]
    fn test_reused_graph_is_reidentified() {
        let graph = StageGraph::single(stage("a"));

        let doubled = graph.clone().sequence(graph.clone());

        assert_eq!(doubled.len(), 2);
        let later = doubled.exit()[0].clone();
        assert_ne!(later.as_str(), "a");
        assert_eq!(later.as_str(), "a#1");
        assert_depends_on_exactly(&doubled, &later, &[&StageId::new("a")]);
        assert_acyclic(&doubled);
        doubled.validate().unwrap();

        let twins = StageGraph::union([graph.clone(), graph]);
        assert_eq!(twins.len(), 2);
        twins.validate().unwrap();
    }

    #[test]
    fn test_copy_names_depend_only_on_the_graphs() {
        let build = || {
            let graph = StageGraph::single(stage("a"));
            let doubled = graph.clone().sequence(graph);
            doubled.clone().sequence(doubled)
        };

        let first = build();
        let _unrelated = stages(["x", "y", "z"]);
        let second = build();

        let ids = |graph: &StageGraph| -> Vec<String> {
            graph.flatten().iter().map(|s| s.id().to_string()).collect()
        };
        assert_eq!(ids(&first), vec!["a", "a#1", "a#2", "a#1#1"]);
        assert_eq!(ids(&first), ids(&second));
        first.validate().unwrap();
    }

    #[test]
    fn test_reidentified_graph_keeps_internal_edges() {
        let [a, b] = stages(["a", "b"]);
        let chain = StageGraph::single(a).sequence(StageGraph::single(b));

        let repeated = chain.clone().sequence(chain);

        assert_eq!(repeated.len(), 4);
        let order: Vec<&str> = repeated.flatten().iter().map(|s| s.kind()).collect();
        assert_eq!(order, vec!["wait", "wait", "wait", "wait"]);
        let last = repeated.get(&repeated.exit()[0]).unwrap();
        let copy_of_a = last.depends_on()[0].clone();
        assert_depends_on_exactly(&repeated, &copy_of_a, &[&StageId::new("b")]);
        repeated.validate().unwrap();
    }

    #[test]
    fn test_flatten_follows_construction_order() {
        let [a, b, c] = stages(["z", "y", "x"]);
        let graph = StageGraph::union([StageGraph::single(c.clone()), StageGraph::single(a.clone())])
            .sequence(StageGraph::single(b.clone()));

        let order: Vec<&str> = graph.flatten().iter().map(|s| s.id().as_str()).collect();
        assert_eq!(order, vec!["z", "y", "x"]);
    }

    #[test]
    fn test_topological_order_respects_dependencies() {
        let [a, b, c] = stages(["a", "b", "c"]);
        let graph = StageGraph::single(c.clone())
            .sequence(StageGraph::single(b.clone()))
            .sequence(StageGraph::single(a.clone()));

        let order: Vec<&str> = graph
            .topological_order()
            .unwrap()
            .iter()
            .map(|s| s.id().as_str())
            .collect();
        assert_eq!(order, vec!["c", "b", "a"]);
    }

    #[test]
    fn test_validate_reports_self_loop() {
        let a = stage("a");
        let looped = a.clone().with_raw_dependencies(vec![a.id().clone()]);
        let graph = StageGraph::from_parts(vec![looped], vec![], vec![]);

        let err = graph.validate().unwrap_err();
        assert_eq!(err.error_info.code, "CANAL-003-SELF_LOOP");
    }

    #[test]
    fn test_validate_reports_dangling_edge() {
        let a = stage("a").with_raw_dependencies(vec![StageId::new("ghost")]);
        let graph = StageGraph::from_parts(vec![a], vec![], vec![StageId::new("a")]);

        let err = graph.validate().unwrap_err();
        assert_eq!(err.error_info.code, "CANAL-003-DANGLING_EDGE");
        assert!(graph.topological_order().is_err());
    }

    #[test]
    fn test_validate_reports_cycle() {
        let [a, b] = stages(["a", "b"]);
        let a = a.with_raw_dependencies(vec![StageId::new("b")]);
        let b = b.with_raw_dependencies(vec![StageId::new("a")]);
        let graph = StageGraph::from_parts(vec![a, b], vec![], vec![]);

        let err = graph.validate().unwrap_err();
        assert_eq!(err.error_info.code, "CANAL-003-CYCLE");
        assert_eq!(err.stages.len(), 3);
        assert_eq!(err.stages.first(), err.stages.last());
        assert_eq!(graph.topological_order().unwrap_err().error_info.code, "CANAL-003-CYCLE");
    }

    #[test]
    fn test_validate_reports_frontier_mismatch() {
        let [a, b] = stages(["a", "b"]);
        let b = b.with_raw_dependencies(vec![StageId::new("a")]);
        let graph = StageGraph::from_parts(
            vec![a, b],
            vec![StageId::new("a"), StageId::new("b")],
            vec![StageId::new("b")],
        );

        let err = graph.validate().unwrap_err();
        assert_eq!(err.error_info.code, "CANAL-003-FRONTIER");
        assert_eq!(err.stages, vec!["b".to_string()]);
    }

    #[test]
    fn test_collect_into_union() {
        let graph: StageGraph = stages(["a", "b", "c"]).into_iter().map(StageGraph::from).collect();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.entry().len(), 3);
        assert_eq!(graph.exit().len(), 3);
    }
}
