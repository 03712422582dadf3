//! Test assertions for stage graphs.

use crate::core::StageId;
use crate::graph::StageGraph;
use std::collections::HashSet;

/// Asserts that stage `id` depends on exactly `expected`, in any order.
pub fn assert_depends_on_exactly(graph: &StageGraph, id: &StageId, expected: &[&StageId]) {
    let stage = graph
        .get(id)
        .unwrap_or_else(|| panic!("Stage '{id}' is not in the graph"));
    let actual: HashSet<&StageId> = stage.depends_on().iter().collect();
    let expected_set: HashSet<&StageId> = expected.iter().copied().collect();
    assert_eq!(
        actual, expected_set,
        "Stage '{id}' depends on {:?}, expected {:?}",
        stage.depends_on(),
        expected
    );
    assert_eq!(
        stage.depends_on().len(),
        actual.len(),
        "Stage '{id}' lists a dependency twice"
    );
}

/// Asserts that no stage of `left` is linked to a stage of `right` in `graph`.
///
/// `left` and `right` are the operands; `graph` is the composed result.
pub fn assert_independent(graph: &StageGraph, left: &StageGraph, right: &StageGraph) {
    let left_ids: HashSet<&StageId> = left.stages().map(|s| s.id()).collect();
    let right_ids: HashSet<&StageId> = right.stages().map(|s| s.id()).collect();

    for stage in graph.stages() {
        let other = if left_ids.contains(stage.id()) {
            &right_ids
        } else if right_ids.contains(stage.id()) {
            &left_ids
        } else {
            continue;
        };
        for dep in stage.depends_on() {
            assert!(
                !other.contains(dep),
                "Stage '{}' depends on '{dep}' across a parallel boundary",
                stage.id()
            );
        }
    }
}

/// Asserts that the graph has a topological order covering every stage.
pub fn assert_acyclic(graph: &StageGraph) {
    match graph.topological_order() {
        Ok(order) => assert_eq!(order.len(), graph.len(), "Topological order is missing stages"),
        Err(err) => panic!("Expected an acyclic graph: {err}"),
    }
}

/// Asserts the entry and exit frontiers, in order.
pub fn assert_frontiers(graph: &StageGraph, entry: &[&StageId], exit: &[&StageId]) {
    let actual_entry: Vec<&StageId> = graph.entry().iter().collect();
    let actual_exit: Vec<&StageId> = graph.exit().iter().collect();
    assert_eq!(actual_entry, entry, "Unexpected entry frontier");
    assert_eq!(actual_exit, exit, "Unexpected exit frontier");
}
