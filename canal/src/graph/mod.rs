//! Stage graph composition.
//!
//! A [`StageGraph`] is a DAG with an entry and an exit frontier. Graphs
//! compose in sequence (every exit of the first feeds every entry of the
//! second) and in parallel (side by side, no new edges). [`Grapher`] is the
//! fluent front end.

mod grapher;
mod stage_graph;

pub use grapher::{parallel, Grapher};
pub use stage_graph::StageGraph;
