//! Testing utilities for canal pipelines.
//!
//! This module provides:
//! - Structural assertions on stage graphs
//! - Fixtures for stages, scopes and defaults with predictable ids

pub mod assertions;
pub mod fixtures;

pub use assertions::{
    assert_acyclic, assert_depends_on_exactly, assert_frontiers, assert_independent,
};
pub use fixtures::{cf_defaults, sequential_scope, stage, stages, FixedIdSource};
