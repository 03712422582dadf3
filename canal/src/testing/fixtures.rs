//! Test fixtures for building stages and scopes with predictable ids.

use crate::context::{CloudProvider, Defaults, Scope};
use crate::core::StageRecord;
use crate::utils::{IdSource, SequentialIdSource};
use std::sync::Arc;

/// An id source that always returns the same id.
#[derive(Debug, Clone)]
pub struct FixedIdSource(pub String);

impl IdSource for FixedIdSource {
    fn next_id(&self) -> String {
        self.0.clone()
    }
}

/// A `wait` stage with the given id.
#[must_use]
pub fn stage(id: &str) -> StageRecord {
    let mut fields = serde_json::Map::new();
    fields.insert("waitTime".to_string(), serde_json::Value::String("1".to_string()));
    StageRecord::new(&FixedIdSource(id.to_string()), "wait", fields)
}

/// `wait` stages with the given ids, built in array order.
#[must_use]
pub fn stages<const N: usize>(ids: [&str; N]) -> [StageRecord; N] {
    ids.map(stage)
}

/// A root scope whose stages get ids "0", "1", "2", ...
#[must_use]
pub fn sequential_scope() -> Scope<'static> {
    Scope::with_id_source(Arc::new(SequentialIdSource::new()))
}

/// Cloud Foundry defaults for the given region.
#[must_use]
pub fn cf_defaults(region: &str) -> Defaults {
    Defaults::new()
        .account("montclair")
        .application("app1")
        .region(region)
        .cloud_provider(CloudProvider::cloud_foundry("creds1"))
}
