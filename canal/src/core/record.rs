//! The immutable stage record.

use crate::artifacts::ArtifactId;
use crate::utils::{next_sequence, IdSource};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire keys owned by the assembler; kind-specific fields may not shadow them.
pub(crate) const RESERVED_FIELDS: [&str; 4] = ["type", "name", "refId", "requisiteStageRefIds"];

/// Opaque unique identifier of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StageId(String);

impl StageId {
    /// Wraps an existing id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One pipeline step.
///
/// Records never change once built. Operations that look like edits
/// ([`renamed`](Self::renamed), dependency attachment inside the graph engine)
/// return a new record, so graphs already handed out keep their view.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    id: StageId,
    sequence: u64,
    kind: String,
    name: Option<String>,
    depends_on: Vec<StageId>,
    fields: serde_json::Map<String, serde_json::Value>,
    artifacts: Vec<ArtifactId>,
}

impl StageRecord {
    /// Creates a record with a fresh id drawn from `ids`.
    ///
    /// Keys in `fields` that collide with the wire envelope (`type`, `name`,
    /// `refId`, `requisiteStageRefIds`) are dropped.
    #[must_use]
    pub fn new(
        ids: &dyn IdSource,
        kind: impl Into<String>,
        mut fields: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        fields.retain(|key, _| !RESERVED_FIELDS.contains(&key.as_str()));
        Self {
            id: StageId::new(ids.next_id()),
            sequence: next_sequence(),
            kind: kind.into(),
            name: None,
            depends_on: Vec::new(),
            fields,
            artifacts: Vec::new(),
        }
    }

    /// Sets the display name on a record that is still being built.
    #[must_use]
    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    /// Declares the artifacts this stage uses.
    #[must_use]
    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = ArtifactId>) -> Self {
        for artifact in artifacts {
            if !self.artifacts.contains(&artifact) {
                self.artifacts.push(artifact);
            }
        }
        self
    }

    /// Returns a copy with a different display name and the same identity.
    #[must_use]
    pub fn renamed(&self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self.clone()
        }
    }

    /// Returns the stage id.
    #[must_use]
    pub fn id(&self) -> &StageId {
        &self.id
    }

    /// Returns the construction sequence number.
    #[must_use]
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the stage kind (the wire `type`).
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the display name.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the ids this stage depends on, in attachment order.
    #[must_use]
    pub fn depends_on(&self) -> &[StageId] {
        &self.depends_on
    }

    /// Returns the kind-specific fields.
    #[must_use]
    pub fn fields(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.fields
    }

    /// Returns a single kind-specific field.
    #[must_use]
    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Returns the artifacts this stage declares use of.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactId] {
        &self.artifacts
    }

    /// Returns a copy that additionally depends on `upstream`.
    ///
    /// Duplicates and the record's own id are skipped.
    pub(crate) fn with_dependencies<'a>(
        &self,
        upstream: impl IntoIterator<Item = &'a StageId>,
    ) -> Self {
        let mut record = self.clone();
        for id in upstream {
            if *id != record.id && !record.depends_on.contains(id) {
                record.depends_on.push(id.clone());
            }
        }
        record
    }

    /// Returns a copy with no dependencies.
    pub(crate) fn detached(&self) -> Self {
        Self {
            depends_on: Vec::new(),
            ..self.clone()
        }
    }

    /// Returns a copy under a new identity and construction slot.
    pub(crate) fn reidentified(&self, id: StageId, depends_on: Vec<StageId>) -> Self {
        Self {
            id,
            sequence: next_sequence(),
            depends_on,
            ..self.clone()
        }
    }

    #[cfg(test)]
    pub(crate) fn with_raw_dependencies(mut self, depends_on: Vec<StageId>) -> Self {
        self.depends_on = depends_on;
        self
    }
}
