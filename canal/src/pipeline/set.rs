//! Pipelines for several applications in one document.

use super::PipelineDocument;
use crate::errors::CanalError;
use serde::ser::{Serialize, SerializeMap, Serializer};

/// Pipelines grouped by application, serialized as one JSON object.
///
/// Applications appear in the order they were first added.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineSet {
    applications: Vec<(String, Vec<PipelineDocument>)>,
}

impl PipelineSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds pipelines for `application`, after any it already has.
    #[must_use]
    pub fn with_pipelines_for_app(
        mut self,
        application: impl Into<String>,
        pipelines: impl IntoIterator<Item = PipelineDocument>,
    ) -> Self {
        let application = application.into();
        match self.applications.iter_mut().find(|(app, _)| *app == application) {
            Some((_, existing)) => existing.extend(pipelines),
            None => self.applications.push((application, pipelines.into_iter().collect())),
        }
        self
    }

    /// Returns the pipelines of `application`.
    #[must_use]
    pub fn pipelines_for_app(&self, application: &str) -> &[PipelineDocument] {
        self.applications
            .iter()
            .find(|(app, _)| app == application)
            .map_or(&[], |(_, pipelines)| pipelines.as_slice())
    }

    /// Serializes to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, CanalError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serializes to indented JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Serialization`] if encoding fails.
    pub fn to_json_pretty(&self) -> Result<String, CanalError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Serialize for PipelineSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.applications.len()))?;
        for (application, pipelines) in &self.applications {
            map.serialize_entry(application, pipelines)?;
        }
        map.end()
    }
}
