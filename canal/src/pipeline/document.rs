//! The serialized pipeline document.

use crate::artifacts::{ArtifactId, ExpectedArtifact};
use crate::errors::CanalError;
use crate::stages::StageFields;
use crate::triggers::TriggerKind;
use serde::{Deserialize, Serialize};

/// A fully assembled pipeline in the orchestration platform's format.
///
/// Parsing accepts exported pipelines that omit empty lists or the
/// application, as pipelines embedded in templates do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDocument {
    /// Pipeline name.
    pub name: String,
    /// Owning application.
    #[serde(default)]
    pub application: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Queue executions instead of cancelling waiting ones.
    #[serde(default)]
    pub keep_waiting_pipelines: bool,
    /// Disallow concurrent executions.
    #[serde(default = "limit_concurrent_default")]
    pub limit_concurrent: bool,
    /// Parameters offered when starting the pipeline by hand.
    #[serde(default)]
    pub parameter_config: Vec<Parameter>,
    /// Pipeline notifications.
    #[serde(default)]
    pub notifications: Vec<Notification>,
    /// Stages in emission order.
    #[serde(default)]
    pub stages: Vec<StageDocument>,
    /// Triggers in declaration order.
    #[serde(default)]
    pub triggers: Vec<TriggerDocument>,
    /// Expected artifacts in registration order.
    #[serde(default)]
    pub expected_artifacts: Vec<ExpectedArtifact>,
}

const fn limit_concurrent_default() -> bool {
    true
}

impl PipelineDocument {
    /// Parses an exported pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Serialization`] if `json` is not a pipeline.
    pub fn from_json(json: &str) -> Result<Self, CanalError> {
        Ok(serde_json::from_str(json)?)
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

    /// Converts to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Serialization`] if encoding fails.
    pub fn to_value(&self) -> Result<serde_json::Value, CanalError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Looks up a stage by `refId`.
    #[must_use]
    pub fn stage(&self, ref_id: &str) -> Option<&StageDocument> {
        self.stages.iter().find(|stage| stage.ref_id == ref_id)
    }
}

/// One stage on the wire.
///
/// Keys other than the four structural ones land in `fields` when parsed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageDocument {
    /// Stage kind.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Reference id, unique within the pipeline.
    pub ref_id: String,
    /// `refId`s of the stages this one waits for.
    #[serde(default)]
    pub requisite_stage_ref_ids: Vec<String>,
    /// Kind-specific fields.
    #[serde(flatten)]
    pub fields: StageFields,
}

/// One trigger on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDocument {
    /// Kind-specific fields, including `type`.
    #[serde(flatten)]
    pub kind: TriggerKind,
    /// Whether the trigger is enabled.
    pub enabled: bool,
    /// Ids of the expected artifacts the trigger supplies.
    #[serde(default)]
    pub expected_artifact_ids: Vec<ArtifactId>,
}

/// A pipeline parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    /// Parameter name.
    pub name: String,
    /// Whether a value must be supplied.
    pub required: bool,
    /// Label shown in the UI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Help text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    /// Allowed values; empty means any.
    #[serde(default)]
    pub options: Vec<ParameterOption>,
}

/// An allowed parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterOption {
    /// The value.
    pub value: String,
}

impl Parameter {
    /// A required parameter with no default.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            label: None,
            description: None,
            default: None,
            options: Vec::new(),
        }
    }

    /// Marks the parameter optional.
    #[must_use]
    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    /// Sets the label.
    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Sets the help text.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restricts the parameter to `values`.
    #[must_use]
    pub fn options<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = values
            .into_iter()
            .map(|value| ParameterOption { value: value.into() })
            .collect();
        self
    }
}

/// A pipeline notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notification {
    /// Email on pipeline events.
    Email {
        /// Recipient address.
        address: String,
        /// Notification level, e.g. "pipeline".
        level: String,
    },
}

impl Notification {
    /// An email notification.
    #[must_use]
    pub fn email(address: impl Into<String>, level: impl Into<String>) -> Self {
        Self::Email {
            address: address.into(),
            level: level.into(),
        }
    }
}
