//! Error types for the canal pipeline builder.
//!
//! Every failure is synchronous and raised by the call that triggered it.
//! Struct errors carry a [`ContractErrorInfo`] so callers can report a stable
//! code and a fix hint alongside the message.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// The main error type for canal operations.
#[derive(Debug, Error)]
pub enum CanalError {
    /// A shared stage field had no explicit value and no active default.
    #[error("{0}")]
    MissingDefault(#[from] MissingDefaultError),

    /// A stage or trigger referenced an artifact the pipeline never registered.
    #[error("{0}")]
    UnknownArtifactReference(#[from] UnknownArtifactReferenceError),

    /// A stage graph broke one of its structural invariants.
    #[error("{0}")]
    GraphInvariant(#[from] GraphInvariantError),

    /// Pipeline-level validation failed.
    #[error("{0}")]
    Validation(#[from] PipelineValidationError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for CanalError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl CanalError {
    /// Returns the contract error info for this error, if it carries one.
    #[must_use]
    pub fn error_info(&self) -> Option<&ContractErrorInfo> {
        match self {
            Self::MissingDefault(err) => Some(&err.error_info),
            Self::UnknownArtifactReference(err) => Some(&err.error_info),
            Self::GraphInvariant(err) => Some(&err.error_info),
            Self::Validation(err) => err.error_info.as_ref(),
            Self::Serialization(_) => None,
        }
    }
}

/// Metadata about a contract error for better diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct ContractErrorInfo {
    /// Error code (e.g., "CANAL-003-CYCLE").
    pub code: String,
    /// Short summary of the error.
    pub summary: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
    /// Additional context key-value pairs.
    #[serde(default)]
    pub context: HashMap<String, String>,
}

impl ContractErrorInfo {
    /// Creates a new contract error info.
    #[must_use]
    pub fn new(code: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            summary: summary.into(),
            fix_hint: None,
            context: HashMap::new(),
        }
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Adds a single context entry.
    #[must_use]
    pub fn with_context_entry(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::Value::String(self.code.clone()));
        map.insert("summary".to_string(), serde_json::Value::String(self.summary.clone()));

        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::Value::String(hint.clone()));
        }
        if !self.context.is_empty() {
            let context_map: serde_json::Map<String, serde_json::Value> = self
                .context
                .iter()
                .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
                .collect();
            map.insert("context".to_string(), serde_json::Value::Object(context_map));
        }

        map
    }
}

/// Raised when a stage needs a shared field that nothing supplies.
#[derive(Debug, Clone, Error)]
#[error("Stage '{stage_kind}' requires '{field}' but it was not set explicitly or by any active defaults")]
pub struct MissingDefaultError {
    /// The missing field name (e.g. "region").
    pub field: String,
    /// The kind of stage being constructed.
    pub stage_kind: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl MissingDefaultError {
    /// Creates a new missing default error.
    #[must_use]
    pub fn new(field: impl Into<String>, stage_kind: impl Into<String>) -> Self {
        let field = field.into();
        let stage_kind = stage_kind.into();
        let info = ContractErrorInfo::new(
            "CANAL-001-MISSING_DEFAULT",
            format!("No value for '{field}' while building a '{stage_kind}' stage"),
        )
        .with_fix_hint(format!(
            "Set '{field}' on the stage or wrap its construction in with_defaults with '{field}' defined."
        ))
        .with_context_entry("field", field.clone())
        .with_context_entry("stage_kind", stage_kind.clone());

        Self {
            field,
            stage_kind,
            error_info: info,
        }
    }
}

/// Raised at assembly when an artifact id was referenced but never registered.
#[derive(Debug, Clone, Error)]
#[error("Unknown artifact reference '{artifact_id}' used by {referenced_by}")]
pub struct UnknownArtifactReferenceError {
    /// The unregistered artifact id.
    pub artifact_id: String,
    /// Human description of the referencing stage or trigger.
    pub referenced_by: String,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl UnknownArtifactReferenceError {
    /// Creates a new unknown artifact reference error.
    #[must_use]
    pub fn new(artifact_id: impl Into<String>, referenced_by: impl Into<String>) -> Self {
        let artifact_id = artifact_id.into();
        let referenced_by = referenced_by.into();
        let info = ContractErrorInfo::new(
            "CANAL-002-UNKNOWN_ARTIFACT",
            format!("Artifact '{artifact_id}' is not registered with the pipeline"),
        )
        .with_fix_hint("Register the expected artifact on the pipeline before referencing it.")
        .with_context_entry("artifact_id", artifact_id.clone())
        .with_context_entry("referenced_by", referenced_by.clone());

        Self {
            artifact_id,
            referenced_by,
            error_info: info,
        }
    }
}

/// Raised when a stage graph is not a well-formed DAG with a consistent frontier.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GraphInvariantError {
    /// The error message.
    pub message: String,
    /// The stage ids involved.
    pub stages: Vec<String>,
    /// Contract error info.
    pub error_info: ContractErrorInfo,
}

impl GraphInvariantError {
    /// A dependency cycle, given as the path that closes it.
    #[must_use]
    pub fn cycle(cycle_path: Vec<String>) -> Self {
        let path = cycle_path.join(" -> ");
        Self {
            message: format!("Cycle detected in stage graph: {path}"),
            error_info: ContractErrorInfo::new(
                "CANAL-003-CYCLE",
                format!("Stage graph contains a dependency cycle: {path}"),
            )
            .with_fix_hint("Compose graphs with then/parallel only; they cannot introduce cycles."),
            stages: cycle_path,
        }
    }

    /// A stage that depends on itself.
    #[must_use]
    pub fn self_loop(stage: impl Into<String>) -> Self {
        let stage = stage.into();
        Self {
            message: format!("Stage '{stage}' depends on itself"),
            error_info: ContractErrorInfo::new("CANAL-003-SELF_LOOP", "Stage depends on itself"),
            stages: vec![stage],
        }
    }

    /// A dependency on a stage outside the graph.
    #[must_use]
    pub fn dangling(stage: impl Into<String>, dependency: impl Into<String>) -> Self {
        let stage = stage.into();
        let dependency = dependency.into();
        Self {
            message: format!("Stage '{stage}' depends on '{dependency}' which is not in the graph"),
            error_info: ContractErrorInfo::new(
                "CANAL-003-DANGLING_EDGE",
                format!("Dependency '{dependency}' not found"),
            )
            .with_context_entry("stage", stage.clone()),
            stages: vec![stage, dependency],
        }
    }

    /// Entry or exit frontier disagrees with the edges.
    #[must_use]
    pub fn frontier(message: impl Into<String>, stages: Vec<String>) -> Self {
        let message = message.into();
        Self {
            error_info: ContractErrorInfo::new("CANAL-003-FRONTIER", message.clone()),
            message,
            stages,
        }
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("message".to_string(), serde_json::Value::String(self.message.clone()));
        map.insert(
            "stages".to_string(),
            serde_json::Value::Array(
                self.stages
                    .iter()
                    .map(|s| serde_json::Value::String(s.clone()))
                    .collect(),
            ),
        );
        let info_map: serde_json::Map<String, serde_json::Value> =
            self.error_info.to_dict().into_iter().collect();
        map.insert("error_info".to_string(), serde_json::Value::Object(info_map));
        map
    }
}

/// Error raised when pipeline validation fails.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PipelineValidationError {
    /// The error message.
    pub message: String,
    /// Optional contract error info.
    pub error_info: Option<ContractErrorInfo>,
}

impl PipelineValidationError {
    /// Creates a new pipeline validation error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_info: None,
        }
    }

    /// Sets the contract error info.
    #[must_use]
    pub fn with_error_info(mut self, info: ContractErrorInfo) -> Self {
        self.error_info = Some(info);
        self
    }
}

/// Provides default suggestions for common contract error codes.
pub struct ContractSuggestions;

impl ContractSuggestions {
    /// Gets a suggestion for a given error code.
    #[must_use]
    pub fn get(code: &str) -> Option<&'static str> {
        match code {
            "CANAL-001-MISSING_DEFAULT" => Some(
                "Pass the field to the stage builder, or build the stage inside \
                 Scope::with_defaults with an overlay that defines it.",
            ),
            "CANAL-002-UNKNOWN_ARTIFACT" => Some(
                "Every artifact used by a trigger or deploy stage must be added with \
                 PipelineBuilder::expected_artifact.",
            ),
            "CANAL-003-CYCLE" | "CANAL-003-SELF_LOOP" | "CANAL-003-DANGLING_EDGE" => Some(
                "Build stage graphs through Grapher::then and StageGraph::union; \
                 hand-edited dependency lists are not supported.",
            ),
            "CANAL-004-EMPTY_NAME" => Some("Give the pipeline a non-blank name."),
            "CANAL-005-DUPLICATE_VARIABLE" | "CANAL-005-VARIABLE_TYPE" => Some(
                "Declare each template variable once, with a default of its declared type \
                 or null for a nullable variable.",
            ),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_error_info_creation() {
        let info = ContractErrorInfo::new("TEST-001", "Test error")
            .with_fix_hint("Fix this by doing that")
            .with_context_entry("stage", "wait1");

        assert_eq!(info.code, "TEST-001");
        assert_eq!(info.fix_hint, Some("Fix this by doing that".to_string()));
        assert_eq!(info.context.get("stage"), Some(&"wait1".to_string()));
    }

    #[test]
    fn test_missing_default_names_field_and_stage() {
        let err = MissingDefaultError::new("region", "deployService");

        let message = err.to_string();
        assert!(message.contains("region"));
        assert!(message.contains("deployService"));
        assert_eq!(err.error_info.code, "CANAL-001-MISSING_DEFAULT");
    }

    #[test]
    fn test_cycle_error_path() {
        let err = GraphInvariantError::cycle(vec![
            "a".to_string(),
            "b".to_string(),
            "a".to_string(),
        ]);

        assert!(err.to_string().contains("a -> b -> a"));
        assert_eq!(err.error_info.code, "CANAL-003-CYCLE");
        assert_eq!(err.to_dict()["stages"], serde_json::json!(["a", "b", "a"]));
    }

    #[test]
    fn test_canal_error_exposes_info() {
        let err: CanalError = UnknownArtifactReferenceError::new("7", "trigger #0 (jenkins)").into();

        assert_eq!(err.error_info().unwrap().code, "CANAL-002-UNKNOWN_ARTIFACT");
        assert!(err.to_string().contains("'7'"));
    }

    #[test]
    fn test_contract_suggestions() {
        assert!(ContractSuggestions::get("CANAL-003-CYCLE").is_some());
        assert!(ContractSuggestions::get("CANAL-005-VARIABLE_TYPE").is_some());
        assert!(ContractSuggestions::get("UNKNOWN").is_none());
    }
}
