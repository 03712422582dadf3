//! Stage kinds and the trait that turns them into stage records.
//!
//! A stage kind is a typed, serde-serializable configuration. It is turned
//! into a [`StageRecord`](crate::core::StageRecord) by
//! [`Scope::stage`], which resolves any shared fields the kind leaves unset
//! against the scope's defaults.

pub mod cloudfoundry;
pub mod common;

use crate::artifacts::ArtifactId;
use crate::context::Scope;
use crate::core::{Condition, StageOptions};
use crate::errors::CanalError;
use serde::Serialize;

/// Kind-specific fields of a stage, as they appear on the wire.
pub type StageFields = serde_json::Map<String, serde_json::Value>;

/// A kind of pipeline stage.
///
/// Implementors supply the wire `type`, their fields and the options common
/// to every stage. The provided methods set those options fluently.
pub trait StageDefinition {
    /// The wire `type` of the stage.
    fn kind(&self) -> &str;

    /// Options shared by all stage kinds.
    fn options(&self) -> &StageOptions;

    /// Mutable access to the shared options.
    fn options_mut(&mut self) -> &mut StageOptions;

    /// Produces the kind-specific fields, resolving shared values against `scope`.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::MissingDefault`] when a required shared field is
    /// neither set on the stage nor defined by any overlay in `scope`.
    fn fields(&self, scope: &Scope<'_>) -> Result<StageFields, CanalError>;

    /// Expected artifacts this stage uses.
    fn artifacts(&self) -> Vec<ArtifactId> {
        Vec::new()
    }

    /// Sets the display name.
    #[must_use]
    fn name(mut self, name: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.options_mut().name = Some(name.into());
        self
    }

    /// Sets free-form comments.
    #[must_use]
    fn comments(mut self, comments: impl Into<String>) -> Self
    where
        Self: Sized,
    {
        self.options_mut().comments = Some(comments.into());
        self
    }

    /// Runs the stage only when `condition` holds.
    #[must_use]
    fn stage_enabled(mut self, condition: Condition) -> Self
    where
        Self: Sized,
    {
        self.options_mut().stage_enabled = Some(condition);
        self
    }

    /// Lets other branches finish before failing the pipeline.
    #[must_use]
    fn complete_other_branches_then_fail(mut self, enabled: bool) -> Self
    where
        Self: Sized,
    {
        self.options_mut().complete_other_branches_then_fail = Some(enabled);
        self
    }

    /// Continues the pipeline when this stage fails.
    #[must_use]
    fn continue_pipeline(mut self, enabled: bool) -> Self
    where
        Self: Sized,
    {
        self.options_mut().continue_pipeline = Some(enabled);
        self
    }

    /// Fails the pipeline when this stage fails.
    #[must_use]
    fn fail_pipeline(mut self, enabled: bool) -> Self
    where
        Self: Sized,
    {
        self.options_mut().fail_pipeline = Some(enabled);
        self
    }

    /// Fails the stage when one of its expressions cannot be evaluated.
    #[must_use]
    fn fail_on_failed_expressions(mut self, enabled: bool) -> Self
    where
        Self: Sized,
    {
        self.options_mut().fail_on_failed_expressions = Some(enabled);
        self
    }
}

/// A stage of any kind, with fields supplied as raw JSON.
///
/// For kinds the catalog does not cover.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomStage {
    kind: String,
    fields: StageFields,
    artifacts: Vec<ArtifactId>,
    options: StageOptions,
}

impl CustomStage {
    /// Creates a stage of `kind` with the given fields.
    #[must_use]
    pub fn new(kind: impl Into<String>, fields: StageFields) -> Self {
        Self {
            kind: kind.into(),
            fields,
            artifacts: Vec::new(),
            options: StageOptions::default(),
        }
    }

    /// Declares use of an expected artifact.
    #[must_use]
    pub fn uses_artifact(mut self, artifact: ArtifactId) -> Self {
        self.artifacts.push(artifact);
        self
    }
}

impl StageDefinition for CustomStage {
    fn kind(&self) -> &str {
        &self.kind
    }

    fn options(&self) -> &StageOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut StageOptions {
        &mut self.options
    }

    fn fields(&self, _scope: &Scope<'_>) -> Result<StageFields, CanalError> {
        Ok(self.fields.clone())
    }

    fn artifacts(&self) -> Vec<ArtifactId> {
        self.artifacts.clone()
    }
}

/// Serializes a kind's wire struct into stage fields.
pub(crate) fn to_fields<T: Serialize>(value: &T) -> Result<StageFields, CanalError> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(fields) => Ok(fields),
        other => Err(CanalError::Serialization(format!(
            "stage fields must serialize to a JSON object, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sequential_scope;
    use serde_json::json;

    #[test]
    fn test_custom_stage_passes_fields_through() {
        let scope = sequential_scope();
        let fields = json!({"script": "deploy.sh"}).as_object().cloned().unwrap();

        let record = scope
            .stage(
                CustomStage::new("script", fields)
                    .uses_artifact(ArtifactId::new("7"))
                    .name("Run script")
                    .fail_pipeline(true),
            )
            .unwrap();

        assert_eq!(record.kind(), "script");
        assert_eq!(record.name(), Some("Run script"));
        assert_eq!(record.field("script"), Some(&json!("deploy.sh")));
        assert_eq!(record.field("failPipeline"), Some(&json!(true)));
        assert_eq!(record.artifacts(), &[ArtifactId::new("7")]);
    }

    #[test]
    fn test_options_are_applied_fluently() {
        let stage = CustomStage::new("noop", StageFields::new())
            .comments("note")
            .stage_enabled(Condition::expression("${ true }"))
            .complete_other_branches_then_fail(true)
            .continue_pipeline(false)
            .fail_on_failed_expressions(true);

        let options = stage.options();
        assert_eq!(options.comments.as_deref(), Some("note"));
        assert_eq!(options.complete_other_branches_then_fail, Some(true));
        assert_eq!(options.continue_pipeline, Some(false));
        assert_eq!(options.fail_on_failed_expressions, Some(true));
        assert!(options.stage_enabled.is_some());
    }

    #[test]
    fn test_to_fields_rejects_non_objects() {
        assert!(matches!(to_fields(&42), Err(CanalError::Serialization(_))));
    }
}
