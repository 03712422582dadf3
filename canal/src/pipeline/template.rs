//! Pipeline templates and the configurations that instantiate them.
//!
//! A [`PipelineTemplate`] wraps a [`PipelineDocument`] whose fields may hold
//! `${ templateVariables.<name> }` expressions, and declares the typed
//! variables those expressions read. A [`PipelineTemplateInstance`] names a
//! template by source and supplies variable values. Expressions are kept as
//! opaque strings; resolving them is the orchestration platform's job.

use super::document::{Notification, Parameter, PipelineDocument, StageDocument, TriggerDocument};
use crate::errors::{CanalError, ContractErrorInfo, PipelineValidationError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Template schema version written by this crate.
pub const TEMPLATE_SCHEMA: &str = "v2";

fn schema_default() -> String {
    TEMPLATE_SCHEMA.to_string()
}

/// A reusable pipeline with typed variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineTemplate {
    /// Template schema version.
    #[serde(default = "schema_default")]
    pub schema: String,
    /// Template id, referenced by instances as their source.
    pub id: String,
    /// Whether the template is locked against edits.
    #[serde(default)]
    pub protect: bool,
    /// Descriptive metadata.
    pub metadata: TemplateMetadata,
    /// Declared variables, in declaration order.
    #[serde(default)]
    pub variables: Vec<TemplateVariable>,
    /// The templated pipeline.
    pub pipeline: PipelineDocument,
}

impl PipelineTemplate {
    /// Creates an unprotected template with no variables.
    #[must_use]
    pub fn new(id: impl Into<String>, metadata: TemplateMetadata, pipeline: PipelineDocument) -> Self {
        Self {
            schema: schema_default(),
            id: id.into(),
            protect: false,
            metadata,
            variables: Vec::new(),
            pipeline,
        }
    }

    /// Declares a variable.
    #[must_use]
    pub fn variable(mut self, variable: TemplateVariable) -> Self {
        self.variables.push(variable);
        self
    }

    /// Locks the template against edits.
    #[must_use]
    pub fn protected(mut self) -> Self {
        self.protect = true;
        self
    }

    /// Looks up a declared variable by name.
    #[must_use]
    pub fn variable_named(&self, name: &str) -> Option<&TemplateVariable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    /// Checks that variable names are unique and defaults match their types.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Validation`] naming the first offending variable.
    pub fn validate(&self) -> Result<(), CanalError> {
        let mut seen = std::collections::HashSet::new();
        for variable in &self.variables {
            if !seen.insert(variable.name.as_str()) {
                return Err(variable_error(
                    "CANAL-005-DUPLICATE_VARIABLE",
                    format!("Template variable '{}' is declared twice", variable.name),
                    &variable.name,
                ));
            }
            if let Some(default) = &variable.default_value {
                if !variable.admits(default) {
                    return Err(variable_error(
                        "CANAL-005-VARIABLE_TYPE",
                        format!(
                            "Default for template variable '{}' is not a {}",
                            variable.name,
                            variable.variable_type.name()
                        ),
                        &variable.name,
                    ));
                }
            }
        }
        Ok(())
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
    pub fn to_value(&self) -> Result<Value, CanalError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses a template.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Serialization`] if `json` is not a template.
    pub fn from_json(json: &str) -> Result<Self, CanalError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn variable_error(code: &str, message: String, variable: &str) -> CanalError {
    PipelineValidationError::new(message.clone())
        .with_error_info(
            ContractErrorInfo::new(code, message)
                .with_fix_hint("Give each template variable a unique name and a default of its declared type.")
                .with_context_entry("variable", variable),
        )
        .into()
}

/// Who a template is for and where it applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateMetadata {
    /// Display name.
    pub name: String,
    /// What the template does.
    pub description: String,
    /// Owner contact.
    pub owner: String,
    /// Where the template may be used.
    #[serde(default = "TemplateMetadata::default_scopes")]
    pub scopes: Vec<TemplateScope>,
}

impl TemplateMetadata {
    /// Metadata with the global scope.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        owner: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            owner: owner.into(),
            scopes: Self::default_scopes(),
        }
    }

    fn default_scopes() -> Vec<TemplateScope> {
        vec![TemplateScope::Global]
    }
}

/// Template visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateScope {
    /// Usable from every application.
    Global,
}

/// The wire type of a template variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariableType {
    /// `int`
    Int,
    /// `string`
    String,
    /// `float`
    Float,
    /// `boolean`
    Boolean,
    /// `list`
    List,
    /// `object`
    Object,
}

impl VariableType {
    /// The wire name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Int => "int",
            Self::String => "string",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::List => "list",
            Self::Object => "object",
        }
    }

    /// Whether `value` has this type. Integers count as floats.
    #[must_use]
    pub fn admits(self, value: &Value) -> bool {
        match self {
            Self::Int => value.is_i64() || value.is_u64(),
            Self::String => value.is_string(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::List => value.is_array(),
            Self::Object => value.is_object(),
        }
    }
}

/// A typed template variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateVariable {
    /// Declared type.
    #[serde(rename = "type")]
    pub variable_type: VariableType,
    /// Name used in `templateVariables.<name>`.
    pub name: String,
    /// What the variable controls.
    pub description: String,
    /// Value used when an instance supplies none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
    /// Example shown to template users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub example: Option<String>,
    /// Whether null is an accepted value.
    #[serde(default)]
    pub nullable: bool,
    /// Whether list or object values merge with inherited ones.
    #[serde(default)]
    pub merge: bool,
    /// Whether the variable is dropped from inheriting templates.
    #[serde(default)]
    pub remove: bool,
}

impl TemplateVariable {
    /// A variable of `variable_type` with no default.
    #[must_use]
    pub fn new(
        variable_type: VariableType,
        name: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            variable_type,
            name: name.into(),
            description: description.into(),
            default_value: None,
            example: None,
            nullable: false,
            merge: false,
            remove: false,
        }
    }

    /// An `int` variable.
    #[must_use]
    pub fn int(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(VariableType::Int, name, description)
    }

    /// A `string` variable.
    #[must_use]
    pub fn string(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(VariableType::String, name, description)
    }

    /// A `boolean` variable.
    #[must_use]
    pub fn boolean(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(VariableType::Boolean, name, description)
    }

    /// Sets the default value.
    #[must_use]
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Sets the example.
    #[must_use]
    pub fn example(mut self, example: impl Into<String>) -> Self {
        self.example = Some(example.into());
        self
    }

    /// Accepts null.
    #[must_use]
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Whether `value` is acceptable for this variable.
    #[must_use]
    pub fn admits(&self, value: &Value) -> bool {
        (self.nullable && value.is_null()) || self.variable_type.admits(value)
    }
}

/// Where an instance's template comes from, e.g. `spinnaker://newSpelTemplate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSource {
    /// Template location.
    pub source: String,
}

/// Which template an instance uses and with what variable values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfiguration {
    /// Template schema version.
    #[serde(default = "schema_default")]
    pub schema: String,
    /// Owning application.
    pub application: String,
    /// Pipeline name.
    pub name: String,
    /// The template to instantiate.
    pub template: TemplateSource,
    /// Variable values by name.
    #[serde(default)]
    pub variables: BTreeMap<String, Value>,
    /// Template sections the instance inherits unchanged.
    #[serde(default)]
    pub inherit: Vec<String>,
}

impl PipelineConfiguration {
    /// Instantiates the template at `source` with no variable values.
    #[must_use]
    pub fn new(
        application: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            schema: schema_default(),
            application: application.into(),
            name: name.into(),
            template: TemplateSource {
                source: source.into(),
            },
            variables: BTreeMap::new(),
            inherit: Vec::new(),
        }
    }

    /// Supplies a variable value.
    #[must_use]
    pub fn variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Inherits a template section, e.g. "triggers".
    #[must_use]
    pub fn inherit(mut self, section: impl Into<String>) -> Self {
        self.inherit.push(section.into());
        self
    }
}

/// A pipeline defined by a template plus local additions.
///
/// On the wire the configuration and the local sections share one flat object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineTemplateInstance {
    /// Template and variable values.
    #[serde(flatten)]
    pub config: PipelineConfiguration,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Local triggers.
    #[serde(default)]
    pub triggers: Vec<TriggerDocument>,
    /// Local parameters.
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    /// Local notifications.
    #[serde(default)]
    pub notifications: Vec<Notification>,
    /// Local stages.
    #[serde(default)]
    pub stages: Vec<StageDocument>,
}

impl PipelineTemplateInstance {
    /// An instance with no local sections.
    #[must_use]
    pub fn new(config: PipelineConfiguration) -> Self {
        Self {
            config,
            description: String::new(),
            triggers: Vec::new(),
            parameters: Vec::new(),
            notifications: Vec::new(),
            stages: Vec::new(),
        }
    }

    /// Takes the local sections from an assembled pipeline.
    ///
    /// The pipeline's name and application are ignored in favor of the
    /// configuration's.
    #[must_use]
    pub fn with_pipeline(mut self, pipeline: PipelineDocument) -> Self {
        self.description = pipeline.description;
        self.triggers = pipeline.triggers;
        self.parameters = pipeline.parameter_config;
        self.notifications = pipeline.notifications;
        self.stages = pipeline.stages;
        self
    }

    /// Serializes to compact JSON.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, CanalError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Converts to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Serialization`] if encoding fails.
    pub fn to_value(&self) -> Result<Value, CanalError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Parses an instance.
    ///
    /// # Errors
    ///
    /// Returns [`CanalError::Serialization`] if `json` is not an instance.
    pub fn from_json(json: &str) -> Result<Self, CanalError> {
        Ok(serde_json::from_str(json)?)
    }
}
