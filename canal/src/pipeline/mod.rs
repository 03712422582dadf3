//! Pipeline assembly and serialization.
//!
//! This module provides:
//! - [`PipelineBuilder`], which flattens a stage graph and links artifacts
//! - [`PipelineDocument`] and friends, the wire format
//! - [`PipelineConfig`], assembly settings
//! - [`PipelineSet`], pipelines for several applications in one document
//! - [`PipelineTemplate`] and [`PipelineTemplateInstance`], templated pipelines

mod builder;
mod config;
mod document;
mod set;
mod template;


pub use builder::PipelineBuilder;
pub use config::{PipelineConfig, RefIdStyle};
pub use document::{
    Notification, Parameter, ParameterOption, PipelineDocument, StageDocument, TriggerDocument,
};
pub use set::PipelineSet;
pub use template::{
    PipelineConfiguration, PipelineTemplate, PipelineTemplateInstance, TemplateMetadata,
    TemplateScope, TemplateSource, TemplateVariable, VariableType, TEMPLATE_SCHEMA,
};
