//! # Canal
//!
//! Builds deployment pipelines as stage graphs and serializes them to the
//! JSON an orchestration platform imports.
//!
//! Canal provides:
//!
//! - **Graph composition**: stages chain in sequence and fan out in parallel,
//!   with entry and exit frontiers tracked for you
//! - **Scoped defaults**: account, region, and provider settings layered per
//!   call, so one branch can target another space without touching siblings
//! - **Typed stage kinds**: wait, judgment, Jenkins, webhook, and Cloud Foundry
//!   stages that resolve what they need from the active defaults
//! - **Assembly**: deterministic flattening into `refId`s and
//!   `requisiteStageRefIds`, with trigger and artifact linkage checked
//!
//! ## Quick Start
//!
//! ```rust
//! use canal::prelude::*;
//!
//! # fn main() -> Result<(), CanalError> {
//! let pipeline = PipelineBuilder::new("release")
//!     .defaults(
//!         Defaults::new()
//!             .application("app1")
//!             .region("dev > dev")
//!             .cloud_provider(CloudProvider::cloud_foundry("creds1")),
//!     )
//!     .stages_with(|scope| {
//!         let cf = CloudFoundry::from_defaults();
//!         Ok(Grapher::of(scope.stage(Wait::seconds(30))?)
//!             .then(scope.stage(cf.rollback("app1-dev"))?)
//!             .into_graph())
//!     })
//!     .build()?;
//!
//! println!("{}", pipeline.to_json_pretty()?);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod artifacts;
pub mod context;
pub mod core;
pub mod errors;
pub mod graph;
pub mod pipeline;
pub mod stages;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod triggers;
pub mod utils;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::artifacts::{Artifact, ArtifactFactory, ArtifactId, ExpectedArtifact};
    pub use crate::context::{CloudProvider, DefaultField, Defaults, Scope};
    pub use crate::core::{Condition, StageId, StageRecord};
    pub use crate::errors::{
        CanalError, ContractErrorInfo, GraphInvariantError, MissingDefaultError,
        PipelineValidationError, UnknownArtifactReferenceError,
    };
    pub use crate::graph::{parallel, Grapher, StageGraph};
    pub use crate::pipeline::{
        Notification, Parameter, PipelineBuilder, PipelineConfig, PipelineConfiguration,
        PipelineDocument, PipelineSet, PipelineTemplate, PipelineTemplateInstance, RefIdStyle,
        TemplateMetadata, TemplateVariable, VariableType,
    };
    pub use crate::stages::cloudfoundry::{
        Capacity, CloudFoundry, DeployArtifact, DeploymentStrategy, DirectManifest, Manifest,
        ManifestSource, ResizeAction, TargetServerGroup,
    };
    pub use crate::stages::common::{
        CheckPreconditions, Jenkins, ManualJudgment, Precondition, Wait, Webhook,
    };
    pub use crate::stages::{CustomStage, StageDefinition};
    pub use crate::triggers::{
        ArtifactoryTrigger, GitHubTrigger, JenkinsTrigger, PubSubTrigger, Trigger, TriggerKind,
    };
    pub use crate::utils::{IdSource, SequentialIdSource, UuidIdSource};
}
