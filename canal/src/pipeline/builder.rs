//! Pipeline assembly.

use super::{
    Notification, Parameter, PipelineConfig, PipelineDocument, StageDocument, TriggerDocument,
};
use crate::artifacts::{ArtifactId, ExpectedArtifact};
use crate::context::{DefaultField, Defaults, Scope};
use crate::core::StageId;
use crate::errors::{
    CanalError, ContractErrorInfo, GraphInvariantError, PipelineValidationError,
    UnknownArtifactReferenceError,
};
use crate::graph::StageGraph;
use crate::triggers::Trigger;
use crate::utils::{default_id_source, IdSource};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

type GraphProducer = Box<dyn FnOnce(&Scope<'_>) -> Result<StageGraph, CanalError> + Send>;

enum StageSource {
    Graph(StageGraph),
    Producer(GraphProducer),
}

impl fmt::Debug for StageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(graph) => f.debug_tuple("Graph").field(&graph.len()).finish(),
            Self::Producer(_) => f.write_str("Producer"),
        }
    }
}

/// Collects a stage graph, triggers, and artifacts and assembles them into
/// a [`PipelineDocument`].
///
/// ```
/// use canal::prelude::*;
///
/// # fn main() -> Result<(), CanalError> {
/// let pipeline = PipelineBuilder::new("release")
///     .application("app1")
///     .stages_with(|scope| {
///         Ok(Grapher::of(scope.stage(Wait::seconds(30))?)
///             .then(scope.stage(ManualJudgment::new())?)
///             .into_graph())
///     })
///     .build()?;
///
/// assert_eq!(pipeline.stages[1].requisite_stage_ref_ids, vec!["wait1"]);
/// # Ok(())
/// # }
/// ```
pub struct PipelineBuilder {
    name: String,
    application: Option<String>,
    description: String,
    config: PipelineConfig,
    ids: Arc<dyn IdSource>,
    defaults: Defaults,
    source: Option<StageSource>,
    triggers: Vec<Trigger>,
    expected_artifacts: Vec<ExpectedArtifact>,
    parameters: Vec<Parameter>,
    notifications: Vec<Notification>,
}

impl fmt::Debug for PipelineBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineBuilder")
            .field("name", &self.name)
            .field("application", &self.application)
            .field("config", &self.config)
            .field("source", &self.source)
            .field("triggers", &self.triggers.len())
            .field("expected_artifacts", &self.expected_artifacts.len())
            .finish_non_exhaustive()
    }
}

impl PipelineBuilder {
    /// Starts a pipeline called `name` with no stages.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            application: None,
            description: String::new(),
            config: PipelineConfig::default(),
            ids: default_id_source(),
            defaults: Defaults::default(),
            source: None,
            triggers: Vec::new(),
            expected_artifacts: Vec::new(),
            parameters: Vec::new(),
            notifications: Vec::new(),
        }
    }

    /// Sets the owning application.
    ///
    /// Without one, the `application` default is used, then the empty string.
    #[must_use]
    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Replaces the assembly configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the id source of the root scope handed to
    /// [`stages_with`](Self::stages_with).
    #[must_use]
    pub fn id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }

    /// Sets the root defaults handed to [`stages_with`](Self::stages_with).
    #[must_use]
    pub fn defaults(mut self, defaults: Defaults) -> Self {
        self.defaults = defaults;
        self
    }

    /// Uses an already built graph.
    #[must_use]
    pub fn stages(mut self, graph: impl Into<StageGraph>) -> Self {
        self.source = Some(StageSource::Graph(graph.into()));
        self
    }

    /// Builds the graph at assembly time, inside the root scope.
    ///
    /// `producer` runs exactly once, during [`build`](Self::build).
    #[must_use]
    pub fn stages_with<F>(mut self, producer: F) -> Self
    where
        F: FnOnce(&Scope<'_>) -> Result<StageGraph, CanalError> + Send + 'static,
    {
        self.source = Some(StageSource::Producer(Box::new(producer)));
        self
    }

    /// Adds a trigger.
    #[must_use]
    pub fn trigger(mut self, trigger: impl Into<Trigger>) -> Self {
        self.triggers.push(trigger.into());
        self
    }

    /// Registers an expected artifact.
    ///
    /// Registering an id twice keeps the first registration.
    #[must_use]
    pub fn expected_artifact(mut self, artifact: ExpectedArtifact) -> Self {
        if self.expected_artifacts.iter().all(|a| a.id() != artifact.id()) {
            self.expected_artifacts.push(artifact);
        }
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn parameter(mut self, parameter: Parameter) -> Self {
        self.parameters.push(parameter);
        self
    }

    /// Adds a notification.
    #[must_use]
    pub fn notification(mut self, notification: Notification) -> Self {
        self.notifications.push(notification);
        self
    }

    /// Assembles the pipeline document.
    ///
    /// # Errors
    ///
    /// - [`PipelineValidationError`] if the name is empty or blank.
    /// - Whatever the stage producer returns, typically a missing default.
    /// - [`GraphInvariantError`] if the graph is malformed.
    /// - [`UnknownArtifactReferenceError`] if a stage or trigger uses an
    ///   artifact that was never registered.
    pub fn build(self) -> Result<PipelineDocument, CanalError> {
        if self.name.trim().is_empty() {
            return Err(PipelineValidationError::new("Pipeline name must not be empty")
                .with_error_info(
                    ContractErrorInfo::new("CANAL-004-EMPTY_NAME", "Pipeline has no name")
                        .with_fix_hint("Pass a non-blank name to PipelineBuilder::new."),
                )
                .into());
        }

        let root = Scope::with_id_source(self.ids).with_root_defaults(self.defaults);
        let graph = match self.source {
            Some(StageSource::Graph(graph)) => graph,
            Some(StageSource::Producer(producer)) => producer(&root)?,
            None => StageGraph::new(),
        };
        if self.config.validate_graph {
            graph.validate()?;
        }

        let registered: HashSet<&ArtifactId> =
            self.expected_artifacts.iter().map(ExpectedArtifact::id).collect();
        check_stage_artifacts(&graph, &registered)?;
        check_trigger_artifacts(&self.triggers, &registered)?;

        let stages = stage_documents(&graph, &self.config)?;
        let application = self
            .application
            .or_else(|| root.resolve(DefaultField::Application).map(ToString::to_string))
            .unwrap_or_default();

        debug!(
            pipeline = %self.name,
            application = %application,
            stages = stages.len(),
            triggers = self.triggers.len(),
            artifacts = self.expected_artifacts.len(),
            "assembled pipeline"
        );

        Ok(PipelineDocument {
            name: self.name,
            application,
            description: self.description,
            keep_waiting_pipelines: self.config.keep_waiting_pipelines,
            limit_concurrent: self.config.limit_concurrent,
            parameter_config: self.parameters,
            notifications: self.notifications,
            stages,
            triggers: self
                .triggers
                .into_iter()
                .map(|trigger| TriggerDocument {
                    enabled: trigger.is_enabled(),
                    expected_artifact_ids: trigger.artifacts().to_vec(),
                    kind: trigger.kind().clone(),
                })
                .collect(),
            expected_artifacts: self.expected_artifacts,
        })
    }
}

fn check_stage_artifacts(
    graph: &StageGraph,
    registered: &HashSet<&ArtifactId>,
) -> Result<(), UnknownArtifactReferenceError> {
    for stage in graph.flatten() {
        if let Some(missing) = stage.artifacts().iter().find(|a| !registered.contains(a)) {
            warn!(artifact_id = %missing, stage_id = %stage.id(), "stage uses unregistered artifact");
            return Err(UnknownArtifactReferenceError::new(
                missing.as_str(),
                format!("stage '{}'", stage.id()),
            ));
        }
    }
    Ok(())
}

fn check_trigger_artifacts(
    triggers: &[Trigger],
    registered: &HashSet<&ArtifactId>,
) -> Result<(), UnknownArtifactReferenceError> {
    for (position, trigger) in triggers.iter().enumerate() {
        if let Some(missing) = trigger.artifacts().iter().find(|a| !registered.contains(a)) {
            warn!(artifact_id = %missing, trigger = position, "trigger uses unregistered artifact");
            return Err(UnknownArtifactReferenceError::new(
                missing.as_str(),
                format!("trigger #{position} ({})", trigger.kind().name()),
            ));
        }
    }
    Ok(())
}

fn stage_documents(
    graph: &StageGraph,
    config: &PipelineConfig,
) -> Result<Vec<StageDocument>, GraphInvariantError> {
    let ordered = graph.flatten();
    let ref_ids: HashMap<&StageId, (u64, String)> = ordered
        .iter()
        .enumerate()
        .map(|(position, stage)| {
            let ref_id = config
                .ref_id_style
                .ref_id(stage.kind(), stage.id().as_str(), position);
            (stage.id(), (stage.sequence(), ref_id))
        })
        .collect();

    ordered
        .iter()
        .map(|stage| {
            let mut upstream = stage
                .depends_on()
                .iter()
                .map(|dep| {
                    ref_ids
                        .get(dep)
                        .ok_or_else(|| GraphInvariantError::dangling(stage.id().as_str(), dep.as_str()))
                })
                .collect::<Result<Vec<_>, _>>()?;
            upstream.sort_by_key(|(sequence, _)| *sequence);

            Ok(StageDocument {
                kind: stage.kind().to_string(),
                name: stage.name().map(ToString::to_string),
                ref_id: ref_ids[stage.id()].1.clone(),
                requisite_stage_ref_ids: upstream.into_iter().map(|(_, id)| id.clone()).collect(),
                fields: stage.fields().clone(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{Artifact, ArtifactFactory};
    use crate::core::StageRecord;
    use crate::graph::Grapher;
    use crate::stages::common::Wait;
    use crate::stages::{CustomStage, StageFields};
    use crate::testing::{stage, stages};
    use crate::triggers::JenkinsTrigger;
    use crate::utils::SequentialIdSource;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_pipeline() {
        let pipeline = PipelineBuilder::new("empty").build().unwrap();

        assert!(pipeline.stages.is_empty());
        assert!(pipeline.triggers.is_empty());
        assert_eq!(pipeline.application, "");
        assert!(pipeline.limit_concurrent);
        assert!(!pipeline.keep_waiting_pipelines);
    }

    #[test]
    fn test_blank_name_is_rejected() {
        for name in ["", "   "] {
            let err = PipelineBuilder::new(name).build().unwrap_err();
            assert_eq!(err.error_info().unwrap().code, "CANAL-004-EMPTY_NAME");
        }
    }

    #[test]
    fn test_ref_ids_follow_emission_order() {
        let [a, b, c] = stages(["a", "b", "c"]);
        let graph = Grapher::of(a).then(b).then(c).into_graph();

        let pipeline = PipelineBuilder::new("p").stages(graph).build().unwrap();

        let ref_ids: Vec<&str> = pipeline.stages.iter().map(|s| s.ref_id.as_str()).collect();
        assert_eq!(ref_ids, vec!["wait1", "wait2", "wait3"]);
        assert_eq!(pipeline.stages[0].requisite_stage_ref_ids, Vec::<String>::new());
        assert_eq!(pipeline.stages[2].requisite_stage_ref_ids, vec!["wait2"]);
    }

    #[test]
    fn test_requisites_are_in_emission_order() {
        let [a, b, c] = stages(["a", "b", "c"]);
        let join = stage("join");
        let graph = Grapher::new()
            .then_all([a, b, c])
            .then(join)
            .into_graph();

        let pipeline = PipelineBuilder::new("p").stages(graph).build().unwrap();

        assert_eq!(
            pipeline.stages[3].requisite_stage_ref_ids,
            vec!["wait1", "wait2", "wait3"]
        );
    }

    #[test]
    fn test_ref_ids_stay_unique_for_numbered_kinds() {
        let pipeline = PipelineBuilder::new("p")
            .stages_with(|scope| {
                let mut grapher = Grapher::of(scope.stage(CustomStage::new("wait1", StageFields::new()))?);
                for seconds in 0..10 {
                    grapher = grapher.then(scope.stage(Wait::seconds(seconds))?);
                }
                Ok(grapher.into_graph())
            })
            .build()
            .unwrap();

        let ref_ids: HashSet<&str> = pipeline.stages.iter().map(|s| s.ref_id.as_str()).collect();
        assert_eq!(ref_ids.len(), 11);
        assert_eq!(pipeline.stages[0].ref_id, "wait1-1");
        assert_eq!(pipeline.stages[10].ref_id, "wait11");
        assert_eq!(pipeline.stages[1].requisite_stage_ref_ids, vec!["wait1-1"]);
    }

    #[test]
    fn test_producer_runs_in_root_scope() {
        let pipeline = PipelineBuilder::new("p")
            .id_source(Arc::new(SequentialIdSource::new()))
            .defaults(Defaults::new().application("from-defaults"))
            .config(PipelineConfig::default().with_ref_id_style(crate::pipeline::RefIdStyle::StageId))
            .stages_with(|scope| Ok(scope.stage(Wait::seconds(5))?.into()))
            .build()
            .unwrap();

        assert_eq!(pipeline.application, "from-defaults");
        assert_eq!(pipeline.stages[0].ref_id, "0");
    }

    #[test]
    fn test_explicit_application_wins() {
        let pipeline = PipelineBuilder::new("p")
            .application("explicit")
            .defaults(Defaults::new().application("from-defaults"))
            .build()
            .unwrap();

        assert_eq!(pipeline.application, "explicit");
    }

    #[test]
    fn test_producer_error_propagates() {
        let err = PipelineBuilder::new("p")
            .stages_with(|_| Err(PipelineValidationError::new("boom").into()))
            .build()
            .unwrap_err();

        assert!(matches!(err, CanalError::Validation(_)));
    }

    #[test]
    fn test_dangling_edge_fails_validation() {
        let orphan = stage("b").with_raw_dependencies(vec![StageId::new("ghost")]);
        let graph = StageGraph::single(orphan);

        let err = PipelineBuilder::new("p").stages(graph.clone()).build().unwrap_err();
        assert_eq!(err.error_info().unwrap().code, "CANAL-003-DANGLING_EDGE");

        let err = PipelineBuilder::new("p")
            .config(PipelineConfig::default().with_graph_validation(false))
            .stages(graph)
            .build()
            .unwrap_err();
        assert!(matches!(err, CanalError::GraphInvariant(_)));
    }

    #[test]
    fn test_trigger_artifact_must_be_registered() {
        let artifacts = ArtifactFactory::with_id_source(Arc::new(SequentialIdSource::new()));
        let jar = artifacts.expect(Artifact::jenkins_file("jenkins", "app.jar"));

        let err = PipelineBuilder::new("p")
            .trigger(Trigger::from(JenkinsTrigger::new("job", "ci")).with_artifact(&jar))
            .build()
            .unwrap_err();

        match err {
            CanalError::UnknownArtifactReference(err) => {
                assert_eq!(err.artifact_id, "0");
                assert_eq!(err.referenced_by, "trigger #0 (jenkins)");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_stage_artifact_must_be_registered() {
        let record: StageRecord = stage("deploy").with_artifacts([ArtifactId::new("7")]);

        let err = PipelineBuilder::new("p").stages(record).build().unwrap_err();

        match err {
            CanalError::UnknownArtifactReference(err) => {
                assert_eq!(err.referenced_by, "stage 'deploy'");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_artifact_registration_keeps_first() {
        let first = ExpectedArtifact::new(ArtifactId::new("0"), Artifact::maven("m", "a"));
        let second = ExpectedArtifact::new(ArtifactId::new("0"), Artifact::maven("m", "b"));

        let pipeline = PipelineBuilder::new("p")
            .expected_artifact(first.clone())
            .expected_artifact(second)
            .build()
            .unwrap();

        assert_eq!(pipeline.expected_artifacts, vec![first]);
    }
}
