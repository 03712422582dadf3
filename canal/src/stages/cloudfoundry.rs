//! Cloud Foundry stage kinds.
//!
//! Every kind here needs a region and a cloud provider; `deploy` also needs
//! an account and an application. Values set on the stage win, otherwise
//! they come from the innermost [`Defaults`](crate::context::Defaults)
//! overlay of the scope the stage is built in.

use super::{to_fields, StageDefinition, StageFields};
use crate::artifacts::{ArtifactId, ExpectedArtifact};
use crate::context::{CloudProvider, DefaultField, Scope, CLOUD_FOUNDRY};
use crate::core::StageOptions;
use crate::errors::CanalError;
use serde::{Serialize, Serializer};

/// Entry point for Cloud Foundry stages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloudFoundry {
    provider: Option<CloudProvider>,
}

impl CloudFoundry {
    /// Stages using the given Cloud Foundry credentials.
    #[must_use]
    pub fn new(credentials: impl Into<String>) -> Self {
        Self {
            provider: Some(CloudProvider::cloud_foundry(credentials)),
        }
    }

    /// Stages taking their provider from the scope's defaults.
    #[must_use]
    pub fn from_defaults() -> Self {
        Self::default()
    }

    /// Creates or updates a service instance.
    #[must_use]
    pub fn deploy_service(&self, manifest: ManifestSource) -> DeployService {
        DeployService {
            provider: self.provider.clone(),
            region: None,
            manifest,
            options: StageOptions::default(),
        }
    }

    /// Deletes a service instance.
    #[must_use]
    pub fn destroy_service(&self, service_name: impl Into<String>) -> DestroyService {
        DestroyService {
            provider: self.provider.clone(),
            region: None,
            service_name: service_name.into(),
            timeout: None,
            options: StageOptions::default(),
        }
    }

    /// Deploys an application from `artifact` described by `manifest`.
    #[must_use]
    pub fn deploy(&self, artifact: impl Into<DeployArtifact>, manifest: impl Into<Manifest>) -> Deploy {
        Deploy {
            application: None,
            account: None,
            region: None,
            strategy: DeploymentStrategy::default(),
            capacity: Capacity::default(),
            stack: String::new(),
            detail: String::new(),
            start_application: None,
            artifact: artifact.into(),
            manifest: manifest.into(),
            options: StageOptions::default(),
        }
    }

    /// Rolls a cluster back to its previous server group.
    #[must_use]
    pub fn rollback(&self, cluster: impl Into<String>) -> Rollback {
        Rollback {
            provider: self.provider.clone(),
            regions: None,
            cluster: cluster.into(),
            target_healthy_rollback_percentage: 100,
            options: StageOptions::default(),
        }
    }

    /// Destroys a server group of a cluster.
    #[must_use]
    pub fn destroy_server_group(&self, cluster: impl Into<String>, target: TargetServerGroup) -> ServerGroupStage {
        self.server_group(ServerGroupOperation::Destroy, cluster, target)
    }

    /// Disables a server group of a cluster.
    #[must_use]
    pub fn disable_server_group(&self, cluster: impl Into<String>, target: TargetServerGroup) -> ServerGroupStage {
        self.server_group(ServerGroupOperation::Disable, cluster, target)
    }

    /// Enables a server group of a cluster.
    #[must_use]
    pub fn enable_server_group(&self, cluster: impl Into<String>, target: TargetServerGroup) -> ServerGroupStage {
        self.server_group(ServerGroupOperation::Enable, cluster, target)
    }

    /// Resizes a server group of a cluster.
    #[must_use]
    pub fn resize_server_group(
        &self,
        cluster: impl Into<String>,
        target: TargetServerGroup,
        action: ResizeAction,
    ) -> ServerGroupStage {
        let operation = ServerGroupOperation::Resize {
            action,
            memory: 1024,
            disk_quota: 1024,
        };
        self.server_group(operation, cluster, target)
    }

    fn server_group(
        &self,
        operation: ServerGroupOperation,
        cluster: impl Into<String>,
        target: TargetServerGroup,
    ) -> ServerGroupStage {
        ServerGroupStage {
            operation,
            provider: self.provider.clone(),
            regions: None,
            cluster: cluster.into(),
            target,
            options: StageOptions::default(),
        }
    }
}

/// Provider fields flattened into every provider-specific stage.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ProviderFields {
    credentials: String,
    cloud_provider: String,
    cloud_provider_type: String,
}

impl From<CloudProvider> for ProviderFields {
    fn from(provider: CloudProvider) -> Self {
        Self {
            credentials: provider.credentials,
            cloud_provider_type: provider.cloud_provider.clone(),
            cloud_provider: provider.cloud_provider,
        }
    }
}

fn regions_or_default(
    scope: &Scope<'_>,
    regions: Option<&[String]>,
    kind: &str,
) -> Result<Vec<String>, CanalError> {
    match regions {
        Some(regions) => Ok(regions.to_vec()),
        None => Ok(vec![scope.require(DefaultField::Region, None, kind)?]),
    }
}

/// Where a service instance is defined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ManifestSource {
    /// A manifest stored as an artifact.
    #[serde(rename_all = "camelCase")]
    Artifact {
        /// Artifact account.
        account: String,
        /// Artifact reference.
        reference: String,
        /// Provisioning timeout.
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<String>,
    },
    /// A user-provided service.
    #[serde(rename_all = "camelCase")]
    UserProvided {
        /// Service credentials.
        credentials: String,
        /// Route service URL.
        route_service_url: String,
        /// Service instance name.
        service_name: String,
        /// Syslog drain URL.
        syslog_drain_url: String,
        /// Tags.
        tags: Vec<String>,
    },
    /// A marketplace service described inline.
    #[serde(rename_all = "camelCase")]
    Direct {
        /// Marketplace service.
        service: String,
        /// Service instance name.
        service_name: String,
        /// Service plan.
        service_plan: String,
        /// Tags.
        tags: Vec<String>,
        /// Parameters as a JSON string.
        #[serde(skip_serializing_if = "Option::is_none")]
        parameters: Option<String>,
        /// Provisioning timeout.
        #[serde(skip_serializing_if = "Option::is_none")]
        timeout: Option<String>,
    },
}

impl ManifestSource {
    /// A manifest stored as an artifact.
    #[must_use]
    pub fn artifact(account: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::Artifact {
            account: account.into(),
            reference: reference.into(),
            timeout: None,
        }
    }

    /// A marketplace service with no tags or parameters.
    #[must_use]
    pub fn direct(
        service: impl Into<String>,
        service_name: impl Into<String>,
        service_plan: impl Into<String>,
    ) -> Self {
        Self::Direct {
            service: service.into(),
            service_name: service_name.into(),
            service_plan: service_plan.into(),
            tags: Vec::new(),
            parameters: None,
            timeout: None,
        }
    }
}

/// Creates or updates a Cloud Foundry service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployService {
    provider: Option<CloudProvider>,
    region: Option<String>,
    manifest: ManifestSource,
    options: StageOptions,
}

impl DeployService {
    const KIND: &'static str = "deployService";

    /// Overrides the region ("org > space").
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }
}

impl StageDefinition for DeployService {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn options(&self) -> &StageOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut StageOptions {
        &mut self.options
    }

    fn fields(&self, scope: &Scope<'_>) -> Result<StageFields, CanalError> {
        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(flatten)]
            provider: ProviderFields,
            region: String,
            manifest: &'a ManifestSource,
            action: &'static str,
        }

        to_fields(&Wire {
            provider: scope.require_provider(self.provider.as_ref(), Self::KIND)?.into(),
            region: scope.require(DefaultField::Region, self.region.as_deref(), Self::KIND)?,
            manifest: &self.manifest,
            action: Self::KIND,
        })
    }
}

/// Deletes a Cloud Foundry service instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestroyService {
    provider: Option<CloudProvider>,
    region: Option<String>,
    service_name: String,
    timeout: Option<String>,
    options: StageOptions,
}

impl DestroyService {
    const KIND: &'static str = "destroyService";

    /// Overrides the region ("org > space").
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the deprovisioning timeout.
    #[must_use]
    pub fn timeout(mut self, timeout: impl Into<String>) -> Self {
        self.timeout = Some(timeout.into());
        self
    }
}

impl StageDefinition for DestroyService {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn options(&self) -> &StageOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut StageOptions {
        &mut self.options
    }

    fn fields(&self, scope: &Scope<'_>) -> Result<StageFields, CanalError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            #[serde(flatten)]
            provider: ProviderFields,
            region: String,
            service_name: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            timeout: Option<&'a str>,
            action: &'static str,
        }

        to_fields(&Wire {
            provider: scope.require_provider(self.provider.as_ref(), Self::KIND)?.into(),
            region: scope.require(DefaultField::Region, self.region.as_deref(), Self::KIND)?,
            service_name: &self.service_name,
            timeout: self.timeout.as_deref(),
            action: Self::KIND,
        })
    }
}

/// How a deploy replaces the previous server group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum DeploymentStrategy {
    /// Leave earlier server groups alone.
    #[default]
    #[serde(rename = "")]
    None,
    /// Destroy earlier server groups once the new one is healthy.
    #[serde(rename = "highlander")]
    Highlander,
    /// Disable earlier server groups once the new one is healthy.
    #[serde(rename = "redblack")]
    RedBlack,
}

/// Instance counts, as strings so they may be expressions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Capacity {
    /// Desired instances.
    pub desired: String,
    /// Maximum instances.
    pub max: String,
    /// Minimum instances.
    pub min: String,
}

impl Capacity {
    /// Distinct desired, maximum and minimum counts.
    #[must_use]
    pub fn new(desired: u32, max: u32, min: u32) -> Self {
        Self {
            desired: desired.to_string(),
            max: max.to_string(),
            min: min.to_string(),
        }
    }

    /// Exactly `instances` instances.
    #[must_use]
    pub fn exact(instances: u32) -> Self {
        Self::new(instances, instances, instances)
    }
}

impl Default for Capacity {
    fn default() -> Self {
        Self::exact(1)
    }
}

/// The application manifest of a deploy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Manifest {
    /// A manifest stored as an artifact.
    Artifact {
        /// Artifact account.
        account: String,
        /// Artifact reference.
        reference: String,
    },
    /// A manifest described inline.
    Direct(DirectManifest),
}

impl Manifest {
    /// A manifest stored as an artifact.
    #[must_use]
    pub fn artifact(account: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::Artifact {
            account: account.into(),
            reference: reference.into(),
        }
    }
}

/// An inline application manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectManifest {
    services: Vec<String>,
    routes: Vec<String>,
    disk_quota: String,
    memory: String,
    instances: u32,
    env: Vec<String>,
}

impl Default for DirectManifest {
    fn default() -> Self {
        Self {
            services: Vec::new(),
            routes: Vec::new(),
            disk_quota: "1024M".to_string(),
            memory: "1024M".to_string(),
            instances: 1,
            env: Vec::new(),
        }
    }
}

impl DirectManifest {
    /// One instance with 1024M of memory and disk.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Services to bind.
    #[must_use]
    pub fn services<I, S>(mut self, services: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.services = services.into_iter().map(Into::into).collect();
        self
    }

    /// Routes to map.
    #[must_use]
    pub fn routes<I, S>(mut self, routes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.routes = routes.into_iter().map(Into::into).collect();
        self
    }

    /// Environment entries.
    #[must_use]
    pub fn env<I, S>(mut self, env: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.env = env.into_iter().map(Into::into).collect();
        self
    }

    /// Disk quota, e.g. "2048M".
    #[must_use]
    pub fn disk_quota(mut self, disk_quota: impl Into<String>) -> Self {
        self.disk_quota = disk_quota.into();
        self
    }

    /// Memory, e.g. "2048M".
    #[must_use]
    pub fn memory(mut self, memory: impl Into<String>) -> Self {
        self.memory = memory.into();
        self
    }

    /// Instance count.
    #[must_use]
    pub fn instances(mut self, instances: u32) -> Self {
        self.instances = instances;
        self
    }
}

impl From<DirectManifest> for Manifest {
    fn from(manifest: DirectManifest) -> Self {
        Self::Direct(manifest)
    }
}

/// The application bits a deploy pushes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployArtifact {
    /// An artifact delivered by the trigger, matched by pattern.
    Trigger {
        /// Artifact account.
        account: String,
        /// Pattern the artifact name must match.
        pattern: String,
    },
    /// An artifact at a fixed reference.
    Referenced {
        /// Artifact account.
        account: String,
        /// Artifact reference.
        reference: String,
    },
    /// An expected artifact registered with the pipeline.
    Expected(ArtifactId),
}

impl DeployArtifact {
    /// An artifact delivered by the trigger.
    #[must_use]
    pub fn trigger(account: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self::Trigger {
            account: account.into(),
            pattern: pattern.into(),
        }
    }

    /// An artifact at a fixed reference.
    #[must_use]
    pub fn referenced(account: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::Referenced {
            account: account.into(),
            reference: reference.into(),
        }
    }
}

impl From<&ExpectedArtifact> for DeployArtifact {
    fn from(artifact: &ExpectedArtifact) -> Self {
        Self::Expected(artifact.id().clone())
    }
}

impl From<ArtifactId> for DeployArtifact {
    fn from(id: ArtifactId) -> Self {
        Self::Expected(id)
    }
}

/// Deploys an application as a new server group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deploy {
    application: Option<String>,
    account: Option<String>,
    region: Option<String>,
    strategy: DeploymentStrategy,
    capacity: Capacity,
    stack: String,
    detail: String,
    start_application: Option<bool>,
    artifact: DeployArtifact,
    manifest: Manifest,
    options: StageOptions,
}

impl Deploy {
    const KIND: &'static str = "deploy";

    /// Overrides the application.
    #[must_use]
    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    /// Overrides the account.
    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Overrides the region ("org > space").
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the deployment strategy.
    #[must_use]
    pub fn strategy(mut self, strategy: DeploymentStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the instance counts.
    #[must_use]
    pub fn capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    /// Sets the cluster stack.
    #[must_use]
    pub fn stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = stack.into();
        self
    }

    /// Sets the cluster detail.
    #[must_use]
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = detail.into();
        self
    }

    /// Whether to start the application after pushing it.
    #[must_use]
    pub fn start_application(mut self, start: bool) -> Self {
        self.start_application = Some(start);
        self
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
enum ClusterArtifact<'a> {
    Trigger { account: &'a str, pattern: &'a str },
    Artifact { account: &'a str, reference: &'a str },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApplicationArtifact<'a> {
    artifact_id: &'a ArtifactId,
}

impl StageDefinition for Deploy {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn options(&self) -> &StageOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut StageOptions {
        &mut self.options
    }

    fn fields(&self, scope: &Scope<'_>) -> Result<StageFields, CanalError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Cluster<'a> {
            application: String,
            account: String,
            region: String,
            strategy: DeploymentStrategy,
            capacity: &'a Capacity,
            stack: &'a str,
            detail: &'a str,
            #[serde(skip_serializing_if = "Option::is_none")]
            start_application: Option<bool>,
            #[serde(skip_serializing_if = "Option::is_none")]
            artifact: Option<ClusterArtifact<'a>>,
            #[serde(skip_serializing_if = "Option::is_none")]
            application_artifact: Option<ApplicationArtifact<'a>>,
            manifest: &'a Manifest,
            cloud_provider: &'static str,
            provider: &'static str,
        }

        #[derive(Serialize)]
        struct Wire<'a> {
            clusters: [Cluster<'a>; 1],
        }

        let (artifact, application_artifact) = match &self.artifact {
            DeployArtifact::Trigger { account, pattern } => {
                (Some(ClusterArtifact::Trigger { account, pattern }), None)
            }
            DeployArtifact::Referenced { account, reference } => {
                (Some(ClusterArtifact::Artifact { account, reference }), None)
            }
            DeployArtifact::Expected(artifact_id) => (None, Some(ApplicationArtifact { artifact_id })),
        };

        let cluster = Cluster {
            application: scope.require(DefaultField::Application, self.application.as_deref(), Self::KIND)?,
            account: scope.require(DefaultField::Account, self.account.as_deref(), Self::KIND)?,
            region: scope.require(DefaultField::Region, self.region.as_deref(), Self::KIND)?,
            strategy: self.strategy,
            capacity: &self.capacity,
            stack: &self.stack,
            detail: &self.detail,
            start_application: self.start_application,
            artifact,
            application_artifact,
            manifest: &self.manifest,
            cloud_provider: CLOUD_FOUNDRY,
            provider: CLOUD_FOUNDRY,
        };
        to_fields(&Wire { clusters: [cluster] })
    }

    fn artifacts(&self) -> Vec<ArtifactId> {
        match &self.artifact {
            DeployArtifact::Expected(id) => vec![id.clone()],
            DeployArtifact::Trigger { .. } | DeployArtifact::Referenced { .. } => Vec::new(),
        }
    }
}

/// Rolls a cluster back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollback {
    provider: Option<CloudProvider>,
    regions: Option<Vec<String>>,
    cluster: String,
    target_healthy_rollback_percentage: u8,
    options: StageOptions,
}

impl Rollback {
    const KIND: &'static str = "rollbackCluster";

    /// Overrides the regions; by default the single default region.
    #[must_use]
    pub fn regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    /// Healthy percentage the rollback waits for. Capped at 100.
    #[must_use]
    pub fn target_healthy_rollback_percentage(mut self, percentage: u8) -> Self {
        self.target_healthy_rollback_percentage = percentage.min(100);
        self
    }
}

impl StageDefinition for Rollback {
    fn kind(&self) -> &str {
        Self::KIND
    }

    fn options(&self) -> &StageOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut StageOptions {
        &mut self.options
    }

    fn fields(&self, scope: &Scope<'_>) -> Result<StageFields, CanalError> {
        #[derive(Serialize)]
        struct Moniker<'a> {
            app: &'a str,
            cluster: &'a str,
        }

        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            #[serde(flatten)]
            provider: ProviderFields,
            regions: Vec<String>,
            cluster: &'a str,
            target_healthy_rollback_percentage: u8,
            moniker: Moniker<'a>,
        }

        to_fields(&Wire {
            provider: scope.require_provider(self.provider.as_ref(), Self::KIND)?.into(),
            regions: regions_or_default(scope, self.regions.as_deref(), Self::KIND)?,
            cluster: &self.cluster,
            target_healthy_rollback_percentage: self.target_healthy_rollback_percentage,
            moniker: Moniker {
                app: &self.cluster,
                cluster: &self.cluster,
            },
        })
    }
}

/// Which server group of a cluster an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TargetServerGroup {
    /// The most recently deployed one.
    #[serde(rename = "current_asg_dynamic")]
    Newest,
    /// The one before the newest.
    #[serde(rename = "ancestor_asg_dynamic")]
    Previous,
    /// The oldest one.
    #[serde(rename = "oldest_asg_dynamic")]
    Oldest,
}

/// How a resize changes the instance count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResizeAction {
    /// Scale to exactly this many instances.
    ScaleExact {
        /// Target instance count.
        instance_count: u32,
    },
}

impl Serialize for ResizeAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire {
            action: &'static str,
            instance_count: u32,
            capacity: Capacity,
        }

        match self {
            Self::ScaleExact { instance_count } => Wire {
                action: "scale_exact",
                instance_count: *instance_count,
                capacity: Capacity::exact(*instance_count),
            }
            .serialize(serializer),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ServerGroupOperation {
    Destroy,
    Disable,
    Enable,
    Resize {
        action: ResizeAction,
        memory: u32,
        disk_quota: u32,
    },
}

impl ServerGroupOperation {
    const fn kind(&self) -> &'static str {
        match self {
            Self::Destroy => "destroyServerGroup",
            Self::Disable => "disableServerGroup",
            Self::Enable => "enableServerGroup",
            Self::Resize { .. } => "resizeServerGroup",
        }
    }
}

/// Destroys, disables, enables or resizes one server group of a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerGroupStage {
    operation: ServerGroupOperation,
    provider: Option<CloudProvider>,
    regions: Option<Vec<String>>,
    cluster: String,
    target: TargetServerGroup,
    options: StageOptions,
}

impl ServerGroupStage {
    /// Overrides the regions; by default the single default region.
    #[must_use]
    pub fn regions<I, S>(mut self, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions = Some(regions.into_iter().map(Into::into).collect());
        self
    }

    /// Memory per instance in MB. Only used by resizes.
    #[must_use]
    pub fn memory(mut self, megabytes: u32) -> Self {
        if let ServerGroupOperation::Resize { memory, .. } = &mut self.operation {
            *memory = megabytes;
        }
        self
    }

    /// Disk quota per instance in MB. Only used by resizes.
    #[must_use]
    pub fn disk_quota(mut self, megabytes: u32) -> Self {
        if let ServerGroupOperation::Resize { disk_quota, .. } = &mut self.operation {
            *disk_quota = megabytes;
        }
        self
    }
}

impl StageDefinition for ServerGroupStage {
    fn kind(&self) -> &str {
        self.operation.kind()
    }

    fn options(&self) -> &StageOptions {
        &self.options
    }

    fn options_mut(&mut self) -> &mut StageOptions {
        &mut self.options
    }

    fn fields(&self, scope: &Scope<'_>) -> Result<StageFields, CanalError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Resize<'a> {
            resize_action: &'a ResizeAction,
            memory: u32,
            disk_quota: u32,
        }

        #[derive(Serialize)]
        struct Wire<'a> {
            #[serde(flatten)]
            provider: ProviderFields,
            regions: Vec<String>,
            cluster: &'a str,
            target: TargetServerGroup,
            #[serde(flatten)]
            resize: Option<Resize<'a>>,
        }

        let kind = self.operation.kind();
        let resize = match &self.operation {
            ServerGroupOperation::Resize {
                action,
                memory,
                disk_quota,
            } => Some(Resize {
                resize_action: action,
                memory: *memory,
                disk_quota: *disk_quota,
            }),
            _ => None,
        };

        to_fields(&Wire {
            provider: scope.require_provider(self.provider.as_ref(), kind)?.into(),
            regions: regions_or_default(scope, self.regions.as_deref(), kind)?,
            cluster: &self.cluster,
            target: self.target,
            resize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::{Artifact, ArtifactFactory};
    use crate::context::Defaults;
    use crate::testing::{cf_defaults, sequential_scope};
    use crate::utils::SequentialIdSource;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn fields_in(defaults: Defaults, stage: impl StageDefinition) -> serde_json::Value {
        let scope = sequential_scope();
        let record = scope
            .with_defaults(defaults, |scope| scope.stage(stage))
            .unwrap();
        serde_json::Value::Object(record.fields().clone())
    }

    #[test]
    fn test_deploy_service_fields() {
        let stage = CloudFoundry::new("creds1").deploy_service(ManifestSource::artifact(
            "montclair",
            "https://example.com/manifest.yml",
        ));

        assert_eq!(
            fields_in(Defaults::new().region("dev > dev"), stage),
            json!({
                "action": "deployService",
                "cloudProvider": "cloudfoundry",
                "cloudProviderType": "cloudfoundry",
                "credentials": "creds1",
                "manifest": {
                    "account": "montclair",
                    "reference": "https://example.com/manifest.yml",
                    "type": "artifact"
                },
                "region": "dev > dev"
            })
        );
    }

    #[test]
    fn test_explicit_region_beats_default() {
        let stage = CloudFoundry::new("creds1")
            .deploy_service(ManifestSource::direct("mysql", "db", "small"))
            .region("prod > prod");

        let fields = fields_in(Defaults::new().region("dev > dev"), stage);
        assert_eq!(fields["region"], "prod > prod");
        assert_eq!(
            fields["manifest"],
            json!({"type": "direct", "service": "mysql", "serviceName": "db", "servicePlan": "small", "tags": []})
        );
    }

    #[test]
    fn test_provider_from_defaults() {
        let stage = CloudFoundry::from_defaults().destroy_service("db").timeout("10");

        let fields = fields_in(cf_defaults("dev > dev"), stage);
        assert_eq!(fields["credentials"], "creds1");
        assert_eq!(fields["serviceName"], "db");
        assert_eq!(fields["timeout"], "10");
        assert_eq!(fields["action"], "destroyService");
    }

    #[test]
    fn test_deploy_resolves_cluster_defaults() {
        let artifacts = ArtifactFactory::with_id_source(Arc::new(SequentialIdSource::new()));
        let jar = artifacts.expect(Artifact::maven("maven", "io.pivotal:app:.*"));
        let stage = CloudFoundry::from_defaults()
            .deploy(&jar, DirectManifest::new().services(["db"]).routes(["app.example.com"]))
            .strategy(DeploymentStrategy::Highlander);

        assert_eq!(stage.artifacts(), vec![ArtifactId::new("0")]);
        assert_eq!(
            fields_in(cf_defaults("dev > dev"), stage),
            json!({"clusters": [{
                "account": "montclair",
                "application": "app1",
                "applicationArtifact": {"artifactId": "0"},
                "capacity": {"desired": "1", "max": "1", "min": "1"},
                "cloudProvider": "cloudfoundry",
                "detail": "",
                "manifest": {
                    "diskQuota": "1024M",
                    "env": [],
                    "instances": 1,
                    "memory": "1024M",
                    "routes": ["app.example.com"],
                    "services": ["db"],
                    "type": "direct"
                },
                "provider": "cloudfoundry",
                "region": "dev > dev",
                "stack": "",
                "strategy": "highlander"
            }]})
        );
    }

    #[test]
    fn test_deploy_from_trigger_artifact() {
        let stage = CloudFoundry::from_defaults()
            .deploy(
                DeployArtifact::trigger("jenkins", "^app.*VERSION.jar$"),
                Manifest::artifact("montclair", "manifest.yml"),
            )
            .capacity(Capacity::new(2, 3, 1))
            .start_application(true);

        assert!(stage.artifacts().is_empty());
        let cluster = &fields_in(cf_defaults("dev > dev"), stage)["clusters"][0];
        assert_eq!(cluster["artifact"], json!({"type": "trigger", "account": "jenkins", "pattern": "^app.*VERSION.jar$"}));
        assert_eq!(cluster["capacity"], json!({"desired": "2", "max": "3", "min": "1"}));
        assert_eq!(cluster["startApplication"], true);
        assert!(cluster.get("applicationArtifact").is_none());
    }

    #[test]
    fn test_deploy_requires_application() {
        let scope = sequential_scope();
        let stage = CloudFoundry::from_defaults().deploy(
            DeployArtifact::referenced("montclair", "app.jar"),
            Manifest::artifact("montclair", "manifest.yml"),
        );

        let err = scope
            .with_defaults(Defaults::new().region("dev > dev").account("montclair"), |scope| {
                scope.stage(stage)
            })
            .unwrap_err();

        match err {
            CanalError::MissingDefault(missing) => {
                assert_eq!(missing.field, "application");
                assert_eq!(missing.stage_kind, "deploy");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_rollback_fields() {
        let stage = CloudFoundry::new("creds1").rollback("app1-prod");

        assert_eq!(
            fields_in(Defaults::new().region("dev > dev"), stage),
            json!({
                "cloudProvider": "cloudfoundry",
                "cloudProviderType": "cloudfoundry",
                "cluster": "app1-prod",
                "credentials": "creds1",
                "moniker": {"app": "app1-prod", "cluster": "app1-prod"},
                "regions": ["dev > dev"],
                "targetHealthyRollbackPercentage": 100
            })
        );
    }

    #[test]
    fn test_server_group_targets() {
        let cf = CloudFoundry::new("creds1");
        let defaults = Defaults::new().region("dev > dev");

        let destroy = fields_in(defaults.clone(), cf.destroy_server_group("c", TargetServerGroup::Oldest));
        let disable = fields_in(defaults.clone(), cf.disable_server_group("c", TargetServerGroup::Previous));
        let enable = fields_in(
            defaults,
            cf.enable_server_group("c", TargetServerGroup::Newest).regions(["a > b", "c > d"]),
        );

        assert_eq!(destroy["target"], "oldest_asg_dynamic");
        assert_eq!(disable["target"], "ancestor_asg_dynamic");
        assert_eq!(enable["target"], "current_asg_dynamic");
        assert_eq!(enable["regions"], json!(["a > b", "c > d"]));
        assert!(destroy.get("resizeAction").is_none());
    }

    #[test]
    fn test_resize_server_group_fields() {
        let stage = CloudFoundry::new("creds1")
            .resize_server_group(
                "app1-prod",
                TargetServerGroup::Newest,
                ResizeAction::ScaleExact { instance_count: 3 },
            )
            .memory(2048);

        assert_eq!(stage.kind(), "resizeServerGroup");
        let fields = fields_in(Defaults::new().region("dev > dev"), stage);
        assert_eq!(
            fields["resizeAction"],
            json!({"action": "scale_exact", "instanceCount": 3, "capacity": {"desired": "3", "max": "3", "min": "3"}})
        );
        assert_eq!(fields["memory"], 2048);
        assert_eq!(fields["diskQuota"], 1024);
    }

    #[test]
    fn test_memory_ignored_outside_resize() {
        let stage = CloudFoundry::new("creds1")
            .destroy_server_group("c", TargetServerGroup::Newest)
            .memory(4096);

        let fields = fields_in(Defaults::new().region("dev > dev"), stage);
        assert!(fields.get("memory").is_none());
    }
}
