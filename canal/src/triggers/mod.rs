//! Pipeline triggers.
//!
//! A [`Trigger`] pairs a kind-specific configuration with the expected
//! artifacts it supplies. The pipeline turns those into
//! `expectedArtifactIds` when it is built.

use crate::artifacts::ArtifactId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Starts the pipeline when a Jenkins job completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JenkinsTrigger {
    /// Job name.
    pub job: String,
    /// Jenkins master.
    pub master: String,
    /// Build property file whose values become trigger properties.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_file: Option<String>,
}

impl JenkinsTrigger {
    /// Triggers on `job` at `master`.
    #[must_use]
    pub fn new(job: impl Into<String>, master: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            master: master.into(),
            property_file: None,
        }
    }

    /// Sets the property file.
    #[must_use]
    pub fn property_file(mut self, file: impl Into<String>) -> Self {
        self.property_file = Some(file.into());
        self
    }
}

/// Starts the pipeline on a push to a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitHubTrigger {
    /// Organization.
    pub project: String,
    /// Repository.
    pub slug: String,
    /// Branch filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Webhook secret.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    source: String,
}

impl GitHubTrigger {
    /// Triggers on pushes to `org/repo`.
    #[must_use]
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            project: org.into(),
            slug: repo.into(),
            branch: None,
            secret: None,
            source: "github".to_string(),
        }
    }

    /// Only triggers for `branch`.
    #[must_use]
    pub fn branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    /// Sets the webhook secret.
    #[must_use]
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

/// Starts the pipeline when an Artifactory search finds a new artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactoryTrigger {
    /// Name of the configured Artifactory search.
    pub artifactory_search_name: String,
}

impl ArtifactoryTrigger {
    /// Triggers on the named search.
    #[must_use]
    pub fn new(search_name: impl Into<String>) -> Self {
        Self {
            artifactory_search_name: search_name.into(),
        }
    }
}

/// Starts the pipeline on a pub/sub message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PubSubTrigger {
    /// Pub/sub system, e.g. "google".
    pub pubsub_system: String,
    /// Subscription.
    pub subscription: String,
    /// Subscription name; mirrors `subscription`.
    pub subscription_name: String,
    /// Message source.
    pub source: String,
    /// Required message attributes.
    #[serde(default)]
    pub attribute_constraints: BTreeMap<String, serde_json::Value>,
    /// Required payload fields.
    #[serde(default)]
    pub payload_constraints: BTreeMap<String, serde_json::Value>,
}

impl PubSubTrigger {
    /// Triggers on messages from `source` arriving on `subscription`.
    #[must_use]
    pub fn new(
        pubsub_system: impl Into<String>,
        subscription: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        let subscription = subscription.into();
        Self {
            pubsub_system: pubsub_system.into(),
            subscription_name: subscription.clone(),
            subscription,
            source: source.into(),
            attribute_constraints: BTreeMap::new(),
            payload_constraints: BTreeMap::new(),
        }
    }

    /// Requires a message attribute.
    #[must_use]
    pub fn attribute_constraint(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.attribute_constraints.insert(key.into(), value);
        self
    }

    /// Requires a payload field.
    #[must_use]
    pub fn payload_constraint(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.payload_constraints.insert(key.into(), value);
        self
    }
}

/// Kind-specific trigger configuration, tagged by its wire `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum TriggerKind {
    /// `jenkins`
    Jenkins(JenkinsTrigger),
    /// `git`
    Git(GitHubTrigger),
    /// `artifactory`
    Artifactory(ArtifactoryTrigger),
    /// `pubsub`
    Pubsub(PubSubTrigger),
}

impl TriggerKind {
    /// The wire `type`.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Jenkins(_) => "jenkins",
            Self::Git(_) => "git",
            Self::Artifactory(_) => "artifactory",
            Self::Pubsub(_) => "pubsub",
        }
    }
}

/// A trigger and the expected artifacts it supplies.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    kind: TriggerKind,
    enabled: bool,
    artifacts: Vec<ArtifactId>,
}

impl Trigger {
    /// An enabled trigger supplying no artifacts.
    #[must_use]
    pub fn new(kind: impl Into<TriggerKind>) -> Self {
        Self {
            kind: kind.into(),
            enabled: true,
            artifacts: Vec::new(),
        }
    }

    /// Declares that this trigger supplies `artifact`.
    #[must_use]
    pub fn with_artifact(mut self, artifact: impl Into<ArtifactId>) -> Self {
        let artifact = artifact.into();
        if !self.artifacts.contains(&artifact) {
            self.artifacts.push(artifact);
        }
        self
    }

    /// Disables the trigger.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Returns the kind-specific configuration.
    #[must_use]
    pub fn kind(&self) -> &TriggerKind {
        &self.kind
    }

    /// Whether the trigger is enabled.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Returns the artifacts this trigger supplies, in declaration order.
    #[must_use]
    pub fn artifacts(&self) -> &[ArtifactId] {
        &self.artifacts
    }
}

macro_rules! trigger_kind_from {
    ($($config:ident => $variant:ident),* $(,)?) => {
        $(
            impl From<$config> for TriggerKind {
                fn from(config: $config) -> Self {
                    Self::$variant(config)
                }
            }

            impl From<$config> for Trigger {
                fn from(config: $config) -> Self {
                    Self::new(config)
                }
            }
        )*
    };
}

trigger_kind_from! {
    JenkinsTrigger => Jenkins,
    GitHubTrigger => Git,
    ArtifactoryTrigger => Artifactory,
    PubSubTrigger => Pubsub,
}

impl From<TriggerKind> for Trigger {
    fn from(kind: TriggerKind) -> Self {
        Self::new(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_jenkins_trigger_json() {
        let kind: TriggerKind = JenkinsTrigger::new("build-app", "ci")
            .property_file("build.properties")
            .into();

        assert_eq!(
            serde_json::to_value(&kind).unwrap(),
            json!({"type": "jenkins", "job": "build-app", "master": "ci", "propertyFile": "build.properties"})
        );
    }

    #[test]
    fn test_github_trigger_json() {
        let kind: TriggerKind = GitHubTrigger::new("spinnaker", "kork").branch("master").into();

        assert_eq!(
            serde_json::to_value(&kind).unwrap(),
            json!({"type": "git", "source": "github", "project": "spinnaker", "slug": "kork", "branch": "master"})
        );
    }

    #[test]
    fn test_pubsub_subscription_name_mirrors_subscription() {
        let kind: TriggerKind = PubSubTrigger::new("google", "builds", "gcr")
            .attribute_constraint("eventType", json!("BUILD"))
            .into();

        let value = serde_json::to_value(&kind).unwrap();
        assert_eq!(value["type"], "pubsub");
        assert_eq!(value["subscriptionName"], "builds");
        assert_eq!(value["attributeConstraints"], json!({"eventType": "BUILD"}));
        assert_eq!(value["payloadConstraints"], json!({}));
    }

    #[test]
    fn test_trigger_kind_round_trips_from_json() {
        let kind: TriggerKind = serde_json::from_value(json!({
            "type": "artifactory",
            "artifactorySearchName": "libs-release"
        }))
        .unwrap();

        assert_eq!(kind, ArtifactoryTrigger::new("libs-release").into());
        assert_eq!(kind.name(), "artifactory");
    }

    #[test]
    fn test_trigger_defaults_and_artifacts() {
        let trigger = Trigger::from(JenkinsTrigger::new("job", "master"))
            .with_artifact(ArtifactId::new("0"))
            .with_artifact(ArtifactId::new("0"))
            .with_artifact(ArtifactId::new("1"));

        assert!(trigger.is_enabled());
        assert_eq!(trigger.artifacts(), &[ArtifactId::new("0"), ArtifactId::new("1")]);
        assert!(!trigger.disabled().is_enabled());
    }
}
