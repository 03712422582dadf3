//! Expected artifacts and the match artifacts they describe.
//!
//! An [`ExpectedArtifact`] gets a generated id when it is created. Triggers and
//! deploy stages refer to it by that id, and the pipeline must register it
//! for the reference to resolve.

use crate::utils::{default_id_source, IdSource};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Identifier of an expected artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Wraps an existing id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A concrete artifact description used for matching or as a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Artifact type, e.g. "maven/file".
    #[serde(rename = "type")]
    pub artifact_type: String,
    /// The artifact account used to fetch it.
    pub artifact_account: String,
    /// Reference or pattern.
    pub reference: String,
    /// Version, for kinds that carry one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

impl Artifact {
    /// A Maven file artifact.
    #[must_use]
    pub fn maven(account: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::of_type("maven/file", account, reference)
    }

    /// A file archived by a Jenkins job.
    #[must_use]
    pub fn jenkins_file(account: impl Into<String>, reference: impl Into<String>) -> Self {
        Self::of_type("jenkins/file", account, reference)
    }

    /// A file in a GitHub repository at a given version.
    #[must_use]
    pub fn github_file(
        account: impl Into<String>,
        reference: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            version: Some(version.into()),
            ..Self::of_type("github/file", account, reference)
        }
    }

    fn of_type(
        artifact_type: &str,
        account: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            artifact_type: artifact_type.to_string(),
            artifact_account: account.into(),
            reference: reference.into(),
            version: None,
        }
    }
}

/// An artifact the pipeline expects to be supplied by a trigger or a prior run.
///
/// The default-artifact and prior-artifact flags are independent; both may be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpectedArtifact {
    id: ArtifactId,
    display_name: String,
    match_artifact: Artifact,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    default_artifact: Option<Artifact>,
    #[serde(default)]
    use_default_artifact: bool,
    #[serde(default)]
    use_prior_artifact: bool,
}

impl ExpectedArtifact {
    /// Creates an expected artifact with an explicit id.
    ///
    /// The display name defaults to the id.
    #[must_use]
    pub fn new(id: ArtifactId, match_artifact: Artifact) -> Self {
        Self {
            display_name: id.to_string(),
            id,
            match_artifact,
            default_artifact: None,
            use_default_artifact: false,
            use_prior_artifact: false,
        }
    }

    /// Sets the display name.
    #[must_use]
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Falls back to `artifact` when nothing matches.
    #[must_use]
    pub fn with_default(mut self, artifact: Artifact) -> Self {
        self.default_artifact = Some(artifact);
        self.use_default_artifact = true;
        self
    }

    /// Falls back to the artifact from the previous execution.
    #[must_use]
    pub fn use_prior_artifact(mut self) -> Self {
        self.use_prior_artifact = true;
        self
    }

    /// Returns the generated id.
    #[must_use]
    pub fn id(&self) -> &ArtifactId {
        &self.id
    }

    /// Returns the match artifact.
    #[must_use]
    pub fn match_artifact(&self) -> &Artifact {
        &self.match_artifact
    }

    /// Returns the default artifact, if any.
    #[must_use]
    pub fn default_artifact(&self) -> Option<&Artifact> {
        self.default_artifact.as_ref()
    }

    /// Whether the default artifact is used.
    #[must_use]
    pub fn uses_default_artifact(&self) -> bool {
        self.use_default_artifact
    }

    /// Whether the prior artifact is used.
    #[must_use]
    pub fn uses_prior_artifact(&self) -> bool {
        self.use_prior_artifact
    }
}

impl From<&ExpectedArtifact> for ArtifactId {
    fn from(artifact: &ExpectedArtifact) -> Self {
        artifact.id.clone()
    }
}

/// Creates expected artifacts with ids drawn from an [`IdSource`].
#[derive(Clone)]
pub struct ArtifactFactory {
    ids: Arc<dyn IdSource>,
}

impl fmt::Debug for ArtifactFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArtifactFactory").finish_non_exhaustive()
    }
}

impl Default for ArtifactFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactFactory {
    /// Creates a factory using random ids.
    #[must_use]
    pub fn new() -> Self {
        Self::with_id_source(default_id_source())
    }

    /// Creates a factory using the given id source.
    #[must_use]
    pub fn with_id_source(ids: Arc<dyn IdSource>) -> Self {
        Self { ids }
    }

    /// Creates an expected artifact matching `match_artifact` with a fresh id.
    #[must_use]
    pub fn expect(&self, match_artifact: Artifact) -> ExpectedArtifact {
        ExpectedArtifact::new(ArtifactId::new(self.ids.next_id()), match_artifact)
    }
}
