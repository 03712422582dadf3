//! Call-scoped construction context.

use super::{CloudProvider, DefaultField, Defaults};
use crate::core::StageRecord;
use crate::errors::{CanalError, MissingDefaultError};
use crate::stages::StageDefinition;
use crate::utils::{default_id_source, IdSource};
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// The context every stage is built in.
///
/// A scope is one link in an immutable chain of [`Defaults`] overlays.
/// [`with_defaults`](Self::with_defaults) creates a child link on the
/// caller's stack and hands it to a callback. The link is gone when the
/// callback returns, fails, or unwinds, so siblings never see it and
/// builds on other threads never share it.
pub struct Scope<'a> {
    parent: Option<&'a Scope<'a>>,
    overlay: Defaults,
    ids: Arc<dyn IdSource>,
    depth: usize,
}

impl fmt::Debug for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("overlay", &self.overlay)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl Default for Scope<'static> {
    fn default() -> Self {
        Self::root()
    }
}

impl Scope<'static> {
    /// Creates an empty root scope with random stage ids.
    #[must_use]
    pub fn root() -> Self {
        Self::with_id_source(default_id_source())
    }

    /// Creates an empty root scope drawing stage ids from `ids`.
    #[must_use]
    pub fn with_id_source(ids: Arc<dyn IdSource>) -> Self {
        Self {
            parent: None,
            overlay: Defaults::default(),
            ids,
            depth: 0,
        }
    }

    /// Sets the root overlay.
    #[must_use]
    pub fn with_root_defaults(mut self, defaults: Defaults) -> Self {
        self.overlay = defaults;
        self
    }
}

impl<'a> Scope<'a> {
    /// Runs `build` under `overlay`, layered over this scope's defaults.
    ///
    /// Whatever `build` returns is passed through unchanged, so a callback
    /// returning `Result` propagates its error after the overlay is gone.
    pub fn with_defaults<T>(&self, overlay: Defaults, build: impl FnOnce(&Scope<'_>) -> T) -> T {
        let child = Scope {
            parent: Some(self),
            overlay,
            ids: Arc::clone(&self.ids),
            depth: self.depth + 1,
        };
        trace!(depth = child.depth, overlay = ?child.overlay, "pushed defaults overlay");
        let _guard = PopGuard { depth: child.depth };
        build(&child)
    }

    /// Returns the nesting depth (0 for the root).
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns this scope's own overlay.
    #[must_use]
    pub fn overlay(&self) -> &Defaults {
        &self.overlay
    }

    /// Returns the id source stages built in this scope draw from.
    #[must_use]
    pub fn id_source(&self) -> &dyn IdSource {
        self.ids.as_ref()
    }

    /// Returns a shared handle to the id source.
    #[must_use]
    pub fn shared_id_source(&self) -> Arc<dyn IdSource> {
        Arc::clone(&self.ids)
    }

    /// Overlays from innermost to outermost.
    fn overlays(&self) -> impl Iterator<Item = &Defaults> {
        std::iter::successors(Some(self), |scope| scope.parent).map(|scope| &scope.overlay)
    }

    /// Effective value of a string field: the innermost overlay that defines it.
    #[must_use]
    pub fn resolve(&self, field: DefaultField) -> Option<&str> {
        self.overlays().find_map(|overlay| overlay.get(field))
    }

    /// Effective cloud provider.
    #[must_use]
    pub fn cloud_provider(&self) -> Option<&CloudProvider> {
        self.overlays().find_map(Defaults::provider)
    }

    /// Returns `explicit` if set, else the effective default for `field`.
    ///
    /// # Errors
    ///
    /// Returns [`MissingDefaultError`] naming `field` and `stage_kind` when
    /// neither is available.
    pub fn require(
        &self,
        field: DefaultField,
        explicit: Option<&str>,
        stage_kind: &str,
    ) -> Result<String, MissingDefaultError> {
        explicit
            .or_else(|| self.resolve(field))
            .map(ToString::to_string)
            .ok_or_else(|| MissingDefaultError::new(field.to_string(), stage_kind))
    }

    /// Returns `explicit` if set, else the effective cloud provider.
    ///
    /// # Errors
    ///
    /// Returns [`MissingDefaultError`] when neither is available.
    pub fn require_provider(
        &self,
        explicit: Option<&CloudProvider>,
        stage_kind: &str,
    ) -> Result<CloudProvider, MissingDefaultError> {
        explicit
            .or_else(|| self.cloud_provider())
            .cloned()
            .ok_or_else(|| {
                MissingDefaultError::new(DefaultField::CloudProvider.to_string(), stage_kind)
            })
    }

    /// Builds a stage record from a stage definition in this scope.
    ///
    /// # Errors
    ///
    /// Propagates the definition's failure to resolve its fields, typically
    /// a [`MissingDefaultError`].
    pub fn stage<D>(&self, definition: D) -> Result<StageRecord, CanalError>
    where
        D: StageDefinition,
    {
        let kind = definition.kind().to_string();
        let mut fields = definition.fields(self)?;
        if let serde_json::Value::Object(options) = serde_json::to_value(definition.options())? {
            fields.extend(options);
        }

        let record = StageRecord::new(self.id_source(), kind, fields)
            .with_name(definition.options().name.clone())
            .with_artifacts(definition.artifacts());
        trace!(stage_id = %record.id(), kind = record.kind(), depth = self.depth, "built stage");
        Ok(record)
    }
}

struct PopGuard {
    depth: usize,
}

impl Drop for PopGuard {
    fn drop(&mut self) {
        trace!(depth = self.depth, "popped defaults overlay");
    }
}
