//! Default values for shared stage fields.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Cloud provider name for Cloud Foundry.
pub const CLOUD_FOUNDRY: &str = "cloudfoundry";

/// Credentials plus the provider they belong to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudProvider {
    /// Account credentials name.
    pub credentials: String,
    /// Provider name, e.g. "cloudfoundry".
    pub cloud_provider: String,
}

impl CloudProvider {
    /// Creates a provider.
    #[must_use]
    pub fn new(credentials: impl Into<String>, cloud_provider: impl Into<String>) -> Self {
        Self {
            credentials: credentials.into(),
            cloud_provider: cloud_provider.into(),
        }
    }

    /// Creates a Cloud Foundry provider.
    #[must_use]
    pub fn cloud_foundry(credentials: impl Into<String>) -> Self {
        Self::new(credentials, CLOUD_FOUNDRY)
    }
}

/// The shared fields a [`Defaults`] overlay can supply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DefaultField {
    /// Deployment account.
    Account,
    /// Region (for Cloud Foundry, "org > space").
    Region,
    /// Application name.
    Application,
    /// Cloud provider and credentials.
    CloudProvider,
}

impl fmt::Display for DefaultField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Account => write!(f, "account"),
            Self::Region => write!(f, "region"),
            Self::Application => write!(f, "application"),
            Self::CloudProvider => write!(f, "cloudProvider"),
        }
    }
}

/// One overlay of default values. Unset fields fall through to outer overlays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Defaults {
    account: Option<String>,
    region: Option<String>,
    application: Option<String>,
    cloud_provider: Option<CloudProvider>,
}

impl Defaults {
    /// Creates an empty overlay.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the account.
    #[must_use]
    pub fn account(mut self, account: impl Into<String>) -> Self {
        self.account = Some(account.into());
        self
    }

    /// Sets the region.
    #[must_use]
    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Sets the application.
    #[must_use]
    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.application = Some(application.into());
        self
    }

    /// Sets the cloud provider.
    #[must_use]
    pub fn cloud_provider(mut self, provider: CloudProvider) -> Self {
        self.cloud_provider = Some(provider);
        self
    }

    /// Returns the value of a string field defined by this overlay.
    ///
    /// Returns `None` for [`DefaultField::CloudProvider`]; use
    /// [`provider`](Self::provider) for that one.
    #[must_use]
    pub fn get(&self, field: DefaultField) -> Option<&str> {
        match field {
            DefaultField::Account => self.account.as_deref(),
            DefaultField::Region => self.region.as_deref(),
            DefaultField::Application => self.application.as_deref(),
            DefaultField::CloudProvider => None,
        }
    }

    /// Returns the cloud provider defined by this overlay.
    #[must_use]
    pub fn provider(&self) -> Option<&CloudProvider> {
        self.cloud_provider.as_ref()
    }

    /// Whether this overlay defines nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_builder() {
        let defaults = Defaults::new().account("montclair").region("dev > dev");

        assert_eq!(defaults.get(DefaultField::Account), Some("montclair"));
        assert_eq!(defaults.get(DefaultField::Region), Some("dev > dev"));
        assert_eq!(defaults.get(DefaultField::Application), None);
        assert!(!defaults.is_empty());
        assert!(Defaults::new().is_empty());
    }

    #[test]
    fn test_overlay_from_json() {
        let defaults: Defaults = serde_json::from_value(serde_json::json!({
            "region": "dev > dev",
            "cloudProvider": {"credentials": "creds1", "cloudProvider": "cloudfoundry"}
        }))
        .unwrap();

        assert_eq!(defaults.get(DefaultField::Region), Some("dev > dev"));
        assert_eq!(defaults.provider(), Some(&CloudProvider::cloud_foundry("creds1")));
    }

    #[test]
    fn test_field_display_names() {
        assert_eq!(DefaultField::CloudProvider.to_string(), "cloudProvider");
        assert_eq!(DefaultField::Region.to_string(), "region");
    }
}
