//! Construction context for stages.
//!
//! This module provides:
//! - [`Defaults`] overlays for the shared fields (account, region,
//!   application, cloud provider)
//! - [`Scope`], the call-scoped chain of overlays that stage
//!   constructors resolve those fields against

mod defaults;
mod scope;


pub use defaults::{CloudProvider, DefaultField, Defaults, CLOUD_FOUNDRY};
pub use scope::Scope;
