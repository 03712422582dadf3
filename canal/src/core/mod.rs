//! Core domain model types for canal.
//!
//! - Stage identifiers and immutable stage records
//! - Options shared by every stage kind

mod options;
mod record;

pub use options::{Condition, StageOptions};
pub use record::{StageId, StageRecord};
