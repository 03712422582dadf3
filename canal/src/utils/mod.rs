//! Utility functions for identifier generation.

mod ids;

pub use ids::{
    default_id_source, generate_uuid, next_sequence, IdSource, SequentialIdSource, UuidIdSource,
};

#[cfg(test)]
pub use ids::MockIdSource;
