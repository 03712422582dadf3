//! Identifier sources for stages and expected artifacts.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Process-wide construction counter used to order stages deterministically.
static CONSTRUCTION_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates a new UUID v4.
#[must_use]
pub fn generate_uuid() -> Uuid {
    Uuid::new_v4()
}

/// Returns the next value of the process-wide construction counter.
///
/// Values are strictly increasing across all threads, so the relative
/// order of stages built on one thread never depends on other threads.
pub fn next_sequence() -> u64 {
    CONSTRUCTION_SEQUENCE.fetch_add(1, Ordering::Relaxed)
}

/// A source of unique identifiers.
///
/// Implementations must be safe to share between threads that build
/// independent pipelines at the same time.
#[cfg_attr(test, mockall::automock)]
pub trait IdSource: Send + Sync {
    /// Returns an identifier that this source has never returned before.
    fn next_id(&self) -> String;
}

/// Random UUID v4 identifiers. The default source.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidIdSource;

impl IdSource for UuidIdSource {
    fn next_id(&self) -> String {
        generate_uuid().to_string()
    }
}

/// Deterministic counter identifiers ("0", "1", "2", ...).
#[derive(Debug, Default)]
pub struct SequentialIdSource {
    next: AtomicU64,
}

impl SequentialIdSource {
    /// Creates a counter starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a counter starting at `first`.
    #[must_use]
    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }
}

impl IdSource for SequentialIdSource {
    fn next_id(&self) -> String {
        self.next.fetch_add(1, Ordering::SeqCst).to_string()
    }
}

/// Returns the default shared id source.
#[must_use]
pub fn default_id_source() -> Arc<dyn IdSource> {
    Arc::new(UuidIdSource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_uuid_v4() {
        let id = generate_uuid();
        assert_eq!(id.get_version_num(), 4);
    }

    #[test]
    fn test_uuid_source_is_unique() {
        let source = UuidIdSource;
        let ids: HashSet<String> = (0..1000).map(|_| source.next_id()).collect();
        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_sequential_source_counts_from_zero() {
        let source = SequentialIdSource::new();
        assert_eq!(source.next_id(), "0");
        assert_eq!(source.next_id(), "1");
        assert_eq!(source.next_id(), "2");
    }

    #[test]
    fn test_sequential_source_starting_at() {
        let source = SequentialIdSource::starting_at(40);
        assert_eq!(source.next_id(), "40");
        assert_eq!(source.next_id(), "41");
    }

    #[test]
    fn test_sequential_source_across_threads() {
        let source = Arc::new(SequentialIdSource::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let source = Arc::clone(&source);
                std::thread::spawn(move || (0..250).map(|_| source.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "duplicate id");
            }
        }
        assert_eq!(seen.len(), 1000);
    }

    #[test]
    fn test_sequence_is_increasing() {
        let a = next_sequence();
        let b = next_sequence();
        assert!(b > a);
    }
}
