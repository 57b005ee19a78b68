//! Aggregate root trait for versioned, mutable domain records.

use crate::entity::Entity;
use crate::error::{DomainError, DomainResult};

/// Aggregate root: an entity whose state changes are guarded by a version.
///
/// Every committed write bumps the version by one. Stores use it for
/// optimistic concurrency: a writer remembers the version it read and the
/// commit is rejected if another writer got there first.
pub trait AggregateRoot: Entity {
    /// Monotonically increasing version of the aggregate's state.
    fn version(&self) -> u64;
}

/// Version a writer expects an aggregate to still be at when it commits.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(pub u64);

impl ExpectedVersion {
    /// Expect `aggregate` to be unchanged since it was read.
    pub fn of<A: AggregateRoot + ?Sized>(aggregate: &A) -> Self {
        Self(aggregate.version())
    }

    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "optimistic concurrency check failed (expected: {}, actual: {actual})",
                self.0
            )))
        }
    }
}
