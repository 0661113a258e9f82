//! Local authoritative stores.
//!
//! Two supervisors share one vocabulary: [`StreamStore`] holds the
//! hierarchical stream forest, [`EventStore`] the flat id-keyed event
//! collection. Both apply timestamp-gated last-writer-wins merges on
//! [`upsert`](StreamStore::upsert) and run the two-stage
//! soft/hard deletion lifecycle.
//!
//! Store operations are synchronous and atomic with respect to each other:
//! each store guards its interior with a single `RwLock`, so queries run
//! concurrently while structural mutation is mutually exclusive.

pub mod events;
pub mod streams;

pub use events::EventStore;
pub use streams::StreamStore;

use thiserror::Error;

/// Structural and not-found errors reported synchronously by the stores.
///
/// These are never forwarded to the remote source and never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Mutation targeted an id the store does not know
    #[error("entity not found: {0}")]
    NotFound(String),
    /// Strict insert hit an already-known id
    #[error("duplicate id: {0}")]
    Duplicate(String),
    /// Re-parenting would make a stream its own transitive descendant
    #[error("cycle: {parent} already descends from {child}")]
    Cycle { parent: String, child: String },
}

/// Outcome of a timestamp-gated upsert.
///
/// `Unchanged` is the stale-write no-op: the incoming copy was not newer
/// than the stored one. It is a success, distinguished from a true failure.
#[derive(Debug, Clone, PartialEq)]
pub enum UpsertOutcome<T> {
    /// No entity with this id existed; it was inserted
    Created(T),
    /// The stored entity was replaced field by field
    Updated(T),
    /// The incoming copy was stale; nothing changed
    Unchanged(T),
}

impl<T> UpsertOutcome<T> {
    /// The post-operation stored entity.
    #[must_use]
    pub fn entity(&self) -> &T {
        match self {
            Self::Created(t) | Self::Updated(t) | Self::Unchanged(t) => t,
        }
    }

    /// Consume the outcome, yielding the stored entity.
    #[must_use]
    pub fn into_entity(self) -> T {
        match self {
            Self::Created(t) | Self::Updated(t) | Self::Unchanged(t) => t,
        }
    }

    /// Whether the store content changed.
    #[must_use]
    pub fn changed(&self) -> bool {
        !matches!(self, Self::Unchanged(_))
    }

    /// Stable label for metrics.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Updated(_) => "updated",
            Self::Unchanged(_) => "unchanged",
        }
    }
}

/// Outcome of one step of the two-stage delete machine.
///
/// The first delete of an active entity soft-deletes it and returns the
/// now-trashed copy; the second removes it and returns only the id.
#[derive(Debug, Clone, PartialEq)]
pub enum Deletion<T> {
    /// Soft-deleted; the entity still exists, flagged trashed
    Trashed(T),
    /// Hard-deleted; the entity no longer exists
    Deleted { id: String },
}

impl<T> Deletion<T> {
    /// Whether the entity is gone from the store.
    #[must_use]
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::Deleted { .. })
    }
}
