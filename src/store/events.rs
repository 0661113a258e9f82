// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Events supervisor: the flat id-keyed record collection.
//!
//! Mirrors the streams supervisor minus the hierarchy: timestamp-gated
//! last-writer-wins merge on upsert, the two-stage delete machine without
//! cascade, and filtered queries evaluated through the predicate engine
//! with stream sets expanded against the tree by the caller's store.

use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::debug;

use super::{Deletion, StoreError, StreamStore, UpsertOutcome};
use crate::event::Event;
use crate::filter::Filter;
use crate::now_millis;

/// The events supervisor.
#[derive(Default)]
pub struct EventStore {
    inner: RwLock<HashMap<String, Event>>,
}

impl EventStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge an event, gated on the `modified` stamp.
    ///
    /// An incoming copy whose `modified` is not newer than the stored one
    /// is a successful no-op; a newer one replaces every mutable field.
    pub fn upsert(&self, incoming: Event) -> UpsertOutcome<Event> {
        let mut inner = self.inner.write();
        if let Some(existing) = inner.get_mut(&incoming.id) {
            if incoming.modified <= existing.modified {
                debug!(id = %incoming.id, "stale event upsert, unchanged");
                return UpsertOutcome::Unchanged(existing.clone());
            }
            existing.merge_from(&incoming);
            UpsertOutcome::Updated(existing.clone())
        } else {
            let stored = incoming.clone();
            inner.insert(incoming.id.clone(), incoming);
            UpsertOutcome::Created(stored)
        }
    }

    /// Strict insert for the local create path.
    pub fn insert(&self, event: Event) -> Result<Event, StoreError> {
        let mut inner = self.inner.write();
        if inner.contains_key(&event.id) {
            return Err(StoreError::Duplicate(event.id));
        }
        let stored = event.clone();
        inner.insert(event.id.clone(), event);
        Ok(stored)
    }

    /// One step of the two-stage delete machine; no cascade.
    pub fn delete(&self, id: &str) -> Result<Deletion<Event>, StoreError> {
        let mut inner = self.inner.write();
        let Some(existing) = inner.get_mut(id) else {
            return Err(StoreError::NotFound(id.to_string()));
        };
        if !existing.trashed {
            existing.trashed = true;
            // advance the stamp so the remote confirmation can merge back
            existing.modified = now_millis();
            debug!(id = %id, "event soft-deleted");
            return Ok(Deletion::Trashed(existing.clone()));
        }
        inner.remove(id);
        debug!(id = %id, "event hard-deleted");
        Ok(Deletion::Deleted { id: id.to_string() })
    }

    /// Evaluate `filter` over all events.
    ///
    /// The filter's stream set is expanded to full subtrees against `tree`
    /// before matching; records under streams outside the expanded set —
    /// including streams the tree does not know — are excluded, not
    /// rejected. Results are ordered by event time per `sort_ascending`
    /// (running events sort as newest), then `skip` and `limit` apply.
    #[must_use]
    pub fn query(&self, filter: &Filter, tree: &StreamStore) -> Vec<Event> {
        // expansion takes the tree's read lock; finish it before locking
        // the event map so the two stores never nest
        let expanded = filter.streams.as_ref().map(|named| tree.expand(named));

        let inner = self.inner.read();
        let mut hits: Vec<Event> = inner
            .values()
            .filter(|e| filter.matches(e, expanded.as_ref()))
            .cloned()
            .collect();
        drop(inner);

        if filter.sort_ascending {
            hits.sort_by_key(|e| e.time.unwrap_or(i64::MAX));
        } else {
            hits.sort_by_key(|e| std::cmp::Reverse(e.time.unwrap_or(i64::MAX)));
        }

        let skip = filter.skip.unwrap_or(0);
        let mut hits: Vec<Event> = hits.into_iter().skip(skip).collect();
        if let Some(limit) = filter.limit {
            hits.truncate(limit);
        }
        hits
    }

    /// Re-point every event under `from` to `to`. Returns how many moved.
    ///
    /// Used by the stream-delete cascade; a pure re-pointing, the
    /// modification stamps stay untouched.
    pub fn reassign_stream(&self, from: &str, to: &str) -> usize {
        let mut inner = self.inner.write();
        let mut moved = 0;
        for event in inner.values_mut() {
            if event.stream_id == from {
                event.stream_id = to.to_string();
                moved += 1;
            }
        }
        moved
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Event> {
        self.inner.read().get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().contains_key(id)
    }

    /// Every event, in unspecified order.
    #[must_use]
    pub fn all(&self) -> Vec<Event> {
        self.inner.read().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}
