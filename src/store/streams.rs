// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Streams supervisor: the hierarchical stream forest.
//!
//! Holds every known stream in a flat id index plus the derived root set.
//! After any structural change the root set and every `children` index are
//! recomputed from scratch by scanning the flat map — the derived structure
//! always equals what a from-scratch derivation over the id→stream map
//! produces, and the recomputation happens inside the same write-lock
//! critical section as the mutation that triggered it.
//!
//! Deletion is two-stage: the first call soft-deletes (trashed flag), the
//! second hard-removes and — when requested — splices the subtree up one
//! level, re-pointing both child streams and events. The event store is an
//! explicit context parameter of that cascade; entities never hold back
//! references.

use std::collections::{BTreeSet, HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use super::{Deletion, EventStore, StoreError, UpsertOutcome};
use crate::filter::{Filter, StateFilter};
use crate::now_millis;
use crate::stream::Stream;

/// The streams supervisor.
///
/// All structural mutation takes the write lock; queries take the read
/// lock. No partially rebuilt tree is ever observable.
#[derive(Default)]
pub struct StreamStore {
    inner: RwLock<TreeInner>,
}

#[derive(Default)]
struct TreeInner {
    /// Flat id index; each stream carries its derived children set
    streams: HashMap<String, Stream>,
    /// Ids of streams with no parent
    roots: BTreeSet<String>,
}

impl TreeInner {
    /// Re-derive the root set and every children index from the parent
    /// edges in the flat map.
    fn recompute(&mut self) {
        let edges: Vec<(String, Option<String>)> = self
            .streams
            .values()
            .map(|s| (s.id.clone(), s.parent_id.clone()))
            .collect();

        for stream in self.streams.values_mut() {
            // empty is absent, not empty-set
            stream.children = None;
        }
        self.roots.clear();

        for (id, parent) in edges {
            match parent {
                None => {
                    self.roots.insert(id);
                }
                Some(parent_id) => {
                    // a dangling parent id leaves the child orphaned:
                    // no children entry anywhere, and not a root either
                    if parent_id != id {
                        if let Some(parent_stream) = self.streams.get_mut(&parent_id) {
                            parent_stream
                                .children
                                .get_or_insert_with(BTreeSet::new)
                                .insert(id);
                        }
                    }
                }
            }
        }
    }

    /// `candidate` reachable from `id` in zero or more child steps.
    fn has_descendant(&self, id: &str, candidate: &str) -> bool {
        if id == candidate {
            return true;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            let Some(stream) = self.streams.get(current) else {
                continue;
            };
            if let Some(children) = &stream.children {
                for child in children {
                    if child == candidate {
                        return true;
                    }
                    stack.push(child.as_str());
                }
            }
        }
        false
    }

    /// Each named id plus its transitive descendants. Unknown ids are kept
    /// as themselves so direct references still match.
    fn expand(&self, named: &BTreeSet<String>) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        let mut stack: Vec<&str> = named.iter().map(String::as_str).collect();
        while let Some(current) = stack.pop() {
            if !out.insert(current.to_string()) {
                continue;
            }
            if let Some(stream) = self.streams.get(current) {
                if let Some(children) = &stream.children {
                    stack.extend(children.iter().map(String::as_str));
                }
            }
        }
        out
    }

    /// Re-point any existing streams named by `children` at `parent_id`.
    fn index_carried_children(&mut self, parent_id: &str, children: &BTreeSet<String>) {
        for child_id in children {
            if child_id == parent_id {
                continue;
            }
            if let Some(child) = self.streams.get_mut(child_id) {
                child.parent_id = Some(parent_id.to_string());
            }
        }
    }
}

impl StreamStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or merge a stream.
    ///
    /// Unknown id: insert, re-pointing any existing streams the incoming
    /// copy carries in its children set. Known id: timestamp-gated merge —
    /// an incoming copy not newer than the stored one is a successful
    /// no-op ([`UpsertOutcome::Unchanged`]); a newer one replaces every
    /// mutable field and re-attaches under the (possibly new) parent.
    pub fn upsert(&self, incoming: Stream) -> UpsertOutcome<Stream> {
        let mut inner = self.inner.write();
        let id = incoming.id.clone();
        let carried = incoming.children.clone();

        let created = if let Some(existing) = inner.streams.get_mut(&id) {
            if incoming.modified <= existing.modified {
                debug!(id = %id, "stale stream upsert, unchanged");
                return UpsertOutcome::Unchanged(existing.clone());
            }
            existing.merge_from(&incoming);
            false
        } else {
            inner.streams.insert(id.clone(), incoming);
            true
        };

        if let Some(children) = &carried {
            inner.index_carried_children(&id, children);
        }
        inner.recompute();

        let stored = inner
            .streams
            .get(&id)
            .cloned()
            .unwrap_or_else(|| unreachable!("stream {id} inserted above"));
        if created {
            UpsertOutcome::Created(stored)
        } else {
            UpsertOutcome::Updated(stored)
        }
    }

    /// Strict insert for the local create path.
    pub fn insert(&self, stream: Stream) -> Result<Stream, StoreError> {
        let mut inner = self.inner.write();
        if inner.streams.contains_key(&stream.id) {
            return Err(StoreError::Duplicate(stream.id));
        }
        let id = stream.id.clone();
        let carried = stream.children.clone();
        inner.streams.insert(id.clone(), stream);
        if let Some(children) = &carried {
            inner.index_carried_children(&id, children);
        }
        inner.recompute();
        Ok(inner
            .streams
            .get(&id)
            .cloned()
            .unwrap_or_else(|| unreachable!("stream {id} inserted above")))
    }

    /// Attach `child_id` under `parent_id`.
    ///
    /// Rejected as [`StoreError::Cycle`] when the parent already descends
    /// from the child (including self-parenting).
    pub fn add_child(&self, parent_id: &str, child_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.streams.contains_key(parent_id) {
            return Err(StoreError::NotFound(parent_id.to_string()));
        }
        if inner.has_descendant(child_id, parent_id) {
            return Err(StoreError::Cycle {
                parent: parent_id.to_string(),
                child: child_id.to_string(),
            });
        }
        let Some(child) = inner.streams.get_mut(child_id) else {
            return Err(StoreError::NotFound(child_id.to_string()));
        };
        child.parent_id = Some(parent_id.to_string());
        inner.recompute();
        Ok(())
    }

    /// Detach `child_id` from `parent_id`, making the child a root.
    ///
    /// A parent whose children set empties has the set cleared to absent.
    pub fn remove_child(&self, parent_id: &str, child_id: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if !inner.streams.contains_key(parent_id) {
            return Err(StoreError::NotFound(parent_id.to_string()));
        }
        let Some(child) = inner.streams.get_mut(child_id) else {
            return Err(StoreError::NotFound(child_id.to_string()));
        };
        if child.parent_id.as_deref() == Some(parent_id) {
            child.parent_id = None;
            inner.recompute();
        }
        Ok(())
    }

    /// One step of the two-stage delete machine.
    ///
    /// ACTIVE → soft-delete: sets the trashed flag, structure untouched,
    /// returns the now-trashed stream. TRASHED → hard-delete: detaches the
    /// stream and, when `merge_with_parent` and a parent exists, re-points
    /// every child stream and every event under the deleted stream to that
    /// parent; without a parent (or when not merging) children and events
    /// keep the dangling reference. Unknown id is an error, not a no-op.
    pub fn delete(
        &self,
        id: &str,
        merge_with_parent: bool,
        events: &EventStore,
    ) -> Result<Deletion<Stream>, StoreError> {
        let mut reassign: Option<(String, String)> = None;
        let outcome = {
            let mut inner = self.inner.write();
            let Some(existing) = inner.streams.get_mut(id) else {
                return Err(StoreError::NotFound(id.to_string()));
            };

            if !existing.trashed {
                existing.trashed = true;
                // advance the stamp so the remote confirmation can merge back
                existing.modified = now_millis();
                debug!(id = %id, "stream soft-deleted");
                return Ok(Deletion::Trashed(existing.clone()));
            }

            let parent = existing.parent_id.clone();
            // derive the children from parent edges, the same source recompute uses
            let child_ids: Vec<String> = inner
                .streams
                .values()
                .filter(|s| s.parent_id.as_deref() == Some(id))
                .map(|s| s.id.clone())
                .collect();

            if merge_with_parent {
                if let Some(parent_id) = &parent {
                    for child_id in &child_ids {
                        if let Some(child) = inner.streams.get_mut(child_id) {
                            child.parent_id = Some(parent_id.clone());
                        }
                    }
                    reassign = Some((id.to_string(), parent_id.clone()));
                }
            }

            inner.streams.remove(id);
            inner.recompute();
            debug!(id = %id, merge_with_parent, children = child_ids.len(), "stream hard-deleted");
            Deletion::Deleted { id: id.to_string() }
        };

        // event re-pointing happens outside the streams lock; cross-store
        // atomicity is not part of the contract
        if let Some((from, to)) = reassign {
            let moved = events.reassign_stream(&from, &to);
            debug!(from = %from, to = %to, moved, "events re-pointed to parent");
        }
        Ok(outcome)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<Stream> {
        self.inner.read().streams.get(id).cloned()
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.inner.read().streams.contains_key(id)
    }

    /// The streams whose `parent_id` is unset, sorted by name.
    #[must_use]
    pub fn roots(&self) -> Vec<Stream> {
        let inner = self.inner.read();
        let mut roots: Vec<Stream> = inner
            .roots
            .iter()
            .filter_map(|id| inner.streams.get(id).cloned())
            .collect();
        roots.sort_by(|a, b| a.name.cmp(&b.name));
        roots
    }

    /// `candidate` reachable from `id` by children edges, zero or more steps.
    #[must_use]
    pub fn has_descendant(&self, id: &str, candidate: &str) -> bool {
        self.inner.read().has_descendant(id, candidate)
    }

    /// Expand a named stream set to full subtrees.
    #[must_use]
    pub fn expand(&self, named: &BTreeSet<String>) -> BTreeSet<String> {
        self.inner.read().expand(named)
    }

    /// Evaluate the structural predicates of `filter` over all streams:
    /// parent, trashed state, modification stamp, stream-set membership.
    /// Results are sorted by name, then paginated.
    #[must_use]
    pub fn query(&self, filter: &Filter) -> Vec<Stream> {
        let inner = self.inner.read();
        let expanded = filter.streams.as_ref().map(|named| inner.expand(named));

        let mut hits: Vec<Stream> = inner
            .streams
            .values()
            .filter(|s| match &filter.parent_id {
                None => true,
                Some(None) => s.parent_id.is_none(),
                Some(Some(parent)) => s.parent_id.as_deref() == Some(parent.as_str()),
            })
            .filter(|s| match filter.state {
                StateFilter::Default => !s.trashed,
                StateFilter::Trashed => s.trashed,
                StateFilter::All => true,
            })
            .filter(|s| filter.modified_since.map_or(true, |since| s.modified >= since))
            .filter(|s| {
                expanded
                    .as_ref()
                    .map_or(true, |eligible| eligible.contains(&s.id))
            })
            .cloned()
            .collect();
        drop(inner);

        hits.sort_by(|a, b| a.name.cmp(&b.name));
        let skip = filter.skip.unwrap_or(0);
        let mut hits: Vec<Stream> = hits.into_iter().skip(skip).collect();
        if let Some(limit) = filter.limit {
            hits.truncate(limit);
        }
        hits
    }

    /// Every stream, in unspecified order.
    #[must_use]
    pub fn all(&self) -> Vec<Stream> {
        self.inner.read().streams.values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.read().streams.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.read().streams.is_empty()
    }
}
