// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Event read/write orchestration.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{CacheError, PendingKind, ReadOutcome, SyncHandle, WriteOutcome};
use super::CacheManager;
use crate::event::Event;
use crate::filter::Filter;
use crate::now_millis;
use crate::store::{Deletion, StoreError};

impl CacheManager {
    /// Query events.
    ///
    /// The local answer is immediate. Concurrently the equivalent query
    /// goes to the remote source; its entities merge into the local store
    /// (timestamp-gated), `lastSynced` advances from the server time, and
    /// the re-issued local query resolves the remote half — the caller
    /// never sees the raw network payload.
    #[tracing::instrument(skip(self, filter))]
    pub async fn get_events(&self, filter: Filter) -> ReadOutcome<Vec<Event>> {
        let start = Instant::now();
        self.ensure_scope(&filter);

        let local = self.events.query(&filter, &self.streams);
        crate::metrics::record_operation("events", "query", "success");
        crate::metrics::record_latency("events", "query", start.elapsed());

        let (tx, handle) = SyncHandle::pair();
        let streams = Arc::clone(&self.streams);
        let events = Arc::clone(&self.events);
        let remote = Arc::clone(&self.remote);
        let last_synced = Arc::clone(&self.last_synced);
        tokio::spawn(async move {
            let remote_start = Instant::now();
            let outcome = match remote.fetch_events(&filter).await {
                Ok(batch) => {
                    crate::metrics::record_remote("fetch_events", "success");
                    for event in batch.items {
                        let merged = events.upsert(event);
                        crate::metrics::record_merge("events", merged.label());
                    }
                    last_synced.fetch_max(batch.server_time, Ordering::AcqRel);
                    crate::metrics::set_last_synced(last_synced.load(Ordering::Acquire));
                    Ok(events.query(&filter, &streams))
                }
                Err(err) => {
                    warn!(error = %err, "event fetch failed, local answer stands");
                    crate::metrics::record_remote("fetch_events", "error");
                    Err(err)
                }
            };
            crate::metrics::record_remote_latency("fetch_events", remote_start.elapsed());
            let _ = tx.send(outcome);
        });

        ReadOutcome { local, remote: handle }
    }

    /// Create an event.
    ///
    /// The id is generated when absent; creation and modification stamps
    /// carry the configured writer attribution. The local insert is
    /// synchronous — a duplicate id fails here and nothing reaches the
    /// remote. The returned handle resolves with the reconciled entity
    /// once the remote confirms.
    #[tracing::instrument(skip(self, event), fields(event_id))]
    pub async fn create_event(&self, mut event: Event) -> Result<WriteOutcome<Event>, CacheError> {
        if event.id.is_empty() {
            event.id = Uuid::new_v4().simple().to_string();
        }
        tracing::Span::current().record("event_id", event.id.as_str());

        let now = now_millis();
        event.created = now;
        event.created_by = self.config.writer_id.clone();
        event.modified = now;
        event.modified_by = self.config.writer_id.clone();

        let local = match self.events.insert(event) {
            Ok(stored) => stored,
            Err(err) => {
                crate::metrics::record_operation("events", "create", "duplicate");
                return Err(err.into());
            }
        };
        crate::metrics::record_operation("events", "create", "success");
        debug!("event created locally, forwarding to remote");

        let (tx, handle) = SyncHandle::pair();
        let events = Arc::clone(&self.events);
        let remote = Arc::clone(&self.remote);
        let pending = Arc::clone(&self.pending);
        let id = local.id.clone();
        let submitted = local.clone();
        pending.insert(id.clone(), PendingKind::Create);
        tokio::spawn(async move {
            let remote_start = Instant::now();
            let outcome = match remote.create_event(&submitted).await {
                Ok(confirmed) => {
                    crate::metrics::record_remote("create_event", "success");
                    let merged = events.upsert(confirmed);
                    crate::metrics::record_merge("events", merged.label());
                    Ok(events.get(&id).unwrap_or_else(|| merged.into_entity()))
                }
                Err(err) => {
                    // the optimistic local write stays in place
                    warn!(error = %err, "event create not confirmed");
                    crate::metrics::record_remote("create_event", "error");
                    Err(err)
                }
            };
            crate::metrics::record_remote_latency("create_event", remote_start.elapsed());
            pending.remove(&id);
            let _ = tx.send(outcome);
        });

        Ok(WriteOutcome { local, remote: handle })
    }

    /// Update an event.
    ///
    /// Targeting an unknown id fails synchronously. The local merge is
    /// timestamp-gated like any other; the same mutation is forwarded to
    /// the remote regardless.
    #[tracing::instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn update_event(&self, mut event: Event) -> Result<WriteOutcome<Event>, CacheError> {
        if !self.events.contains(&event.id) {
            crate::metrics::record_operation("events", "update", "not_found");
            return Err(StoreError::NotFound(event.id).into());
        }
        event.touch(&self.config.writer_id);

        let merged = self.events.upsert(event);
        crate::metrics::record_operation("events", "update", merged.label());
        let local = merged.into_entity();

        let (tx, handle) = SyncHandle::pair();
        let events = Arc::clone(&self.events);
        let remote = Arc::clone(&self.remote);
        let pending = Arc::clone(&self.pending);
        let id = local.id.clone();
        let submitted = local.clone();
        pending.insert(id.clone(), PendingKind::Update);
        tokio::spawn(async move {
            let remote_start = Instant::now();
            let outcome = match remote.update_event(&id, &submitted).await {
                Ok(confirmed) => {
                    crate::metrics::record_remote("update_event", "success");
                    let merged = events.upsert(confirmed);
                    crate::metrics::record_merge("events", merged.label());
                    Ok(events.get(&id).unwrap_or_else(|| merged.into_entity()))
                }
                Err(err) => {
                    warn!(error = %err, "event update not confirmed");
                    crate::metrics::record_remote("update_event", "error");
                    Err(err)
                }
            };
            crate::metrics::record_remote_latency("update_event", remote_start.elapsed());
            pending.remove(&id);
            let _ = tx.send(outcome);
        });

        Ok(WriteOutcome { local, remote: handle })
    }

    /// Delete an event: one step of the two-stage machine, locally then
    /// remotely.
    #[tracing::instrument(skip(self), fields(event_id = %id))]
    pub async fn delete_event(
        &self,
        id: &str,
    ) -> Result<WriteOutcome<Deletion<Event>>, CacheError> {
        let local = match self.events.delete(id) {
            Ok(deletion) => deletion,
            Err(err) => {
                crate::metrics::record_operation("events", "delete", "not_found");
                return Err(err.into());
            }
        };
        crate::metrics::record_operation(
            "events",
            "delete",
            if local.is_hard() { "hard" } else { "soft" },
        );

        let (tx, handle) = SyncHandle::pair();
        let events = Arc::clone(&self.events);
        let remote = Arc::clone(&self.remote);
        let pending = Arc::clone(&self.pending);
        let id = id.to_string();
        pending.insert(id.clone(), PendingKind::Delete);
        tokio::spawn(async move {
            let remote_start = Instant::now();
            let outcome = match remote.delete_event(&id).await {
                Ok(Deletion::Trashed(confirmed)) => {
                    crate::metrics::record_remote("delete_event", "success");
                    let merged = events.upsert(confirmed);
                    crate::metrics::record_merge("events", merged.label());
                    Ok(Deletion::Trashed(
                        events.get(&id).unwrap_or_else(|| merged.into_entity()),
                    ))
                }
                Ok(deleted @ Deletion::Deleted { .. }) => {
                    crate::metrics::record_remote("delete_event", "success");
                    Ok(deleted)
                }
                Err(err) => {
                    warn!(error = %err, "event delete not confirmed");
                    crate::metrics::record_remote("delete_event", "error");
                    Err(err)
                }
            };
            crate::metrics::record_remote_latency("delete_event", remote_start.elapsed());
            pending.remove(&id);
            let _ = tx.send(outcome);
        });

        Ok(WriteOutcome { local, remote: handle })
    }
}
