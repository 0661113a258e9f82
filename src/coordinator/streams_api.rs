// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Stream read/write orchestration.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};
use uuid::Uuid;

use super::types::{CacheError, PendingKind, ReadOutcome, SyncHandle, WriteOutcome};
use super::CacheManager;
use crate::filter::Filter;
use crate::now_millis;
use crate::store::{Deletion, StoreError};
use crate::stream::Stream;

impl CacheManager {
    /// Query streams.
    ///
    /// Same dual-answer shape as [`get_events`](Self::get_events): the
    /// local answer is immediate, the remote half resolves with the
    /// post-merge local view.
    #[tracing::instrument(skip(self, filter))]
    pub async fn get_streams(&self, filter: Filter) -> ReadOutcome<Vec<Stream>> {
        let start = Instant::now();
        self.ensure_scope(&filter);

        let local = self.streams.query(&filter);
        crate::metrics::record_operation("streams", "query", "success");
        crate::metrics::record_latency("streams", "query", start.elapsed());

        let (tx, handle) = SyncHandle::pair();
        let streams = Arc::clone(&self.streams);
        let remote = Arc::clone(&self.remote);
        let last_synced = Arc::clone(&self.last_synced);
        tokio::spawn(async move {
            let remote_start = Instant::now();
            let outcome = match remote.fetch_streams(&filter).await {
                Ok(batch) => {
                    crate::metrics::record_remote("fetch_streams", "success");
                    for stream in batch.items {
                        let merged = streams.upsert(stream);
                        crate::metrics::record_merge("streams", merged.label());
                    }
                    last_synced.fetch_max(batch.server_time, Ordering::AcqRel);
                    crate::metrics::set_last_synced(last_synced.load(Ordering::Acquire));
                    Ok(streams.query(&filter))
                }
                Err(err) => {
                    warn!(error = %err, "stream fetch failed, local answer stands");
                    crate::metrics::record_remote("fetch_streams", "error");
                    Err(err)
                }
            };
            crate::metrics::record_remote_latency("fetch_streams", remote_start.elapsed());
            let _ = tx.send(outcome);
        });

        ReadOutcome { local, remote: handle }
    }

    /// Create a stream.
    ///
    /// The id is generated when absent; attribution stamps come from the
    /// configured writer. A duplicate id fails synchronously and nothing
    /// reaches the remote.
    #[tracing::instrument(skip(self, stream), fields(stream_id))]
    pub async fn create_stream(
        &self,
        mut stream: Stream,
    ) -> Result<WriteOutcome<Stream>, CacheError> {
        if stream.id.is_empty() {
            stream.id = Uuid::new_v4().simple().to_string();
        }
        tracing::Span::current().record("stream_id", stream.id.as_str());

        let now = now_millis();
        stream.created = now;
        stream.created_by = self.config.writer_id.clone();
        stream.modified = now;
        stream.modified_by = self.config.writer_id.clone();

        let local = match self.streams.insert(stream) {
            Ok(stored) => stored,
            Err(err) => {
                crate::metrics::record_operation("streams", "create", "duplicate");
                return Err(err.into());
            }
        };
        crate::metrics::record_operation("streams", "create", "success");
        debug!("stream created locally, forwarding to remote");

        let (tx, handle) = SyncHandle::pair();
        let streams = Arc::clone(&self.streams);
        let remote = Arc::clone(&self.remote);
        let pending = Arc::clone(&self.pending);
        let id = local.id.clone();
        let submitted = local.clone();
        pending.insert(id.clone(), PendingKind::Create);
        tokio::spawn(async move {
            let remote_start = Instant::now();
            let outcome = match remote.create_stream(&submitted).await {
                Ok(confirmed) => {
                    crate::metrics::record_remote("create_stream", "success");
                    let merged = streams.upsert(confirmed);
                    crate::metrics::record_merge("streams", merged.label());
                    Ok(streams.get(&id).unwrap_or_else(|| merged.into_entity()))
                }
                Err(err) => {
                    // the optimistic local write stays in place
                    warn!(error = %err, "stream create not confirmed");
                    crate::metrics::record_remote("create_stream", "error");
                    Err(err)
                }
            };
            crate::metrics::record_remote_latency("create_stream", remote_start.elapsed());
            pending.remove(&id);
            let _ = tx.send(outcome);
        });

        Ok(WriteOutcome { local, remote: handle })
    }

    /// Update a stream.
    ///
    /// An unknown id fails synchronously. A parent change that would make
    /// the stream its own transitive descendant is rejected as
    /// [`StoreError::Cycle`] before anything mutates, and is never
    /// forwarded to the remote.
    #[tracing::instrument(skip(self, stream), fields(stream_id = %stream.id))]
    pub async fn update_stream(
        &self,
        mut stream: Stream,
    ) -> Result<WriteOutcome<Stream>, CacheError> {
        let Some(existing) = self.streams.get(&stream.id) else {
            crate::metrics::record_operation("streams", "update", "not_found");
            return Err(StoreError::NotFound(stream.id).into());
        };

        if stream.parent_id != existing.parent_id {
            if let Some(new_parent) = &stream.parent_id {
                if self.streams.has_descendant(&stream.id, new_parent) {
                    crate::metrics::record_operation("streams", "update", "cycle");
                    return Err(StoreError::Cycle {
                        parent: new_parent.clone(),
                        child: stream.id,
                    }
                    .into());
                }
            }
        }
        stream.touch(&self.config.writer_id);

        let merged = self.streams.upsert(stream);
        crate::metrics::record_operation("streams", "update", merged.label());
        let local = merged.into_entity();

        let (tx, handle) = SyncHandle::pair();
        let streams = Arc::clone(&self.streams);
        let remote = Arc::clone(&self.remote);
        let pending = Arc::clone(&self.pending);
        let id = local.id.clone();
        let submitted = local.clone();
        pending.insert(id.clone(), PendingKind::Update);
        tokio::spawn(async move {
            let remote_start = Instant::now();
            let outcome = match remote.update_stream(&id, &submitted).await {
                Ok(confirmed) => {
                    crate::metrics::record_remote("update_stream", "success");
                    let merged = streams.upsert(confirmed);
                    crate::metrics::record_merge("streams", merged.label());
                    Ok(streams.get(&id).unwrap_or_else(|| merged.into_entity()))
                }
                Err(err) => {
                    warn!(error = %err, "stream update not confirmed");
                    crate::metrics::record_remote("update_stream", "error");
                    Err(err)
                }
            };
            crate::metrics::record_remote_latency("update_stream", remote_start.elapsed());
            pending.remove(&id);
            let _ = tx.send(outcome);
        });

        Ok(WriteOutcome { local, remote: handle })
    }

    /// Delete a stream: one step of the two-stage machine, locally then
    /// remotely. The hard stage cascades per `merge_with_parent` — child
    /// streams and events re-point to the former parent when requested.
    #[tracing::instrument(skip(self), fields(stream_id = %id))]
    pub async fn delete_stream(
        &self,
        id: &str,
        merge_with_parent: bool,
    ) -> Result<WriteOutcome<Deletion<Stream>>, CacheError> {
        let local = match self.streams.delete(id, merge_with_parent, &self.events) {
            Ok(deletion) => deletion,
            Err(err) => {
                crate::metrics::record_operation("streams", "delete", "not_found");
                return Err(err.into());
            }
        };
        crate::metrics::record_operation(
            "streams",
            "delete",
            if local.is_hard() { "hard" } else { "soft" },
        );

        let (tx, handle) = SyncHandle::pair();
        let streams = Arc::clone(&self.streams);
        let remote = Arc::clone(&self.remote);
        let pending = Arc::clone(&self.pending);
        let id = id.to_string();
        pending.insert(id.clone(), PendingKind::Delete);
        tokio::spawn(async move {
            let remote_start = Instant::now();
            let outcome = match remote.delete_stream(&id, merge_with_parent).await {
                Ok(Deletion::Trashed(confirmed)) => {
                    crate::metrics::record_remote("delete_stream", "success");
                    let merged = streams.upsert(confirmed);
                    crate::metrics::record_merge("streams", merged.label());
                    Ok(Deletion::Trashed(
                        streams.get(&id).unwrap_or_else(|| merged.into_entity()),
                    ))
                }
                Ok(deleted @ Deletion::Deleted { .. }) => {
                    crate::metrics::record_remote("delete_stream", "success");
                    Ok(deleted)
                }
                Err(err) => {
                    warn!(error = %err, "stream delete not confirmed");
                    crate::metrics::record_remote("delete_stream", "error");
                    Err(err)
                }
            };
            crate::metrics::record_remote_latency("delete_stream", remote_start.elapsed());
            pending.remove(&id);
            let _ = tx.send(outcome);
        });

        Ok(WriteOutcome { local, remote: handle })
    }
}
