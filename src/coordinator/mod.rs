// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Cache manager: the sync coordinator.
//!
//! The [`CacheManager`] reconciles the local stores against the remote
//! source:
//! - **Reads** answer from the local store immediately and, concurrently,
//!   fetch from the remote, merge every returned entity through the
//!   timestamp-gated store upserts, and re-issue the local query — the
//!   caller's "network" answer is always the post-merge local view.
//! - **Writes** apply to the local store synchronously (optimistic) and
//!   forward to the remote; server-assigned fields merge back on success,
//!   and a remote failure never rolls the local write back.
//!
//! Local invariant violations (cycle, not-found, duplicate) surface
//! synchronously and are never forwarded to the remote.
//!
//! # Lifecycle
//!
//! ```text
//! Created → Loading → Ready → Flushing → ShutDown
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stream_cache::{CacheConfig, CacheManager, MemoryRemote, Stream};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), stream_cache::CacheError> {
//! let remote = Arc::new(MemoryRemote::new());
//! let manager = CacheManager::new(CacheConfig::default(), remote);
//! manager.start().await?;
//!
//! let outcome = manager
//!     .create_stream(Stream::new("work", "Work", None, "doc-example"))
//!     .await?;
//! println!("stored locally: {}", outcome.local.id);
//! let confirmed = outcome.remote.outcome().await;
//! println!("remote confirmed: {confirmed:?}");
//! # Ok(())
//! # }
//! ```

mod events_api;
mod lifecycle;
mod streams_api;
mod types;

pub use types::{
    CacheError, ManagerState, PendingKind, ReadOutcome, SyncHandle, WriteOutcome,
};

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::watch;
use tracing::debug;

use crate::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::filter::Filter;
use crate::remote::RemoteSource;
use crate::store::{EventStore, StreamStore};
use crate::Timestamp;

/// The sync coordinator over the two local stores and the remote source.
///
/// # Thread Safety
///
/// The manager is `Send + Sync` and designed for concurrent callers. Local
/// store operations are synchronous and atomic per store; the only
/// suspension point is the remote call, which runs in a spawned task and
/// never blocks the caller.
pub struct CacheManager {
    /// Injected configuration; no process-wide state
    pub(super) config: CacheConfig,

    /// Local streams supervisor
    pub(super) streams: Arc<StreamStore>,

    /// Local events supervisor
    pub(super) events: Arc<EventStore>,

    /// The external authoritative provider
    pub(super) remote: Arc<dyn RemoteSource>,

    /// Optional durable persistence target
    pub(super) backend: Option<Arc<dyn CacheBackend>>,

    /// Adaptive access scope; widens as queries name streams outside it
    pub(super) scope: RwLock<Filter>,

    /// High-water mark of the server's reported time (epoch millis)
    pub(super) last_synced: Arc<AtomicI64>,

    /// Writes awaiting remote confirmation, keyed by entity id
    pub(super) pending: Arc<DashMap<String, PendingKind>>,

    /// Manager state (broadcast to watchers)
    pub(super) state: watch::Sender<ManagerState>,

    /// State receiver (for internal use)
    pub(super) state_rx: watch::Receiver<ManagerState>,
}

impl CacheManager {
    /// Create a manager over the given remote source.
    ///
    /// The manager starts in `Created` state; call
    /// [`start()`](Self::start) to rehydrate from the backend (when one is
    /// attached) and transition to `Ready`.
    #[must_use]
    pub fn new(config: CacheConfig, remote: Arc<dyn RemoteSource>) -> Self {
        let (state_tx, state_rx) = watch::channel(ManagerState::Created);
        let scope = match &config.scope_streams {
            Some(ids) => Filter::default().with_streams(ids.iter().cloned()),
            None => Filter::default(),
        };
        Self {
            config,
            streams: Arc::new(StreamStore::new()),
            events: Arc::new(EventStore::new()),
            remote,
            backend: None,
            scope: RwLock::new(scope),
            last_synced: Arc::new(AtomicI64::new(0)),
            pending: Arc::new(DashMap::new()),
            state: state_tx,
            state_rx,
        }
    }

    /// Attach a durable backend for startup rehydration and flushing.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn CacheBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Get current manager state.
    #[must_use]
    pub fn state(&self) -> ManagerState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<ManagerState> {
        self.state_rx.clone()
    }

    /// Check if the manager is serving requests.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self.state(), ManagerState::Ready)
    }

    /// The local streams supervisor (the cached view).
    #[must_use]
    pub fn streams(&self) -> &Arc<StreamStore> {
        &self.streams
    }

    /// The local events supervisor (the cached view).
    #[must_use]
    pub fn events(&self) -> &Arc<EventStore> {
        &self.events
    }

    /// The current access scope.
    #[must_use]
    pub fn scope(&self) -> Filter {
        self.scope.read().clone()
    }

    /// The last-synced high-water mark (epoch millis, 0 before first sync).
    #[must_use]
    pub fn last_synced(&self) -> Timestamp {
        self.last_synced.load(Ordering::Acquire)
    }

    /// The pending remote confirmation for an entity, if any.
    #[must_use]
    pub fn pending(&self, id: &str) -> Option<PendingKind> {
        self.pending.get(id).map(|entry| *entry.value())
    }

    /// Number of writes awaiting remote confirmation.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Check a requested filter against the access scope; when it names
    /// streams outside the scope, widen the scope to record them. Scope is
    /// advisory and adaptive, never a hard boundary.
    pub(super) fn ensure_scope(&self, filter: &Filter) {
        let within = {
            let scope = self.scope.read();
            filter.is_included_in_scope(&scope, |scope_id, tested| {
                self.streams.has_descendant(scope_id, tested)
            })
        };
        if within {
            return;
        }

        let mut scope = self.scope.write();
        if scope.streams.is_none() {
            // unrestricted scope includes everything already
            return;
        }
        let Some(named) = &filter.streams else {
            // a wildcard request lifts the restriction entirely
            scope.streams = None;
            debug!("scope widened to unrestricted");
            crate::metrics::record_scope_widened(1);
            return;
        };
        let set = scope.streams.get_or_insert_with(BTreeSet::new);
        let mut added = 0;
        for id in named {
            if set.insert(id.clone()) {
                added += 1;
            }
        }
        if added > 0 {
            debug!(added, "scope widened with newly-seen streams");
            crate::metrics::record_scope_widened(added);
        }
    }

    /// Update all gauge metrics with the current manager state.
    pub fn update_gauge_metrics(&self) {
        crate::metrics::set_store_items("streams", self.streams.len());
        crate::metrics::set_store_items("events", self.events.len());
        crate::metrics::set_pending_writes(self.pending.len());
        crate::metrics::set_last_synced(self.last_synced());
    }
}
