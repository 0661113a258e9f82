//! # Stream Cache
//!
//! A local supervisor / cache-coherence engine: an in-process authoritative
//! store for a hierarchical forest of categorizing streams and a flat
//! collection of timestamped events, reconciled against a remote
//! authoritative source through an asynchronous CRUD protocol.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        CacheManager                         │
//! │  • Reads: local answer now, post-merge answer on sync      │
//! │  • Writes: optimistic local apply, remote confirm via      │
//! │    SyncHandle; no rollback on remote failure               │
//! │  • Adaptive scope, lastSynced high-water mark              │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                       │
//!          ▼                  ▼                       ▼
//! ┌─────────────────┐ ┌─────────────────┐ ┌─────────────────────┐
//! │   StreamStore   │ │    EventStore   │ │    RemoteSource     │
//! │  forest + flat  │ │  id-keyed map,  │ │  (collaborator)     │
//! │  index, cycle   │ │  LWW merge,     │ │  async CRUD+fetch,  │
//! │  prevention,    │ │  two-stage      │ │  server time        │
//! │  root recompute │ │  delete         │ └─────────────────────┘
//! └─────────────────┘ └─────────────────┘ ┌─────────────────────┐
//!          │                  │           │    CacheBackend     │
//!          └── Filter engine ──┘           │  (collaborator)     │
//!              (pure predicates,          │  load / flush       │
//!               scope containment)        └─────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use stream_cache::{CacheConfig, CacheManager, Filter, MemoryRemote, Stream};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), stream_cache::CacheError> {
//!     let remote = Arc::new(MemoryRemote::new());
//!     let manager = CacheManager::new(CacheConfig::default(), remote);
//!     manager.start().await?;
//!
//!     // optimistic write: stored locally at once, confirmed asynchronously
//!     let write = manager
//!         .create_stream(Stream::new("health", "Health", None, "quickstart"))
//!         .await?;
//!     let confirmed = write.remote.outcome().await;
//!     println!("confirmed: {confirmed:?}");
//!
//!     // dual-answer read: local view now, post-merge view when synced
//!     let read = manager.get_events(Filter::default()).await;
//!     println!("local: {} events", read.local.len());
//!     let synced = read.remote.outcome().await;
//!     println!("synced: {:?} events", synced.map(|e| e.len()));
//!
//!     manager.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: the [`CacheManager`] orchestrating stores and remote
//! - [`store`]: the streams and events supervisors
//! - [`filter`]: the pure filter/predicate engine
//! - [`remote`]: the remote source collaborator contract
//! - [`backend`]: the durable cache backend collaborator contract

pub mod backend;
pub mod config;
pub mod coordinator;
pub mod event;
pub mod filter;
pub mod metrics;
pub mod remote;
pub mod store;
pub mod stream;

pub use backend::{BackendError, CacheBackend, CacheSnapshot, MemoryBackend};
pub use config::CacheConfig;
pub use coordinator::{
    CacheError, CacheManager, ManagerState, PendingKind, ReadOutcome, SyncHandle, WriteOutcome,
};
pub use event::{Attachment, Event};
pub use filter::{Filter, StateFilter};
pub use remote::{MemoryRemote, RemoteBatch, RemoteError, RemoteSource};
pub use store::{Deletion, EventStore, StoreError, StreamStore, UpsertOutcome};
pub use stream::Stream;

/// Epoch milliseconds, the timestamp unit throughout the crate.
pub type Timestamp = i64;

/// Current time as epoch milliseconds.
#[must_use]
pub fn now_millis() -> Timestamp {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_millis_is_recent() {
        let a = now_millis();
        let b = now_millis();
        assert!(a > 1_600_000_000_000); // after 2020
        assert!(b >= a);
    }
}
