//! Durable cache backend collaborator contract.
//!
//! The backend is a pluggable persistence target the cache manager flushes
//! to on demand and rehydrates from at startup. The core prescribes neither
//! schema nor transport — only the [`CacheBackend`] trait and the snapshot
//! shape it exchanges.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::Event;
use crate::stream::Stream;
use crate::Timestamp;

/// Errors surfaced by the durable backend during load/flush.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend io error: {0}")]
    Io(String),
}

/// The full cache state exchanged with the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub streams: Vec<Stream>,
    pub events: Vec<Event>,
    /// The last-synced high-water mark at flush time (epoch millis)
    pub last_synced: Timestamp,
}

/// A pluggable persistence target for the cache manager.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Read the last flushed snapshot; an empty snapshot when none exists.
    async fn load(&self) -> Result<CacheSnapshot, BackendError>;
    /// Persist the given snapshot, replacing any previous one.
    async fn flush(&self, snapshot: &CacheSnapshot) -> Result<(), BackendError>;
}

/// In-memory [`CacheBackend`] for tests and demos.
#[derive(Default)]
pub struct MemoryBackend {
    snapshot: Mutex<Option<CacheSnapshot>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a snapshot has been flushed yet.
    #[must_use]
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.lock().is_some()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn load(&self) -> Result<CacheSnapshot, BackendError> {
        Ok(self.snapshot.lock().clone().unwrap_or_default())
    }

    async fn flush(&self, snapshot: &CacheSnapshot) -> Result<(), BackendError> {
        *self.snapshot.lock() = Some(snapshot.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_empty() {
        let backend = MemoryBackend::new();
        assert!(!backend.has_snapshot());
        let snapshot = backend.load().await.unwrap();
        assert!(snapshot.streams.is_empty());
        assert!(snapshot.events.is_empty());
        assert_eq!(snapshot.last_synced, 0);
    }

    #[tokio::test]
    async fn test_flush_then_load() {
        let backend = MemoryBackend::new();
        let snapshot = CacheSnapshot {
            streams: vec![Stream::new("s", "S", None, "tester")],
            events: vec![Event::new("e", "s", "note/txt", "tester")],
            last_synced: 99,
        };
        backend.flush(&snapshot).await.unwrap();
        assert!(backend.has_snapshot());

        let loaded = backend.load().await.unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn test_flush_replaces() {
        let backend = MemoryBackend::new();
        backend
            .flush(&CacheSnapshot {
                last_synced: 1,
                ..Default::default()
            })
            .await
            .unwrap();
        backend
            .flush(&CacheSnapshot {
                last_synced: 2,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(backend.load().await.unwrap().last_synced, 2);
    }
}
