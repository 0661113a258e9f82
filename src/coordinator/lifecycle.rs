//! Manager lifecycle: start, flush, shutdown.

use std::sync::atomic::Ordering;
use std::time::Instant;

use tracing::{error, info};

use super::types::{CacheError, ManagerState};
use super::CacheManager;
use crate::backend::CacheSnapshot;

impl CacheManager {
    /// Start the manager: rehydrate both stores from the durable backend
    /// (when one is attached) and transition to `Ready`.
    ///
    /// The snapshot is merged through the timestamp-gated upserts, so a
    /// stale snapshot never clobbers newer in-memory state.
    #[tracing::instrument(skip(self))]
    pub async fn start(&self) -> Result<(), CacheError> {
        let _ = self.state.send(ManagerState::Loading);
        info!("starting cache manager");

        if let Some(backend) = &self.backend {
            let phase_start = Instant::now();
            let snapshot = match backend.load().await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    error!(error = %err, "backend load failed");
                    return Err(err.into());
                }
            };
            let stream_count = snapshot.streams.len();
            let event_count = snapshot.events.len();
            for stream in snapshot.streams {
                self.streams.upsert(stream);
            }
            for event in snapshot.events {
                self.events.upsert(event);
            }
            self.last_synced
                .fetch_max(snapshot.last_synced, Ordering::AcqRel);
            crate::metrics::record_lifecycle_phase("load", phase_start.elapsed());
            info!(
                streams = stream_count,
                events = event_count,
                "cache rehydrated from backend"
            );
        }

        self.update_gauge_metrics();
        let _ = self.state.send(ManagerState::Ready);
        info!("cache manager ready");
        Ok(())
    }

    /// The current cache state as a flushable snapshot.
    #[must_use]
    pub fn snapshot(&self) -> CacheSnapshot {
        CacheSnapshot {
            streams: self.streams.all(),
            events: self.events.all(),
            last_synced: self.last_synced.load(Ordering::Acquire),
        }
    }

    /// Flush both stores to the durable backend. A no-op without one.
    #[tracing::instrument(skip(self))]
    pub async fn flush(&self) -> Result<(), CacheError> {
        let Some(backend) = &self.backend else {
            return Ok(());
        };
        let phase_start = Instant::now();
        let previous = self.state();
        let _ = self.state.send(ManagerState::Flushing);

        let snapshot = self.snapshot();
        let result = backend.flush(&snapshot).await;
        let _ = self.state.send(previous);

        match result {
            Ok(()) => {
                crate::metrics::record_lifecycle_phase("flush", phase_start.elapsed());
                info!(
                    streams = snapshot.streams.len(),
                    events = snapshot.events.len(),
                    "cache flushed to backend"
                );
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "backend flush failed");
                Err(err.into())
            }
        }
    }

    /// Shut down: flush when configured, then transition to `ShutDown`.
    ///
    /// A flush failure is logged, not returned — shutdown always
    /// completes.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let phase_start = Instant::now();
        info!("shutting down cache manager");

        if self.config.flush_on_shutdown && self.backend.is_some() {
            if let Err(err) = self.flush().await {
                error!(error = %err, "flush during shutdown failed");
            }
        }

        let _ = self.state.send(ManagerState::ShutDown);
        crate::metrics::record_lifecycle_phase("shutdown", phase_start.elapsed());
        info!("cache manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::{CacheBackend, MemoryBackend};
    use crate::config::CacheConfig;
    use crate::event::Event;
    use crate::remote::MemoryRemote;
    use crate::stream::Stream;

    fn manager_with_backend(backend: Arc<MemoryBackend>) -> CacheManager {
        CacheManager::new(CacheConfig::default(), Arc::new(MemoryRemote::new()))
            .with_backend(backend)
    }

    #[tokio::test]
    async fn test_start_without_backend() {
        let manager = CacheManager::new(CacheConfig::default(), Arc::new(MemoryRemote::new()));
        manager.start().await.unwrap();
        assert_eq!(manager.state(), ManagerState::Ready);
        assert!(manager.is_ready());
    }

    #[tokio::test]
    async fn test_flush_then_reload() {
        let backend = Arc::new(MemoryBackend::new());

        let first = manager_with_backend(Arc::clone(&backend));
        first.start().await.unwrap();
        first
            .streams
            .insert(Stream::new("s", "S", None, "tester"))
            .unwrap();
        first
            .events
            .insert(Event::new("e", "s", "note/txt", "tester"))
            .unwrap();
        first.last_synced.store(42, Ordering::Release);
        first.flush().await.unwrap();
        assert!(backend.has_snapshot());

        let second = manager_with_backend(backend);
        second.start().await.unwrap();
        assert!(second.streams.contains("s"));
        assert!(second.events.contains("e"));
        assert_eq!(second.last_synced(), 42);
    }

    #[tokio::test]
    async fn test_rehydration_is_timestamp_gated() {
        let backend = Arc::new(MemoryBackend::new());

        let first = manager_with_backend(Arc::clone(&backend));
        first
            .streams
            .insert(Stream::new("s", "Stale name", None, "tester"))
            .unwrap();
        first.flush().await.unwrap();

        // a newer in-memory copy must survive the reload
        let second = manager_with_backend(backend);
        let mut newer = Stream::new("s", "Newer name", None, "tester");
        newer.modified += 10_000;
        second.streams.insert(newer).unwrap();
        second.start().await.unwrap();

        assert_eq!(second.streams.get("s").unwrap().name, "Newer name");
    }

    #[tokio::test]
    async fn test_shutdown_flushes_when_configured() {
        let backend = Arc::new(MemoryBackend::new());
        let manager = manager_with_backend(Arc::clone(&backend));
        manager.start().await.unwrap();
        manager
            .streams
            .insert(Stream::new("s", "S", None, "tester"))
            .unwrap();

        manager.shutdown().await;

        assert_eq!(manager.state(), ManagerState::ShutDown);
        assert!(backend.has_snapshot());
        assert_eq!(backend.load().await.unwrap().streams.len(), 1);
    }

    #[tokio::test]
    async fn test_shutdown_without_flush() {
        let backend = Arc::new(MemoryBackend::new());
        let config = CacheConfig {
            flush_on_shutdown: false,
            ..Default::default()
        };
        let backend_dyn: Arc<dyn CacheBackend> = backend.clone();
        let manager =
            CacheManager::new(config, Arc::new(MemoryRemote::new())).with_backend(backend_dyn);
        manager.start().await.unwrap();

        manager.shutdown().await;

        assert_eq!(manager.state(), ManagerState::ShutDown);
        assert!(!backend.has_snapshot());
    }
}
