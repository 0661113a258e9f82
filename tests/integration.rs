//! Integration tests for the cache manager.
//!
//! All scenarios run against the in-process [`MemoryRemote`], which
//! implements the full remote contract including server stamping and the
//! two-call delete pattern.
//!
//! # Test Organization
//! - `happy_*` - normal operation: dual-answer reads, optimistic writes,
//!   the two-stage delete cascade, scope widening, lifecycle
//! - `failure_*` - failure scenarios: unreachable remote, local invariant
//!   violations that never reach the remote

use std::sync::Arc;

use stream_cache::{
    CacheBackend, CacheConfig, CacheError, CacheManager, Deletion, Event, Filter, ManagerState,
    MemoryBackend,
    MemoryRemote, StateFilter, StoreError, Stream,
};

fn manager_over(remote: Arc<MemoryRemote>) -> CacheManager {
    CacheManager::new(CacheConfig::default(), remote)
}

fn timed_event(id: &str, stream: &str, time: i64) -> Event {
    let mut event = Event::new(id, stream, "note/txt", "test");
    event.time = Some(time);
    event
}

// =============================================================================
// Happy Path Tests - Normal Operation
// =============================================================================

/// The worked two-stage delete example: root R, child C, event e1 under C.
#[tokio::test]
async fn happy_two_stage_delete_with_cascade() {
    let remote = Arc::new(MemoryRemote::new());
    let manager = manager_over(Arc::clone(&remote));
    manager.start().await.unwrap();

    manager
        .create_stream(Stream::new("r", "R", None, "test"))
        .await
        .unwrap()
        .remote
        .outcome()
        .await
        .unwrap();
    manager
        .create_stream(Stream::new("c", "C", Some("r".into()), "test"))
        .await
        .unwrap()
        .remote
        .outcome()
        .await
        .unwrap();
    manager
        .create_event(timed_event("e1", "c", 100))
        .await
        .unwrap()
        .remote
        .outcome()
        .await
        .unwrap();

    // query with state=ALL returns e1
    let read = manager
        .get_events(Filter::default().with_state(StateFilter::All))
        .await;
    assert_eq!(read.local.len(), 1);
    assert_eq!(read.local[0].id, "e1");
    read.remote.outcome().await.unwrap();

    // first delete: C trashed, e1 unaffected, R.children = {C}
    let first = manager.delete_stream("c", true).await.unwrap();
    assert!(matches!(first.local, Deletion::Trashed(_)));
    first.remote.outcome().await.unwrap();

    let c = manager.streams().get("c").unwrap();
    assert!(c.trashed);
    assert_eq!(manager.events().get("e1").unwrap().stream_id, "c");
    assert_eq!(
        manager.streams().get("r").unwrap().children,
        Some(["c".to_string()].into())
    );

    // second delete with mergeWithParent: C absent, R.children cleared to
    // absent (not empty set), e1 re-pointed to R
    let second = manager.delete_stream("c", true).await.unwrap();
    assert!(second.local.is_hard());
    second.remote.outcome().await.unwrap();

    assert!(manager.streams().get("c").is_none());
    assert_eq!(manager.streams().get("r").unwrap().children, None);
    assert_eq!(manager.events().get("e1").unwrap().stream_id, "r");
    // the remote applied the same cascade
    assert!(remote.stream("c").is_none());
    assert_eq!(remote.event("e1").unwrap().stream_id, "r");
}

#[tokio::test]
async fn happy_read_merges_remote_into_local() {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed_stream(Stream::new("s", "S", None, "server"));
    remote.seed_event(timed_event("e1", "s", 10));
    remote.seed_event(timed_event("e2", "s", 20));

    let manager = manager_over(remote);
    manager.start().await.unwrap();

    let read = manager.get_events(Filter::default()).await;
    // nothing cached yet
    assert!(read.local.is_empty());

    let synced = read.remote.outcome().await.unwrap();
    assert_eq!(synced.len(), 2);
    // the merge landed in the local store
    assert_eq!(manager.events().len(), 2);
    assert!(manager.last_synced() > 0);
}

/// The caller's network answer is the post-merge local view, never the raw
/// remote payload.
#[tokio::test]
async fn happy_remote_answer_is_post_merge_local_view() {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed_event(timed_event("remote-only", "s", 10));

    let manager = manager_over(remote);
    manager.start().await.unwrap();
    // locally cached, unknown to the remote
    manager
        .events()
        .insert(timed_event("local-only", "s", 20))
        .unwrap();

    let read = manager.get_events(Filter::default()).await;
    let synced = read.remote.outcome().await.unwrap();

    let ids: Vec<&str> = synced.iter().map(|e| e.id.as_str()).collect();
    assert!(ids.contains(&"remote-only"));
    assert!(ids.contains(&"local-only"));
}

#[tokio::test]
async fn happy_write_reconciles_server_stamp() {
    let remote = Arc::new(MemoryRemote::new());
    let manager = manager_over(Arc::clone(&remote));
    manager.start().await.unwrap();

    let write = manager
        .create_event(timed_event("e1", "s", 10))
        .await
        .unwrap();
    let local_stamp = write.local.modified;
    assert_eq!(write.local.modified_by, "local");

    let confirmed = write.remote.outcome().await.unwrap();
    // the server stamp is newer and has been merged back into the store
    assert!(confirmed.modified > local_stamp);
    assert_eq!(
        manager.events().get("e1").unwrap().modified,
        confirmed.modified
    );
    assert_eq!(remote.event_count(), 1);
}

#[tokio::test]
async fn happy_event_delete_two_stage_reaches_remote() {
    let remote = Arc::new(MemoryRemote::new());
    let manager = manager_over(Arc::clone(&remote));
    manager.start().await.unwrap();

    manager
        .create_event(timed_event("e1", "s", 10))
        .await
        .unwrap()
        .remote
        .outcome()
        .await
        .unwrap();

    let first = manager.delete_event("e1").await.unwrap();
    assert!(matches!(first.local, Deletion::Trashed(_)));
    let confirmed = first.remote.outcome().await.unwrap();
    assert!(matches!(confirmed, Deletion::Trashed(_)));
    assert!(remote.event("e1").unwrap().trashed);
    assert!(manager.events().get("e1").unwrap().trashed);

    let second = manager.delete_event("e1").await.unwrap();
    assert!(second.local.is_hard());
    let confirmed = second.remote.outcome().await.unwrap();
    assert!(confirmed.is_hard());
    assert!(manager.events().get("e1").is_none());
    assert_eq!(remote.event_count(), 0);
}

#[tokio::test]
async fn happy_scope_widens_instead_of_rejecting() {
    let remote = Arc::new(MemoryRemote::new());
    let config = CacheConfig {
        scope_streams: Some(vec!["work".into()]),
        ..Default::default()
    };
    let manager = CacheManager::new(config, remote);
    manager.start().await.unwrap();

    let read = manager
        .get_events(Filter::default().with_streams(["health"]))
        .await;
    read.remote.outcome().await.unwrap();

    // the out-of-scope id was recorded, not refused
    let scope = manager.scope();
    assert_eq!(
        scope.streams,
        Some(["work".to_string(), "health".to_string()].into())
    );
}

#[tokio::test]
async fn happy_stream_read_merges_hierarchy() {
    let remote = Arc::new(MemoryRemote::new());
    remote.seed_stream(Stream::new("r", "Root", None, "server"));
    remote.seed_stream(Stream::new("c", "Child", Some("r".into()), "server"));

    let manager = manager_over(remote);
    manager.start().await.unwrap();

    let read = manager.get_streams(Filter::default()).await;
    assert!(read.local.is_empty());
    let synced = read.remote.outcome().await.unwrap();
    assert_eq!(synced.len(), 2);

    // the merged forest carries the derived structure
    assert_eq!(
        manager.streams().get("r").unwrap().children,
        Some(["c".to_string()].into())
    );
    assert_eq!(manager.streams().roots().len(), 1);
}

#[tokio::test]
async fn happy_lifecycle_flush_and_reload() {
    let remote = Arc::new(MemoryRemote::new());
    let backend: Arc<dyn CacheBackend> = Arc::new(MemoryBackend::new());

    let first = manager_over(Arc::clone(&remote)).with_backend(Arc::clone(&backend));
    first.start().await.unwrap();
    first
        .create_event(timed_event("e1", "s", 10))
        .await
        .unwrap()
        .remote
        .outcome()
        .await
        .unwrap();
    first.shutdown().await;
    assert_eq!(first.state(), ManagerState::ShutDown);

    let second = manager_over(remote).with_backend(backend);
    second.start().await.unwrap();
    assert!(second.events().contains("e1"));
}

// =============================================================================
// Failure Scenarios
// =============================================================================

#[tokio::test]
async fn failure_unreachable_remote_keeps_optimistic_write() {
    let remote = Arc::new(MemoryRemote::new());
    let manager = manager_over(Arc::clone(&remote));
    manager.start().await.unwrap();
    remote.set_reachable(false);

    let write = manager
        .create_event(timed_event("e1", "s", 10))
        .await
        .unwrap();
    // local half succeeded
    assert_eq!(write.local.id, "e1");
    assert!(manager.events().contains("e1"));

    // remote half failed, and the local write was not rolled back
    let err = write.remote.outcome().await.unwrap_err();
    assert!(matches!(err, stream_cache::RemoteError::Unreachable(_)));
    assert!(manager.events().contains("e1"));
    assert_eq!(remote.event_count(), 0);
    assert_eq!(manager.pending_count(), 0);
}

#[tokio::test]
async fn failure_unreachable_remote_serves_local_read() {
    let remote = Arc::new(MemoryRemote::new());
    let manager = manager_over(Arc::clone(&remote));
    manager.start().await.unwrap();
    manager.events().insert(timed_event("e1", "s", 10)).unwrap();
    remote.set_reachable(false);

    let read = manager.get_events(Filter::default()).await;
    assert_eq!(read.local.len(), 1);
    assert!(read.remote.outcome().await.is_err());
    // the cached view is intact
    assert_eq!(manager.events().len(), 1);
}

#[tokio::test]
async fn failure_cycle_rejected_synchronously_never_forwarded() {
    let remote = Arc::new(MemoryRemote::new());
    let manager = manager_over(Arc::clone(&remote));
    manager.start().await.unwrap();

    for (id, parent) in [("r", None), ("a", Some("r")), ("b", Some("a"))] {
        manager
            .create_stream(Stream::new(id, id, parent.map(String::from), "test"))
            .await
            .unwrap()
            .remote
            .outcome()
            .await
            .unwrap();
    }

    // moving r under its own grandchild must fail before anything mutates
    let mut moved = manager.streams().get("r").unwrap();
    moved.parent_id = Some("b".into());
    let err = manager.update_stream(moved).await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::Store(StoreError::Cycle { .. })
    ));

    // neither side saw a change
    assert_eq!(manager.streams().get("r").unwrap().parent_id, None);
    assert_eq!(remote.stream("r").unwrap().parent_id, None);
}

#[tokio::test]
async fn failure_not_found_is_synchronous() {
    let remote = Arc::new(MemoryRemote::new());
    let manager = manager_over(remote);
    manager.start().await.unwrap();

    let err = manager.delete_event("ghost").await.unwrap_err();
    assert!(matches!(
        err,
        CacheError::Store(StoreError::NotFound(_))
    ));

    let err = manager
        .update_event(timed_event("ghost", "s", 1))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::Store(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn failure_duplicate_create_is_synchronous() {
    let remote = Arc::new(MemoryRemote::new());
    let manager = manager_over(Arc::clone(&remote));
    manager.start().await.unwrap();

    manager
        .create_event(timed_event("e1", "s", 10))
        .await
        .unwrap()
        .remote
        .outcome()
        .await
        .unwrap();

    let err = manager
        .create_event(timed_event("e1", "s", 20))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CacheError::Store(StoreError::Duplicate(_))
    ));
    // the remote saw exactly one create
    assert_eq!(remote.event_count(), 1);
}
