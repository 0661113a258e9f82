//! Public types for the cache manager.

use thiserror::Error;
use tokio::sync::oneshot;

use crate::backend::BackendError;
use crate::remote::RemoteError;
use crate::store::StoreError;

/// Manager lifecycle state.
///
/// Broadcast via a watch channel; use
/// [`CacheManager::state()`](super::CacheManager::state) to check the
/// current state or
/// [`CacheManager::state_receiver()`](super::CacheManager::state_receiver)
/// to watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ManagerState {
    /// Just created, not yet started
    Created,
    /// Rehydrating the stores from the durable backend
    Loading,
    /// Serving reads and writes
    Ready,
    /// Flushing the stores to the durable backend
    Flushing,
    /// Shut down; no further operations expected
    ShutDown,
}

impl std::fmt::Display for ManagerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Created => write!(f, "Created"),
            Self::Loading => write!(f, "Loading"),
            Self::Ready => write!(f, "Ready"),
            Self::Flushing => write!(f, "Flushing"),
            Self::ShutDown => write!(f, "ShutDown"),
        }
    }
}

/// Kind of a local write awaiting remote confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingKind {
    Create,
    Update,
    Delete,
}

impl std::fmt::Display for PendingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "Create"),
            Self::Update => write!(f, "Update"),
            Self::Delete => write!(f, "Delete"),
        }
    }
}

/// Errors returned synchronously by the cache manager.
///
/// Remote errors never appear here — they travel through
/// [`SyncHandle::outcome`] after the local half has already succeeded.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CacheError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// The deferred remote half of an operation.
///
/// Resolves exactly once: with the reconciled post-merge local view on
/// remote success, or with the remote error while the local result stands.
#[derive(Debug)]
pub struct SyncHandle<T> {
    rx: oneshot::Receiver<Result<T, RemoteError>>,
}

impl<T> SyncHandle<T> {
    pub(crate) fn pair() -> (oneshot::Sender<Result<T, RemoteError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Wait for the remote half to settle.
    ///
    /// A dropped continuation (runtime torn down mid-flight) reports
    /// [`RemoteError::Abandoned`].
    pub async fn outcome(self) -> Result<T, RemoteError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(RemoteError::Abandoned),
        }
    }
}

/// A read served twice: the immediate local answer and the post-merge
/// authoritative answer once the remote fetch lands.
#[derive(Debug)]
pub struct ReadOutcome<T> {
    /// The local store's answer, available immediately
    pub local: T,
    /// The re-issued local query after merging the remote response
    pub remote: SyncHandle<T>,
}

/// An optimistic write: the local mutation already applied, plus the
/// reconciled entity once the remote confirms.
#[derive(Debug)]
pub struct WriteOutcome<T> {
    /// The entity as stored locally by the optimistic write
    pub local: T,
    /// The reconciled entity after merging server-assigned fields
    pub remote: SyncHandle<T>,
}
