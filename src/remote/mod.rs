//! Remote source collaborator contract.
//!
//! The remote source is the external authoritative data provider. The core
//! only sees the abstract [`RemoteSource`] trait: asynchronous CRUD + query
//! operations that report either a success payload with the server's time,
//! or an error. [`MemoryRemote`] is the in-process reference implementation
//! used by tests and demos.

pub mod memory;
pub mod traits;

pub use memory::MemoryRemote;
pub use traits::RemoteSource;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Timestamp;

/// Errors surfaced asynchronously by the remote source.
///
/// By the time a caller observes one of these, the optimistic local write
/// has already been applied; it is not rolled back.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote could not be reached at all
    #[error("remote unreachable: {0}")]
    Unreachable(String),
    /// The remote refused the request
    #[error("remote rejected request: {message}")]
    Rejected {
        message: String,
        server_time: Option<Timestamp>,
    },
    /// The in-flight continuation was dropped before it reported back
    #[error("remote outcome abandoned before completion")]
    Abandoned,
}

/// A fetch response: the matching entities plus the server's reported time,
/// which advances the local `lastSynced` high-water mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteBatch<T> {
    pub items: Vec<T>,
    pub server_time: Timestamp,
}
