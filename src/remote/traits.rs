use async_trait::async_trait;

use super::{RemoteBatch, RemoteError};
use crate::event::Event;
use crate::filter::Filter;
use crate::store::Deletion;
use crate::stream::Stream;

/// The external authoritative data provider.
///
/// All operations are asynchronous. Create operations assign the id and the
/// created/modified stamps when the submitted entity lacks them; every
/// success carries server-stamped fields the coordinator merges back into
/// the local stores. Delete follows the same two-call pattern as the local
/// stores: the first call returns the trashed entity, the second the bare
/// id signaling hard deletion.
#[async_trait]
pub trait RemoteSource: Send + Sync {
    async fn fetch_streams(&self, filter: &Filter) -> Result<RemoteBatch<Stream>, RemoteError>;
    async fn fetch_events(&self, filter: &Filter) -> Result<RemoteBatch<Event>, RemoteError>;

    async fn create_stream(&self, stream: &Stream) -> Result<Stream, RemoteError>;
    async fn update_stream(&self, id: &str, stream: &Stream) -> Result<Stream, RemoteError>;
    async fn delete_stream(
        &self,
        id: &str,
        merge_with_parent: bool,
    ) -> Result<Deletion<Stream>, RemoteError>;

    async fn create_event(&self, event: &Event) -> Result<Event, RemoteError>;
    async fn update_event(&self, id: &str, event: &Event) -> Result<Event, RemoteError>;
    async fn delete_event(&self, id: &str) -> Result<Deletion<Event>, RemoteError>;
}
