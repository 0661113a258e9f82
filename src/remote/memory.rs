//! In-process remote source.
//!
//! [`MemoryRemote`] implements the full [`RemoteSource`] contract against
//! two in-memory maps: filters on fetch, server-assigned ids and stamps on
//! create, the two-call delete pattern, and the merge-with-parent cascade.
//! A reachability toggle turns every call into
//! [`RemoteError::Unreachable`] for failure-path tests.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use uuid::Uuid;

use super::traits::RemoteSource;
use super::{RemoteBatch, RemoteError};
use crate::event::Event;
use crate::filter::{Filter, StateFilter};
use crate::now_millis;
use crate::store::Deletion;
use crate::stream::Stream;

/// An in-memory [`RemoteSource`] for tests and demos.
pub struct MemoryRemote {
    streams: RwLock<HashMap<String, Stream>>,
    events: RwLock<HashMap<String, Event>>,
    reachable: AtomicBool,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self {
            streams: RwLock::new(HashMap::new()),
            events: RwLock::new(HashMap::new()),
            reachable: AtomicBool::new(true),
        }
    }

    /// Toggle reachability; when false every call fails with
    /// [`RemoteError::Unreachable`].
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::Release);
    }

    /// Seed an entity directly, bypassing server stamping.
    pub fn seed_stream(&self, stream: Stream) {
        self.streams.write().insert(stream.id.clone(), stream);
    }

    /// Seed an entity directly, bypassing server stamping.
    pub fn seed_event(&self, event: Event) {
        self.events.write().insert(event.id.clone(), event);
    }

    #[must_use]
    pub fn stream(&self, id: &str) -> Option<Stream> {
        self.streams.read().get(id).cloned()
    }

    #[must_use]
    pub fn event(&self, id: &str) -> Option<Event> {
        self.events.read().get(id).cloned()
    }

    #[must_use]
    pub fn stream_count(&self) -> usize {
        self.streams.read().len()
    }

    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.read().len()
    }

    fn guard(&self) -> Result<(), RemoteError> {
        if self.reachable.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(RemoteError::Unreachable("remote offline".to_string()))
        }
    }

    /// Server stamp strictly newer than the submitted one.
    fn stamp_after(submitted: i64) -> i64 {
        now_millis().max(submitted + 1)
    }

    /// Named ids plus their transitive descendants over this side's map.
    fn expand(streams: &HashMap<String, Stream>, named: &BTreeSet<String>) -> BTreeSet<String> {
        let mut children_of: HashMap<&str, Vec<&str>> = HashMap::new();
        for stream in streams.values() {
            if let Some(parent) = stream.parent_id.as_deref() {
                children_of.entry(parent).or_default().push(&stream.id);
            }
        }
        let mut out = BTreeSet::new();
        let mut stack: Vec<&str> = named.iter().map(String::as_str).collect();
        let mut visited: HashSet<&str> = HashSet::new();
        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            out.insert(current.to_string());
            if let Some(children) = children_of.get(current) {
                stack.extend(children);
            }
        }
        out
    }

    fn unknown(kind: &str, id: &str) -> RemoteError {
        RemoteError::Rejected {
            message: format!("unknown {kind}: {id}"),
            server_time: Some(now_millis()),
        }
    }
}

#[async_trait]
impl RemoteSource for MemoryRemote {
    async fn fetch_streams(&self, filter: &Filter) -> Result<RemoteBatch<Stream>, RemoteError> {
        self.guard()?;
        let streams = self.streams.read();
        let expanded = filter
            .streams
            .as_ref()
            .map(|named| Self::expand(&streams, named));

        let mut items: Vec<Stream> = streams
            .values()
            .filter(|s| match &filter.parent_id {
                None => true,
                Some(None) => s.parent_id.is_none(),
                Some(Some(parent)) => s.parent_id.as_deref() == Some(parent.as_str()),
            })
            .filter(|s| match filter.state {
                StateFilter::Default => !s.trashed,
                StateFilter::Trashed => s.trashed,
                StateFilter::All => true,
            })
            .filter(|s| filter.modified_since.map_or(true, |since| s.modified >= since))
            .filter(|s| {
                expanded
                    .as_ref()
                    .map_or(true, |eligible| eligible.contains(&s.id))
            })
            .cloned()
            .collect();
        drop(streams);
        items.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(RemoteBatch {
            items,
            server_time: now_millis(),
        })
    }

    async fn fetch_events(&self, filter: &Filter) -> Result<RemoteBatch<Event>, RemoteError> {
        self.guard()?;
        let expanded = filter
            .streams
            .as_ref()
            .map(|named| Self::expand(&self.streams.read(), named));

        let mut items: Vec<Event> = self
            .events
            .read()
            .values()
            .filter(|e| filter.matches(e, expanded.as_ref()))
            .cloned()
            .collect();
        if filter.sort_ascending {
            items.sort_by_key(|e| e.time.unwrap_or(i64::MAX));
        } else {
            items.sort_by_key(|e| std::cmp::Reverse(e.time.unwrap_or(i64::MAX)));
        }

        Ok(RemoteBatch {
            items,
            server_time: now_millis(),
        })
    }

    async fn create_stream(&self, stream: &Stream) -> Result<Stream, RemoteError> {
        self.guard()?;
        let mut confirmed = stream.clone();
        if confirmed.id.is_empty() {
            confirmed.id = Uuid::new_v4().simple().to_string();
        }
        confirmed.modified = Self::stamp_after(stream.modified);
        if confirmed.created == 0 {
            confirmed.created = confirmed.modified;
        }
        self.streams
            .write()
            .insert(confirmed.id.clone(), confirmed.clone());
        Ok(confirmed)
    }

    async fn update_stream(&self, id: &str, stream: &Stream) -> Result<Stream, RemoteError> {
        self.guard()?;
        let mut streams = self.streams.write();
        let Some(existing) = streams.get_mut(id) else {
            return Err(Self::unknown("stream", id));
        };
        existing.merge_from(stream);
        existing.modified = Self::stamp_after(stream.modified);
        Ok(existing.clone())
    }

    async fn delete_stream(
        &self,
        id: &str,
        merge_with_parent: bool,
    ) -> Result<Deletion<Stream>, RemoteError> {
        self.guard()?;
        let mut streams = self.streams.write();
        let Some(existing) = streams.get_mut(id) else {
            return Err(Self::unknown("stream", id));
        };

        if !existing.trashed {
            existing.trashed = true;
            existing.modified = Self::stamp_after(existing.modified);
            return Ok(Deletion::Trashed(existing.clone()));
        }

        let parent = existing.parent_id.clone();
        streams.remove(id);
        if merge_with_parent {
            if let Some(parent_id) = parent {
                for stream in streams.values_mut() {
                    if stream.parent_id.as_deref() == Some(id) {
                        stream.parent_id = Some(parent_id.clone());
                    }
                }
                drop(streams);
                for event in self.events.write().values_mut() {
                    if event.stream_id == id {
                        event.stream_id = parent_id.clone();
                    }
                }
            }
        }
        Ok(Deletion::Deleted { id: id.to_string() })
    }

    async fn create_event(&self, event: &Event) -> Result<Event, RemoteError> {
        self.guard()?;
        let mut confirmed = event.clone();
        if confirmed.id.is_empty() {
            confirmed.id = Uuid::new_v4().simple().to_string();
        }
        confirmed.modified = Self::stamp_after(event.modified);
        if confirmed.created == 0 {
            confirmed.created = confirmed.modified;
        }
        self.events
            .write()
            .insert(confirmed.id.clone(), confirmed.clone());
        Ok(confirmed)
    }

    async fn update_event(&self, id: &str, event: &Event) -> Result<Event, RemoteError> {
        self.guard()?;
        let mut events = self.events.write();
        let Some(existing) = events.get_mut(id) else {
            return Err(Self::unknown("event", id));
        };
        existing.merge_from(event);
        existing.modified = Self::stamp_after(event.modified);
        Ok(existing.clone())
    }

    async fn delete_event(&self, id: &str) -> Result<Deletion<Event>, RemoteError> {
        self.guard()?;
        let mut events = self.events.write();
        let Some(existing) = events.get_mut(id) else {
            return Err(Self::unknown("event", id));
        };
        if !existing.trashed {
            existing.trashed = true;
            existing.modified = Self::stamp_after(existing.modified);
            return Ok(Deletion::Trashed(existing.clone()));
        }
        events.remove(id);
        Ok(Deletion::Deleted { id: id.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed_event(id: &str, stream: &str, time: i64) -> Event {
        let mut event = Event::new(id, stream, "note/txt", "tester");
        event.time = Some(time);
        event
    }

    #[tokio::test]
    async fn test_create_assigns_id_when_absent() {
        let remote = MemoryRemote::new();
        let mut draft = Event::new("", "s", "note/txt", "tester");
        draft.created = 0;
        let confirmed = remote.create_event(&draft).await.unwrap();
        assert!(!confirmed.id.is_empty());
        assert!(confirmed.created > 0);
        assert_eq!(remote.event_count(), 1);
    }

    #[tokio::test]
    async fn test_create_confirmation_is_newer() {
        let remote = MemoryRemote::new();
        let draft = timed_event("e1", "s", 1);
        let confirmed = remote.create_event(&draft).await.unwrap();
        assert!(confirmed.modified > draft.modified);
    }

    #[tokio::test]
    async fn test_update_unknown_rejected() {
        let remote = MemoryRemote::new();
        let event = timed_event("ghost", "s", 1);
        let err = remote.update_event("ghost", &event).await.unwrap_err();
        assert!(matches!(err, RemoteError::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_two_call_delete_pattern() {
        let remote = MemoryRemote::new();
        remote.seed_event(timed_event("e1", "s", 1));

        let first = remote.delete_event("e1").await.unwrap();
        assert!(matches!(first, Deletion::Trashed(_)));

        let second = remote.delete_event("e1").await.unwrap();
        assert!(second.is_hard());
        assert_eq!(remote.event_count(), 0);
    }

    #[tokio::test]
    async fn test_delete_stream_cascade() {
        let remote = MemoryRemote::new();
        remote.seed_stream(Stream::new("r", "Root", None, "srv"));
        let mut mid = Stream::new("mid", "Mid", Some("r".into()), "srv");
        mid.trashed = true;
        remote.seed_stream(mid);
        remote.seed_stream(Stream::new("leaf", "Leaf", Some("mid".into()), "srv"));
        remote.seed_event(timed_event("e1", "mid", 1));

        let outcome = remote.delete_stream("mid", true).await.unwrap();
        assert!(outcome.is_hard());
        assert_eq!(
            remote.stream("leaf").unwrap().parent_id.as_deref(),
            Some("r")
        );
        assert_eq!(remote.event("e1").unwrap().stream_id, "r");
    }

    #[tokio::test]
    async fn test_fetch_events_scoped() {
        let remote = MemoryRemote::new();
        remote.seed_stream(Stream::new("r", "Root", None, "srv"));
        remote.seed_stream(Stream::new("c", "Child", Some("r".into()), "srv"));
        remote.seed_event(timed_event("in", "c", 1));
        remote.seed_event(timed_event("out", "x", 2));

        let batch = remote
            .fetch_events(&Filter::default().with_streams(["r"]))
            .await
            .unwrap();
        assert_eq!(batch.items.len(), 1);
        assert_eq!(batch.items[0].id, "in");
        assert!(batch.server_time > 0);
    }

    #[tokio::test]
    async fn test_unreachable_toggle() {
        let remote = MemoryRemote::new();
        remote.set_reachable(false);
        let err = remote.fetch_events(&Filter::default()).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unreachable(_)));

        remote.set_reachable(true);
        assert!(remote.fetch_events(&Filter::default()).await.is_ok());
    }
}
