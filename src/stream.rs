//! Stream data structure.
//!
//! A [`Stream`] is a hierarchical categorizing entity. Streams form a forest:
//! a stream with no parent is a root, and every stream carries the ids of its
//! direct children. The children index is derived state — the
//! [`StreamStore`](crate::StreamStore) re-derives it from the parent edges
//! after every structural change.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{now_millis, Timestamp};

/// A hierarchical categorizing entity.
///
/// # Example
///
/// ```
/// use stream_cache::Stream;
///
/// let stream = Stream::new("health", "Health", None, "local");
/// assert!(stream.parent_id.is_none());
/// assert!(stream.children.is_none());
/// assert!(!stream.trashed);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stream {
    /// Unique id within a store instance
    pub id: String,
    /// Display name
    pub name: String,
    /// Parent stream id; `None` means this stream is a root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Ids of direct children. Absent (`None`) when the stream has no
    /// children — never an empty set. The distinction survives
    /// serialization round-trips.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub children: Option<BTreeSet<String>>,
    /// Soft-deletion flag (first stage of the two-stage delete)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub trashed: bool,
    /// At most one running event allowed under this stream.
    /// Enforced by the remote source, not locally.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub single_activity: bool,
    /// Opaque per-client payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_data: Option<Map<String, Value>>,
    /// Creation timestamp (epoch millis)
    pub created: Timestamp,
    /// Attribution of the creating writer
    pub created_by: String,
    /// Last modification timestamp (epoch millis); drives last-writer-wins merge
    pub modified: Timestamp,
    /// Attribution of the last writer
    pub modified_by: String,
}

impl Stream {
    /// Create a new stream stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        parent_id: Option<String>,
        by: &str,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            name: name.into(),
            parent_id,
            children: None,
            trashed: false,
            single_activity: false,
            client_data: None,
            created: now,
            created_by: by.to_string(),
            modified: now,
            modified_by: by.to_string(),
        }
    }

    /// Whether this stream is a member of the root set.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Replace every mutable field with `other`'s.
    ///
    /// The children set is replaced only when `other` carries one
    /// (subtree replacement); otherwise the local derived index is kept.
    /// The id is never touched.
    pub fn merge_from(&mut self, other: &Stream) {
        self.name = other.name.clone();
        self.parent_id = other.parent_id.clone();
        self.single_activity = other.single_activity;
        self.client_data = other.client_data.clone();
        self.trashed = other.trashed;
        if other.children.is_some() {
            self.children = other.children.clone();
        }
        self.created = other.created;
        self.created_by = other.created_by.clone();
        self.modified = other.modified;
        self.modified_by = other.modified_by.clone();
    }

    /// Bump the modification stamp for a local mutation.
    pub fn touch(&mut self, by: &str) {
        self.modified = now_millis();
        self.modified_by = by.to_string();
    }
}
