//! Event data structure.
//!
//! An [`Event`] is a flat, timestamped record referencing exactly one stream.
//! An event with neither `time` nor `duration` is "running" — it has started
//! but not finished. Whether a single-activity stream may hold more than one
//! running event is enforced by the remote source, never locally.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{now_millis, Timestamp};

/// Metadata of an opaque binary attachment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    pub id: String,
    pub name: String,
    pub size: u64,
}

/// A flat, timestamped record referencing exactly one stream.
///
/// # Example
///
/// ```
/// use stream_cache::Event;
///
/// let event = Event::new("e1", "health", "mood/text", "local");
/// assert!(event.is_running());
/// assert_eq!(event.kind, "mood/text");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Unique id within a store instance
    pub id: String,
    /// Id of the stream this event belongs to
    pub stream_id: String,
    /// Event timestamp (epoch millis); `None` together with no duration
    /// denotes a running event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Timestamp>,
    /// Duration in millis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<i64>,
    /// Event type, e.g. `mass/kg` or `note/txt`
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachments: Option<Vec<Attachment>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_data: Option<Map<String, Value>>,
    /// Soft-deletion flag (first stage of the two-stage delete)
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub trashed: bool,
    pub created: Timestamp,
    pub created_by: String,
    /// Last modification timestamp (epoch millis); drives last-writer-wins merge
    pub modified: Timestamp,
    pub modified_by: String,
}

impl Event {
    /// Create a new running event stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        stream_id: impl Into<String>,
        kind: impl Into<String>,
        by: &str,
    ) -> Self {
        let now = now_millis();
        Self {
            id: id.into(),
            stream_id: stream_id.into(),
            time: None,
            duration: None,
            kind: kind.into(),
            content: None,
            tags: None,
            attachments: None,
            client_data: None,
            trashed: false,
            created: now,
            created_by: by.to_string(),
            modified: now,
            modified_by: by.to_string(),
        }
    }

    /// An event with no time and no duration is open/"running".
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.time.is_none() && self.duration.is_none()
    }

    /// Replace every mutable field with `other`'s. The id is never touched.
    pub fn merge_from(&mut self, other: &Event) {
        self.stream_id = other.stream_id.clone();
        self.time = other.time;
        self.duration = other.duration;
        self.kind = other.kind.clone();
        self.content = other.content.clone();
        self.tags = other.tags.clone();
        self.attachments = other.attachments.clone();
        self.client_data = other.client_data.clone();
        self.trashed = other.trashed;
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
