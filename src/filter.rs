// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Filter/predicate engine.
//!
//! A [`Filter`] is an immutable query description: every predicate is
//! independently optional, and an unset predicate is vacuously true.
//! [`Filter::matches`] is the pure conjunction over an event;
//! [`Filter::is_included_in_scope`] is the recursive scope containment test
//! used to decide whether a requested stream set stays inside an access
//! scope. Neither has error states.
//!
//! The engine has no store dependency: stream-set expansion and ancestry are
//! supplied by the caller (a precomputed descendant set, an ancestor oracle).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::event::Event;
use crate::Timestamp;

/// Trashed-state predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StateFilter {
    /// Exclude trashed records
    #[default]
    Default,
    /// Require trashed records
    Trashed,
    /// Ignore the trashed flag
    All,
}

/// An immutable query description over events (and, for the structural
/// predicates, streams).
///
/// A filter with no stream set matches records under any stream — "no
/// restriction" is a wildcard, not an empty set.
///
/// # Example
///
/// ```
/// use stream_cache::{Filter, StateFilter};
///
/// let filter = Filter::default()
///     .with_streams(["health"])
///     .with_from_time(1_000)
///     .with_state(StateFilter::All);
/// assert_eq!(filter.from_time, Some(1_000));
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    /// Lower time bound (inclusive, epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_time: Option<Timestamp>,
    /// Upper time bound (inclusive, epoch millis)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_time: Option<Timestamp>,
    /// Eligible stream ids, each standing for its whole subtree.
    /// `None` = any stream.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streams: Option<BTreeSet<String>>,
    /// Required tags (non-empty intersection)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    /// Eligible event types
    #[serde(rename = "types", skip_serializing_if = "Option::is_none")]
    pub kinds: Option<BTreeSet<String>>,
    /// Trashed-state predicate
    pub state: StateFilter,
    /// Reject records modified strictly before this stamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified_since: Option<Timestamp>,
    /// Pagination: entries to drop from the front of the result
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<usize>,
    /// Pagination: result truncation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    /// Sort direction over event time (default: newest first)
    pub sort_ascending: bool,
    /// Stream-query predicate: `Some(None)` restricts to roots,
    /// `Some(Some(id))` to direct children of `id`. Unset = no restriction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<String>>,
}

impl Filter {
    /// Restrict to the given streams (and their subtrees).
    #[must_use]
    pub fn with_streams<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams = Some(ids.into_iter().map(Into::into).collect());
        self
    }

    /// Require a non-empty tag intersection.
    #[must_use]
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict to the given event types.
    #[must_use]
    pub fn with_kinds<I, S>(mut self, kinds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kinds = Some(kinds.into_iter().map(Into::into).collect());
        self
    }

    /// Set the lower time bound.
    #[must_use]
    pub fn with_from_time(mut self, from: Timestamp) -> Self {
        self.from_time = Some(from);
        self
    }

    /// Set the upper time bound.
    #[must_use]
    pub fn with_to_time(mut self, to: Timestamp) -> Self {
        self.to_time = Some(to);
        self
    }

    /// Set the trashed-state predicate.
    #[must_use]
    pub fn with_state(mut self, state: StateFilter) -> Self {
        self.state = state;
        self
    }

    /// Reject records modified strictly before `since`.
    #[must_use]
    pub fn with_modified_since(mut self, since: Timestamp) -> Self {
        self.modified_since = Some(since);
        self
    }

    /// Set pagination.
    #[must_use]
    pub fn with_pagination(mut self, skip: usize, limit: usize) -> Self {
        self.skip = Some(skip);
        self.limit = Some(limit);
        self
    }

    /// Sort oldest-first instead of the default newest-first.
    #[must_use]
    pub fn ascending(mut self) -> Self {
        self.sort_ascending = true;
        self
    }

    /// Evaluate the conjunction of all set predicates against one event.
    ///
    /// `expanded_streams` is the stream set expanded to full subtrees by the
    /// caller; when absent but the filter names streams, membership falls
    /// back to the named ids themselves.
    ///
    /// An event whose `time` is unset (running) is never rejected by the
    /// time-range predicates: it has no position to fall outside of.
    #[must_use]
    pub fn matches(&self, event: &Event, expanded_streams: Option<&BTreeSet<String>>) -> bool {
        if let Some(t) = event.time {
            if let Some(from) = self.from_time {
                if t < from {
                    return false;
                }
            }
            if let Some(to) = self.to_time {
                if t > to {
                    return false;
                }
            }
        }

        if self.streams.is_some() {
            let eligible = expanded_streams.or(self.streams.as_ref());
            match eligible {
                Some(set) if set.contains(&event.stream_id) => {}
                _ => return false,
            }
        }

        if let Some(filter_tags) = &self.tags {
            // only evaluated when the record carries tags at all
            if let Some(event_tags) = &event.tags {
                if filter_tags.intersection(event_tags).next().is_none() {
                    return false;
                }
            }
        }

        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }

        match self.state {
            StateFilter::Default if event.trashed => return false,
            StateFilter::Trashed if !event.trashed => return false,
            _ => {}
        }

        if let Some(since) = self.modified_since {
            if event.modified < since {
                return false;
            }
        }

        true
    }

    /// Scope containment test.
    ///
    /// `self` is the requested stream set, `scope` the access scope. A scope
    /// with no stream set is unrestricted and includes everything. Otherwise,
    /// every stream id named here must equal — or descend from — at least one
    /// scope stream id. Ancestry is supplied by `contains`:
    /// `contains(scope_id, tested_id)` must report whether `tested_id` is
    /// reachable from `scope_id` in zero or more child steps.
    #[must_use]
    pub fn is_included_in_scope<F>(&self, scope: &Filter, contains: F) -> bool
    where
        F: Fn(&str, &str) -> bool,
    {
        let Some(scope_set) = &scope.streams else {
            return true;
        };
        let Some(requested) = &self.streams else {
            // an unrestricted request cannot fit a restricted scope
            return false;
        };
        requested.iter().all(|tested| {
            scope_set
                .iter()
                .any(|scope_id| contains(scope_id, tested))
        })
    }
}
