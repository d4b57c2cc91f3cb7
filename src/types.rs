//! Core types shared by the bridge, translator and listeners.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::RangeInclusive;

/// Numeric identifier of a native event kind.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventKind(pub u32);

impl fmt::Debug for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventKind({:#x})", self.0)
    }
}

impl EventKind {
    pub fn next(self) -> Self {
        EventKind(self.0.wrapping_add(1))
    }

    pub fn prev(self) -> Self {
        EventKind(self.0.wrapping_sub(1))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the entity that owns a bridge (a player, a list...).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceId(pub u64);

impl fmt::Debug for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceId({})", self.0)
    }
}

/// Opaque native reference to a list item.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemRef(pub u64);

impl fmt::Debug for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemRef({:#x})", self.0)
    }
}

/// Opaque token for one asynchronous native request.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(pub u64);

impl fmt::Debug for RequestToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestToken({:#x})", self.0)
    }
}

/// Payload of a raw native event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RawPayload {
    Empty,
    Index(u32),
    Item { index: u32, item: ItemRef },
}

/// Event record as delivered by the native subsystem.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub kind: EventKind,
    pub payload: RawPayload,
}

impl RawEvent {
    pub fn new(kind: EventKind, payload: RawPayload) -> Self {
        Self { kind, payload }
    }

    /// An event with no payload.
    pub fn empty(kind: EventKind) -> Self {
        Self::new(kind, RawPayload::Empty)
    }
}

/// Typed event handed to listeners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// The list played through to its end.
    Finished { source: SourceId },

    /// The next item in the sequence was set.
    SequenceAdvanced {
        source: SourceId,
        index: u32,
        /// Native item, when the event carried one.
        item: Option<ItemRef>,
    },

    /// Playback was stopped.
    Stopped { source: SourceId },
}

impl DomainEvent {
    /// The entity that raised this event.
    pub fn source(&self) -> SourceId {
        match self {
            DomainEvent::Finished { source }
            | DomainEvent::SequenceAdvanced { source, .. }
            | DomainEvent::Stopped { source } => *source,
        }
    }
}

/// Closed contiguous range of native event kinds a bridge subscribes to.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub first: EventKind,
    pub last: EventKind,
}

impl EventFilter {
    pub fn new(first: EventKind, last: EventKind) -> Self {
        Self { first, last }
    }

    /// Filter over the raw numeric range `first..=last`.
    pub fn range(range: RangeInclusive<u32>) -> Self {
        Self::new(EventKind(*range.start()), EventKind(*range.end()))
    }

    pub fn contains(&self, kind: EventKind) -> bool {
        kind >= self.first && kind <= self.last
    }

    /// Every kind in the range, in ascending order. Empty when `first > last`.
    pub fn kinds(&self) -> impl Iterator<Item = EventKind> {
        (self.first.0..=self.last.0).map(EventKind)
    }

    pub fn is_empty(&self) -> bool {
        self.first > self.last
    }

    /// Number of kinds in the range. `u64` so the full `u32` range fits.
    pub fn len(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            u64::from(self.last.0) - u64::from(self.first.0) + 1
        }
    }
}

impl fmt::Debug for EventFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventFilter({:#x}..={:#x})", self.first.0, self.last.0)
    }
}

/// Native kinds of the list player event taxonomy.
pub mod list_player {
    use super::EventKind;

    pub const PLAYED: EventKind = EventKind(0x400);
    pub const NEXT_ITEM_SET: EventKind = EventKind(0x401);
    pub const STOPPED: EventKind = EventKind(0x402);
}

/// Which native kind maps to which [`DomainEvent`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindTable {
    pub finished: EventKind,
    pub advanced: EventKind,
    pub stopped: EventKind,
}

impl Default for KindTable {
    fn default() -> Self {
        Self {
            finished: list_player::PLAYED,
            advanced: list_player::NEXT_ITEM_SET,
            stopped: list_player::STOPPED,
        }
    }
}

impl KindTable {
    pub fn kinds(&self) -> [EventKind; 3] {
        [self.finished, self.advanced, self.stopped]
    }
}
