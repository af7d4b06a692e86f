//! Per-event hit buffers.

use crate::Hit;

/// Reserved id written once, with every field zero, before real events.
pub const SENTINEL_EVENT_ID: i64 = 0;

/// Id of the first real SM event.
pub const FIRST_EVENT_ID: i64 = 1;

/// The hits of a single SM event, copied out of the hit stream.
#[derive(Debug, Clone, Default)]
pub struct Event {
    /// SM event id.
    pub id: i64,
    /// Hits belonging to this event, in stream order.
    pub hits: Vec<Hit>,
}

impl Event {
    /// Creates an empty event.
    #[must_use]
    pub fn new(id: i64) -> Self {
        Self {
            id,
            hits: Vec::new(),
        }
    }

    /// Creates an event that owns a copy of `hits`.
    #[must_use]
    pub fn from_slice(id: i64, hits: &[Hit]) -> Self {
        Self {
            id,
            hits: hits.to_vec(),
        }
    }

    /// Adds a hit to the event.
    pub fn push(&mut self, hit: Hit) {
        self.hits.push(hit);
    }

    /// Returns the number of hits in the event.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the event has no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Returns true for the reserved id-0 event.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.id == SENTINEL_EVENT_ID
    }

    /// Returns an iterator over the hits.
    pub fn iter(&self) -> impl Iterator<Item = &Hit> {
        self.hits.iter()
    }
}
