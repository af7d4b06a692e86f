//! Forward-only segmentation of the hit stream into SM events.
//!
//! # Problem
//! Hits arrive ordered by SM event number but without explicit event
//! boundaries. Ids are expected to run 1, 2, 3, ... with no holes; a hole
//! means the upstream interpretation dropped an event.
//!
//! # Solution
//! [`EventSegmenter`] keeps a cursor that only ever moves forward.
//! [`EventSegmenter::locate`] finds the first hit of an id, and the range of
//! event `k` is `[locate(k), locate(k + 1))`. [`Segments`] drives this over
//! the whole stream, yielding event ranges and the holes found between them.
//! Total cost is linear in the number of hits however many events there are.

use crcalc_core::{Event, Hit, FIRST_EVENT_ID};
use std::cmp::Ordering;
use std::ops::Range;

/// Result of a forward search for an SM event id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locate {
    /// Index of the first hit carrying the id.
    Found(usize),
    /// The scan reached a hit with a larger id first.
    ///
    /// The cursor rests on that hit; it is not consumed.
    Gap {
        /// Index of the blocking hit.
        index: usize,
        /// Id of the blocking hit.
        found: i64,
    },
    /// No hit at or after the cursor carries the id.
    EndOfStream,
}

/// Monotonic cursor over an ordered hit stream.
#[derive(Debug)]
pub struct EventSegmenter<'a> {
    hits: &'a [Hit],
    cursor: usize,
}

impl<'a> EventSegmenter<'a> {
    /// Creates a segmenter positioned at the first hit.
    #[must_use]
    pub fn new(hits: &'a [Hit]) -> Self {
        Self { hits, cursor: 0 }
    }

    /// Current cursor position.
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of hits in the stream.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Returns true if the stream has no hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Scans forward from the cursor for the first hit of `target`.
    ///
    /// Hits with a smaller id are passed over. Calling `locate` again with
    /// the same target returns the same answer.
    pub fn locate(&mut self, target: i64) -> Locate {
        while let Some(hit) = self.hits.get(self.cursor) {
            match hit.sm_event_num.cmp(&target) {
                Ordering::Equal => return Locate::Found(self.cursor),
                Ordering::Greater => {
                    return Locate::Gap {
                        index: self.cursor,
                        found: hit.sm_event_num,
                    }
                }
                Ordering::Less => self.cursor += 1,
            }
        }
        Locate::EndOfStream
    }
}

/// Index range of one SM event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRange {
    /// SM event id.
    pub id: i64,
    /// Hit indices belonging to the event.
    pub range: Range<usize>,
    /// True when the range runs to the end of the stream.
    pub is_last: bool,
}

impl EventRange {
    /// Number of hits in the range.
    #[must_use]
    pub fn len(&self) -> usize {
        self.range.len()
    }

    /// Returns true if the range is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Copies the event's hits into an owned buffer.
    #[must_use]
    pub fn materialize(&self, hits: &[Hit]) -> Event {
        Event::from_slice(self.id, &hits[self.range.clone()])
    }
}

/// Item produced by [`Segments`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A present event.
    Event(EventRange),
    /// Ids absent from the stream; `missing.end` is the next id present.
    Gap {
        /// Missing ids.
        missing: Range<i64>,
    },
}

/// Iterator over the SM events of a hit stream, starting at id 1.
#[derive(Debug)]
pub struct Segments<'a> {
    segmenter: EventSegmenter<'a>,
    next_id: i64,
    skipped: usize,
    done: bool,
}

impl<'a> Segments<'a> {
    /// Creates an iterator over `hits`.
    #[must_use]
    pub fn new(hits: &'a [Hit]) -> Self {
        Self {
            segmenter: EventSegmenter::new(hits),
            next_id: FIRST_EVENT_ID,
            skipped: 0,
            done: false,
        }
    }

    /// Hits passed over while searching for an event start.
    ///
    /// These carry an id below the event being searched for, such as hits
    /// tagged with the sentinel id 0.
    #[must_use]
    pub fn skipped_hits(&self) -> usize {
        self.skipped
    }

    /// Id the next search will look for.
    #[must_use]
    pub fn next_id(&self) -> i64 {
        self.next_id
    }
}

impl Iterator for Segments<'_> {
    type Item = Segment;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let before = self.segmenter.cursor();
        match self.segmenter.locate(self.next_id) {
            Locate::EndOfStream => {
                self.skipped += self.segmenter.len() - before;
                self.done = true;
                None
            }
            Locate::Gap { index, found } => {
                self.skipped += index - before;
                let missing = self.next_id..found;
                self.next_id = found;
                Some(Segment::Gap { missing })
            }
            Locate::Found(start) => {
                self.skipped += start - before;
                let id = self.next_id;
                let next = id.checked_add(1);
                let located = next.map(|next| self.segmenter.locate(next));
                let (end, is_last) = match located.unwrap_or(Locate::EndOfStream) {
                    Locate::Found(end) | Locate::Gap { index: end, .. } => (end, false),
                    Locate::EndOfStream => (self.segmenter.len(), true),
                };
                self.next_id = next.unwrap_or(id);
                self.done = is_last;
                Some(Segment::Event(EventRange {
                    id,
                    range: start..end,
                    is_last,
                }))
            }
        }
    }
}
