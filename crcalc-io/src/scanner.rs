//! Hit stream summary.
//!
//! Walks a hit stream once and reports how its SM event ids are laid out,
//! without reconstructing anything.

use crcalc_core::{Hit, FIRST_EVENT_ID};
use serde::Serialize;

/// Shape of a hit stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StreamSummary {
    /// Number of hits.
    pub hits: usize,
    /// Distinct SM event ids seen in increasing order.
    pub events: usize,
    /// First SM event id at or above 1.
    pub first_event: Option<i64>,
    /// Largest SM event id.
    pub last_event: Option<i64>,
    /// Ids between 1 and `last_event` that never occur.
    pub missing_events: u64,
    /// Hits whose id is smaller than one already seen.
    pub out_of_order: usize,
    /// Hits carrying the sentinel id or a negative id.
    pub unassigned: usize,
    /// File number of the first hit.
    pub file_num: Option<u32>,
}

impl StreamSummary {
    /// Returns true if ids run 1, 2, 3, ... without holes or reordering.
    #[must_use]
    pub fn is_contiguous(&self) -> bool {
        self.missing_events == 0 && self.out_of_order == 0 && self.unassigned == 0
    }
}

/// Scans `hits` in order.
#[must_use]
pub fn scan_hits(hits: &[Hit]) -> StreamSummary {
    let mut summary = StreamSummary {
        hits: hits.len(),
        file_num: hits.first().map(|h| h.file_num),
        ..StreamSummary::default()
    };

    for hit in hits {
        let id = hit.sm_event_num;
        if id < FIRST_EVENT_ID {
            summary.unassigned += 1;
            continue;
        }
        match summary.last_event {
            Some(last) if id < last => summary.out_of_order += 1,
            Some(last) if id == last => {}
            last => {
                let previous = last.unwrap_or(FIRST_EVENT_ID - 1);
                summary.missing_events += (id - previous - 1).unsigned_abs();
                summary.events += 1;
                summary.first_event.get_or_insert(id);
                summary.last_event = Some(id);
            }
        }
    }

    summary
}
