//! Output records and sinks.

use crate::{LineFit, Result, TrackStats};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Output column names, in write order.
pub const RECORD_COLUMNS: [&str; 13] = [
    "h5_file_num",
    "SM_event_num",
    "num_hits",
    "sum_tots",
    "mean_x",
    "mean_y",
    "mean_z",
    "line_fit_param0",
    "line_fit_param1",
    "line_fit_param2",
    "line_fit_param3",
    "sum_of_squares",
    "fraction_inside_sphere",
];

/// Per-event summary written to the output.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EventRecord {
    /// Source file number.
    pub file_num: u32,
    /// SM event id.
    pub sm_event_num: i64,
    /// Number of hits.
    pub num_hits: u32,
    /// Summed time over threshold.
    pub sum_tots: u32,
    /// Mean X position.
    pub mean_x: f64,
    /// Mean Y position.
    pub mean_y: f64,
    /// Mean Z position.
    pub mean_z: f64,
    /// Line parameters, zero when the fit failed.
    pub line_fit_params: [f64; 4],
    /// Fit residual, zero when the fit failed.
    pub sum_of_squares: f64,
    /// Fraction of hits near the mean position.
    pub fraction_inside_sphere: f64,
}

impl EventRecord {
    /// Assembles a record from the per-event results.
    #[must_use]
    pub fn new(
        file_num: u32,
        sm_event_num: i64,
        stats: &TrackStats,
        fit: &LineFit,
        fraction_inside_sphere: f64,
    ) -> Self {
        Self {
            file_num,
            sm_event_num,
            num_hits: stats.num_hits,
            sum_tots: stats.sum_tots,
            mean_x: stats.mean_x,
            mean_y: stats.mean_y,
            mean_z: stats.mean_z,
            line_fit_params: fit.params,
            sum_of_squares: fit.sum_of_squares,
            fraction_inside_sphere,
        }
    }

    /// The all-zero record for SM event 0.
    #[must_use]
    pub fn sentinel(file_num: u32) -> Self {
        Self {
            file_num,
            sm_event_num: crate::SENTINEL_EVENT_ID,
            num_hits: 0,
            sum_tots: 0,
            mean_x: 0.0,
            mean_y: 0.0,
            mean_z: 0.0,
            line_fit_params: [0.0; 4],
            sum_of_squares: 0.0,
            fraction_inside_sphere: 0.0,
        }
    }

    /// Returns true for the SM event 0 record.
    #[must_use]
    pub fn is_sentinel(&self) -> bool {
        self.sm_event_num == crate::SENTINEL_EVENT_ID
    }
}

/// Destination for event records.
///
/// Records are appended in event-id order, starting with the sentinel.
pub trait RecordSink {
    /// Appends one record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be stored.
    fn append(&mut self, record: &EventRecord) -> Result<()>;

    /// Flushes buffered records. Called once after the last record.
    ///
    /// # Errors
    /// Returns an error if buffered records cannot be written.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl RecordSink for Vec<EventRecord> {
    fn append(&mut self, record: &EventRecord) -> Result<()> {
        self.push(*record);
        Ok(())
    }
}

impl<S: RecordSink + ?Sized> RecordSink for &mut S {
    fn append(&mut self, record: &EventRecord) -> Result<()> {
        (**self).append(record)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}
