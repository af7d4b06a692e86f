//! crcalc-core: Core types for cosmic-ray track reconstruction.
//!
//! This crate provides the data model shared by the reconstruction
//! pipeline: detector hits, per-event hit buffers, track statistics,
//! line fit results and the output record written for every event.
//!

pub mod config;
pub mod error;
pub mod event;
pub mod hit;
pub mod record;
pub mod statistics;
pub mod track;

pub use config::{FitConfig, ReconstructionConfig};
pub use error::{Error, Result};
pub use event::{Event, FIRST_EVENT_ID, SENTINEL_EVENT_ID};
pub use hit::Hit;
pub use record::{EventRecord, RecordSink, RECORD_COLUMNS};
pub use statistics::ReconstructionStatistics;
pub use track::{FitStatus, LineFit, TrackStats};
