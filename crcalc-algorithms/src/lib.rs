//! crcalc-algorithms: Reconstruction algorithms for cosmic-ray hit data.
//!
//! This crate provides the per-event reconstruction steps:
//! - **Segmentation** - forward-only split of the hit stream into SM events
//! - **Aggregation** - hit count, summed TOT and mean position
//! - **Line fit** - 3D straight line by Levenberg-Marquardt on perpendicular distances
//! - **Compactness** - fraction of hits near the event centroid
//!
//! [`Reconstructor`] drives all of them over a hit stream.
//!
#![warn(missing_docs)]

mod compactness;
mod line_fit;
mod processing;
pub mod segment;
pub mod solver;
mod stats;

pub use compactness::{
    fraction_inside_sphere, fraction_within, COMPACTNESS_THRESHOLD, DECLARED_SPHERE_RADIUS,
};
pub use line_fit::{
    distance_squared, initial_parameters, perturb, point_cloud, LineDistance, LineFitter, JITTER,
};
pub use processing::{BuiltRecord, EventRecordBuilder, Reconstructor};
pub use segment::{EventRange, EventSegmenter, Locate, Segment, Segments};
pub use solver::{LeastSquaresProblem, LevenbergMarquardt, Minimum, SolverError};
pub use stats::aggregate;

// Re-export core types used in the public API
pub use crcalc_core::{
    Event, EventRecord, FitConfig, FitStatus, Hit, LineFit, ReconstructionConfig, TrackStats,
};
