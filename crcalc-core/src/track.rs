//! Track statistics and line fit results.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Hit count, summed charge and mean position of one event.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackStats {
    /// Number of hits.
    pub num_hits: u32,
    /// Sum of time over threshold over all hits.
    pub sum_tots: u32,
    /// Mean X position.
    pub mean_x: f64,
    /// Mean Y position.
    pub mean_y: f64,
    /// Mean Z position.
    pub mean_z: f64,
}

impl TrackStats {
    /// Returns the mean position as `[x, y, z]`.
    #[must_use]
    pub fn mean(&self) -> [f64; 3] {
        [self.mean_x, self.mean_y, self.mean_z]
    }
}

/// Outcome of a 3D line fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum FitStatus {
    /// The minimizer converged.
    Converged,
    /// Single-hit event; no line is determinable.
    Degenerate,
    /// The minimizer did not converge.
    NotConverged,
}

/// Straight line `x = p0 + p1 * z`, `y = p2 + p3 * z` fitted to a hit cloud.
///
/// A failed fit carries all-zero parameters and sum of squares.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LineFit {
    /// `[x intercept at z = 0, dx/dz, y intercept at z = 0, dy/dz]`.
    pub params: [f64; 4],
    /// Sum of squared perpendicular distances at the optimum.
    pub sum_of_squares: f64,
    /// Fit outcome.
    pub status: FitStatus,
}

impl LineFit {
    /// Creates a converged fit.
    #[must_use]
    pub fn converged(params: [f64; 4], sum_of_squares: f64) -> Self {
        Self {
            params,
            sum_of_squares,
            status: FitStatus::Converged,
        }
    }

    /// Creates a failed fit with zeroed outputs.
    #[must_use]
    pub fn failed(status: FitStatus) -> Self {
        Self {
            params: [0.0; 4],
            sum_of_squares: 0.0,
            status,
        }
    }

    /// Returns true unless the fit converged.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.status != FitStatus::Converged
    }

    /// X intercept at z = 0.
    #[must_use]
    pub fn x_intercept(&self) -> f64 {
        self.params[0]
    }

    /// dx/dz.
    #[must_use]
    pub fn x_slope(&self) -> f64 {
        self.params[1]
    }

    /// Y intercept at z = 0.
    #[must_use]
    pub fn y_intercept(&self) -> f64 {
        self.params[2]
    }

    /// dy/dz.
    #[must_use]
    pub fn y_slope(&self) -> f64 {
        self.params[3]
    }

    /// Point on the line at depth `z`.
    #[must_use]
    pub fn point_at(&self, z: f64) -> [f64; 3] {
        [
            self.params[0] + self.params[1] * z,
            self.params[2] + self.params[3] * z,
            z,
        ]
    }

    /// Angle between the track and the z axis, in radians.
    #[must_use]
    pub fn polar_angle(&self) -> f64 {
        self.params[1].hypot(self.params[3]).atan()
    }
}
