//! 3D straight-line fit to an event's hit cloud.
//!
//! The line is parametrized by depth: it passes through `(p0, p2, 0)` with
//! direction `(p1, p3, 1)`. The objective is the sum of squared
//! perpendicular distances from the hits to the line. The fit starts from
//! two ordinary least-squares regressions (x on z, y on z) and is refined
//! with [`LevenbergMarquardt`].
#![allow(clippy::cast_precision_loss)]

use crate::solver::{LeastSquaresProblem, LevenbergMarquardt};
use crcalc_core::{Error, Event, FitConfig, FitStatus, Hit, LineFit, Result};
use log::{info, warn};
use nalgebra::{Point3, Vector3, Vector4};

/// Coordinate offset applied to every hit before fitting.
///
/// Breaks exact coincidences between hits that would otherwise make the
/// fit degenerate: x and z are lowered, y is raised.
pub const JITTER: f64 = 0.001;

/// Returns the jittered position of a hit.
#[inline]
#[must_use]
pub fn perturb(hit: &Hit) -> Point3<f64> {
    Point3::new(hit.x - JITTER, hit.y + JITTER, hit.z - JITTER)
}

/// Returns the jittered positions of all hits.
#[must_use]
pub fn point_cloud(hits: &[Hit]) -> Vec<Point3<f64>> {
    hits.iter().map(perturb).collect()
}

/// Squared perpendicular distance from `point` to the line `params`.
#[must_use]
pub fn distance_squared(point: &Point3<f64>, params: &Vector4<f64>) -> f64 {
    let (origin, direction) = line_geometry(params);
    let offset = point - origin;
    offset.cross(&direction).norm_squared() / direction.norm_squared()
}

fn line_geometry(params: &Vector4<f64>) -> (Point3<f64>, Vector3<f64>) {
    (
        Point3::new(params[0], params[2], 0.0),
        Vector3::new(params[1], params[3], 1.0),
    )
}

/// Starting parameters from the x-on-z and y-on-z regressions.
///
/// If all points share one z the slope is set to 0 and the intercept to the
/// mean coordinate.
#[must_use]
pub fn initial_parameters(points: &[Point3<f64>]) -> Vector4<f64> {
    let (p0, p1) = regress_on_z(points, |p| p.x);
    let (p2, p3) = regress_on_z(points, |p| p.y);
    Vector4::new(p0, p1, p2, p3)
}

/// Unweighted least-squares `value = intercept + slope * z`.
fn regress_on_z(points: &[Point3<f64>], value: impl Fn(&Point3<f64>) -> f64) -> (f64, f64) {
    let n = points.len() as f64;
    let mean_z = points.iter().map(|p| p.z).sum::<f64>() / n;
    let mean_v = points.iter().map(&value).sum::<f64>() / n;

    let mut szz = 0.0;
    let mut szv = 0.0;
    for p in points {
        let dz = p.z - mean_z;
        szz += dz * dz;
        szv += dz * (value(p) - mean_v);
    }

    if szz > 0.0 {
        let slope = szv / szz;
        (mean_v - slope * mean_z, slope)
    } else {
        (mean_v, 0.0)
    }
}

/// Sum of squared perpendicular distances of a point cloud to a line.
///
/// Residuals are the three components of each point's perpendicular
/// offset, so their squares sum to the squared distances.
#[derive(Debug, Clone, Copy)]
pub struct LineDistance<'a> {
    points: &'a [Point3<f64>],
}

impl<'a> LineDistance<'a> {
    /// Creates the objective over `points`.
    #[must_use]
    pub fn new(points: &'a [Point3<f64>]) -> Self {
        Self { points }
    }
}

impl LeastSquaresProblem for LineDistance<'_> {
    fn residual_count(&self) -> usize {
        3 * self.points.len()
    }

    fn residuals(&self, params: &Vector4<f64>, out: &mut [f64]) {
        let (origin, direction) = line_geometry(params);
        let unit = direction.normalize();
        for (point, chunk) in self.points.iter().zip(out.chunks_exact_mut(3)) {
            let offset = point - origin;
            let perpendicular = offset - unit * offset.dot(&unit);
            chunk.copy_from_slice(perpendicular.as_slice());
        }
    }

    fn evaluate(&self, params: &Vector4<f64>) -> f64 {
        self.points
            .iter()
            .map(|p| distance_squared(p, params))
            .sum()
    }
}

/// Fits straight lines to events.
#[derive(Debug, Clone, Default)]
pub struct LineFitter {
    solver: LevenbergMarquardt,
}

impl LineFitter {
    /// Creates a fitter with the given solver settings.
    #[must_use]
    pub fn new(config: FitConfig) -> Self {
        Self {
            solver: LevenbergMarquardt::new(config),
        }
    }

    /// Fits a line to the jittered hits of `event`.
    ///
    /// # Errors
    /// Returns [`Error::EmptyEvent`] if the event has no hits.
    pub fn fit(&self, event: &Event) -> Result<LineFit> {
        self.fit_points(event.id, &point_cloud(&event.hits))
    }

    /// Fits a line to already jittered points.
    ///
    /// Single-point clouds and solver failures yield a zeroed, failed fit.
    ///
    /// # Errors
    /// Returns [`Error::EmptyEvent`] if `points` is empty.
    pub fn fit_points(&self, event_id: i64, points: &[Point3<f64>]) -> Result<LineFit> {
        match points.len() {
            0 => Err(Error::EmptyEvent { event_id }),
            1 => {
                info!("SM event {event_id} has a single hit, no line fit possible");
                Ok(LineFit::failed(FitStatus::Degenerate))
            }
            _ => {
                let start = initial_parameters(points);
                let problem = LineDistance::new(points);
                match self.solver.minimize(&problem, start) {
                    Ok(min) => {
                        let p = min.params;
                        Ok(LineFit::converged([p[0], p[1], p[2], p[3]], min.value))
                    }
                    Err(e) => {
                        warn!("line fit failed for SM event {event_id}: {e}");
                        Ok(LineFit::failed(FitStatus::NotConverged))
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_abs_diff_eq;

    fn event(id: i64, positions: &[[f64; 3]]) -> Event {
        let mut event = Event::new(id);
        for &[x, y, z] in positions {
            event.push(Hit::new(id, x, y, z, 10));
        }
        event
    }

    #[test]
    fn test_jitter_offsets() {
        let p = perturb(&Hit::new(1, 1.0, 1.0, 1.0, 0));
        assert_abs_diff_eq!(p.x, 0.999, epsilon = 1e-15);
        assert_abs_diff_eq!(p.y, 1.001, epsilon = 1e-15);
        assert_abs_diff_eq!(p.z, 0.999, epsilon = 1e-15);
    }

    #[test]
    fn test_distance_squared() {
        // Line along z through the origin.
        let params = Vector4::new(0.0, 0.0, 0.0, 0.0);
        assert_abs_diff_eq!(distance_squared(&Point3::new(3.0, 4.0, 7.0), &params), 25.0);

        // Diagonal line x = z through the origin; (1, 0, 0) is at distance sqrt(1/2).
        let params = Vector4::new(0.0, 1.0, 0.0, 0.0);
        assert_abs_diff_eq!(
            distance_squared(&Point3::new(1.0, 0.0, 0.0), &params),
            0.5,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_residuals_match_distances() {
        let points = vec![
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(2.0, -1.0, 1.0),
            Point3::new(0.5, 0.5, 3.0),
        ];
        let problem = LineDistance::new(&points);
        let params = Vector4::new(0.2, 0.3, -0.1, 0.7);

        let mut out = vec![0.0; problem.residual_count()];
        problem.residuals(&params, &mut out);
        let from_residuals: f64 = out.iter().map(|r| r * r).sum();
        assert_abs_diff_eq!(from_residuals, problem.evaluate(&params), epsilon = 1e-12);
    }

    #[test]
    fn test_initial_parameters() {
        let points = vec![
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(3.0, -1.0, 1.0),
            Point3::new(5.0, -2.0, 2.0),
        ];
        let start = initial_parameters(&points);
        assert_abs_diff_eq!(start[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(start[1], 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(start[2], 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(start[3], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_initial_parameters_flat_z() {
        let points = vec![Point3::new(1.0, 4.0, 2.0), Point3::new(3.0, 6.0, 2.0)];
        let start = initial_parameters(&points);
        assert_eq!(start, Vector4::new(2.0, 0.0, 5.0, 0.0));
    }

    #[test]
    fn test_collinear_fit() {
        let fitter = LineFitter::default();
        let fit = fitter
            .fit(&event(1, &[[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]]))
            .unwrap();

        assert_eq!(fit.status, FitStatus::Converged);
        assert_abs_diff_eq!(fit.x_intercept(), 0.0, epsilon = 0.01);
        assert_abs_diff_eq!(fit.x_slope(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.y_intercept(), 0.0, epsilon = 0.01);
        assert_abs_diff_eq!(fit.y_slope(), 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(fit.sum_of_squares, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_fit_recovers_tilted_track() {
        // x = 2 + 0.5 z, y = -1 - 0.25 z with small alternating offsets.
        let positions: Vec<[f64; 3]> = (0..10)
            .map(|i| {
                let z = f64::from(i);
                let wobble = if i % 2 == 0 { 0.01 } else { -0.01 };
                [2.0 + 0.5 * z + wobble, -1.0 - 0.25 * z - wobble, z]
            })
            .collect();
        let fit = LineFitter::default().fit(&event(5, &positions)).unwrap();

        assert!(!fit.is_failed());
        assert_abs_diff_eq!(fit.x_slope(), 0.5, epsilon = 0.01);
        assert_abs_diff_eq!(fit.y_slope(), -0.25, epsilon = 0.01);
        assert_abs_diff_eq!(fit.x_intercept(), 2.0 - 0.5 * JITTER, epsilon = 0.05);
        assert!(fit.sum_of_squares < 0.01);
    }

    #[test]
    fn test_single_hit_is_degenerate() {
        let fit = LineFitter::default()
            .fit(&event(3, &[[1.0, 2.0, 3.0]]))
            .unwrap();
        assert_eq!(fit.status, FitStatus::Degenerate);
        assert_eq!(fit.params, [0.0; 4]);
        assert_eq!(fit.sum_of_squares, 0.0);
    }

    #[test]
    fn test_empty_event_is_error() {
        let result = LineFitter::default().fit(&Event::new(8));
        assert!(matches!(result, Err(Error::EmptyEvent { event_id: 8 })));
    }

    #[test]
    fn test_iteration_limit_marks_failure() {
        let fitter = LineFitter::new(FitConfig::default().with_max_iterations(1));
        let positions = [[0.0, 0.0, 0.0], [3.0, 0.0, 1.0], [0.0, 3.0, 2.0], [1.0, 1.0, 5.0]];
        let fit = fitter.fit(&event(2, &positions)).unwrap();
        assert_eq!(fit.status, FitStatus::NotConverged);
        assert_eq!(fit.params, [0.0; 4]);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let positions = [[0.0, 0.0, 0.0], [1.2, 0.9, 1.0], [1.9, 2.2, 2.0], [3.1, 2.9, 3.0]];
        let fitter = LineFitter::default();
        let first = fitter.fit(&event(4, &positions)).unwrap();
        let second = fitter.fit(&event(4, &positions)).unwrap();
        assert_eq!(first, second);
    }
}
