//! Compactness of an event's hit cloud.
#![allow(clippy::cast_precision_loss)]

use nalgebra::Point3;

/// Distance from the centroid within which a hit counts as inside.
pub const COMPACTNESS_THRESHOLD: f64 = 2.0;

/// Sphere radius quoted in the output field description.
///
/// The inside test uses [`COMPACTNESS_THRESHOLD`], not this value.
pub const DECLARED_SPHERE_RADIUS: f64 = 1.0;

/// Fraction of `points` within [`COMPACTNESS_THRESHOLD`] of `centre`.
///
/// Values near 1 indicate a dense blob, low values a long streak.
#[must_use]
pub fn fraction_inside_sphere(points: &[Point3<f64>], centre: &Point3<f64>) -> f64 {
    fraction_within(points, centre, COMPACTNESS_THRESHOLD)
}

/// Fraction of `points` whose distance to `centre` is at most `radius`.
///
/// Returns 0 for an empty slice.
#[must_use]
pub fn fraction_within(points: &[Point3<f64>], centre: &Point3<f64>, radius: f64) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let inside = points
        .iter()
        .filter(|p| nalgebra::distance(*p, centre) <= radius)
        .count();
    inside as f64 / points.len() as f64
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;

    #[test]
    fn test_all_inside() {
        let points = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)];
        let centre = Point3::new(0.5, 0.5, 0.5);
        assert_eq!(fraction_inside_sphere(&points, &centre), 1.0);
    }

    #[test]
    fn test_threshold_is_two() {
        let centre = Point3::origin();
        let points = vec![
            Point3::new(1.5, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 2.5, 0.0),
            Point3::new(0.0, 0.0, -3.0),
        ];
        // Boundary counts as inside; radius 1 would give 0.
        assert_eq!(fraction_inside_sphere(&points, &centre), 0.5);
        assert_eq!(fraction_within(&points, &centre, DECLARED_SPHERE_RADIUS), 0.0);
    }

    #[test]
    fn test_empty_is_zero() {
        assert_eq!(fraction_inside_sphere(&[], &Point3::origin()), 0.0);
    }
}
