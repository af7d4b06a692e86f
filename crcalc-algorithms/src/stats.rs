//! Hit count, charge and centroid aggregation.
#![allow(clippy::cast_precision_loss)]

use crcalc_core::{Error, Event, Result, TrackStats};

/// Computes hit count, summed TOT and mean position of an event in one pass.
///
/// Means use the recorded coordinates, without the fit jitter.
///
/// # Errors
/// Returns [`Error::EmptyEvent`] if the event has no hits.
pub fn aggregate(event: &Event) -> Result<TrackStats> {
    if event.is_empty() {
        return Err(Error::EmptyEvent { event_id: event.id });
    }

    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut sum_z = 0.0;
    let mut sum_tots = 0u32;

    for hit in event.iter() {
        sum_x += hit.x;
        sum_y += hit.y;
        sum_z += hit.z;
        sum_tots = sum_tots.saturating_add(u32::from(hit.tot));
    }

    let n = event.len() as f64;
    Ok(TrackStats {
        num_hits: u32::try_from(event.len()).unwrap_or(u32::MAX),
        sum_tots,
        mean_x: sum_x / n,
        mean_y: sum_y / n,
        mean_z: sum_z / n,
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_relative_eq;
    use crcalc_core::Hit;

    #[test]
    fn test_aggregate() {
        let mut event = Event::new(4);
        event.push(Hit::new(4, 0.0, 1.0, 2.0, 10));
        event.push(Hit::new(4, 2.0, 3.0, 4.0, 20));
        event.push(Hit::new(4, 4.0, 5.0, 0.0, 255));

        let stats = aggregate(&event).unwrap();
        assert_eq!(stats.num_hits, 3);
        assert_eq!(stats.sum_tots, 285);
        assert_relative_eq!(stats.mean_x, 2.0);
        assert_relative_eq!(stats.mean_y, 3.0);
        assert_relative_eq!(stats.mean_z, 2.0);
    }

    #[test]
    fn test_single_hit_mean_is_hit() {
        let mut event = Event::new(1);
        event.push(Hit::new(1, 1.5, -2.5, 3.25, 7));

        let stats = aggregate(&event).unwrap();
        assert_eq!(stats.num_hits, 1);
        assert_eq!(stats.mean(), [1.5, -2.5, 3.25]);
    }

    #[test]
    fn test_empty_event_is_error() {
        let event = Event::new(9);
        let err = aggregate(&event).unwrap_err();
        assert!(matches!(err, Error::EmptyEvent { event_id: 9 }));
    }
}
