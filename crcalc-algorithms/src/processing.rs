//! Record assembly and the reconstruction driver.

use crate::compactness::fraction_inside_sphere;
use crate::line_fit::{point_cloud, LineFitter};
use crate::segment::{Segment, Segments};
use crate::stats::aggregate;
use crcalc_core::{
    Event, EventRecord, FitConfig, FitStatus, Hit, ReconstructionConfig, ReconstructionStatistics,
    RecordSink, Result,
};
use log::{debug, info, warn};
use nalgebra::Point3;
use rayon::prelude::*;

/// A record together with the fit outcome that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuiltRecord {
    /// The output record.
    pub record: EventRecord,
    /// How the line fit ended.
    pub fit_status: FitStatus,
}

/// Runs aggregation, line fit and compactness for one event and assembles the record.
#[derive(Debug, Clone)]
pub struct EventRecordBuilder {
    file_num: u32,
    fitter: LineFitter,
}

impl EventRecordBuilder {
    /// Creates a builder writing `file_num` into every record.
    #[must_use]
    pub fn new(file_num: u32, fit: FitConfig) -> Self {
        Self {
            file_num,
            fitter: LineFitter::new(fit),
        }
    }

    /// File number written into records.
    #[must_use]
    pub fn file_num(&self) -> u32 {
        self.file_num
    }

    /// The SM event 0 record.
    #[must_use]
    pub fn sentinel(&self) -> EventRecord {
        EventRecord::sentinel(self.file_num)
    }

    /// Builds the record for `event`.
    ///
    /// # Errors
    /// Returns [`crcalc_core::Error::EmptyEvent`] if the event has no hits.
    pub fn build(&self, event: &Event) -> Result<BuiltRecord> {
        let stats = aggregate(event)?;
        let points = point_cloud(&event.hits);
        let fit = self.fitter.fit_points(event.id, &points)?;
        let centre = Point3::new(stats.mean_x, stats.mean_y, stats.mean_z);
        let fraction = fraction_inside_sphere(&points, &centre);

        Ok(BuiltRecord {
            record: EventRecord::new(self.file_num, event.id, &stats, &fit, fraction),
            fit_status: fit.status,
        })
    }
}

/// Reconstructs every SM event of a hit stream.
///
/// Segmentation runs in stream order. Events are copied out in batches,
/// reconstructed (in parallel when enabled) and written in id order.
#[derive(Debug, Clone, Default)]
pub struct Reconstructor {
    config: ReconstructionConfig,
}

impl Reconstructor {
    /// Creates a reconstructor.
    ///
    /// # Errors
    /// Returns [`crcalc_core::Error::InvalidConfig`] if the configuration is unusable.
    pub fn new(config: ReconstructionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &ReconstructionConfig {
        &self.config
    }

    /// Writes the sentinel and one record per present event to `sink`.
    ///
    /// # Errors
    /// Returns an error if an event turns out empty or the sink fails.
    pub fn run<S>(&self, hits: &[Hit], sink: &mut S) -> Result<ReconstructionStatistics>
    where
        S: RecordSink + ?Sized,
    {
        let file_num = self
            .config
            .file_num
            .or_else(|| hits.first().map(|h| h.file_num))
            .unwrap_or(0);
        let builder = EventRecordBuilder::new(file_num, self.config.fit.clone());

        let mut stats = ReconstructionStatistics {
            total_hits: hits.len(),
            ..ReconstructionStatistics::default()
        };

        sink.append(&builder.sentinel())?;

        let mut segments = Segments::new(hits);
        let mut pending: Vec<Event> = Vec::with_capacity(self.config.batch_events);

        for segment in segments.by_ref() {
            match segment {
                Segment::Gap { missing } => {
                    warn!(
                        "SM event numbers {}..{} are missing; there should be no missing SM event numbers",
                        missing.start, missing.end
                    );
                    stats.missing_events = stats.missing_events.saturating_add(
                        usize::try_from(missing.end - missing.start).unwrap_or(usize::MAX),
                    );
                }
                Segment::Event(range) => {
                    debug!("reconstructing SM event {} ({} hits)", range.id, range.len());
                    pending.push(range.materialize(hits));
                    if pending.len() >= self.config.batch_events {
                        self.flush(&builder, &mut pending, sink, &mut stats)?;
                    }
                }
            }
        }
        self.flush(&builder, &mut pending, sink, &mut stats)?;

        stats.skipped_hits = segments.skipped_hits();
        if stats.skipped_hits > 0 {
            warn!("{} hits were not assigned to any SM event", stats.skipped_hits);
        }

        sink.finish()?;

        info!(
            "reconstructed {} SM events from {} hits ({} fitted, {} single-hit, {} fit failures, {} missing ids)",
            stats.events,
            stats.total_hits,
            stats.fitted(),
            stats.degenerate,
            stats.fit_failures,
            stats.missing_events
        );
        Ok(stats)
    }

    /// Reconstructs all events of `hits` into a vector.
    ///
    /// # Errors
    /// Returns an error if an event turns out empty.
    pub fn run_to_vec(&self, hits: &[Hit]) -> Result<(Vec<EventRecord>, ReconstructionStatistics)> {
        let mut records = Vec::new();
        let stats = self.run(hits, &mut records)?;
        Ok((records, stats))
    }

    fn flush<S>(
        &self,
        builder: &EventRecordBuilder,
        pending: &mut Vec<Event>,
        sink: &mut S,
        stats: &mut ReconstructionStatistics,
    ) -> Result<()>
    where
        S: RecordSink + ?Sized,
    {
        if pending.is_empty() {
            return Ok(());
        }

        let built: Vec<Result<BuiltRecord>> = if self.config.parallel {
            pending.par_iter().map(|event| builder.build(event)).collect()
        } else {
            pending.iter().map(|event| builder.build(event)).collect()
        };

        for result in built {
            let BuiltRecord { record, fit_status } = result?;
            stats.record_event(fit_status);
            sink.append(&record)?;
        }

        pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::float_cmp)]
    use super::*;
    use approx::assert_abs_diff_eq;
    use crcalc_core::Error;

    fn hit(id: i64, x: f64, y: f64, z: f64) -> Hit {
        Hit::new(id, x, y, z, 10).with_file_num(101)
    }

    #[test]
    fn test_build_collinear_event() {
        let mut event = Event::new(1);
        event.push(hit(1, 0.0, 0.0, 0.0));
        event.push(hit(1, 1.0, 1.0, 1.0));
        event.push(hit(1, 2.0, 2.0, 2.0));

        let builder = EventRecordBuilder::new(101, FitConfig::default());
        let BuiltRecord { record, fit_status } = builder.build(&event).unwrap();

        assert_eq!(fit_status, FitStatus::Converged);
        assert_eq!(record.file_num, 101);
        assert_eq!(record.num_hits, 3);
        assert_eq!(record.sum_tots, 30);
        assert_eq!(record.mean_x, 1.0);
        assert_eq!(record.mean_y, 1.0);
        assert_eq!(record.mean_z, 1.0);
        assert_abs_diff_eq!(record.line_fit_params[1], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(record.line_fit_params[3], 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(record.sum_of_squares, 0.0, epsilon = 1e-12);
        assert_eq!(record.fraction_inside_sphere, 1.0);
    }

    #[test]
    fn test_build_empty_event_fails() {
        let builder = EventRecordBuilder::new(0, FitConfig::default());
        assert!(matches!(
            builder.build(&Event::new(4)),
            Err(Error::EmptyEvent { event_id: 4 })
        ));
    }

    #[test]
    fn test_run_writes_sentinel_first() {
        let hits = vec![hit(1, 0.0, 0.0, 0.0), hit(1, 0.0, 0.0, 1.0), hit(2, 5.0, 5.0, 5.0)];
        let reconstructor = Reconstructor::new(ReconstructionConfig::default()).unwrap();
        let (records, stats) = reconstructor.run_to_vec(&hits).unwrap();

        assert_eq!(records.len(), 3);
        assert_eq!(records[0], EventRecord::sentinel(101));
        assert_eq!(records[1].sm_event_num, 1);
        assert_eq!(records[2].sm_event_num, 2);
        assert_eq!(stats.events, 2);
        assert_eq!(stats.degenerate, 1);
        assert_eq!(stats.total_hits, 3);
    }

    #[test]
    fn test_run_empty_stream() {
        let reconstructor = Reconstructor::default();
        let (records, stats) = reconstructor.run_to_vec(&[]).unwrap();
        assert_eq!(records, vec![EventRecord::sentinel(0)]);
        assert_eq!(stats.events, 0);
    }

    #[test]
    fn test_configured_file_num_wins() {
        let hits = vec![hit(1, 0.0, 0.0, 0.0)];
        let config = ReconstructionConfig::new().with_file_num(7);
        let (records, _) = Reconstructor::new(config).unwrap().run_to_vec(&hits).unwrap();
        assert!(records.iter().all(|r| r.file_num == 7));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReconstructionConfig::new().with_batch_events(0);
        assert!(Reconstructor::new(config).is_err());
    }
}
