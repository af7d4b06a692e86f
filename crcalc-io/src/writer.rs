//! Event record and hit writers.

use crate::reader::{CsvHit, HitFormat, HIT_RECORD_SIZE};
use crate::Result;
use crcalc_core::{EventRecord, Hit, RecordSink, RECORD_COLUMNS};
use log::warn;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Size of one binary event record in bytes.
///
/// Layout (little-endian): u32 `h5_file_num`, i64 `SM_event_num`,
/// u32 `num_hits`, u32 `sum_tots`, then nine f64 in column order.
pub const RECORD_SIZE: usize = 92;

/// Encodes one event record in the binary layout.
#[must_use]
pub fn encode_record(record: &EventRecord) -> [u8; RECORD_SIZE] {
    let mut out = [0u8; RECORD_SIZE];
    out[0..4].copy_from_slice(&record.file_num.to_le_bytes());
    out[4..12].copy_from_slice(&record.sm_event_num.to_le_bytes());
    out[12..16].copy_from_slice(&record.num_hits.to_le_bytes());
    out[16..20].copy_from_slice(&record.sum_tots.to_le_bytes());

    let floats = [
        record.mean_x,
        record.mean_y,
        record.mean_z,
        record.line_fit_params[0],
        record.line_fit_params[1],
        record.line_fit_params[2],
        record.line_fit_params[3],
        record.sum_of_squares,
        record.fraction_inside_sphere,
    ];
    for (slot, value) in out[20..].chunks_exact_mut(8).zip(floats) {
        slot.copy_from_slice(&value.to_le_bytes());
    }
    out
}

/// CSV row in output column order.
#[derive(Serialize)]
struct CsvRecordRow {
    h5_file_num: u32,
    sm_event_num: i64,
    num_hits: u32,
    sum_tots: u32,
    mean_x: f64,
    mean_y: f64,
    mean_z: f64,
    line_fit_param0: f64,
    line_fit_param1: f64,
    line_fit_param2: f64,
    line_fit_param3: f64,
    sum_of_squares: f64,
    fraction_inside_sphere: f64,
}

impl From<&EventRecord> for CsvRecordRow {
    fn from(r: &EventRecord) -> Self {
        let [p0, p1, p2, p3] = r.line_fit_params;
        Self {
            h5_file_num: r.file_num,
            sm_event_num: r.sm_event_num,
            num_hits: r.num_hits,
            sum_tots: r.sum_tots,
            mean_x: r.mean_x,
            mean_y: r.mean_y,
            mean_z: r.mean_z,
            line_fit_param0: p0,
            line_fit_param1: p1,
            line_fit_param2: p2,
            line_fit_param3: p3,
            sum_of_squares: r.sum_of_squares,
            fraction_inside_sphere: r.fraction_inside_sphere,
        }
    }
}

/// Writes event records as CSV with a header row.
pub struct CsvRecordWriter {
    writer: csv::Writer<File>,
}

impl CsvRecordWriter {
    /// Creates the file and writes the header.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)?;
        writer.write_record(RECORD_COLUMNS)?;
        Ok(Self { writer })
    }

    /// Appends one record.
    ///
    /// # Errors
    /// Returns an error if the row cannot be written.
    pub fn write(&mut self, record: &EventRecord) -> Result<()> {
        self.writer.serialize(CsvRecordRow::from(record))?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if buffered rows cannot be written.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Writes event records as fixed-size binary records.
pub struct BinaryRecordWriter {
    writer: BufWriter<File>,
}

impl BinaryRecordWriter {
    /// Creates the file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }

    /// Appends one record.
    ///
    /// # Errors
    /// Returns an error if the record cannot be written.
    pub fn write(&mut self, record: &EventRecord) -> Result<()> {
        self.writer.write_all(&encode_record(record))?;
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error if buffered records cannot be written.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// On-disk record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// CSV with the column header.
    Csv,
    /// Fixed-size little-endian records.
    Binary,
    /// HDF5 group `crcalc` with one dataset per column.
    Hdf5,
}

impl RecordFormat {
    /// Picks the format from the file extension, if it is a known one.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Self::Csv),
            "bin" | "dat" => Some(Self::Binary),
            "h5" | "hdf5" => Some(Self::Hdf5),
            _ => None,
        }
    }
}

/// Record sink writing to a file in any supported format.
pub enum RecordWriter {
    /// CSV output.
    Csv(CsvRecordWriter),
    /// Binary output.
    Binary(BinaryRecordWriter),
    /// HDF5 output.
    #[cfg(feature = "hdf5")]
    Hdf5(crate::hdf5::Hdf5RecordSink),
}

impl RecordWriter {
    /// Creates a writer, choosing the format from the extension.
    ///
    /// Unknown extensions fall back to binary.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = RecordFormat::from_path(path).unwrap_or_else(|| {
            warn!(
                "unknown output extension for '{}', defaulting to binary",
                path.display()
            );
            RecordFormat::Binary
        });
        Self::with_format(path, format)
    }

    /// Creates a writer with an explicit format.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or the format is not
    /// available in this build.
    pub fn with_format<P: AsRef<Path>>(path: P, format: RecordFormat) -> Result<Self> {
        match format {
            RecordFormat::Csv => Ok(Self::Csv(CsvRecordWriter::create(path)?)),
            RecordFormat::Binary => Ok(Self::Binary(BinaryRecordWriter::create(path)?)),
            #[cfg(feature = "hdf5")]
            RecordFormat::Hdf5 => Ok(Self::Hdf5(crate::hdf5::Hdf5RecordSink::create(path)?)),
            #[cfg(not(feature = "hdf5"))]
            RecordFormat::Hdf5 => Err(crate::Error::InvalidFormat(format!(
                "{}: HDF5 support is not enabled (build with the `hdf5` feature)",
                path.as_ref().display()
            ))),
        }
    }

    /// Output format.
    #[must_use]
    pub fn format(&self) -> RecordFormat {
        match self {
            Self::Csv(_) => RecordFormat::Csv,
            Self::Binary(_) => RecordFormat::Binary,
            #[cfg(feature = "hdf5")]
            Self::Hdf5(_) => RecordFormat::Hdf5,
        }
    }
}

impl RecordSink for RecordWriter {
    fn append(&mut self, record: &EventRecord) -> crcalc_core::Result<()> {
        match self {
            Self::Csv(w) => w.write(record)?,
            Self::Binary(w) => w.write(record)?,
            #[cfg(feature = "hdf5")]
            Self::Hdf5(w) => w.write(record)?,
        }
        Ok(())
    }

    fn finish(&mut self) -> crcalc_core::Result<()> {
        match self {
            Self::Csv(w) => w.flush()?,
            Self::Binary(w) => w.flush()?,
            #[cfg(feature = "hdf5")]
            Self::Hdf5(w) => w.flush()?,
        }
        Ok(())
    }
}

/// Writes hits to `path` in the format given by its extension.
///
/// # Errors
/// Returns an error if the extension is unknown or the file cannot be written.
pub fn write_hits<P: AsRef<Path>>(path: P, hits: &[Hit]) -> Result<()> {
    let path = path.as_ref();
    match HitFormat::from_path(path)? {
        HitFormat::Csv => write_hits_csv(path, hits),
        HitFormat::Binary => write_hits_binary(path, hits),
        #[cfg(feature = "hdf5")]
        HitFormat::Hdf5 => crate::hdf5::write_hits_hdf5(path, hits),
        #[cfg(not(feature = "hdf5"))]
        HitFormat::Hdf5 => Err(crate::Error::InvalidFormat(format!(
            "{}: HDF5 support is not enabled (build with the `hdf5` feature)",
            path.display()
        ))),
    }
}

fn write_hits_csv(path: &Path, hits: &[Hit]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for hit in hits {
        writer.serialize(CsvHit::from(hit))?;
    }
    writer.flush()?;
    Ok(())
}

fn write_hits_binary(path: &Path, hits: &[Hit]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut buf = [0u8; HIT_RECORD_SIZE];
    for h in hits {
        buf[0..4].copy_from_slice(&h.file_num.to_le_bytes());
        buf[4..12].copy_from_slice(&h.event_number.to_le_bytes());
        buf[12] = h.tot;
        buf[13] = h.relative_bcid;
        buf[14..22].copy_from_slice(&h.sm_event_num.to_le_bytes());
        buf[22..30].copy_from_slice(&h.x.to_le_bytes());
        buf[30..38].copy_from_slice(&h.y.to_le_bytes());
        buf[38..46].copy_from_slice(&h.z.to_le_bytes());
        writer.write_all(&buf)?;
    }
    writer.flush()?;
    Ok(())
}
