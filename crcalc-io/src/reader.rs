//! Hit file readers.
//!

use crate::{Error, Result};
use crcalc_core::Hit;
use log::debug;
use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

/// Size of one binary hit record in bytes.
///
/// Layout (little-endian): u32 `h5_file_num`, i64 `event_number`, u8 `tot`,
/// u8 `relative_BCID`, i64 `SM_event_num`, f64 `x`, f64 `y`, f64 `z`.
pub const HIT_RECORD_SIZE: usize = 46;

/// A memory-mapped file reader.
///
/// Uses memmap2 to access file contents without loading the entire file
/// into memory.
pub struct MappedFileReader {
    mmap: Mmap,
    path: PathBuf,
}

impl MappedFileReader {
    /// Opens a file for memory-mapped reading.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or memory-mapped.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)?;
        // SAFETY: The file is opened read-only and we assume it is not modified concurrently.
        #[allow(unsafe_code)]
        let mmap = unsafe { Mmap::map(&file)? };
        Ok(Self {
            mmap,
            path: path.as_ref().to_path_buf(),
        })
    }

    /// Returns the file contents as a byte slice.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.mmap[..]
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// Returns true if the file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }

    /// Path the reader was opened with.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes every fixed-size hit record in the file.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] if the file size is not a whole
    /// number of records.
    pub fn read_hits(&self) -> Result<Vec<Hit>> {
        let bytes = self.as_bytes();
        if bytes.len() % HIT_RECORD_SIZE != 0 {
            return Err(Error::InvalidFormat(format!(
                "{}: size {} is not a multiple of the {HIT_RECORD_SIZE}-byte hit record",
                self.path.display(),
                bytes.len()
            )));
        }
        Ok(bytes
            .chunks_exact(HIT_RECORD_SIZE)
            .filter_map(|chunk| <&[u8; HIT_RECORD_SIZE]>::try_from(chunk).ok())
            .map(decode_hit)
            .collect())
    }
}

/// Decodes one binary hit record.
///
#[must_use]
pub fn decode_hit(chunk: &[u8; HIT_RECORD_SIZE]) -> Hit {
    Hit {
        file_num: u32::from_le_bytes(field(chunk, 0)),
        event_number: i64::from_le_bytes(field(chunk, 4)),
        tot: chunk[12],
        relative_bcid: chunk[13],
        sm_event_num: i64::from_le_bytes(field(chunk, 14)),
        x: f64::from_le_bytes(field(chunk, 22)),
        y: f64::from_le_bytes(field(chunk, 30)),
        z: f64::from_le_bytes(field(chunk, 38)),
    }
}

fn field<const N: usize>(bytes: &[u8; HIT_RECORD_SIZE], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

/// One row of a hit CSV file.
#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct CsvHit {
    h5_file_num: u32,
    #[serde(default)]
    event_number: i64,
    tot: u8,
    #[serde(rename = "relative_BCID", default)]
    relative_bcid: u8,
    #[serde(rename = "SM_event_num")]
    sm_event_num: i64,
    x: f64,
    y: f64,
    z: f64,
}

impl From<CsvHit> for Hit {
    fn from(row: CsvHit) -> Self {
        Self {
            file_num: row.h5_file_num,
            event_number: row.event_number,
            tot: row.tot,
            relative_bcid: row.relative_bcid,
            sm_event_num: row.sm_event_num,
            x: row.x,
            y: row.y,
            z: row.z,
        }
    }
}

impl From<&Hit> for CsvHit {
    fn from(hit: &Hit) -> Self {
        Self {
            h5_file_num: hit.file_num,
            event_number: hit.event_number,
            tot: hit.tot,
            relative_bcid: hit.relative_bcid,
            sm_event_num: hit.sm_event_num,
            x: hit.x,
            y: hit.y,
            z: hit.z,
        }
    }
}

/// On-disk hit formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitFormat {
    /// Comma-separated text with a header row.
    Csv,
    /// Fixed-size little-endian records.
    Binary,
    /// HDF5 group `hits` with one dataset per column.
    Hdf5,
}

impl HitFormat {
    /// Picks the format from the file extension.
    ///
    /// # Errors
    /// Returns [`Error::InvalidFormat`] for unknown or missing extensions.
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(Self::Csv),
            "bin" | "dat" => Ok(Self::Binary),
            "h5" | "hdf5" => Ok(Self::Hdf5),
            _ => Err(Error::InvalidFormat(format!(
                "cannot infer hit format from '{}'",
                path.display()
            ))),
        }
    }
}

/// Reads a whole hit file into memory.
pub struct HitFileReader {
    path: PathBuf,
    format: HitFormat,
}

impl HitFileReader {
    /// Opens a hit file, inferring the format from its extension.
    ///
    /// # Errors
    /// Returns an error if the file does not exist or the extension is unknown.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = HitFormat::from_path(path)?;
        Self::with_format(path, format)
    }

    /// Opens a hit file with an explicit format.
    ///
    /// # Errors
    /// Returns an error if the file does not exist.
    pub fn with_format<P: AsRef<Path>>(path: P, format: HitFormat) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} not found", path.display()),
            )));
        }
        Ok(Self {
            path: path.to_path_buf(),
            format,
        })
    }

    /// Detected or requested format.
    #[must_use]
    pub fn format(&self) -> HitFormat {
        self.format
    }

    /// Reads every hit in file order.
    ///
    /// # Errors
    /// Returns an error if the file cannot be parsed.
    pub fn read_hits(&self) -> Result<Vec<Hit>> {
        let hits = match self.format {
            HitFormat::Csv => self.read_csv()?,
            HitFormat::Binary => MappedFileReader::open(&self.path)?.read_hits()?,
            HitFormat::Hdf5 => self.read_hdf5()?,
        };
        debug!("read {} hits from {}", hits.len(), self.path.display());
        Ok(hits)
    }

    fn read_csv(&self) -> Result<Vec<Hit>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(&self.path)?;
        reader
            .deserialize::<CsvHit>()
            .map(|row| row.map(Hit::from).map_err(Error::from))
            .collect()
    }

    #[cfg(feature = "hdf5")]
    fn read_hdf5(&self) -> Result<Vec<Hit>> {
        crate::hdf5::read_hits_hdf5(&self.path)
    }

    #[cfg(not(feature = "hdf5"))]
    fn read_hdf5(&self) -> Result<Vec<Hit>> {
        Err(Error::InvalidFormat(format!(
            "{}: HDF5 support is not enabled (build with the `hdf5` feature)",
            self.path.display()
        )))
    }
}
