//! crcalc-io: File I/O for crcalc.
//!
//! Hits are read from CSV, fixed-size little-endian binary (memory-mapped
//! via memmap2) or, with the `hdf5` feature, HDF5 files. Event records are
//! written to the same three formats through [`RecordWriter`], which
//! implements [`crcalc_core::RecordSink`].
//!

pub mod config;
mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
pub mod scanner;
mod writer;

pub use config::{config_from_json, load_config};
pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_hits_hdf5, write_hits_hdf5, Hdf5RecordSink};
pub use reader::{decode_hit, HitFileReader, HitFormat, MappedFileReader, HIT_RECORD_SIZE};
pub use scanner::{scan_hits, StreamSummary};
pub use writer::{
    encode_record, write_hits, BinaryRecordWriter, CsvRecordWriter, RecordFormat, RecordWriter,
    RECORD_SIZE,
};
