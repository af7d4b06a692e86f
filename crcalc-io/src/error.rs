//! I/O error types.

use thiserror::Error;

/// Result type for I/O operations.
pub type Result<T> = std::result::Result<T, Error>;

/// I/O error types.
#[derive(Error, Debug)]
pub enum Error {
    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parse or write error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration file error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid file format.
    #[error("invalid file format: {0}")]
    InvalidFormat(String),

    /// HDF5 library error.
    #[cfg(feature = "hdf5")]
    #[error("HDF5 error: {0}")]
    Hdf5(#[from] hdf5::Error),

    /// Core library error.
    #[error("core error: {0}")]
    Core(#[from] crcalc_core::Error),
}

impl From<Error> for crcalc_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(e) => Self::Io(e),
            Error::Core(e) => e,
            other => Self::Sink(other.to_string()),
        }
    }
}
