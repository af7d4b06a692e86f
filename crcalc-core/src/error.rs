//! Error types for crcalc-core.

use thiserror::Error;

/// Result type alias for crcalc operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for reconstruction.
#[derive(Error, Debug)]
pub enum Error {
    /// A real event reached the per-event computations without any hits.
    ///
    /// Only the sentinel event may be empty, and it never reaches them.
    #[error("SM event {event_id} has no hits")]
    EmptyEvent { event_id: i64 },

    /// Configuration error.
    #[error("configuration error: {0}")]
    InvalidConfig(String),

    /// Output sink rejected a record.
    #[error("record sink error: {0}")]
    Sink(String),

    /// I/O error raised by a sink.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
