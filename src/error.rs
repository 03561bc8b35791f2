//! Error types for the query client.

use std::io;
use thiserror::Error;

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for query client operations.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error while talking to the remote service.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The remote job ended in failure.
    #[error("execute sql [{sql}] failed: {reason} (trace: {trace_url})")]
    ExecutionFailed {
        sql: String,
        reason: String,
        trace_url: String,
    },

    /// The remote job was stopped before it completed.
    #[error("execute instance cancelled: job {job_id}")]
    ExecutionCancelled { job_id: String },

    /// A download session could not be created for the job output.
    #[error("create download session failed: job {job_id}: {message}")]
    SessionOpenFailed { job_id: String, message: String },

    /// The transfer layer cannot serve the full result directly.
    ///
    /// Raised by transfer implementations; the session factory answers it by
    /// falling back to a limited session.
    #[error("direct download unavailable: {message}")]
    DirectDownloadUnavailable { message: String },

    /// A read from a record reader failed in a way that may succeed on reopen.
    #[error("read failed at offset {offset}: {message}")]
    TransientRead { offset: u64, message: String },

    /// Reads kept failing after the reader was reopened repeatedly.
    #[error("too many retries at offset {offset} after {attempts} attempts: {message}")]
    TooManyRetries {
        offset: u64,
        attempts: u32,
        message: String,
    },

    /// A job control call failed.
    #[error("{operation} failed for job {job_id}: {message}")]
    Remote {
        operation: &'static str,
        job_id: String,
        message: String,
    },

    /// The cursor has been closed.
    #[error("The result set has been closed")]
    CursorClosed,

    /// The statement has been closed.
    #[error("The statement has been closed")]
    StatementClosed,

    /// Row access without a current row.
    #[error("No current row: position {position}")]
    NoCurrentRow { position: i64 },

    /// The service reported fewer rows than it claimed.
    #[error("No more records available, row={row}")]
    RowUnavailable { row: u64 },

    /// The executed statement did not produce a result set.
    #[error("statement produced no result set: {sql}")]
    NoResultSet { sql: String },

    /// Operation not supported in the current mode.
    #[error("{operation} is not supported in {mode} mode")]
    Unsupported {
        operation: &'static str,
        mode: &'static str,
    },

    /// Invalid argument from the caller.
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },

    /// A raw cell could not be decoded into its column type.
    #[error("Failed to decode column {column}: {message}")]
    Decode { column: String, message: String },

    /// Type conversion error.
    #[error("Type conversion error: {message}")]
    TypeConversion { message: String },

    /// Type name not understood.
    #[error("Unsupported data type: {type_name}")]
    UnsupportedType { type_name: String },

    /// Column not found.
    #[error("Column not found: {name}")]
    ColumnNotFound { name: String },

    /// Column index out of bounds.
    #[error("Column index {index} out of bounds (columns: {count})")]
    ColumnIndexOutOfBounds { index: usize, count: usize },
}

impl Error {
    /// Create a job control error.
    pub fn remote(
        operation: &'static str,
        job_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Remote {
            operation,
            job_id: job_id.into(),
            message: message.into(),
        }
    }

    /// Create a transient read error.
    pub fn transient_read(offset: u64, message: impl Into<String>) -> Self {
        Self::TransientRead {
            offset,
            message: message.into(),
        }
    }

    /// Create a type conversion error.
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Whether a cursor may recover from this error by reopening its reader.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Io(_) | Error::TransientRead { .. })
    }
}
