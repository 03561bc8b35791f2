//! Cursors for iterating over query results.
//!
//! The `Cursor` trait defines the common interface. Three implementations
//! cover the ways the service exposes results:
//!
//! - `ForwardCursor`: one pass over a paginated download session, reopening
//!   the reader at the current offset when a read fails.
//! - `ScrollCursor`: random access over a download session through a single
//!   sliding `CacheWindow`.
//! - `SessionForwardCursor`: one pass over a live interactive result stream.
//!
//! `ResultCursor` is the tagged union a statement hands out.

mod forward;
mod scroll;
mod session_forward;
mod window;

pub use forward::ForwardCursor;
pub use scroll::ScrollCursor;
pub use session_forward::SessionForwardCursor;
pub use window::CacheWindow;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::Stream;

use crate::error::{Error, Result};
use crate::remote::{Backend, InteractiveService, TransferService};
use crate::types::{Column, Row, RowSchema, Value};

/// Attempts a paginated cursor makes on one read before giving up.
///
/// Applies to the forward cursor's reader and the scrollable cursor's
/// window fetch alike.
pub const MAX_READ_ATTEMPTS: u32 = 5;

/// Rows between two throughput log lines of a forward cursor.
pub(crate) const PROGRESS_LOG_ROWS: u64 = 100_000;

/// Advisory hint about the order rows will be accessed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchDirection {
    Forward,
    Reverse,
    #[default]
    Unknown,
}

impl fmt::Display for FetchDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchDirection::Forward => write!(f, "FORWARD"),
            FetchDirection::Reverse => write!(f, "REVERSE"),
            FetchDirection::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Base trait for all cursor types.
///
/// # Example
///
/// ```no_run
/// use odps_query_rs::{Cursor, Result};
///
/// // Generic function that works with any cursor type
/// async fn sum_first_column<C: Cursor>(cursor: &mut C) -> Result<i64> {
///     let mut total = 0;
///     while cursor.next().await? {
///         total += cursor.value_at(0).await?.to_i64().unwrap_or(0);
///     }
///     Ok(total)
/// }
/// ```
pub trait Cursor: Send {
    /// Schema of the rows this cursor yields.
    fn schema(&self) -> &Arc<RowSchema>;

    /// Column information.
    fn columns(&self) -> &[Column] {
        &self.schema().columns
    }

    /// 1-based number of the current row, 0 when there is none.
    fn row_number(&self) -> u64;

    /// Check if the cursor is closed.
    fn is_closed(&self) -> bool;

    /// Rows per fetch.
    fn fetch_size(&self) -> u32;

    /// Set the number of rows per fetch. Zero is rejected.
    fn set_fetch_size(&mut self, size: u32) -> Result<()>;

    /// Advance to the next row. Returns `Ok(false)` when there is none.
    fn next(&mut self) -> impl Future<Output = Result<bool>> + Send;

    /// The row under the cursor.
    fn row(&mut self) -> impl Future<Output = Result<&Row>> + Send;

    /// Value of one column (0-based) of the row under the cursor.
    fn value_at(&mut self, index: usize) -> impl Future<Output = Result<Value>> + Send {
        async move {
            let row = self.row().await?;
            row.get(index)
                .cloned()
                .ok_or(Error::ColumnIndexOutOfBounds {
                    index,
                    count: row.len(),
                })
        }
    }

    /// Fetch all remaining rows.
    fn fetch_all(&mut self) -> impl Future<Output = Result<Vec<Row>>> + Send {
        async move {
            let mut rows = Vec::new();
            while self.next().await? {
                rows.push(self.row().await?.clone());
            }
            Ok(rows)
        }
    }

    /// Close the cursor and release its reader. Closing twice is a no-op.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}

pub(crate) fn validate_fetch_size(size: u32) -> Result<()> {
    if size == 0 {
        return Err(Error::invalid_argument("fetch size must be > 0"));
    }
    Ok(())
}

/// Row count a cursor exposes once `max_rows` (0 = unlimited) is applied.
pub(crate) fn capped_total(record_count: u64, max_rows: u64) -> u64 {
    if max_rows > 0 && max_rows <= record_count {
        max_rows
    } else {
        record_count
    }
}

/// The cursor a statement hands out.
pub enum ResultCursor<B: Backend> {
    Forward(ForwardCursor<<B as TransferService>::Session>),
    Scroll(ScrollCursor<<B as TransferService>::Session>),
    Session(SessionForwardCursor<<B as InteractiveService>::Stream>),
}

impl<B: Backend> fmt::Debug for ResultCursor<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variant = match self {
            ResultCursor::Forward(_) => "Forward",
            ResultCursor::Scroll(_) => "Scroll",
            ResultCursor::Session(_) => "Session",
        };
        f.debug_tuple(variant).finish_non_exhaustive()
    }
}

impl<B: Backend> ResultCursor<B> {
    /// The scrollable cursor, if this is one.
    pub fn as_scroll(&mut self) -> Option<&mut ScrollCursor<<B as TransferService>::Session>> {
        match self {
            ResultCursor::Scroll(cursor) => Some(cursor),
            _ => None,
        }
    }

    pub fn is_scrollable(&self) -> bool {
        matches!(self, ResultCursor::Scroll(_))
    }
}

impl<B: Backend> Cursor for ResultCursor<B> {
    fn schema(&self) -> &Arc<RowSchema> {
        match self {
            ResultCursor::Forward(c) => c.schema(),
            ResultCursor::Scroll(c) => c.schema(),
            ResultCursor::Session(c) => c.schema(),
        }
    }

    fn row_number(&self) -> u64 {
        match self {
            ResultCursor::Forward(c) => c.row_number(),
            ResultCursor::Scroll(c) => c.row_number(),
            ResultCursor::Session(c) => c.row_number(),
        }
    }

    fn is_closed(&self) -> bool {
        match self {
            ResultCursor::Forward(c) => c.is_closed(),
            ResultCursor::Scroll(c) => c.is_closed(),
            ResultCursor::Session(c) => c.is_closed(),
        }
    }

    fn fetch_size(&self) -> u32 {
        match self {
            ResultCursor::Forward(c) => c.fetch_size(),
            ResultCursor::Scroll(c) => c.fetch_size(),
            ResultCursor::Session(c) => c.fetch_size(),
        }
    }

    fn set_fetch_size(&mut self, size: u32) -> Result<()> {
        match self {
            ResultCursor::Forward(c) => c.set_fetch_size(size),
            ResultCursor::Scroll(c) => c.set_fetch_size(size),
            ResultCursor::Session(c) => c.set_fetch_size(size),
        }
    }

    async fn next(&mut self) -> Result<bool> {
        match self {
            ResultCursor::Forward(c) => c.next().await,
            ResultCursor::Scroll(c) => c.next().await,
            ResultCursor::Session(c) => c.next().await,
        }
    }

    async fn row(&mut self) -> Result<&Row> {
        match self {
            ResultCursor::Forward(c) => c.row().await,
            ResultCursor::Scroll(c) => c.row().await,
            ResultCursor::Session(c) => c.row().await,
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self {
            ResultCursor::Forward(c) => c.close().await,
            ResultCursor::Scroll(c) => c.close().await,
            ResultCursor::Session(c) => c.close().await,
        }
    }
}

/// Extension trait for converting a Cursor to a Stream of rows.
///
/// # Example
///
/// ```no_run
/// use futures::stream::TryStreamExt;
/// use odps_query_rs::{Cursor, CursorStreamExt, Result, Row};
///
/// async fn collect<C: Cursor + Unpin>(cursor: C) -> Result<Vec<Row>> {
///     cursor.into_stream().try_collect().await
/// }
/// ```
pub trait CursorStreamExt: Cursor + Sized {
    /// Convert this cursor into a Stream yielding `Result<Row>`.
    ///
    /// The stream takes ownership of the cursor and ends after the first error.
    fn into_stream(self) -> impl Stream<Item = Result<Row>>;
}

impl<C: Cursor + Unpin> CursorStreamExt for C {
    fn into_stream(self) -> impl Stream<Item = Result<Row>> {
        use futures::stream;

        stream::unfold(Some(self), |opt_cursor| async move {
            let mut cursor = opt_cursor?;
            match cursor.next().await {
                Ok(true) => {
                    let row = cursor.row().await.cloned();
                    match row {
                        Ok(row) => Some((Ok(row), Some(cursor))),
                        Err(e) => Some((Err(e), None)),
                    }
                }
                Ok(false) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_total() {
        assert_eq!(capped_total(100, 0), 100);
        assert_eq!(capped_total(100, 10), 10);
        assert_eq!(capped_total(100, 100), 100);
        assert_eq!(capped_total(100, 500), 100);
    }

    #[test]
    fn test_validate_fetch_size() {
        assert!(validate_fetch_size(1).is_ok());
        assert!(matches!(
            validate_fetch_size(0),
            Err(Error::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_fetch_direction_default() {
        assert_eq!(FetchDirection::default(), FetchDirection::Unknown);
        assert_eq!(FetchDirection::Reverse.to_string(), "REVERSE");
    }
}
