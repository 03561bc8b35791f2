//! Forward-only cursor over an interactive result stream.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info};

use super::{validate_fetch_size, Cursor};
use crate::error::{Error, Result};
use crate::remote::RecordStream;
use crate::types::{Row, RowDecoder, RowSchema};

/// Reads rows straight off a live stream.
///
/// The stream cannot be repositioned, so there is no retry: a read error is
/// returned as is. With `max_rows` set the cursor stops after that many rows.
pub struct SessionForwardCursor<R: RecordStream> {
    stream: Option<R>,
    decoder: RowDecoder,
    schema: Arc<RowSchema>,
    current: Option<Row>,
    fetched: u64,
    total_rows: u64,
    fetch_size: u32,
    closed: bool,
    started: Instant,
}

impl<R: RecordStream> SessionForwardCursor<R> {
    /// Create a cursor over `stream`. `max_rows` of 0 means unlimited.
    pub fn new(stream: R, fetch_size: u32, max_rows: u64) -> Result<Self> {
        let schema = Arc::new(RowSchema::from_metadata(stream.schema())?);
        let total_rows = if max_rows > 0 { max_rows } else { u64::MAX };
        Ok(Self {
            decoder: RowDecoder::new(Arc::clone(&schema)),
            schema,
            stream: Some(stream),
            current: None,
            fetched: 0,
            total_rows,
            fetch_size: fetch_size.max(1),
            closed: false,
            started: Instant::now(),
        })
    }

    async fn finish(&mut self) -> Result<()> {
        info!(
            rows = self.fetched,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "fetched all records"
        );
        self.close().await
    }
}

impl<R: RecordStream> Cursor for SessionForwardCursor<R> {
    fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    fn row_number(&self) -> u64 {
        if self.current.is_some() {
            self.fetched
        } else {
            0
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn fetch_size(&self) -> u32 {
        self.fetch_size
    }

    fn set_fetch_size(&mut self, size: u32) -> Result<()> {
        validate_fetch_size(size)?;
        self.fetch_size = size;
        Ok(())
    }

    async fn next(&mut self) -> Result<bool> {
        if self.closed {
            return Err(Error::CursorClosed);
        }
        if self.fetched >= self.total_rows {
            self.finish().await?;
            return Ok(false);
        }

        let stream = self.stream.as_mut().ok_or(Error::CursorClosed)?;
        let record = stream.next_record().await?;
        match record {
            Some(record) => {
                self.current = Some(self.decoder.decode(record)?);
                self.fetched += 1;
                Ok(true)
            }
            None => {
                self.finish().await?;
                Ok(false)
            }
        }
    }

    async fn row(&mut self) -> Result<&Row> {
        if self.closed {
            return Err(Error::CursorClosed);
        }
        self.current.as_ref().ok_or(Error::NoCurrentRow {
            position: self.fetched as i64 - 1,
        })
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.current = None;
        self.stream = None;
        debug!(rows = self.fetched, "the result set has been closed");
        Ok(())
    }
}
