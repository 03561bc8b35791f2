//! Forward-only cursor over a paginated download session.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::{capped_total, validate_fetch_size, Cursor, MAX_READ_ATTEMPTS, PROGRESS_LOG_ROWS};
use crate::error::{Error, Result};
use crate::remote::{DownloadSession, RecordReader};
use crate::session::ResultSession;
use crate::types::{Row, RowDecoder, RowSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Active,
    Exhausted,
    Closed,
}

/// Streams rows in order, one reader at a time.
///
/// The reader is opened lazily on the first `next()` and covers every row
/// not yet fetched. When a read fails with a transient error the reader is
/// discarded and a new one is opened at the current offset, up to
/// `MAX_READ_ATTEMPTS` times per row. The cursor closes itself once the
/// last row has been consumed.
pub struct ForwardCursor<S: DownloadSession> {
    session: Option<ResultSession<S>>,
    reader: Option<S::Reader>,
    decoder: RowDecoder,
    schema: Arc<RowSchema>,
    current: Option<Row>,
    fetched: u64,
    total_rows: u64,
    fetch_size: u32,
    state: State,
    started: Instant,
}

impl<S: DownloadSession> ForwardCursor<S> {
    /// Create a cursor over `session`. `max_rows` of 0 means unlimited.
    pub fn new(session: ResultSession<S>, fetch_size: u32, max_rows: u64) -> Self {
        let schema = Arc::clone(session.schema());
        let total_rows = capped_total(session.record_count(), max_rows);
        debug!(
            session_id = session.id(),
            total_rows, fetch_size, "open forward cursor"
        );
        Self {
            decoder: RowDecoder::new(Arc::clone(&schema)),
            schema,
            session: Some(session),
            reader: None,
            current: None,
            fetched: 0,
            total_rows,
            fetch_size: fetch_size.max(1),
            state: State::Active,
            started: Instant::now(),
        }
    }

    /// Rows this cursor will yield in total.
    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Whether the last row has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.fetched >= self.total_rows || self.state == State::Exhausted
    }

    fn check_open(&self) -> Result<()> {
        if self.state == State::Closed {
            return Err(Error::CursorClosed);
        }
        Ok(())
    }

    /// The current reader, opening one over the remaining rows if needed.
    async fn reader(&mut self) -> Result<&mut S::Reader> {
        if self.reader.is_none() {
            let session = self.session.as_ref().ok_or(Error::CursorClosed)?;
            let count = self.total_rows - self.fetched;
            info!(start = self.fetched, count, "open read record");
            let reader = session.open_reader(self.fetched, count).await?;
            self.reader = Some(reader);
        }
        self.reader.as_mut().ok_or(Error::CursorClosed)
    }

    async fn discard_reader(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            if let Err(e) = reader.close().await {
                debug!(error = %e, "close broken reader");
            }
        }
    }

    fn bytes_read(&self) -> u64 {
        self.reader.as_ref().map_or(0, |r| r.total_bytes())
    }

    fn log_progress(&self) {
        if self.fetched % PROGRESS_LOG_ROWS != 0 {
            return;
        }
        let elapsed = self.started.elapsed().as_secs_f64().max(0.001);
        let kb = self.bytes_read() as f64 / 1024.0;
        info!(
            rows = self.fetched,
            kb = kb as u64,
            kb_per_sec = (kb / elapsed) as u64,
            "fetched records"
        );
    }

    async fn finish(&mut self) {
        self.state = State::Exhausted;
        info!(
            rows = self.fetched,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "fetched all records"
        );
        if let Err(e) = self.close().await {
            debug!(error = %e, "close reader after last record");
        }
    }
}

impl<S: DownloadSession> Cursor for ForwardCursor<S> {
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
        self.state == State::Closed
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
        self.check_open()?;
        if self.fetched >= self.total_rows {
            self.finish().await;
            return Ok(false);
        }

        let mut attempts = 0u32;
        loop {
            let read = match self.reader().await {
                Ok(reader) => reader.read().await,
                Err(e) => Err(e),
            };

            match read {
                Ok(Some(record)) => {
                    // the record is consumed even if it fails to decode
                    self.fetched += 1;
                    self.current = None;
                    let row = self.decoder.decode(record)?;
                    self.current = Some(row);
                    self.log_progress();
                    return Ok(true);
                }
                Ok(None) => {
                    warn!(
                        fetched = self.fetched,
                        expected = self.total_rows,
                        "reader ended before the expected row count"
                    );
                    self.finish().await;
                    return Ok(false);
                }
                Err(e) if e.is_transient() => {
                    attempts += 1;
                    self.discard_reader().await;
                    if attempts >= MAX_READ_ATTEMPTS {
                        return Err(Error::TooManyRetries {
                            offset: self.fetched,
                            attempts,
                            message: e.to_string(),
                        });
                    }
                    info!(offset = self.fetched, attempt = attempts, error = %e, "read from a bad file, retrying");
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn row(&mut self) -> Result<&Row> {
        self.check_open()?;
        self.current.as_ref().ok_or(Error::NoCurrentRow {
            position: self.fetched as i64 - 1,
        })
    }

    async fn close(&mut self) -> Result<()> {
        if self.state == State::Closed {
            return Ok(());
        }
        self.state = State::Closed;
        self.current = None;
        self.session = None;
        if let Some(mut reader) = self.reader.take() {
            reader.close().await?;
        }
        debug!(rows = self.fetched, "the result set has been closed");
        Ok(())
    }
}
