//! Scrollable cursor over a paginated download session.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::window::CacheWindow;
use super::{capped_total, validate_fetch_size, Cursor, FetchDirection, MAX_READ_ATTEMPTS};
use crate::error::{Error, Result};
use crate::remote::{DownloadSession, RecordReader};
use crate::session::ResultSession;
use crate::types::{Row, RowDecoder, RowSchema};

/// Random-access cursor with a single sliding cache window.
///
/// Positions are 0-based: `-1` is before the first row and `total_rows` is
/// after the last. Movement never touches the service; rows are fetched
/// when `row()` lands outside the cached window, as the aligned block of
/// `fetch_size` rows containing the position.
pub struct ScrollCursor<S: DownloadSession> {
    session: Option<ResultSession<S>>,
    decoder: RowDecoder,
    schema: Arc<RowSchema>,
    window: Option<CacheWindow>,
    position: i64,
    total_rows: u64,
    fetch_size: u32,
    direction: FetchDirection,
    closed: bool,
}

impl<S: DownloadSession> ScrollCursor<S> {
    /// Create a cursor over `session`. `max_rows` of 0 means unlimited.
    pub fn new(session: ResultSession<S>, fetch_size: u32, max_rows: u64) -> Self {
        let schema = Arc::clone(session.schema());
        let total_rows = capped_total(session.record_count(), max_rows);
        debug!(
            session_id = session.id(),
            total_rows, fetch_size, "open scroll cursor"
        );
        Self {
            decoder: RowDecoder::new(Arc::clone(&schema)),
            schema,
            session: Some(session),
            window: None,
            position: -1,
            total_rows,
            fetch_size: fetch_size.max(1),
            direction: FetchDirection::default(),
            closed: false,
        }
    }

    pub fn total_rows(&self) -> u64 {
        self.total_rows
    }

    /// Current 0-based position, `-1` before the first row.
    pub fn position(&self) -> i64 {
        self.position
    }

    pub fn fetch_direction(&self) -> FetchDirection {
        self.direction
    }

    /// Record an access-order hint. Does not change fetch behavior.
    pub fn set_fetch_direction(&mut self, direction: FetchDirection) -> Result<()> {
        self.check_open()?;
        info!(direction = %direction, "fetch direction is advisory only");
        self.direction = direction;
        Ok(())
    }

    /// Start of the cached window, if one is loaded.
    pub fn window_start(&self) -> Option<u64> {
        self.window.as_ref().map(CacheWindow::start)
    }

    fn end(&self) -> i64 {
        self.total_rows as i64
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(Error::CursorClosed);
        }
        Ok(())
    }

    /// Move to `target`, clamping to a sentinel when out of range.
    fn move_to(&mut self, target: i64) -> bool {
        if target < 0 {
            self.position = -1;
            false
        } else if target >= self.end() {
            self.position = self.end();
            false
        } else {
            self.position = target;
            true
        }
    }

    /// Move to row `n`: 1-based from the start when positive, counted from
    /// the end when negative, before the first row when zero.
    pub fn absolute(&mut self, n: i64) -> Result<bool> {
        self.check_open()?;
        if n == 0 {
            self.position = -1;
            return Ok(false);
        }
        let target = if n > 0 { n - 1 } else { self.end() + n };
        Ok(self.move_to(target))
    }

    /// Move `k` rows from the current position.
    pub fn relative(&mut self, k: i64) -> Result<bool> {
        self.check_open()?;
        Ok(self.move_to(self.position.saturating_add(k)))
    }

    pub fn previous(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.position < 0 {
            return Ok(false);
        }
        Ok(self.move_to(self.position - 1))
    }

    pub fn first(&mut self) -> Result<bool> {
        self.check_open()?;
        self.position = 0;
        Ok(self.total_rows > 0)
    }

    pub fn last(&mut self) -> Result<bool> {
        self.check_open()?;
        self.position = self.end() - 1;
        Ok(self.total_rows > 0)
    }

    pub fn before_first(&mut self) -> Result<()> {
        self.check_open()?;
        self.position = -1;
        Ok(())
    }

    pub fn after_last(&mut self) -> Result<()> {
        self.check_open()?;
        self.position = self.end();
        Ok(())
    }

    pub fn is_before_first(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.position == -1)
    }

    pub fn is_after_last(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.position == self.end())
    }

    pub fn is_first(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.total_rows > 0 && self.position == 0)
    }

    pub fn is_last(&self) -> Result<bool> {
        self.check_open()?;
        Ok(self.total_rows > 0 && self.position == self.end() - 1)
    }

    fn on_row(&self) -> bool {
        self.position >= 0 && self.position < self.end()
    }

    /// Replace the cached window with the one containing `position`.
    async fn fetch_window(&mut self, position: u64) -> Result<()> {
        let (start, count) = CacheWindow::bounds(position, self.fetch_size, self.total_rows);
        self.window = None;

        let mut attempts = 0u32;
        let rows = loop {
            match self.read_range(start, count).await {
                Ok(rows) => break rows,
                Err(e) if e.is_transient() => {
                    attempts += 1;
                    if attempts >= MAX_READ_ATTEMPTS {
                        return Err(Error::TooManyRetries {
                            offset: start,
                            attempts,
                            message: e.to_string(),
                        });
                    }
                    warn!(start, count, attempt = attempts, error = %e, "window fetch failed, retrying");
                }
                Err(e) => return Err(e),
            }
        };

        let window = CacheWindow::new(start, count, rows);
        if window.is_short() {
            warn!(start, count, "service returned fewer rows than requested");
        }
        self.window = Some(window);
        Ok(())
    }

    async fn read_range(&mut self, start: u64, count: u64) -> Result<Vec<Row>> {
        let began = Instant::now();
        let session = self.session.as_ref().ok_or(Error::CursorClosed)?;
        let mut reader = session.open_reader(start, count).await?;

        let mut rows = Vec::with_capacity(count as usize);
        while (rows.len() as u64) < count {
            match reader.read().await? {
                Some(record) => rows.push(self.decoder.decode(record)?),
                None => break,
            }
        }

        let kb = reader.total_bytes() as f64 / 1024.0;
        if let Err(e) = reader.close().await {
            debug!(error = %e, "close window reader");
        }
        let elapsed = began.elapsed().as_secs_f64().max(0.001);
        info!(
            start,
            count,
            rows = rows.len(),
            kb = kb as u64,
            kb_per_sec = (kb / elapsed) as u64,
            "fetch records"
        );
        Ok(rows)
    }
}

impl<S: DownloadSession> Cursor for ScrollCursor<S> {
    fn schema(&self) -> &Arc<RowSchema> {
        &self.schema
    }

    fn row_number(&self) -> u64 {
        if self.on_row() {
            self.position as u64 + 1
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

    /// Change the window size. The cached window is dropped; the position is kept.
    fn set_fetch_size(&mut self, size: u32) -> Result<()> {
        validate_fetch_size(size)?;
        self.fetch_size = size;
        self.window = None;
        Ok(())
    }

    async fn next(&mut self) -> Result<bool> {
        self.check_open()?;
        if self.position >= self.end() {
            return Ok(false);
        }
        Ok(self.move_to(self.position + 1))
    }

    async fn row(&mut self) -> Result<&Row> {
        self.check_open()?;
        if !self.on_row() {
            return Err(Error::NoCurrentRow {
                position: self.position,
            });
        }

        let position = self.position as u64;
        let cached = self.window.as_ref().is_some_and(|w| w.covers(position));
        if !cached {
            self.fetch_window(position).await?;
        }

        match self.window.as_ref().and_then(|w| w.get(position)) {
            Some(Some(row)) => Ok(row),
            _ => Err(Error::RowUnavailable { row: position }),
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.window = None;
        self.session = None;
        debug!("the result set has been closed");
        Ok(())
    }
}
