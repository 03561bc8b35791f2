//! In-memory block of decoded rows backing the scrollable cursor.

use crate::types::Row;

/// A block of consecutive rows starting at a multiple of the fetch size.
///
/// `None` entries mark rows the service failed to deliver (short read).
/// A window is replaced wholesale on a miss, never patched.
#[derive(Debug)]
pub struct CacheWindow {
    start: u64,
    rows: Vec<Option<Row>>,
    short_read: bool,
}

impl CacheWindow {
    /// The `(start, count)` of the window containing `position`.
    ///
    /// `start` is `position` rounded down to a multiple of `fetch_size`;
    /// `count` is clamped so the window ends at `total_rows`.
    pub fn bounds(position: u64, fetch_size: u32, total_rows: u64) -> (u64, u64) {
        let fetch_size = u64::from(fetch_size.max(1));
        let start = position / fetch_size * fetch_size;
        let count = fetch_size.min(total_rows.saturating_sub(start));
        (start, count)
    }

    /// Build a window from the rows actually read.
    ///
    /// Pads with end-of-data sentinels when fewer than `count` rows arrived.
    pub fn new(start: u64, count: u64, mut rows: Vec<Row>) -> Self {
        let delivered = rows.len() as u64;
        rows.truncate(count as usize);
        let mut slots: Vec<Option<Row>> = rows.into_iter().map(Some).collect();
        slots.resize_with(count as usize, || None);
        Self {
            start,
            rows: slots,
            short_read: delivered < count,
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Logical size: the number of rows the window was asked to hold.
    pub fn size(&self) -> u64 {
        self.rows.len() as u64
    }

    /// Whether the service delivered fewer rows than requested.
    pub fn is_short(&self) -> bool {
        self.short_read
    }

    pub fn covers(&self, position: u64) -> bool {
        position >= self.start && position < self.start + self.size()
    }

    /// The slot for `position`: `Some(None)` is a sentinel, `None` means not covered.
    pub fn get(&self, position: u64) -> Option<Option<&Row>> {
        if !self.covers(position) {
            return None;
        }
        self.rows
            .get((position - self.start) as usize)
            .map(Option::as_ref)
    }
}
