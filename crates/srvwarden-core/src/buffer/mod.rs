//! Bookmarked streaming buffers.
//!
//! A [`StreamBuffer`] is an append-only, bounded list of text lines with an
//! optional terminal outcome. Any number of consumers tail the same buffer
//! through bookmarks: opaque ids that map to a read cursor. Each read hands
//! back a (possibly new) bookmark, so consumers never interfere with each
//! other's position.
//!
//! When the buffer exceeds its capacity the oldest lines are evicted and
//! every cursor is rebased by the evicted count, so a slow consumer loses the
//! evicted lines but never reads past or before valid data.

mod filters;
mod registry;

pub use filters::{LineFilter, strip_ansi, trim_trailing_whitespace};
pub use registry::BufferRegistry;

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Default number of lines kept before eviction starts.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Upper bound on remembered bookmarks per buffer; the least recently used
/// are forgotten.
pub const MAX_BOOKMARKS: usize = 1024;

/// Errors raised by buffer and registry reads.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// No buffer is registered under this id.
    #[error("Unknown buffer: {0}")]
    UnknownUuid(BufferId),

    /// The bookmark was never issued by this buffer (or has been forgotten).
    #[error("Unknown bookmark: {0}")]
    UnknownBookmark(BookmarkId),
}

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Mint a fresh random id.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Identifier of a buffer inside a [`BufferRegistry`].
    BufferId
);
uuid_id!(
    /// Identifier of a consumer cursor inside one buffer.
    BookmarkId
);

/// Read position of a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    /// Offset into the current line sequence.
    At(usize),
    /// The consumer has seen every line; the next read returns the outcome.
    AwaitingOutcome,
}

/// Terminal status of the operation a buffer reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BufferStatus {
    Success,
    Failure,
}

impl BufferStatus {
    #[must_use]
    pub const fn from_success(success: bool) -> Self {
        if success { Self::Success } else { Self::Failure }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Result of a bookmark read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReadOutcome {
    /// New lines since the previous read plus the bookmark to use next.
    Data {
        bookmark: BookmarkId,
        data: Vec<String>,
    },
    /// The operation is over; no further lines will follow for this bookmark.
    Finished {
        status: BufferStatus,
        message: String,
    },
}

/// Construction options for a [`StreamBuffer`].
#[derive(Clone)]
pub struct BufferOptions {
    pub capacity: usize,
    pub persistent: bool,
    pub filters: Vec<LineFilter>,
}

impl BufferOptions {
    /// A per-operation buffer, discarded once its outcome is read.
    #[must_use]
    pub fn transient() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            persistent: false,
            filters: Vec::new(),
        }
    }

    /// A long-lived channel buffer, reset for reuse once its outcome is read.
    #[must_use]
    pub fn persistent() -> Self {
        Self {
            persistent: true,
            ..Self::transient()
        }
    }

    #[must_use]
    pub const fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: LineFilter) -> Self {
        self.filters.push(filter);
        self
    }
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self::transient()
    }
}

impl fmt::Debug for BufferOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferOptions")
            .field("capacity", &self.capacity)
            .field("persistent", &self.persistent)
            .field("filters", &self.filters.len())
            .finish()
    }
}

#[derive(Debug, Default)]
struct BufferState {
    lines: VecDeque<String>,
    bookmarks: HashMap<BookmarkId, Cursor>,
    /// Bookmarks from least to most recently used; the front is forgotten first.
    issued: VecDeque<BookmarkId>,
    /// Bookmark minted by a read -> the bookmark that read used.
    predecessors: HashMap<BookmarkId, BookmarkId>,
    status: Option<(BufferStatus, String)>,
    disposed: bool,
    /// Number of resets so far.
    resets: u64,
}

impl BufferState {
    fn truncate(&mut self, limit: usize) -> usize {
        let len = self.lines.len();
        if len <= limit {
            return 0;
        }

        let evicted = len - limit;
        self.lines.drain(..evicted);
        for cursor in self.bookmarks.values_mut() {
            if let Cursor::At(offset) = cursor {
                *offset = offset.saturating_sub(evicted);
            }
        }
        evicted
    }

    fn mint(&mut self, cursor: Cursor, from: Option<BookmarkId>) -> BookmarkId {
        let id = BookmarkId::new();
        self.bookmarks.insert(id, cursor);
        self.issued.push_back(id);
        if let Some(from) = from {
            self.predecessors.insert(id, from);
        }

        while self.issued.len() > MAX_BOOKMARKS {
            if let Some(oldest) = self.issued.pop_front() {
                self.bookmarks.remove(&oldest);
                self.predecessors.remove(&oldest);
            }
        }
        id
    }

    /// Mark `id` as used. Its predecessor is dropped: a consumer reading
    /// with `id` has received it and will not go back.
    fn touch(&mut self, id: BookmarkId) {
        if let Some(pos) = self.issued.iter().position(|b| *b == id) {
            self.issued.remove(pos);
            self.issued.push_back(id);
        }
        if let Some(superseded) = self.predecessors.remove(&id) {
            self.forget(superseded);
        }
    }

    fn forget(&mut self, id: BookmarkId) {
        self.bookmarks.remove(&id);
        self.predecessors.remove(&id);
        if let Some(pos) = self.issued.iter().position(|b| *b == id) {
            self.issued.remove(pos);
        }
    }

    fn reset(&mut self) {
        self.lines.clear();
        self.bookmarks.clear();
        self.issued.clear();
        self.predecessors.clear();
        self.status = None;
        self.disposed = false;
        self.resets = self.resets.wrapping_add(1);
    }
}

/// Append-only line buffer tailed by independent bookmarks.
pub struct StreamBuffer {
    state: Mutex<BufferState>,
    capacity: usize,
    persistent: bool,
    filters: Vec<LineFilter>,
}

impl StreamBuffer {
    #[must_use]
    pub fn new(options: BufferOptions) -> Self {
        Self {
            state: Mutex::new(BufferState::default()),
            capacity: options.capacity,
            persistent: options.persistent,
            filters: options.filters,
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a line after running it through the buffer's filters.
    pub fn push(&self, line: impl Into<String>) {
        self.push_with(line, &[]);
    }

    /// Append a line after running it through `filters`, then the buffer's own.
    pub fn push_with(&self, line: impl Into<String>, filters: &[LineFilter]) {
        let mut line = line.into();
        for filter in filters.iter().chain(&self.filters) {
            filter(&mut line);
        }

        let mut state = self.lock();
        state.lines.push_back(line);
        state.truncate(self.capacity);
    }

    /// Evict the oldest lines beyond `limit`, returning how many were evicted.
    pub fn truncate(&self, limit: usize) -> usize {
        self.lock().truncate(limit)
    }

    /// Read up to `limit` lines from `bookmark` (`None` reads from the start).
    pub fn read(
        &self,
        bookmark: Option<BookmarkId>,
        limit: usize,
    ) -> Result<ReadOutcome, BufferError> {
        let mut state = self.lock();

        let cursor = match bookmark {
            Some(id) => {
                let cursor = *state
                    .bookmarks
                    .get(&id)
                    .ok_or(BufferError::UnknownBookmark(id))?;
                state.touch(id);
                cursor
            }
            None => Cursor::At(0),
        };

        let len = state.lines.len();
        let old = match cursor {
            Cursor::At(offset) => offset.min(len),
            Cursor::AwaitingOutcome => match state.status.clone() {
                Some((status, message)) => {
                    if self.persistent {
                        state.reset();
                    } else {
                        state.disposed = true;
                    }
                    return Ok(ReadOutcome::Finished { status, message });
                }
                None => len,
            },
        };

        let new = old.saturating_add(limit).min(len);
        let next = if new == len && state.status.is_some() {
            Cursor::AwaitingOutcome
        } else {
            Cursor::At(new)
        };

        let data: Vec<String> = state.lines.range(old..new).cloned().collect();
        let bookmark = match bookmark {
            Some(id) if next == cursor => id,
            _ => state.mint(next, bookmark),
        };

        Ok(ReadOutcome::Data { bookmark, data })
    }

    /// Record the terminal outcome of the operation this buffer reports on.
    pub fn set_status(&self, success: bool, message: impl Into<String>) {
        self.lock().status = Some((BufferStatus::from_success(success), message.into()));
    }

    /// Clear lines, bookmarks and status. Persistence is kept.
    pub fn reset(&self) {
        self.lock().reset();
    }

    /// Times the buffer has been reset, including resets after a persistent
    /// buffer handed out its outcome. Lets a consumer tell a reset apart
    /// from a forgotten bookmark.
    pub fn reset_count(&self) -> u64 {
        self.lock().resets
    }

    pub fn status(&self) -> Option<(BufferStatus, String)> {
        self.lock().status.clone()
    }

    pub fn bookmark_cursor(&self, bookmark: BookmarkId) -> Option<Cursor> {
        self.lock().bookmarks.get(&bookmark).copied()
    }

    /// Copy of every line currently held.
    pub fn lines(&self) -> Vec<String> {
        self.lock().lines.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().lines.is_empty()
    }

    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub const fn is_persistent(&self) -> bool {
        self.persistent
    }

    /// True once a non-persistent buffer has handed out its outcome.
    pub fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}

impl Default for StreamBuffer {
    fn default() -> Self {
        Self::new(BufferOptions::default())
    }
}

impl fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("StreamBuffer")
            .field("lines", &state.lines.len())
            .field("bookmarks", &state.bookmarks.len())
            .field("status", &state.status)
            .field("capacity", &self.capacity)
            .field("persistent", &self.persistent)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn data(outcome: ReadOutcome) -> (BookmarkId, Vec<String>) {
        match outcome {
            ReadOutcome::Data { bookmark, data } => (bookmark, data),
            other => panic!("expected data, got {other:?}"),
        }
    }

    fn filled(count: usize, options: BufferOptions) -> StreamBuffer {
        let buffer = StreamBuffer::new(options);
        for i in 0..count {
            buffer.push(format!("line {i}"));
        }
        buffer
    }

    #[test]
    fn test_read_from_start_returns_lines_in_order() {
        let buffer = filled(3, BufferOptions::transient());
        let (_, lines) = data(buffer.read(None, 10).unwrap());
        assert_eq!(lines, vec!["line 0", "line 1", "line 2"]);
    }

    #[test]
    fn test_read_respects_limit() {
        let buffer = filled(5, BufferOptions::transient());
        let (bookmark, first) = data(buffer.read(None, 2).unwrap());
        assert_eq!(first, vec!["line 0", "line 1"]);

        let (_, second) = data(buffer.read(Some(bookmark), 2).unwrap());
        assert_eq!(second, vec!["line 2", "line 3"]);
    }

    #[test]
    fn test_idle_reads_reuse_bookmark() {
        let buffer = filled(2, BufferOptions::transient());
        let (bookmark, _) = data(buffer.read(None, 10).unwrap());

        let (again, lines) = data(buffer.read(Some(bookmark), 10).unwrap());
        assert_eq!(again, bookmark);
        assert!(lines.is_empty());

        let (third, lines) = data(buffer.read(Some(again), 10).unwrap());
        assert_eq!(third, bookmark);
        assert!(lines.is_empty());
    }

    #[test]
    fn test_unknown_bookmark_is_rejected() {
        let buffer = StreamBuffer::default();
        let stranger = BookmarkId::new();
        assert_eq!(
            buffer.read(Some(stranger), 10),
            Err(BufferError::UnknownBookmark(stranger))
        );
    }

    #[test]
    fn test_old_bookmark_can_be_reread() {
        let buffer = filled(4, BufferOptions::transient());
        let (first, _) = data(buffer.read(None, 2).unwrap());
        let (_, lines) = data(buffer.read(Some(first), 2).unwrap());

        // A consumer that lost the previous response can retry with the old id.
        let (_, retried) = data(buffer.read(Some(first), 2).unwrap());
        assert_eq!(lines, retried);
    }

    #[test]
    fn test_overflow_rebases_bookmarks() {
        let buffer = filled(600, BufferOptions::transient());
        let (bookmark, lines) = data(buffer.read(None, 500).unwrap());
        assert_eq!(lines.len(), 500);
        assert_eq!(buffer.bookmark_cursor(bookmark), Some(Cursor::At(500)));

        for i in 600..1200 {
            buffer.push(format!("line {i}"));
        }

        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.bookmark_cursor(bookmark), Some(Cursor::At(300)));

        // The next line this consumer sees is exactly where it left off.
        let (_, next) = data(buffer.read(Some(bookmark), 1).unwrap());
        assert_eq!(next, vec!["line 500"]);
    }

    #[test]
    fn test_truncate_floors_cursors_at_zero() {
        let buffer = filled(10, BufferOptions::transient());
        let (bookmark, _) = data(buffer.read(None, 3).unwrap());

        assert_eq!(buffer.truncate(2), 8);
        assert_eq!(buffer.bookmark_cursor(bookmark), Some(Cursor::At(0)));
        assert_eq!(buffer.truncate(5), 0);
    }

    #[test]
    fn test_cursors_stay_in_bounds_under_churn() {
        let buffer = StreamBuffer::new(BufferOptions::transient().with_capacity(16));
        let mut bookmarks: Vec<Option<BookmarkId>> = vec![None, None, None];

        for round in 0..200 {
            buffer.push(format!("line {round}"));
            if round % 7 == 0 {
                buffer.truncate(round % 11);
            }

            let slot = round % bookmarks.len();
            let (id, _) = data(buffer.read(bookmarks[slot], slot + 1).unwrap());
            bookmarks[slot] = Some(id);

            let len = buffer.len();
            for id in bookmarks.iter().flatten() {
                match buffer.bookmark_cursor(*id) {
                    Some(Cursor::At(offset)) => assert!(offset <= len),
                    Some(Cursor::AwaitingOutcome) => {}
                    None => panic!("bookmark vanished"),
                }
            }
        }
    }

    #[test]
    fn test_two_consumers_see_every_line_once() {
        let buffer = StreamBuffer::default();
        let mut fast: (Option<BookmarkId>, Vec<String>) = (None, Vec::new());
        let mut slow: (Option<BookmarkId>, Vec<String>) = (None, Vec::new());

        for i in 0..50 {
            buffer.push(format!("line {i}"));

            let (id, lines) = data(buffer.read(fast.0, 3).unwrap());
            fast.0 = Some(id);
            fast.1.extend(lines);

            if i % 4 == 0 {
                let (id, lines) = data(buffer.read(slow.0, 2).unwrap());
                slow.0 = Some(id);
                slow.1.extend(lines);
            }
        }

        for consumer in [&mut fast, &mut slow] {
            loop {
                let (id, lines) = data(buffer.read(consumer.0, 5).unwrap());
                consumer.0 = Some(id);
                if lines.is_empty() {
                    break;
                }
                consumer.1.extend(lines);
            }
        }

        let expected: Vec<String> = (0..50).map(|i| format!("line {i}")).collect();
        assert_eq!(fast.1, expected);
        assert_eq!(slow.1, expected);
    }

    #[test]
    fn test_outcome_follows_last_line() {
        let buffer = filled(2, BufferOptions::transient());
        buffer.set_status(true, "done");

        let (bookmark, lines) = data(buffer.read(None, 10).unwrap());
        assert_eq!(lines.len(), 2);
        assert_eq!(
            buffer.bookmark_cursor(bookmark),
            Some(Cursor::AwaitingOutcome)
        );

        let outcome = buffer.read(Some(bookmark), 10).unwrap();
        assert_eq!(
            outcome,
            ReadOutcome::Finished {
                status: BufferStatus::Success,
                message: "done".to_string(),
            }
        );
        assert!(buffer.is_disposed());
    }

    #[test]
    fn test_status_not_reported_until_lines_drained() {
        let buffer = filled(4, BufferOptions::transient());
        buffer.set_status(false, "boom");

        let (bookmark, lines) = data(buffer.read(None, 2).unwrap());
        assert_eq!(lines.len(), 2);
        assert_eq!(buffer.bookmark_cursor(bookmark), Some(Cursor::At(2)));
        assert!(!buffer.is_disposed());
    }

    #[test]
    fn test_persistent_buffer_resets_after_outcome() {
        let buffer = filled(1, BufferOptions::persistent());
        buffer.set_status(false, "stopped");

        let (bookmark, _) = data(buffer.read(None, 10).unwrap());
        let outcome = buffer.read(Some(bookmark), 10).unwrap();
        assert!(matches!(
            outcome,
            ReadOutcome::Finished {
                status: BufferStatus::Failure,
                ..
            }
        ));

        assert!(buffer.is_persistent());
        assert!(!buffer.is_disposed());
        assert!(buffer.is_empty());
        assert!(buffer.status().is_none());
        assert_eq!(buffer.bookmark_cursor(bookmark), None);
    }

    #[test]
    fn test_filters_run_caller_first_then_buffer() {
        let upper: LineFilter = Arc::new(|line: &mut String| *line = line.to_uppercase());
        let suffix: LineFilter = Arc::new(|line: &mut String| line.push('!'));
        let buffer = StreamBuffer::new(BufferOptions::transient().with_filter(suffix));

        buffer.push_with("hi", &[upper]);
        assert_eq!(buffer.lines(), vec!["HI!"]);
    }

    #[test]
    fn test_bookmark_table_is_bounded() {
        let buffer = StreamBuffer::new(BufferOptions::transient().with_capacity(5000));
        let first = data(buffer.read(None, 1).unwrap()).0;

        for i in 0..(MAX_BOOKMARKS + 10) {
            buffer.push(format!("line {i}"));
            buffer.read(None, usize::MAX).unwrap();
        }

        assert_eq!(buffer.bookmark_cursor(first), None);
    }

    #[test]
    fn test_slow_consumer_outlives_busy_neighbour() {
        let buffer = StreamBuffer::new(BufferOptions::transient().with_capacity(5000));
        for i in 0..10 {
            buffer.push(format!("line {i}"));
        }
        let (slow, _) = data(buffer.read(None, 5).unwrap());

        let (mut fast, _) = data(buffer.read(None, usize::MAX).unwrap());
        for i in 10..(MAX_BOOKMARKS + 100) {
            buffer.push(format!("line {i}"));
            fast = data(buffer.read(Some(fast), usize::MAX).unwrap()).0;
        }

        let (_, lines) = data(buffer.read(Some(slow), 3).unwrap());
        assert_eq!(lines, vec!["line 5", "line 6", "line 7"]);
    }

    #[test]
    fn test_bookmark_is_forgotten_once_successor_is_used() {
        let buffer = filled(6, BufferOptions::transient());
        let (first, _) = data(buffer.read(None, 2).unwrap());
        let (second, _) = data(buffer.read(Some(first), 2).unwrap());
        assert!(buffer.bookmark_cursor(first).is_some());

        buffer.read(Some(second), 2).unwrap();
        assert_eq!(buffer.bookmark_cursor(first), None);
        assert_eq!(buffer.bookmark_cursor(second), Some(Cursor::At(4)));
    }

    #[test]
    fn test_concurrent_pushes_are_all_kept() {
        let buffer = Arc::new(StreamBuffer::new(
            BufferOptions::transient().with_capacity(10_000),
        ));
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let buffer = Arc::clone(&buffer);
                std::thread::spawn(move || {
                    for i in 0..250 {
                        buffer.push(format!("{t}:{i}"));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(buffer.len(), 1000);
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let outcome = ReadOutcome::Finished {
            status: BufferStatus::Success,
            message: "ok".to_string(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert_eq!(json, r#"{"status":"success","message":"ok"}"#);
    }
}
