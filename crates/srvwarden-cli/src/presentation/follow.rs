//! Printing a stream buffer as it fills.

use std::sync::Arc;

use srvwarden_core::{BookmarkId, BufferError, BufferStatus, ReadOutcome, StreamBuffer};
use tracing::warn;

/// Lines read per poll.
const READ_LIMIT: usize = 500;

/// Bookmarked reader over one buffer.
#[derive(Debug)]
pub struct Follower {
    buffer: Arc<StreamBuffer>,
    bookmark: Option<BookmarkId>,
    /// Reset count observed at the last successful read.
    resets: u64,
    prefix: &'static str,
}

impl Follower {
    pub fn new(buffer: Arc<StreamBuffer>, prefix: &'static str) -> Self {
        let resets = buffer.reset_count();
        Self {
            buffer,
            bookmark: None,
            resets,
            prefix,
        }
    }

    /// Everything appended since the last call, prefixed, plus the final
    /// status once the buffer is finished.
    ///
    /// A bookmark lost to a buffer reset starts over from the beginning.
    /// One the buffer forgot without a reset skips to the current end.
    pub fn poll(&mut self) -> (Vec<String>, Option<(BufferStatus, String)>) {
        let mut lines = Vec::new();
        loop {
            let resets = self.buffer.reset_count();
            match self.buffer.read(self.bookmark, READ_LIMIT) {
                Ok(ReadOutcome::Data { bookmark, data }) => {
                    self.bookmark = Some(bookmark);
                    self.resets = resets;
                    let more = data.len() == READ_LIMIT;
                    lines.extend(data.into_iter().map(|l| format!("{}{l}", self.prefix)));
                    if !more {
                        return (lines, None);
                    }
                }
                Ok(ReadOutcome::Finished { status, message }) => {
                    return (lines, Some((status, message)));
                }
                Err(BufferError::UnknownBookmark(_)) if resets != self.resets => {
                    self.bookmark = None;
                    self.resets = resets;
                }
                Err(BufferError::UnknownBookmark(_)) => {
                    self.bookmark = self.skip_to_end();
                    return (lines, None);
                }
                Err(BufferError::UnknownUuid(_)) => return (lines, None),
            }
        }
    }

    /// Fresh bookmark at the end of the buffer.
    fn skip_to_end(&self) -> Option<BookmarkId> {
        match self.buffer.read(None, usize::MAX) {
            Ok(ReadOutcome::Data { bookmark, data }) => {
                warn!(
                    skipped = data.len(),
                    "{}bookmark forgotten, resuming at the end",
                    self.prefix
                );
                Some(bookmark)
            }
            _ => None,
        }
    }

    /// Print what [`poll`](Self::poll) returns, including the final
    /// status message.
    pub fn print(&mut self) -> Option<(BufferStatus, String)> {
        let (lines, finished) = self.poll();
        for line in lines {
            println!("{line}");
        }
        if let Some((_, message)) = &finished {
            println!("{}{message}", self.prefix);
        }
        finished
    }
}
