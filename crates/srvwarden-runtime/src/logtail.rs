//! Tail the game's log file for administrative command output.
//!
//! The engine prefixes its own lines with a timestamp and frame counter:
//!
//! ```text
//! [2024.05.01-12.00.00:123][  0]LogRcon: 127.0.0.1:51234 Authenticated
//! ```
//!
//! Replies to administrative commands follow a marker line and carry no
//! prefix, so every untimestamped line after a marker line belongs to the
//! reply. Any other timestamped line ends the run.

use std::io::SeekFrom;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use srvwarden_core::StreamBuffer;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::stream::decode_line;

/// How often the log file is checked for growth.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

static ENGINE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\d{4}\.\d{2}\.\d{2}-\d{2}\.\d{2}\.\d{2}:\d{3}\]\[\s*\d+\]")
        .expect("engine prefix pattern is valid")
});

/// Line classifier for the engine log.
#[derive(Debug, Clone)]
pub struct RconLineExtractor {
    marker: String,
    in_reply: bool,
}

impl RconLineExtractor {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            in_reply: false,
        }
    }

    /// Classify one log line; returns the text to surface, if any.
    ///
    /// Marker lines are surfaced without their engine prefix.
    pub fn feed(&mut self, line: &str) -> Option<String> {
        if let Some(prefix) = ENGINE_PREFIX.find(line) {
            self.in_reply = line.contains(&self.marker);
            if !self.in_reply {
                return None;
            }
            let rest = line[prefix.end()..].trim();
            return (!rest.is_empty()).then(|| rest.to_string());
        }

        if self.in_reply && !line.trim().is_empty() {
            Some(line.trim_end().to_string())
        } else {
            None
        }
    }
}

/// Polling tailer feeding extracted lines into a buffer.
#[derive(Debug)]
pub struct LogTailer {
    path: PathBuf,
    extractor: RconLineExtractor,
    sink: Arc<StreamBuffer>,
    poll_interval: Duration,
    /// Bytes of the file already consumed.
    position: u64,
}

impl LogTailer {
    pub fn new(path: impl Into<PathBuf>, marker: &str, sink: Arc<StreamBuffer>) -> Self {
        Self {
            path: path.into(),
            extractor: RconLineExtractor::new(marker),
            sink,
            poll_interval: DEFAULT_POLL_INTERVAL,
            position: 0,
        }
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Follow the file from its current end until cancelled.
    ///
    /// A file that shrinks was rotated or truncated and is re-read from the
    /// start. A missing file is waited for.
    pub async fn run(mut self, cancel: CancellationToken) {
        self.position = tokio::fs::metadata(&self.path)
            .await
            .map(|m| m.len())
            .unwrap_or(0);
        debug!(path = %self.path.display(), position = self.position, "Tailing game log");

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                () = tokio::time::sleep(self.poll_interval) => {}
            }

            if let Err(e) = self.poll_once().await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %self.path.display(), error = %e, "Failed to read game log");
                }
            }
        }

        debug!(path = %self.path.display(), "Game log tail stopped");
    }

    async fn poll_once(&mut self) -> std::io::Result<()> {
        let mut file = File::open(&self.path).await?;
        let len = file.metadata().await?.len();

        if len < self.position {
            debug!(path = %self.path.display(), "Game log truncated, rereading");
            self.position = 0;
            self.extractor.in_reply = false;
        }
        if len == self.position {
            return Ok(());
        }

        file.seek(SeekFrom::Start(self.position)).await?;
        let mut chunk = Vec::new();
        file.read_to_end(&mut chunk).await?;

        let consumed = self.consume(&chunk);
        self.position += consumed as u64;
        Ok(())
    }

    /// Feed every complete line in `chunk`. Returns the bytes consumed; a
    /// trailing partial line is left for the next poll.
    fn consume(&mut self, chunk: &[u8]) -> usize {
        let Some(last_newline) = chunk.iter().rposition(|&b| b == b'\n') else {
            return 0;
        };

        for raw in chunk[..=last_newline].split_inclusive(|&b| b == b'\n') {
            if let Some(text) = self.extractor.feed(&decode_line(raw)) {
                self.sink.push(text);
            }
        }
        last_newline + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use srvwarden_core::{BufferOptions, strip_ansi};

    const STAMP: &str = "[2024.05.01-12.00.00:123][  7]";

    fn sink() -> Arc<StreamBuffer> {
        Arc::new(StreamBuffer::new(
            BufferOptions::persistent().with_filter(Arc::new(strip_ansi)),
        ))
    }

    #[test]
    fn marker_starts_a_reply_run() {
        let mut x = RconLineExtractor::new("LogRcon");
        assert_eq!(x.feed(&format!("{STAMP}LogNet: joined")), None);
        assert_eq!(
            x.feed(&format!("{STAMP}LogRcon: listplayers")),
            Some("LogRcon: listplayers".to_string())
        );
        assert_eq!(x.feed("0. Alice, 7656"), Some("0. Alice, 7656".to_string()));
        assert_eq!(x.feed("   "), None);
        assert_eq!(x.feed(&format!("{STAMP}LogWorld: tick")), None);
        assert_eq!(x.feed("after run"), None);
    }

    #[test]
    fn untimestamped_lines_before_any_marker_are_ignored() {
        let mut x = RconLineExtractor::new("LogRcon");
        assert_eq!(x.feed("stray"), None);
    }

    #[test]
    fn prefix_with_wide_frame_counter() {
        let mut x = RconLineExtractor::new("LogRcon");
        assert!(
            x.feed("[2024.05.01-12.00.00:123][123]LogRcon: saved")
                .is_some()
        );
    }

    #[test]
    fn consume_keeps_partial_line() {
        let sink = sink();
        let mut tailer = LogTailer::new("/unused", "LogRcon", Arc::clone(&sink));

        let chunk = format!("{STAMP}LogRcon: hi\nreply one\nrepl");
        let consumed = tailer.consume(chunk.as_bytes());
        assert_eq!(consumed, chunk.len() - "repl".len());
        assert_eq!(sink.lines(), vec!["LogRcon: hi", "reply one"]);
    }

    #[test]
    fn colour_codes_are_stripped_by_the_sink() {
        let sink = sink();
        let mut tailer = LogTailer::new("/unused", "LogRcon", Arc::clone(&sink));
        tailer.consume(format!("{STAMP}LogRcon: x\n\x1b[32mgreen\x1b[0m\n").as_bytes());
        assert_eq!(sink.lines().last().map(String::as_str), Some("green"));
    }

    async fn wait_for_lines(sink: &StreamBuffer, count: usize) {
        for _ in 0..200 {
            if sink.len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("timed out waiting for {count} lines, have {:?}", sink.lines());
    }

    #[tokio::test]
    async fn tailer_follows_appends_from_end() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ShooterGame.log");
        std::fs::write(&path, format!("{STAMP}LogRcon: old\nold reply\n")).unwrap();

        let sink = sink();
        let cancel = CancellationToken::new();
        let tailer = LogTailer::new(&path, "LogRcon", Arc::clone(&sink))
            .with_poll_interval(Duration::from_millis(10));
        let task = tokio::spawn(tailer.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{STAMP}LogRcon: saveworld").unwrap();
        writeln!(file, "World Saved").unwrap();
        drop(file);

        wait_for_lines(&sink, 2).await;
        assert_eq!(sink.lines(), vec!["LogRcon: saveworld", "World Saved"]);

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn tailer_rereads_truncated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("game.log");
        std::fs::write(&path, "x".repeat(256) + "\n").unwrap();

        let sink = sink();
        let cancel = CancellationToken::new();
        let tailer = LogTailer::new(&path, "LogRcon", Arc::clone(&sink))
            .with_poll_interval(Duration::from_millis(10));
        let task = tokio::spawn(tailer.run(cancel.clone()));

        tokio::time::sleep(Duration::from_millis(50)).await;
        std::fs::write(&path, format!("{STAMP}LogRcon: fresh\n")).unwrap();

        wait_for_lines(&sink, 1).await;
        assert_eq!(sink.lines(), vec!["LogRcon: fresh"]);

        cancel.cancel();
        task.await.unwrap();
    }
}
