//! Child output readers (non-UTF8-safe).
//!
//! Game servers can emit non-UTF8 bytes on stdout/stderr, which would end a
//! `BufReader::lines()` loop. Lines are read as bytes and decoded lossily.

use std::sync::Arc;

use srvwarden_core::StreamBuffer;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::task::JoinHandle;
use tracing::debug;

/// Copy every line of `stream` into `sink` until EOF.
pub fn spawn_stream_reader(
    stream: impl AsyncRead + Unpin + Send + 'static,
    pid: u32,
    stream_type: &'static str,
    sink: Arc<StreamBuffer>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut buf: Vec<u8> = Vec::with_capacity(1024);

        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = decode_line(&buf);
                    debug!(pid, %stream_type, "{line}");
                    sink.push(line);
                }
                Err(e) => {
                    debug!(pid, %stream_type, error = %e, "Output reader exiting on read error");
                    break;
                }
            }
        }

        debug!(pid, %stream_type, "Output reader finished");
    })
}

/// Lossy decode with the trailing `\n` / `\r\n` removed.
pub(crate) fn decode_line(raw: &[u8]) -> String {
    let mut end = raw.len();
    if raw[..end].last() == Some(&b'\n') {
        end -= 1;
        if raw[..end].last() == Some(&b'\r') {
            end -= 1;
        }
    }
    String::from_utf8_lossy(&raw[..end]).into_owned()
}
