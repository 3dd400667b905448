//! Line filters applied before a line is stored.

use std::sync::{Arc, LazyLock};

use regex::Regex;

/// In-place line transform. Filters run in order; each sees the previous output.
pub type LineFilter = Arc<dyn Fn(&mut String) + Send + Sync>;

static ANSI_ESCAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\x1b\[[0-9;?]*[ -/]*[@-~]|\x1b[@-Z\\-_]")
        .expect("ANSI escape pattern is valid")
});

/// Remove terminal colour and cursor escape sequences.
pub fn strip_ansi(line: &mut String) {
    if !line.contains('\x1b') {
        return;
    }
    let cleaned = ANSI_ESCAPE.replace_all(line, "");
    *line = cleaned.into_owned();
}

/// Drop trailing whitespace, including a stray `\r` from CRLF output.
pub fn trim_trailing_whitespace(line: &mut String) {
    let trimmed = line.trim_end().len();
    line.truncate(trimmed);
}
