//! Atomic PID file I/O operations.
//!
//! Format: Two-line text file
//! ```text
//! <pid>
//! <game port>
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// PID file content parsed from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PidFileData {
    pub pid: u32,
    pub port: u16,
}

fn pidfile_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.pid"))
}

/// Write `<dir>/<name>.pid` via a temp file and rename.
pub fn write_pidfile(dir: &Path, name: &str, pid: u32, port: u16) -> io::Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let final_path = pidfile_path(dir, name);
    let temp_path = dir.join(format!("{name}.pid.tmp"));

    fs::write(&temp_path, format!("{pid}\n{port}\n"))?;
    fs::rename(&temp_path, &final_path)?;

    Ok(final_path)
}

pub fn read_pidfile(dir: &Path, name: &str) -> io::Result<PidFileData> {
    let content = fs::read_to_string(pidfile_path(dir, name))?;
    parse_pidfile_content(&content)
}

/// Delete a PID file. Missing files are fine.
pub fn delete_pidfile(dir: &Path, name: &str) -> io::Result<()> {
    match fs::remove_file(pidfile_path(dir, name)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Every parseable `*.pid` file in `dir` as `(name, data)`.
///
/// Malformed files are skipped.
pub fn list_pidfiles(dir: &Path) -> io::Result<Vec<(String, PidFileData)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut results = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();

        if path.extension().and_then(|s| s.to_str()) != Some("pid") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        if let Ok(content) = fs::read_to_string(&path)
            && let Ok(data) = parse_pidfile_content(&content)
        {
            results.push((stem.to_string(), data));
        }
    }

    results.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(results)
}

fn parse_pidfile_content(content: &str) -> io::Result<PidFileData> {
    let mut lines = content.lines();

    let pid = lines
        .next()
        .and_then(|s| s.trim().parse::<u32>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing or invalid PID"))?;

    let port = lines
        .next()
        .and_then(|s| s.trim().parse::<u16>().ok())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidData, "missing or invalid port"))?;

    Ok(PidFileData { pid, port })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_read_delete() {
        let dir = tempfile::tempdir().unwrap();

        let path = write_pidfile(dir.path(), "server", 4321, 7777).unwrap();
        assert!(path.exists());
        assert!(!dir.path().join("server.pid.tmp").exists());

        let data = read_pidfile(dir.path(), "server").unwrap();
        assert_eq!(data, PidFileData { pid: 4321, port: 7777 });

        delete_pidfile(dir.path(), "server").unwrap();
        assert!(!path.exists());
        delete_pidfile(dir.path(), "server").unwrap();
    }

    #[test]
    fn list_skips_foreign_and_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        write_pidfile(dir.path(), "server", 100, 7777).unwrap();
        fs::write(dir.path().join("notes.txt"), "garbage").unwrap();
        fs::write(dir.path().join("broken.pid"), "not a pid\n").unwrap();

        let list = list_pidfiles(dir.path()).unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].0, "server");
        assert_eq!(list[0].1.pid, 100);
    }

    #[test]
    fn list_of_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_pidfiles(&dir.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn parse_requires_both_lines() {
        assert!(parse_pidfile_content("12\n").is_err());
        assert_eq!(
            parse_pidfile_content(" 12 \n 80 \n").unwrap(),
            PidFileData { pid: 12, port: 80 }
        );
    }
}
