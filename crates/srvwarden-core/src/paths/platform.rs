//! Platform-specific root resolution.

use std::env;
use std::fs;
use std::path::PathBuf;

use super::error::PathError;

/// Environment variable overriding the data root.
pub const DATA_DIR_ENV: &str = "SRVWARDEN_DATA_DIR";

/// Get the root directory for supervisor state (settings, pidfiles).
///
/// Resolution order:
/// 1. `SRVWARDEN_DATA_DIR` environment variable
/// 2. System data directory (e.g., `~/.local/share/srvwarden`)
pub fn data_root() -> Result<PathBuf, PathError> {
    if let Ok(path) = env::var(DATA_DIR_ENV) {
        return normalize_user_path(&path);
    }

    let root = dirs::data_local_dir()
        .ok_or(PathError::NoDataDir)?
        .join("srvwarden");
    ensure_dir(root)
}

pub(super) fn ensure_dir(path: PathBuf) -> Result<PathBuf, PathError> {
    if path.exists() {
        if !path.is_dir() {
            return Err(PathError::NotADirectory(path));
        }
        return Ok(path);
    }

    fs::create_dir_all(&path).map_err(|e| PathError::CreateFailed {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    Ok(path)
}

/// Normalize a user-provided path, expanding `~` and making it absolute.
pub fn normalize_user_path(raw: &str) -> Result<PathBuf, PathError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(PathError::EmptyPath);
    }

    let expanded = if trimmed == "~" {
        dirs::home_dir().ok_or(PathError::NoHomeDir)?
    } else if let Some(rest) = trimmed.strip_prefix("~/") {
        dirs::home_dir().ok_or(PathError::NoHomeDir)?.join(rest)
    } else {
        PathBuf::from(trimmed)
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        env::current_dir()
            .map(|cwd| cwd.join(expanded))
            .map_err(|e| PathError::CurrentDirError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_rejects_empty() {
        assert!(matches!(normalize_user_path("  "), Err(PathError::EmptyPath)));
    }

    #[test]
    fn normalize_makes_relative_absolute() {
        let path = normalize_user_path("state/srv").unwrap();
        assert!(path.is_absolute());
        assert!(path.ends_with("state/srv"));
    }

    #[test]
    fn ensure_dir_creates_nested() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("a").join("b");
        let created = ensure_dir(nested.clone()).unwrap();
        assert_eq!(created, nested);
        assert!(nested.is_dir());
    }

    #[test]
    fn ensure_dir_rejects_file() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file");
        fs::write(&file, "x").unwrap();
        assert!(matches!(
            ensure_dir(file),
            Err(PathError::NotADirectory(_))
        ));
    }
}
