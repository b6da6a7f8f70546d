//! Filesystem helpers with operation and path context on errors.

use std::path::Path;

use crate::Result;
use crate::Error;

/// Ensure a directory exists, creating it recursively if needed.
pub fn ensure_dir_all_sync(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).map_err(|e| Error::io_path("creating directory", path, e))
}

/// Ensure the directory holding a SQLite database file exists.
///
/// `create_if_missing` creates the file but not its parent directories.
/// In-memory URLs are left alone.
pub fn ensure_sqlite_parent_dir(database_url: &str) -> Result<()> {
    let Some(rest) = database_url.strip_prefix("sqlite:") else {
        return Ok(());
    };
    let file = rest.trim_start_matches("//");
    let file = file.split('?').next().unwrap_or_default();
    if file.is_empty() || file == ":memory:" {
        return Ok(());
    }

    match Path::new(file).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir_all_sync(parent),
        _ => Ok(()),
    }
}
