#![allow(clippy::module_name_repetitions)]
//! Canonical file paths for the data directory.
//!
//! Paths are relative to the project root's `data/` directory unless
//! `FIRE_PORTAL_DATA_DIR` points somewhere else.

use std::path::{Path, PathBuf};

/// Environment variable overriding the `data/` directory.
pub const DATA_DIR_ENV: &str = "FIRE_PORTAL_DATA_DIR";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`.
///
/// # Panics
///
/// Panics if the project root cannot be resolved.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .expect("Failed to find project root from CARGO_MANIFEST_DIR")
        .to_path_buf()
}

/// Returns the `data/` directory path.
#[must_use]
pub fn data_dir() -> PathBuf {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map_or_else(|| project_root().join("data"), PathBuf::from)
}

/// Returns the `data/shared/` directory for shared databases.
#[must_use]
pub fn shared_dir() -> PathBuf {
    data_dir().join("shared")
}

/// Returns the path for the geocode cache `DuckDB` file.
#[must_use]
pub fn geocode_cache_db_path() -> PathBuf {
    shared_dir().join("geocode_cache.duckdb")
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
