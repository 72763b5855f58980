//! Path utilities for determining data storage locations.
//!
//! OrderLog data lives under `~/.soup/`: the order database, the dictionary
//! database and the small versioned JSON documents next to them.

use std::path::{Path, PathBuf};

/// The base directory name for S.O.U.P data.
const DATA_DIR_NAME: &str = ".soup";

/// The order database filename.
pub const DATABASE_FILENAME: &str = "orderlog.sqlite3";

/// The dictionary database filename.
pub const DICTIONARY_FILENAME: &str = "dictionary.sqlite3";

/// Vendor color assignments document.
pub const VENDOR_COLORS_FILENAME: &str = "vendor-colors.json";

/// Order templates document.
pub const TEMPLATES_FILENAME: &str = "order-templates.json";

/// Group expand/collapse state document.
pub const EXPAND_STATE_FILENAME: &str = "group-expand-state.json";

/// Get the base data directory.
///
/// Returns `~/.soup/` or `None` if the home directory cannot be determined.
#[must_use]
pub fn data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME))
}

/// Get the order database path, `~/.soup/orderlog.sqlite3`.
#[must_use]
pub fn database_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(DATABASE_FILENAME))
}

/// Get the dictionary database path, `~/.soup/dictionary.sqlite3`.
#[must_use]
pub fn dictionary_path() -> Option<PathBuf> {
    data_dir().map(|dir| dir.join(DICTIONARY_FILENAME))
}

/// Path of a named document inside `base`.
#[must_use]
pub fn document_path(base: &Path, filename: &str) -> PathBuf {
    base.join(filename)
}
