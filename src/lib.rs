//! # `soup_orderlog`
//!
//! OrderLog core for the S.O.U.P suite: orders and sticky notes with status
//! tracking, linked groups, undo/redo, search and display grouping, plus the
//! item/store/vendor dictionary.

pub mod config;
pub mod dictionary;
pub mod documents;
pub mod error;
pub mod logging;
pub mod orders;
pub mod paths;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
