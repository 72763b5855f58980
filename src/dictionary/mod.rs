//! Dictionary database: catalogue items, stores and vendors.
//!
//! Each record type lives in its own table keyed by its natural key. Apart
//! from key uniqueness the records carry no invariants.

pub mod models;
pub mod store;

pub use models::{DictionaryEntity, Item, Store, Vendor};
pub use store::{DictionaryRepository, SqliteDictionary, VendorDirectory};

use crate::error::Result;
use std::path::Path;

/// The three dictionary tables in one database file.
#[derive(Debug)]
pub struct Dictionary {
    /// Catalogue items.
    pub items: SqliteDictionary<Item>,
    /// Store locations.
    pub stores: SqliteDictionary<Store>,
    /// Vendors with usage ranking.
    pub vendors: VendorDirectory<SqliteDictionary<Vendor>>,
}

impl Dictionary {
    /// Open every table in the database at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be initialized.
    pub fn open(db_path: &Path) -> Result<Self> {
        Ok(Self {
            items: SqliteDictionary::new(db_path)?,
            stores: SqliteDictionary::new(db_path)?,
            vendors: VendorDirectory::new(SqliteDictionary::new(db_path)?),
        })
    }
}
