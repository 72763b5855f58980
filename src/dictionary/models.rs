//! Dictionary records: catalogue items, stores and vendors.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// A record stored in a dictionary table under a unique key.
pub trait DictionaryEntity: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Table holding records of this type.
    const TABLE: &'static str;

    /// The record's unique key.
    fn key(&self) -> &str;
}

/// A catalogue item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Item {
    /// Item number (key).
    pub item_number: String,
    /// Free-text description.
    pub description: String,
    /// Universal product code.
    pub upc: String,
    /// Stock keeping unit.
    pub sku: String,
    /// Department the item belongs to.
    pub department: String,
    /// Notes.
    pub notes: String,
}

impl Item {
    /// Create an item with just a number and description.
    pub fn new(item_number: impl Into<String>, description: impl Into<String>) -> Self {
        Self { item_number: item_number.into(), description: description.into(), ..Self::default() }
    }
}

impl DictionaryEntity for Item {
    const TABLE: &'static str = "dictionary_items";

    fn key(&self) -> &str {
        &self.item_number
    }
}

/// A store location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Store {
    /// Store code (key).
    pub code: String,
    /// Display name.
    pub name: String,
    /// Region.
    pub region: String,
    /// Street address.
    pub address: String,
    /// Notes.
    pub notes: String,
}

impl Store {
    /// Create a store with a code and name.
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self { code: code.into(), name: name.into(), ..Self::default() }
    }
}

impl DictionaryEntity for Store {
    const TABLE: &'static str = "dictionary_stores";

    fn key(&self) -> &str {
        &self.code
    }
}

/// A vendor orders are placed with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Vendor {
    /// Vendor name (key).
    pub name: String,
    /// Contact person.
    pub contact: String,
    /// Phone number.
    pub phone: String,
    /// Email address.
    pub email: String,
    /// Notes.
    pub notes: String,
    /// How many times the vendor has been used; ranks autocomplete.
    pub usage_count: u32,
}

impl Vendor {
    /// Create a vendor with just a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }
}

impl DictionaryEntity for Vendor {
    const TABLE: &'static str = "dictionary_vendors";

    fn key(&self) -> &str {
        &self.name
    }
}
