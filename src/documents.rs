//! Small versioned JSON documents kept beside the databases.
//!
//! Each document is a JSON object with a top-level `version` field. A
//! document written by a different version is rejected rather than guessed
//! at. Writes go to a temp file which is synced and then renamed over the
//! target.

use crate::error::{Error, Result};
use crate::orders::id::GroupId;
use crate::orders::models::{NoteType, OrderItem, DEFAULT_COLOR};
use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::path::Path;

/// Write `document` to `path` with a `version` field.
///
/// # Errors
///
/// Returns an error if the document does not serialize to a JSON object or
/// the file cannot be written.
pub fn save_document<T: Serialize>(path: &Path, version: u32, document: &T) -> Result<()> {
    let mut value = serde_json::to_value(document)?;
    let Some(object) = value.as_object_mut() else {
        let message = format!("{} must serialize to a JSON object", path.display());
        return Err(Error::InvalidInput(message));
    };
    object.insert("version".to_string(), serde_json::Value::from(version));

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("tmp");
    {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(serde_json::to_string_pretty(&value)?.as_bytes())?;
        file.sync_all()?;
    }
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Read a document written by [`save_document`].
///
/// Returns `Ok(None)` when the file does not exist. A missing `version`
/// field reads as version 0.
///
/// # Errors
///
/// Returns [`Error::VersionMismatch`] when the stored version differs from
/// `expected_version`, or an error if the file cannot be read or parsed.
pub fn load_document<T: DeserializeOwned>(path: &Path, expected_version: u32) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    let found = value
        .get("version")
        .and_then(serde_json::Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .unwrap_or(0);
    if found != expected_version {
        return Err(Error::VersionMismatch {
            path: path.to_path_buf(),
            expected: expected_version,
            found,
        });
    }
    Ok(Some(serde_json::from_value(value)?))
}

/// A document type with a fixed format version.
pub trait VersionedDocument: Serialize + DeserializeOwned + Default {
    /// Format version written and accepted.
    const VERSION: u32;

    /// Load from `path`, or the default when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error on a version mismatch or unreadable file.
    fn load(path: &Path) -> Result<Self> {
        Ok(load_document(path, Self::VERSION)?.unwrap_or_default())
    }

    /// Save to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn save(&self, path: &Path) -> Result<()> {
        save_document(path, Self::VERSION, self)
    }
}

/// Colors assigned to vendors, applied to new orders for that vendor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorColors {
    /// Lowercased vendor name to color.
    pub colors: BTreeMap<String, String>,
}

impl VersionedDocument for VendorColors {
    const VERSION: u32 = 1;
}

impl VendorColors {
    /// The color assigned to `vendor` (case-insensitive).
    pub fn color_for(&self, vendor: &str) -> Option<&str> {
        self.colors.get(&vendor.trim().to_lowercase()).map(String::as_str)
    }

    /// Assign `color_hex` to `vendor`.
    pub fn assign(&mut self, vendor: &str, color_hex: impl Into<String>) {
        self.colors.insert(vendor.trim().to_lowercase(), color_hex.into());
    }

    /// Forget `vendor`'s color. Returns `false` if none was assigned.
    pub fn remove(&mut self, vendor: &str) -> bool {
        self.colors.remove(&vendor.trim().to_lowercase()).is_some()
    }
}

/// A reusable starting point for new items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderTemplate {
    /// Template name (unique within a library).
    pub name: String,
    /// Kind of item created.
    pub note_type: NoteType,
    /// Vendor name.
    pub vendor_name: String,
    /// Transfer numbers.
    pub transfer_numbers: String,
    /// Warehouse shipment numbers.
    pub whs_shipment_numbers: String,
    /// Note title.
    pub note_title: String,
    /// Note content.
    pub note_content: String,
    /// Note category.
    pub note_category: String,
    /// Color; blank means the default.
    pub color_hex: String,
}

impl OrderTemplate {
    /// Create a fresh item from this template.
    pub fn instantiate(&self, now: NaiveDateTime) -> OrderItem {
        let mut item = OrderItem::new(self.note_type, now);
        item.vendor_name.clone_from(&self.vendor_name);
        item.transfer_numbers.clone_from(&self.transfer_numbers);
        item.whs_shipment_numbers.clone_from(&self.whs_shipment_numbers);
        item.note_title.clone_from(&self.note_title);
        item.note_content.clone_from(&self.note_content);
        item.note_category.clone_from(&self.note_category);
        item.color_hex = if self.color_hex.trim().is_empty() {
            DEFAULT_COLOR.to_string()
        } else {
            self.color_hex.clone()
        };
        item
    }
}

/// Saved order templates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateLibrary {
    /// Templates in creation order.
    pub templates: Vec<OrderTemplate>,
}

impl VersionedDocument for TemplateLibrary {
    const VERSION: u32 = 1;
}

impl TemplateLibrary {
    /// Add a template, replacing any with the same name.
    pub fn upsert(&mut self, template: OrderTemplate) {
        if let Some(existing) = self.templates.iter_mut().find(|t| t.name == template.name) {
            *existing = template;
        } else {
            self.templates.push(template);
        }
    }

    /// Look up a template by name.
    pub fn get(&self, name: &str) -> Option<&OrderTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Remove a template. Returns `false` if absent.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.templates.len();
        self.templates.retain(|t| t.name != name);
        self.templates.len() != before
    }
}

/// Which linked groups are collapsed in the display.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupExpandState {
    /// Collapsed groups; every other group is expanded.
    pub collapsed: BTreeSet<GroupId>,
}

impl VersionedDocument for GroupExpandState {
    const VERSION: u32 = 1;
}

impl GroupExpandState {
    /// Whether `group` is shown expanded.
    pub fn is_expanded(&self, group: &GroupId) -> bool {
        !self.collapsed.contains(group)
    }

    /// Expand or collapse `group`.
    pub fn set_expanded(&mut self, group: GroupId, expanded: bool) {
        if expanded {
            self.collapsed.remove(&group);
        } else {
            self.collapsed.insert(group);
        }
    }

    /// Drop entries for groups that no longer exist. Returns how many were removed.
    pub fn prune(&mut self, live: &HashSet<GroupId>) -> usize {
        let before = self.collapsed.len();
        self.collapsed.retain(|group| live.contains(group));
        before - self.collapsed.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 11, 4).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    #[test]
    fn test_save_and_load_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("vendor-colors.json");
        let mut colors = VendorColors::default();
        colors.assign("Acme", "#FFCC00");
        colors.save(&path).unwrap();

        let loaded = VendorColors::load(&path).unwrap();
        assert_eq!(loaded, colors);
        assert!(!path.with_extension("tmp").exists());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["version"], 1);
    }

    #[test]
    fn test_missing_document_is_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.json");
        assert!(load_document::<VendorColors>(&path, 1).unwrap().is_none());
        assert_eq!(TemplateLibrary::load(&path).unwrap(), TemplateLibrary::default());
    }

    #[test]
    fn test_version_mismatch_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("templates.json");
        save_document(&path, 2, &TemplateLibrary::default()).unwrap();

        let err = TemplateLibrary::load(&path).unwrap_err();
        assert!(matches!(err, Error::VersionMismatch { expected: 1, found: 2, .. }));
    }

    #[test]
    fn test_unversioned_document_reads_as_zero() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("legacy.json");
        std::fs::write(&path, r#"{"colors": {}}"#).unwrap();
        let err = load_document::<VendorColors>(&path, 1).unwrap_err();
        assert!(matches!(err, Error::VersionMismatch { found: 0, .. }));
    }

    #[test]
    fn test_non_object_document_rejected() {
        let dir = TempDir::new().unwrap();
        let err = save_document(&dir.path().join("list.json"), 1, &vec![1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn test_vendor_colors_case_insensitive() {
        let mut colors = VendorColors::default();
        colors.assign("Acme Supply", "#00FF00");
        assert_eq!(colors.color_for("ACME SUPPLY"), Some("#00FF00"));
        assert!(colors.remove("acme supply"));
        assert_eq!(colors.color_for("Acme Supply"), None);
    }

    #[test]
    fn test_template_instantiate() {
        let template = OrderTemplate {
            name: "Weekly Acme".to_string(),
            vendor_name: "Acme".to_string(),
            transfer_numbers: "T-".to_string(),
            ..Default::default()
        };
        let a = template.instantiate(at(8));
        let b = template.instantiate(at(9));
        assert_ne!(a.id(), b.id());
        assert_eq!(a.vendor_name, "Acme");
        assert_eq!(a.color_hex, DEFAULT_COLOR);
        assert_eq!(b.created_at, at(9));
    }

    #[test]
    fn test_template_library_upsert_by_name() {
        let mut library = TemplateLibrary::default();
        library.upsert(OrderTemplate { name: "A".to_string(), ..Default::default() });
        library.upsert(OrderTemplate {
            name: "A".to_string(),
            vendor_name: "Acme".to_string(),
            ..Default::default()
        });
        assert_eq!(library.templates.len(), 1);
        assert_eq!(library.get("A").unwrap().vendor_name, "Acme");
        assert!(library.remove("A"));
        assert!(!library.remove("A"));
    }

    #[test]
    fn test_group_expand_state() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("expand.json");
        let (kept, gone) = (GroupId::new(), GroupId::new());
        let mut state = GroupExpandState::default();
        state.set_expanded(kept, false);
        state.set_expanded(gone, false);
        assert!(!state.is_expanded(&kept));

        assert_eq!(state.prune(&HashSet::from([kept])), 1);
        state.save(&path).unwrap();
        let loaded = GroupExpandState::load(&path).unwrap();
        assert!(!loaded.is_expanded(&kept));
        assert!(loaded.is_expanded(&gone));
    }
}
