//! Active and archived item collections with O(1) membership tracking.
//!
//! Each collection is an ordered `Vec` paired with a `HashSet` of ids. Both
//! live behind one mutex so a reader never sees one updated without the
//! other. Callers that need to mutate items get slice access only; a slice
//! cannot change a collection's length, and ids are immutable, so the id sets
//! stay valid.

use crate::orders::id::OrderId;
use crate::orders::models::OrderItem;
use parking_lot::Mutex;
use std::collections::HashSet;

/// Which collection an item lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// The active (unarchived) list.
    Active,
    /// The archived list.
    Archived,
}

#[derive(Debug, Default)]
struct Collections {
    items: Vec<OrderItem>,
    archived: Vec<OrderItem>,
    item_ids: HashSet<OrderId>,
    archived_ids: HashSet<OrderId>,
}

impl Collections {
    fn rebuild_ids(&mut self) {
        self.item_ids = self.items.iter().map(|item| *item.id()).collect();
        self.archived_ids = self.archived.iter().map(|item| *item.id()).collect();
    }

    fn remove_active(&mut self, id: &OrderId) -> Option<(usize, OrderItem)> {
        if !self.item_ids.remove(id) {
            return None;
        }
        let index = self.items.iter().position(|item| item.id() == id)?;
        Some((index, self.items.remove(index)))
    }

    fn remove_archived(&mut self, id: &OrderId) -> Option<(usize, OrderItem)> {
        if !self.archived_ids.remove(id) {
            return None;
        }
        let index = self.archived.iter().position(|item| item.id() == id)?;
        Some((index, self.archived.remove(index)))
    }
}

/// Owner of the active and archived collections.
#[derive(Debug, Default)]
pub struct CollectionManager {
    inner: Mutex<Collections>,
}

impl CollectionManager {
    /// Create an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a manager from loaded collections and build its id sets.
    #[must_use]
    pub fn with_items(items: Vec<OrderItem>, archived: Vec<OrderItem>) -> Self {
        let manager = Self::new();
        manager.replace_all(items, archived);
        manager
    }

    /// Replace both collections (bulk load) and rebuild tracking.
    pub fn replace_all(&self, items: Vec<OrderItem>, archived: Vec<OrderItem>) {
        let mut inner = self.inner.lock();
        inner.items = items;
        inner.archived = archived;
        inner.rebuild_ids();
    }

    /// Rebuild both id sets from the current collection contents.
    pub fn initialize_tracking(&self) {
        self.inner.lock().rebuild_ids();
    }

    /// Append to the active collection. Returns `false` if already present.
    pub fn add_to_items(&self, item: OrderItem) -> bool {
        let mut inner = self.inner.lock();
        if !inner.item_ids.insert(*item.id()) {
            return false;
        }
        inner.items.push(item);
        true
    }

    /// Insert into the active collection at `index` (clamped to the end).
    /// Returns `false` if already present.
    pub fn insert_into_items(&self, index: usize, item: OrderItem) -> bool {
        let mut inner = self.inner.lock();
        if !inner.item_ids.insert(*item.id()) {
            return false;
        }
        let index = index.min(inner.items.len());
        inner.items.insert(index, item);
        true
    }

    /// Append to the archived collection. Returns `false` if already present.
    pub fn add_to_archived(&self, item: OrderItem) -> bool {
        let mut inner = self.inner.lock();
        if !inner.archived_ids.insert(*item.id()) {
            return false;
        }
        inner.archived.push(item);
        true
    }

    /// Insert into the archived collection at `index` (clamped to the end).
    /// Returns `false` if already present.
    pub fn insert_into_archived(&self, index: usize, item: OrderItem) -> bool {
        let mut inner = self.inner.lock();
        if !inner.archived_ids.insert(*item.id()) {
            return false;
        }
        let index = index.min(inner.archived.len());
        inner.archived.insert(index, item);
        true
    }

    /// Add every item to the active collection; returns how many were new.
    pub fn add_range_to_items(&self, items: impl IntoIterator<Item = OrderItem>) -> usize {
        items.into_iter().map(|item| usize::from(self.add_to_items(item))).sum()
    }

    /// Add every item to the archived collection; returns how many were new.
    pub fn add_range_to_archived(&self, items: impl IntoIterator<Item = OrderItem>) -> usize {
        items.into_iter().map(|item| usize::from(self.add_to_archived(item))).sum()
    }

    /// Remove from the active collection, returning the old index and the item.
    pub fn remove_from_items(&self, id: &OrderId) -> Option<(usize, OrderItem)> {
        self.inner.lock().remove_active(id)
    }

    /// Remove from the archived collection, returning the old index and the item.
    pub fn remove_from_archived(&self, id: &OrderId) -> Option<(usize, OrderItem)> {
        self.inner.lock().remove_archived(id)
    }

    /// Whether `id` is in the active collection.
    pub fn contains_in_items(&self, id: &OrderId) -> bool {
        self.inner.lock().item_ids.contains(id)
    }

    /// Whether `id` is in the archived collection.
    pub fn contains_in_archived(&self, id: &OrderId) -> bool {
        self.inner.lock().archived_ids.contains(id)
    }

    /// Which collection holds `id`, if any.
    pub fn location_of(&self, id: &OrderId) -> Option<Location> {
        let inner = self.inner.lock();
        if inner.item_ids.contains(id) {
            Some(Location::Active)
        } else if inner.archived_ids.contains(id) {
            Some(Location::Archived)
        } else {
            None
        }
    }

    /// Move an item from active to archived in one critical section.
    ///
    /// Refuses (returns `false`) when the item is not active or is already archived.
    pub fn move_to_archived(&self, id: &OrderId) -> bool {
        let mut inner = self.inner.lock();
        if !inner.item_ids.contains(id) || inner.archived_ids.contains(id) {
            return false;
        }
        let Some((_, item)) = inner.remove_active(id) else {
            return false;
        };
        inner.archived_ids.insert(*id);
        inner.archived.push(item);
        true
    }

    /// Move an item from archived to active in one critical section.
    ///
    /// Refuses (returns `false`) when the item is not archived or is already active.
    pub fn move_to_active(&self, id: &OrderId) -> bool {
        let mut inner = self.inner.lock();
        if !inner.archived_ids.contains(id) || inner.item_ids.contains(id) {
            return false;
        }
        let Some((_, item)) = inner.remove_archived(id) else {
            return false;
        };
        inner.item_ids.insert(*id);
        inner.items.push(item);
        true
    }

    /// Archive several items; returns how many moved.
    pub fn move_range_to_archived<'a>(&self, ids: impl IntoIterator<Item = &'a OrderId>) -> usize {
        ids.into_iter().map(|id| usize::from(self.move_to_archived(id))).sum()
    }

    /// Unarchive several items; returns how many moved.
    pub fn move_range_to_active<'a>(&self, ids: impl IntoIterator<Item = &'a OrderId>) -> usize {
        ids.into_iter().map(|id| usize::from(self.move_to_active(id))).sum()
    }

    /// Move an active item from one index to another.
    ///
    /// Returns `false` if either index is out of range.
    pub fn move_within_items(&self, old_index: usize, new_index: usize) -> bool {
        let mut inner = self.inner.lock();
        let len = inner.items.len();
        if old_index >= len || new_index >= len {
            return false;
        }
        let item = inner.items.remove(old_index);
        inner.items.insert(new_index, item);
        true
    }

    /// Number of active items.
    pub fn active_count(&self) -> usize {
        self.inner.lock().items.len()
    }

    /// Number of archived items.
    pub fn archived_count(&self) -> usize {
        self.inner.lock().archived.len()
    }

    /// Clone of the active collection.
    pub fn snapshot_active(&self) -> Vec<OrderItem> {
        self.inner.lock().items.clone()
    }

    /// Clone of the archived collection.
    pub fn snapshot_archived(&self) -> Vec<OrderItem> {
        self.inner.lock().archived.clone()
    }

    /// Clone of both collections, active first.
    pub fn snapshot_all(&self) -> Vec<OrderItem> {
        let inner = self.inner.lock();
        inner.items.iter().chain(inner.archived.iter()).cloned().collect()
    }

    /// Clone of one item from either collection.
    pub fn find(&self, id: &OrderId) -> Option<OrderItem> {
        let inner = self.inner.lock();
        inner.items.iter().chain(inner.archived.iter()).find(|item| item.id() == id).cloned()
    }

    /// Mutate one item in place, wherever it lives.
    pub fn with_item_mut<R>(&self, id: &OrderId, f: impl FnOnce(&mut OrderItem) -> R) -> Option<R> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        inner.items.iter_mut().chain(inner.archived.iter_mut()).find(|item| item.id() == id).map(f)
    }

    /// Mutate the active collection in place.
    pub fn with_active_mut<R>(&self, f: impl FnOnce(&mut [OrderItem]) -> R) -> R {
        f(&mut self.inner.lock().items)
    }

    /// Mutate both collections in place, `(active, archived)`.
    pub fn with_all_mut<R>(&self, f: impl FnOnce(&mut [OrderItem], &mut [OrderItem]) -> R) -> R {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        f(&mut inner.items, &mut inner.archived)
    }

    /// Read both collections, `(active, archived)`.
    pub fn with_all<R>(&self, f: impl FnOnce(&[OrderItem], &[OrderItem]) -> R) -> R {
        let inner = self.inner.lock();
        f(&inner.items, &inner.archived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn now() -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn order(vendor: &str) -> OrderItem {
        OrderItem::new_order(vendor, now())
    }

    #[test]
    fn test_add_is_idempotent() {
        let manager = CollectionManager::new();
        let item = order("Acme");

        assert!(manager.add_to_items(item.clone()));
        assert!(!manager.add_to_items(item));
        assert_eq!(manager.active_count(), 1);
    }

    #[test]
    fn test_remove_absent_returns_none() {
        let manager = CollectionManager::new();
        assert!(manager.remove_from_items(&OrderId::new()).is_none());
        assert!(manager.remove_from_archived(&OrderId::new()).is_none());
    }

    #[test]
    fn test_remove_reports_index() {
        let manager = CollectionManager::new();
        let a = order("A");
        let b = order("B");
        let b_id = *b.id();
        manager.add_to_items(a);
        manager.add_to_items(b);

        let (index, removed) = manager.remove_from_items(&b_id).unwrap();
        assert_eq!(index, 1);
        assert_eq!(removed.vendor_name, "B");
        assert!(!manager.contains_in_items(&b_id));
    }

    #[test]
    fn test_move_to_archived_and_back() {
        let manager = CollectionManager::new();
        let item = order("Acme");
        let id = *item.id();
        manager.add_to_items(item);

        assert!(manager.move_to_archived(&id));
        assert!(!manager.contains_in_items(&id));
        assert!(manager.contains_in_archived(&id));
        assert_eq!(manager.location_of(&id), Some(Location::Archived));

        assert!(!manager.move_to_archived(&id));

        assert!(manager.move_to_active(&id));
        assert!(manager.contains_in_items(&id));
        assert!(!manager.contains_in_archived(&id));
    }

    #[test]
    fn test_move_refuses_when_in_both() {
        let manager = CollectionManager::new();
        let item = order("Acme");
        let id = *item.id();
        manager.add_to_items(item.clone());
        manager.add_to_archived(item);

        assert!(!manager.move_to_archived(&id));
        assert!(!manager.move_to_active(&id));
        assert_eq!(manager.active_count(), 1);
        assert_eq!(manager.archived_count(), 1);
    }

    #[test]
    fn test_bulk_variants_count_moves() {
        let manager = CollectionManager::new();
        let items: Vec<OrderItem> = (0..3).map(|i| order(&format!("V{i}"))).collect();
        let ids: Vec<OrderId> = items.iter().map(|i| *i.id()).collect();

        assert_eq!(manager.add_range_to_items(items.clone()), 3);
        assert_eq!(manager.add_range_to_items(items), 0);
        assert_eq!(manager.move_range_to_archived(&ids[..2]), 2);
        assert_eq!(manager.active_count(), 1);
        assert_eq!(manager.archived_count(), 2);
        assert_eq!(manager.move_range_to_active(&ids), 2);
    }

    #[test]
    fn test_insert_clamps_index() {
        let manager = CollectionManager::new();
        manager.add_to_items(order("A"));
        let late = order("Z");
        assert!(manager.insert_into_items(99, late));
        assert_eq!(manager.snapshot_active()[1].vendor_name, "Z");
    }

    #[test]
    fn test_move_within_items() {
        let manager = CollectionManager::new();
        for name in ["A", "B", "C"] {
            manager.add_to_items(order(name));
        }
        assert!(manager.move_within_items(0, 2));
        let names: Vec<String> =
            manager.snapshot_active().into_iter().map(|i| i.vendor_name).collect();
        assert_eq!(names, vec!["B", "C", "A"]);
        assert!(!manager.move_within_items(0, 5));
    }

    #[test]
    fn test_initialize_tracking_after_replace() {
        let items = vec![order("A"), order("B")];
        let archived = vec![order("C")];
        let archived_id = *archived[0].id();
        let manager = CollectionManager::with_items(items, archived);

        assert_eq!(manager.active_count(), 2);
        assert!(manager.contains_in_archived(&archived_id));
        manager.initialize_tracking();
        assert!(manager.contains_in_archived(&archived_id));
    }

    #[test]
    fn test_with_item_mut_finds_archived() {
        let manager = CollectionManager::new();
        let item = order("Acme");
        let id = *item.id();
        manager.add_to_archived(item);

        let changed = manager.with_item_mut(&id, |item| {
            item.color_hex = "#FF0000".to_string();
        });
        assert!(changed.is_some());
        assert_eq!(manager.find(&id).unwrap().color_hex, "#FF0000");
        assert!(manager.with_item_mut(&OrderId::new(), |_| ()).is_none());
    }

    #[test]
    fn test_concurrent_moves_keep_sets_consistent() {
        use std::sync::Arc;

        let manager = Arc::new(CollectionManager::new());
        let items: Vec<OrderItem> = (0..50).map(|i| order(&format!("V{i}"))).collect();
        let ids: Vec<OrderId> = items.iter().map(|i| *i.id()).collect();
        manager.add_range_to_items(items);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let manager = Arc::clone(&manager);
                let ids = ids.clone();
                std::thread::spawn(move || manager.move_range_to_archived(&ids))
            })
            .collect();
        let moved: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(moved, 50);
        assert_eq!(manager.active_count(), 0);
        assert_eq!(manager.archived_count(), 50);
    }
}
