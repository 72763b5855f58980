//! The OrderLog: collections, undo history and persistence wired together.
//!
//! Every mutation goes through [`OrderLog::execute`] (or undo/redo), which
//! recomputes the cached link counts and saves a snapshot afterwards.

use crate::config::OrderLogConfig;
use crate::orders::collections::CollectionManager;
use crate::orders::filter::{apply_all_filters, FilterCriteria};
use crate::orders::grouping::{
    build_display_collection, populate_status_groups, update_linked_item_counts, ArchivedDisplay,
    DisplayOptions, OrderItemGroup, StatusLanes,
};
use crate::orders::id::OrderId;
use crate::orders::linking::{expand_to_full_linked_groups, LinkError};
use crate::orders::models::{EditableField, OrderItem, OrderStatus};
use crate::orders::store::{OrderRepository, PersistenceGateway};
use crate::orders::undo::{
    ArchiveAction, ColorChangeAction, DeleteAction, FieldEditAction, LinkAction, PasteAction,
    ReorderAction, StatusChangeAction, UnarchiveAction, UndoRedoManager, UndoableAction,
    UnlinkAction,
};
use crate::orders::work_time::TimeAccrual;
use chrono::NaiveDateTime;
use std::thread::JoinHandle;

/// The OrderLog core for one data store.
#[derive(Debug)]
pub struct OrderLog<R> {
    collections: CollectionManager,
    undo: UndoRedoManager,
    gateway: PersistenceGateway<R>,
    config: OrderLogConfig,
    accrual: TimeAccrual,
    archived: ArchivedDisplay,
}

impl<R: OrderRepository> OrderLog<R> {
    /// Create an empty OrderLog over `repository`. Call [`load`](Self::load)
    /// to read stored items.
    pub fn new(repository: R, config: OrderLogConfig) -> Self {
        let accrual = config.time_accrual().unwrap_or_else(|e| {
            tracing::warn!("falling back to wall-clock accrual: {e}");
            TimeAccrual::WallClock
        });
        Self {
            collections: CollectionManager::new(),
            undo: UndoRedoManager::new(config.undo_limit),
            gateway: PersistenceGateway::new(repository),
            config,
            accrual,
            archived: ArchivedDisplay::new(),
        }
    }

    /// The item collections.
    pub const fn collections(&self) -> &CollectionManager {
        &self.collections
    }

    /// Undo history, for inspection.
    pub const fn undo_manager(&self) -> &UndoRedoManager {
        &self.undo
    }

    /// Undo history, for registering observers.
    pub fn undo_manager_mut(&mut self) -> &mut UndoRedoManager {
        &mut self.undo
    }

    /// The persistence gateway, for registering failure observers.
    pub const fn gateway(&self) -> &PersistenceGateway<R> {
        &self.gateway
    }

    /// Active configuration.
    pub const fn config(&self) -> &OrderLogConfig {
        &self.config
    }

    /// Accrual policy used for status changes.
    pub const fn accrual(&self) -> TimeAccrual {
        self.accrual
    }

    /// Replace the collections with what storage holds. Clears undo history.
    ///
    /// Returns the number of items loaded.
    pub fn load(&mut self) -> usize {
        let (archived, active): (Vec<OrderItem>, Vec<OrderItem>) =
            self.gateway.load_all().into_iter().partition(|item| item.is_archived);
        let count = active.len() + archived.len();
        self.collections.replace_all(active, archived);
        self.refresh_counts();
        self.undo.clear();
        tracing::info!(count, "order log loaded");
        count
    }

    /// Write the current collections to storage. Returns whether it succeeded.
    pub fn save(&self) -> bool {
        let items = self.collections.with_all_mut(|active, archived| {
            for (index, item) in active.iter_mut().chain(archived.iter_mut()).enumerate() {
                item.sort_index = i64::try_from(index).unwrap_or(i64::MAX);
            }
            active.iter().chain(archived.iter()).cloned().collect::<Vec<_>>()
        });
        self.gateway.save_all(&items)
    }

    /// Execute an undoable action, then refresh and save.
    pub fn execute(&mut self, action: Box<dyn UndoableAction>) {
        self.undo.execute_action(action, &self.collections);
        self.after_mutation();
    }

    /// Undo the last action. Returns `false` if there was none.
    pub fn undo(&mut self) -> bool {
        let undone = self.undo.undo(&self.collections);
        if undone {
            self.after_mutation();
        }
        undone
    }

    /// Redo the last undone action. Returns `false` if there was none.
    pub fn redo(&mut self) -> bool {
        let redone = self.undo.redo(&self.collections);
        if redone {
            self.after_mutation();
        }
        redone
    }

    fn refresh_counts(&self) {
        self.collections.with_all_mut(|active, archived| {
            update_linked_item_counts(active);
            update_linked_item_counts(archived);
        });
    }

    fn after_mutation(&self) {
        self.refresh_counts();
        self.save();
    }

    /// Add a new item to the end of the active list.
    pub fn add(&mut self, mut item: OrderItem) -> OrderId {
        if item.color_hex.trim().is_empty() {
            item.color_hex.clone_from(&self.config.default_color);
        }
        let id = *item.id();
        self.execute(Box::new(PasteAction::new(vec![item], None)));
        id
    }

    /// Paste fresh copies of `items` at `index` (or the end).
    ///
    /// Returns the ids of the copies.
    pub fn paste(
        &mut self,
        items: &[OrderItem],
        index: Option<usize>,
        now: NaiveDateTime,
    ) -> Vec<OrderId> {
        let copies: Vec<OrderItem> = items.iter().map(|item| item.duplicate(now)).collect();
        let ids = copies.iter().map(|item| *item.id()).collect();
        self.execute(Box::new(PasteAction::new(copies, index)));
        ids
    }

    /// Set the status of `ids` and every member of their linked groups.
    pub fn set_status(&mut self, ids: &[OrderId], status: OrderStatus, now: NaiveDateTime) {
        let expanded =
            self.collections.with_all(|active, _| expand_to_full_linked_groups(ids, active));
        let action = StatusChangeAction::with_accrual(expanded, status, now, self.accrual);
        self.execute(Box::new(action));
    }

    /// Advance `id` (and its group) to the next status in the cycle.
    ///
    /// Returns the new status, or `None` if the item is unknown.
    pub fn cycle_status(&mut self, id: &OrderId, now: NaiveDateTime) -> Option<OrderStatus> {
        let next = self.collections.find(id)?.status.next();
        self.set_status(&[*id], next, now);
        Some(next)
    }

    /// Archive `ids` with their groups.
    pub fn archive(&mut self, ids: Vec<OrderId>) {
        self.execute(Box::new(ArchiveAction::new(ids)));
    }

    /// Unarchive `ids` with their groups as of `now`.
    pub fn unarchive(&mut self, ids: Vec<OrderId>, now: NaiveDateTime) {
        self.execute(Box::new(UnarchiveAction::with_accrual(ids, now, self.accrual)));
    }

    /// Link `items` into `target`'s group.
    ///
    /// # Errors
    ///
    /// Returns the validation failure; nothing is changed or recorded.
    pub fn link(&mut self, items: Vec<OrderId>, target: Option<OrderId>) -> Result<(), LinkError> {
        let action = LinkAction::prepare(&self.collections, items, target)?;
        self.execute(Box::new(action));
        Ok(())
    }

    /// Dissolve the groups containing `targets`.
    pub fn unlink(&mut self, targets: Vec<OrderId>) {
        self.execute(Box::new(UnlinkAction::new(targets)));
    }

    /// Recolor `ids`.
    pub fn set_color(&mut self, ids: Vec<OrderId>, color_hex: &str) {
        self.execute(Box::new(ColorChangeAction::new(ids, color_hex)));
    }

    /// Delete `ids` and every member of their active linked groups from
    /// whichever collection holds them.
    pub fn delete(&mut self, ids: Vec<OrderId>) {
        let expanded =
            self.collections.with_all(|active, _| expand_to_full_linked_groups(&ids, active));
        self.execute(Box::new(DeleteAction::new(expanded)));
    }

    /// Move the active item at `old_index` to `new_index`.
    pub fn reorder(&mut self, old_index: usize, new_index: usize) {
        self.execute(Box::new(ReorderAction::new(old_index, new_index)));
    }

    /// Edit one field. Returns `false` (recording nothing) when the item is
    /// unknown or the field does not exist on its note type.
    pub fn edit_field(&mut self, id: &OrderId, field: EditableField, value: &str) -> bool {
        let Some(item) = self.collections.find(id) else {
            tracing::debug!(%id, "edit requested for unknown item");
            return false;
        };
        if !field.applies_to(item.note_type) {
            tracing::debug!(%id, ?field, "field does not apply to {}", item.note_type.as_str());
            return false;
        }
        self.execute(Box::new(FieldEditAction::new(*id, field, value)));
        true
    }

    /// Filtered, grouped and sorted active items.
    pub fn display(
        &self,
        criteria: &FilterCriteria,
        options: &DisplayOptions,
    ) -> Vec<OrderItemGroup> {
        self.collections.with_all(|active, _| {
            build_display_collection(apply_all_filters(active, criteria), options)
        })
    }

    /// Filtered active items bucketed into status lanes.
    pub fn status_lanes(&self, criteria: &FilterCriteria) -> StatusLanes {
        self.collections
            .with_all(|active, _| populate_status_groups(apply_all_filters(active, criteria)))
    }

    /// Rebuild the archived display from the archived items matching
    /// `criteria`, off-thread. See [`ArchivedDisplay`].
    pub fn refresh_archived(
        &self,
        criteria: &FilterCriteria,
        options: DisplayOptions,
    ) -> Option<JoinHandle<()>> {
        self.collections
            .with_all(|_, archived| self.archived.request_refresh(archived, criteria, options))
    }

    /// The archived display.
    pub const fn archived_display(&self) -> &ArchivedDisplay {
        &self.archived
    }
}
