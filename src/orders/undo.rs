//! Undo/redo stacks and the concrete reversible actions.
//!
//! Actions never hold references into the collections. They keep the ids of
//! the items they touch plus whatever prior values they need to restore, and
//! reach the live items through the [`CollectionManager`] passed to each call.

use crate::orders::archive::{archive_with_group, get_affected_items, unarchive_with_group};
use crate::orders::collections::{CollectionManager, Location};
use crate::orders::id::{GroupId, OrderId};
use crate::orders::linking::{link_items, unlink_group, LinkError};
use crate::orders::models::{EditableField, OrderItem, OrderStatus, TimestampSnapshot};
use crate::orders::work_time::TimeAccrual;
use chrono::NaiveDateTime;
use std::collections::VecDeque;

/// Default number of actions kept on the undo stack.
pub const DEFAULT_MAX_UNDO: usize = 50;

/// A reversible mutation of the collections.
pub trait UndoableAction: Send {
    /// Apply the action for the first time.
    fn execute(&mut self, collections: &CollectionManager);

    /// Reverse a previous `execute` or `redo`.
    fn undo(&mut self, collections: &CollectionManager);

    /// Re-apply after an undo.
    fn redo(&mut self, collections: &CollectionManager) {
        self.execute(collections);
    }

    /// Short human-readable label, e.g. for an "Undo ..." menu entry.
    fn description(&self) -> String;
}

/// Stack state delivered to observers after every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackChanged {
    /// Actions available to undo.
    pub undo_count: usize,
    /// Actions available to redo.
    pub redo_count: usize,
    /// Description of the next undo.
    pub undo_description: Option<String>,
    /// Description of the next redo.
    pub redo_description: Option<String>,
}

type StackObserver = Box<dyn FnMut(&StackChanged) + Send>;

/// Bounded undo stack with a redo stack that is cleared by new actions.
pub struct UndoRedoManager {
    undo_stack: VecDeque<Box<dyn UndoableAction>>,
    redo_stack: Vec<Box<dyn UndoableAction>>,
    max_size: usize,
    observers: Vec<StackObserver>,
}

impl std::fmt::Debug for UndoRedoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoRedoManager")
            .field("undo_count", &self.undo_stack.len())
            .field("redo_count", &self.redo_stack.len())
            .field("max_size", &self.max_size)
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl Default for UndoRedoManager {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_UNDO)
    }
}

impl UndoRedoManager {
    /// Create a manager keeping at most `max_size` undoable actions (minimum 1).
    pub fn new(max_size: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            max_size: max_size.max(1),
            observers: Vec::new(),
        }
    }

    /// Maximum undo depth.
    pub const fn max_size(&self) -> usize {
        self.max_size
    }

    /// Register an observer called after every stack change.
    pub fn subscribe(&mut self, observer: impl FnMut(&StackChanged) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Execute `action` and make it undoable.
    ///
    /// Clears the redo stack. When the undo stack exceeds the limit the
    /// oldest action is discarded.
    pub fn execute_action(
        &mut self,
        mut action: Box<dyn UndoableAction>,
        collections: &CollectionManager,
    ) {
        action.execute(collections);
        tracing::debug!(action = %action.description(), "executed action");
        self.undo_stack.push_back(action);
        self.redo_stack.clear();
        while self.undo_stack.len() > self.max_size {
            self.undo_stack.pop_front();
        }
        self.notify();
    }

    /// Undo the most recent action. Returns `false` when there is nothing to undo.
    pub fn undo(&mut self, collections: &CollectionManager) -> bool {
        let Some(mut action) = self.undo_stack.pop_back() else {
            return false;
        };
        action.undo(collections);
        tracing::debug!(action = %action.description(), "undid action");
        self.redo_stack.push(action);
        self.notify();
        true
    }

    /// Redo the most recently undone action. Returns `false` when there is nothing to redo.
    pub fn redo(&mut self, collections: &CollectionManager) -> bool {
        let Some(mut action) = self.redo_stack.pop() else {
            return false;
        };
        action.redo(collections);
        tracing::debug!(action = %action.description(), "redid action");
        self.undo_stack.push_back(action);
        self.notify();
        true
    }

    /// Drop both stacks.
    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.notify();
    }

    /// Actions available to undo.
    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    /// Actions available to redo.
    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    /// Whether `undo` would do anything.
    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    /// Whether `redo` would do anything.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    /// Description of the action `undo` would reverse.
    pub fn peek_undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|action| action.description())
    }

    /// Description of the action `redo` would re-apply.
    pub fn peek_redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(|action| action.description())
    }

    fn notify(&mut self) {
        if self.observers.is_empty() {
            return;
        }
        let event = StackChanged {
            undo_count: self.undo_count(),
            redo_count: self.redo_count(),
            undo_description: self.peek_undo_description(),
            redo_description: self.peek_redo_description(),
        };
        for observer in &mut self.observers {
            observer(&event);
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        "item"
    } else {
        "items"
    }
}

/// Change the status of one or more items.
#[derive(Debug, Clone)]
pub struct StatusChangeAction {
    ids: Vec<OrderId>,
    new_status: OrderStatus,
    now: NaiveDateTime,
    accrual: TimeAccrual,
    previous: Vec<(OrderId, OrderStatus, TimestampSnapshot)>,
}

impl StatusChangeAction {
    /// Set `ids` to `new_status` as of `now`, accruing wall-clock time.
    pub fn new(ids: Vec<OrderId>, new_status: OrderStatus, now: NaiveDateTime) -> Self {
        Self::with_accrual(ids, new_status, now, TimeAccrual::WallClock)
    }

    /// Set `ids` to `new_status` as of `now`, accruing under `accrual`.
    pub const fn with_accrual(
        ids: Vec<OrderId>,
        new_status: OrderStatus,
        now: NaiveDateTime,
        accrual: TimeAccrual,
    ) -> Self {
        Self { ids, new_status, now, accrual, previous: Vec::new() }
    }
}

impl UndoableAction for StatusChangeAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.previous.clear();
        for id in &self.ids {
            let captured = collections.with_item_mut(id, |item| {
                let prior = (item.status, item.timestamps());
                item.set_status_with(self.new_status, self.now, self.accrual);
                prior
            });
            match captured {
                Some((status, timestamps)) => self.previous.push((*id, status, timestamps)),
                None => tracing::debug!(%id, "status change skipped missing item"),
            }
        }
    }

    fn undo(&mut self, collections: &CollectionManager) {
        for (id, status, timestamps) in &self.previous {
            collections.with_item_mut(id, |item| {
                item.status = *status;
                item.apply_timestamps(timestamps);
            });
        }
    }

    fn description(&self) -> String {
        let count = self.ids.len();
        format!("Change status of {count} {} to {}", plural(count), self.new_status)
    }
}

#[derive(Debug, Clone, Copy)]
struct ArchiveState {
    status: OrderStatus,
    is_archived: bool,
    previous_status: Option<OrderStatus>,
    timestamps: TimestampSnapshot,
}

impl ArchiveState {
    const fn capture(item: &OrderItem) -> Self {
        Self {
            status: item.status,
            is_archived: item.is_archived,
            previous_status: item.previous_status,
            timestamps: item.timestamps(),
        }
    }

    fn restore(&self, item: &mut OrderItem) {
        item.status = self.status;
        item.is_archived = self.is_archived;
        item.previous_status = self.previous_status;
        item.apply_timestamps(&self.timestamps);
    }
}

fn capture_group(
    collections: &CollectionManager,
    id: &OrderId,
    from: Location,
) -> Vec<(OrderId, ArchiveState)> {
    collections.with_all(|active, archived| {
        let source = match from {
            Location::Active => active,
            Location::Archived => archived,
        };
        get_affected_items(id, source)
            .into_iter()
            .filter_map(|member| {
                source
                    .iter()
                    .find(|item| item.id() == &member)
                    .map(|item| (member, ArchiveState::capture(item)))
            })
            .collect()
    })
}

/// Archive items together with their linked groups.
#[derive(Debug, Clone)]
pub struct ArchiveAction {
    ids: Vec<OrderId>,
    previous: Vec<(OrderId, ArchiveState)>,
}

impl ArchiveAction {
    /// Archive `ids` (and every member of their groups).
    pub const fn new(ids: Vec<OrderId>) -> Self {
        Self { ids, previous: Vec::new() }
    }
}

impl UndoableAction for ArchiveAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.previous.clear();
        for id in &self.ids {
            let captured = capture_group(collections, id, Location::Active);
            archive_with_group(collections, id);
            self.previous.extend(captured);
        }
    }

    fn undo(&mut self, collections: &CollectionManager) {
        for (id, state) in &self.previous {
            collections.move_to_active(id);
            collections.with_item_mut(id, |item| state.restore(item));
        }
    }

    fn description(&self) -> String {
        format!("Archive {} {}", self.ids.len(), plural(self.ids.len()))
    }
}

/// Unarchive items together with their linked groups.
#[derive(Debug, Clone)]
pub struct UnarchiveAction {
    ids: Vec<OrderId>,
    now: NaiveDateTime,
    accrual: TimeAccrual,
    previous: Vec<(OrderId, ArchiveState)>,
}

impl UnarchiveAction {
    /// Unarchive `ids` (and every member of their groups) as of `now`.
    pub fn new(ids: Vec<OrderId>, now: NaiveDateTime) -> Self {
        Self::with_accrual(ids, now, TimeAccrual::WallClock)
    }

    /// Unarchive as of `now`, accruing any restored status change under `accrual`.
    pub const fn with_accrual(ids: Vec<OrderId>, now: NaiveDateTime, accrual: TimeAccrual) -> Self {
        Self { ids, now, accrual, previous: Vec::new() }
    }
}

impl UndoableAction for UnarchiveAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.previous.clear();
        for id in &self.ids {
            let captured = capture_group(collections, id, Location::Archived);
            unarchive_with_group(collections, id, self.now, self.accrual);
            self.previous.extend(captured);
        }
    }

    fn undo(&mut self, collections: &CollectionManager) {
        for (id, state) in &self.previous {
            collections.move_to_archived(id);
            collections.with_item_mut(id, |item| state.restore(item));
        }
    }

    fn description(&self) -> String {
        format!("Unarchive {} {}", self.ids.len(), plural(self.ids.len()))
    }
}

/// Prior grouping and timings of an item touched by a link change.
#[derive(Debug, Clone, Copy)]
struct LinkState {
    group: Option<GroupId>,
    timestamps: TimestampSnapshot,
}

/// Link items into a target's group.
#[derive(Debug, Clone)]
pub struct LinkAction {
    items: Vec<OrderId>,
    target: OrderId,
    previous: Vec<(OrderId, LinkState)>,
}

impl LinkAction {
    /// Validate a link against the current active items without mutating them.
    ///
    /// # Errors
    ///
    /// Returns the [`LinkError`] the link would fail with.
    pub fn prepare(
        collections: &CollectionManager,
        items: Vec<OrderId>,
        target: Option<OrderId>,
    ) -> Result<Self, LinkError> {
        collections.with_all(|active, _| {
            let mut scratch = active.to_vec();
            link_items(&items, target.as_ref(), &mut scratch)
        })?;
        let target = target.ok_or(LinkError::NoTarget)?;
        Ok(Self { items, target, previous: Vec::new() })
    }
}

impl UndoableAction for LinkAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.previous.clear();
        let previous = collections.with_active_mut(|active| {
            let before: Vec<(OrderId, LinkState)> = active
                .iter()
                .map(|item| {
                    let state =
                        LinkState { group: item.linked_group_id, timestamps: item.timestamps() };
                    (*item.id(), state)
                })
                .collect();

            if let Err(e) = link_items(&self.items, Some(&self.target), active) {
                tracing::warn!(target_id = %self.target, "link no longer valid: {e}");
                return Vec::new();
            }

            before
                .into_iter()
                .zip(active.iter())
                .filter(|((_, state), item)| {
                    state.group != item.linked_group_id || state.timestamps != item.timestamps()
                })
                .map(|(before, _)| before)
                .collect()
        });
        self.previous = previous;
    }

    fn undo(&mut self, collections: &CollectionManager) {
        for (id, state) in &self.previous {
            collections.with_item_mut(id, |item| {
                item.linked_group_id = state.group;
                item.apply_timestamps(&state.timestamps);
            });
        }
    }

    fn description(&self) -> String {
        format!("Link {} {}", self.items.len(), plural(self.items.len()))
    }
}

/// Dissolve the linked groups of one or more items.
#[derive(Debug, Clone)]
pub struct UnlinkAction {
    targets: Vec<OrderId>,
    previous: Vec<(OrderId, GroupId)>,
}

impl UnlinkAction {
    /// Dissolve the groups containing `targets`.
    pub const fn new(targets: Vec<OrderId>) -> Self {
        Self { targets, previous: Vec::new() }
    }
}

impl UndoableAction for UnlinkAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.previous.clear();
        let previous = collections.with_active_mut(|active| {
            let mut previous = Vec::new();
            for target in &self.targets {
                let Some(group) =
                    active.iter().find(|item| item.id() == target).and_then(|i| i.linked_group_id)
                else {
                    continue;
                };
                previous.extend(unlink_group(target, active).into_iter().map(|id| (id, group)));
            }
            previous
        });
        self.previous = previous;
    }

    fn undo(&mut self, collections: &CollectionManager) {
        for (id, group) in &self.previous {
            collections.with_item_mut(id, |item| item.linked_group_id = Some(*group));
        }
    }

    fn description(&self) -> String {
        format!("Unlink {} {}", self.targets.len(), plural(self.targets.len()))
    }
}

/// Recolor one or more items.
#[derive(Debug, Clone)]
pub struct ColorChangeAction {
    ids: Vec<OrderId>,
    color_hex: String,
    previous: Vec<(OrderId, String)>,
}

impl ColorChangeAction {
    /// Set the color of `ids` to `color_hex`.
    pub fn new(ids: Vec<OrderId>, color_hex: impl Into<String>) -> Self {
        Self { ids, color_hex: color_hex.into(), previous: Vec::new() }
    }
}

impl UndoableAction for ColorChangeAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.previous.clear();
        for id in &self.ids {
            let replaced = collections.with_item_mut(id, |item| {
                std::mem::replace(&mut item.color_hex, self.color_hex.clone())
            });
            if let Some(old) = replaced {
                self.previous.push((*id, old));
            }
        }
    }

    fn undo(&mut self, collections: &CollectionManager) {
        for (id, old) in &self.previous {
            collections.with_item_mut(id, |item| item.color_hex.clone_from(old));
        }
    }

    fn description(&self) -> String {
        format!("Change color of {} {}", self.ids.len(), plural(self.ids.len()))
    }
}

/// Delete items from whichever collection holds them.
#[derive(Debug, Clone)]
pub struct DeleteAction {
    ids: Vec<OrderId>,
    removed: Vec<(Location, usize, OrderItem)>,
}

impl DeleteAction {
    /// Delete `ids`.
    pub const fn new(ids: Vec<OrderId>) -> Self {
        Self { ids, removed: Vec::new() }
    }

    /// Items removed by the last execute, for callers that must also delete
    /// them from storage.
    pub fn removed_ids(&self) -> Vec<OrderId> {
        self.removed.iter().map(|(_, _, item)| *item.id()).collect()
    }
}

impl UndoableAction for DeleteAction {
    fn execute(&mut self, collections: &CollectionManager) {
        // Indices are taken before any removal so ascending reinsertion
        // rebuilds the original order.
        let positions: Vec<(OrderId, Location, usize)> = collections.with_all(|active, archived| {
            self.ids
                .iter()
                .filter_map(|id| {
                    active
                        .iter()
                        .position(|item| item.id() == id)
                        .map(|index| (*id, Location::Active, index))
                        .or_else(|| {
                            archived
                                .iter()
                                .position(|item| item.id() == id)
                                .map(|index| (*id, Location::Archived, index))
                        })
                })
                .collect()
        });

        self.removed.clear();
        for (id, location, index) in positions {
            let removed = match location {
                Location::Active => collections.remove_from_items(&id),
                Location::Archived => collections.remove_from_archived(&id),
            };
            if let Some((_, item)) = removed {
                self.removed.push((location, index, item));
            }
        }
    }

    fn undo(&mut self, collections: &CollectionManager) {
        let mut restore = self.removed.clone();
        restore
            .sort_by_key(|(location, index, _)| (matches!(location, Location::Archived), *index));
        for (location, index, item) in restore {
            match location {
                Location::Active => collections.insert_into_items(index, item),
                Location::Archived => collections.insert_into_archived(index, item),
            };
        }
    }

    fn description(&self) -> String {
        format!("Delete {} {}", self.ids.len(), plural(self.ids.len()))
    }
}

/// Insert copies of items into the active collection.
#[derive(Debug, Clone)]
pub struct PasteAction {
    items: Vec<OrderItem>,
    index: Option<usize>,
    inserted: Vec<OrderId>,
}

impl PasteAction {
    /// Paste `items` at `index` (appending when `None` or out of range).
    pub const fn new(items: Vec<OrderItem>, index: Option<usize>) -> Self {
        Self { items, index, inserted: Vec::new() }
    }
}

impl UndoableAction for PasteAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.inserted.clear();
        for item in &self.items {
            let id = *item.id();
            let added = match self.index {
                Some(index) => {
                    collections.insert_into_items(index + self.inserted.len(), item.clone())
                }
                None => collections.add_to_items(item.clone()),
            };
            if added {
                self.inserted.push(id);
            }
        }
    }

    fn undo(&mut self, collections: &CollectionManager) {
        for id in &self.inserted {
            collections.remove_from_items(id);
        }
    }

    fn description(&self) -> String {
        format!("Paste {} {}", self.items.len(), plural(self.items.len()))
    }
}

/// Move an active item to a new position.
#[derive(Debug, Clone, Copy)]
pub struct ReorderAction {
    old_index: usize,
    new_index: usize,
    applied: bool,
}

impl ReorderAction {
    /// Move the item at `old_index` to `new_index`.
    pub const fn new(old_index: usize, new_index: usize) -> Self {
        Self { old_index, new_index, applied: false }
    }
}

impl UndoableAction for ReorderAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.applied = collections.move_within_items(self.old_index, self.new_index);
    }

    fn undo(&mut self, collections: &CollectionManager) {
        if self.applied {
            collections.move_within_items(self.new_index, self.old_index);
        }
    }

    fn description(&self) -> String {
        "Reorder item".to_string()
    }
}

/// Edit one free-text field of one item.
#[derive(Debug, Clone)]
pub struct FieldEditAction {
    id: OrderId,
    field: EditableField,
    new_value: String,
    old_value: Option<String>,
}

impl FieldEditAction {
    /// Set `field` of `id` to `new_value`.
    pub fn new(id: OrderId, field: EditableField, new_value: impl Into<String>) -> Self {
        Self { id, field, new_value: new_value.into(), old_value: None }
    }
}

impl UndoableAction for FieldEditAction {
    fn execute(&mut self, collections: &CollectionManager) {
        self.old_value =
            collections
                .with_item_mut(&self.id, |item| self.field.set(item, self.new_value.clone()));
    }

    fn undo(&mut self, collections: &CollectionManager) {
        if let Some(old) = &self.old_value {
            collections.with_item_mut(&self.id, |item| self.field.set(item, old.clone()));
        }
    }

    fn description(&self) -> String {
        format!("Edit {:?}", self.field)
    }
}

/// Several actions undone and redone as one step.
pub struct BatchAction {
    label: String,
    actions: Vec<Box<dyn UndoableAction>>,
}

impl std::fmt::Debug for BatchAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchAction")
            .field("label", &self.label)
            .field("actions", &self.actions.len())
            .finish()
    }
}

impl BatchAction {
    /// Group `actions` under `label`.
    pub fn new(label: impl Into<String>, actions: Vec<Box<dyn UndoableAction>>) -> Self {
        Self { label: label.into(), actions }
    }

    /// Number of grouped actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl UndoableAction for BatchAction {
    fn execute(&mut self, collections: &CollectionManager) {
        for action in &mut self.actions {
            action.execute(collections);
        }
    }

    fn undo(&mut self, collections: &CollectionManager) {
        for action in self.actions.iter_mut().rev() {
            action.undo(collections);
        }
    }

    fn redo(&mut self, collections: &CollectionManager) {
        for action in &mut self.actions {
            action.redo(collections);
        }
    }

    fn description(&self) -> String {
        self.label.clone()
    }
}
