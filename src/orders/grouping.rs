//! Display projections: grouping items into cards, sorting them, and
//! bucketing them into status lanes.
//!
//! Groups are view models rebuilt from `linked_group_id` on every refresh and
//! never cached across refreshes. The archived list, usually the largest, is
//! rebuilt off the calling thread by [`ArchivedDisplay`].

use crate::orders::filter::{apply_all_filters, FilterCriteria};
use crate::orders::id::{GroupId, OrderId};
use crate::orders::models::{OrderItem, OrderStatus};
use chrono::NaiveDateTime;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::thread::JoinHandle;

/// Group-level sort key when not sorting by status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortMode {
    /// Earliest member creation time.
    #[default]
    CreatedAt,
    /// Alphabetically first member vendor name (case-insensitive).
    VendorName,
}

/// How to order the flat display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayOptions {
    /// Sort groups by their most urgent member status.
    pub sort_by_status: bool,
    /// Reverse the group ordering.
    pub sort_descending: bool,
    /// Key used when `sort_by_status` is off.
    pub sort_mode: SortMode,
}

/// One display card: a linked group, or a single unlinked item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderItemGroup {
    /// Shared group id; `None` for a singleton.
    pub group_id: Option<GroupId>,
    /// Members, ordered by creation time.
    pub items: Vec<OrderItem>,
}

impl OrderItemGroup {
    /// Number of members.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the group has no members.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether this card represents a linked group.
    pub const fn is_linked(&self) -> bool {
        self.group_id.is_some()
    }

    /// Every member is a sticky note.
    pub fn is_note_group(&self) -> bool {
        !self.items.is_empty() && self.items.iter().all(OrderItem::is_sticky_note)
    }

    /// Most urgent member status.
    pub fn min_status(&self) -> OrderStatus {
        self.items.iter().map(|item| item.status).min().unwrap_or_default()
    }

    /// Earliest member creation time.
    pub fn earliest_created_at(&self) -> Option<NaiveDateTime> {
        self.items.iter().map(|item| item.created_at).min()
    }

    /// Latest member creation time.
    pub fn latest_created_at(&self) -> Option<NaiveDateTime> {
        self.items.iter().map(|item| item.created_at).max()
    }

    /// Alphabetically first vendor name, lowercased.
    pub fn first_vendor_name(&self) -> String {
        self.items.iter().map(|item| item.vendor_name.to_lowercase()).min().unwrap_or_default()
    }

    /// Member ids in display order.
    pub fn ids(&self) -> Vec<OrderId> {
        self.items.iter().map(|item| *item.id()).collect()
    }

    fn sort_members(&mut self) {
        self.items.sort_by_key(|item| item.created_at);
    }
}

/// Form groups from renderable items, in encounter order.
fn form_groups<'a>(items: impl IntoIterator<Item = &'a OrderItem>) -> Vec<OrderItemGroup> {
    let mut groups: Vec<OrderItemGroup> = Vec::new();
    let mut by_group: HashMap<GroupId, usize> = HashMap::new();

    for item in items.into_iter().filter(|item| item.is_renderable()) {
        match item.linked_group_id {
            Some(group) => {
                if let Some(&index) = by_group.get(&group) {
                    groups[index].items.push(item.clone());
                } else {
                    by_group.insert(group, groups.len());
                    groups.push(OrderItemGroup {
                        group_id: Some(group),
                        items: vec![item.clone()],
                    });
                }
            }
            None => groups.push(OrderItemGroup { group_id: None, items: vec![item.clone()] }),
        }
    }

    for group in &mut groups {
        group.sort_members();
    }
    groups
}

fn compare_groups(a: &OrderItemGroup, b: &OrderItemGroup, options: &DisplayOptions) -> Ordering {
    let ordering = if options.sort_by_status {
        a.min_status().cmp(&b.min_status())
    } else {
        match options.sort_mode {
            SortMode::CreatedAt => a.earliest_created_at().cmp(&b.earliest_created_at()),
            SortMode::VendorName => a.first_vendor_name().cmp(&b.first_vendor_name()),
        }
    };
    if options.sort_descending {
        ordering.reverse()
    } else {
        ordering
    }
}

/// Build the flat display: order groups sorted per `options`, then note
/// groups in encounter order.
///
/// Placeholders are dropped. Members of each group are ordered by creation
/// time regardless of the group sort. Sorting is stable, so ties keep
/// encounter order.
pub fn build_display_collection<'a>(
    items: impl IntoIterator<Item = &'a OrderItem>,
    options: &DisplayOptions,
) -> Vec<OrderItemGroup> {
    let (notes, mut orders): (Vec<_>, Vec<_>) =
        form_groups(items).into_iter().partition(OrderItemGroup::is_note_group);

    orders.sort_by(|a, b| compare_groups(a, b, options));
    orders.extend(notes);
    orders
}

/// Order groups bucketed by status, for the lane view.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusLanes {
    /// Groups whose most urgent member is `NotReady`.
    pub not_ready: Vec<OrderItemGroup>,
    /// Groups whose most urgent member is `OnDeck`.
    pub on_deck: Vec<OrderItemGroup>,
    /// Groups whose most urgent member is `InProgress`.
    pub in_progress: Vec<OrderItemGroup>,
}

impl StatusLanes {
    /// The lane for a status; `None` for Done, which has no lane.
    pub const fn lane(&self, status: OrderStatus) -> Option<&Vec<OrderItemGroup>> {
        match status {
            OrderStatus::NotReady => Some(&self.not_ready),
            OrderStatus::OnDeck => Some(&self.on_deck),
            OrderStatus::InProgress => Some(&self.in_progress),
            OrderStatus::Done => None,
        }
    }

    /// Total groups across all lanes.
    pub fn group_count(&self) -> usize {
        self.not_ready.len() + self.on_deck.len() + self.in_progress.len()
    }
}

/// Bucket order groups into the three working lanes.
///
/// Sticky notes and Done groups are left out. Each lane is ordered by the
/// group's most recent member creation time, newest first.
pub fn populate_status_groups<'a>(items: impl IntoIterator<Item = &'a OrderItem>) -> StatusLanes {
    let mut lanes = StatusLanes::default();

    for mut group in form_groups(items) {
        group.items.retain(|item| !item.is_sticky_note());
        if group.is_empty() {
            continue;
        }
        match group.min_status() {
            OrderStatus::NotReady => lanes.not_ready.push(group),
            OrderStatus::OnDeck => lanes.on_deck.push(group),
            OrderStatus::InProgress => lanes.in_progress.push(group),
            OrderStatus::Done => {}
        }
    }

    for lane in [&mut lanes.not_ready, &mut lanes.on_deck, &mut lanes.in_progress] {
        lane.sort_by(|a, b| b.latest_created_at().cmp(&a.latest_created_at()));
    }
    lanes
}

/// Recompute every item's cached peer count (group size minus one).
pub fn update_linked_item_counts(items: &mut [OrderItem]) {
    let mut sizes: HashMap<GroupId, usize> = HashMap::new();
    for group in items.iter().filter_map(|item| item.linked_group_id) {
        *sizes.entry(group).or_default() += 1;
    }
    for item in items.iter_mut() {
        item.linked_item_count = item
            .linked_group_id
            .and_then(|group| sizes.get(&group))
            .map_or(0, |size| size.saturating_sub(1));
    }
}

/// At-most-one-in-flight guard for background refreshes.
#[derive(Debug, Clone, Default)]
pub struct RefreshGate {
    in_flight: Arc<AtomicBool>,
}

/// Held for the duration of one refresh; releases the gate on drop.
#[derive(Debug)]
pub struct RefreshGuard {
    in_flight: Arc<AtomicBool>,
}

impl Drop for RefreshGuard {
    fn drop(&mut self) {
        self.in_flight.store(false, AtomicOrdering::Release);
    }
}

impl RefreshGate {
    /// Claim the gate, or `None` if a refresh is already running.
    pub fn try_begin(&self) -> Option<RefreshGuard> {
        self.in_flight
            .compare_exchange(false, true, AtomicOrdering::AcqRel, AtomicOrdering::Acquire)
            .ok()
            .map(|_| RefreshGuard { in_flight: Arc::clone(&self.in_flight) })
    }

    /// Whether a refresh is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(AtomicOrdering::Acquire)
    }
}

/// The archived display collection, rebuilt on a worker thread.
///
/// Requests that arrive while a rebuild is running are dropped; the running
/// rebuild already reflects data at least as fresh as the caller's snapshot
/// was meant to be, and the next request after it finishes picks up the rest.
#[derive(Debug, Clone, Default)]
pub struct ArchivedDisplay {
    gate: RefreshGate,
    groups: Arc<Mutex<Vec<OrderItemGroup>>>,
    completed: Arc<AtomicU64>,
}

impl ArchivedDisplay {
    /// Create an empty display.
    pub fn new() -> Self {
        Self::default()
    }

    /// The gate guarding refreshes.
    pub const fn gate(&self) -> &RefreshGate {
        &self.gate
    }

    /// Rebuild from `items` filtered by `criteria` on a worker thread.
    ///
    /// The filtered snapshot is taken on the calling thread. Returns `None`
    /// without doing anything if a rebuild is already running (or the worker
    /// could not be spawned).
    pub fn request_refresh(
        &self,
        items: &[OrderItem],
        criteria: &FilterCriteria,
        options: DisplayOptions,
    ) -> Option<JoinHandle<()>> {
        let Some(guard) = self.gate.try_begin() else {
            tracing::debug!("archived refresh already in flight; dropping request");
            return None;
        };
        let snapshot: Vec<OrderItem> =
            apply_all_filters(items, criteria).into_iter().cloned().collect();

        let groups = Arc::clone(&self.groups);
        let completed = Arc::clone(&self.completed);
        let spawned = std::thread::Builder::new().name("archived-refresh".to_string()).spawn(
            move || {
                let rebuilt = build_display_collection(&snapshot, &options);
                *groups.lock() = rebuilt;
                completed.fetch_add(1, AtomicOrdering::AcqRel);
                drop(guard);
            },
        );

        match spawned {
            Ok(handle) => Some(handle),
            Err(e) => {
                tracing::warn!("failed to spawn archived refresh: {e}");
                None
            }
        }
    }

    /// Current display groups.
    pub fn groups(&self) -> Vec<OrderItemGroup> {
        self.groups.lock().clone()
    }

    /// Number of rebuilds that have completed.
    pub fn completed_refreshes(&self) -> u64 {
        self.completed.load(AtomicOrdering::Acquire)
    }
}
