//! Order model types: the entity, its status state machine and note types.

use crate::orders::id::{deserialize_group_id, GroupId, OrderId};
use crate::orders::work_time::TimeAccrual;
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Color given to new items and treated as "untouched".
pub const DEFAULT_COLOR: &str = "#FFFFFF";

/// Order status, ordered by display priority (most urgent first).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[repr(u8)]
pub enum OrderStatus {
    /// Waiting on something before work can start.
    #[default]
    NotReady = 0,
    /// Queued to start next.
    OnDeck = 1,
    /// Actively being worked.
    InProgress = 2,
    /// Finished.
    Done = 3,
}

impl OrderStatus {
    /// All statuses in priority order.
    pub const ALL: [Self; 4] = [Self::NotReady, Self::OnDeck, Self::InProgress, Self::Done];

    /// Group sorting rank (0 = most urgent).
    #[must_use]
    pub const fn priority(self) -> u8 {
        self as u8
    }

    /// The status a manual toggle moves to. Cycles back from Done to `NotReady`.
    #[must_use]
    pub const fn next(self) -> Self {
        match self {
            Self::NotReady => Self::OnDeck,
            Self::OnDeck => Self::InProgress,
            Self::InProgress => Self::Done,
            Self::Done => Self::NotReady,
        }
    }

    /// Parse a status from a string (case-insensitive, spaces/underscores ignored).
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not a valid status.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, InvalidStatus> {
        let normalized: String =
            s.chars().filter(|c| !matches!(c, ' ' | '_' | '-')).collect::<String>().to_lowercase();
        match normalized.as_str() {
            "notready" => Ok(Self::NotReady),
            "ondeck" => Ok(Self::OnDeck),
            "inprogress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            _ => Err(InvalidStatus(s.to_string())),
        }
    }

    /// Get the string representation of the status.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotReady => "not_ready",
            Self::OnDeck => "on_deck",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid status string is provided.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidStatus(pub String);

impl std::fmt::Display for InvalidStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid status: '{}' (must be one of: not_ready, on_deck, in_progress, done)",
            self.0
        )
    }
}

impl std::error::Error for InvalidStatus {}

/// The two kinds of record the OrderLog tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NoteType {
    /// A vendor/transfer based task.
    #[default]
    Order,
    /// A free-text note with a category.
    StickyNote,
}

impl NoteType {
    /// Get the string representation of the note type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::StickyNote => "sticky_note",
        }
    }
}

/// Time-tracking fields copied as a unit between linked members and kept by
/// undo actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampSnapshot {
    /// When the current status was entered.
    pub status_changed_at: NaiveDateTime,
    /// Accrued time in `InProgress`.
    pub accumulated_in_progress: Duration,
    /// Accrued time in `OnDeck`.
    pub accumulated_on_deck: Duration,
    /// Completion instant, if done.
    pub completed_at: Option<NaiveDateTime>,
}

/// A single order or sticky note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    id: OrderId,
    /// Order or sticky note.
    #[serde(default)]
    pub note_type: NoteType,
    /// Current status.
    #[serde(default)]
    pub status: OrderStatus,
    /// Vendor the order is placed with.
    #[serde(default)]
    pub vendor_name: String,
    /// Transfer number(s), free text.
    #[serde(default)]
    pub transfer_numbers: String,
    /// Warehouse shipment number(s), free text.
    #[serde(default)]
    pub whs_shipment_numbers: String,
    /// Sticky note title.
    #[serde(default)]
    pub note_title: String,
    /// Note body.
    #[serde(default)]
    pub note_content: String,
    /// Sticky note category.
    #[serde(default)]
    pub note_category: String,
    /// Card color as a hex string.
    #[serde(default = "default_color")]
    pub color_hex: String,
    /// Local wall-clock creation time.
    pub created_at: NaiveDateTime,
    /// When the item last entered `Done`.
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    /// When the current status was entered.
    pub status_changed_at: NaiveDateTime,
    /// Accrued time spent `InProgress`.
    #[serde(default = "Duration::zero", with = "duration_millis")]
    pub accumulated_in_progress: Duration,
    /// Accrued time spent `OnDeck`.
    #[serde(default = "Duration::zero", with = "duration_millis")]
    pub accumulated_on_deck: Duration,
    /// Linked group membership.
    #[serde(default, deserialize_with = "deserialize_group_id")]
    pub linked_group_id: Option<GroupId>,
    /// Whether the item lives in the archived collection.
    #[serde(default)]
    pub is_archived: bool,
    /// Status before archiving, restored on unarchive.
    #[serde(default)]
    pub previous_status: Option<OrderStatus>,
    /// Number of other members in this item's group. Recomputed on refresh.
    #[serde(skip)]
    pub linked_item_count: usize,
    /// Display / persistence ordering key.
    #[serde(default)]
    pub sort_index: i64,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl OrderItem {
    /// Create a blank item of the given type.
    #[must_use]
    pub fn new(note_type: NoteType, now: NaiveDateTime) -> Self {
        Self {
            id: OrderId::new(),
            note_type,
            status: OrderStatus::NotReady,
            vendor_name: String::new(),
            transfer_numbers: String::new(),
            whs_shipment_numbers: String::new(),
            note_title: String::new(),
            note_content: String::new(),
            note_category: String::new(),
            color_hex: default_color(),
            created_at: now,
            completed_at: None,
            status_changed_at: now,
            accumulated_in_progress: Duration::zero(),
            accumulated_on_deck: Duration::zero(),
            linked_group_id: None,
            is_archived: false,
            previous_status: None,
            linked_item_count: 0,
            sort_index: 0,
        }
    }

    /// Create an order for a vendor.
    #[must_use]
    pub fn new_order(vendor_name: impl Into<String>, now: NaiveDateTime) -> Self {
        let mut item = Self::new(NoteType::Order, now);
        item.vendor_name = vendor_name.into();
        item
    }

    /// Create a sticky note.
    #[must_use]
    pub fn new_sticky_note(
        title: impl Into<String>,
        content: impl Into<String>,
        now: NaiveDateTime,
    ) -> Self {
        let mut item = Self::new(NoteType::StickyNote, now);
        item.note_title = title.into();
        item.note_content = content.into();
        item
    }

    /// A fresh copy for pasting: new id, same text and color, no group,
    /// status and timers reset.
    #[must_use]
    pub fn duplicate(&self, now: NaiveDateTime) -> Self {
        let mut copy = Self::new(self.note_type, now);
        copy.vendor_name.clone_from(&self.vendor_name);
        copy.transfer_numbers.clone_from(&self.transfer_numbers);
        copy.whs_shipment_numbers.clone_from(&self.whs_shipment_numbers);
        copy.note_title.clone_from(&self.note_title);
        copy.note_content.clone_from(&self.note_content);
        copy.note_category.clone_from(&self.note_category);
        copy.color_hex.clone_from(&self.color_hex);
        copy
    }

    /// The item's stable id.
    #[must_use]
    pub const fn id(&self) -> &OrderId {
        &self.id
    }

    /// Whether this item is a sticky note.
    #[must_use]
    pub fn is_sticky_note(&self) -> bool {
        self.note_type == NoteType::StickyNote
    }

    /// Change status, accruing wall-clock time into the counter of the state
    /// being left.
    ///
    /// Returns `false` when the status is unchanged.
    pub fn set_status(&mut self, status: OrderStatus, now: NaiveDateTime) -> bool {
        self.set_status_with(status, now, TimeAccrual::WallClock)
    }

    /// Change status, accruing time under `accrual`.
    ///
    /// Returns `false` when the status is unchanged.
    pub fn set_status_with(
        &mut self,
        status: OrderStatus,
        now: NaiveDateTime,
        accrual: TimeAccrual,
    ) -> bool {
        if status == self.status {
            return false;
        }

        let elapsed = accrual.elapsed(self.status_changed_at, now);
        match self.status {
            OrderStatus::InProgress => self.accumulated_in_progress += elapsed,
            OrderStatus::OnDeck => self.accumulated_on_deck += elapsed,
            OrderStatus::NotReady | OrderStatus::Done => {}
        }

        if status == OrderStatus::Done {
            self.completed_at = Some(now);
        } else if self.status == OrderStatus::Done {
            self.completed_at = None;
        }

        self.status = status;
        self.status_changed_at = now;
        true
    }

    /// Total time in progress, including the live span if currently in progress.
    #[must_use]
    pub fn time_in_progress(&self, now: NaiveDateTime, accrual: TimeAccrual) -> Duration {
        let live = if self.status == OrderStatus::InProgress {
            accrual.elapsed(self.status_changed_at, now)
        } else {
            Duration::zero()
        };
        self.accumulated_in_progress + live
    }

    /// Total time on deck, including the live span if currently on deck.
    #[must_use]
    pub fn time_on_deck(&self, now: NaiveDateTime, accrual: TimeAccrual) -> Duration {
        let live = if self.status == OrderStatus::OnDeck {
            accrual.elapsed(self.status_changed_at, now)
        } else {
            Duration::zero()
        };
        self.accumulated_on_deck + live
    }

    /// Mark archived, remembering the current status. Status itself is untouched.
    pub fn archive(&mut self) {
        self.previous_status = Some(self.status);
        self.is_archived = true;
    }

    /// Clear the archived flag and restore the pre-archive status
    /// (`InProgress` when none was recorded) as a status change at `now`.
    pub fn unarchive(&mut self, now: NaiveDateTime, accrual: TimeAccrual) {
        self.is_archived = false;
        let restored = self.previous_status.take().unwrap_or(OrderStatus::InProgress);
        self.set_status_with(restored, now, accrual);
    }

    /// Copy of the time-tracking fields.
    #[must_use]
    pub const fn timestamps(&self) -> TimestampSnapshot {
        TimestampSnapshot {
            status_changed_at: self.status_changed_at,
            accumulated_in_progress: self.accumulated_in_progress,
            accumulated_on_deck: self.accumulated_on_deck,
            completed_at: self.completed_at,
        }
    }

    /// Overwrite the time-tracking fields.
    pub fn apply_timestamps(&mut self, snapshot: &TimestampSnapshot) {
        self.status_changed_at = snapshot.status_changed_at;
        self.accumulated_in_progress = snapshot.accumulated_in_progress;
        self.accumulated_on_deck = snapshot.accumulated_on_deck;
        self.completed_at = snapshot.completed_at;
    }

    /// An untouched placeholder: no text, default color, never progressed.
    ///
    /// Such items are neither displayed nor persisted.
    #[must_use]
    pub fn is_practically_empty(&self) -> bool {
        let blank = |s: &str| s.trim().is_empty();
        let default_color = blank(&self.color_hex) || normalize_color(&self.color_hex) == "FFFFFF";

        blank(&self.vendor_name)
            && blank(&self.transfer_numbers)
            && blank(&self.whs_shipment_numbers)
            && blank(&self.note_title)
            && blank(&self.note_content)
            && blank(&self.note_category)
            && default_color
            && self.status == OrderStatus::NotReady
            && self.accumulated_in_progress == Duration::zero()
            && self.accumulated_on_deck == Duration::zero()
    }

    /// Inverse of [`is_practically_empty`](Self::is_practically_empty).
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        !self.is_practically_empty()
    }
}

/// Strip a leading `#` and upper-case a hex color for comparison.
#[must_use]
pub fn normalize_color(color: &str) -> String {
    color.trim().trim_start_matches('#').to_uppercase()
}

/// Free-text fields that can be edited through undoable or bulk edits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditableField {
    /// Vendor name (orders only).
    VendorName,
    /// Transfer numbers (orders only).
    TransferNumbers,
    /// Warehouse shipment numbers (orders only).
    WhsShipmentNumbers,
    /// Note title (sticky notes only).
    NoteTitle,
    /// Note content (both types).
    NoteContent,
    /// Note category (sticky notes only).
    NoteCategory,
}

impl EditableField {
    /// Whether this field exists on items of `note_type`.
    #[must_use]
    pub const fn applies_to(self, note_type: NoteType) -> bool {
        match self {
            Self::VendorName | Self::TransferNumbers | Self::WhsShipmentNumbers => {
                matches!(note_type, NoteType::Order)
            }
            Self::NoteTitle | Self::NoteCategory => matches!(note_type, NoteType::StickyNote),
            Self::NoteContent => true,
        }
    }

    /// Read the field.
    #[must_use]
    pub fn get(self, item: &OrderItem) -> &str {
        match self {
            Self::VendorName => &item.vendor_name,
            Self::TransferNumbers => &item.transfer_numbers,
            Self::WhsShipmentNumbers => &item.whs_shipment_numbers,
            Self::NoteTitle => &item.note_title,
            Self::NoteContent => &item.note_content,
            Self::NoteCategory => &item.note_category,
        }
    }

    /// Write the field, returning the previous value.
    pub fn set(self, item: &mut OrderItem, value: String) -> String {
        let slot = match self {
            Self::VendorName => &mut item.vendor_name,
            Self::TransferNumbers => &mut item.transfer_numbers,
            Self::WhsShipmentNumbers => &mut item.whs_shipment_numbers,
            Self::NoteTitle => &mut item.note_title,
            Self::NoteContent => &mut item.note_content,
            Self::NoteCategory => &mut item.note_category,
        };
        std::mem::replace(slot, value)
    }
}

/// Serde adapter storing a [`Duration`] as whole milliseconds.
mod duration_millis {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_milliseconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let millis = i64::deserialize(deserializer)?;
        Ok(Duration::milliseconds(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6).unwrap().and_hms_opt(hour, minute, 0).unwrap()
    }

    #[test]
    fn test_status_priority_ordering() {
        assert!(OrderStatus::NotReady < OrderStatus::OnDeck);
        assert!(OrderStatus::OnDeck < OrderStatus::InProgress);
        assert!(OrderStatus::InProgress < OrderStatus::Done);
        assert_eq!(OrderStatus::Done.priority(), 3);
    }

    #[test]
    fn test_status_toggle_cycles() {
        let mut status = OrderStatus::NotReady;
        let mut seen = Vec::new();
        for _ in 0..4 {
            status = status.next();
            seen.push(status);
        }
        assert_eq!(
            seen,
            vec![
                OrderStatus::OnDeck,
                OrderStatus::InProgress,
                OrderStatus::Done,
                OrderStatus::NotReady
            ]
        );
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!(OrderStatus::from_str("InProgress").unwrap(), OrderStatus::InProgress);
        assert_eq!(OrderStatus::from_str("on deck").unwrap(), OrderStatus::OnDeck);
        assert_eq!(OrderStatus::from_str("not_ready").unwrap(), OrderStatus::NotReady);
        assert_eq!(OrderStatus::from_str("DONE").unwrap(), OrderStatus::Done);
        assert!(OrderStatus::from_str("shipped").is_err());
    }

    #[test]
    fn test_invalid_status_display() {
        let err = InvalidStatus("shipped".to_string());
        assert!(err.to_string().contains("shipped"));
        assert!(err.to_string().contains("on_deck"));
    }

    #[test]
    fn test_set_status_accrues_in_progress_time() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        item.set_status(OrderStatus::InProgress, at(9, 0));
        item.set_status(OrderStatus::Done, at(10, 30));

        assert_eq!(item.accumulated_in_progress, Duration::minutes(90));
        assert_eq!(item.accumulated_on_deck, Duration::zero());
        assert_eq!(item.completed_at, Some(at(10, 30)));
    }

    #[test]
    fn test_set_status_accrues_on_deck_time() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        item.set_status(OrderStatus::OnDeck, at(8, 0));
        item.set_status(OrderStatus::InProgress, at(8, 45));
        assert_eq!(item.accumulated_on_deck, Duration::minutes(45));
        assert_eq!(item.time_in_progress(at(9, 0), TimeAccrual::WallClock), Duration::minutes(15));
    }

    #[test]
    fn test_set_same_status_is_noop() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        assert!(!item.set_status(OrderStatus::NotReady, at(9, 0)));
        assert_eq!(item.status_changed_at, at(8, 0));
    }

    #[test]
    fn test_leaving_done_clears_completion() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        item.set_status(OrderStatus::Done, at(9, 0));
        item.set_status(OrderStatus::NotReady, at(9, 5));
        assert!(item.completed_at.is_none());
    }

    #[test]
    fn test_archive_round_trip_restores_status() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        item.set_status(OrderStatus::OnDeck, at(8, 10));

        item.archive();
        assert!(item.is_archived);
        assert_eq!(item.status, OrderStatus::OnDeck);
        assert_eq!(item.previous_status, Some(OrderStatus::OnDeck));

        item.unarchive(at(9, 0), TimeAccrual::WallClock);
        assert!(!item.is_archived);
        assert_eq!(item.status, OrderStatus::OnDeck);
        assert_eq!(item.status_changed_at, at(8, 10));
    }

    #[test]
    fn test_unarchive_without_previous_defaults_to_in_progress() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        item.is_archived = true;
        item.unarchive(at(9, 0), TimeAccrual::WallClock);
        assert_eq!(item.status, OrderStatus::InProgress);
        assert_eq!(item.status_changed_at, at(9, 0));
    }

    #[test]
    fn test_unarchive_legacy_done_item_restarts_tracking() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        item.set_status(OrderStatus::Done, at(10, 0));
        item.is_archived = true;
        item.previous_status = None;

        item.unarchive(at(14, 0), TimeAccrual::WallClock);
        assert_eq!(item.status, OrderStatus::InProgress);
        assert!(item.completed_at.is_none());
        assert_eq!(item.status_changed_at, at(14, 0));
        assert_eq!(item.time_in_progress(at(14, 0), TimeAccrual::WallClock), Duration::zero());
    }

    #[test]
    fn test_practically_empty() {
        let blank = OrderItem::new(NoteType::Order, at(8, 0));
        assert!(blank.is_practically_empty());
        assert!(!blank.is_renderable());

        let mut colored = blank.clone();
        colored.color_hex = "#FFCC00".to_string();
        assert!(colored.is_renderable());

        let mut lowercase_default = blank.clone();
        lowercase_default.color_hex = "ffffff".to_string();
        assert!(lowercase_default.is_practically_empty());

        let note = OrderItem::new_sticky_note("", "call back", at(8, 0));
        assert!(note.is_renderable());

        let mut categorized = OrderItem::new(NoteType::StickyNote, at(8, 0));
        categorized.note_category = "Reminders".to_string();
        assert!(categorized.is_renderable());
    }

    #[test]
    fn test_editable_field_applies_to() {
        assert!(EditableField::VendorName.applies_to(NoteType::Order));
        assert!(!EditableField::VendorName.applies_to(NoteType::StickyNote));
        assert!(EditableField::NoteCategory.applies_to(NoteType::StickyNote));
        assert!(EditableField::NoteContent.applies_to(NoteType::Order));
    }

    #[test]
    fn test_editable_field_set_returns_old_value() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        let old = EditableField::VendorName.set(&mut item, "Globex".to_string());
        assert_eq!(old, "Acme");
        assert_eq!(EditableField::VendorName.get(&item), "Globex");
    }

    #[test]
    fn test_order_item_serialization() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        item.set_status(OrderStatus::InProgress, at(8, 0));
        item.set_status(OrderStatus::OnDeck, at(8, 20));
        item.linked_group_id = Some(GroupId::new());

        let json = serde_json::to_string(&item).unwrap();
        let parsed: OrderItem = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, item);
        assert_eq!(parsed.accumulated_in_progress, Duration::minutes(20));
    }

    #[test]
    fn test_legacy_empty_group_deserializes_as_none() {
        let item = OrderItem::new_order("Acme", at(8, 0));
        let mut value = serde_json::to_value(&item).unwrap();
        value["linked_group_id"] =
            serde_json::Value::String("00000000-0000-0000-0000-000000000000".to_string());
        let parsed: OrderItem = serde_json::from_value(value).unwrap();
        assert!(parsed.linked_group_id.is_none());
    }

    #[test]
    fn test_duplicate_gets_new_identity_and_fresh_state() {
        let mut item = OrderItem::new_order("Acme", at(8, 0));
        item.color_hex = "#FF0000".to_string();
        item.set_status(OrderStatus::InProgress, at(8, 0));
        item.linked_group_id = Some(GroupId::new());

        let copy = item.duplicate(at(9, 0));
        assert_ne!(copy.id(), item.id());
        assert_eq!(copy.vendor_name, "Acme");
        assert_eq!(copy.color_hex, "#FF0000");
        assert_eq!(copy.status, OrderStatus::NotReady);
        assert_eq!(copy.linked_group_id, None);
        assert_eq!(copy.created_at, at(9, 0));
    }
}
