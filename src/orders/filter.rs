//! Side-effect-free search and filtering over order items.
//!
//! Each filter takes a sequence of item references and returns the subset
//! that passes. [`apply_all_filters`] composes them in a fixed order and can
//! widen a text search to whole linked groups.

use crate::orders::id::GroupId;
use crate::orders::models::{normalize_color, NoteType, OrderItem, OrderStatus};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// All active filters for a display refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterCriteria {
    /// Case-insensitive text query.
    pub query: Option<String>,
    /// Statuses to keep. Empty keeps all.
    pub statuses: Vec<OrderStatus>,
    /// Earliest creation date to keep (inclusive).
    pub date_from: Option<NaiveDate>,
    /// Latest creation date to keep (inclusive).
    pub date_to: Option<NaiveDate>,
    /// Colors to keep. Empty keeps all.
    pub colors: Vec<String>,
    /// Note types to keep. Empty keeps all.
    pub note_types: Vec<NoteType>,
    /// Sticky-note categories to keep. Empty keeps all.
    pub note_categories: Vec<String>,
    /// Widen text matches to every member of the matched items' groups.
    pub expand_linked_groups: bool,
}

impl FilterCriteria {
    /// Criteria with only a text query, expanding linked groups.
    #[must_use]
    pub fn search(query: impl Into<String>) -> Self {
        Self { query: Some(query.into()), expand_linked_groups: true, ..Self::default() }
    }

    fn active_query(&self) -> Option<&str> {
        self.query.as_deref().map(str::trim).filter(|q| !q.is_empty())
    }
}

/// Case-insensitive substring match across the item's text fields.
fn matches_query(item: &OrderItem, needle: &str) -> bool {
    [
        &item.vendor_name,
        &item.transfer_numbers,
        &item.whs_shipment_numbers,
        &item.note_content,
        &item.note_title,
    ]
    .iter()
    .any(|field| field.to_lowercase().contains(needle))
}

/// Keep items whose vendor, transfer, shipment, content or title contains `query`.
///
/// A blank query keeps everything.
pub fn search<'a>(
    items: impl IntoIterator<Item = &'a OrderItem>,
    query: &str,
) -> Vec<&'a OrderItem> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return items.into_iter().collect();
    }
    items.into_iter().filter(|item| matches_query(item, &needle)).collect()
}

/// Keep items whose status is in `statuses`. An empty filter keeps everything.
pub fn filter_by_status<'a>(
    items: impl IntoIterator<Item = &'a OrderItem>,
    statuses: &[OrderStatus],
) -> Vec<&'a OrderItem> {
    if statuses.is_empty() {
        return items.into_iter().collect();
    }
    items.into_iter().filter(|item| statuses.contains(&item.status)).collect()
}

/// Keep items created on a calendar date within `[from, to]`.
///
/// Either bound may be open. Time of day is ignored.
pub fn filter_by_date_range<'a>(
    items: impl IntoIterator<Item = &'a OrderItem>,
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> Vec<&'a OrderItem> {
    items
        .into_iter()
        .filter(|item| {
            let date = item.created_at.date();
            from.map_or(true, |from| date >= from) && to.map_or(true, |to| date <= to)
        })
        .collect()
}

/// Keep items whose color matches one of `colors`, ignoring `#` and case.
pub fn filter_by_color<'a>(
    items: impl IntoIterator<Item = &'a OrderItem>,
    colors: &[String],
) -> Vec<&'a OrderItem> {
    if colors.is_empty() {
        return items.into_iter().collect();
    }
    let wanted: HashSet<String> = colors.iter().map(|c| normalize_color(c)).collect();
    items.into_iter().filter(|item| wanted.contains(&normalize_color(&item.color_hex))).collect()
}

/// Keep items of the given note types.
pub fn filter_by_note_type<'a>(
    items: impl IntoIterator<Item = &'a OrderItem>,
    note_types: &[NoteType],
) -> Vec<&'a OrderItem> {
    if note_types.is_empty() {
        return items.into_iter().collect();
    }
    items.into_iter().filter(|item| note_types.contains(&item.note_type)).collect()
}

/// Keep sticky notes whose category is in `categories` (case-insensitive).
///
/// Orders never match a non-empty category filter.
pub fn filter_by_note_category<'a>(
    items: impl IntoIterator<Item = &'a OrderItem>,
    categories: &[String],
) -> Vec<&'a OrderItem> {
    if categories.is_empty() {
        return items.into_iter().collect();
    }
    let wanted: HashSet<String> = categories.iter().map(|c| c.trim().to_lowercase()).collect();
    items
        .into_iter()
        .filter(|item| {
            item.is_sticky_note() && wanted.contains(&item.note_category.trim().to_lowercase())
        })
        .collect()
}

/// Whether any filter would remove something.
pub fn has_active_filters(criteria: &FilterCriteria) -> bool {
    criteria.active_query().is_some()
        || !criteria.statuses.is_empty()
        || criteria.date_from.is_some()
        || criteria.date_to.is_some()
        || !criteria.colors.is_empty()
        || !criteria.note_types.is_empty()
        || !criteria.note_categories.is_empty()
}

/// Apply every filter in order: search, status, date, color, note type,
/// note category.
///
/// When a text query was active and `expand_linked_groups` is set, the
/// result is widened to every item of `items` sharing a group with a
/// survivor. The result keeps `items` order.
pub fn apply_all_filters<'a>(
    items: &'a [OrderItem],
    criteria: &FilterCriteria,
) -> Vec<&'a OrderItem> {
    if !has_active_filters(criteria) {
        return items.iter().collect();
    }

    let query = criteria.active_query();
    let mut result: Vec<&OrderItem> = match query {
        Some(query) => search(items, query),
        None => items.iter().collect(),
    };
    result = filter_by_status(result, &criteria.statuses);
    result = filter_by_date_range(result, criteria.date_from, criteria.date_to);
    result = filter_by_color(result, &criteria.colors);
    result = filter_by_note_type(result, &criteria.note_types);
    result = filter_by_note_category(result, &criteria.note_categories);

    if query.is_some() && criteria.expand_linked_groups {
        result = expand_linked_groups(items, &result);
    }
    result
}

/// Widen `matched` to every item in `universe` that shares a group with a
/// matched item.
pub fn expand_linked_groups<'a>(
    universe: &'a [OrderItem],
    matched: &[&'a OrderItem],
) -> Vec<&'a OrderItem> {
    let matched_ids: HashSet<_> = matched.iter().map(|item| *item.id()).collect();
    let groups: HashSet<GroupId> = matched.iter().filter_map(|item| item.linked_group_id).collect();
    universe
        .iter()
        .filter(|item| {
            matched_ids.contains(item.id())
                || item.linked_group_id.is_some_and(|group| groups.contains(&group))
        })
        .collect()
}
