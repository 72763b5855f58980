//! Forming, merging and dissolving linked groups.
//!
//! A linked group is every item sharing a `linked_group_id`. Linking always
//! unifies: when a link touches members of two existing groups, every member
//! of both ends up in one group.

use crate::orders::archive::synchronize_timestamps;
use crate::orders::id::{GroupId, OrderId};
use crate::orders::models::OrderItem;
use std::collections::HashSet;

/// Reason a link request was rejected. Nothing is mutated on rejection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// No items were selected for linking.
    #[error("no items selected to link")]
    NoItems,
    /// No target item was given.
    #[error("no target item to link to")]
    NoTarget,
    /// The target is not in the active collection (archived items cannot be linked).
    #[error("target {0} is not an active item")]
    TargetNotActive(OrderId),
    /// The target is an untouched placeholder.
    #[error("target {0} is an empty placeholder")]
    TargetNotRenderable(OrderId),
    /// None of the selected items can join the target's group.
    #[error(
        "none of the selected items can be linked to {0} \
         (must be active, non-empty and of the same type)"
    )]
    NoLinkableCandidates(OrderId),
}

impl LinkError {
    /// Human-readable reason, for status messages.
    #[must_use]
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// The membership of a group after a link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkedGroup {
    /// The unified group id.
    pub group_id: GroupId,
    /// Every active member, in collection order.
    pub members: Vec<OrderId>,
}

/// Link `items_to_link` into `target`'s group.
///
/// The group id used is the target's, else the first candidate's, else a
/// new one. Every active item carrying any of the merged group ids is moved
/// into the unified group. When the result has more than one member their
/// timestamps are synchronized from the target.
///
/// # Errors
///
/// Returns a [`LinkError`] when validation fails; `active` is untouched.
pub fn link_items(
    items_to_link: &[OrderId],
    target: Option<&OrderId>,
    active: &mut [OrderItem],
) -> Result<LinkedGroup, LinkError> {
    if items_to_link.is_empty() {
        return Err(LinkError::NoItems);
    }
    let target_id = *target.ok_or(LinkError::NoTarget)?;
    let target_item = active
        .iter()
        .find(|item| item.id() == &target_id)
        .ok_or(LinkError::TargetNotActive(target_id))?;
    if !target_item.is_renderable() {
        return Err(LinkError::TargetNotRenderable(target_id));
    }
    let target_type = target_item.note_type;
    let target_group = target_item.linked_group_id;

    let mut seen = HashSet::new();
    let candidates: Vec<(OrderId, Option<GroupId>)> = items_to_link
        .iter()
        .filter(|id| **id != target_id && seen.insert(**id))
        .filter_map(|id| active.iter().find(|item| item.id() == id))
        .filter(|item| item.is_renderable() && item.note_type == target_type)
        .map(|item| (*item.id(), item.linked_group_id))
        .collect();

    if candidates.is_empty() {
        return Err(LinkError::NoLinkableCandidates(target_id));
    }

    let group_id = target_group
        .or_else(|| candidates.first().and_then(|(_, group)| *group))
        .unwrap_or_default();

    let merged: HashSet<GroupId> =
        std::iter::once(target_group).chain(candidates.iter().map(|(_, g)| *g)).flatten().collect();
    let direct: HashSet<OrderId> =
        std::iter::once(target_id).chain(candidates.iter().map(|(id, _)| *id)).collect();

    let mut members = Vec::new();
    for item in active.iter_mut() {
        let joins = direct.contains(item.id())
            || item.linked_group_id.is_some_and(|group| merged.contains(&group));
        if joins {
            item.linked_group_id = Some(group_id);
        }
        if item.linked_group_id == Some(group_id) {
            members.push(*item.id());
        }
    }

    if members.len() > 1 {
        synchronize_timestamps(active, &members, Some(&target_id));
    }

    tracing::debug!(%group_id, members = members.len(), "linked items");
    Ok(LinkedGroup { group_id, members })
}

/// Expand a selection so that selecting any member selects its whole group.
///
/// Returns the ids in `all_active` order; selected ids that are not in
/// `all_active` are appended unchanged.
pub fn expand_to_full_linked_groups(items: &[OrderId], all_active: &[OrderItem]) -> Vec<OrderId> {
    let selected: HashSet<&OrderId> = items.iter().collect();
    let groups: HashSet<GroupId> = all_active
        .iter()
        .filter(|item| selected.contains(item.id()))
        .filter_map(|item| item.linked_group_id)
        .collect();

    let mut expanded: Vec<OrderId> = all_active
        .iter()
        .filter(|item| {
            selected.contains(item.id())
                || item.linked_group_id.is_some_and(|group| groups.contains(&group))
        })
        .map(|item| *item.id())
        .collect();

    let present: HashSet<OrderId> = expanded.iter().copied().collect();
    let mut appended = HashSet::new();
    for id in items {
        if !present.contains(id) && appended.insert(*id) {
            expanded.push(*id);
        }
    }
    expanded
}

/// Dissolve `target`'s whole group: every member's group id is cleared.
///
/// Returns the ids whose group was cleared (empty when `target` is unlinked
/// or missing).
pub fn unlink_group(target: &OrderId, items: &mut [OrderItem]) -> Vec<OrderId> {
    let Some(group) = items.iter().find(|item| item.id() == target).and_then(|i| i.linked_group_id)
    else {
        return Vec::new();
    };

    let mut cleared = Vec::new();
    for item in items.iter_mut().filter(|item| item.linked_group_id == Some(group)) {
        item.linked_group_id = None;
        cleared.push(*item.id());
    }
    tracing::debug!(%group, members = cleared.len(), "dissolved linked group");
    cleared
}

/// Dissolve every group touched by `ids`.
pub fn unlink_items(ids: &[OrderId], items: &mut [OrderItem]) -> Vec<OrderId> {
    ids.iter().flat_map(|id| unlink_group(id, items)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::models::{NoteType, OrderStatus};
    use chrono::{NaiveDate, NaiveDateTime};
    use proptest::prelude::*;

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 4, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn orders(n: usize) -> Vec<OrderItem> {
        (0..n).map(|i| OrderItem::new_order(format!("Vendor {i}"), at(8))).collect()
    }

    fn ids(items: &[OrderItem]) -> Vec<OrderId> {
        items.iter().map(|i| *i.id()).collect()
    }

    #[test]
    fn test_link_rejects_empty_selection() {
        let mut items = orders(2);
        let target = *items[0].id();
        assert_eq!(link_items(&[], Some(&target), &mut items), Err(LinkError::NoItems));
    }

    #[test]
    fn test_link_rejects_missing_target() {
        let mut items = orders(2);
        let all = ids(&items);
        assert_eq!(link_items(&all, None, &mut items), Err(LinkError::NoTarget));
    }

    #[test]
    fn test_link_rejects_target_not_active() {
        let mut items = orders(2);
        let all = ids(&items);
        let stranger = OrderId::new();
        let err = link_items(&all, Some(&stranger), &mut items).unwrap_err();
        assert_eq!(err, LinkError::TargetNotActive(stranger));
        assert!(err.reason().contains("not an active item"));
        assert!(items.iter().all(|i| i.linked_group_id.is_none()));
    }

    #[test]
    fn test_link_rejects_placeholder_target() {
        let mut items = orders(1);
        items.push(OrderItem::new(NoteType::Order, at(8)));
        let all = ids(&items);
        let placeholder = all[1];
        assert_eq!(
            link_items(&all, Some(&placeholder), &mut items),
            Err(LinkError::TargetNotRenderable(placeholder))
        );
    }

    #[test]
    fn test_link_skips_other_note_types() {
        let mut items = orders(1);
        items.push(OrderItem::new_sticky_note("Call", "call the vendor", at(8)));
        let all = ids(&items);
        assert_eq!(
            link_items(&all, Some(&all[0]), &mut items),
            Err(LinkError::NoLinkableCandidates(all[0]))
        );
    }

    #[test]
    fn test_link_two_fresh_items() {
        let mut items = orders(3);
        let all = ids(&items);

        let group = link_items(&all[..2], Some(&all[0]), &mut items).unwrap();
        assert_eq!(group.members, all[..2].to_vec());
        assert_eq!(items[0].linked_group_id, Some(group.group_id));
        assert_eq!(items[1].linked_group_id, Some(group.group_id));
        assert!(items[2].linked_group_id.is_none());
    }

    #[test]
    fn test_link_prefers_target_group() {
        let mut items = orders(3);
        let all = ids(&items);
        let existing = GroupId::new();
        items[1].linked_group_id = Some(existing);

        let group = link_items(&[all[2]], Some(&all[1]), &mut items).unwrap();
        assert_eq!(group.group_id, existing);
    }

    #[test]
    fn test_link_uses_candidate_group_when_target_unlinked() {
        let mut items = orders(2);
        let all = ids(&items);
        let existing = GroupId::new();
        items[1].linked_group_id = Some(existing);

        let group = link_items(&[all[1]], Some(&all[0]), &mut items).unwrap();
        assert_eq!(group.group_id, existing);
    }

    #[test]
    fn test_link_is_transitively_unifying() {
        let mut items = orders(4);
        let all = ids(&items);
        // A-B already linked, C-D already linked in another group.
        let ab = link_items(&[all[1]], Some(&all[0]), &mut items).unwrap();
        link_items(&[all[3]], Some(&all[2]), &mut items).unwrap();

        // Linking B and C must pull A and D in too.
        let merged = link_items(&[all[2]], Some(&all[1]), &mut items).unwrap();
        assert_eq!(merged.group_id, ab.group_id);
        assert_eq!(merged.members.len(), 4);
        assert!(items.iter().all(|i| i.linked_group_id == Some(ab.group_id)));
    }

    #[test]
    fn test_link_syncs_timestamps_from_target() {
        let mut items = orders(2);
        let all = ids(&items);
        items[0].set_status(OrderStatus::InProgress, at(9));
        items[0].set_status(OrderStatus::OnDeck, at(12));

        link_items(&[all[1]], Some(&all[0]), &mut items).unwrap();
        assert_eq!(items[1].accumulated_in_progress, items[0].accumulated_in_progress);
        assert_eq!(items[1].status_changed_at, at(12));
    }

    #[test]
    fn test_expand_to_full_groups() {
        let mut items = orders(4);
        let all = ids(&items);
        link_items(&[all[1]], Some(&all[0]), &mut items).unwrap();

        let expanded = expand_to_full_linked_groups(&[all[1], all[3]], &items);
        assert_eq!(expanded, vec![all[0], all[1], all[3]]);
    }

    #[test]
    fn test_expand_keeps_unknown_ids() {
        let items = orders(1);
        let stranger = OrderId::new();
        let expanded = expand_to_full_linked_groups(&[stranger, stranger], &items);
        assert_eq!(expanded, vec![stranger]);
    }

    #[test]
    fn test_unlink_dissolves_whole_group() {
        let mut items = orders(3);
        let all = ids(&items);
        link_items(&all, Some(&all[0]), &mut items).unwrap();

        let cleared = unlink_group(&all[2], &mut items);
        assert_eq!(cleared.len(), 3);
        assert!(items.iter().all(|i| i.linked_group_id.is_none()));
    }

    #[test]
    fn test_unlink_ungrouped_is_noop() {
        let mut items = orders(1);
        let id = *items[0].id();
        assert!(unlink_group(&id, &mut items).is_empty());
        assert!(unlink_items(&[OrderId::new()], &mut items).is_empty());
    }

    proptest! {
        #[test]
        fn prop_linked_pairs_stay_together(
            pairs in proptest::collection::vec((0usize..6, 0usize..6), 1..12)
        ) {
            let mut items = orders(6);
            let all = ids(&items);
            let mut linked = Vec::new();
            for (a, b) in pairs {
                if a == b {
                    continue;
                }
                link_items(&[all[b]], Some(&all[a]), &mut items).unwrap();
                linked.push((a, b));
            }
            // Groups only ever merge, so every pair linked earlier still shares a group.
            for (a, b) in linked {
                prop_assert!(items[a].linked_group_id.is_some());
                prop_assert_eq!(items[a].linked_group_id, items[b].linked_group_id);
            }
        }
    }
}
