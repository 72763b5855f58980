//! Archiving whole linked groups and keeping their timestamps in step.
//!
//! Archiving only flips `is_archived` and records `previous_status`; it never
//! forces the status to Done. Callers that want "done and archived" change
//! status first.

use crate::orders::collections::CollectionManager;
use crate::orders::id::OrderId;
use crate::orders::models::OrderItem;
use crate::orders::work_time::TimeAccrual;
use chrono::NaiveDateTime;
use std::collections::HashSet;

/// Every item that moves with `id`: itself when ungrouped, otherwise every
/// item in `all` sharing its group id.
///
/// Returns an empty list when `id` is not in `all`.
pub fn get_affected_items(id: &OrderId, all: &[OrderItem]) -> Vec<OrderId> {
    let Some(item) = all.iter().find(|item| item.id() == id) else {
        return Vec::new();
    };
    match item.linked_group_id {
        None => vec![*id],
        Some(group) => all
            .iter()
            .filter(|other| other.linked_group_id == Some(group))
            .map(|other| *other.id())
            .collect(),
    }
}

/// Copy the time-tracking fields of `reference` (default: the first member
/// found in `items`) onto every other member.
///
/// Returns the number of members updated, not counting the reference.
pub fn synchronize_timestamps(
    items: &mut [OrderItem],
    members: &[OrderId],
    reference: Option<&OrderId>,
) -> usize {
    if members.len() < 2 {
        return 0;
    }
    let member_set: HashSet<&OrderId> = members.iter().collect();
    let reference_id = reference.or_else(|| members.first());

    let Some(source) = items
        .iter()
        .find(|item| Some(item.id()) == reference_id && member_set.contains(item.id()))
        .map(|item| (*item.id(), item.timestamps()))
    else {
        return 0;
    };

    let mut updated = 0;
    for item in items.iter_mut() {
        if item.id() != &source.0 && member_set.contains(item.id()) {
            item.apply_timestamps(&source.1);
            updated += 1;
        }
    }
    updated
}

/// Archive `id` together with its whole linked group.
///
/// Members are flagged, their timestamps synchronized from `id`, then moved
/// to the archived collection. Returns the ids that moved.
pub fn archive_with_group(collections: &CollectionManager, id: &OrderId) -> Vec<OrderId> {
    let affected = collections.with_active_mut(|active| {
        let affected = get_affected_items(id, active);
        if affected.is_empty() {
            return affected;
        }
        let affected_set: HashSet<&OrderId> = affected.iter().collect();
        for item in active.iter_mut().filter(|item| affected_set.contains(item.id())) {
            item.archive();
        }
        synchronize_timestamps(active, &affected, Some(id));
        affected
    });

    if affected.is_empty() {
        tracing::debug!(%id, "archive requested for an item that is not active");
        return affected;
    }

    affected.into_iter().filter(|member| collections.move_to_archived(member)).collect()
}

/// Unarchive `id` together with its whole linked group.
///
/// Each member's pre-archive status is restored as a status change at `now`.
/// Returns the ids that moved.
pub fn unarchive_with_group(
    collections: &CollectionManager,
    id: &OrderId,
    now: NaiveDateTime,
    accrual: TimeAccrual,
) -> Vec<OrderId> {
    let affected = collections.with_all_mut(|_, archived| {
        let affected = get_affected_items(id, archived);
        if affected.is_empty() {
            return affected;
        }
        let affected_set: HashSet<&OrderId> = affected.iter().collect();
        for item in archived.iter_mut().filter(|item| affected_set.contains(item.id())) {
            item.unarchive(now, accrual);
        }
        synchronize_timestamps(archived, &affected, Some(id));
        affected
    });

    if affected.is_empty() {
        tracing::debug!(%id, "unarchive requested for an item that is not archived");
        return affected;
    }

    affected.into_iter().filter(|member| collections.move_to_active(member)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::id::GroupId;
    use crate::orders::models::OrderStatus;
    use chrono::{Duration, NaiveDate, NaiveDateTime};

    fn at(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 1).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn linked_pair() -> (OrderItem, OrderItem) {
        let group = GroupId::new();
        let mut a = OrderItem::new_order("Acme", at(8));
        let mut b = OrderItem::new_order("Acme", at(9));
        a.linked_group_id = Some(group);
        b.linked_group_id = Some(group);
        (a, b)
    }

    #[test]
    fn test_affected_items_ungrouped_is_self() {
        let item = OrderItem::new_order("Acme", at(8));
        let other = OrderItem::new_order("Globex", at(8));
        let id = *item.id();
        let all = vec![item, other];
        assert_eq!(get_affected_items(&id, &all), vec![id]);
    }

    #[test]
    fn test_affected_items_grouped_is_whole_group() {
        let (a, b) = linked_pair();
        let c = OrderItem::new_order("Initech", at(8));
        let ids = [*a.id(), *b.id()];
        let all = vec![a, b, c];
        assert_eq!(get_affected_items(&ids[0], &all), ids.to_vec());
    }

    #[test]
    fn test_affected_items_missing_is_empty() {
        assert!(get_affected_items(&OrderId::new(), &[]).is_empty());
    }

    #[test]
    fn test_synchronize_from_reference() {
        let (mut a, b) = linked_pair();
        a.set_status(OrderStatus::InProgress, at(9));
        a.set_status(OrderStatus::OnDeck, at(11));
        let ids = [*a.id(), *b.id()];
        let mut items = vec![b, a];

        let updated = synchronize_timestamps(&mut items, &ids, Some(&ids[0]));
        assert_eq!(updated, 1);
        assert_eq!(items[0].accumulated_in_progress, Duration::hours(2));
        assert_eq!(items[0].status_changed_at, at(11));
    }

    #[test]
    fn test_synchronize_single_member_is_noop() {
        let item = OrderItem::new_order("Acme", at(8));
        let id = *item.id();
        let mut items = vec![item];
        assert_eq!(synchronize_timestamps(&mut items, &[id], None), 0);
    }

    #[test]
    fn test_archive_with_group_moves_all_members() {
        let (mut a, mut b) = linked_pair();
        a.set_status(OrderStatus::InProgress, at(9));
        b.set_status(OrderStatus::OnDeck, at(9));
        let (a_id, b_id) = (*a.id(), *b.id());
        let manager = CollectionManager::with_items(vec![a, b], Vec::new());

        let moved = archive_with_group(&manager, &a_id);
        assert_eq!(moved.len(), 2);
        assert_eq!(manager.active_count(), 0);

        let b = manager.find(&b_id).unwrap();
        assert!(b.is_archived);
        assert_eq!(b.status, OrderStatus::OnDeck);
        assert_eq!(b.previous_status, Some(OrderStatus::OnDeck));
    }

    #[test]
    fn test_unarchive_with_group_restores_statuses() {
        let (mut a, mut b) = linked_pair();
        a.set_status(OrderStatus::InProgress, at(9));
        b.set_status(OrderStatus::OnDeck, at(9));
        let (a_id, b_id) = (*a.id(), *b.id());
        let manager = CollectionManager::with_items(vec![a, b], Vec::new());

        archive_with_group(&manager, &b_id);
        let moved = unarchive_with_group(&manager, &a_id, at(12), TimeAccrual::WallClock);
        assert_eq!(moved.len(), 2);
        assert_eq!(manager.archived_count(), 0);

        let a = manager.find(&a_id).unwrap();
        assert!(!a.is_archived);
        assert_eq!(a.status, OrderStatus::InProgress);
    }

    #[test]
    fn test_archive_unknown_item_moves_nothing() {
        let manager = CollectionManager::new();
        assert!(archive_with_group(&manager, &OrderId::new()).is_empty());
        assert!(unarchive_with_group(&manager, &OrderId::new(), at(9), TimeAccrual::WallClock)
            .is_empty());
    }

    #[test]
    fn test_unarchive_legacy_done_group_clears_completion() {
        let (mut a, mut b) = linked_pair();
        for item in [&mut a, &mut b] {
            item.set_status(OrderStatus::Done, at(10));
            item.is_archived = true;
        }
        let (a_id, b_id) = (*a.id(), *b.id());
        let manager = CollectionManager::with_items(Vec::new(), vec![a, b]);

        let moved = unarchive_with_group(&manager, &a_id, at(15), TimeAccrual::WallClock);
        assert_eq!(moved.len(), 2);
        for id in [a_id, b_id] {
            let item = manager.find(&id).unwrap();
            assert_eq!(item.status, OrderStatus::InProgress);
            assert_eq!(item.completed_at, None);
            assert_eq!(item.status_changed_at, at(15));
            assert_eq!(item.time_in_progress(at(15), TimeAccrual::WallClock), Duration::zero());
        }
    }
}
