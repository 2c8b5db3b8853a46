//! Array differ and change-queue normalizer.
//!
//! [`diff`] compares the discriminators of the currently rendered
//! sequence against a fresh backing snapshot and produces an edit
//! script; [`normalize`] puts the script into the canonical processing
//! order the reconciliation cycle expects.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::key::{Key, KeyId};

/// How one slot changed between the rendered sequence and the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeStatus {
    /// Same item at the same position; nothing to do.
    Retained,
    /// A slot that exists in the new sequence but not (at this
    /// position) in the old one.
    Added,
    /// A slot that no longer exists.
    Deleted,
}

/// One entry of the edit script.
#[derive(Debug)]
pub struct ChangeItem<T> {
    /// What happened to the slot.
    pub status: ChangeStatus,
    /// Old-sequence index for `Deleted`, new-sequence index otherwise.
    pub index: usize,
    /// Identity of the slot the entry is about.
    pub key: Key<T>,
    /// For an `Added` whose item already exists in the old sequence:
    /// the old index it moves from. Such an addition is paired with a
    /// `Deleted` at that old index; together they describe a move.
    pub moved_from: Option<usize>,
}

// Not derived: keys clone regardless of whether `T` does.
impl<T> Clone for ChangeItem<T> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            index: self.index,
            key: self.key.clone(),
            moved_from: self.moved_from,
        }
    }
}

/// Compute the edit script turning `old` into `new`.
///
/// Items present in both sequences are `Retained` when their position
/// is unchanged and otherwise become a move (an `Added` carrying
/// `moved_from` plus the bookkeeping `Deleted` for the vacated slot).
/// Duplicate items are fine; every old slot is claimed at most once.
pub fn diff<T>(old: &[Key<T>], new: &[Arc<T>]) -> Vec<ChangeItem<T>> {
    let mut claimed = vec![false; old.len()];
    let mut script = Vec::new();
    let mut unmatched = Vec::new();

    // Positions that kept their item in place.
    for (index, item) in new.iter().enumerate() {
        if index < old.len() && !claimed[index] && old[index].is_item(item) {
            claimed[index] = true;
            script.push(ChangeItem {
                status: ChangeStatus::Retained,
                index,
                key: Key::item(item),
                moved_from: None,
            });
        } else {
            unmatched.push(index);
        }
    }

    // Remaining new positions claim any still-unclaimed old slot with
    // the same identity; first come, first served keeps duplicate items
    // structurally valid.
    let mut free_slots: HashMap<KeyId, VecDeque<usize>> = HashMap::new();
    for (index, key) in old.iter().enumerate() {
        if !claimed[index] {
            free_slots.entry(key.id()).or_default().push_back(index);
        }
    }
    let mut vacated = vec![false; old.len()];
    for index in unmatched {
        let key = Key::item(&new[index]);
        let moved_from = free_slots.get_mut(&key.id()).and_then(VecDeque::pop_front);
        if let Some(from) = moved_from {
            claimed[from] = true;
            vacated[from] = true;
        }
        script.push(ChangeItem {
            status: ChangeStatus::Added,
            index,
            key,
            moved_from,
        });
    }

    // Whatever was never claimed is gone. Vacated move slots are
    // included so the cycle can fold them into their additions.
    for (index, key) in old.iter().enumerate() {
        if !claimed[index] || vacated[index] {
            script.push(ChangeItem {
                status: ChangeStatus::Deleted,
                index,
                key: key.clone(),
                moved_from: None,
            });
        }
    }

    script
}

/// Canonical processing order: all `Retained` entries first, then the
/// rest by ascending index with `Deleted` before `Added` on ties.
pub fn normalize<T>(script: &mut [ChangeItem<T>]) {
    script.sort_by_key(|c| match c.status {
        ChangeStatus::Retained => (0, 0, 0),
        ChangeStatus::Deleted => (1, c.index, 0),
        ChangeStatus::Added => (1, c.index, 1),
    });
}

/// Whether the script describes no actual change.
pub fn is_trivial<T>(script: &[ChangeItem<T>]) -> bool {
    script.iter().all(|c| c.status == ChangeStatus::Retained)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<Arc<usize>> {
        (0..n).map(Arc::new).collect()
    }

    fn keys(items: &[Arc<usize>]) -> Vec<Key<usize>> {
        items.iter().map(Key::item).collect()
    }

    fn count(script: &[ChangeItem<usize>], status: ChangeStatus) -> usize {
        script.iter().filter(|c| c.status == status).count()
    }

    #[test]
    fn test_identical_sequences_are_trivial() {
        let list = items(3);
        let script = diff(&keys(&list), &list);
        assert!(is_trivial(&script));
        assert_eq!(script.len(), 3);
    }

    #[test]
    fn test_pure_additions() {
        let list = items(2);
        let script = diff(&[], &list);
        assert_eq!(count(&script, ChangeStatus::Added), 2);
        assert!(script.iter().all(|c| c.moved_from.is_none()));
    }

    #[test]
    fn test_removal_marks_deleted_at_old_index() {
        let list = items(3);
        let shorter = vec![Arc::clone(&list[0]), Arc::clone(&list[2])];
        let mut script = diff(&keys(&list), &shorter);
        normalize(&mut script);
        let deleted: Vec<usize> = script
            .iter()
            .filter(|c| c.status == ChangeStatus::Deleted)
            .map(|c| c.index)
            .collect();
        // The real removal at 1, plus the bookkeeping deletion for the
        // slot the trailing item moves out of.
        assert_eq!(deleted, vec![1, 2]);
        assert_eq!(count(&script, ChangeStatus::Retained), 1);
        let moves: Vec<_> = script
            .iter()
            .filter(|c| c.status == ChangeStatus::Added)
            .collect();
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].moved_from, Some(2));
        assert_eq!(moves[0].index, 1);
    }

    #[test]
    fn test_swap_produces_paired_moves() {
        let list = items(2);
        let swapped = vec![Arc::clone(&list[1]), Arc::clone(&list[0])];
        let script = diff(&keys(&list), &swapped);
        let moves: Vec<_> = script
            .iter()
            .filter(|c| c.status == ChangeStatus::Added)
            .collect();
        assert_eq!(moves.len(), 2);
        assert_eq!(moves[0].moved_from, Some(1));
        assert_eq!(moves[1].moved_from, Some(0));
        // Each move leaves a bookkeeping deletion for its vacated slot.
        assert_eq!(count(&script, ChangeStatus::Deleted), 2);
    }

    #[test]
    fn test_duplicates_claim_distinct_slots() {
        let item = Arc::new(7usize);
        let old = vec![Key::item(&item), Key::item(&item)];
        let new = vec![Arc::clone(&item), Arc::clone(&item), Arc::clone(&item)];
        let script = diff(&old, &new);
        assert_eq!(count(&script, ChangeStatus::Retained), 2);
        assert_eq!(count(&script, ChangeStatus::Added), 1);
        assert_eq!(count(&script, ChangeStatus::Deleted), 0);
    }

    #[test]
    fn test_placeholder_slot_is_never_retained() {
        let item = Arc::new(1usize);
        let old: Vec<Key<usize>> = vec![Key::placeholder()];
        let script = diff(&old, &[Arc::clone(&item)]);
        assert_eq!(count(&script, ChangeStatus::Added), 1);
        assert_eq!(count(&script, ChangeStatus::Deleted), 1);
        assert!(script.iter().all(|c| c.status != ChangeStatus::Retained));
    }

    #[test]
    fn test_normalize_orders_deletions_before_additions() {
        let a = Arc::new(1usize);
        let b = Arc::new(2usize);
        let old = vec![Key::item(&a)];
        let mut script = diff(&old, &[Arc::clone(&b)]);
        normalize(&mut script);
        assert_eq!(script[0].status, ChangeStatus::Deleted);
        assert_eq!(script[1].status, ChangeStatus::Added);
        assert_eq!(script[0].index, script[1].index);
    }
}
