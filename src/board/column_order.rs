//! User-customizable column ordering.
//!
//! The persisted order is always re-normalized against the canonical
//! column set before use, so columns added or removed by a newer release
//! heal into the stored arrangement without losing the user's choices.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::models::ColumnKey;
use super::storage::{COLUMN_ORDER_KEY, KvStore, read_json, write_json};

/// Reconcile `order` with `canonical`.
///
/// Keeps the first occurrence of every key that belongs to `canonical`,
/// in the given order, then appends the canonical keys that were not seen,
/// in canonical order. The result is always a permutation of `canonical`,
/// and normalizing it again yields the same sequence.
pub fn normalize<S: AsRef<str>>(order: &[S], canonical: &[ColumnKey]) -> Vec<ColumnKey> {
    let mut seen = HashSet::with_capacity(canonical.len());
    let mut result = Vec::with_capacity(canonical.len());

    for raw in order {
        let Ok(key) = raw.as_ref().parse::<ColumnKey>() else {
            continue;
        };
        if canonical.contains(&key) && seen.insert(key) {
            result.push(key);
        }
    }
    for key in canonical {
        if seen.insert(*key) {
            result.push(*key);
        }
    }
    result
}

fn as_strings(order: &[ColumnKey]) -> Vec<String> {
    order.iter().map(|k| k.as_str().to_string()).collect()
}

/// Owns the persisted column order.
///
/// When the store rejects a write, the order is held in memory instead and
/// takes precedence over the store until a later write succeeds.
#[derive(Clone)]
pub struct ColumnOrderManager {
    store: Arc<dyn KvStore>,
    canonical: Vec<ColumnKey>,
    session: Arc<Mutex<Option<Vec<ColumnKey>>>>,
}

impl ColumnOrderManager {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self::with_canonical(store, ColumnKey::ALL.to_vec())
    }

    pub fn with_canonical(store: Arc<dyn KvStore>, canonical: Vec<ColumnKey>) -> Self {
        Self {
            store,
            canonical,
            session: Arc::new(Mutex::new(None)),
        }
    }

    pub fn canonical(&self) -> &[ColumnKey] {
        &self.canonical
    }

    /// The stored order as written, or `None` when absent or unparsable.
    pub fn load(&self) -> Option<Vec<String>> {
        read_json(self.store.as_ref(), COLUMN_ORDER_KEY)
    }

    /// Persist `order`. Failures are logged and the order is kept for the
    /// rest of the session.
    pub fn save(&self, order: &[ColumnKey]) {
        let session = match write_json(self.store.as_ref(), COLUMN_ORDER_KEY, &as_strings(order)) {
            Ok(()) => None,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "failed to persist column order; keeping it for this session"
                );
                Some(order.to_vec())
            }
        };
        if let Ok(mut held) = self.session.lock() {
            *held = session;
        }
    }

    fn session_order(&self) -> Option<Vec<ColumnKey>> {
        self.session.lock().ok()?.clone()
    }

    /// Effective order. Rewrites the stored value when normalization changed it.
    pub fn current(&self) -> Vec<ColumnKey> {
        if let Some(order) = self.session_order() {
            return normalize(&as_strings(&order), &self.canonical);
        }
        let stored = self.load();
        let normalized = match &stored {
            Some(order) => normalize(order, &self.canonical),
            None => self.canonical.clone(),
        };
        self.persist_if_changed(stored.as_deref(), &normalized);
        normalized
    }

    /// Replace the whole order with a user-supplied arrangement.
    pub fn reorder<S: AsRef<str>>(&self, order: &[S]) -> Vec<ColumnKey> {
        let stored = self.load();
        let normalized = normalize(order, &self.canonical);
        self.persist_if_changed(stored.as_deref(), &normalized);
        normalized
    }

    /// Move `column` to `to_index` (clamped to the end of the board).
    pub fn move_column(&self, column: ColumnKey, to_index: usize) -> Vec<ColumnKey> {
        let mut order = self.current();
        if let Some(from) = order.iter().position(|k| *k == column) {
            order.remove(from);
            let to = to_index.min(order.len());
            order.insert(to, column);
        }
        self.reorder(&as_strings(&order))
    }

    /// Restore canonical order.
    pub fn reset(&self) -> Vec<ColumnKey> {
        let canonical = self.canonical.clone();
        self.save(&canonical);
        canonical
    }

    fn persist_if_changed(&self, stored: Option<&[String]>, normalized: &[ColumnKey]) {
        let normalized_strings = as_strings(normalized);
        if stored != Some(normalized_strings.as_slice()) {
            tracing::debug!(order = ?normalized_strings, "persisting normalized column order");
            self.save(normalized);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::storage::test_support::FailingStore;
    use crate::board::storage::{MemoryStore, write_json};

    fn manager() -> (ColumnOrderManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ColumnOrderManager::new(store.clone()), store)
    }

    fn is_permutation(order: &[ColumnKey], canonical: &[ColumnKey]) -> bool {
        let unique: HashSet<_> = order.iter().collect();
        order.len() == canonical.len()
            && unique.len() == order.len()
            && canonical.iter().all(|k| order.contains(k))
    }

    #[test]
    fn test_normalize_drops_ghost_and_appends_missing() {
        let canonical = [ColumnKey::Backlog, ColumnKey::Creating, ColumnKey::Running];
        let result = normalize(&["running", "backlog", "ghost_column"], &canonical);
        assert_eq!(
            result,
            vec![ColumnKey::Running, ColumnKey::Backlog, ColumnKey::Creating]
        );
    }

    #[test]
    fn test_normalize_drops_keys_outside_canonical_set() {
        let canonical = [ColumnKey::Backlog, ColumnKey::Running];
        let result = normalize(&["merged", "running"], &canonical);
        assert_eq!(result, vec![ColumnKey::Running, ColumnKey::Backlog]);
    }

    #[test]
    fn test_normalize_empty_is_canonical() {
        let empty: [&str; 0] = [];
        assert_eq!(normalize(&empty, &ColumnKey::ALL), ColumnKey::ALL.to_vec());
    }

    #[test]
    fn test_normalize_removes_duplicates_keeping_first() {
        let result = normalize(
            &["merged", "backlog", "merged", "backlog", "approved"],
            &ColumnKey::ALL,
        );
        assert_eq!(&result[..3], &[ColumnKey::Merged, ColumnKey::Backlog, ColumnKey::Approved]);
        assert!(is_permutation(&result, &ColumnKey::ALL));
    }

    #[test]
    fn test_normalize_is_idempotent_and_a_permutation() {
        let inputs: Vec<Vec<&str>> = vec![
            vec![],
            vec!["ghost", "ghost", ""],
            vec!["merged", "merged", "merged"],
            vec!["approved", "failed", "backlog", "zzz", "failed", "running"],
            ColumnKey::ALL.iter().rev().map(|k| k.as_str()).collect(),
            vec!["BACKLOG", "Running", "needs_input"],
        ];
        for input in inputs {
            let once = normalize(&input, &ColumnKey::ALL);
            assert!(is_permutation(&once, &ColumnKey::ALL), "input {:?}", input);
            let twice = normalize(&as_strings(&once), &ColumnKey::ALL);
            assert_eq!(once, twice, "input {:?}", input);
        }
    }

    #[test]
    fn test_load_absent_and_corrupt_are_none() {
        let (manager, store) = manager();
        assert!(manager.load().is_none());
        store.set(COLUMN_ORDER_KEY, "not json").unwrap();
        assert!(manager.load().is_none());
        store.set(COLUMN_ORDER_KEY, r#"{"order": []}"#).unwrap();
        assert!(manager.load().is_none());
    }

    #[test]
    fn test_current_defaults_to_canonical_and_persists() {
        let (manager, _store) = manager();
        assert_eq!(manager.current(), ColumnKey::ALL.to_vec());
        assert_eq!(manager.load(), Some(as_strings(&ColumnKey::ALL)));
    }

    #[test]
    fn test_current_self_heals_stale_stored_order() {
        let store = Arc::new(MemoryStore::new());
        // Written by a release that only knew three columns plus one since removed.
        write_json(
            store.as_ref(),
            COLUMN_ORDER_KEY,
            &["running", "backlog", "ghost_column"],
        )
        .unwrap();
        let manager = ColumnOrderManager::with_canonical(
            store.clone(),
            vec![ColumnKey::Backlog, ColumnKey::Creating, ColumnKey::Running],
        );
        let order = manager.current();
        assert_eq!(
            order,
            vec![ColumnKey::Running, ColumnKey::Backlog, ColumnKey::Creating]
        );
        assert_eq!(
            manager.load(),
            Some(vec![
                "running".to_string(),
                "backlog".to_string(),
                "creating".to_string()
            ])
        );
    }

    #[test]
    fn test_current_on_upgrade_appends_new_columns_at_end() {
        let (manager, store) = manager();
        write_json(store.as_ref(), COLUMN_ORDER_KEY, &["merged", "running", "backlog"]).unwrap();
        let order = manager.current();
        assert_eq!(&order[..3], &[ColumnKey::Merged, ColumnKey::Running, ColumnKey::Backlog]);
        assert_eq!(order[3], ColumnKey::Creating);
        assert!(is_permutation(&order, &ColumnKey::ALL));
    }

    #[test]
    fn test_move_column_persists_new_position() {
        let (manager, _store) = manager();
        let order = manager.move_column(ColumnKey::Merged, 0);
        assert_eq!(order[0], ColumnKey::Merged);
        assert_eq!(order[1], ColumnKey::Backlog);
        assert_eq!(manager.current(), order);
    }

    #[test]
    fn test_move_column_clamps_index() {
        let (manager, _store) = manager();
        let order = manager.move_column(ColumnKey::Backlog, 999);
        assert_eq!(order.last(), Some(&ColumnKey::Backlog));
        assert!(is_permutation(&order, &ColumnKey::ALL));
    }

    #[test]
    fn test_reorder_normalizes_user_input() {
        let (manager, _store) = manager();
        let order = manager.reorder(&["approved", "approved", "nonsense"]);
        assert_eq!(order[0], ColumnKey::Approved);
        assert!(is_permutation(&order, &ColumnKey::ALL));
        assert_eq!(manager.load(), Some(as_strings(&order)));
    }

    #[test]
    fn test_reset_restores_canonical() {
        let (manager, _store) = manager();
        manager.move_column(ColumnKey::Merged, 0);
        assert_eq!(manager.reset(), ColumnKey::ALL.to_vec());
        assert_eq!(manager.current(), ColumnKey::ALL.to_vec());
    }

    #[test]
    fn test_storage_failure_is_session_only_not_fatal() {
        let manager = ColumnOrderManager::new(Arc::new(FailingStore));
        assert!(manager.load().is_none());
        assert_eq!(manager.current(), ColumnKey::ALL.to_vec());
        let moved = manager.move_column(ColumnKey::Merged, 0);
        assert_eq!(moved[0], ColumnKey::Merged);
        assert_eq!(manager.current(), moved);

        let moved_again = manager.move_column(ColumnKey::Approved, 1);
        assert_eq!(&moved_again[..2], &[ColumnKey::Merged, ColumnKey::Approved]);
        assert_eq!(manager.current(), moved_again);

        manager.reset();
        assert_eq!(manager.current(), ColumnKey::ALL.to_vec());
    }

    #[test]
    fn test_session_order_is_shared_between_clones() {
        let manager = ColumnOrderManager::new(Arc::new(FailingStore));
        let handle = manager.clone();
        manager.move_column(ColumnKey::Failed, 0);
        assert_eq!(handle.current()[0], ColumnKey::Failed);
    }
}
