//! Locally persisted drafts and the last-used repository.

use std::sync::Arc;

use super::models::Draft;
use super::storage::{DRAFTS_KEY, KvStore, LAST_REPOSITORY_KEY, read_json, read_string, write_json};
use crate::errors::StorageError;

#[derive(Clone)]
pub struct DraftStore {
    store: Arc<dyn KvStore>,
}

impl DraftStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    /// All drafts in insertion order. Corrupt state reads as empty.
    pub fn list(&self) -> Vec<Draft> {
        read_json(self.store.as_ref(), DRAFTS_KEY).unwrap_or_default()
    }

    pub fn get(&self, id: &str) -> Option<Draft> {
        self.list().into_iter().find(|d| d.id == id)
    }

    /// Insert `draft`, or replace the draft with the same id in place.
    pub fn save(&self, draft: Draft) -> Result<Draft, StorageError> {
        let mut drafts = self.list();
        match drafts.iter_mut().find(|d| d.id == draft.id) {
            Some(existing) => *existing = draft.clone(),
            None => drafts.push(draft.clone()),
        }
        write_json(self.store.as_ref(), DRAFTS_KEY, &drafts)?;
        Ok(draft)
    }

    /// Remove a draft. Returns whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool, StorageError> {
        let mut drafts = self.list();
        let before = drafts.len();
        drafts.retain(|d| d.id != id);
        if drafts.len() == before {
            return Ok(false);
        }
        write_json(self.store.as_ref(), DRAFTS_KEY, &drafts)?;
        Ok(true)
    }

    pub fn last_repository(&self) -> Option<String> {
        read_string(self.store.as_ref(), LAST_REPOSITORY_KEY)
    }

    /// Remember the repository of the most recent launch. Failures are logged only.
    pub fn set_last_repository(&self, repository: &str) {
        if let Err(e) = self.store.set(LAST_REPOSITORY_KEY, repository) {
            tracing::warn!(error = %e, "failed to persist last-used repository");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::storage::MemoryStore;
    use crate::board::storage::test_support::FailingStore;

    fn drafts() -> (DraftStore, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (DraftStore::new(store.clone()), store)
    }

    #[test]
    fn test_list_empty_by_default() {
        let (drafts, _) = drafts();
        assert!(drafts.list().is_empty());
    }

    #[test]
    fn test_save_and_get() {
        let (drafts, _) = drafts();
        let draft = drafts.save(Draft::new("acme/web", "main", "add dark mode")).unwrap();
        assert_eq!(drafts.get(&draft.id), Some(draft.clone()));
        assert_eq!(drafts.list().len(), 1);
    }

    #[test]
    fn test_save_existing_id_replaces_in_place() {
        let (drafts, _) = drafts();
        let first = drafts.save(Draft::new("acme/web", "main", "one")).unwrap();
        drafts.save(Draft::new("acme/web", "main", "two")).unwrap();
        let mut edited = first.clone();
        edited.prompt = "one, edited".to_string();
        drafts.save(edited).unwrap();

        let list = drafts.list();
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].id, first.id);
        assert_eq!(list[0].prompt, "one, edited");
    }

    #[test]
    fn test_delete_reports_existence() {
        let (drafts, _) = drafts();
        let draft = drafts.save(Draft::new("acme/web", "main", "x")).unwrap();
        assert!(drafts.delete(&draft.id).unwrap());
        assert!(!drafts.delete(&draft.id).unwrap());
        assert!(drafts.list().is_empty());
    }

    #[test]
    fn test_corrupt_drafts_read_as_empty() {
        let (drafts, store) = drafts();
        store.set(DRAFTS_KEY, "[{\"id\": 1}]").unwrap();
        assert!(drafts.list().is_empty());
    }

    #[test]
    fn test_last_repository_round_trip() {
        let (drafts, _) = drafts();
        assert!(drafts.last_repository().is_none());
        drafts.set_last_repository("https://github.com/acme/web");
        assert_eq!(
            drafts.last_repository().as_deref(),
            Some("https://github.com/acme/web")
        );
    }

    #[test]
    fn test_failing_store_degrades_quietly() {
        let drafts = DraftStore::new(Arc::new(FailingStore));
        assert!(drafts.list().is_empty());
        assert!(drafts.save(Draft::new("r", "main", "p")).is_err());
        drafts.set_last_repository("r");
        assert!(drafts.last_repository().is_none());
    }
}
