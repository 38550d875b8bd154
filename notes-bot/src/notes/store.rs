//! NoteStore: serialized access to the CSV notes ledger
//!
//! Every mutation is a full load → modify → persist cycle executed under a
//! single fair mutex, so concurrent users can never overwrite each other's
//! changes. Reads go straight to the file: writes land via rename, so a
//! reader sees either the old or the new ledger, never a partial one.
//! Ledger rows that cannot be read as notes are invisible to readers but are
//! written back untouched by every mutation.

use parking_lot::FairMutex;
use std::path::{Path, PathBuf};

use super::ledger::{self, Ledger, Note};
use crate::error::PersistenceError;
use crate::records::normalize_id;

pub struct NoteStore {
    path: PathBuf,
    write_lock: FairMutex<()>,
}

impl NoteStore {
    /// Open the ledger at `path`. The file is created on the first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        log::info!("[NOTES] Using notes ledger {}", path.display());
        Self {
            path,
            write_lock: FairMutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a note. Only returns once the ledger write is confirmed.
    pub fn add(
        &self,
        record_id: &str,
        text: &str,
        author: &str,
        store_name: &str,
    ) -> Result<Note, PersistenceError> {
        let note = Note {
            record_id: normalize_id(record_id),
            text: text.to_string(),
            author: author.to_string(),
            store_name: store_name.to_string(),
        };

        self.mutate(|ledger| {
            ledger.push(note.clone());
            ((), true)
        })?;

        log::info!("[NOTES] {} added a note to record {}", note.author, note.record_id);
        log::debug!("[NOTES] Note text: {}", note.text);
        Ok(note)
    }

    /// Notes for one record, in insertion order.
    pub fn list_by_record(&self, record_id: &str) -> Result<Vec<Note>, PersistenceError> {
        Ok(ledger::read_ledger(&self.path)?
            .notes()
            .filter(|note| note.belongs_to(record_id))
            .cloned()
            .collect())
    }

    pub fn list_all(&self) -> Result<Vec<Note>, PersistenceError> {
        Ok(ledger::read_ledger(&self.path)?.into_notes())
    }

    /// All notes grouped by record id, groups ordered by first appearance.
    pub fn grouped_by_record(&self) -> Result<Vec<(String, Vec<Note>)>, PersistenceError> {
        let mut groups: Vec<(String, Vec<Note>)> = Vec::new();
        for note in self.list_all()? {
            match groups.iter_mut().find(|(id, _)| *id == note.record_id) {
                Some((_, notes)) => notes.push(note),
                None => groups.push((note.record_id.clone(), vec![note])),
            }
        }
        Ok(groups)
    }

    /// Remove the first note matching both the record id and the exact text.
    /// Returns `false` (and leaves the ledger untouched) when nothing matched.
    pub fn remove_one(&self, record_id: &str, text: &str) -> Result<bool, PersistenceError> {
        let removed = self.mutate(|ledger| {
            let removed = ledger.remove_first(|note| note.belongs_to(record_id) && note.text == text);
            (removed, removed)
        })?;

        if removed {
            log::info!("[NOTES] Removed a note from record {}", record_id);
        }
        Ok(removed)
    }

    pub fn remove_all_for_record(&self, record_id: &str) -> Result<usize, PersistenceError> {
        let removed = self.mutate(|ledger| {
            let removed = ledger.remove_all(|note| note.belongs_to(record_id));
            (removed, removed > 0)
        })?;

        log::info!("[NOTES] Removed {} notes from record {}", removed, record_id);
        Ok(removed)
    }

    /// Run one read-modify-write cycle under the ledger lock. The closure
    /// returns its result and whether the ledger changed.
    fn mutate<R>(&self, f: impl FnOnce(&mut Ledger) -> (R, bool)) -> Result<R, PersistenceError> {
        let _guard = self.write_lock.lock();

        let mut ledger = ledger::read_ledger(&self.path)?;
        let (result, changed) = f(&mut ledger);
        if changed {
            let kept = ledger.unreadable_rows();
            if kept > 0 {
                log::warn!(
                    "[NOTES] Rewriting {} with {} unreadable rows carried over",
                    self.path.display(),
                    kept
                );
            }
            ledger::write_ledger(&self.path, &ledger)?;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn store_in(dir: &tempfile::TempDir) -> NoteStore {
        NoteStore::new(dir.path().join("notes.csv"))
    }

    #[test]
    fn test_add_then_list_and_round_trip() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);

        store.add("101", "Checked UPS", "Anna", "Moscow Central").unwrap();
        store.add("102", "Other store", "Ivan", "Kazan Mall").unwrap();
        let before = store.list_all().unwrap();

        let note = store.add("101.0", "Replaced router", "Anna", "Moscow Central").unwrap();
        assert_eq!(note.record_id, "101");

        let notes = store.list_by_record("101").unwrap();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes.last().unwrap(), &note);

        assert!(store.remove_one("101", "Replaced router").unwrap());
        assert_eq!(store.list_all().unwrap(), before);
    }

    #[test]
    fn test_first_write_creates_file_with_header() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        assert!(!store.path().exists());
        assert!(store.list_by_record("101").unwrap().is_empty());

        store.add("101", "First", "Anna", "Moscow Central").unwrap();
        let content = std::fs::read_to_string(store.path()).unwrap();
        assert!(content.starts_with("UniqueID,Note,User,Magazin\n"));
    }

    #[test]
    fn test_remove_one_is_idempotent() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add("101", "dup", "Anna", "S").unwrap();
        store.add("101", "dup", "Ivan", "S").unwrap();

        assert!(store.remove_one("101", "dup").unwrap());
        let remaining = store.list_by_record("101").unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].author, "Ivan");

        assert!(store.remove_one("101", "dup").unwrap());
        assert!(!store.remove_one("101", "dup").unwrap());
        assert!(!store.remove_one("999", "missing").unwrap());
    }

    #[test]
    fn test_remove_all_for_record() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add("101", "a", "Anna", "S").unwrap();
        store.add("102", "b", "Anna", "S").unwrap();
        store.add("101", "c", "Anna", "S").unwrap();

        assert_eq!(store.remove_all_for_record("101").unwrap(), 2);
        assert_eq!(store.remove_all_for_record("101").unwrap(), 0);
        let all = store.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].record_id, "102");
    }

    #[test]
    fn test_grouped_by_record_keeps_first_appearance_order() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        store.add("202", "x", "Anna", "S").unwrap();
        store.add("101", "y", "Anna", "S").unwrap();
        store.add("202", "z", "Anna", "S").unwrap();

        let groups = store.grouped_by_record().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, "202");
        assert_eq!(groups[0].1.len(), 2);
        assert_eq!(groups[1].0, "101");
    }

    #[test]
    fn test_concurrent_adds_are_not_lost() {
        let dir = tempdir().unwrap();
        let store = Arc::new(store_in(&dir));
        let writers = 16;

        let handles: Vec<_> = (0..writers)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    store
                        .add("101", &format!("note from session {}", i), &format!("user{}", i), "S")
                        .unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let notes = store.list_by_record("101").unwrap();
        assert_eq!(notes.len(), writers);
        for i in 0..writers {
            assert!(notes.iter().any(|n| n.text == format!("note from session {}", i)));
        }
    }

    #[test]
    fn test_concurrent_mixed_mutations() {
        let dir = tempdir().unwrap();
        let store = Arc::new(store_in(&dir));
        for i in 0..8 {
            store.add("101", &format!("old {}", i), "Anna", "S").unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    assert!(store.remove_one("101", &format!("old {}", i)).unwrap());
                    store.add("102", &format!("new {}", i), "Ivan", "T").unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(store.list_by_record("101").unwrap().is_empty());
        assert_eq!(store.list_by_record("102").unwrap().len(), 8);
    }

    #[test]
    fn test_mutations_keep_rows_in_foreign_encoding() {
        let dir = tempdir().unwrap();
        let store = store_in(&dir);
        let mut raw = b"UniqueID,Note,User,Magazin\n101,good,Anna,S\n".to_vec();
        raw.extend_from_slice(b"102,\xCF\xF0\xE8,Ivan,T\n");
        std::fs::write(store.path(), &raw).unwrap();

        assert!(store.list_by_record("102").unwrap().is_empty());
        assert_eq!(store.list_all().unwrap().len(), 1);

        store.add("103", "new", "Olga", "U").unwrap();
        assert!(store.remove_one("101", "good").unwrap());
        assert_eq!(store.remove_all_for_record("102").unwrap(), 0);

        let written = std::fs::read(store.path()).unwrap();
        let expected: &[u8] = b"UniqueID,Note,User,Magazin\n102,\xCF\xF0\xE8,Ivan,T\n103,new,Olga,U\n";
        assert_eq!(written, expected);
        assert_eq!(store.list_by_record("103").unwrap().len(), 1);
    }

    #[test]
    fn test_unwritable_ledger_reports_persistence_error() {
        let dir = tempdir().unwrap();
        // The ledger path is a directory, so neither read nor write can succeed
        let store = NoteStore::new(dir.path());
        assert!(store.add("101", "text", "Anna", "S").is_err());
    }
}
