//! File operations for the notes ledger
//!
//! Handles reading the CSV ledger (tolerating missing or damaged files) and
//! rewriting it atomically via a sibling temp file. Rows that do not decode
//! as notes (bad encoding, hand edits) are carried through rewrites byte for
//! byte.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::records::normalize_id;

/// Ledger columns, in file order.
pub const HEADER: [&str; 4] = ["UniqueID", "Note", "User", "Magazin"];

/// A note attached to a record. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    #[serde(rename = "UniqueID")]
    pub record_id: String,
    #[serde(rename = "Note")]
    pub text: String,
    #[serde(rename = "User", default)]
    pub author: String,
    #[serde(rename = "Magazin", default)]
    pub store_name: String,
}

impl Note {
    pub fn belongs_to(&self, record_id: &str) -> bool {
        normalize_id(&self.record_id) == normalize_id(record_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Row {
    Note(Note),
    /// A row that did not decode, kept verbatim
    Unreadable(csv::ByteRecord),
}

/// In-memory copy of the ledger file, rows in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    rows: Vec<Row>,
}

impl Ledger {
    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.rows.iter().filter_map(|row| match row {
            Row::Note(note) => Some(note),
            Row::Unreadable(_) => None,
        })
    }

    pub fn into_notes(self) -> Vec<Note> {
        self.rows
            .into_iter()
            .filter_map(|row| match row {
                Row::Note(note) => Some(note),
                Row::Unreadable(_) => None,
            })
            .collect()
    }

    /// Rows that are kept but could not be read as notes.
    pub fn unreadable_rows(&self) -> usize {
        self.rows
            .iter()
            .filter(|row| matches!(row, Row::Unreadable(_)))
            .count()
    }

    pub fn push(&mut self, note: Note) {
        self.rows.push(Row::Note(note));
    }

    /// Remove the first note matching `pred`. Unreadable rows never match.
    pub fn remove_first(&mut self, pred: impl Fn(&Note) -> bool) -> bool {
        let position = self
            .rows
            .iter()
            .position(|row| matches!(row, Row::Note(note) if pred(note)));
        match position {
            Some(index) => {
                self.rows.remove(index);
                true
            }
            None => false,
        }
    }

    /// Remove every note matching `pred` and return how many went.
    pub fn remove_all(&mut self, pred: impl Fn(&Note) -> bool) -> usize {
        let before = self.rows.len();
        self.rows
            .retain(|row| !matches!(row, Row::Note(note) if pred(note)));
        before - self.rows.len()
    }
}

/// Read the whole ledger. A missing file is an empty ledger.
pub fn read_ledger(path: &Path) -> Result<Ledger, PersistenceError> {
    let file = match fs::File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Ledger::default()),
        Err(source) => return Err(io_error(path, source)),
    };

    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);

    let headers = reader
        .byte_headers()
        .map_err(|source| csv_error(path, source))?
        .clone();
    let has_column = |name: &str| headers.iter().any(|h| h.trim_ascii() == name.as_bytes());
    if !has_column(HEADER[0]) || !has_column(HEADER[1]) {
        if !headers.is_empty() {
            log::warn!(
                "[NOTES] Ledger {} has an unrecognized header {:?}, treating it as empty",
                path.display(),
                String::from_utf8_lossy(headers.as_slice())
            );
        }
        return Ok(Ledger::default());
    }

    let mut rows = Vec::new();
    let mut record = csv::ByteRecord::new();
    let mut line = 1;
    while reader
        .read_byte_record(&mut record)
        .map_err(|source| csv_error(path, source))?
    {
        line += 1;
        match record.deserialize::<Note>(Some(&headers)) {
            Ok(mut note) => {
                note.record_id = normalize_id(&note.record_id);
                rows.push(Row::Note(note));
            }
            Err(e) => {
                log::warn!(
                    "[NOTES] Ledger row {} in {} is unreadable, keeping it as is: {}",
                    line,
                    path.display(),
                    e
                );
                rows.push(Row::Unreadable(record.clone()));
            }
        }
    }

    Ok(Ledger { rows })
}

/// Replace the ledger file with `ledger`. The header row is always written.
pub fn write_ledger(path: &Path, ledger: &Ledger) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| io_error(path, source))?;
    }

    let tmp = temp_path(path);
    let result = write_file(&tmp, ledger).and_then(|()| {
        fs::rename(&tmp, path).map_err(|source| io_error(path, source))
    });
    if result.is_err() {
        fs::remove_file(&tmp).ok();
    }
    result
}

fn write_file(tmp: &Path, ledger: &Ledger) -> Result<(), PersistenceError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(tmp)
        .map_err(|source| csv_error(tmp, source))?;

    writer
        .write_record(HEADER)
        .map_err(|source| csv_error(tmp, source))?;
    for row in &ledger.rows {
        let written = match row {
            Row::Note(note) => writer.write_record([
                note.record_id.as_str(),
                note.text.as_str(),
                note.author.as_str(),
                note.store_name.as_str(),
            ]),
            Row::Unreadable(record) => writer.write_byte_record(record),
        };
        written.map_err(|source| csv_error(tmp, source))?;
    }

    let file = writer
        .into_inner()
        .map_err(|e| io_error(tmp, e.into_error()))?;
    file.sync_all().map_err(|source| io_error(tmp, source))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "notes.csv".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, source: io::Error) -> PersistenceError {
    PersistenceError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn csv_error(path: &Path, source: csv::Error) -> PersistenceError {
    PersistenceError::Csv {
        path: path.display().to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn note(id: &str, text: &str) -> Note {
        Note {
            record_id: id.to_string(),
            text: text.to_string(),
            author: "Anna".to_string(),
            store_name: "Moscow Central".to_string(),
        }
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let ledger = read_ledger(&dir.path().join("notes.csv")).unwrap();
        assert_eq!(ledger, Ledger::default());
    }

    #[test]
    fn test_empty_ledger_keeps_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.csv");

        write_ledger(&path, &Ledger::default()).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim_end(), "UniqueID,Note,User,Magazin");
        assert_eq!(read_ledger(&path).unwrap().notes().count(), 0);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_write_and_read_preserves_order_and_quoting() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/notes.csv");
        let notes = vec![
            note("101", "Replaced router"),
            note("102", "Door code 1,2,3 \"new\""),
            note("101", "Line one\nline two"),
        ];

        let mut ledger = Ledger::default();
        notes.iter().cloned().for_each(|note| ledger.push(note));
        write_ledger(&path, &ledger).unwrap();
        assert_eq!(read_ledger(&path).unwrap().into_notes(), notes);
    }

    #[test]
    fn test_legacy_rows_are_normalized() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.csv");
        fs::write(&path, "UniqueID,Note\n101.0,Old note\n").unwrap();

        let notes = read_ledger(&path).unwrap().into_notes();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].record_id, "101");
        assert_eq!(notes[0].author, "");
        assert!(notes[0].belongs_to("101.0"));
    }

    #[test]
    fn test_unrecognized_header_is_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.csv");
        fs::write(&path, "store_code,note\n1,x\n").unwrap();
        assert_eq!(read_ledger(&path).unwrap(), Ledger::default());

        fs::write(&path, "").unwrap();
        assert_eq!(read_ledger(&path).unwrap(), Ledger::default());
    }

    #[test]
    fn test_unreadable_path_is_an_error() {
        let dir = tempdir().unwrap();
        // A directory cannot be read as a ledger
        assert!(read_ledger(dir.path()).is_err());
    }

    #[test]
    fn test_unreadable_rows_survive_rewrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("notes.csv");
        // cp1251 "При" saved by a spreadsheet is not UTF-8
        let mut raw = b"UniqueID,Note,User,Magazin\n101,good,Anna,S\n".to_vec();
        raw.extend_from_slice(b"102,\xCF\xF0\xE8,Ivan,T\n");
        fs::write(&path, &raw).unwrap();

        let mut ledger = read_ledger(&path).unwrap();
        assert_eq!(ledger.notes().count(), 1);
        assert_eq!(ledger.unreadable_rows(), 1);

        ledger.push(note("103", "new"));
        assert!(!ledger.remove_first(|n| n.record_id == "102"));
        write_ledger(&path, &ledger).unwrap();

        let written = fs::read(&path).unwrap();
        let expected_tail: &[u8] = b"101,good,Anna,S\n102,\xCF\xF0\xE8,Ivan,T\n103,new,Anna,Moscow Central\n";
        assert!(written.ends_with(expected_tail), "{:?}", String::from_utf8_lossy(&written));
    }
}
