//! RecordSource: immutable in-memory table with keyword search.

use std::io;
use std::path::Path;

use super::columns;
use crate::error::RecordSourceError;

/// Upper bound on the number of records a single search returns.
pub const MAX_SEARCH_RESULTS: usize = 10;

/// One dataset row. Field order follows the source columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub id: String,
    fields: Vec<(String, String)>,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Vec<(String, String)>) -> Self {
        Self {
            id: normalize_id(&id.into()),
            fields,
        }
    }

    /// Stand-in for an id that is no longer (or never was) in the dataset.
    pub fn placeholder(id: &str, store_name: &str) -> Self {
        Self::new(
            id,
            vec![
                (columns::ID.to_string(), normalize_id(id)),
                (columns::STORE.to_string(), store_name.to_string()),
            ],
        )
    }

    /// Value of a named column, if the row has a non-blank one.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
            .filter(|value| !value.trim().is_empty())
    }

    pub fn store_name(&self) -> Option<&str> {
        self.get(columns::STORE)
    }

    fn matches(&self, needle: &str) -> bool {
        self.id.to_lowercase().contains(needle)
            || self
                .fields
                .iter()
                .any(|(_, value)| value.to_lowercase().contains(needle))
    }
}

/// Drop the decimal artifact spreadsheets leave on numeric ids
/// (`"1234.0"` -> `"1234"`). Non-numeric ids are only trimmed.
pub fn normalize_id(raw: &str) -> String {
    let trimmed = raw.trim();
    if let Some((whole, fraction)) = trimmed.split_once('.') {
        let digits = whole.strip_prefix('-').unwrap_or(whole);
        if !digits.is_empty()
            && digits.chars().all(|c| c.is_ascii_digit())
            && fraction.chars().all(|c| c.is_ascii_digit())
        {
            return whole.to_string();
        }
    }
    trimmed.to_string()
}

/// Read-only dataset. Safe to share between sessions behind an `Arc`.
#[derive(Debug, Default)]
pub struct RecordSource {
    records: Vec<Record>,
}

impl RecordSource {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    /// Load a CSV export of the dataset. The header row names the columns.
    pub fn from_csv_path(path: &Path, id_column: &str) -> Result<Self, RecordSourceError> {
        let label = path.display().to_string();
        let reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|source| RecordSourceError::Read {
                path: label.clone(),
                source,
            })?;
        Self::from_csv(reader, id_column, &label)
    }

    pub fn from_csv_reader<R: io::Read>(
        reader: R,
        id_column: &str,
        label: &str,
    ) -> Result<Self, RecordSourceError> {
        let reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
        Self::from_csv(reader, id_column, label)
    }

    fn from_csv<R: io::Read>(
        mut reader: csv::Reader<R>,
        id_column: &str,
        label: &str,
    ) -> Result<Self, RecordSourceError> {
        let read_err = |source| RecordSourceError::Read {
            path: label.to_string(),
            source,
        };

        let headers: Vec<String> = reader
            .headers()
            .map_err(read_err)?
            .iter()
            .map(|h| h.trim().to_string())
            .collect();

        let id_index = headers
            .iter()
            .position(|h| h == id_column)
            .ok_or_else(|| RecordSourceError::MissingIdColumn {
                path: label.to_string(),
                column: id_column.to_string(),
            })?;

        let mut records = Vec::new();
        for row in reader.records() {
            let row = row.map_err(read_err)?;
            if row.iter().all(|cell| cell.trim().is_empty()) {
                continue;
            }

            let id = normalize_id(row.get(id_index).unwrap_or_default());
            let fields = headers
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    let value = row.get(i).unwrap_or_default();
                    let value = if i == id_index {
                        normalize_id(value)
                    } else {
                        value.to_string()
                    };
                    (name.clone(), value)
                })
                .collect();

            records.push(Record::new(id, fields));
        }

        log::info!("[RECORDS] Loaded {} records from {}", records.len(), label);
        Ok(Self::new(records))
    }

    /// Case-insensitive substring search over every field, in source order.
    pub fn search(&self, keyword: &str) -> Vec<Record> {
        let needle = keyword.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }

        self.records
            .iter()
            .filter(|record| record.matches(&needle))
            .take(MAX_SEARCH_RESULTS)
            .cloned()
            .collect()
    }

    pub fn find_by_id(&self, id: &str) -> Option<&Record> {
        let id = normalize_id(id);
        self.records.iter().find(|record| record.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = "\
Код,Магазин,Тип,ФИО системотехника,Адрес,Полный адрес
101.0,Moscow Central,Гипер,Иванов И.И.,Тверская 1,\"Москва, Тверская 1\"
102.0,Kazan Mall,Супер,Петров П.П.,Баумана 5,\"Казань, Баумана 5\"
103,moscow north,Супер,Сидоров С.С.,Ленина 2,\"Москва, Ленина 2\"
,,,,,
";

    fn source() -> RecordSource {
        RecordSource::from_csv_reader(DATASET.as_bytes(), "Код", "test").unwrap()
    }

    #[test]
    fn test_normalize_id() {
        assert_eq!(normalize_id("1234.0"), "1234");
        assert_eq!(normalize_id(" 1234 "), "1234");
        assert_eq!(normalize_id("1234."), "1234");
        assert_eq!(normalize_id("-7.00"), "-7");
        assert_eq!(normalize_id("A-12.B"), "A-12.B");
        assert_eq!(normalize_id("12.3a"), "12.3a");
        assert_eq!(normalize_id(".5"), ".5");
    }

    #[test]
    fn test_load_skips_blank_rows_and_normalizes_ids() {
        let source = source();
        assert_eq!(source.len(), 3);
        let first = source.find_by_id("101").unwrap();
        assert_eq!(first.id, "101");
        assert_eq!(first.get(columns::ID), Some("101"));
        assert_eq!(first.store_name(), Some("Moscow Central"));
        assert_eq!(first.get(columns::FULL_ADDRESS), Some("Москва, Тверская 1"));
    }

    #[test]
    fn test_missing_id_column() {
        let err = RecordSource::from_csv_reader("Name\nfoo\n".as_bytes(), "Код", "bad.csv").unwrap_err();
        assert!(matches!(err, RecordSourceError::MissingIdColumn { .. }));
    }

    #[test]
    fn test_search_is_case_insensitive_in_source_order() {
        let results = source().search("MOSCOW");
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["101", "103"]);

        let results = source().search("москва");
        assert_eq!(results.len(), 2);
    }

    #[test]
    fn test_search_matches_id_and_blank_keyword() {
        assert_eq!(source().search("102").len(), 1);
        assert!(source().search("   ").is_empty());
        assert!(source().search("Владивосток").is_empty());
    }

    #[test]
    fn test_search_caps_results() {
        let records = (0..25)
            .map(|i| {
                Record::new(
                    i.to_string(),
                    vec![(columns::STORE.to_string(), format!("Store {}", i))],
                )
            })
            .collect();
        let source = RecordSource::new(records);

        let results = source.search("store");
        assert_eq!(results.len(), MAX_SEARCH_RESULTS);
        assert_eq!(results[0].id, "0");
        assert_eq!(results[9].id, "9");
        for record in &results {
            assert!(record.store_name().unwrap().to_lowercase().contains("store"));
        }
    }

    #[test]
    fn test_find_by_id_normalizes_lookup() {
        let source = source();
        assert!(source.find_by_id("102.0").is_some());
        assert!(source.find_by_id("999").is_none());
    }

    #[test]
    fn test_placeholder_record() {
        let record = Record::placeholder("55.0", "Не указан");
        assert_eq!(record.id, "55");
        assert_eq!(record.store_name(), Some("Не указан"));
        assert_eq!(record.get(columns::ADDRESS), None);
    }
}
