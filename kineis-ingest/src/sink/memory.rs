//! In-memory sinks, used by hosts without storage and by tests

use super::{RawArchive, SinkError, TelemetryRecord, TelemetryTable};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, SinkError> {
    mutex
        .lock()
        .map_err(|_| SinkError::Unavailable("sink lock poisoned".to_string()))
}

#[derive(Debug, Default)]
struct TableState {
    keys: HashSet<(String, String)>,
    records: Vec<TelemetryRecord>,
}

/// Table that keeps inserted rows in insertion order
#[derive(Debug, Default)]
pub struct MemoryTelemetryTable {
    state: Mutex<TableState>,
}

impl MemoryTelemetryTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all rows, in insertion order
    pub fn records(&self) -> Vec<TelemetryRecord> {
        lock(&self.state)
            .map(|state| state.records.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        lock(&self.state).map(|state| state.records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TelemetryTable for MemoryTelemetryTable {
    fn insert(&self, record: TelemetryRecord) -> Result<(), SinkError> {
        let mut state = lock(&self.state)?;
        if !state.keys.insert(record.key()) {
            return Err(SinkError::Conflict {
                partition_key: record.partition_key,
                row_key: record.row_key,
            });
        }
        state.records.push(record);
        Ok(())
    }
}

/// Archive that keeps messages in a name-ordered map
#[derive(Debug, Default)]
pub struct MemoryArchive {
    entries: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        lock(&self.entries).ok()?.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        lock(&self.entries)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl RawArchive for MemoryArchive {
    fn store(&self, name: &str, contents: &[u8]) -> Result<(), SinkError> {
        let mut entries = lock(&self.entries)?;
        if entries.contains_key(name) {
            return Err(SinkError::ArchiveEntryExists(name.to_string()));
        }
        entries.insert(name.to_string(), contents.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(row_key: &str, message: &str) -> TelemetryRecord {
        TelemetryRecord {
            partition_key: "Temperature3e".to_string(),
            row_key: row_key.to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_table_rejects_duplicate_row_key() {
        let table = MemoryTelemetryTable::new();
        table.insert(record("79", "10.32")).unwrap();
        table.insert(record("18", "20.24")).unwrap();

        let err = table.insert(record("79", "11.5")).unwrap_err();
        assert!(err.is_conflict());

        let records = table.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "10.32");
    }

    #[test]
    fn test_same_row_key_in_other_partition() {
        let table = MemoryTelemetryTable::new();
        table.insert(record("79", "10.32")).unwrap();
        let mut other = record("79", "10.32");
        other.partition_key = "Other".to_string();
        assert!(table.insert(other).is_ok());
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_archive_is_write_once() {
        let archive = MemoryArchive::new();
        archive.store("kineis/a.txt", b"payload").unwrap();
        assert_eq!(archive.get("kineis/a.txt").unwrap(), b"payload".to_vec());
        assert!(matches!(
            archive.store("kineis/a.txt", b"other"),
            Err(SinkError::ArchiveEntryExists(_))
        ));
        assert_eq!(archive.names(), vec!["kineis/a.txt".to_string()]);
    }
}
