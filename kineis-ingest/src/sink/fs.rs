//! Filesystem sinks
//!
//! `DirectoryArchive` writes each raw message to its own file under a root
//! directory. `JsonlTelemetryTable` appends one JSON object per row to a
//! single file and remembers the keys it has seen, including those already
//! in the file when it was opened.

use super::{RawArchive, SinkError, TelemetryRecord, TelemetryTable};
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Mutex;

/// Raw archive rooted at a directory
#[derive(Debug, Clone)]
pub struct DirectoryArchive {
    root: PathBuf,
}

impl DirectoryArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an entry name below the root, refusing anything that escapes it
    fn entry_path(&self, name: &str) -> Result<PathBuf, SinkError> {
        let relative = Path::new(name);
        let is_plain = !name.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(SinkError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl RawArchive for DirectoryArchive {
    fn store(&self, name: &str, contents: &[u8]) -> Result<(), SinkError> {
        let path = self.entry_path(name)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(SinkError::ArchiveEntryExists(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        file.write_all(contents)?;
        file.flush()?;

        log::debug!("Archived {} bytes to {:?}", contents.len(), path);
        Ok(())
    }
}

/// Append-only table stored as JSON lines
#[derive(Debug)]
pub struct JsonlTelemetryTable {
    path: PathBuf,
    keys: Mutex<HashSet<(String, String)>>,
}

impl JsonlTelemetryTable {
    /// Open (or start) a table file, loading the keys already written
    ///
    /// Lines that do not parse as a record are skipped with a warning.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SinkError> {
        let path = path.into();
        let keys: HashSet<_> = match read_table_file(&path)? {
            Some(records) => {
                let keys: HashSet<_> = records.iter().map(TelemetryRecord::key).collect();
                log::info!("Opened table {:?} with {} existing rows", path, keys.len());
                keys
            }
            None => {
                log::info!("Starting new table {:?}", path);
                HashSet::new()
            }
        };

        Ok(Self {
            path,
            keys: Mutex::new(keys),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every row currently in the file, in write order
    ///
    /// Malformed lines are skipped with a warning, as in `open`.
    pub fn read_records(&self) -> Result<Vec<TelemetryRecord>, SinkError> {
        Ok(read_table_file(&self.path)?.unwrap_or_default())
    }
}

/// Parse a table file, or `None` if it does not exist yet
fn read_table_file(path: &Path) -> Result<Option<Vec<TelemetryRecord>>, SinkError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for (number, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TelemetryRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => log::warn!("Skipping malformed line {} of {:?}: {}", number + 1, path, e),
        }
    }
    Ok(Some(records))
}

impl TelemetryTable for JsonlTelemetryTable {
    fn insert(&self, record: TelemetryRecord) -> Result<(), SinkError> {
        // Held across the append so rows are written one at a time
        let mut keys = self
            .keys
            .lock()
            .map_err(|_| SinkError::Unavailable("table lock poisoned".to_string()))?;

        let key = record.key();
        if keys.contains(&key) {
            return Err(SinkError::Conflict {
                partition_key: record.partition_key,
                row_key: record.row_key,
            });
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut line = serde_json::to_string(&record)?;
        line.push('\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        keys.insert(key);
        Ok(())
    }
}
