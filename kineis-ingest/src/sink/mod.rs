//! Output sinks
//!
//! Two collaborators receive ingestion output: a time-series table holding
//! one row per valid reading, and a raw archive holding every received
//! message verbatim. Both are traits so the host can plug in its own
//! storage; in-memory and filesystem implementations live here.

pub mod fs;
pub mod memory;

pub use self::fs::{DirectoryArchive, JsonlTelemetryTable};
pub use self::memory::{MemoryArchive, MemoryTelemetryTable};

use serde::{Deserialize, Serialize};

/// One row of the time-series table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TelemetryRecord {
    /// Fixed logical partition
    pub partition_key: String,
    /// Sensor id of the reading
    pub row_key: String,
    /// Temperature of the reading
    pub message: String,
}

impl TelemetryRecord {
    pub fn key(&self) -> (String, String) {
        (self.partition_key.clone(), self.row_key.clone())
    }
}

/// Errors reported by sinks
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Row already exists: partition {partition_key:?}, row key {row_key:?}")]
    Conflict {
        partition_key: String,
        row_key: String,
    },

    #[error("Archive entry already exists: {0}")]
    ArchiveEntryExists(String),

    #[error("Invalid archive entry name: {0:?}")]
    InvalidName(String),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl SinkError {
    /// True when the table rejected a duplicate row key
    pub fn is_conflict(&self) -> bool {
        matches!(self, SinkError::Conflict { .. })
    }
}

/// Insert-only time-series table keyed by (partition, row)
pub trait TelemetryTable: Send + Sync {
    /// Insert a record; an existing (partition, row) pair is a `Conflict`
    fn insert(&self, record: TelemetryRecord) -> Result<(), SinkError>;
}

/// Write-once store for raw messages
pub trait RawArchive: Send + Sync {
    /// Persist `contents` verbatim under `name`
    fn store(&self, name: &str, contents: &[u8]) -> Result<(), SinkError>;
}
