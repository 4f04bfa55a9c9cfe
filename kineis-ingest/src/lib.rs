//! Kineis Ingestion Application Layer
//!
//! This crate sits between the messaging trigger and the storage
//! collaborators. It uses the kineis-decoder library and adds:
//! - Raw message archiving (verbatim, keyed by arrival time)
//! - Parallel decoding of every entry in a message
//! - Writing valid readings to a time-series table
//! - TOML configuration and env_logger setup
//!
//! # Example Usage
//!
//! ```
//! use kineis_ingest::{AppConfig, IngestHandler, MemoryArchive, MemoryTelemetryTable};
//! use std::sync::Arc;
//!
//! let config = AppConfig::from_toml_str(
//!     "[decoder.timestamp_offsets]\nday_bit = 22\nhour_bit = 27\nminute_bit = 32\n",
//! )
//! .unwrap();
//! let table = Arc::new(MemoryTelemetryTable::new());
//! let handler = IngestHandler::new(&config, table.clone(), Arc::new(MemoryArchive::new()));
//!
//! let message = br#"{"TYPE":"DEVICE_RAW","MODE":"BASIC","VERSION":1,"DATA":[{"DEVICE_ID":"205895","MSG_ID":401154672,"RAW_DATA":"005DE952A37EE80186A0387C37397C31302E33324300376461746366030185"}]}"#;
//! let report = handler.process_message(message, Some("205895")).unwrap();
//!
//! assert_eq!(report.written, 1);
//! assert_eq!(table.records()[0].row_key, "79");
//! ```

pub mod config;
pub mod ingest;
pub mod logging;
pub mod sink;

pub use config::{load_config, AppConfig, ArchiveConfig, LoggingConfig, TableConfig};
pub use ingest::{IngestHandler, IngestReport};
pub use logging::init_logging;
pub use sink::{
    DirectoryArchive, JsonlTelemetryTable, MemoryArchive, MemoryTelemetryTable, RawArchive,
    SinkError, TelemetryRecord, TelemetryTable,
};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
