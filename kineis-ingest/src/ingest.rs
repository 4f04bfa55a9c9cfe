//! Message ingestion
//!
//! `IngestHandler` is what the messaging trigger calls for every message
//! it receives:
//! 1. Archive the raw bytes verbatim, keyed by arrival time
//! 2. Normalize the envelope and decode every entry (in parallel)
//! 3. Write valid readings to the table, in source order
//!
//! A duplicate row key in the table is expected when the constellation
//! relays the same frame twice; it is logged and the message carries on.

use crate::config::AppConfig;
use crate::sink::{RawArchive, SinkError, TelemetryRecord, TelemetryTable};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use kineis_decoder::{DecodedEntry, DecodedFrame, Decoder, EnvelopeFormat};
use rand::Rng;
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;

/// Name collisions are retried with a fresh suffix this many times
const ARCHIVE_NAME_ATTEMPTS: usize = 8;

/// Outcome of processing one message
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Archive entry holding the raw message
    pub archive_name: String,
    /// Entries with a payload after normalization
    pub entries: usize,
    /// Entries whose hex payload decoded
    pub decoded: usize,
    /// Decoded entries with a valid reading
    pub valid: usize,
    /// Readings accepted by the table
    pub written: usize,
    /// Readings rejected as duplicate row keys
    pub conflicts: usize,
    /// Readings the table failed to store for other reasons
    pub sink_errors: usize,
    /// Entries whose hex payload was malformed
    pub failed: usize,
}

/// Handles received messages end to end
pub struct IngestHandler {
    decoder: Decoder,
    partition_key: String,
    archive_prefix: String,
    table: Arc<dyn TelemetryTable>,
    archive: Arc<dyn RawArchive>,
}

impl IngestHandler {
    pub fn new(
        config: &AppConfig,
        table: Arc<dyn TelemetryTable>,
        archive: Arc<dyn RawArchive>,
    ) -> Self {
        Self {
            decoder: Decoder::new(config.decoder.clone()),
            partition_key: config.table.partition_key.clone(),
            archive_prefix: config.archive.prefix.clone(),
            table,
            archive,
        }
    }

    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// Process a message that has just arrived
    pub fn process_message(&self, message: &[u8], source_device: Option<&str>) -> Result<IngestReport> {
        self.process_message_at(message, source_device, Utc::now())
    }

    /// Process a message with an explicit arrival time
    ///
    /// # Errors
    /// Fails if the raw message cannot be archived or its envelope cannot be
    /// parsed. Per-entry decode failures and table rejections are only
    /// counted in the report.
    pub fn process_message_at(
        &self,
        message: &[u8],
        source_device: Option<&str>,
        arrival: DateTime<Utc>,
    ) -> Result<IngestReport> {
        let text = String::from_utf8_lossy(message);
        log::info!(
            "Processing message {:?} from {}",
            text,
            source_device.unwrap_or("unknown device")
        );

        let archive_name = self
            .archive_raw(message, arrival)
            .context("Failed to archive raw message")?;

        let payloads = self
            .decoder
            .normalize(&text)
            .with_context(|| format!("Failed to parse {} envelope", EnvelopeFormat::detect(&text)))?;

        let entries: Vec<DecodedEntry> = payloads
            .into_par_iter()
            .map(|payload| self.decoder.decode_entry(payload))
            .collect();

        let mut report = IngestReport {
            archive_name,
            entries: entries.len(),
            ..IngestReport::default()
        };

        for entry in &entries {
            let frame = match &entry.frame {
                Ok(frame) => frame,
                Err(_) => {
                    report.failed += 1;
                    continue;
                }
            };
            report.decoded += 1;

            if !frame.is_valid() {
                log::debug!(
                    "No valid reading from device {} (id {}, temperature {})",
                    entry.payload.device_id,
                    frame.id,
                    frame.temperature
                );
                continue;
            }
            report.valid += 1;

            match self.table.insert(self.record_for(frame)) {
                Ok(()) => report.written += 1,
                Err(e) if e.is_conflict() => {
                    log::warn!("Failed to save temperature reading. Does row key already exist? {}", e);
                    report.conflicts += 1;
                }
                Err(e) => {
                    log::warn!("Failed to save temperature reading {}: {}", frame.id, e);
                    report.sink_errors += 1;
                }
            }
        }

        log::info!(
            "Message archived as {}: {} entries, {} valid, {} written, {} duplicates, {} failed",
            report.archive_name,
            report.entries,
            report.valid,
            report.written,
            report.conflicts,
            report.failed
        );
        Ok(report)
    }

    fn record_for(&self, frame: &DecodedFrame) -> TelemetryRecord {
        TelemetryRecord {
            partition_key: self.partition_key.clone(),
            row_key: frame.id.to_string(),
            message: frame.temperature.to_string(),
        }
    }

    /// Store the message under a fresh arrival-time name, returning the name
    fn archive_raw(&self, message: &[u8], arrival: DateTime<Utc>) -> Result<String, SinkError> {
        let mut last_error = None;
        for _ in 0..ARCHIVE_NAME_ATTEMPTS {
            let name = archive_name(&self.archive_prefix, arrival);
            match self.archive.store(&name, message) {
                Ok(()) => return Ok(name),
                Err(SinkError::ArchiveEntryExists(existing)) => {
                    log::debug!("Archive name {} taken, retrying", existing);
                    last_error = Some(SinkError::ArchiveEntryExists(existing));
                }
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| SinkError::Unavailable("archive rejected every name".into())))
    }
}

/// `{prefix}/{arrival}-{4 random hex digits}.txt`
fn archive_name(prefix: &str, arrival: DateTime<Utc>) -> String {
    let suffix: u16 = rand::thread_rng().gen();
    format!(
        "{}/{}-{:04x}.txt",
        prefix.trim_end_matches('/'),
        arrival.format("%Y-%m-%dT%H-%M-%SZ"),
        suffix
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_archive_name_format() {
        let arrival = Utc.with_ymd_and_hms(2022, 2, 23, 16, 48, 12).unwrap();
        let name = archive_name("kineis/", arrival);
        assert!(name.starts_with("kineis/2022-02-23T16-48-12Z-"), "{}", name);
        assert!(name.ends_with(".txt"));

        let suffix = &name["kineis/2022-02-23T16-48-12Z-".len()..name.len() - ".txt".len()];
        assert_eq!(suffix.len(), 4);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_archive_names_vary_within_one_second() {
        let arrival = Utc.with_ymd_and_hms(2022, 2, 23, 16, 48, 12).unwrap();
        let names: std::collections::HashSet<String> =
            (0..64).map(|_| archive_name("kineis", arrival)).collect();
        // 64 draws from 65536 suffixes
        assert!(names.len() > 1);
    }

    struct TakenOnceArchive {
        taken: std::sync::Mutex<Option<String>>,
        inner: crate::sink::MemoryArchive,
    }

    impl RawArchive for TakenOnceArchive {
        fn store(&self, name: &str, contents: &[u8]) -> Result<(), SinkError> {
            let mut taken = self.taken.lock().unwrap();
            if taken.is_none() {
                *taken = Some(name.to_string());
                return Err(SinkError::ArchiveEntryExists(name.to_string()));
            }
            self.inner.store(name, contents)
        }
    }

    #[test]
    fn test_archive_collision_is_retried() {
        let config = AppConfig::from_toml_str(
            r#"
            [decoder.timestamp_offsets]
            day_bit = 22
            hour_bit = 27
            minute_bit = 32
            "#,
        )
        .unwrap();
        let archive = Arc::new(TakenOnceArchive {
            taken: std::sync::Mutex::new(None),
            inner: crate::sink::MemoryArchive::new(),
        });
        let handler = IngestHandler::new(
            &config,
            Arc::new(crate::sink::MemoryTelemetryTable::new()),
            archive.clone(),
        );

        let report = handler.process_message(br#"{"DATA":[]}"#, None).unwrap();
        assert_eq!(archive.inner.names(), vec![report.archive_name.clone()]);
    }
}
