//! Envelope normalization (JSON, CSV)
//!
//! Messages arrive either as a JSON document or as a semicolon-delimited
//! table, and each format has more than one place where the hex payload
//! can live. This module resolves all of that once and hands the rest of
//! the pipeline a flat list of `FramePayload`s in source order.

pub mod csv_table;
pub mod json;

pub use csv_table::{parse_records, unescape_doubled_quotes, CsvRecord};
pub use json::{parse_envelope, Entry, EntrySchema, RawEnvelope, Sensors};

use crate::types::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leading token that marks a CSV envelope
pub const CSV_HEADER_TOKEN: &str = "DEVICE_ID";

/// Transport format of a received message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvelopeFormat {
    Json,
    Csv,
}

impl EnvelopeFormat {
    /// CSV if the message starts with the `DEVICE_ID` header, JSON otherwise
    pub fn detect(message: &str) -> Self {
        if message.starts_with(CSV_HEADER_TOKEN) {
            EnvelopeFormat::Csv
        } else {
            EnvelopeFormat::Json
        }
    }
}

impl fmt::Display for EnvelopeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvelopeFormat::Json => write!(f, "JSON"),
            EnvelopeFormat::Csv => write!(f, "CSV"),
        }
    }
}

/// A parsed envelope, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    Json(RawEnvelope),
    Csv(Vec<CsvRecord>),
}

/// Canonical per-entry output of normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FramePayload {
    /// Reporting device (empty when the envelope omitted it)
    pub device_id: String,
    /// Satellite message id, if the envelope carried one
    pub message_id: Option<String>,
    /// Hex-encoded frame
    pub raw_data: String,
}

impl Envelope {
    /// Detect the format and parse the message
    ///
    /// Fails with `FormatError` if the JSON is unparsable or the CSV header
    /// row is missing.
    pub fn parse(message: &str) -> Result<Self> {
        match EnvelopeFormat::detect(message) {
            EnvelopeFormat::Csv => Ok(Envelope::Csv(parse_records(message)?)),
            EnvelopeFormat::Json => Ok(Envelope::Json(parse_envelope(message)?)),
        }
    }

    pub fn format(&self) -> EnvelopeFormat {
        match self {
            Envelope::Json(_) => EnvelopeFormat::Json,
            Envelope::Csv(_) => EnvelopeFormat::Csv,
        }
    }

    /// Number of entries (rows or `DATA` items), with or without a payload
    pub fn len(&self) -> usize {
        match self {
            Envelope::Json(envelope) => envelope.data.len(),
            Envelope::Csv(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flatten into payloads, keeping source order
    ///
    /// Entries that carry no payload are logged and dropped.
    pub fn into_payloads(self) -> Vec<FramePayload> {
        match self {
            Envelope::Json(envelope) => envelope
                .data
                .into_iter()
                .enumerate()
                .filter_map(|(index, entry)| {
                    let payload = entry.raw_data().map(str::to_string);
                    match payload {
                        Some(raw_data) => Some(FramePayload {
                            device_id: entry.device_id.unwrap_or_default(),
                            message_id: entry.message_id,
                            raw_data,
                        }),
                        None => {
                            log::warn!(
                                "JSON entry {} ({:?} schema) has no RAW_DATA, skipping",
                                index,
                                entry.schema()
                            );
                            None
                        }
                    }
                })
                .collect(),
            Envelope::Csv(records) => records
                .into_iter()
                .enumerate()
                .filter_map(|(index, record)| match record.raw_sensor_data {
                    Some(raw_data) => Some(FramePayload {
                        device_id: record.device_id,
                        message_id: Some(record.message_id).filter(|id| !id.is_empty()),
                        raw_data,
                    }),
                    None => {
                        log::warn!("CSV row {} has no RAW_DATA in SENSORS, skipping", index + 1);
                        None
                    }
                })
                .collect(),
        }
    }
}

/// Normalize a received message into `(device, payload)` entries
pub fn normalize(message: &str) -> Result<Vec<FramePayload>> {
    let envelope = Envelope::parse(message)?;
    log::debug!("Parsed {} envelope with {} entries", envelope.format(), envelope.len());
    Ok(envelope.into_payloads())
}
