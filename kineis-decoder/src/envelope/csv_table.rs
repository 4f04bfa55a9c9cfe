//! Semicolon-delimited envelope
//!
//! ```text
//! DEVICE_ID;MSG_ID;CHECKED;GPS_DATE;CRC_OK;BCH_STATUS;LONG;LAT;ALT;SENSORS;METADATAS;COUNTER
//! 205895;2095769;true;2022-02-23T16:48:12.504Z;true;;;;;"{""RAW_DATA"":""F76A...""}";;
//! ```
//!
//! The `SENSORS` cell is a JSON object whose quotes are doubled for CSV
//! escaping. Columns are matched by header name and any cell other than
//! `SENSORS` may be missing or malformed without rejecting the row.

use crate::types::{DecoderError, Result, Timestamp};
use ::csv::{ReaderBuilder, StringRecord};
use serde::Deserialize;

/// One row of a CSV envelope
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CsvRecord {
    pub device_id: String,
    pub message_id: String,
    pub checked: Option<bool>,
    pub gps_date: Option<Timestamp>,
    pub crc_ok: Option<bool>,
    pub bch_status: String,
    pub longitude: String,
    pub latitude: String,
    pub altitude: String,
    pub sensors: String,
    pub metadatas: String,
    pub counter: String,
    /// `RAW_DATA` from the `SENSORS` cell, if it could be read
    pub raw_sensor_data: Option<String>,
}

/// Minimal view of the `SENSORS` cell
#[derive(Debug, Deserialize)]
struct SensorsCell {
    #[serde(rename = "RAW_DATA", default)]
    raw_data: Option<String>,
}

/// Positions of the recognized columns in the header row
#[derive(Debug, Default)]
struct ColumnIndex {
    device_id: Option<usize>,
    message_id: Option<usize>,
    checked: Option<usize>,
    gps_date: Option<usize>,
    crc_ok: Option<usize>,
    bch_status: Option<usize>,
    longitude: Option<usize>,
    latitude: Option<usize>,
    altitude: Option<usize>,
    sensors: Option<usize>,
    metadatas: Option<usize>,
    counter: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &StringRecord) -> Self {
        let mut index = ColumnIndex::default();
        for (position, name) in headers.iter().enumerate() {
            let slot = match name.trim() {
                "DEVICE_ID" => &mut index.device_id,
                "MSG_ID" => &mut index.message_id,
                "CHECKED" => &mut index.checked,
                "GPS_DATE" => &mut index.gps_date,
                "CRC_OK" => &mut index.crc_ok,
                "BCH_STATUS" => &mut index.bch_status,
                "LONG" => &mut index.longitude,
                "LAT" => &mut index.latitude,
                "ALT" => &mut index.altitude,
                "SENSORS" => &mut index.sensors,
                "METADATAS" => &mut index.metadatas,
                "COUNTER" => &mut index.counter,
                other => {
                    log::trace!("Ignoring unknown CSV column {:?}", other);
                    continue;
                }
            };
            // First occurrence wins
            if slot.is_none() {
                *slot = Some(position);
            }
        }
        index
    }
}

/// Parse a CSV envelope into its rows, in file order
///
/// Fails with `FormatError` only when the header row is missing.
pub fn parse_records(message: &str) -> Result<Vec<CsvRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .from_reader(message.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| DecoderError::FormatError(format!("Failed to read CSV header: {}", e)))?
        .clone();
    let columns = ColumnIndex::from_headers(&headers);
    if columns.device_id.is_none() {
        return Err(DecoderError::FormatError(
            "CSV header row missing (no DEVICE_ID column)".to_string(),
        ));
    }

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        match result {
            Ok(fields) => records.push(build_record(&fields, &columns)),
            Err(e) => log::warn!("Skipping unreadable CSV row {}: {}", row + 1, e),
        }
    }

    Ok(records)
}

fn build_record(fields: &StringRecord, columns: &ColumnIndex) -> CsvRecord {
    let cell = |column: Option<usize>| -> String {
        column
            .and_then(|i| fields.get(i))
            .unwrap_or_default()
            .to_string()
    };

    let sensors = cell(columns.sensors);
    let raw_sensor_data = if sensors.trim().is_empty() {
        None
    } else {
        read_raw_data(&sensors)
    };

    CsvRecord {
        device_id: cell(columns.device_id),
        message_id: cell(columns.message_id),
        checked: parse_bool(&cell(columns.checked)),
        gps_date: parse_date(&cell(columns.gps_date)),
        crc_ok: parse_bool(&cell(columns.crc_ok)),
        bch_status: cell(columns.bch_status),
        longitude: cell(columns.longitude),
        latitude: cell(columns.latitude),
        altitude: cell(columns.altitude),
        metadatas: cell(columns.metadatas),
        counter: cell(columns.counter),
        sensors,
        raw_sensor_data,
    }
}

/// Collapse CSV-doubled quotes (`""` becomes `"`)
pub fn unescape_doubled_quotes(cell: &str) -> String {
    cell.replace("\"\"", "\"")
}

/// Read `RAW_DATA` from a `SENSORS` cell
///
/// A cell that went through proper CSV quoting is already plain JSON; the
/// doubled-quote form is unescaped first.
fn read_raw_data(sensors: &str) -> Option<String> {
    let parsed = serde_json::from_str::<SensorsCell>(sensors)
        .or_else(|_| serde_json::from_str::<SensorsCell>(&unescape_doubled_quotes(sensors)));

    match parsed {
        Ok(cell) => cell.raw_data,
        Err(e) => {
            log::warn!("Unreadable SENSORS cell {:?}: {}", sensors, e);
            None
        }
    }
}

fn parse_bool(text: &str) -> Option<bool> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(text: &str) -> Option<Timestamp> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    chrono::DateTime::parse_from_rfc3339(text)
        .map(|date| date.with_timezone(&chrono::Utc))
        .map_err(|e| log::debug!("Ignoring malformed GPS_DATE {:?}: {}", text, e))
        .ok()
}
