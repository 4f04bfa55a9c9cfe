//! JSON envelope schema
//!
//! ```text
//! {"TYPE":"DEVICE_RAW","MODE":"BASIC","VERSION":1,"DATA":[
//!     {"DEVICE_ID":"205895","MSG_DATE":"2022-02-09T10:21:05.197Z","MSG_ID":401154672,"RAW_DATA":"005D..."}]}
//!
//! {"TYPE":"DEVICE_PRC","MODE":"EXPERT","VERSION":1,"DATA":[
//!     {"DEVICE_ID":"205895","MSG_ID":2124107,"CHECKED":false,
//!      "SENSORS":{"GPS_DATE":"2022-02-28T10:17:52.122Z","CRC_OK":false,"BCH_STATUS":-1,"RAW_DATA":"FC51..."}}]}
//! ```

use crate::types::{DecoderError, Result, Timestamp};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Top-level JSON envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "TYPE", default)]
    pub envelope_type: Option<String>,
    #[serde(rename = "MODE", default)]
    pub mode: Option<String>,
    #[serde(rename = "VERSION", default)]
    pub version: Option<i64>,
    #[serde(rename = "DATA", default)]
    pub data: Vec<Entry>,
}

/// One device message inside a JSON envelope
///
/// Covers both the flat schema (`RAW_DATA` on the entry) and the nested
/// schema (`RAW_DATA` under `SENSORS`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    #[serde(rename = "DEVICE_ID", default, deserialize_with = "text_or_number")]
    pub device_id: Option<String>,
    #[serde(rename = "MSG_ID", default, deserialize_with = "text_or_number")]
    pub message_id: Option<String>,
    #[serde(rename = "MSG_DATE", default, deserialize_with = "lenient_date")]
    pub message_date: Option<Timestamp>,
    #[serde(rename = "CHECKED", default, deserialize_with = "lenient_bool")]
    pub checked: Option<bool>,
    #[serde(rename = "RAW_DATA", default)]
    pub raw_data: Option<String>,
    #[serde(rename = "SENSORS", default)]
    pub sensors: Option<Sensors>,
}

/// Nested sensor block of the expert schema
///
/// Like the metadata on `Entry`, a malformed `GPS_DATE`, `CRC_OK` or
/// `BCH_STATUS` reads as `None` instead of rejecting the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensors {
    #[serde(rename = "GPS_DATE", default, deserialize_with = "lenient_date")]
    pub gps_date: Option<Timestamp>,
    #[serde(rename = "CRC_OK", default, deserialize_with = "lenient_bool")]
    pub crc_ok: Option<bool>,
    #[serde(rename = "BCH_STATUS", default, deserialize_with = "lenient_i64")]
    pub bch_status: Option<i64>,
    #[serde(rename = "RAW_DATA", default)]
    pub raw_data: Option<String>,
}

/// Where an entry keeps its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntrySchema {
    /// `RAW_DATA` on the entry itself
    Flat,
    /// `RAW_DATA` under `SENSORS`
    Nested,
}

impl Entry {
    pub fn schema(&self) -> EntrySchema {
        if self.sensors.is_some() {
            EntrySchema::Nested
        } else {
            EntrySchema::Flat
        }
    }

    /// Raw hex payload, taken from `SENSORS` whenever that block is present
    pub fn raw_data(&self) -> Option<&str> {
        match &self.sensors {
            Some(sensors) => sensors.raw_data.as_deref(),
            None => self.raw_data.as_deref(),
        }
    }
}

/// Parse a JSON envelope
pub fn parse_envelope(message: &str) -> Result<RawEnvelope> {
    serde_json::from_str(message).map_err(|e| {
        DecoderError::FormatError(format!("Failed to parse JSON envelope: {}", e))
    })
}

/// Ids arrive as `"205895"` or `401154672` depending on the schema
fn text_or_number<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrNumber {
        Text(String),
        Number(serde_json::Number),
    }

    Ok(Option::<TextOrNumber>::deserialize(deserializer)?.map(|value| match value {
        TextOrNumber::Text(text) => text,
        TextOrNumber::Number(number) => number.to_string(),
    }))
}

/// Metadata value, or `None` if it is absent, null or malformed
fn lenient<'de, D, T>(
    deserializer: D,
    field: &str,
    convert: fn(&Value) -> Option<T>,
) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => return Ok(None),
        Some(value) => value,
    };
    let converted = convert(&value);
    if converted.is_none() {
        log::debug!("Ignoring malformed {} {}", field, value);
    }
    Ok(converted)
}

/// RFC 3339 dates; a date without an offset is taken as UTC
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<Timestamp>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(deserializer, "date", |value| {
        let text = value.as_str()?.trim();
        DateTime::parse_from_rfc3339(text)
            .map(|date| date.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|date| date.and_utc())
            })
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(deserializer, "flag", |value| match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}

fn lenient_i64<'de, D>(deserializer: D) -> std::result::Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    lenient(deserializer, "status", |value| match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    })
}
