//! Frame Decoding Engine
//!
//! Turns one hex payload into a `DecodedFrame`. Sensors write their reading
//! as a text token such as `|45|14.6C` (id 45, 14.6 degrees) somewhere in
//! the user data, and the beacon packs a partial day/hour/minute timestamp
//! after a fixed preamble.

use crate::bits::extract_bits;
use crate::config::TimestampOffsets;
use crate::hex::to_bytes;
use crate::types::{DecodedFrame, DecoderError, FrameTimestamp, Result};
use regex::Regex;
use std::sync::LazyLock;

const DAY_BITS: usize = 5;
const HOUR_BITS: usize = 5;
const MINUTE_BITS: usize = 6;

static READING_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\|([0-9]{1,3})\|([0-9.]{1,5})C").expect("reading pattern is valid")
});

/// Decode a hex payload into a frame
///
/// Only a malformed hex payload is an error. A payload without a reading
/// token yields a zeroed (invalid) frame, and a payload too short to hold
/// the timestamp yields a frame with no timestamp.
pub fn decode_frame(raw_hex_payload: &str, offsets: &TimestampOffsets) -> Result<DecodedFrame> {
    let bytes = to_bytes(raw_hex_payload)?;
    let converted = to_latin1(&bytes);

    let (id, temperature) = find_reading(&converted).unwrap_or((0, 0.0));

    let timestamp = match extract_timestamp(&bytes, offsets) {
        Ok(ts) => Some(ts),
        Err(e @ DecoderError::IndexError { .. }) => {
            log::debug!("Payload {} has no timestamp: {}", raw_hex_payload, e);
            None
        }
        Err(e) => return Err(e),
    };

    Ok(DecodedFrame {
        converted,
        id,
        temperature,
        timestamp,
    })
}

/// Map every byte to the Latin-1 code point of the same value
fn to_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Find the first `|id|temperatureC` token
///
/// Id and temperature are returned together or not at all, so a token
/// whose temperature is not a number (`|12|1.2.3C`) counts as no token.
fn find_reading(converted: &str) -> Option<(u32, f64)> {
    let captures = READING_PATTERN.captures(converted)?;
    let id_text = captures.get(1)?.as_str();
    let temperature_text = captures.get(2)?.as_str();

    match (id_text.parse::<u32>(), temperature_text.parse::<f64>()) {
        (Ok(id), Ok(temperature)) => Some((id, temperature)),
        _ => {
            log::debug!(
                "Ignoring malformed reading token |{}|{}C",
                id_text,
                temperature_text
            );
            None
        }
    }
}

fn extract_timestamp(bytes: &[u8], offsets: &TimestampOffsets) -> Result<FrameTimestamp> {
    Ok(FrameTimestamp {
        day: extract_bits(bytes, offsets.day_bit, DAY_BITS)?,
        hour: extract_bits(bytes, offsets.hour_bit, HOUR_BITS)?,
        minute: extract_bits(bytes, offsets.minute_bit, MINUTE_BITS)?,
    })
}
