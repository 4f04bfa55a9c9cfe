//! Core types for the Kineis frame decoder library
//!
//! This module defines the types the decoder emits when processing a
//! received message. The decoder is stateless and only outputs decoded
//! frames - it does not store readings or talk to any sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used for envelope dates
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Errors that can occur during decoding
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecoderError {
    /// Malformed hex payload or unparsable envelope
    #[error("Format error: {0}")]
    FormatError(String),

    /// Bit-field request reaches past the end of the payload
    #[error("{number_of_bits} bits at bit {start_bit} exceed payload of {available_bits} bits")]
    IndexError {
        start_bit: usize,
        number_of_bits: usize,
        available_bits: usize,
    },

    /// Bit-field wider than one byte
    #[error("Invalid bit width: {0} (at most 8 bits fit in the result)")]
    InvalidBitWidth(usize),
}

impl DecoderError {
    /// True for malformed hex or envelope input
    pub fn is_format_error(&self) -> bool {
        matches!(self, DecoderError::FormatError(_))
    }
}

/// Compact partial timestamp packed into a frame
///
/// Values are the raw bit-fields; no calendar range check is applied, so a
/// day of 0 or 31+ is reported as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameTimestamp {
    /// Day of month (5 bits)
    pub day: u8,
    /// Hour of day (5 bits)
    pub hour: u8,
    /// Minute of hour (6 bits)
    pub minute: u8,
}

impl fmt::Display for FrameTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {} {:02}:{:02}", self.day, self.hour, self.minute)
    }
}

/// One decoded telemetry frame - the primary output of the decoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedFrame {
    /// Payload bytes reinterpreted as Latin-1 text
    pub converted: String,
    /// Sensor id from the `|id|temp C` token (0 when absent)
    pub id: u32,
    /// Temperature from the token (0.0 when absent)
    pub temperature: f64,
    /// Partial timestamp; `None` when the payload is shorter than the preamble
    pub timestamp: Option<FrameTimestamp>,
}

impl DecodedFrame {
    /// Whether this frame carries a usable reading.
    ///
    /// A missing token and a token with a zero id or non-positive
    /// temperature are both reported as invalid.
    pub fn is_valid(&self) -> bool {
        self.id != 0 && self.temperature > 0.0
    }

    pub fn day(&self) -> Option<u8> {
        self.timestamp.map(|t| t.day)
    }

    pub fn hour(&self) -> Option<u8> {
        self.timestamp.map(|t| t.hour)
    }

    pub fn minute(&self) -> Option<u8> {
        self.timestamp.map(|t| t.minute)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u32, temperature: f64) -> DecodedFrame {
        DecodedFrame {
            converted: String::new(),
            id,
            temperature,
            timestamp: None,
        }
    }

    #[test]
    fn test_validity_rule() {
        assert!(frame(79, 10.32).is_valid());
        assert!(!frame(0, 10.32).is_valid());
        assert!(!frame(79, 0.0).is_valid());
        assert!(!frame(0, 0.0).is_valid());
    }

    #[test]
    fn test_timestamp_accessors() {
        let mut decoded = frame(1, 1.0);
        assert_eq!(decoded.day(), None);

        decoded.timestamp = Some(FrameTimestamp { day: 31, hour: 7, minute: 63 });
        assert_eq!(decoded.day(), Some(31));
        assert_eq!(decoded.hour(), Some(7));
        assert_eq!(decoded.minute(), Some(63));
        assert_eq!(format!("{}", decoded.timestamp.unwrap()), "day 31 07:63");
    }

    #[test]
    fn test_error_display() {
        let err = DecoderError::IndexError {
            start_bit: 32,
            number_of_bits: 6,
            available_bits: 32,
        };
        assert_eq!(err.to_string(), "6 bits at bit 32 exceed payload of 32 bits");
        assert!(!err.is_format_error());
        assert!(DecoderError::FormatError("odd length".into()).is_format_error());
    }
}
