//! Decoder configuration types
//!
//! The only frame-format knob is where the partial timestamp sits after the
//! preamble. Two layouts have been seen in the field and neither is assumed,
//! so callers always pick one explicitly.

use serde::{Deserialize, Serialize};

/// Bit offsets of the day/hour/minute fields inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimestampOffsets {
    /// Start bit of the 5-bit day field
    pub day_bit: usize,
    /// Start bit of the 5-bit hour field
    pub hour_bit: usize,
    /// Start bit of the 6-bit minute field
    pub minute_bit: usize,
}

impl TimestampOffsets {
    /// Layout with the timestamp starting at bit 22
    pub const PREAMBLE_22: TimestampOffsets = TimestampOffsets::new(22, 27, 32);

    /// Layout with the timestamp starting at bit 24
    pub const PREAMBLE_24: TimestampOffsets = TimestampOffsets::new(24, 29, 34);

    pub const fn new(day_bit: usize, hour_bit: usize, minute_bit: usize) -> Self {
        Self {
            day_bit,
            hour_bit,
            minute_bit,
        }
    }
}

/// Configuration for the decoder library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Where to find the packed timestamp in each frame
    pub timestamp_offsets: TimestampOffsets,
}

impl DecoderConfig {
    /// Create a decoder configuration for the given timestamp layout
    pub fn new(timestamp_offsets: TimestampOffsets) -> Self {
        Self { timestamp_offsets }
    }

    /// Builder method: replace the timestamp layout
    pub fn with_timestamp_offsets(mut self, offsets: TimestampOffsets) -> Self {
        self.timestamp_offsets = offsets;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(TimestampOffsets::PREAMBLE_22, TimestampOffsets::new(22, 27, 32));
        assert_eq!(TimestampOffsets::PREAMBLE_24, TimestampOffsets::new(24, 29, 34));
    }

    #[test]
    fn test_builder() {
        let config = DecoderConfig::new(TimestampOffsets::PREAMBLE_22)
            .with_timestamp_offsets(TimestampOffsets::PREAMBLE_24);
        assert_eq!(config.timestamp_offsets.day_bit, 24);
    }

    #[test]
    fn test_offsets_deserialize() {
        let config: DecoderConfig = serde_json::from_str(
            r#"{"timestamp_offsets":{"day_bit":22,"hour_bit":27,"minute_bit":32}}"#,
        )
        .unwrap();
        assert_eq!(config.timestamp_offsets, TimestampOffsets::PREAMBLE_22);
    }

    #[test]
    fn test_offsets_are_required() {
        let result: std::result::Result<DecoderConfig, _> = serde_json::from_str("{}");
        assert!(result.is_err());
    }
}
