//! Main decoder API
//!
//! The `Decoder` struct is the entry point: it normalizes a received
//! message and decodes every entry with the configured timestamp layout.

use crate::config::DecoderConfig;
use crate::envelope::{self, FramePayload};
use crate::frame_decoder::decode_frame;
use crate::types::{DecodedFrame, Result};

/// One normalized entry together with its decode outcome
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEntry {
    pub payload: FramePayload,
    /// Per-entry result; a bad hex payload fails only this entry
    pub frame: Result<DecodedFrame>,
}

impl DecodedEntry {
    /// The decoded frame, if decoding succeeded and the reading is valid
    pub fn valid_frame(&self) -> Option<&DecodedFrame> {
        self.frame.as_ref().ok().filter(|frame| frame.is_valid())
    }
}

/// The main decoder struct - stateless, safe to share across threads
#[derive(Debug, Clone)]
pub struct Decoder {
    config: DecoderConfig,
}

impl Decoder {
    /// Create a new decoder instance
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Normalize a message into its payloads without decoding them
    pub fn normalize(&self, message: &str) -> Result<Vec<FramePayload>> {
        envelope::normalize(message)
    }

    /// Decode a single hex payload
    pub fn decode_payload(&self, raw_hex_payload: &str) -> Result<DecodedFrame> {
        decode_frame(raw_hex_payload, &self.config.timestamp_offsets)
    }

    /// Decode one normalized entry, logging the outcome
    pub fn decode_entry(&self, payload: FramePayload) -> DecodedEntry {
        let frame = self.decode_payload(&payload.raw_data);
        match &frame {
            Ok(decoded) => log::info!(
                "Received raw data {} which converted to {:?}, Id: {}, Temperature: {}, IsValid: {}",
                payload.raw_data,
                decoded.converted,
                decoded.id,
                decoded.temperature,
                decoded.is_valid()
            ),
            Err(e) => log::warn!(
                "Failed to decode raw data {:?} from device {}: {}",
                payload.raw_data,
                payload.device_id,
                e
            ),
        }
        DecodedEntry { payload, frame }
    }

    /// Decode every entry of a received message, in source order
    ///
    /// # Returns
    /// * `Err(FormatError)` if the envelope itself cannot be parsed
    /// * `Ok(entries)` otherwise, each carrying its own decode result
    ///
    /// # Example
    /// ```
    /// use kineis_decoder::{Decoder, DecoderConfig, TimestampOffsets};
    ///
    /// let decoder = Decoder::new(DecoderConfig::new(TimestampOffsets::PREAMBLE_22));
    /// let message = r#"{"TYPE":"DEVICE_RAW","MODE":"BASIC","VERSION":1,"DATA":[
    ///     {"DEVICE_ID":"205895","MSG_ID":401154672,
    ///      "RAW_DATA":"005DE952A37EE80186A0387C37397C31302E33324300376461746366030185"}]}"#;
    ///
    /// let entries = decoder.decode_message(message).unwrap();
    /// let frame = entries[0].valid_frame().unwrap();
    /// assert_eq!(frame.id, 79);
    /// assert_eq!(frame.temperature, 10.32);
    /// ```
    pub fn decode_message(&self, message: &str) -> Result<Vec<DecodedEntry>> {
        let payloads = self.normalize(message)?;
        Ok(payloads
            .into_iter()
            .map(|payload| self.decode_entry(payload))
            .collect())
    }
}
