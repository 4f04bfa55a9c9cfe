//! Kineis Frame Decoder Library
//!
//! A stateless, reusable library for decoding telemetry frames relayed by
//! the Kineis satellite constellation.
//!
//! # Architecture
//!
//! This library is intentionally minimal and focused on decoding:
//! - Detects JSON vs. CSV envelopes and resolves their schema variants
//! - Converts hex payloads to bytes
//! - Extracts LSB-first bit-fields (the packed day/hour/minute timestamp)
//! - Finds the `|id|temperatureC` reading token written by the sensor
//!
//! The library does NOT:
//! - Archive raw messages
//! - Write readings to any table or store
//! - Initialize logging
//!
//! All of that lives in the application layer (kineis-ingest).
//!
//! # Example Usage
//!
//! ```
//! use kineis_decoder::{decode_frame, TimestampOffsets};
//!
//! let frame = decode_frame(
//!     "005DE952A37EE80186A0387C37397C31302E33324300376461746366030185",
//!     &TimestampOffsets::PREAMBLE_22,
//! )
//! .unwrap();
//!
//! assert!(frame.converted.contains("|79|10.32C"));
//! assert!(frame.is_valid());
//! ```

// Public modules
pub mod bits;
pub mod config;
pub mod decoder;
pub mod envelope;
pub mod frame_decoder;
pub mod hex;
pub mod types;

// Re-export main types for convenience
pub use bits::extract_bits;
pub use config::{DecoderConfig, TimestampOffsets};
pub use decoder::{DecodedEntry, Decoder};
pub use envelope::{normalize, Envelope, EnvelopeFormat, FramePayload};
pub use frame_decoder::decode_frame;
pub use self::hex::{to_bytes, to_hex};
pub use types::{DecodedFrame, DecoderError, FrameTimestamp, Result, Timestamp};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
