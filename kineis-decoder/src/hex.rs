//! Hex payload conversion
//!
//! Frames travel as hex text (`18AFEA...`). Each consecutive pair of
//! characters is one byte, left to right.

use crate::types::{DecoderError, Result};

/// Convert a hex payload into its bytes
///
/// Accepts upper- and lower-case digits. Fails with `FormatError` when the
/// payload has an odd length or contains a non-hex character.
pub fn to_bytes(hex: &str) -> Result<Vec<u8>> {
    ::hex::decode(hex).map_err(|e| {
        DecoderError::FormatError(format!("Invalid hex payload {:?}: {}", hex, e))
    })
}

/// Encode bytes back into upper-case hex
pub fn to_hex(bytes: &[u8]) -> String {
    ::hex::encode_upper(bytes)
}
