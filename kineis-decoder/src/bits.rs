//! Bit-field extraction
//!
//! Frames pack small integers at arbitrary bit offsets. Bits are numbered
//! LSB-first within each byte and concatenated across bytes in payload
//! order: bit `8 * k` is the least significant bit of `bytes[k]`. This is
//! not a big-endian integer view of the payload.

use crate::types::{DecoderError, Result};

/// Widest field that fits the `u8` result
pub const MAX_FIELD_BITS: usize = 8;

/// Extract `number_of_bits` contiguous bits starting at `start_bit`
///
/// The first extracted bit becomes bit 0 of the result. A zero-width
/// request always yields 0, whatever `start_bit` is.
///
/// # Errors
/// * `InvalidBitWidth` if `number_of_bits` is larger than 8
/// * `IndexError` if the field runs past the last payload bit
pub fn extract_bits(bytes: &[u8], start_bit: usize, number_of_bits: usize) -> Result<u8> {
    if number_of_bits == 0 {
        return Ok(0);
    }
    if number_of_bits > MAX_FIELD_BITS {
        return Err(DecoderError::InvalidBitWidth(number_of_bits));
    }

    let available_bits = bytes.len() * 8;
    let in_range = start_bit
        .checked_add(number_of_bits)
        .is_some_and(|end| end <= available_bits);
    if !in_range {
        return Err(DecoderError::IndexError {
            start_bit,
            number_of_bits,
            available_bits,
        });
    }

    let mut result: u8 = 0;
    for i in 0..number_of_bits {
        let bit_pos = start_bit + i;
        let bit_value = (bytes[bit_pos / 8] >> (bit_pos % 8)) & 0x01;
        result |= bit_value << i;
    }

    Ok(result)
}
