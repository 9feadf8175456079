//! Bitfield extraction
//!
//! Pulls raw integers out of payload bytes. Bit positions use DBC numbering:
//! bit `n` lives in byte `n / 8` at position `n % 8`, where position 0 is the
//! least significant bit of that byte.
//!
//! - Little-endian (Intel) signals name their LSB as the start bit and grow
//!   towards higher bit numbers.
//! - Big-endian (Motorola) signals name their MSB as the start bit, walk down
//!   to bit 0 of that byte and continue at bit 7 of the next byte.
//!
//! These functions trust their caller: the bit range must already have been
//! checked against the payload with [`required_bytes`]. The dispatch table
//! does that once when it is built, so nothing is checked per frame.

use crate::signals::database::ByteOrder;

/// Number of payload bytes a signal touches, counted from byte 0
///
/// Used at table construction to reject signals that do not fit inside their
/// message.
pub fn required_bytes(start_bit: u16, length: u16, byte_order: ByteOrder) -> usize {
    let start_bit = start_bit as usize;
    let length = length as usize;
    if length == 0 {
        return 0;
    }

    match byte_order {
        ByteOrder::LittleEndian => (start_bit + length - 1) / 8 + 1,
        ByteOrder::BigEndian => {
            let first_byte = start_bit / 8;
            let bits_in_first = start_bit % 8 + 1;
            if length <= bits_in_first {
                first_byte + 1
            } else {
                let remaining = length - bits_in_first;
                first_byte + 1 + (remaining + 7) / 8
            }
        }
    }
}

/// Extract the raw unsigned value of a signal
///
/// # Panics
/// Panics if the bit range reaches past the end of `data`. Callers validate
/// ranges up front with [`required_bytes`].
pub fn extract(data: &[u8], start_bit: u16, length: u16, byte_order: ByteOrder) -> u64 {
    match byte_order {
        ByteOrder::LittleEndian => extract_little_endian(data, start_bit, length),
        ByteOrder::BigEndian => extract_big_endian(data, start_bit, length),
    }
}

/// Walk upward from the LSB, one byte-sized span at a time
fn extract_little_endian(data: &[u8], start_bit: u16, length: u16) -> u64 {
    let mut result: u64 = 0;
    let mut byte_idx = (start_bit / 8) as usize;
    let mut bit_in_byte = (start_bit % 8) as u32;
    let mut value_shift: u32 = 0;
    let mut remaining = length as u32;

    while remaining > 0 {
        let num_bits = (8 - bit_in_byte).min(remaining);
        let mask = ((1u16 << num_bits) - 1) as u8;
        let bits = (data[byte_idx] >> bit_in_byte) & mask;
        result |= (bits as u64) << value_shift;

        value_shift += num_bits;
        remaining -= num_bits;
        byte_idx += 1;
        bit_in_byte = 0;
    }

    result
}

/// Walk downward from the MSB; the first span holds the top bits
fn extract_big_endian(data: &[u8], start_bit: u16, length: u16) -> u64 {
    let mut result: u64 = 0;
    let mut byte_idx = (start_bit / 8) as usize;
    let mut bit_in_byte = (start_bit % 8) as u32;
    let mut remaining = length as u32;

    while remaining > 0 {
        let num_bits = (bit_in_byte + 1).min(remaining);
        let bit_offset = bit_in_byte + 1 - num_bits;
        remaining -= num_bits;

        let mask = ((1u16 << num_bits) - 1) as u8;
        let bits = (data[byte_idx] >> bit_offset) & mask;
        result |= (bits as u64) << remaining;

        byte_idx += 1;
        bit_in_byte = 7;
    }

    result
}

/// Sign-extend a value from N bits to 64 bits
///
/// If the value's top bit is set, the upper bits are filled with ones
/// (two's complement).
pub fn sign_extend(value: u64, bit_length: u16) -> i64 {
    if bit_length == 0 || bit_length >= 64 {
        return value as i64;
    }

    let shift = 64 - bit_length as u32;
    ((value << shift) as i64) >> shift
}

/// Inverse of [`extract`], only needed to build test payloads
#[cfg(test)]
pub(crate) fn insert(data: &mut [u8], start_bit: u16, length: u16, byte_order: ByteOrder, raw: u64) {
    let mut byte_idx = (start_bit / 8) as usize;
    let mut bit_in_byte = (start_bit % 8) as u32;
    let mut remaining = length as u32;
    let mut value_shift: u32 = 0;

    while remaining > 0 {
        let (num_bits, bit_offset, shift) = match byte_order {
            ByteOrder::LittleEndian => {
                let n = (8 - bit_in_byte).min(remaining);
                let shift = value_shift;
                value_shift += n;
                (n, bit_in_byte, shift)
            }
            ByteOrder::BigEndian => {
                let n = (bit_in_byte + 1).min(remaining);
                (n, bit_in_byte + 1 - n, remaining - n)
            }
        };
        let mask = ((1u16 << num_bits) - 1) as u8;
        let bits = ((raw >> shift) as u8) & mask;
        data[byte_idx] &= !(mask << bit_offset);
        data[byte_idx] |= bits << bit_offset;

        remaining -= num_bits;
        byte_idx += 1;
        bit_in_byte = match byte_order {
            ByteOrder::LittleEndian => 0,
            ByteOrder::BigEndian => 7,
        };
    }
}
