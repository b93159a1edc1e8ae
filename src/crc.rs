// SPDX-License-Identifier: MIT OR Apache-2.0
//! CRC16-CCITT (polynomial 0x1021, seed 0xFFFF, no reflection, no final XOR).
//!
//! `CRC_16_IBM_3740` in the `crc` crate's catalog is the table-driven form
//! of the same bit-serial algorithm: same polynomial, seed, and reflection
//! settings. The two must agree bit-for-bit on every input.

use crc::{Crc, CRC_16_IBM_3740};

const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_IBM_3740);

/// Computes CRC16-CCITT over `data`.
#[must_use]
pub fn checksum(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

/// Formats a CRC16 value as exactly four lowercase hex digits.
#[must_use]
pub fn to_hex(crc: u16) -> String {
    format!("{crc:04x}")
}

/// Parses exactly four lowercase (or uppercase) hex digits into a CRC16 value.
pub fn from_hex(s: &str) -> Option<u16> {
    if s.len() != 4 {
        return None;
    }
    u16::from_str_radix(s, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rstest::rstest]
    #[case(b"", "1d0f")]
    #[case(b"A", "58e5")]
    #[case(b"123456789", "29b1")]
    fn known_vectors(#[case] input: &[u8], #[case] expected: &str) {
        assert_eq!(to_hex(checksum(input)), expected);
    }

    /// Same algorithm spelled out bit by bit, to pin the table-driven
    /// implementation to the exact bit ordering the wire format expects.
    fn bit_serial(data: &[u8]) -> u16 {
        let mut crc: u16 = 0xFFFF;
        for &byte in data {
            crc ^= (byte as u16) << 8;
            for _ in 0..8 {
                if crc & 0x8000 != 0 {
                    crc = (crc << 1) ^ 0x1021;
                } else {
                    crc <<= 1;
                }
            }
        }
        crc
    }

    #[rstest::rstest]
    #[case(&[])]
    #[case(b"A")]
    #[case(b"123456789")]
    #[case(b"hello, lora")]
    #[case(&[0u8; 150])]
    fn bit_serial_reference_matches_table_driven(#[case] sample: &[u8]) {
        assert_eq!(bit_serial(sample), checksum(sample));
    }

    #[rstest::rstest]
    #[case(0u16)]
    #[case(1)]
    #[case(0xffff)]
    #[case(0x29b1)]
    fn hex_round_trip(#[case] v: u16) {
        assert_eq!(from_hex(&to_hex(v)), Some(v));
    }

    #[rstest::rstest]
    #[case("1d0")]
    #[case("1d0ff")]
    #[case("zzzz")]
    fn from_hex_rejects_wrong_width(#[case] s: &str) {
        assert_eq!(from_hex(s), None);
    }
}
