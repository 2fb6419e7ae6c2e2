/*
 * This file is part of Smcfan.
 *
 * Copyright (C) 2026 Smcfan contributors
 *
 * Smcfan is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Smcfan is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Smcfan. If not, see <https://www.gnu.org/licenses/>.
 */

//! Typed register value codec
//!
//! Converts between semantic numeric values and the controller's fixed-width
//! big-endian payloads. The declared type of a register is parsed into the
//! closed [`TypeTag`] enum exactly once, at the register-store boundary;
//! everything downstream switches on the tag, never on type-name strings.
//!
//! For `Fpe2` the codec deals in the *raw* unsigned 16-bit value. The scale
//! factor between that raw value and RPM is controller-specific and lives in
//! configuration (`speed_divisor`), applied by the fan protocol depending on
//! which register is being written, never guessed here.

use crate::error::{Result, SmcError};

/// Declared primitive type of a register payload.
///
/// Each tag implies a fixed payload byte width and big-endian byte order for
/// the multi-byte tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    /// Big-endian IEEE-754 single precision, 4 bytes, wire name "flt ".
    Float32,
    /// Unsigned byte, wire name "ui8 ".
    UInt8,
    /// Big-endian unsigned 16-bit, wire name "ui16".
    UInt16,
    /// Controller-specific unsigned fixed point, 2 bytes big-endian,
    /// wire name "fpe2".
    Fpe2,
}

impl TypeTag {
    /// Payload width in bytes implied by the tag.
    pub const fn width(self) -> usize {
        match self {
            TypeTag::Float32 => 4,
            TypeTag::UInt8 => 1,
            TypeTag::UInt16 | TypeTag::Fpe2 => 2,
        }
    }

    /// The 4-character on-wire type name.
    pub const fn name(self) -> &'static str {
        match self {
            TypeTag::Float32 => "flt ",
            TypeTag::UInt8 => "ui8 ",
            TypeTag::UInt16 => "ui16",
            TypeTag::Fpe2 => "fpe2",
        }
    }

    /// Parse a transport-reported type name. Trailing padding is ignored.
    /// Returns `None` for any type this crate does not model.
    pub fn from_name(name: &str) -> Option<TypeTag> {
        match name.trim_end() {
            "flt" => Some(TypeTag::Float32),
            "ui8" => Some(TypeTag::UInt8),
            "ui16" => Some(TypeTag::UInt16),
            "fpe2" => Some(TypeTag::Fpe2),
            _ => None,
        }
    }
}

impl std::fmt::Display for TypeTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name().trim_end())
    }
}

fn check_width(tag: TypeTag, bytes: &[u8]) -> Result<()> {
    if bytes.len() != tag.width() {
        return Err(SmcError::PayloadWidthMismatch {
            tag,
            expected: tag.width(),
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Decode a raw payload into a semantic number.
///
/// Fails with `PayloadWidthMismatch` when the payload length does not match
/// the tag's declared width; never truncates or zero-pads.
pub fn decode(tag: TypeTag, bytes: &[u8]) -> Result<f64> {
    check_width(tag, bytes)?;
    Ok(match tag {
        TypeTag::Float32 => {
            f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f64
        }
        TypeTag::UInt8 => bytes[0] as f64,
        TypeTag::UInt16 | TypeTag::Fpe2 => {
            u16::from_be_bytes([bytes[0], bytes[1]]) as f64
        }
    })
}

/// Encode a semantic number into a raw payload. Inverse of [`decode`].
///
/// For `UInt16` and `Fpe2` the caller supplies a pre-scaled integer value
/// (e.g. RPM already divided by the controller's shift factor). A fractional
/// value truncates toward zero; values outside the integer range saturate at
/// the type bounds.
pub fn encode(tag: TypeTag, value: f64) -> Vec<u8> {
    match tag {
        TypeTag::Float32 => (value as f32).to_be_bytes().to_vec(),
        TypeTag::UInt8 => vec![value.trunc() as u8],
        TypeTag::UInt16 | TypeTag::Fpe2 => {
            (value.trunc() as u16).to_be_bytes().to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_widths() {
        assert_eq!(TypeTag::Float32.width(), 4);
        assert_eq!(TypeTag::UInt8.width(), 1);
        assert_eq!(TypeTag::UInt16.width(), 2);
        assert_eq!(TypeTag::Fpe2.width(), 2);
    }

    #[test]
    fn test_from_name() {
        assert_eq!(TypeTag::from_name("flt "), Some(TypeTag::Float32));
        assert_eq!(TypeTag::from_name("flt"), Some(TypeTag::Float32));
        assert_eq!(TypeTag::from_name("ui8 "), Some(TypeTag::UInt8));
        assert_eq!(TypeTag::from_name("ui16"), Some(TypeTag::UInt16));
        assert_eq!(TypeTag::from_name("fpe2"), Some(TypeTag::Fpe2));
        assert_eq!(TypeTag::from_name("ch8*"), None);
        assert_eq!(TypeTag::from_name("sp78"), None);
        assert_eq!(TypeTag::from_name(""), None);
    }

    #[test]
    fn test_decode_float32() {
        // 3000.0 RPM as big-endian IEEE-754
        let bytes = 3000.0f32.to_be_bytes();
        assert_eq!(decode(TypeTag::Float32, &bytes).unwrap(), 3000.0);
        assert_eq!(decode(TypeTag::Float32, &[0, 0, 0, 0]).unwrap(), 0.0);
    }

    #[test]
    fn test_decode_integers() {
        assert_eq!(decode(TypeTag::UInt8, &[0x01]).unwrap(), 1.0);
        assert_eq!(decode(TypeTag::UInt8, &[0xFF]).unwrap(), 255.0);
        assert_eq!(decode(TypeTag::UInt16, &[0x02, 0xEE]).unwrap(), 750.0);
        assert_eq!(decode(TypeTag::Fpe2, &[0x2E, 0xE0]).unwrap(), 12000.0);
    }

    #[test]
    fn test_decode_width_mismatch() {
        // Wrong-sized payloads always fail, never truncate or pad
        for (tag, bad) in [
            (TypeTag::Float32, vec![0u8; 2]),
            (TypeTag::Float32, vec![0u8; 5]),
            (TypeTag::UInt8, vec![0u8; 2]),
            (TypeTag::UInt16, vec![0u8; 1]),
            (TypeTag::UInt16, vec![0u8; 4]),
            (TypeTag::Fpe2, vec![0u8; 0]),
        ] {
            let err = decode(tag, &bad).unwrap_err();
            assert_eq!(
                err,
                SmcError::PayloadWidthMismatch {
                    tag,
                    expected: tag.width(),
                    actual: bad.len(),
                }
            );
        }
    }

    #[test]
    fn test_encode_round_trip() {
        // encode(decode(b)) reproduces b exactly for flt/ui8/ui16
        let float_cases: [&[u8]; 3] = [
            &3000.0f32.to_be_bytes(),
            &0.25f32.to_be_bytes(),
            &[0x44, 0x9A, 0x40, 0x00], // 1234.0
        ];
        for bytes in float_cases {
            let v = decode(TypeTag::Float32, bytes).unwrap();
            assert_eq!(encode(TypeTag::Float32, v), bytes);
        }
        for b in [0u8, 1, 42, 255] {
            let v = decode(TypeTag::UInt8, &[b]).unwrap();
            assert_eq!(encode(TypeTag::UInt8, v), vec![b]);
        }
        for raw in [0u16, 1, 750, 3000, u16::MAX] {
            let bytes = raw.to_be_bytes();
            let v = decode(TypeTag::UInt16, &bytes).unwrap();
            assert_eq!(encode(TypeTag::UInt16, v), bytes.to_vec());
        }
    }

    #[test]
    fn test_encode_truncates_toward_zero() {
        // Fractional semantic values truncate, they do not round; this
        // affects actuator accuracy and is part of the contract.
        assert_eq!(encode(TypeTag::UInt16, 750.99), vec![0x02, 0xEE]);
        assert_eq!(encode(TypeTag::Fpe2, 750.25), vec![0x02, 0xEE]);
        assert_eq!(encode(TypeTag::UInt8, 1.9), vec![0x01]);
    }

    #[test]
    fn test_encode_saturates_at_bounds() {
        assert_eq!(encode(TypeTag::UInt8, 300.0), vec![0xFF]);
        assert_eq!(encode(TypeTag::UInt8, -1.0), vec![0x00]);
        assert_eq!(encode(TypeTag::UInt16, 70000.0), vec![0xFF, 0xFF]);
    }
}
