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

//! Key name to key code translation
//!
//! SMC registers are addressed by 4-character ASCII names packed MSB-first
//! into a 32-bit code. Encoding is a bijection over 4-ASCII-byte strings;
//! anything else has no valid code.

use crate::error::{Result, SmcError};

/// A 32-bit addressable register code derived from a 4-character ASCII name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyCode(pub u32);

impl KeyCode {
    /// Pack a 4-character ASCII key name MSB-first into a 32-bit code.
    ///
    /// Any other length, or non-ASCII content, yields `InvalidKeyName`.
    /// Callers must treat that as a no-op, not a fatal condition.
    pub fn encode(name: &str) -> Result<KeyCode> {
        let bytes = name.as_bytes();
        if bytes.len() != 4 || !bytes.iter().all(|b| b.is_ascii()) {
            return Err(SmcError::InvalidKeyName(name.to_string()));
        }
        Ok(KeyCode(u32::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3],
        ])))
    }

    /// Recover the 4-character ASCII name. Total inverse of `encode`.
    pub fn decode(self) -> String {
        let b = self.0.to_be_bytes();
        b.iter().map(|&c| c as char).collect()
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.decode())
    }
}
