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

//! Unified error handling for Smcfan
//!
//! A single error type used across all components. Codec errors
//! (`InvalidKeyName`, `PayloadWidthMismatch`) indicate a key-table bug and
//! should be surfaced loudly by callers; transport outcomes (`WriteRejected`)
//! are ordinary runtime conditions to react to. An absent register is not an
//! error at all: reads return `Ok(None)` for it.

use crate::value::TypeTag;

/// Result type alias using SmcError
pub type Result<T> = std::result::Result<T, SmcError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SmcError {
    #[error("Invalid key name {0:?}: must be exactly 4 ASCII characters")]
    InvalidKeyName(String),

    #[error("Payload width mismatch for {tag}: expected {expected} bytes, got {actual}")]
    PayloadWidthMismatch {
        tag: TypeTag,
        expected: usize,
        actual: usize,
    },

    #[error("Write to key {key} rejected by controller")]
    WriteRejected { key: String },

    #[error("Precondition not met: {0}")]
    PreconditionNotMet(String),
}

impl SmcError {
    /// Create a precondition error from a string
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::PreconditionNotMet(msg.into())
    }

    /// Create a rejected-write error for a key name
    pub fn rejected(key: impl Into<String>) -> Self {
        Self::WriteRejected { key: key.into() }
    }
}
