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

//! Register store: the single facade over the controller transport
//!
//! All reads and writes to the key-value service go through here, so the
//! name-to-code translation, type-name parsing, width checking, error
//! normalization, and transaction logging happen in exactly one place.
//! No business logic lives in this module.

use serde_json::json;

use crate::error::{Result, SmcError};
use crate::key::KeyCode;
use crate::logger;
use crate::value::TypeTag;

/// One register as the transport reports it: addressable code, declared
/// type-name string, and the raw payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeyInfo {
    pub code: u32,
    pub type_name: String,
    pub data: Vec<u8>,
}

/// The opaque key-value service talking to controller hardware.
///
/// Lookup is by code via a predicate over the controller's key list, not by
/// name. Writes report acceptance only; a `false` return must never be
/// assumed to have taken effect. Calls must be serialized per controller;
/// the owning [`RegisterStore`] is the funnel that guarantees it.
pub trait SmcTransport {
    fn read_keys(&mut self, predicate: &dyn Fn(u32) -> bool) -> Vec<RawKeyInfo>;
    fn write_key(&mut self, code: u32, data: &[u8]) -> bool;
}

/// A register after store-boundary normalization: key code, declared type
/// parsed into the closed [`TypeTag`] enum (`None` for types this crate does
/// not model), and the payload.
///
/// When the tag is known the payload length always equals the tag's width;
/// a mismatch is rejected at the boundary, never truncated or padded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRegisterValue {
    pub key: KeyCode,
    pub tag: Option<TypeTag>,
    pub bytes: Vec<u8>,
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

pub struct RegisterStore<T: SmcTransport> {
    transport: T,
}

impl<T: SmcTransport> RegisterStore<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Read one register by key name.
    ///
    /// `Ok(None)` means the controller has no such register, which is an
    /// expected outcome for the many optional keys; callers skip the update.
    pub fn read(&mut self, name: &str) -> Result<Option<RawRegisterValue>> {
        let code = KeyCode::encode(name)?;
        let found = self
            .transport
            .read_keys(&|c| c == code.0)
            .into_iter()
            .next();

        let Some(info) = found else {
            logger::log_event("smc_read", json!({ "key": name, "found": false }));
            return Ok(None);
        };

        let tag = TypeTag::from_name(&info.type_name);
        if let Some(tag) = tag {
            if info.data.len() != tag.width() {
                logger::log_event(
                    "smc_read",
                    json!({
                        "key": name,
                        "found": true,
                        "type": info.type_name,
                        "error": "width mismatch",
                        "len": info.data.len(),
                    }),
                );
                return Err(SmcError::PayloadWidthMismatch {
                    tag,
                    expected: tag.width(),
                    actual: info.data.len(),
                });
            }
        }

        logger::log_event(
            "smc_read",
            json!({
                "key": name,
                "found": true,
                "type": info.type_name,
                "data": hex(&info.data),
            }),
        );
        Ok(Some(RawRegisterValue {
            key: code,
            tag,
            bytes: info.data,
        }))
    }

    /// Write raw bytes to a register. No retry, no queuing; a rejected write
    /// is reported upward and must not be assumed to have taken effect.
    pub fn write(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        let code = KeyCode::encode(name)?;
        let accepted = self.transport.write_key(code.0, bytes);
        logger::log_event(
            "smc_write",
            json!({
                "key": name,
                "data": hex(bytes),
                "accepted": accepted,
            }),
        );
        if accepted {
            Ok(())
        } else {
            Err(SmcError::rejected(name))
        }
    }
}
