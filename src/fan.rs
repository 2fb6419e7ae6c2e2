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

//! Fan control protocol
//!
//! The multi-register state machine for switching a fan between automatic
//! and manual control and commanding a target speed. Fans are addressed by
//! a small index; every register name derives from it (`F<i>Md`, `F<i>Mn`,
//! `F<i>Mx`, `F<i>Tg`).
//!
//! Fail-safe principle: every ambiguous or missing read defaults toward the
//! automatic, non-destructive interpretation (Auto mode, unchanged limits),
//! never toward an assumption that could drive a fan outside its safe range.

use std::collections::HashMap;

use serde_json::json;

use crate::config::SmcConfig;
use crate::error::{Result, SmcError};
use crate::logger;
use crate::store::{RawRegisterValue, RegisterStore, SmcTransport};
use crate::value::{self, TypeTag};

/// Per-fan control state. Created when a fan is first addressed, mutated
/// only by protocol operations and refreshes, discarded with the session.
#[derive(Debug, Clone, PartialEq)]
pub struct FanState {
    pub is_manual: bool,
    pub min_speed: i32,
    pub max_speed: i32,
    pub target_speed: i32,
    /// The controller's own automatic floor, captured on the first
    /// successful min-speed read and never overwritten afterwards. Restored
    /// when manual mode is turned off.
    pub original_min_speed: Option<f64>,
}

impl Default for FanState {
    fn default() -> Self {
        Self {
            is_manual: false,
            min_speed: 0,
            max_speed: 0,
            target_speed: 0,
            original_min_speed: None,
        }
    }
}

/// Outcome of a successful `set_target`. The min-override write is a
/// best-effort side channel; its failure leaves the fan running at the
/// commanded target but must be surfaced distinctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetTargetStatus {
    Applied,
    AppliedWithoutOverride,
}

/// Parse a fan index from a sensor name of the form `F0Ac`, `F1Ac`, ...
pub fn fan_index_from_name(name: &str) -> Option<u8> {
    let rest = name.strip_prefix('F')?;
    rest.chars().next()?.to_digit(10).map(|d| d as u8)
}

/// Derive a fan register name: `fan_key(0, "Md")` is `"F0Md"`.
pub fn fan_key(index: u8, suffix: &str) -> String {
    format!("F{}{}", index, suffix)
}

/// Interpret a limit/speed register as RPM. Fpe2 registers carry the raw
/// fixed-point value and are scaled down by the configured divisor; other
/// known tags are taken at face value. Unknown declared types yield `None`.
pub(crate) fn semantic_speed(raw: &RawRegisterValue, divisor: u32) -> Result<Option<f64>> {
    let Some(tag) = raw.tag else {
        return Ok(None);
    };
    let v = value::decode(tag, &raw.bytes)?;
    Ok(Some(match tag {
        TypeTag::Fpe2 => v / divisor as f64,
        _ => v,
    }))
}

/// Generic integer reading of a mode register. Controllers are inconsistent
/// about whether the mode is reported as 1 or 2 bytes, so both are accepted;
/// an undeclared type falls back on the payload width.
fn mode_value(raw: &RawRegisterValue) -> Option<i64> {
    match raw.tag {
        Some(TypeTag::UInt8) => Some(raw.bytes[0] as i64),
        Some(TypeTag::UInt16) | Some(TypeTag::Fpe2) => {
            Some(u16::from_be_bytes([raw.bytes[0], raw.bytes[1]]) as i64)
        }
        Some(TypeTag::Float32) => value::decode(TypeTag::Float32, &raw.bytes)
            .ok()
            .map(|v| v.round() as i64),
        None => match raw.bytes.as_slice() {
            [b] => Some(*b as i64),
            [hi, lo] => Some(u16::from_be_bytes([*hi, *lo]) as i64),
            _ => None,
        },
    }
}

/// The state machine driving manual fan control over a [`RegisterStore`].
///
/// Owns the store: all register traffic for the controller session funnels
/// through this single context, which is what serializes transport access.
pub struct FanController<T: SmcTransport> {
    store: RegisterStore<T>,
    config: SmcConfig,
    fans: HashMap<u8, FanState>,
}

impl<T: SmcTransport> FanController<T> {
    pub fn new(store: RegisterStore<T>, config: SmcConfig) -> Self {
        Self {
            store,
            config,
            fans: HashMap::new(),
        }
    }

    pub fn config(&self) -> &SmcConfig {
        &self.config
    }

    /// Access the owned store, e.g. for telemetry ceiling discovery. Keeps
    /// all transport traffic funneled through the one owning context.
    pub fn store_mut(&mut self) -> &mut RegisterStore<T> {
        &mut self.store
    }

    pub fn fan(&self, index: u8) -> Option<&FanState> {
        self.fans.get(&index)
    }

    /// Refresh limits, mode, and target for one fan.
    pub fn refresh(&mut self, index: u8) -> Result<()> {
        self.refresh_limits(index)?;
        self.refresh_mode(index)?;
        self.refresh_target(index)
    }

    /// Read `F<i>Mn` and `F<i>Mx`. Missing registers leave prior values
    /// unchanged. The first successful min-speed read captures the
    /// controller's original floor for later restoration; the capture
    /// happens at most once per fan per session.
    pub fn refresh_limits(&mut self, index: u8) -> Result<()> {
        let divisor = self.config.speed_divisor;
        if let Some(raw) = self.store.read(&fan_key(index, "Mn"))? {
            if let Some(v) = semantic_speed(&raw, divisor)? {
                let state = self.fans.entry(index).or_default();
                state.min_speed = v as i32;
                if state.original_min_speed.is_none() {
                    state.original_min_speed = Some(v);
                }
            }
        }
        if let Some(raw) = self.store.read(&fan_key(index, "Mx"))? {
            if let Some(v) = semantic_speed(&raw, divisor)? {
                self.fans.entry(index).or_default().max_speed = v as i32;
            }
        }
        Ok(())
    }

    /// Read `F<i>Md`. Only a decoded value of exactly 1 means manual; any
    /// other value, an unreadable encoding, or a missing register is Auto.
    pub fn refresh_mode(&mut self, index: u8) -> Result<()> {
        let decoded = self
            .store
            .read(&fan_key(index, "Md"))?
            .as_ref()
            .and_then(mode_value);
        self.fans.entry(index).or_default().is_manual = decoded == Some(1);
        Ok(())
    }

    /// Read `F<i>Tg` as RPM when its declared type is Float32; any other
    /// declared type leaves the prior target untouched.
    pub fn refresh_target(&mut self, index: u8) -> Result<()> {
        if let Some(raw) = self.store.read(&fan_key(index, "Tg"))? {
            if raw.tag == Some(TypeTag::Float32) {
                let v = value::decode(TypeTag::Float32, &raw.bytes)?;
                self.fans.entry(index).or_default().target_speed = v.round() as i32;
            }
        }
        Ok(())
    }

    /// Switch a fan between automatic and manual control.
    ///
    /// Disabling manual mode first restores the captured original min-speed
    /// as Float32, so the controller's own floor is back in place before
    /// control is relinquished. That restore is best-effort: its failure is
    /// logged but never blocks the mode write. The single-byte mode write is
    /// the authoritative step; if the controller rejects it, the fan's mode
    /// is reported unchanged and the error returned.
    pub fn toggle_manual(&mut self, index: u8, enable: bool) -> Result<()> {
        if !enable {
            let original = self.fans.get(&index).and_then(|s| s.original_min_speed);
            if let Some(original) = original {
                let min_key = fan_key(index, "Mn");
                let payload = value::encode(TypeTag::Float32, original);
                match self.store.write(&min_key, &payload) {
                    Ok(()) => logger::log_event(
                        "min_restore",
                        json!({ "fan": index, "key": min_key, "rpm": original }),
                    ),
                    Err(e) => logger::log_event(
                        "min_restore_failed",
                        json!({ "fan": index, "key": min_key, "error": e.to_string() }),
                    ),
                }
            }
        }

        let mode_key = fan_key(index, "Md");
        self.store
            .write(&mode_key, &[if enable { 1 } else { 0 }])?;
        self.fans.entry(index).or_default().is_manual = enable;
        Ok(())
    }

    /// Command a target speed in RPM. Only valid in manual mode: the
    /// controller ignores target writes in automatic mode, so the attempt is
    /// reported as `PreconditionNotMet` without touching the transport.
    ///
    /// The target register gets a Float32 payload; its rejection aborts the
    /// whole operation. The min-speed override that forces the controller's
    /// floor up is then written in the min register's own native encoding:
    /// UInt16/Fpe2 registers get `trunc(rpm / divisor)` big-endian, anything
    /// else gets the identical Float32 payload. Controllers expose this
    /// register in inconsistent encodings across hardware revisions, and a
    /// mis-typed payload can produce an out-of-range effective speed.
    ///
    /// Ends with a target read-back rather than trusting the written value;
    /// the controller may clamp.
    pub fn set_target(&mut self, index: u8, rpm: i32) -> Result<SetTargetStatus> {
        let manual = self.fans.get(&index).map(|s| s.is_manual).unwrap_or(false);
        if !manual {
            return Err(SmcError::precondition(format!(
                "fan {} is in automatic mode; target writes have no effect",
                index
            )));
        }

        let float_payload = value::encode(TypeTag::Float32, rpm as f64);
        self.store.write(&fan_key(index, "Tg"), &float_payload)?;

        let min_key = fan_key(index, "Mn");
        let min_tag = self.store.read(&min_key)?.and_then(|r| r.tag);
        let override_payload = match min_tag {
            Some(tag @ (TypeTag::UInt16 | TypeTag::Fpe2)) => {
                value::encode(tag, rpm as f64 / self.config.speed_divisor as f64)
            }
            _ => float_payload.clone(),
        };
        let override_written = self.store.write(&min_key, &override_payload).is_ok();

        self.refresh_target(index)?;

        Ok(if override_written {
            SetTargetStatus::Applied
        } else {
            SetTargetStatus::AppliedWithoutOverride
        })
    }
}
