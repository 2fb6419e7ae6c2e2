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

//! Simulated controller
//!
//! An in-memory transport and telemetry source standing in for real
//! hardware. Used by the demo binary and by tests that need to observe
//! exactly which registers a protocol operation touched.
//!
//! The simulation mimics controller behavior that matters to the protocol:
//! writes to unknown or read-only keys are rejected, payload width must
//! match the register, and float target writes are clamped to the fan's
//! maximum the way real controllers clamp.

use std::collections::BTreeMap;

use crate::fan::fan_key;
use crate::key::KeyCode;
use crate::store::{RawKeyInfo, SmcTransport};
use crate::telemetry::TelemetrySource;

#[derive(Debug, Clone)]
struct SimRegister {
    type_name: String,
    data: Vec<u8>,
    read_only: bool,
}

/// One observed `write_key` call, accepted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRecord {
    pub key: String,
    pub data: Vec<u8>,
    pub accepted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SimulatedSmc {
    registers: BTreeMap<u32, SimRegister>,
    writes: Vec<WriteRecord>,
    reject_all: bool,
}

impl SimulatedSmc {
    pub fn new() -> Self {
        Self::default()
    }

    /// A controller with `count` fans in the modern all-float layout:
    /// `F<i>Ac`/`F<i>Mx` read-only, `F<i>Md` a writable ui8, `F<i>Mn` and
    /// `F<i>Tg` writable floats.
    pub fn with_fans(count: u8) -> Self {
        let mut smc = Self::new();
        for i in 0..count {
            let actual = 1210.0f32 + 37.0 * i as f32;
            smc.seed_read_only(&fan_key(i, "Ac"), "flt ", actual.to_be_bytes().to_vec());
            smc.seed(&fan_key(i, "Md"), "ui8 ", vec![0]);
            smc.seed(&fan_key(i, "Mn"), "flt ", 1200.0f32.to_be_bytes().to_vec());
            smc.seed_read_only(&fan_key(i, "Mx"), "flt ", 5927.0f32.to_be_bytes().to_vec());
            smc.seed(&fan_key(i, "Tg"), "flt ", 0.0f32.to_be_bytes().to_vec());
        }
        smc
    }

    /// Insert or replace a writable register.
    ///
    /// Panics on a key name that is not 4 ASCII characters; seeding is
    /// fixture setup, not a runtime path.
    pub fn seed(&mut self, name: &str, type_name: &str, data: Vec<u8>) {
        self.insert(name, type_name, data, false);
    }

    /// Insert or replace a register that rejects all writes.
    pub fn seed_read_only(&mut self, name: &str, type_name: &str, data: Vec<u8>) {
        self.insert(name, type_name, data, true);
    }

    fn insert(&mut self, name: &str, type_name: &str, data: Vec<u8>, read_only: bool) {
        let code = match KeyCode::encode(name) {
            Ok(code) => code.0,
            Err(e) => panic!("invalid simulated key: {}", e),
        };
        self.registers.insert(
            code,
            SimRegister {
                type_name: type_name.to_string(),
                data,
                read_only,
            },
        );
    }

    pub fn remove(&mut self, name: &str) {
        if let Ok(code) = KeyCode::encode(name) {
            self.registers.remove(&code.0);
        }
    }

    /// Reject every subsequent write, as a wedged or locked-down controller
    /// would. Attempts are still recorded.
    pub fn reject_writes(&mut self) {
        self.reject_all = true;
    }

    pub fn accept_writes(&mut self) {
        self.reject_all = false;
    }

    /// Every `write_key` call observed so far, in order.
    pub fn writes(&self) -> &[WriteRecord] {
        &self.writes
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Payloads of accepted writes to one key, in order.
    pub fn accepted_writes_to(&self, name: &str) -> Vec<Vec<u8>> {
        self.writes
            .iter()
            .filter(|w| w.accepted && w.key == name)
            .map(|w| w.data.clone())
            .collect()
    }

    /// Current payload of a register, if present.
    pub fn register_bytes(&self, name: &str) -> Option<Vec<u8>> {
        let code = KeyCode::encode(name).ok()?;
        self.registers.get(&code.0).map(|r| r.data.clone())
    }

    /// Clamp a float target write to the owning fan's `F<i>Mx`, like real
    /// controllers do. Returns the replacement payload when clamping bites.
    fn clamp_target(&self, name: &str, data: &[u8]) -> Option<Vec<u8>> {
        if !name.ends_with("Tg") {
            return None;
        }
        let index = name.strip_prefix('F')?.chars().next()?.to_digit(10)?;
        let bytes: [u8; 4] = data.try_into().ok()?;
        let requested = f32::from_be_bytes(bytes);

        let max_code = KeyCode::encode(&fan_key(index as u8, "Mx")).ok()?;
        let mx = self.registers.get(&max_code.0)?;
        if mx.type_name.trim_end() != "flt" || mx.data.len() != 4 {
            return None;
        }
        let max = f32::from_be_bytes([mx.data[0], mx.data[1], mx.data[2], mx.data[3]]);
        let clamped = requested.clamp(0.0, max);
        if clamped != requested {
            Some(clamped.to_be_bytes().to_vec())
        } else {
            None
        }
    }
}

impl SmcTransport for SimulatedSmc {
    fn read_keys(&mut self, predicate: &dyn Fn(u32) -> bool) -> Vec<RawKeyInfo> {
        self.registers
            .iter()
            .filter(|(code, _)| predicate(**code))
            .map(|(code, reg)| RawKeyInfo {
                code: *code,
                type_name: reg.type_name.clone(),
                data: reg.data.clone(),
            })
            .collect()
    }

    fn write_key(&mut self, code: u32, data: &[u8]) -> bool {
        let name = KeyCode(code).decode();
        let mut payload = data.to_vec();
        let accepted = if self.reject_all {
            false
        } else {
            match self.registers.get(&code) {
                Some(reg) if !reg.read_only && reg.data.len() == data.len() => {
                    if reg.type_name.trim_end() == "flt" {
                        if let Some(clamped) = self.clamp_target(&name, data) {
                            payload = clamped;
                        }
                    }
                    true
                }
                _ => false,
            }
        };
        if accepted {
            if let Some(reg) = self.registers.get_mut(&code) {
                reg.data = payload;
            }
        }
        self.writes.push(WriteRecord {
            key: name,
            data: data.to_vec(),
            accepted,
        });
        accepted
    }
}

/// A deterministic telemetry source for the demo binary: values drift with a
/// tick counter, and the pressure field drops out every other poll to show
/// partial updates.
#[derive(Debug, Clone, Default)]
pub struct SimulatedTelemetry {
    tick: u64,
}

impl SimulatedTelemetry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TelemetrySource for SimulatedTelemetry {
    fn scheduler_limit(&mut self) -> Option<f64> {
        Some(100.0)
    }

    fn available_cpus(&mut self) -> Option<f64> {
        Some(8.0)
    }

    fn speed_limit(&mut self) -> Option<f64> {
        Some(if self.tick % 7 == 6 { 75.0 } else { 100.0 })
    }

    fn temperature(&mut self) -> Option<f64> {
        Some(44.0 + (self.tick % 8) as f64 * 1.5)
    }

    fn fan_speed(&mut self) -> Option<f64> {
        // Last call of a poll round advances the tick
        let rpm = 1200.0 + (self.tick % 6) as f64 * 220.0;
        self.tick += 1;
        Some(rpm)
    }

    fn thermal_pressure(&mut self) -> Option<f64> {
        if self.tick % 2 == 0 {
            Some((self.tick % 4) as f64)
        } else {
            None
        }
    }
}
