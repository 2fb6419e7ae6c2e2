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

//! Configuration
//!
//! The core never owns a timer or observes a settings store: the poll
//! interval and all tuning constants are plain configuration passed in at
//! construction. The caller owns the timer lifecycle.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

fn default_refresh_interval_secs() -> u64 {
    2
}

/// Scale factor between RPM and the raw value of ui16/fpe2 speed registers.
///
/// The controller's own expectation here is not reliably known across
/// hardware revisions (raw RPM vs. RPM shifted by 2 bits). 4 matches the
/// common fixed-point layout with 2 fraction bits; validate against real
/// hardware before changing it.
fn default_speed_divisor() -> u32 {
    4
}

fn default_max_fan_speed_fallback() -> u32 {
    6000
}

fn default_min_plausible_ceiling() -> u32 {
    1000
}

fn default_max_fan_probe() -> u8 {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct SmcConfig {
    /// Telemetry poll interval for the externally owned scheduler.
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// RPM divisor for ui16/fpe2 min-speed override writes and fpe2 reads.
    #[serde(default = "default_speed_divisor")]
    pub speed_divisor: u32,
    /// Normalization ceiling when no plausible F*Mx register is found.
    #[serde(default = "default_max_fan_speed_fallback")]
    pub max_fan_speed_fallback: u32,
    /// An F*Mx reading must exceed this to count as a real ceiling.
    #[serde(default = "default_min_plausible_ceiling")]
    pub min_plausible_ceiling: u32,
    /// Number of F<i>Mx keys probed during ceiling discovery.
    #[serde(default = "default_max_fan_probe")]
    pub max_fan_probe: u8,
}

impl Default for SmcConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            speed_divisor: default_speed_divisor(),
            max_fan_speed_fallback: default_max_fan_speed_fallback(),
            min_plausible_ceiling: default_min_plausible_ceiling(),
            max_fan_probe: default_max_fan_probe(),
        }
    }
}

pub fn config_path() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return Path::new(&xdg).join("smcfan").join("config.json");
    }
    if let Ok(home) = env::var("HOME") {
        return Path::new(&home)
            .join(".config")
            .join("smcfan")
            .join("config.json");
    }
    PathBuf::from("/etc/smcfan/config.json")
}

pub fn load_saved_config() -> Option<SmcConfig> {
    let path = config_path();
    let data = fs::read_to_string(&path).ok()?;
    let cfg: SmcConfig = serde_json::from_str(&data).ok()?;
    validate_config(&cfg).ok()?;
    Some(cfg)
}

pub fn save_config(cfg: &SmcConfig) -> io::Result<()> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let json = serde_json::to_string_pretty(cfg).unwrap_or_else(|_| "{}".to_string());
    fs::write(path, json)
}

pub fn validate_config(cfg: &SmcConfig) -> Result<(), String> {
    if cfg.refresh_interval_secs == 0 {
        return Err("refresh_interval_secs must be at least 1".to_string());
    }
    if cfg.speed_divisor == 0 {
        return Err("speed_divisor must be at least 1".to_string());
    }
    if cfg.max_fan_speed_fallback <= cfg.min_plausible_ceiling {
        return Err("max_fan_speed_fallback must exceed min_plausible_ceiling".to_string());
    }
    if cfg.max_fan_probe == 0 {
        return Err("max_fan_probe must be at least 1".to_string());
    }
    Ok(())
}
