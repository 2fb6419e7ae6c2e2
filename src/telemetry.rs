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

//! Read-only telemetry aggregation
//!
//! A snapshot is a monotone partial update: each poll overwrites only the
//! fields the source currently reports, so an absent field keeps its previous
//! value rather than being zeroed. Refresh cadence is owned by the caller;
//! `sample` is a single synchronous entry point safe to drive from any timer.

use serde::Serialize;

use crate::config::SmcConfig;
use crate::fan::{fan_key, semantic_speed};
use crate::store::{RegisterStore, SmcTransport};

/// A data source reporting independently optional numeric fields. Each
/// accessor returns whatever the underlying system currently exposes.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySource {
    fn scheduler_limit(&mut self) -> Option<f64>;
    fn available_cpus(&mut self) -> Option<f64>;
    fn speed_limit(&mut self) -> Option<f64>;
    fn temperature(&mut self) -> Option<f64>;
    fn fan_speed(&mut self) -> Option<f64>;
    fn thermal_pressure(&mut self) -> Option<f64>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetrySnapshot {
    pub scheduler_limit: i32,
    pub available_cpus: i32,
    pub speed_limit: i32,
    pub temperature: i32,
    pub fan_speed: i32,
    pub thermal_pressure: i32,
    /// Fan RPM normalized against the discovered ceiling, 0-100.
    pub fan_speed_percent: i32,
}

/// Find the normalization ceiling: the maximum over the available `F<i>Mx`
/// registers, provided it clears the plausibility threshold; the
/// conservative fallback otherwise. Discovered once per session.
pub fn discover_max_fan_speed<T: SmcTransport>(
    store: &mut RegisterStore<T>,
    config: &SmcConfig,
) -> u32 {
    let mut max = 0.0f64;
    for i in 0..config.max_fan_probe {
        if let Ok(Some(raw)) = store.read(&fan_key(i, "Mx")) {
            if let Ok(Some(v)) = semantic_speed(&raw, config.speed_divisor) {
                max = max.max(v);
            }
        }
    }
    if max > config.min_plausible_ceiling as f64 {
        max.round() as u32
    } else {
        config.max_fan_speed_fallback
    }
}

pub struct TelemetrySampler<S: TelemetrySource> {
    source: S,
    snapshot: TelemetrySnapshot,
    max_fan_speed: u32,
}

impl<S: TelemetrySource> TelemetrySampler<S> {
    /// Build a sampler, discovering the fan-speed ceiling through the given
    /// store up front so `sample` itself never touches the transport.
    pub fn new<T: SmcTransport>(
        source: S,
        store: &mut RegisterStore<T>,
        config: &SmcConfig,
    ) -> Self {
        let max_fan_speed = discover_max_fan_speed(store, config);
        Self::with_ceiling(source, max_fan_speed)
    }

    /// Build a sampler with a known ceiling.
    pub fn with_ceiling(source: S, max_fan_speed: u32) -> Self {
        Self {
            source,
            snapshot: TelemetrySnapshot::default(),
            max_fan_speed: max_fan_speed.max(1),
        }
    }

    pub fn max_fan_speed(&self) -> u32 {
        self.max_fan_speed
    }

    /// Poll the source and return the updated snapshot. Absent fields keep
    /// their previous values.
    pub fn sample(&mut self) -> TelemetrySnapshot {
        if let Some(v) = self.source.scheduler_limit() {
            self.snapshot.scheduler_limit = v.round() as i32;
        }
        if let Some(v) = self.source.available_cpus() {
            self.snapshot.available_cpus = v.round() as i32;
        }
        if let Some(v) = self.source.speed_limit() {
            self.snapshot.speed_limit = v.round() as i32;
        }
        if let Some(v) = self.source.temperature() {
            self.snapshot.temperature = v.round() as i32;
        }
        if let Some(v) = self.source.fan_speed() {
            self.snapshot.fan_speed = v.round() as i32;
        }
        if let Some(v) = self.source.thermal_pressure() {
            self.snapshot.thermal_pressure = v.round() as i32;
        }
        self.snapshot.fan_speed_percent = ((self.snapshot.fan_speed as f64
            / self.max_fan_speed as f64)
            * 100.0)
            .round()
            .clamp(0.0, 100.0) as i32;
        self.snapshot
    }
}
