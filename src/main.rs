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

use std::thread;
use std::time::Duration;

use smcfan::config;
use smcfan::fan::{FanController, SetTargetStatus};
use smcfan::logger;
use smcfan::sim::{SimulatedSmc, SimulatedTelemetry};
use smcfan::store::RegisterStore;
use smcfan::telemetry::TelemetrySampler;

const FAN_COUNT: u8 = 2;
const TELEMETRY_SAMPLES: u32 = 5;

fn print_usage() {
    eprintln!("Usage: smcfan [--logging] [--interval SECS] COMMAND");
    eprintln!();
    eprintln!("Commands (run against a simulated controller; real hardware");
    eprintln!("transports are provided by the embedding application):");
    eprintln!("  telemetry            sample thermal telemetry (default)");
    eprintln!("  fans                 show per-fan mode, limits, and target");
    eprintln!("  toggle IDX on|off    switch a fan between manual and automatic");
    eprintln!("  target IDX RPM       command a manual target speed");
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let logging_enabled = args.iter().any(|a| a == "--logging");
    if logging_enabled {
        logger::init_logging();
        logger::log_event("startup", serde_json::json!({ "args": args }));
    }

    let mut cfg = config::load_saved_config().unwrap_or_default();
    if let Some(pos) = args.iter().position(|a| a == "--interval") {
        cfg.refresh_interval_secs = args
            .get(pos + 1)
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| anyhow::anyhow!("--interval requires a number of seconds"))?;
    }
    config::validate_config(&cfg).map_err(|e| anyhow::anyhow!("invalid config: {}", e))?;

    let mut store = RegisterStore::new(SimulatedSmc::with_fans(FAN_COUNT));
    let mut sampler = TelemetrySampler::new(SimulatedTelemetry::new(), &mut store, &cfg);
    let mut controller = FanController::new(store, cfg.clone());

    let command = args
        .iter()
        .skip(1)
        .find(|a| matches!(a.as_str(), "telemetry" | "fans" | "toggle" | "target"));

    match command.map(|s| s.as_str()) {
        None | Some("telemetry") => {
            println!(
                "Sampling telemetry every {}s (ceiling {} RPM)",
                cfg.refresh_interval_secs,
                sampler.max_fan_speed()
            );
            for i in 0..TELEMETRY_SAMPLES {
                let snap = sampler.sample();
                println!(
                    "temp {:>3}°C  fan {:>5} RPM ({:>3}%)  speed limit {:>3}%  pressure {}",
                    snap.temperature,
                    snap.fan_speed,
                    snap.fan_speed_percent,
                    snap.speed_limit,
                    snap.thermal_pressure,
                );
                if i + 1 < TELEMETRY_SAMPLES {
                    thread::sleep(Duration::from_secs(cfg.refresh_interval_secs));
                }
            }
        }
        Some("fans") => {
            for i in 0..FAN_COUNT {
                controller.refresh(i)?;
                let Some(fan) = controller.fan(i) else { continue };
                println!(
                    "fan {}: {}  min {} RPM  max {} RPM  target {} RPM",
                    i,
                    if fan.is_manual { "manual" } else { "auto" },
                    fan.min_speed,
                    fan.max_speed,
                    fan.target_speed,
                );
            }
        }
        Some("toggle") => {
            let (index, enable) = toggle_args(&args)?;
            controller.refresh(index)?;
            controller.toggle_manual(index, enable)?;
            println!(
                "fan {} is now {}",
                index,
                if enable { "manual" } else { "automatic" }
            );
        }
        Some("target") => {
            let (index, rpm) = target_args(&args)?;
            controller.refresh(index)?;
            if !controller.fan(index).map(|f| f.is_manual).unwrap_or(false) {
                controller.toggle_manual(index, true)?;
            }
            let status = controller.set_target(index, rpm)?;
            let fan = controller
                .fan(index)
                .ok_or_else(|| anyhow::anyhow!("fan {} not found", index))?;
            match status {
                SetTargetStatus::Applied => {
                    println!("fan {} target {} RPM (controller reports {})", index, rpm, fan.target_speed)
                }
                SetTargetStatus::AppliedWithoutOverride => {
                    println!(
                        "fan {} target {} RPM, but the min-speed override was rejected; \
                         the controller may drift back down",
                        index, rpm
                    )
                }
            }
        }
        Some(_) => unreachable!(),
    }

    if logging_enabled {
        logger::log_event("shutdown", serde_json::json!({}));
    }
    Ok(())
}

fn toggle_args(args: &[String]) -> anyhow::Result<(u8, bool)> {
    let pos = args.iter().position(|a| a == "toggle").unwrap_or(0);
    let index = parse_fan_index(args.get(pos + 1))?;
    let enable = match args.get(pos + 2).map(|s| s.as_str()) {
        Some("on") => true,
        Some("off") => false,
        _ => anyhow::bail!("toggle requires on|off"),
    };
    Ok((index, enable))
}

fn target_args(args: &[String]) -> anyhow::Result<(u8, i32)> {
    let pos = args.iter().position(|a| a == "target").unwrap_or(0);
    let index = parse_fan_index(args.get(pos + 1))?;
    let rpm = args
        .get(pos + 2)
        .and_then(|s| s.parse::<i32>().ok())
        .ok_or_else(|| anyhow::anyhow!("target requires an RPM value"))?;
    Ok((index, rpm))
}

fn parse_fan_index(arg: Option<&String>) -> anyhow::Result<u8> {
    arg.and_then(|s| s.parse::<u8>().ok())
        .filter(|i| *i < FAN_COUNT)
        .ok_or_else(|| anyhow::anyhow!("fan index must be 0..{}", FAN_COUNT))
}
