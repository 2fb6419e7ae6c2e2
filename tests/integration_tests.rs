/*
 * Integration tests for Smcfan
 *
 * These tests drive the fan-control protocol and telemetry sampling
 * end-to-end against the simulated controller, verifying the register
 * traffic each operation produces.
 */

use serial_test::serial;

use smcfan::config::SmcConfig;
use smcfan::error::SmcError;
use smcfan::fan::{FanController, SetTargetStatus};
use smcfan::logger;
use smcfan::sim::{SimulatedSmc, SimulatedTelemetry};
use smcfan::store::RegisterStore;
use smcfan::telemetry::{discover_max_fan_speed, TelemetrySampler};

fn flt(v: f32) -> Vec<u8> {
    v.to_be_bytes().to_vec()
}

fn controller_with(smc: SimulatedSmc) -> FanController<SimulatedSmc> {
    FanController::new(RegisterStore::new(smc), SmcConfig::default())
}

/// A fan bank whose min register is a legacy big-endian ui16.
fn ui16_min_fan() -> SimulatedSmc {
    let mut smc = SimulatedSmc::new();
    smc.seed("F0Md", "ui8 ", vec![0]);
    smc.seed("F0Mn", "ui16", 1200u16.to_be_bytes().to_vec());
    smc.seed_read_only("F0Mx", "ui16", 5800u16.to_be_bytes().to_vec());
    smc.seed("F0Tg", "flt ", flt(0.0));
    smc
}

#[test]
fn test_toggle_cycle_restores_original_min_register() {
    let mut ctl = controller_with(SimulatedSmc::with_fans(1));
    ctl.refresh(0).unwrap();
    assert_eq!(ctl.fan(0).unwrap().original_min_speed, Some(1200.0));

    ctl.toggle_manual(0, true).unwrap();
    ctl.toggle_manual(0, false).unwrap();

    let smc = ctl.store_mut().transport_mut();
    assert_eq!(smc.register_bytes("F0Mn"), Some(flt(1200.0)));
    assert_eq!(smc.accepted_writes_to("F0Mn"), vec![flt(1200.0)]);
}

#[test]
fn test_toggle_off_restores_floor_after_override() {
    let mut ctl = controller_with(SimulatedSmc::with_fans(1));
    ctl.refresh(0).unwrap();
    ctl.toggle_manual(0, true).unwrap();

    // The override forces the floor up to the commanded target
    ctl.set_target(0, 3000).unwrap();
    assert_eq!(
        ctl.store_mut().transport_mut().register_bytes("F0Mn"),
        Some(flt(3000.0))
    );

    // Leaving manual mode puts the controller's own floor back
    ctl.toggle_manual(0, false).unwrap();
    assert_eq!(
        ctl.store_mut().transport_mut().register_bytes("F0Mn"),
        Some(flt(1200.0))
    );
    assert!(!ctl.fan(0).unwrap().is_manual);
}

#[test]
fn test_set_target_in_auto_mode_performs_zero_writes() {
    let mut ctl = controller_with(SimulatedSmc::with_fans(1));
    ctl.refresh(0).unwrap();
    assert!(!ctl.fan(0).unwrap().is_manual);

    let err = ctl.set_target(0, 3000).unwrap_err();
    assert!(matches!(err, SmcError::PreconditionNotMet(_)));
    assert_eq!(ctl.store_mut().transport_mut().write_count(), 0);
}

#[test]
fn test_set_target_ui16_min_gets_scaled_bytes() {
    let mut ctl = controller_with(ui16_min_fan());
    ctl.refresh(0).unwrap();
    ctl.toggle_manual(0, true).unwrap();

    let status = ctl.set_target(0, 3000).unwrap();
    assert_eq!(status, SetTargetStatus::Applied);

    // 3000 / 4 = 750 = 0x02EE, big-endian
    let smc = ctl.store_mut().transport_mut();
    assert_eq!(smc.register_bytes("F0Mn"), Some(vec![0x02, 0xEE]));
    assert_eq!(
        smc.accepted_writes_to("F0Tg"),
        vec![flt(3000.0)],
        "target register still takes the Float32 payload"
    );
}

#[test]
fn test_set_target_float_min_gets_identical_payload() {
    let mut ctl = controller_with(SimulatedSmc::with_fans(1));
    ctl.refresh(0).unwrap();
    ctl.toggle_manual(0, true).unwrap();
    ctl.set_target(0, 3000).unwrap();

    let smc = ctl.store_mut().transport_mut();
    let tg = smc.accepted_writes_to("F0Tg");
    let mn = smc.accepted_writes_to("F0Mn");
    assert_eq!(tg.last(), Some(&flt(3000.0)));
    assert_eq!(mn.last(), Some(&flt(3000.0)), "byte-identical 4-byte payload");
}

#[test]
fn test_set_target_read_back_reflects_controller_clamp() {
    let mut ctl = controller_with(SimulatedSmc::with_fans(1));
    ctl.refresh(0).unwrap();
    ctl.toggle_manual(0, true).unwrap();

    // The simulated controller clamps targets to F0Mx (5927)
    ctl.set_target(0, 8000).unwrap();
    assert_eq!(ctl.fan(0).unwrap().target_speed, 5927);
}

#[test]
fn test_override_rejection_is_surfaced_distinctly() {
    let mut smc = SimulatedSmc::with_fans(1);
    // Re-seed the min register as read-only: the floor write bounces but the
    // fan still runs at the commanded target.
    smc.seed_read_only("F0Mn", "flt ", flt(1200.0));
    let mut ctl = controller_with(smc);
    ctl.refresh(0).unwrap();
    ctl.toggle_manual(0, true).unwrap();

    let status = ctl.set_target(0, 3000).unwrap();
    assert_eq!(status, SetTargetStatus::AppliedWithoutOverride);
    assert_eq!(ctl.fan(0).unwrap().target_speed, 3000);
}

#[test]
fn test_original_min_capture_is_stable_across_refreshes() {
    let mut ctl = controller_with(SimulatedSmc::with_fans(1));
    ctl.refresh(0).unwrap();

    // The controller starts reporting a different minimum
    ctl.store_mut()
        .transport_mut()
        .seed("F0Mn", "flt ", flt(2200.0));
    ctl.refresh_limits(0).unwrap();
    ctl.refresh_limits(0).unwrap();
    assert_eq!(ctl.fan(0).unwrap().min_speed, 2200);

    // Restoration still uses the first captured value
    ctl.toggle_manual(0, true).unwrap();
    ctl.toggle_manual(0, false).unwrap();
    assert_eq!(
        ctl.store_mut().transport_mut().register_bytes("F0Mn"),
        Some(flt(1200.0))
    );
}

#[test]
fn test_rejected_mode_write_leaves_state_unchanged() {
    let mut ctl = controller_with(SimulatedSmc::with_fans(1));
    ctl.refresh(0).unwrap();

    ctl.store_mut().transport_mut().reject_writes();
    let err = ctl.toggle_manual(0, true).unwrap_err();
    assert_eq!(err, SmcError::rejected("F0Md"));
    assert!(!ctl.fan(0).unwrap().is_manual);

    // The controller comes back; the toggle now takes effect
    ctl.store_mut().transport_mut().accept_writes();
    ctl.toggle_manual(0, true).unwrap();
    assert!(ctl.fan(0).unwrap().is_manual);
}

#[test]
fn test_telemetry_ceiling_discovered_from_fan_bank() {
    let mut store = RegisterStore::new(SimulatedSmc::with_fans(2));
    let cfg = SmcConfig::default();
    assert_eq!(discover_max_fan_speed(&mut store, &cfg), 5927);

    let mut sampler = TelemetrySampler::new(SimulatedTelemetry::new(), &mut store, &cfg);
    for _ in 0..4 {
        let snap = sampler.sample();
        assert!((0..=100).contains(&snap.fan_speed_percent));
        assert!(snap.temperature >= 44);
    }
}

#[test]
fn test_telemetry_falls_back_without_plausible_ceiling() {
    let mut store = RegisterStore::new(SimulatedSmc::new());
    let cfg = SmcConfig::default();
    let mut sampler = TelemetrySampler::new(SimulatedTelemetry::new(), &mut store, &cfg);
    assert_eq!(sampler.max_fan_speed(), cfg.max_fan_speed_fallback);
    let snap = sampler.sample();
    assert!(snap.fan_speed > 0);
}

#[test]
#[serial]
fn test_register_transactions_are_logged() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("events.json");
    logger::init_logging_at(&path);

    let mut ctl = controller_with(SimulatedSmc::with_fans(1));
    ctl.refresh(0).unwrap();
    ctl.toggle_manual(0, true).unwrap();
    logger::shutdown_logging();

    let contents = std::fs::read_to_string(&path).unwrap();
    let events: Vec<serde_json::Value> = contents
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert!(events
        .iter()
        .any(|e| e["event"] == "smc_read" && e["data"]["key"] == "F0Mn"));
    assert!(events
        .iter()
        .any(|e| e["event"] == "smc_write"
            && e["data"]["key"] == "F0Md"
            && e["data"]["accepted"] == true));
}
