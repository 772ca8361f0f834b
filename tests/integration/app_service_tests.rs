//! Integration tests for the AppService → FSM → actuators pipeline.
//!
//! These run on the host (x86_64) and drive the service the way the
//! firmware main loop does: commands through `handle_command`, time
//! through `tick(now_ms)`, with recording mocks on every port.

use super::mock_hw::{CollectingSink, HwCall, MockHardware, MockNvs};

use stovectl::app::commands::AppCommand;
use stovectl::app::events::AppEvent;
use stovectl::app::ports::{Actuator, ConfigPort};
use stovectl::app::service::AppService;
use stovectl::config::StoveConfig;
use stovectl::fsm::StateId;
use stovectl::fsm::context::StoveStatus;
use stovectl::persist::{self, StateStore};
use stovectl::sensors::{RangeMeasurement, RangeStatus};

const SEC: u64 = 1_000;
const MIN: u64 = 60 * SEC;

struct Rig {
    app: AppService,
    hw: MockHardware,
    nvs: MockNvs,
    sink: CollectingSink,
}

impl Rig {
    fn boot(nvs: MockNvs) -> Self {
        let mut rig = Self {
            app: AppService::new(StoveConfig::default()),
            hw: MockHardware::new(),
            nvs,
            sink: CollectingSink::new(),
        };
        rig.app.start(0, &mut rig.hw, &mut rig.nvs, &mut rig.sink);
        rig
    }

    fn fresh() -> Self {
        Self::boot(MockNvs::new())
    }

    /// Boot with power and applied intensity already in storage.
    fn restored(power: bool, intensity: u8) -> Self {
        let mut nvs = MockNvs::new();
        let mut store = StateStore::new(&mut nvs);
        store.save_power(power);
        store.save_intensity(intensity);
        Self::boot(nvs)
    }

    fn cmd(&mut self, cmd: AppCommand) {
        self.app
            .handle_command(cmd, &mut self.hw, &mut self.nvs, &mut self.sink);
    }

    fn tick(&mut self, now_ms: u64) {
        self.app
            .tick(now_ms, &mut self.hw, &mut self.nvs, &mut self.sink);
    }

    /// Shut the rig down and boot a new service on the same storage.
    fn reboot(self) -> Self {
        Self::boot(self.nvs)
    }
}

// ── Boot ──────────────────────────────────────────────────────

#[test]
fn first_boot_publishes_defaults_and_parks_servos() {
    let rig = Rig::fresh();

    assert_eq!(rig.app.state(), StateId::Idle);
    assert_eq!(rig.app.status(), StoveStatus::Off);
    assert_eq!(rig.app.applied_intensity(), 20);
    assert_eq!(rig.app.desired_intensity(), 20);

    assert_eq!(
        rig.sink.events,
        vec![
            AppEvent::Started(StoveStatus::Off),
            AppEvent::StatusChanged(StoveStatus::Off),
            AppEvent::PowerSwitchChanged(false),
            AppEvent::IntensityChanged(100),
            AppEvent::FanChanged(false),
        ]
    );
    assert_eq!(
        rig.hw.calls,
        vec![
            HwCall::Fan(false),
            HwCall::Park {
                actuator: Actuator::Power,
                release_deg: 55
            },
            HwCall::Park {
                actuator: Actuator::Value,
                release_deg: 76
            },
        ]
    );
}

#[test]
fn boot_with_stove_on_reports_on_without_pressing() {
    let mut rig = Rig::restored(true, 7);

    assert_eq!(rig.app.status(), StoveStatus::On);
    assert!(rig.sink.contains(&AppEvent::PowerSwitchChanged(true)));
    assert!(rig.sink.contains(&AppEvent::IntensityChanged(35)));

    rig.tick(SEC);
    assert_eq!(rig.hw.presses(Actuator::Power), 0);
    assert_eq!(rig.hw.presses(Actuator::Value), 0);
}

// ── Power sequencing ──────────────────────────────────────────

#[test]
fn power_on_holds_for_the_full_ignition_period() {
    let mut rig = Rig::fresh();
    rig.sink.clear();

    rig.cmd(AppCommand::SetPower(true));
    assert!(rig.sink.contains(&AppEvent::PowerSwitchChanged(true)));

    rig.tick(0);
    assert_eq!(rig.app.state(), StateId::PoweringUp);
    assert_eq!(rig.app.status(), StoveStatus::TurningOn);
    assert!(rig.app.actual_power());
    assert_eq!(rig.hw.presses(Actuator::Power), 1);
    assert_eq!(
        rig.hw.calls.last(),
        Some(&HwCall::Press {
            actuator: Actuator::Power,
            release_deg: 55,
            press_deg: 25
        })
    );

    // Exactly 21 minutes is not enough.
    rig.tick(21 * MIN);
    assert_eq!(rig.app.state(), StateId::PoweringUp);

    rig.tick(21 * MIN + SEC);
    assert_eq!(rig.app.state(), StateId::Idle);
    assert_eq!(rig.app.status(), StoveStatus::On);
    assert_eq!(rig.hw.presses(Actuator::Power), 1);
    assert_eq!(rig.sink.statuses(), vec!["Turning On", "On"]);

    let stored = StateStore::new(&mut rig.nvs).load();
    assert_eq!(stored.power, Some(true));
}

#[test]
fn power_on_request_during_power_down_is_ignored() {
    let mut rig = Rig::restored(true, 20);

    rig.cmd(AppCommand::SetPower(false));
    rig.tick(0);
    assert_eq!(rig.app.state(), StateId::PoweringDown);
    assert_eq!(rig.app.status(), StoveStatus::TurningOff);
    assert!(!rig.app.actual_power());

    rig.sink.clear();
    rig.cmd(AppCommand::SetPower(true));
    assert!(!rig.app.desired_power());
    assert!(!rig.sink.contains(&AppEvent::PowerSwitchChanged(true)));

    for s in 1..=(8 * 60 + 1) {
        rig.tick(s * SEC);
    }
    assert_eq!(rig.app.state(), StateId::Idle);
    assert_eq!(rig.app.status(), StoveStatus::Off);
    assert_eq!(rig.hw.presses(Actuator::Power), 1);

    // Committed only once the burn-down finished.
    let stored = StateStore::new(&mut rig.nvs).load();
    assert_eq!(stored.power, Some(false));
}

#[test]
fn power_off_is_not_persisted_until_settled() {
    let mut rig = Rig::restored(true, 20);
    rig.cmd(AppCommand::SetPower(false));
    rig.tick(0);
    rig.tick(MIN);

    let stored = StateStore::new(&mut rig.nvs).load();
    assert_eq!(stored.power, Some(true));
}

#[test]
fn failed_press_still_advances_state() {
    let mut rig = Rig::fresh();
    rig.hw.fail_presses = true;
    rig.cmd(AppCommand::SetPower(true));
    rig.tick(0);
    assert_eq!(rig.app.state(), StateId::PoweringUp);
    assert!(rig.app.actual_power());
}

// ── Intensity ─────────────────────────────────────────────────

#[test]
fn intensity_converges_one_press_per_tick() {
    let mut rig = Rig::restored(true, 0);
    rig.hw.clear();

    rig.cmd(AppCommand::SetIntensityPercent(60));
    assert_eq!(rig.app.desired_intensity(), 12);
    assert!(rig.sink.contains(&AppEvent::IntensityChanged(60)));

    for t in 1..=12 {
        rig.tick(t * SEC);
        assert_eq!(rig.app.applied_intensity(), t as u8);
    }
    assert_eq!(rig.hw.value_presses_at(50), 12);
    assert_eq!(rig.hw.presses(Actuator::Value), 12);

    rig.tick(13 * SEC);
    assert_eq!(rig.hw.presses(Actuator::Value), 12);
    assert_eq!(rig.app.applied_intensity(), 12);
}

#[test]
fn intensity_steps_down_with_minus_button() {
    let mut rig = Rig::restored(true, 20);
    rig.hw.clear();
    rig.cmd(AppCommand::SetIntensityPercent(87));
    assert_eq!(rig.app.desired_intensity(), 17);

    for t in 1..=5 {
        rig.tick(t * SEC);
    }
    assert_eq!(rig.hw.value_presses_at(110), 3);
    assert_eq!(rig.app.applied_intensity(), 17);
}

#[test]
fn applied_intensity_survives_restart() {
    let mut rig = Rig::restored(true, 0);
    rig.cmd(AppCommand::SetIntensityPercent(60));
    for t in 1..=12 {
        rig.tick(t * SEC);
    }

    let rig = rig.reboot();
    assert_eq!(rig.app.applied_intensity(), 12);
    assert_eq!(rig.app.desired_intensity(), 12);
    assert_eq!(rig.hw.presses(Actuator::Value), 0);
}

#[test]
fn intensity_waits_while_stove_is_off() {
    let mut rig = Rig::fresh();
    rig.cmd(AppCommand::SetIntensityPercent(0));
    for t in 1..=5 {
        rig.tick(t * SEC);
    }
    assert_eq!(rig.hw.presses(Actuator::Value), 0);
    assert_eq!(rig.app.applied_intensity(), 20);
}

#[test]
fn power_press_tick_skips_intensity() {
    let mut rig = Rig::restored(false, 10);
    rig.cmd(AppCommand::SetIntensityPercent(75));
    rig.cmd(AppCommand::SetPower(true));

    rig.tick(0);
    assert_eq!(rig.hw.presses(Actuator::Power), 1);
    assert_eq!(rig.hw.presses(Actuator::Value), 0);

    // Stepping resumes while the stove is still igniting.
    rig.tick(SEC);
    assert_eq!(rig.hw.presses(Actuator::Value), 1);
    assert_eq!(rig.app.applied_intensity(), 11);
}

#[test]
fn intensity_holds_during_power_down() {
    let mut rig = Rig::restored(true, 10);
    rig.cmd(AppCommand::SetPower(false));
    rig.tick(0);
    rig.cmd(AppCommand::SetIntensityPercent(100));
    for t in 1..=5 {
        rig.tick(t * SEC);
    }
    assert_eq!(rig.hw.presses(Actuator::Value), 0);
}

#[test]
fn intensity_write_failure_keeps_running() {
    let mut rig = Rig::restored(true, 0);
    rig.nvs.fail_writes = true;
    rig.cmd(AppCommand::SetIntensityPercent(10));
    rig.tick(SEC);
    rig.tick(2 * SEC);
    assert_eq!(rig.app.applied_intensity(), 2);
}

// ── Level ─────────────────────────────────────────────────────

#[test]
fn first_level_is_published_while_off() {
    let mut rig = Rig::fresh();
    rig.hw.queue_mm(280);
    rig.tick(SEC);
    assert_eq!(rig.sink.levels(), vec![50]);
    assert_eq!(rig.app.level(), Some(50));

    // Same reading while off: not republished.
    rig.hw.queue_mm(280);
    rig.tick(2 * SEC);
    assert_eq!(rig.sink.levels(), vec![50]);

    // Different reading while off: suppressed.
    rig.hw.queue_mm(100);
    rig.tick(3 * SEC);
    assert_eq!(rig.sink.levels(), vec![50]);
}

#[test]
fn level_changes_are_published_while_on() {
    let mut rig = Rig::restored(true, 20);
    rig.hw.queue_mm(280);
    rig.hw.queue_mm(100);
    rig.tick(SEC);
    rig.tick(2 * SEC);
    assert_eq!(rig.sink.levels(), vec![50, 54]);
}

#[test]
fn bad_samples_never_move_the_level() {
    let mut rig = Rig::restored(true, 20);
    rig.hw.queue_mm(280);
    rig.tick(SEC);

    rig.hw.queue_mm(500);
    rig.hw.queue_mm(900);
    rig.hw.queue_range(Ok(RangeMeasurement {
        distance_mm: 60,
        status: RangeStatus::PhaseFail,
    }));
    for t in 2..=5 {
        rig.tick(t * SEC);
    }
    assert_eq!(rig.sink.levels(), vec![50]);
    assert_eq!(rig.app.build_telemetry(0).smoothed_distance_x10, Some(2800));
}

// ── Maintenance ───────────────────────────────────────────────

#[test]
fn maintenance_holds_power_and_intensity() {
    let mut rig = Rig::restored(true, 10);
    rig.cmd(AppCommand::EnterMaintenance);
    assert!(rig.app.is_maintenance());
    assert!(rig.sink.contains(&AppEvent::MaintenanceChanged(true)));

    rig.cmd(AppCommand::SetPower(false));
    assert!(rig.app.desired_power());

    rig.cmd(AppCommand::SetIntensityPercent(100));
    rig.hw.queue_mm(280);
    rig.tick(SEC);
    assert_eq!(rig.hw.presses(Actuator::Value), 0);
    assert_eq!(rig.hw.presses(Actuator::Power), 0);
    // Level keeps running.
    assert_eq!(rig.sink.levels(), vec![50]);

    rig.cmd(AppCommand::ManualPositions {
        power: 40,
        value: 90,
    });
    assert!(rig.hw.calls.contains(&HwCall::Position {
        actuator: Actuator::Power,
        deg: 40
    }));
    assert!(rig.hw.calls.contains(&HwCall::Position {
        actuator: Actuator::Value,
        deg: 90
    }));

    let parks_before = rig.hw.parks(Actuator::Value);
    rig.cmd(AppCommand::ExitMaintenance);
    assert!(!rig.app.is_maintenance());
    assert_eq!(rig.hw.parks(Actuator::Power), parks_before + 1);
    assert_eq!(rig.hw.parks(Actuator::Value), parks_before + 1);

    rig.tick(2 * SEC);
    assert_eq!(rig.hw.presses(Actuator::Value), 1);
}

#[test]
fn maintenance_refused_during_transition() {
    let mut rig = Rig::fresh();
    rig.cmd(AppCommand::SetPower(true));
    rig.tick(0);
    rig.cmd(AppCommand::EnterMaintenance);
    assert!(!rig.app.is_maintenance());
}

#[test]
fn maintenance_refused_while_power_request_pending() {
    let mut rig = Rig::fresh();
    rig.cmd(AppCommand::SetPower(true));
    rig.cmd(AppCommand::EnterMaintenance);
    assert!(!rig.app.is_maintenance());
    assert!(!rig.sink.contains(&AppEvent::MaintenanceChanged(true)));

    // The request goes through on the next tick as usual.
    rig.tick(SEC);
    assert_eq!(rig.app.state(), StateId::PoweringUp);
    assert_eq!(rig.hw.presses(Actuator::Power), 1);
    assert_eq!(rig.app.desired_power(), rig.app.actual_power());
}

#[test]
fn manual_positions_need_maintenance() {
    let mut rig = Rig::fresh();
    rig.hw.clear();
    rig.cmd(AppCommand::ManualPositions {
        power: 10,
        value: 10,
    });
    assert!(rig.hw.calls.is_empty());
}

// ── Fan ───────────────────────────────────────────────────────

#[test]
fn fan_is_applied_persisted_and_restored() {
    let mut rig = Rig::fresh();
    rig.cmd(AppCommand::SetFan(true));
    assert_eq!(rig.hw.fan_on(), Some(true));
    assert!(rig.app.fan());
    assert_eq!(rig.nvs.raw(persist::NAMESPACE, persist::KEY_FAN), Some(&[1u8][..]));

    let rig = rig.reboot();
    assert!(rig.app.fan());
    assert_eq!(rig.hw.fan_on(), Some(true));
    assert!(rig.sink.contains(&AppEvent::FanChanged(true)));
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn config_update_is_saved_after_debounce() {
    let mut rig = Rig::fresh();
    let cfg = StoveConfig {
        power_on_settle_secs: 15 * 60,
        ..Default::default()
    };
    rig.cmd(AppCommand::UpdateConfig(cfg.clone()));
    assert!(rig.app.is_config_dirty());

    rig.tick(4 * SEC);
    assert!(!rig.app.auto_save_if_needed(&rig.nvs));

    rig.tick(5 * SEC);
    assert!(rig.app.auto_save_if_needed(&rig.nvs));
    assert_eq!(rig.nvs.load().unwrap(), cfg);
    assert!(!rig.app.is_config_dirty());
}

#[test]
fn save_config_flushes_on_next_check() {
    let mut rig = Rig::fresh();
    rig.tick(30 * SEC);
    rig.cmd(AppCommand::SaveConfig);
    assert!(rig.app.auto_save_if_needed(&rig.nvs));
    assert_eq!(*rig.nvs.config_saves.borrow(), 1);
}

#[test]
fn shorter_settle_time_applies_to_next_transition() {
    let mut rig = Rig::fresh();
    rig.cmd(AppCommand::UpdateConfig(StoveConfig {
        power_on_settle_secs: 60,
        ..Default::default()
    }));
    rig.cmd(AppCommand::SetPower(true));
    rig.tick(0);
    rig.tick(61 * SEC);
    assert_eq!(rig.app.status(), StoveStatus::On);
}

#[test]
fn config_update_does_not_shorten_running_ignition() {
    let mut rig = Rig::fresh();
    rig.cmd(AppCommand::SetPower(true));
    rig.tick(0);
    rig.tick(2 * MIN);

    rig.cmd(AppCommand::UpdateConfig(StoveConfig {
        power_on_settle_secs: 60,
        ..Default::default()
    }));
    assert_eq!(rig.app.current_config().power_on_settle_secs, 60);

    rig.tick(2 * MIN + SEC);
    assert_eq!(rig.app.state(), StateId::PoweringUp);
    assert_eq!(rig.app.status(), StoveStatus::TurningOn);

    rig.cmd(AppCommand::SetPower(false));
    assert!(rig.app.desired_power());
    rig.tick(3 * MIN);
    assert_eq!(rig.hw.presses(Actuator::Power), 1);

    rig.tick(21 * MIN + SEC);
    assert_eq!(rig.app.state(), StateId::Idle);
    assert_eq!(rig.app.status(), StoveStatus::On);
}

// ── Telemetry ─────────────────────────────────────────────────

#[test]
fn telemetry_snapshot_serialises_to_json() {
    let mut rig = Rig::restored(true, 12);
    rig.hw.queue_mm(280);
    rig.tick(SEC);

    let t = rig.app.build_telemetry(90 * SEC);
    assert_eq!(t.applied_intensity, 12);
    assert_eq!(t.level_percent, Some(50));

    let json = serde_json::to_string(&t).unwrap();
    assert!(json.contains("\"uptime_ms\":90000"));
    assert!(json.contains("\"status\":\"On\""));
    assert!(json.contains("\"state\":\"Idle\""));
}
