//! Application service — the hexagonal core.
//!
//! [`AppService`] owns the power FSM and the shared context (intensity
//! controller, level estimator, fan and maintenance flags).  It exposes a
//! clean, hardware-agnostic API.  All I/O flows through port traits
//! injected at call sites, making the entire service testable with mock
//! adapters.
//!
//! ```text
//!  RangingPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │          AppService          │
//! ActuatorPort ◀── │ power FSM · intensity · level│ ◀─▶ StoragePort
//!                  └──────────────────────────────┘
//! ```
//!
//! One control tick runs three stages in fixed order:
//!
//! 1. **power** — FSM tick; a press here ends actuation for the tick
//! 2. **intensity** — at most one (+)/(−) press toward the target
//! 3. **level** — one ranging sample, smoothed and gated

use log::{debug, info, warn};

use crate::config::StoveConfig;
use crate::control::intensity::{IntensityController, MAX_STEP, Step};
use crate::fsm::context::{FsmContext, StoveStatus};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::persist::StateStore;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{Actuator, ActuatorPort, ConfigPort, EventSink, RangingPort, StoragePort};

/// Applied intensity assumed when nothing was ever persisted.  The stove
/// panel position is unknown at that point, so the top step is assumed
/// and no presses are issued until an intensity is requested.
pub const DEFAULT_APPLIED_INTENSITY: u8 = MAX_STEP;

/// Config changes are flushed this long after the last edit.
const CONFIG_SAVE_DEBOUNCE_MS: u64 = 5_000;

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    tick_count: u64,
    config_dirty: bool,
    dirty_since_ms: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** restore state or start the FSM — call [`start`] next.
    ///
    /// [`start`]: Self::start
    pub fn new(config: StoveConfig) -> Self {
        let ctx = FsmContext::new(config, DEFAULT_APPLIED_INTENSITY);
        let fsm = Fsm::new(build_state_table(), StateId::Idle);

        Self {
            fsm,
            ctx,
            tick_count: 0,
            config_dirty: false,
            dirty_since_ms: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore persisted state, bring outputs to a known position and
    /// publish the boot state.
    ///
    /// Power is restored as settled (desired = actual), so a stove that
    /// was on before a reboot is assumed to still be on and no press is
    /// issued.
    pub fn start(
        &mut self,
        now_ms: u64,
        hw: &mut impl ActuatorPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.ctx.now_ms = now_ms;

        let saved = StateStore::new(storage).load();
        let power = saved.power.unwrap_or(false);
        self.ctx.desired_power = power;
        self.ctx.actual_power = power;
        self.ctx.intensity =
            IntensityController::new(saved.intensity.unwrap_or(DEFAULT_APPLIED_INTENSITY));
        self.ctx.fan = saved.fan.unwrap_or(false);

        hw.set_fan(self.ctx.fan);
        self.park_servos(hw);

        self.fsm.start(&mut self.ctx);

        let status = self.ctx.status;
        sink.emit(&AppEvent::Started(status));
        sink.emit(&AppEvent::StatusChanged(status));
        sink.emit(&AppEvent::PowerSwitchChanged(self.ctx.desired_power));
        sink.emit(&AppEvent::IntensityChanged(self.ctx.intensity.desired_percent()));
        sink.emit(&AppEvent::FanChanged(self.ctx.fan));

        info!(
            "AppService started: status={} intensity={} fan={}",
            status,
            self.ctx.intensity.applied(),
            self.ctx.fan
        );
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle: power → intensity → level.
    ///
    /// The `hw` parameter satisfies **both** [`ActuatorPort`] and
    /// [`RangingPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    pub fn tick(
        &mut self,
        now_ms: u64,
        hw: &mut (impl ActuatorPort + RangingPort),
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        self.tick_count += 1;
        self.ctx.now_ms = now_ms;

        let pressed_power = self.step_power(hw, storage, sink);
        self.step_intensity(pressed_power, hw, storage);
        self.step_level(hw, sink);
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl ActuatorPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::SetPower(on) => {
                let state = self.fsm.current_state();
                if state.is_transitioning() {
                    debug!("SetPower({}) ignored: {:?} in progress", on, state);
                    return;
                }
                if self.ctx.maintenance {
                    debug!("SetPower({}) ignored: maintenance mode", on);
                    return;
                }
                self.ctx.desired_power = on;
                sink.emit(&AppEvent::PowerSwitchChanged(on));
            }
            AppCommand::SetIntensityPercent(percent) => {
                let before = self.ctx.intensity.desired();
                let target = self.ctx.intensity.set_desired_percent(percent);
                info!("Intensity requested: {}% -> step {}", percent, target);
                if target != before {
                    sink.emit(&AppEvent::IntensityChanged(
                        self.ctx.intensity.desired_percent(),
                    ));
                }
            }
            AppCommand::SetFan(on) => {
                hw.set_fan(on);
                self.ctx.fan = on;
                StateStore::new(storage).save_fan(on);
                sink.emit(&AppEvent::FanChanged(on));
            }
            AppCommand::EnterMaintenance => {
                if self.ctx.maintenance {
                    return;
                }
                let state = self.fsm.current_state();
                if state.is_transitioning() {
                    debug!("EnterMaintenance ignored: {:?} in progress", state);
                    return;
                }
                if self.ctx.desired_power != self.ctx.actual_power {
                    debug!("EnterMaintenance ignored: power request pending");
                    return;
                }
                self.ctx.maintenance = true;
                info!("Maintenance mode entered: power and intensity held");
                sink.emit(&AppEvent::MaintenanceChanged(true));
            }
            AppCommand::ExitMaintenance => {
                if !self.ctx.maintenance {
                    return;
                }
                self.park_servos(hw);
                self.ctx.maintenance = false;
                info!("Maintenance mode left: servos parked");
                sink.emit(&AppEvent::MaintenanceChanged(false));
            }
            AppCommand::ManualPositions { power, value } => {
                if !self.ctx.maintenance {
                    debug!("ManualPositions ignored: not in maintenance mode");
                    return;
                }
                info!("Manual positions: power={}\u{00b0} value={}\u{00b0}", power, value);
                for (actuator, deg) in [(Actuator::Power, power), (Actuator::Value, value)] {
                    if let Err(e) = hw.write_position(actuator, deg) {
                        warn!("Manual {:?} position failed: {}", actuator, e);
                    }
                }
            }
            AppCommand::UpdateConfig(new_config) => {
                if let Err(msg) = new_config.validate() {
                    warn!("Configuration rejected: {}", msg);
                    return;
                }
                self.ctx.level.reconfigure(&new_config);
                self.ctx.config = new_config;
                self.mark_config_dirty();
                info!("Configuration updated at runtime");
            }
            AppCommand::SaveConfig => {
                self.config_dirty = true;
                self.dirty_since_ms = self.ctx.now_ms.saturating_sub(CONFIG_SAVE_DEBOUNCE_MS);
                info!("Explicit config save requested (will flush on next auto-save check)");
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current context.
    pub fn build_telemetry(&self, uptime_ms: u64) -> TelemetryData {
        TelemetryData {
            uptime_ms,
            state: self.fsm.current_state(),
            status: self.ctx.status,
            desired_power: self.ctx.desired_power,
            actual_power: self.ctx.actual_power,
            desired_intensity: self.ctx.intensity.desired(),
            applied_intensity: self.ctx.intensity.applied(),
            level_percent: self.ctx.level.level(),
            smoothed_distance_x10: self.ctx.level.smoothed_x10(),
            fan: self.ctx.fan,
            maintenance: self.ctx.maintenance,
        }
    }

    /// Current power FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    pub fn status(&self) -> StoveStatus {
        self.ctx.status
    }

    pub fn desired_power(&self) -> bool {
        self.ctx.desired_power
    }

    pub fn actual_power(&self) -> bool {
        self.ctx.actual_power
    }

    pub fn desired_intensity(&self) -> u8 {
        self.ctx.intensity.desired()
    }

    pub fn applied_intensity(&self) -> u8 {
        self.ctx.intensity.applied()
    }

    pub fn fan(&self) -> bool {
        self.ctx.fan
    }

    pub fn is_maintenance(&self) -> bool {
        self.ctx.maintenance
    }

    /// Last published fill level.
    pub fn level(&self) -> Option<u8> {
        self.ctx.level.published()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Clone of the live configuration.
    pub fn current_config(&self) -> StoveConfig {
        self.ctx.config.clone()
    }

    // ── Internal ──────────────────────────────────────────────

    /// Power stage.  Returns `true` if a power press was issued.
    fn step_power(
        &mut self,
        hw: &mut impl ActuatorPort,
        storage: &mut impl StoragePort,
        sink: &mut impl EventSink,
    ) -> bool {
        let prev_state = self.fsm.current_state();
        let prev_status = self.ctx.status;

        self.fsm.tick(&mut self.ctx);
        let cmds = self.ctx.commands.take();

        if cmds.press_power {
            let cfg = &self.ctx.config;
            press(hw, Actuator::Power, cfg.power_release_deg, cfg.power_press_deg);
        }
        if cmds.persist_power {
            StateStore::new(storage).save_power(self.ctx.desired_power);
        }

        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }
        if self.ctx.status != prev_status {
            sink.emit(&AppEvent::StatusChanged(self.ctx.status));
        }

        cmds.press_power
    }

    fn step_intensity(
        &mut self,
        pressed_power: bool,
        hw: &mut impl ActuatorPort,
        storage: &mut impl StoragePort,
    ) {
        let enabled = self.ctx.actual_power
            && self.fsm.current_state() != StateId::PoweringDown
            && !pressed_power
            && !self.ctx.maintenance;

        let Some(step) = self.ctx.intensity.tick(enabled) else {
            return;
        };

        let cfg = &self.ctx.config;
        let press_deg = match step {
            Step::Up => cfg.value_plus_deg,
            Step::Down => cfg.value_minus_deg,
        };
        debug!(
            "Intensity {:?}: applied {} -> target {}",
            step,
            self.ctx.intensity.applied(),
            self.ctx.intensity.desired()
        );
        press(hw, Actuator::Value, cfg.value_release_deg, press_deg);
        StateStore::new(storage).save_intensity(self.ctx.intensity.applied());
    }

    fn step_level(&mut self, hw: &mut impl RangingPort, sink: &mut impl EventSink) {
        let measurement = match hw.measure() {
            Ok(m) => m,
            Err(e) => {
                debug!("Level: sensor fault, sample skipped: {}", e);
                return;
            }
        };
        match self.ctx.level.ingest(measurement, self.ctx.actual_power) {
            Ok(Some(level)) => sink.emit(&AppEvent::LevelChanged(level)),
            Ok(None) => {}
            Err(e) => debug!("Level: sample discarded: {}", e),
        }
    }

    fn park_servos(&self, hw: &mut impl ActuatorPort) {
        let cfg = &self.ctx.config;
        for (actuator, release) in [
            (Actuator::Power, cfg.power_release_deg),
            (Actuator::Value, cfg.value_release_deg),
        ] {
            if let Err(e) = hw.park(actuator, release) {
                warn!("Parking {:?} servo failed: {}", actuator, e);
            }
        }
    }

    // ── Config dirty-flag management ──────────────────────────

    /// Mark the config as modified. Called by `handle_command(UpdateConfig)`.
    pub fn mark_config_dirty(&mut self) {
        if !self.config_dirty {
            self.config_dirty = true;
            self.dirty_since_ms = self.ctx.now_ms;
        }
    }

    /// Save the config once it has been stable for a few seconds.
    /// Returns `true` if the config was saved.
    pub fn auto_save_if_needed(&mut self, storage: &impl ConfigPort) -> bool {
        if !self.config_dirty {
            return false;
        }
        if self.ctx.now_ms.saturating_sub(self.dirty_since_ms) < CONFIG_SAVE_DEBOUNCE_MS {
            return false;
        }
        match storage.save(&self.ctx.config) {
            Ok(()) => {
                self.config_dirty = false;
                info!("Config auto-saved to NVS");
                true
            }
            Err(e) => {
                warn!("Config auto-save failed: {}", e);
                false
            }
        }
    }

    /// Whether the config has unsaved changes.
    pub fn is_config_dirty(&self) -> bool {
        self.config_dirty
    }
}

/// Issue one press.  Presses are open-loop: a failure is logged and the
/// caller's state advances regardless.
fn press(hw: &mut impl ActuatorPort, actuator: Actuator, release_deg: u8, press_deg: u8) {
    if let Err(e) = hw.press(actuator, release_deg, press_deg) {
        warn!("{:?} press failed: {}", actuator, e);
    }
}
