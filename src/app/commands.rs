//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (switches,
//! service calls, the serial console) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.

use crate::config::StoveConfig;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Request the stove on or off.  Ignored while a power transition is
    /// settling or maintenance mode is active.
    SetPower(bool),

    /// Request an intensity as 0–100 %.  Quantised to 5 % steps.
    SetIntensityPercent(u8),

    /// Switch the room fan.  Applied immediately.
    SetFan(bool),

    /// Enter manual servo mode.  Only accepted while no power transition
    /// is in progress.
    EnterMaintenance,

    /// Leave manual servo mode, parking both arms.
    ExitMaintenance,

    /// Drive both arms to raw angles (maintenance mode only).
    ManualPositions { power: u8, value: u8 },

    /// Hot-reload configuration.
    UpdateConfig(StoveConfig),

    /// Explicitly persist the current config on the next auto-save check.
    SaveConfig,
}
