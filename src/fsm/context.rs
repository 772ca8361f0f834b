//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that the power state handlers read
//! from and write to, and that the intensity and level stages of the
//! control tick share with them.  It holds desired and actual power,
//! transition timing, one-shot commands for the service to apply,
//! configuration, and the intensity and fill-level state.  Think of it
//! as the "blackboard" in a blackboard architecture.

use serde::Serialize;

use crate::config::StoveConfig;
use crate::control::intensity::IntensityController;
use crate::sensors::level::LevelEstimator;

// ---------------------------------------------------------------------------
// Stove status (what the user sees)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StoveStatus {
    Off,
    TurningOn,
    On,
    TurningOff,
}

impl StoveStatus {
    /// Settled status for a given power state.
    pub fn settled(powered: bool) -> Self {
        if powered { Self::On } else { Self::Off }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::TurningOn => "Turning On",
            Self::On => "On",
            Self::TurningOff => "Turning Off",
        }
    }
}

impl core::fmt::Display for StoveStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Power commands (written by state handlers; consumed by the service)
// ---------------------------------------------------------------------------

/// One-shot requests raised by state handlers.  The service applies and
/// clears them after every FSM tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PowerCommands {
    /// Issue one press on the power button.
    pub press_power: bool,
    /// Write `desired_power` to persistent storage.
    pub persist_power: bool,
}

impl PowerCommands {
    /// Return the pending commands and reset them.
    pub fn take(&mut self) -> Self {
        core::mem::take(self)
    }
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Milliseconds since boot, updated before each FSM tick.
    pub now_ms: u64,
    /// When the current power transition started.
    pub transition_started_ms: u64,
    /// Hold period of the current transition, fixed when it started.
    pub transition_settle_ms: u64,

    // -- Power --
    pub desired_power: bool,
    /// Last power state considered propagated to the stove.
    pub actual_power: bool,
    pub status: StoveStatus,
    pub commands: PowerCommands,

    // -- Intensity, fill level, fan --
    pub intensity: IntensityController,
    pub level: LevelEstimator,
    pub fan: bool,

    /// Manual servo override active; power and intensity steps are held.
    pub maintenance: bool,

    // -- Configuration --
    pub config: StoveConfig,
}

impl FsmContext {
    /// Create a context with the stove assumed off and intensity at
    /// `applied_intensity`.
    pub fn new(config: StoveConfig, applied_intensity: u8) -> Self {
        Self {
            now_ms: 0,
            transition_started_ms: 0,
            transition_settle_ms: 0,
            desired_power: false,
            actual_power: false,
            status: StoveStatus::Off,
            commands: PowerCommands::default(),
            intensity: IntensityController::new(applied_intensity),
            level: LevelEstimator::new(&config),
            fan: false,
            maintenance: false,
            config,
        }
    }

    /// Milliseconds since the current power transition started.
    pub fn transition_elapsed_ms(&self) -> u64 {
        self.now_ms.saturating_sub(self.transition_started_ms)
    }

    /// The current transition has held for its full settle period.
    pub fn transition_settled(&self) -> bool {
        self.transition_elapsed_ms() > self.transition_settle_ms
    }

    /// Start a power transition at the current time.  A later config
    /// change does not move the end of this transition.
    pub fn begin_transition(&mut self, settle_ms: u64) {
        self.transition_started_ms = self.now_ms;
        self.transition_settle_ms = settle_ms;
        self.commands.press_power = true;
    }
}
