//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them — log to serial, forward to a home
//! automation bridge, etc.

use serde::Serialize;

use crate::fsm::StateId;
use crate::fsm::context::StoveStatus;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The application service has started (carries the boot status).
    Started(StoveStatus),

    /// The power FSM moved between states.
    StateChanged { from: StateId, to: StateId },

    /// Status text changed ("On", "Turning Off", ...).
    StatusChanged(StoveStatus),

    /// Desired power switch state (published at boot and on every
    /// accepted request).
    PowerSwitchChanged(bool),

    /// Desired intensity, 0–100 % in steps of 5.
    IntensityChanged(u8),

    /// Hopper fill level, 0–100 %.
    LevelChanged(u8),

    FanChanged(bool),

    MaintenanceChanged(bool),

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetryData {
    pub uptime_ms: u64,
    pub state: StateId,
    pub status: StoveStatus,
    pub desired_power: bool,
    pub actual_power: bool,
    pub desired_intensity: u8,
    pub applied_intensity: u8,
    pub level_percent: Option<u8>,
    pub smoothed_distance_x10: Option<u32>,
    pub fan: bool,
    pub maintenance: bool,
}
