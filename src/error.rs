//! Unified error types for the stove firmware.
//!
//! A single `Error` enum that every subsystem can convert into.  All
//! variants are `Copy` so they can be passed through the control loop
//! without allocation.  None of them is fatal: the loop logs the error
//! and holds its current state until the next tick.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The ranging sensor could not be read or returned unusable data.
    Sensor(SensorError),
    /// A servo or output could not be driven.
    Actuator(ActuatorError),
    /// Peripheral initialisation failed.
    Init(&'static str),
    /// Configuration is invalid or could not be loaded.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Init(msg) => write!(f, "init: {msg}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

/// Reasons a fill-level sample is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// I²C transaction with the ranging sensor failed.
    Bus,
    /// The sensor did not finish a measurement within the poll budget.
    Timeout,
    /// The sensor reported a phase failure; the distance is garbage.
    PhaseFailure,
    /// Distance is at or beyond the configured "empty" bound.
    OutOfRange,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "I2C bus error"),
            Self::Timeout => write!(f, "measurement timed out"),
            Self::PhaseFailure => write!(f, "phase failure"),
            Self::OutOfRange => write!(f, "reading out of range"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

/// Failures while driving a servo.  Presses are open-loop, so these are
/// logged and the press is counted as issued anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// LEDC duty update rejected (ESP-IDF return code).
    Pwm(i32),
    /// Requested angle is outside 0–180°.
    InvalidAngle(u8),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pwm(rc) => write!(f, "PWM update failed (rc={rc})"),
            Self::InvalidAngle(deg) => write!(f, "angle {deg}\u{00b0} out of range"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
