//! Hobby-servo driver and the button-press sequence built on it.
//!
//! Each arm is a standard 50 Hz servo on its own LEDC channel.  A servo
//! is only "attached" (receiving pulses) while it moves; between presses
//! the channel is stopped so the arm rests on its own friction and does
//! not buzz against the panel.
//!
//! ```text
//!  press(release, press):
//!    attach ─▶ write(press) ─▶ dwell ─▶ write(release) ─▶ settle ─▶ detach
//! ```
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives LEDC via hw_init helpers.
//! On host/test: tracks state in-memory only.

use embedded_hal::delay::DelayNs;
use log::debug;

use crate::app::ports::Actuator;
use crate::drivers::hw_init;
use crate::error::ActuatorError;
use crate::pins;

pub const MAX_ANGLE_DEG: u8 = 180;

/// Pulse width for an angle, linear between the 0° and 180° endpoints.
pub fn angle_to_pulse_us(deg: u8) -> u32 {
    let span = pins::SERVO_MAX_PULSE_US - pins::SERVO_MIN_PULSE_US;
    pins::SERVO_MIN_PULSE_US + span * u32::from(deg.min(MAX_ANGLE_DEG)) / u32::from(MAX_ANGLE_DEG)
}

pub struct ServoDriver {
    channel: u32,
    attached: bool,
    position: Option<u8>,
}

impl ServoDriver {
    pub fn new(channel: u32) -> Self {
        Self {
            channel,
            attached: false,
            position: None,
        }
    }

    /// Start emitting pulses.  Without a prior `write` the arm is
    /// commanded to its last known position, or left alone if there
    /// is none.
    pub fn attach(&mut self) -> Result<(), ActuatorError> {
        if let Some(deg) = self.position {
            hw_init::servo_set_pulse(self.channel, angle_to_pulse_us(deg))?;
        }
        self.attached = true;
        Ok(())
    }

    pub fn write(&mut self, deg: u8) -> Result<(), ActuatorError> {
        if deg > MAX_ANGLE_DEG {
            return Err(ActuatorError::InvalidAngle(deg));
        }
        hw_init::servo_set_pulse(self.channel, angle_to_pulse_us(deg))?;
        self.attached = true;
        self.position = Some(deg);
        Ok(())
    }

    pub fn detach(&mut self) -> Result<(), ActuatorError> {
        hw_init::servo_stop(self.channel)?;
        self.attached = false;
        Ok(())
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    /// Last commanded angle.
    pub fn position(&self) -> Option<u8> {
        self.position
    }
}

/// Timing of one press sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PressTiming {
    /// How long the button is held down.
    pub dwell_ms: u32,
    /// Travel time back to rest before the servo is detached.
    pub settle_ms: u32,
}

impl From<&crate::config::StoveConfig> for PressTiming {
    fn from(cfg: &crate::config::StoveConfig) -> Self {
        Self {
            dwell_ms: cfg.press_dwell_ms,
            settle_ms: cfg.release_settle_ms,
        }
    }
}

/// Both panel arms plus the blocking delay used to sequence them.
pub struct ButtonPresser<D> {
    power: ServoDriver,
    value: ServoDriver,
    delay: D,
    timing: PressTiming,
    presses: u32,
}

impl<D: DelayNs> ButtonPresser<D> {
    pub fn new(power: ServoDriver, value: ServoDriver, delay: D, timing: PressTiming) -> Self {
        Self {
            power,
            value,
            delay,
            timing,
            presses: 0,
        }
    }

    pub fn set_timing(&mut self, timing: PressTiming) {
        self.timing = timing;
    }

    /// One full press.  Blocks for dwell + settle.  The servo is always
    /// detached on the way out, even if a move failed.
    pub fn press(
        &mut self,
        actuator: Actuator,
        release_deg: u8,
        press_deg: u8,
    ) -> Result<(), ActuatorError> {
        debug!(
            "{:?} press: {}\u{00b0} -> {}\u{00b0} -> {}\u{00b0}",
            actuator, release_deg, press_deg, release_deg
        );

        let moved = self.press_and_return(actuator, release_deg, press_deg);
        self.delay.delay_ms(self.timing.settle_ms);
        let detached = self.servo_mut(actuator).detach();

        self.presses = self.presses.wrapping_add(1);
        moved.and(detached)
    }

    /// Move to rest, let it settle, detach.
    pub fn park(&mut self, actuator: Actuator, release_deg: u8) -> Result<(), ActuatorError> {
        let moved = self.hold(actuator, release_deg);
        self.delay.delay_ms(self.timing.settle_ms);
        let detached = self.servo_mut(actuator).detach();
        moved.and(detached)
    }

    /// Drive to `deg` and stay attached.
    pub fn hold(&mut self, actuator: Actuator, deg: u8) -> Result<(), ActuatorError> {
        let servo = self.servo_mut(actuator);
        servo.attach()?;
        servo.write(deg)
    }

    /// Presses issued since boot (both arms).
    pub fn press_count(&self) -> u32 {
        self.presses
    }

    pub fn servo(&self, actuator: Actuator) -> &ServoDriver {
        match actuator {
            Actuator::Power => &self.power,
            Actuator::Value => &self.value,
        }
    }

    fn press_and_return(
        &mut self,
        actuator: Actuator,
        release_deg: u8,
        press_deg: u8,
    ) -> Result<(), ActuatorError> {
        self.hold(actuator, press_deg)?;
        self.delay.delay_ms(self.timing.dwell_ms);
        self.servo_mut(actuator).write(release_deg)
    }

    fn servo_mut(&mut self, actuator: Actuator) -> &mut ServoDriver {
        match actuator {
            Actuator::Power => &mut self.power,
            Actuator::Value => &mut self.value,
        }
    }
}
