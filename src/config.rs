//! System configuration parameters
//!
//! All tunable parameters for the stove remote: servo angles, press
//! timing, the stove's own boot/shutdown durations and the hopper
//! geometry used by the fill-level estimate.
//! Values can be overridden via NVS (non-volatile storage).

use serde::{Deserialize, Serialize};

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoveConfig {
    // --- Power servo (degrees) ---
    /// Angle at which the arm depresses the power button
    pub power_press_deg: u8,
    /// Rest angle of the power arm
    pub power_release_deg: u8,

    // --- Value servo (degrees) ---
    /// Angle that presses the (+) button
    pub value_plus_deg: u8,
    /// Angle that presses the (−) button
    pub value_minus_deg: u8,
    /// Rest angle, centred between the two buttons
    pub value_release_deg: u8,

    // --- Press timing ---
    /// How long a button is held down (milliseconds)
    pub press_dwell_ms: u32,
    /// Time for the arm to travel back to rest before the servo is detached
    pub release_settle_ms: u32,

    // --- Stove sequencing ---
    /// Boot + flame establishment time after a power-on press (seconds)
    pub power_on_settle_secs: u32,
    /// Burn-down + fan-stop time after a power-off press (seconds)
    pub power_off_settle_secs: u32,

    // --- Hopper geometry ---
    /// Sensor-to-pellet distance that counts as 0 % (millimetres)
    pub level_empty_mm: u16,
    /// Sensor-to-pellet distance that counts as 100 % (millimetres)
    pub level_full_mm: u16,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Telemetry report interval (seconds)
    pub telemetry_interval_secs: u32,
    /// Task watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,
}

impl Default for StoveConfig {
    fn default() -> Self {
        Self {
            // Power servo
            power_press_deg: 25,
            power_release_deg: 55,

            // Value servo
            value_plus_deg: 50,
            value_minus_deg: 110,
            value_release_deg: 76,

            // Press timing
            press_dwell_ms: 350,
            release_settle_ms: 300,

            // Stove sequencing
            power_on_settle_secs: 21 * 60,
            power_off_settle_secs: 8 * 60,

            // Hopper
            level_empty_mm: 500,
            level_full_mm: 60,

            // Timing
            control_loop_interval_ms: 1000, // 1 Hz
            telemetry_interval_secs: 60,    // 1/min
            watchdog_timeout_ms: 10_000,
        }
    }
}

impl StoveConfig {
    /// Power-on settle period in milliseconds.
    pub fn power_on_settle_ms(&self) -> u64 {
        u64::from(self.power_on_settle_secs) * 1000
    }

    /// Power-off settle period in milliseconds.
    pub fn power_off_settle_ms(&self) -> u64 {
        u64::from(self.power_off_settle_secs) * 1000
    }

    /// Worst-case time one control tick can block on a single press.
    pub fn press_cycle_ms(&self) -> u32 {
        self.press_dwell_ms + self.release_settle_ms
    }

    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), &'static str> {
        let angles = [
            self.power_press_deg,
            self.power_release_deg,
            self.value_plus_deg,
            self.value_minus_deg,
            self.value_release_deg,
        ];
        if angles.iter().any(|&deg| deg > 180) {
            return Err("servo angles must be 0–180");
        }
        if self.power_press_deg == self.power_release_deg {
            return Err("power_press_deg must differ from power_release_deg");
        }
        if self.value_plus_deg == self.value_release_deg
            || self.value_minus_deg == self.value_release_deg
        {
            return Err("value press angles must differ from value_release_deg");
        }
        if !(50..=2000).contains(&self.press_dwell_ms) {
            return Err("press_dwell_ms must be 50–2000");
        }
        if !(50..=2000).contains(&self.release_settle_ms) {
            return Err("release_settle_ms must be 50–2000");
        }
        if !(60..=3600).contains(&self.power_on_settle_secs) {
            return Err("power_on_settle_secs must be 60–3600");
        }
        if !(60..=3600).contains(&self.power_off_settle_secs) {
            return Err("power_off_settle_secs must be 60–3600");
        }
        if self.level_full_mm >= self.level_empty_mm {
            return Err("level_full_mm must be < level_empty_mm");
        }
        if self.level_empty_mm > 2000 {
            return Err("level_empty_mm must be <= 2000");
        }
        if !(100..=5000).contains(&self.control_loop_interval_ms) {
            return Err("control_loop_interval_ms must be 100–5000");
        }
        if !(5..=3600).contains(&self.telemetry_interval_secs) {
            return Err("telemetry_interval_secs must be 5–3600");
        }
        if self.watchdog_timeout_ms <= self.control_loop_interval_ms + self.press_cycle_ms() {
            return Err("watchdog_timeout_ms must outlast one loop plus a press");
        }
        Ok(())
    }
}
