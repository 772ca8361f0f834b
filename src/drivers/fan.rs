//! Room fan relay driver.
//!
//! Plain digital output, no ramp and no delay.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: drives the GPIO via hw_init helpers.
//! On host/test: tracks state in-memory only.

use log::info;

use crate::drivers::hw_init;
use crate::pins;

pub struct FanDriver {
    on: bool,
}

impl FanDriver {
    /// Starts with the relay released.
    pub fn new() -> Self {
        hw_init::gpio_write(pins::FAN_GPIO, false);
        Self { on: false }
    }

    pub fn set(&mut self, on: bool) {
        hw_init::gpio_write(pins::FAN_GPIO, on);
        if on != self.on {
            info!("Fan {}", if on { "on" } else { "off" });
        }
        self.on = on;
    }
}

impl Default for FanDriver {
    fn default() -> Self {
        Self::new()
    }
}
