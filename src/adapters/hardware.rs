//! Hardware adapter — bridges real peripherals to domain port traits.
//!
//! Owns the [`ButtonPresser`], the [`FanDriver`] and the hopper
//! [`TofSensor`], exposing them through [`ActuatorPort`] and
//! [`RangingPort`].  This is the only module in the system that touches
//! actual hardware.  On non-espidf targets, the underlying drivers use
//! cfg-gated simulation stubs.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::app::ports::{Actuator, ActuatorPort, RangingPort};
use crate::drivers::fan::FanDriver;
use crate::drivers::servo::{ButtonPresser, PressTiming};
use crate::error::{ActuatorError, SensorError};
use crate::sensors::RangeMeasurement;
use crate::sensors::tof::TofSensor;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<I2C, D> {
    presser: ButtonPresser<D>,
    fan: FanDriver,
    tof: TofSensor<I2C>,
}

impl<I2C: I2c, D: DelayNs> HardwareAdapter<I2C, D> {
    pub fn new(presser: ButtonPresser<D>, fan: FanDriver, tof: TofSensor<I2C>) -> Self {
        Self { presser, fan, tof }
    }

    /// Pick up new press timing after a config change.
    pub fn set_press_timing(&mut self, timing: PressTiming) {
        self.presser.set_timing(timing);
    }

    pub fn press_count(&self) -> u32 {
        self.presser.press_count()
    }

    pub fn sensor_ready(&self) -> bool {
        self.tof.is_ready()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<I2C: I2c, D: DelayNs> ActuatorPort for HardwareAdapter<I2C, D> {
    fn press(
        &mut self,
        actuator: Actuator,
        release_deg: u8,
        press_deg: u8,
    ) -> Result<(), ActuatorError> {
        self.presser.press(actuator, release_deg, press_deg)
    }

    fn park(&mut self, actuator: Actuator, release_deg: u8) -> Result<(), ActuatorError> {
        self.presser.park(actuator, release_deg)
    }

    fn write_position(&mut self, actuator: Actuator, deg: u8) -> Result<(), ActuatorError> {
        self.presser.hold(actuator, deg)
    }

    fn set_fan(&mut self, on: bool) {
        self.fan.set(on);
    }
}

// ── RangingPort implementation ────────────────────────────────

impl<I2C: I2c, D: DelayNs> RangingPort for HardwareAdapter<I2C, D> {
    fn measure(&mut self) -> Result<RangeMeasurement, SensorError> {
        self.tof.measure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::hw_init;
    use crate::drivers::servo::ServoDriver;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};

    struct NoDelay;

    impl DelayNs for NoDelay {
        fn delay_ns(&mut self, _ns: u32) {}
    }

    /// Bus with nothing attached.
    struct DeadBus;

    impl ErrorType for DeadBus {
        type Error = ErrorKind;
    }

    impl I2c for DeadBus {
        fn transaction(
            &mut self,
            _address: u8,
            _operations: &mut [Operation<'_>],
        ) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    fn adapter() -> HardwareAdapter<DeadBus, NoDelay> {
        let presser = ButtonPresser::new(
            ServoDriver::new(hw_init::LEDC_CH_POWER_SERVO),
            ServoDriver::new(hw_init::LEDC_CH_VALUE_SERVO),
            NoDelay,
            PressTiming {
                dwell_ms: 350,
                settle_ms: 300,
            },
        );
        HardwareAdapter::new(presser, FanDriver::new(), TofSensor::new(DeadBus, 0x29))
    }

    #[test]
    fn presses_are_counted_and_parks_are_not() {
        let mut hw = adapter();
        hw.park(Actuator::Power, 55).unwrap();
        hw.press(Actuator::Power, 55, 25).unwrap();
        hw.press(Actuator::Value, 76, 50).unwrap();
        assert_eq!(hw.press_count(), 2);
    }

    #[test]
    fn missing_sensor_reports_bus_error() {
        let mut hw = adapter();
        assert_eq!(hw.measure(), Err(SensorError::Bus));
        assert!(!hw.sensor_ready());
    }

    #[test]
    fn out_of_range_position_is_rejected() {
        let mut hw = adapter();
        assert_eq!(
            hw.write_position(Actuator::Value, 200),
            Err(ActuatorError::InvalidAngle(200))
        );
    }
}
