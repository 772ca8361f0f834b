//! GPIO / peripheral pin assignments for the stove remote board.
//!
//! Single source of truth — every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

// ---------------------------------------------------------------------------
// Servo actuators (hobby servos, 50 Hz PWM)
// ---------------------------------------------------------------------------

/// Servo arm over the stove's power button.
pub const POWER_SERVO_GPIO: i32 = 13;
/// Servo arm between the (+) and (−) buttons.  One arm, two press angles.
pub const VALUE_SERVO_GPIO: i32 = 12;

// ---------------------------------------------------------------------------
// Fan relay
// ---------------------------------------------------------------------------

/// Digital output: HIGH = room fan on.
pub const FAN_GPIO: i32 = 4;

// ---------------------------------------------------------------------------
// I²C bus — VL53L0X time-of-flight sensor over the hopper
// ---------------------------------------------------------------------------

/// Must match the typed pins passed to `I2cDriver::new` in `main`.
pub const I2C_SDA_GPIO: i32 = 8;
pub const I2C_SCL_GPIO: i32 = 9;
/// I²C bus clock (fast mode).
pub const I2C_FREQ_HZ: u32 = 400_000;
/// Factory default 7-bit address of the VL53L0X.
pub const TOF_I2C_ADDR: u8 = 0x29;

// ---------------------------------------------------------------------------
// Servo PWM configuration
// ---------------------------------------------------------------------------

/// Standard hobby-servo frame rate (20 ms period).
pub const SERVO_PWM_FREQ_HZ: u32 = 50;
/// LEDC timer resolution for the servo timer.  14 bits gives ~1.2 µs steps.
pub const SERVO_PWM_RESOLUTION_BITS: u32 = 14;
/// Pulse width at 0°.
pub const SERVO_MIN_PULSE_US: u32 = 544;
/// Pulse width at 180°.
pub const SERVO_MAX_PULSE_US: u32 = 2400;
/// Full PWM frame length at `SERVO_PWM_FREQ_HZ`.
pub const SERVO_FRAME_US: u32 = 1_000_000 / SERVO_PWM_FREQ_HZ;
