//! One-shot hardware peripheral initialization.
//!
//! Configures the fan GPIO and the LEDC timer/channels that generate the
//! servo pulses, using raw ESP-IDF sys calls.  Called once from `main()`
//! before the event loop starts.  The I²C bus for the ranging sensor is
//! owned by `esp-idf-hal` and set up in `main()`.

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::info;

use crate::error::ActuatorError;
use crate::pins;

// ── Error type ────────────────────────────────────────────────

/// Errors during one-shot peripheral initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HwInitError {
    GpioConfigFailed(i32),
    LedcTimerFailed(i32),
    LedcChannelFailed(i32),
}

impl core::fmt::Display for HwInitError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::GpioConfigFailed(rc) => write!(f, "GPIO config failed (rc={})", rc),
            Self::LedcTimerFailed(rc) => write!(f, "LEDC servo timer config failed (rc={})", rc),
            Self::LedcChannelFailed(rc) => write!(f, "LEDC servo channel config failed (rc={})", rc),
        }
    }
}

pub const LEDC_CH_POWER_SERVO: u32 = 0;
pub const LEDC_CH_VALUE_SERVO: u32 = 1;

#[cfg(target_os = "espidf")]
pub fn init_peripherals() -> Result<(), HwInitError> {
    // SAFETY: Called once from main() before event loop; single-threaded.
    unsafe {
        init_gpio_outputs()?;
        init_servo_ledc()?;
    }
    info!("hw_init: all peripherals configured");
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn init_peripherals() -> Result<(), HwInitError> {
    log::info!("hw_init(sim): peripheral init skipped");
    Ok(())
}

// ── GPIO Outputs ──────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_gpio_outputs() -> Result<(), HwInitError> {
    let cfg = gpio_config_t {
        pin_bit_mask: 1u64 << pins::FAN_GPIO,
        mode: gpio_mode_t_GPIO_MODE_OUTPUT,
        pull_up_en: gpio_pullup_t_GPIO_PULLUP_DISABLE,
        pull_down_en: gpio_pulldown_t_GPIO_PULLDOWN_DISABLE,
        intr_type: gpio_int_type_t_GPIO_INTR_DISABLE,
    };
    let ret = unsafe { gpio_config(&cfg) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::GpioConfigFailed(ret));
    }
    unsafe { gpio_set_level(pins::FAN_GPIO, 0) };

    info!("hw_init: fan output configured (GPIO{})", pins::FAN_GPIO);
    Ok(())
}

#[cfg(target_os = "espidf")]
pub fn gpio_write(pin: i32, high: bool) {
    // SAFETY: gpio_set_level writes to an already-configured output pin;
    // pin was validated during init_gpio_outputs(). Main-loop only.
    unsafe {
        gpio_set_level(pin, u32::from(high));
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn gpio_write(_pin: i32, _high: bool) {}

// ── LEDC servo PWM ────────────────────────────────────────────

#[cfg(target_os = "espidf")]
unsafe fn init_servo_ledc() -> Result<(), HwInitError> {
    // Timer 0: both servos (50 Hz, 14-bit)
    let timer = ledc_timer_config_t {
        speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
        timer_num: ledc_timer_t_LEDC_TIMER_0,
        duty_resolution: pins::SERVO_PWM_RESOLUTION_BITS,
        freq_hz: pins::SERVO_PWM_FREQ_HZ,
        clk_cfg: soc_periph_ledc_clk_src_legacy_t_LEDC_AUTO_CLK,
        ..Default::default()
    };
    let ret = unsafe { ledc_timer_config(&timer) };
    if ret != ESP_OK as i32 {
        return Err(HwInitError::LedcTimerFailed(ret));
    }

    let channels = [
        (LEDC_CH_POWER_SERVO, pins::POWER_SERVO_GPIO),
        (LEDC_CH_VALUE_SERVO, pins::VALUE_SERVO_GPIO),
    ];
    for (channel, gpio) in channels {
        let ret = unsafe {
            ledc_channel_config(&ledc_channel_config_t {
                speed_mode: ledc_mode_t_LEDC_LOW_SPEED_MODE,
                channel,
                timer_sel: ledc_timer_t_LEDC_TIMER_0,
                gpio_num: gpio,
                duty: 0,
                hpoint: 0,
                ..Default::default()
            })
        };
        if ret != ESP_OK as i32 {
            return Err(HwInitError::LedcChannelFailed(ret));
        }
        // Start detached: no pulses until the first attach.
        unsafe { ledc_stop(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, 0) };
    }

    info!(
        "hw_init: servo LEDC configured ({}Hz/{}-bit, power=CH0, value=CH1)",
        pins::SERVO_PWM_FREQ_HZ,
        pins::SERVO_PWM_RESOLUTION_BITS
    );
    Ok(())
}

/// LEDC duty for a pulse width at the servo frame rate.
pub fn pulse_to_duty(pulse_us: u32) -> u32 {
    let max_duty = (1u32 << pins::SERVO_PWM_RESOLUTION_BITS) - 1;
    (pulse_us * (1u32 << pins::SERVO_PWM_RESOLUTION_BITS) / pins::SERVO_FRAME_US).min(max_duty)
}

/// Emit `pulse_us` wide pulses on `channel`.  Starts the channel if it
/// was stopped.
#[cfg(target_os = "espidf")]
pub fn servo_set_pulse(channel: u32, pulse_us: u32) -> Result<(), ActuatorError> {
    // SAFETY: LEDC channels were configured in init_servo_ledc(); duty
    // register writes are race-free since only main loop calls this function.
    unsafe {
        let ret = ledc_set_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, pulse_to_duty(pulse_us));
        if ret != ESP_OK as i32 {
            return Err(ActuatorError::Pwm(ret));
        }
        let ret = ledc_update_duty(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel);
        if ret != ESP_OK as i32 {
            return Err(ActuatorError::Pwm(ret));
        }
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn servo_set_pulse(_channel: u32, _pulse_us: u32) -> Result<(), ActuatorError> {
    Ok(())
}

/// Stop pulses on `channel` and hold the line low.  The servo goes limp.
#[cfg(target_os = "espidf")]
pub fn servo_stop(channel: u32) -> Result<(), ActuatorError> {
    // SAFETY: see servo_set_pulse().
    let ret = unsafe { ledc_stop(ledc_mode_t_LEDC_LOW_SPEED_MODE, channel, 0) };
    if ret != ESP_OK as i32 {
        return Err(ActuatorError::Pwm(ret));
    }
    Ok(())
}

#[cfg(not(target_os = "espidf"))]
pub fn servo_stop(_channel: u32) -> Result<(), ActuatorError> {
    Ok(())
}
