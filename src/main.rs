//! Stovectl Firmware — Main Entry Point
//!
//! Hexagonal architecture with a timer-driven event loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HardwareAdapter        LogEventSink   NvsAdapter   Esp32Time  │
//! │  (Actuator+Ranging)     (EventSink)    (Config+NVS)            │
//! │  Console thread ──▶ CommandInbox                               │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  Power FSM · Intensity · Level                         │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  esp_timer ──▶ event queue ──▶ loop (ControlTick/TelemetryTick)│
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::Result;
use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use log::{error, info, warn};

use stovectl::adapters::console;
use stovectl::adapters::hardware::HardwareAdapter;
use stovectl::adapters::log_sink::LogEventSink;
use stovectl::adapters::nvs::NvsAdapter;
use stovectl::adapters::time::Esp32TimeAdapter;
use stovectl::app::commands::AppCommand;
use stovectl::app::events::AppEvent;
use stovectl::app::inbox::COMMAND_INBOX;
use stovectl::app::ports::{ConfigPort, EventSink};
use stovectl::app::service::AppService;
use stovectl::config::StoveConfig;
use stovectl::drivers::fan::FanDriver;
use stovectl::drivers::servo::{ButtonPresser, PressTiming, ServoDriver};
use stovectl::drivers::{hw_init, hw_timer, watchdog::Watchdog};
use stovectl::events::{self, Event};
use stovectl::pins;
use stovectl::sensors::tof::TofSensor;

/// Idle sleep between loop iterations; keeps the idle task fed.
const LOOP_IDLE_MS: u32 = 10;

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  Stovectl v{}                        ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let mut nvs = match NvsAdapter::new() {
        Ok(n) => n,
        Err(e) => {
            warn!("NVS init failed ({}), running with defaults and no persistence", e);
            NvsAdapter::default()
        }
    };
    let config = match nvs.load() {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            StoveConfig::default()
        }
    };

    // ── 3. Initialise hardware peripherals ────────────────────
    if let Err(e) = hw_init::init_peripherals() {
        // Without servo PWM the remote is useless.  Halt and let the
        // watchdog reset us.
        error!("HAL init failed: {} — halting", e);
        #[allow(clippy::empty_loop)]
        loop {}
    }

    // The HAL hands out pins as typed singletons, so the numbers in
    // `pins` can't select them.  Keep gpio8/gpio9 in step with the map.
    const _: () = assert!(pins::I2C_SDA_GPIO == 8 && pins::I2C_SCL_GPIO == 9);
    let peripherals = Peripherals::take()?;
    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio8,
        peripherals.pins.gpio9,
        &I2cConfig::new().baudrate(Hertz(pins::I2C_FREQ_HZ)),
    )?;

    let mut tof = TofSensor::new(i2c, pins::TOF_I2C_ADDR);
    if let Err(e) = tof.init() {
        // Level sampling keeps retrying bring-up on every tick.
        warn!("Ranging sensor init failed: {}", e);
    }

    let presser = ButtonPresser::new(
        ServoDriver::new(hw_init::LEDC_CH_POWER_SERVO),
        ServoDriver::new(hw_init::LEDC_CH_VALUE_SERVO),
        FreeRtos,
        PressTiming::from(&config),
    );
    let mut hw = HardwareAdapter::new(presser, FanDriver::new(), tof);
    let mut log_sink = LogEventSink::new();
    let time = Esp32TimeAdapter::new();

    // ── 4. Construct and start the app service ────────────────
    let mut app = AppService::new(config.clone());
    app.start(time.uptime_ms(), &mut hw, &mut nvs, &mut log_sink);

    // ── 5. Command console, timers, watchdog ──────────────────
    std::thread::Builder::new()
        .name("console".into())
        .stack_size(console::CONSOLE_STACK_SIZE)
        .spawn(|| console::run(std::io::stdin().lock()))?;

    hw_timer::start_timers(config.control_loop_interval_ms, config.telemetry_interval_secs);
    let watchdog = Watchdog::new(config.watchdog_timeout_ms);

    info!("System ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    loop {
        // Commands first so the last request before a tick wins.
        for cmd in COMMAND_INBOX.take_all() {
            let retimed = matches!(cmd, AppCommand::UpdateConfig(_));
            app.handle_command(cmd, &mut hw, &mut nvs, &mut log_sink);
            if retimed {
                hw.set_press_timing(PressTiming::from(&app.current_config()));
            }
        }

        events::drain_events(|event| match event {
            Event::ControlTick => {
                app.tick(time.uptime_ms(), &mut hw, &mut nvs, &mut log_sink);
                app.auto_save_if_needed(&nvs);
            }
            Event::TelemetryTick => {
                let t = app.build_telemetry(time.uptime_ms());
                log_sink.emit(&AppEvent::Telemetry(t));
            }
        });

        // Feed watchdog on every iteration.
        watchdog.feed();
        FreeRtos::delay_ms(LOOP_IDLE_MS);
    }
}
