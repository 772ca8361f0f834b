//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! Telemetry is emitted as a single JSON line so it can be scraped off
//! the console by a home-automation bridge.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => match serde_json::to_string(t) {
                Ok(json) => info!("TELEM | {}", json),
                Err(e) => warn!("TELEM | encode failed: {}", e),
            },
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::StatusChanged(status) => {
                info!("STATUS | {}", status);
            }
            AppEvent::PowerSwitchChanged(on) => {
                info!("POWER | switch={}", if *on { "ON" } else { "OFF" });
            }
            AppEvent::IntensityChanged(percent) => {
                info!("INTENSITY | {}%", percent);
            }
            AppEvent::LevelChanged(percent) => {
                info!("LEVEL | {}%", percent);
            }
            AppEvent::FanChanged(on) => {
                info!("FAN | {}", if *on { "ON" } else { "OFF" });
            }
            AppEvent::MaintenanceChanged(active) => {
                info!("MAINT | {}", if *active { "entered" } else { "left" });
            }
            AppEvent::Started(status) => {
                info!("START | initial_status={}", status);
            }
        }
    }
}
