//! Hardware timer module using ESP-IDF's esp_timer API.
//!
//! Creates periodic timers that push events into the lock-free SPSC queue.
//! On simulation targets the main loop sleeps instead.
//!
//! Timer callbacks execute in the ESP timer task context (not ISR), so
//! they can safely call push_event() which uses atomics only.

#[cfg(target_os = "espidf")]
use crate::events::{Event, push_event};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

#[cfg(target_os = "espidf")]
use log::{error, info};

#[cfg(target_os = "espidf")]
static mut CONTROL_TIMER: esp_timer_handle_t = core::ptr::null_mut();
#[cfg(target_os = "espidf")]
static mut TELEMETRY_TIMER: esp_timer_handle_t = core::ptr::null_mut();

#[cfg(target_os = "espidf")]
unsafe extern "C" fn control_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::ControlTick);
}

#[cfg(target_os = "espidf")]
unsafe extern "C" fn telemetry_tick_cb(_arg: *mut core::ffi::c_void) {
    push_event(Event::TelemetryTick);
}

/// Create and start one periodic timer, storing its handle in `slot`.
#[cfg(target_os = "espidf")]
unsafe fn start_periodic(
    slot: *mut esp_timer_handle_t,
    name: &'static [u8],
    callback: unsafe extern "C" fn(*mut core::ffi::c_void),
    period_us: u64,
) -> bool {
    let args = esp_timer_create_args_t {
        callback: Some(callback),
        arg: core::ptr::null_mut(),
        dispatch_method: esp_timer_dispatch_t_ESP_TIMER_TASK,
        name: name.as_ptr() as *const _,
        skip_unhandled_events: true,
    };
    // SAFETY: `slot` points at one of the static handles above; written
    // once at boot before the timer can fire.
    let ret = unsafe { esp_timer_create(&args, slot) };
    if ret != ESP_OK {
        error!("hw_timer: create failed (rc={})", ret);
        return false;
    }
    let ret = unsafe { esp_timer_start_periodic(*slot, period_us) };
    if ret != ESP_OK {
        error!("hw_timer: start failed (rc={})", ret);
        return false;
    }
    true
}

/// Start the control and telemetry timers.
///
/// Missed periods are skipped, not queued, so a long press never
/// produces a burst of catch-up ticks.
#[cfg(target_os = "espidf")]
pub fn start_timers(control_interval_ms: u32, telemetry_interval_secs: u32) {
    // SAFETY: the static handles are written here once at boot from the
    // single main-task context before any timer callbacks fire.  The
    // callbacks themselves only call push_event().
    unsafe {
        if !start_periodic(
            &raw mut CONTROL_TIMER,
            b"control\0",
            control_tick_cb,
            u64::from(control_interval_ms) * 1_000,
        ) {
            error!("hw_timer: continuing without control ticks");
            return;
        }
        if !start_periodic(
            &raw mut TELEMETRY_TIMER,
            b"telemetry\0",
            telemetry_tick_cb,
            u64::from(telemetry_interval_secs) * 1_000_000,
        ) {
            error!("hw_timer: continuing without telemetry ticks");
            return;
        }
    }
    info!(
        "hw_timer: control@{}ms + telemetry@{}s started",
        control_interval_ms, telemetry_interval_secs
    );
}

#[cfg(not(target_os = "espidf"))]
pub fn start_timers(_control_interval_ms: u32, _telemetry_interval_secs: u32) {
    log::info!("hw_timer(sim): timers not started (events driven by sleep loop)");
}

/// Stop all periodic timers.
#[cfg(target_os = "espidf")]
pub fn stop_timers() {
    // SAFETY: handles are valid if start_timers() succeeded; the null
    // check covers the failure paths.  Main task only.
    unsafe {
        let ct = CONTROL_TIMER;
        if !ct.is_null() {
            esp_timer_stop(ct);
        }
        let tt = TELEMETRY_TIMER;
        if !tt.is_null() {
            esp_timer_stop(tt);
        }
    }
}

#[cfg(not(target_os = "espidf"))]
pub fn stop_timers() {}
