//! VL53L0X time-of-flight ranging sensor driver.
//!
//! Mounted in the hopper lid, looking down at the pellets.  Bring-up
//! follows the vendor sequence:
//!
//! 1. **data init**: model check, 2V8 I/O, stop-variable capture
//! 2. **static init**: reference SPAD selection, default tuning block,
//!    interrupt routing, sequence-step timing
//! 3. **reference calibration**: VHV then phase
//! 4. **high-accuracy profile**: 200 ms timing budget, 0.25 MCPS
//!    signal-rate limit, 18 mm sigma limit
//!
//! After that each call runs one blocking single-shot measurement.
//! The sigma limit is not a device register; the estimate is computed
//! here from the result block and folded into [`RangeStatus`].
//!
//! ## Dual-target design
//!
//! Generic over any `embedded_hal::i2c::I2c`.  On ESP-IDF the main loop
//! passes an `I2cDriver`; host tests pass a paged register-map mock.

use embedded_hal::i2c::{Error as _, I2c};
use log::{debug, info};

use crate::error::{Error, SensorError};

use super::{RangeMeasurement, RangeStatus};

mod reg {
    pub const SYSRANGE_START: u8 = 0x00;
    pub const SYSTEM_SEQUENCE_CONFIG: u8 = 0x01;
    pub const SYSTEM_INTERRUPT_CONFIG_GPIO: u8 = 0x0A;
    pub const SYSTEM_INTERRUPT_CLEAR: u8 = 0x0B;
    pub const RESULT_INTERRUPT_STATUS: u8 = 0x13;
    /// Start of the 12-byte result block.
    pub const RESULT_RANGE_STATUS: u8 = 0x14;
    pub const FINAL_RANGE_MIN_COUNT_RATE_RTN_LIMIT: u8 = 0x44;
    pub const MSRC_CONFIG_TIMEOUT_MACROP: u8 = 0x46;
    pub const DYNAMIC_SPAD_NUM_REQUESTED_REF_SPAD: u8 = 0x4E;
    pub const DYNAMIC_SPAD_REF_EN_START_OFFSET: u8 = 0x4F;
    pub const PRE_RANGE_CONFIG_VCSEL_PERIOD: u8 = 0x50;
    pub const PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI: u8 = 0x51;
    pub const MSRC_CONFIG_CONTROL: u8 = 0x60;
    pub const FINAL_RANGE_CONFIG_VCSEL_PERIOD: u8 = 0x70;
    pub const FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI: u8 = 0x71;
    pub const POWER_MANAGEMENT_GO1: u8 = 0x80;
    pub const SPAD_INFO_STROBE: u8 = 0x83;
    pub const GPIO_HV_MUX_ACTIVE_HIGH: u8 = 0x84;
    pub const I2C_MODE: u8 = 0x88;
    pub const VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV: u8 = 0x89;
    pub const STOP_VARIABLE: u8 = 0x91;
    pub const SPAD_INFO: u8 = 0x92;
    pub const GLOBAL_CONFIG_SPAD_ENABLES_REF_0: u8 = 0xB0;
    pub const GLOBAL_CONFIG_REF_EN_START_SELECT: u8 = 0xB6;
    pub const IDENTIFICATION_MODEL_ID: u8 = 0xC0;
    pub const PAGE_SELECT: u8 = 0xFF;
}

const MODEL_ID: u8 = 0xEE;

/// Upper bound on status polls per measurement.  A 200 ms single shot
/// at 400 kHz takes a few thousand polls.
const MAX_POLLS: u32 = 10_000;

/// Signal-rate limit for the high-accuracy profile: 0.25 MCPS in Q9.7.
const HIGH_ACCURACY_SIGNAL_RATE_LIMIT: u16 = 32;
/// Timing budget for the high-accuracy profile.
pub const HIGH_ACCURACY_TIMING_BUDGET_US: u32 = 200_000;
/// Sigma limit for the high-accuracy profile.
pub const HIGH_ACCURACY_SIGMA_LIMIT_MM: f32 = 18.0;

const MIN_TIMING_BUDGET_US: u32 = 20_000;

/// Per-step overheads of one ranging sequence, in µs.
mod overhead {
    pub const START: u32 = 1910;
    pub const END: u32 = 960;
    pub const MSRC: u32 = 660;
    pub const TCC: u32 = 590;
    pub const DSS: u32 = 690;
    pub const PRE_RANGE: u32 = 660;
    pub const FINAL_RANGE: u32 = 550;
}

/// Vendor default tuning block, applied during static init.  Pairs are
/// `(register, value)`; `0xFF` writes switch register pages.
#[rustfmt::skip]
const DEFAULT_TUNING: &[(u8, u8)] = &[
    (0xFF, 0x01), (0x00, 0x00),
    (0xFF, 0x00), (0x09, 0x00), (0x10, 0x00), (0x11, 0x00),
    (0x24, 0x01), (0x25, 0xFF), (0x75, 0x00),
    (0xFF, 0x01), (0x4E, 0x2C), (0x48, 0x00), (0x30, 0x20),
    (0xFF, 0x00), (0x30, 0x09), (0x54, 0x00), (0x31, 0x04),
    (0x32, 0x03), (0x40, 0x83), (0x46, 0x25), (0x60, 0x00),
    (0x27, 0x00), (0x50, 0x06), (0x51, 0x00), (0x52, 0x96),
    (0x56, 0x08), (0x57, 0x30), (0x61, 0x00), (0x62, 0x00),
    (0x64, 0x00), (0x65, 0x00), (0x66, 0xA0),
    (0xFF, 0x01), (0x22, 0x32), (0x47, 0x14), (0x49, 0xFF), (0x4A, 0x00),
    (0xFF, 0x00), (0x7A, 0x0A), (0x7B, 0x00), (0x78, 0x21),
    (0xFF, 0x01), (0x23, 0x34), (0x42, 0x00), (0x44, 0xFF),
    (0x45, 0x26), (0x46, 0x05), (0x40, 0x40), (0x0E, 0x06),
    (0x20, 0x1A), (0x43, 0x40),
    (0xFF, 0x00), (0x34, 0x03), (0x35, 0x44),
    (0xFF, 0x01), (0x31, 0x04), (0x4B, 0x09), (0x4C, 0x05), (0x4D, 0x04),
    (0xFF, 0x00), (0x44, 0x00), (0x45, 0x20), (0x47, 0x08),
    (0x48, 0x28), (0x67, 0x00), (0x70, 0x04), (0x71, 0x01),
    (0x72, 0xFE), (0x76, 0x00), (0x77, 0x00),
    (0xFF, 0x01), (0x0D, 0x01),
    (0xFF, 0x00), (0x80, 0x01), (0x01, 0xF8),
    (0xFF, 0x01), (0x8E, 0x01), (0x00, 0x01), (0xFF, 0x00), (0x80, 0x00),
];

// ---------------------------------------------------------------------------
// Sequence steps and timeouts
// ---------------------------------------------------------------------------

/// Which steps of the ranging sequence are enabled
/// (`SYSTEM_SEQUENCE_CONFIG`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SequenceSteps {
    tcc: bool,
    dss: bool,
    msrc: bool,
    pre_range: bool,
    final_range: bool,
}

impl SequenceSteps {
    fn from_config(cfg: u8) -> Self {
        Self {
            tcc: cfg & 0x10 != 0,
            dss: cfg & 0x08 != 0,
            msrc: cfg & 0x04 != 0,
            pre_range: cfg & 0x40 != 0,
            final_range: cfg & 0x80 != 0,
        }
    }
}

/// Step timeouts as programmed in the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SequenceTimeouts {
    pub pre_range_vcsel_pclks: u16,
    pub final_range_vcsel_pclks: u16,
    pub msrc_dss_tcc_us: u32,
    pub pre_range_mclks: u16,
    pub pre_range_us: u32,
    /// Final-range length excluding the pre-range part.
    pub final_range_mclks: u16,
    pub final_range_us: u32,
}

fn decode_vcsel_period(reg_val: u8) -> u16 {
    (u16::from(reg_val) + 1) << 1
}

/// Macro period in ns for a VCSEL period given in PCLKs.
fn macro_period_ns(vcsel_pclks: u16) -> u32 {
    (2304 * u32::from(vcsel_pclks) * 1655 + 500) / 1000
}

fn mclks_to_us(mclks: u16, vcsel_pclks: u16) -> u32 {
    ((u64::from(mclks) * u64::from(macro_period_ns(vcsel_pclks)) + 500) / 1000) as u32
}

fn us_to_mclks(us: u32, vcsel_pclks: u16) -> u32 {
    let macro_ns = macro_period_ns(vcsel_pclks);
    (us * 1000 + macro_ns / 2) / macro_ns
}

/// Timeout register format: `(lsb << msb) + 1` MCLKs.
fn decode_timeout(reg_val: u16) -> u16 {
    let lsb = u32::from(reg_val & 0x00FF);
    let msb = u32::from(reg_val >> 8).min(16);
    ((lsb << msb) + 1).min(u32::from(u16::MAX)) as u16
}

fn encode_timeout(mclks: u32) -> u16 {
    if mclks == 0 {
        return 0;
    }
    let mut lsb = mclks - 1;
    let mut msb = 0u16;
    while lsb & 0xFFFF_FF00 != 0 {
        lsb >>= 1;
        msb += 1;
    }
    (msb << 8) | (lsb & 0xFF) as u16
}

// ---------------------------------------------------------------------------
// Sigma estimate
// ---------------------------------------------------------------------------

const PULSE_EFFECTIVE_WIDTH_NS: f32 = 8.0;
const AMBIENT_EFFECTIVE_WIDTH_NS: f32 = 6.0;
const REF_INTEGRATION_MS: f32 = 25.0;
const PLL_PERIOD_PS: f32 = 1655.0;
const SPEED_OF_LIGHT_MM_PER_NS: f32 = 299.7;
const AMBIENT_TO_SIGNAL_RATIO_MAX: f32 = 102.4;
const SIGMA_RTN_MAX_MM: f32 = 937.5;
/// Reported when there is no return signal at all.
pub const SIGMA_MAX_MM: f32 = 655.53;

/// Estimated range standard deviation in mm.
///
/// The return term grows with the ambient-to-signal ratio and shrinks
/// with the number of photon events collected during the VCSEL-on time.
/// The reference term depends only on the integration time.
/// Crosstalk compensation is off, so the pulse-width multiplier is 1.
pub fn sigma_estimate_mm(signal_mcps: f32, ambient_mcps: f32, t: &SequenceTimeouts) -> f32 {
    if signal_mcps <= 0.0 {
        return SIGMA_MAX_MM;
    }

    let vcsel_width: f32 = if t.final_range_vcsel_pclks == 8 { 2.0 } else { 3.0 };
    let mclks = f32::from(t.pre_range_mclks) + f32::from(t.final_range_mclks);
    let peak_vcsel_us = vcsel_width * 2048.0 * mclks * PLL_PERIOD_PS / 1.0e6;
    let events = (signal_mcps * peak_vcsel_us).max(1.0);

    let ratio = (ambient_mcps / signal_mcps).min(AMBIENT_TO_SIGNAL_RATIO_MAX);
    let pulse = PULSE_EFFECTIVE_WIDTH_NS;
    let ambient = ratio * AMBIENT_EFFECTIVE_WIDTH_NS;
    let spread_ns = (pulse * pulse + ambient * ambient).sqrt();
    let sigma_rtn = (spread_ns / (2.0 * (12.0 * events).sqrt()) * SPEED_OF_LIGHT_MM_PER_NS)
        .min(SIGMA_RTN_MAX_MM);

    let integration_ms = ((t.final_range_us + t.pre_range_us) as f32 / 1000.0).max(1.0);
    let sigma_ref = (REF_INTEGRATION_MS / integration_ms).sqrt();

    (sigma_rtn * sigma_rtn + sigma_ref * sigma_ref)
        .sqrt()
        .min(SIGMA_MAX_MM)
}

/// Q9.7 fixed point to MCPS.
fn q9_7_to_mcps(raw: u16) -> f32 {
    f32::from(raw) / 128.0
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

pub struct TofSensor<I2C> {
    i2c: I2C,
    addr: u8,
    stop_variable: u8,
    timing_budget_us: u32,
    timeouts: SequenceTimeouts,
    sigma_limit_mm: f32,
    ready: bool,
}

impl<I2C: I2c> TofSensor<I2C> {
    pub fn new(i2c: I2C, addr: u8) -> Self {
        Self {
            i2c,
            addr,
            stop_variable: 0,
            timing_budget_us: 0,
            timeouts: SequenceTimeouts::default(),
            sigma_limit_mm: HIGH_ACCURACY_SIGMA_LIMIT_MM,
            ready: false,
        }
    }

    /// Bring the sensor up and apply the high-accuracy profile.  Safe to
    /// call repeatedly.
    pub fn init(&mut self) -> crate::error::Result<()> {
        self.ready = false;

        self.data_init()?;
        self.static_init()?;
        self.reference_calibration()?;
        self.configure_high_accuracy()?;

        self.ready = true;
        info!(
            "VL53L0X ready (stop variable 0x{:02X}, budget {} us)",
            self.stop_variable, self.timing_budget_us
        );
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Timing budget last programmed into the device.
    pub fn timing_budget_us(&self) -> u32 {
        self.timing_budget_us
    }

    /// Run one single-shot measurement.
    ///
    /// If the sensor never came up, bring-up is retried first so a
    /// sensor plugged in late recovers without a reboot.
    pub fn measure(&mut self) -> Result<RangeMeasurement, SensorError> {
        if !self.ready {
            self.init().map_err(|e| {
                debug!("VL53L0X bring-up retry failed: {}", e);
                SensorError::Bus
            })?;
        }

        self.enter_private_page()?;
        self.write_reg(reg::STOP_VARIABLE, self.stop_variable)?;
        self.leave_private_page()?;

        self.write_reg(reg::SYSRANGE_START, 0x01)?;
        self.poll_until(reg::SYSRANGE_START, |v| v & 0x01 == 0)?;
        self.poll_until(reg::RESULT_INTERRUPT_STATUS, |v| v & 0x07 != 0)?;

        let mut block = [0u8; 12];
        self.read_regs(reg::RESULT_RANGE_STATUS, &mut block)?;
        self.write_reg(reg::SYSTEM_INTERRUPT_CLEAR, 0x01)?;

        let device_status = (block[0] & 0x78) >> 3;
        let signal_mcps = q9_7_to_mcps(u16::from_be_bytes([block[6], block[7]]));
        let ambient_mcps = q9_7_to_mcps(u16::from_be_bytes([block[8], block[9]]));
        let distance_mm = u16::from_be_bytes([block[10], block[11]]);

        let mut status = RangeStatus::from_device_status(device_status);
        if status == RangeStatus::Valid {
            let sigma = sigma_estimate_mm(signal_mcps, ambient_mcps, &self.timeouts);
            if sigma > self.sigma_limit_mm {
                debug!("VL53L0X sigma {:.1} mm over limit", sigma);
                status = RangeStatus::SigmaFail;
            }
        }

        Ok(RangeMeasurement {
            distance_mm,
            status,
        })
    }

    /// Give the bus back (e.g. to share it with another device).
    pub fn release(self) -> I2C {
        self.i2c
    }

    // ── Bring-up stages ───────────────────────────────────────

    fn data_init(&mut self) -> crate::error::Result<()> {
        let model = self.read_reg(reg::IDENTIFICATION_MODEL_ID)?;
        if model != MODEL_ID {
            return Err(Error::Init("VL53L0X model id mismatch"));
        }

        // Switch the I/O pads to 2V8 mode.
        let vhv = self.read_reg(reg::VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV)?;
        self.write_reg(reg::VHV_CONFIG_PAD_SCL_SDA_EXTSUP_HV, vhv | 0x01)?;

        // Standard I²C mode.
        self.write_reg(reg::I2C_MODE, 0x00)?;

        self.enter_private_page()?;
        self.stop_variable = self.read_reg(reg::STOP_VARIABLE)?;
        self.leave_private_page()?;

        // Disable the MSRC and pre-range signal-rate limit checks.
        let msrc = self.read_reg(reg::MSRC_CONFIG_CONTROL)?;
        self.write_reg(reg::MSRC_CONFIG_CONTROL, msrc | 0x12)?;

        self.write_reg16(
            reg::FINAL_RANGE_MIN_COUNT_RATE_RTN_LIMIT,
            HIGH_ACCURACY_SIGNAL_RATE_LIMIT,
        )?;
        self.write_reg(reg::SYSTEM_SEQUENCE_CONFIG, 0xFF)?;
        Ok(())
    }

    fn static_init(&mut self) -> crate::error::Result<()> {
        let (spad_count, aperture) = self.spad_info()?;
        self.configure_reference_spads(spad_count, aperture)?;

        for &(register, value) in DEFAULT_TUNING {
            self.write_reg(register, value)?;
        }

        // New-sample-ready interrupt, active low.
        self.write_reg(reg::SYSTEM_INTERRUPT_CONFIG_GPIO, 0x04)?;
        let mux = self.read_reg(reg::GPIO_HV_MUX_ACTIVE_HIGH)?;
        self.write_reg(reg::GPIO_HV_MUX_ACTIVE_HIGH, mux & !0x10)?;
        self.write_reg(reg::SYSTEM_INTERRUPT_CLEAR, 0x01)?;

        let budget = self.read_timing_budget_us()?;
        // Drop MSRC and TCC from the sequence.
        self.write_reg(reg::SYSTEM_SEQUENCE_CONFIG, 0xE8)?;
        self.set_timing_budget_us(budget)?;
        Ok(())
    }

    fn reference_calibration(&mut self) -> crate::error::Result<()> {
        self.write_reg(reg::SYSTEM_SEQUENCE_CONFIG, 0x01)?;
        self.single_ref_calibration(0x40)
            .map_err(|_| Error::Init("VL53L0X VHV calibration failed"))?;

        self.write_reg(reg::SYSTEM_SEQUENCE_CONFIG, 0x02)?;
        self.single_ref_calibration(0x00)
            .map_err(|_| Error::Init("VL53L0X phase calibration failed"))?;

        self.write_reg(reg::SYSTEM_SEQUENCE_CONFIG, 0xE8)?;
        Ok(())
    }

    fn configure_high_accuracy(&mut self) -> crate::error::Result<()> {
        self.write_reg16(
            reg::FINAL_RANGE_MIN_COUNT_RATE_RTN_LIMIT,
            HIGH_ACCURACY_SIGNAL_RATE_LIMIT,
        )?;
        self.sigma_limit_mm = HIGH_ACCURACY_SIGMA_LIMIT_MM;
        self.set_timing_budget_us(HIGH_ACCURACY_TIMING_BUDGET_US)
    }

    // ── Reference SPADs ───────────────────────────────────────

    /// Read the factory reference-SPAD count and type from NVM.
    fn spad_info(&mut self) -> Result<(u8, bool), SensorError> {
        self.write_reg(reg::POWER_MANAGEMENT_GO1, 0x01)?;
        self.write_reg(reg::PAGE_SELECT, 0x01)?;
        self.write_reg(reg::SYSRANGE_START, 0x00)?;

        self.write_reg(reg::PAGE_SELECT, 0x06)?;
        let strobe = self.read_reg(reg::SPAD_INFO_STROBE)?;
        self.write_reg(reg::SPAD_INFO_STROBE, strobe | 0x04)?;
        self.write_reg(reg::PAGE_SELECT, 0x07)?;
        self.write_reg(0x81, 0x01)?;
        self.write_reg(reg::POWER_MANAGEMENT_GO1, 0x01)?;
        self.write_reg(0x94, 0x6B)?;
        self.write_reg(reg::SPAD_INFO_STROBE, 0x00)?;
        self.poll_until(reg::SPAD_INFO_STROBE, |v| v != 0)?;
        self.write_reg(reg::SPAD_INFO_STROBE, 0x01)?;
        let info = self.read_reg(reg::SPAD_INFO)?;

        self.write_reg(0x81, 0x00)?;
        self.write_reg(reg::PAGE_SELECT, 0x06)?;
        let strobe = self.read_reg(reg::SPAD_INFO_STROBE)?;
        self.write_reg(reg::SPAD_INFO_STROBE, strobe & !0x04)?;
        self.write_reg(reg::PAGE_SELECT, 0x01)?;
        self.write_reg(reg::SYSRANGE_START, 0x01)?;
        self.write_reg(reg::PAGE_SELECT, 0x00)?;
        self.write_reg(reg::POWER_MANAGEMENT_GO1, 0x00)?;

        Ok((info & 0x7F, info & 0x80 != 0))
    }

    /// Enable exactly `count` reference SPADs from the factory map,
    /// skipping the first 12 when they are aperture SPADs.
    fn configure_reference_spads(&mut self, count: u8, aperture: bool) -> Result<(), SensorError> {
        let mut map = [0u8; 6];
        self.read_regs(reg::GLOBAL_CONFIG_SPAD_ENABLES_REF_0, &mut map)?;

        self.write_reg(reg::PAGE_SELECT, 0x01)?;
        self.write_reg(reg::DYNAMIC_SPAD_REF_EN_START_OFFSET, 0x00)?;
        self.write_reg(reg::DYNAMIC_SPAD_NUM_REQUESTED_REF_SPAD, 0x2C)?;
        self.write_reg(reg::PAGE_SELECT, 0x00)?;
        self.write_reg(reg::GLOBAL_CONFIG_REF_EN_START_SELECT, 0xB4)?;

        select_reference_spads(&mut map, count, aperture);
        self.write_regs(reg::GLOBAL_CONFIG_SPAD_ENABLES_REF_0, &map)
    }

    fn single_ref_calibration(&mut self, vhv_init: u8) -> Result<(), SensorError> {
        self.write_reg(reg::SYSRANGE_START, 0x01 | vhv_init)?;
        self.poll_until(reg::RESULT_INTERRUPT_STATUS, |v| v & 0x07 != 0)?;
        self.write_reg(reg::SYSTEM_INTERRUPT_CLEAR, 0x01)?;
        self.write_reg(reg::SYSRANGE_START, 0x00)
    }

    // ── Timing budget ─────────────────────────────────────────

    fn sequence_steps(&mut self) -> Result<SequenceSteps, SensorError> {
        Ok(SequenceSteps::from_config(
            self.read_reg(reg::SYSTEM_SEQUENCE_CONFIG)?,
        ))
    }

    fn sequence_timeouts(&mut self, steps: SequenceSteps) -> Result<SequenceTimeouts, SensorError> {
        let pre_vcsel = decode_vcsel_period(self.read_reg(reg::PRE_RANGE_CONFIG_VCSEL_PERIOD)?);
        let msrc_mclks = u16::from(self.read_reg(reg::MSRC_CONFIG_TIMEOUT_MACROP)?) + 1;
        let pre_mclks = decode_timeout(self.read_reg16(reg::PRE_RANGE_CONFIG_TIMEOUT_MACROP_HI)?);

        let final_vcsel = decode_vcsel_period(self.read_reg(reg::FINAL_RANGE_CONFIG_VCSEL_PERIOD)?);
        let mut final_mclks =
            decode_timeout(self.read_reg16(reg::FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI)?);
        if steps.pre_range {
            final_mclks = final_mclks.saturating_sub(pre_mclks);
        }

        Ok(SequenceTimeouts {
            pre_range_vcsel_pclks: pre_vcsel,
            final_range_vcsel_pclks: final_vcsel,
            msrc_dss_tcc_us: mclks_to_us(msrc_mclks, pre_vcsel),
            pre_range_mclks: pre_mclks,
            pre_range_us: mclks_to_us(pre_mclks, pre_vcsel),
            final_range_mclks: final_mclks,
            final_range_us: mclks_to_us(final_mclks, final_vcsel),
        })
    }

    /// Read back the effective timing budget from the programmed steps.
    pub fn read_timing_budget_us(&mut self) -> Result<u32, SensorError> {
        let steps = self.sequence_steps()?;
        let t = self.sequence_timeouts(steps)?;
        self.timeouts = t;

        let mut budget = overhead_except_final(steps, &t);
        if steps.final_range {
            budget += t.final_range_us + overhead::FINAL_RANGE;
        }
        self.timing_budget_us = budget;
        Ok(budget)
    }

    /// Program the final-range timeout so the whole sequence fits in
    /// `budget_us`.
    pub fn set_timing_budget_us(&mut self, budget_us: u32) -> crate::error::Result<()> {
        if budget_us < MIN_TIMING_BUDGET_US {
            return Err(Error::Config("VL53L0X timing budget below 20 ms"));
        }

        let steps = self.sequence_steps()?;
        let t = self.sequence_timeouts(steps)?;

        if steps.final_range {
            let used = overhead_except_final(steps, &t) + overhead::FINAL_RANGE;
            if used > budget_us {
                return Err(Error::Config("VL53L0X timing budget too short"));
            }
            let mut final_mclks = us_to_mclks(budget_us - used, t.final_range_vcsel_pclks);
            if steps.pre_range {
                final_mclks += u32::from(t.pre_range_mclks);
            }
            self.write_reg16(
                reg::FINAL_RANGE_CONFIG_TIMEOUT_MACROP_HI,
                encode_timeout(final_mclks),
            )?;
        }

        // Cache the timeouts actually programmed for the sigma estimate.
        self.read_timing_budget_us()?;
        self.timing_budget_us = budget_us;
        Ok(())
    }

    // ── Register access ───────────────────────────────────────

    fn enter_private_page(&mut self) -> Result<(), SensorError> {
        self.write_reg(reg::POWER_MANAGEMENT_GO1, 0x01)?;
        self.write_reg(reg::PAGE_SELECT, 0x01)?;
        self.write_reg(reg::SYSRANGE_START, 0x00)
    }

    fn leave_private_page(&mut self) -> Result<(), SensorError> {
        self.write_reg(reg::SYSRANGE_START, 0x01)?;
        self.write_reg(reg::PAGE_SELECT, 0x00)?;
        self.write_reg(reg::POWER_MANAGEMENT_GO1, 0x00)
    }

    fn poll_until(&mut self, register: u8, done: impl Fn(u8) -> bool) -> Result<(), SensorError> {
        for _ in 0..MAX_POLLS {
            if done(self.read_reg(register)?) {
                return Ok(());
            }
        }
        Err(SensorError::Timeout)
    }

    fn read_reg(&mut self, register: u8) -> Result<u8, SensorError> {
        let mut buf = [0u8; 1];
        self.read_regs(register, &mut buf)?;
        Ok(buf[0])
    }

    fn read_reg16(&mut self, register: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.read_regs(register, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    fn read_regs(&mut self, register: u8, buf: &mut [u8]) -> Result<(), SensorError> {
        self.i2c
            .write_read(self.addr, &[register], buf)
            .map_err(bus_error)
    }

    fn write_reg(&mut self, register: u8, value: u8) -> Result<(), SensorError> {
        self.i2c
            .write(self.addr, &[register, value])
            .map_err(bus_error)
    }

    fn write_reg16(&mut self, register: u8, value: u16) -> Result<(), SensorError> {
        let [hi, lo] = value.to_be_bytes();
        self.i2c
            .write(self.addr, &[register, hi, lo])
            .map_err(bus_error)
    }

    /// Write up to six consecutive registers.
    fn write_regs(&mut self, register: u8, values: &[u8]) -> Result<(), SensorError> {
        let mut frame = [0u8; 7];
        let n = values.len().min(6);
        frame[0] = register;
        frame[1..=n].copy_from_slice(&values[..n]);
        self.i2c
            .write(self.addr, &frame[..=n])
            .map_err(bus_error)
    }
}

/// Sequence time spent outside the final-range step, overheads included.
fn overhead_except_final(steps: SequenceSteps, t: &SequenceTimeouts) -> u32 {
    let mut used = overhead::START + overhead::END;
    if steps.tcc {
        used += t.msrc_dss_tcc_us + overhead::TCC;
    }
    if steps.dss {
        used += 2 * (t.msrc_dss_tcc_us + overhead::DSS);
    } else if steps.msrc {
        used += t.msrc_dss_tcc_us + overhead::MSRC;
    }
    if steps.pre_range {
        used += t.pre_range_us + overhead::PRE_RANGE;
    }
    used
}

/// Keep the first `count` enabled SPADs of the 48-bit map, starting at 12
/// for aperture SPADs and at 0 otherwise.
fn select_reference_spads(map: &mut [u8; 6], count: u8, aperture: bool) {
    let first = if aperture { 12 } else { 0 };
    let mut enabled = 0u8;
    for i in 0..48usize {
        let (byte, bit) = (i / 8, i % 8);
        if i < first || enabled == count {
            map[byte] &= !(1 << bit);
        } else if (map[byte] >> bit) & 0x01 != 0 {
            enabled += 1;
        }
    }
}

fn bus_error(e: impl embedded_hal::i2c::Error) -> SensorError {
    debug!("VL53L0X I2C error: {:?}", e.kind());
    SensorError::Bus
}
