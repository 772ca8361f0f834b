//! Sensor subsystem — the hopper ranging sensor and the fill-level
//! estimator built on top of it.
//!
//! [`tof`] talks to the VL53L0X over I²C and yields one
//! [`RangeMeasurement`] per call; [`level`] turns a stream of those into
//! a smoothed, gated 0–100 % fill level.

pub mod level;
pub mod tof;

/// Range status as reported by the VL53L0X, mapped to the vendor API's
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RangeStatus {
    Valid = 0,
    SigmaFail = 1,
    SignalFail = 2,
    MinRangeFail = 3,
    /// Phase wrapped — the reported distance is meaningless.
    PhaseFail = 4,
    HardwareFail = 5,
}

impl RangeStatus {
    /// Map the raw device status (bits 6:3 of `RESULT_RANGE_STATUS`) to a
    /// range status.
    pub fn from_device_status(device: u8) -> Self {
        match device {
            1..=3 => Self::HardwareFail,
            6 | 9 => Self::PhaseFail,
            8 | 10 => Self::MinRangeFail,
            4 => Self::SignalFail,
            _ => Self::Valid,
        }
    }

    /// Only phase failures carry unusable distances; every other status
    /// still reports a plausible value.
    pub fn is_phase_failure(self) -> bool {
        self == Self::PhaseFail
    }
}

/// One raw ranging result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeMeasurement {
    pub distance_mm: u16,
    pub status: RangeStatus,
}

impl RangeMeasurement {
    pub fn valid(distance_mm: u16) -> Self {
        Self {
            distance_mm,
            status: RangeStatus::Valid,
        }
    }
}
