//! Hopper fill-level estimator.
//!
//! Turns raw VL53L0X distances into a 0–100 % fill level:
//!
//! ```text
//!  raw mm ──[phase fail?]──[>= empty?]──▶ smooth (x10) ──▶ map ──▶ clamp ──▶ publish gate
//!              drop            drop
//! ```
//!
//! The smoothed distance is carried at 10x scale in integer arithmetic:
//! `s' = s * 9 / 10 + raw`, which settles at `10 * raw` for a constant
//! input, i.e. a 90/10 exponential average once divided back down.  The
//! first accepted sample seeds `s = 10 * raw` so the boot reading is not
//! dragged up from zero.
//!
//! Distance is inversely related to fill: `empty_mm` maps to 0 % and
//! `full_mm` to 100 %.

use log::debug;

use crate::config::StoveConfig;
use crate::error::SensorError;

use super::RangeMeasurement;

pub struct LevelEstimator {
    empty_mm: u16,
    full_mm: u16,
    /// Smoothed distance, millimetres x10.  `None` until the first
    /// accepted sample.
    smoothed_x10: Option<u32>,
    /// Most recent mapped level, published or not.
    level: Option<u8>,
    /// Last level handed to the outside world.
    published: Option<u8>,
}

impl LevelEstimator {
    pub fn new(config: &StoveConfig) -> Self {
        Self {
            empty_mm: config.level_empty_mm,
            full_mm: config.level_full_mm,
            smoothed_x10: None,
            level: None,
            published: None,
        }
    }

    /// Pick up new hopper geometry.  Smoothing state is kept.
    pub fn reconfigure(&mut self, config: &StoveConfig) {
        self.empty_mm = config.level_empty_mm;
        self.full_mm = config.level_full_mm;
    }

    /// Feed one measurement.
    ///
    /// Returns `Ok(Some(level))` when the caller should publish,
    /// `Ok(None)` when the sample was absorbed but publication is
    /// suppressed, and `Err` when the sample was discarded without
    /// touching any state.
    ///
    /// Publication happens only when the level differs from the last
    /// published value and either the stove is powered or this is the
    /// very first accepted sample.
    pub fn ingest(
        &mut self,
        m: RangeMeasurement,
        powered: bool,
    ) -> Result<Option<u8>, SensorError> {
        if m.status.is_phase_failure() {
            return Err(SensorError::PhaseFailure);
        }
        if m.distance_mm >= self.empty_mm {
            return Err(SensorError::OutOfRange);
        }

        let first_sample = self.smoothed_x10.is_none();
        let raw = u32::from(m.distance_mm);
        let smoothed = match self.smoothed_x10 {
            None => raw * 10,
            Some(s) => s * 9 / 10 + raw,
        };
        self.smoothed_x10 = Some(smoothed);

        let level = self.map_to_percent(smoothed);
        self.level = Some(level);

        debug!(
            "level: raw={}mm smoothed={} level={}% status={:?}",
            m.distance_mm, smoothed, level, m.status
        );

        if self.published != Some(level) && (powered || first_sample) {
            self.published = Some(level);
            Ok(Some(level))
        } else {
            Ok(None)
        }
    }

    /// Latest computed level (may be unpublished).
    pub fn level(&self) -> Option<u8> {
        self.level
    }

    /// Last level handed out for publication.
    pub fn published(&self) -> Option<u8> {
        self.published
    }

    /// Smoothed distance at 10x scale.
    pub fn smoothed_x10(&self) -> Option<u32> {
        self.smoothed_x10
    }

    fn map_to_percent(&self, smoothed_x10: u32) -> u8 {
        let distance = (smoothed_x10 / 10) as i32;
        let empty = i32::from(self.empty_mm);
        let full = i32::from(self.full_mm);
        let span = full - empty;
        if span == 0 {
            return 0;
        }
        ((distance - empty) * 100 / span).clamp(0, 100) as u8
    }
}
