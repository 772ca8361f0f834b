//! Stove intensity reconciliation.
//!
//! The stove panel exposes intensity as 21 discrete steps (0–20) behind
//! a single (+)/(−) button pair with no read-back.  The controller keeps
//! the step the stove was last driven to (`applied`) and the step the
//! user asked for (`desired`), and closes the gap by at most one press
//! per control tick:
//!
//! ```text
//!   desired ─┐
//!            ├─ diff ──[enabled?]──▶ Step::Up / Step::Down ──▶ applied ± 1
//!   applied ─┘
//! ```

/// Highest intensity step on the stove panel.
pub const MAX_STEP: u8 = 20;

/// One button press worth of intensity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntensityController {
    desired: u8,
    applied: u8,
}

impl IntensityController {
    /// Start with both targets at `applied` so nothing is pressed until a
    /// new intensity is requested.
    pub fn new(applied: u8) -> Self {
        let applied = applied.min(MAX_STEP);
        Self {
            desired: applied,
            applied,
        }
    }

    /// Accept a 0–100 % request.  Quantised by integer division by 5;
    /// anything above 100 % is treated as 100 %.  Returns the new step.
    pub fn set_desired_percent(&mut self, percent: u8) -> u8 {
        self.desired = percent.min(100) / 5;
        self.desired
    }

    /// Advance one tick.  When `enabled` and a gap remains, `applied`
    /// moves one step toward `desired` and the press to issue is
    /// returned.
    pub fn tick(&mut self, enabled: bool) -> Option<Step> {
        if !enabled {
            return None;
        }
        let step = self.pending()?;
        match step {
            Step::Up => self.applied += 1,
            Step::Down => self.applied -= 1,
        }
        Some(step)
    }

    /// Direction of the next press, if any.
    pub fn pending(&self) -> Option<Step> {
        match self.desired.cmp(&self.applied) {
            core::cmp::Ordering::Greater => Some(Step::Up),
            core::cmp::Ordering::Less => Some(Step::Down),
            core::cmp::Ordering::Equal => None,
        }
    }

    pub fn desired(&self) -> u8 {
        self.desired
    }

    /// Desired step expressed as the 0–100 % the user sees.
    pub fn desired_percent(&self) -> u8 {
        self.desired * 5
    }

    pub fn applied(&self) -> u8 {
        self.applied
    }
}
