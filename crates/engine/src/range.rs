use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Which boundary of the trim range an edit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeHandle {
    Start,
    End,
}

/// Selected `[start, end]` span of one asset.
///
/// Holds `0 <= start`, `start + min_gap <= end` and `end <= duration` after
/// every mutation. Candidates are clamped rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeRange {
    start: f64,
    end: f64,
    duration: f64,
    min_gap: f64,
}

impl TimeRange {
    /// Creates a range covering the whole asset.
    ///
    /// Fails with `DurationBelowMinGap` when the asset is too short to hold
    /// any valid selection.
    ///
    /// # Example
    /// ```
    /// use trim_engine::TimeRange;
    ///
    /// let range = TimeRange::new(120.0, 1.0).expect("valid duration");
    /// assert_eq!((range.start(), range.end()), (0.0, 120.0));
    /// assert!(TimeRange::new(0.5, 1.0).is_err());
    /// ```
    pub fn new(duration: f64, min_gap: f64) -> Result<Self> {
        if !min_gap.is_finite() || min_gap <= 0.0 {
            return Err(EngineError::InvalidConfig {
                reason: format!("min gap must be positive, got {min_gap}"),
            });
        }
        if !duration.is_finite() || duration <= 0.0 {
            return Err(EngineError::AssetUnready);
        }
        if duration < min_gap {
            return Err(EngineError::DurationBelowMinGap { duration, min_gap });
        }

        Ok(Self {
            start: 0.0,
            end: duration,
            duration,
            min_gap,
        })
    }

    pub fn start(&self) -> f64 {
        self.start
    }

    pub fn end(&self) -> f64 {
        self.end
    }

    pub fn duration(&self) -> f64 {
        self.duration
    }

    pub fn min_gap(&self) -> f64 {
        self.min_gap
    }

    /// Length of the selection in seconds.
    pub fn trimmed_duration(&self) -> f64 {
        self.end - self.start
    }

    /// Returns the value of one boundary.
    pub fn get(&self, handle: RangeHandle) -> f64 {
        match handle {
            RangeHandle::Start => self.start,
            RangeHandle::End => self.end,
        }
    }

    /// True when the range spans the whole asset.
    pub fn is_full(&self) -> bool {
        self.start == 0.0 && self.end == self.duration
    }

    /// Moves the start boundary to `candidate`, clamped to `[0, end - min_gap]`.
    ///
    /// A NaN candidate leaves the boundary untouched; infinities clamp.
    pub fn set_start(&mut self, candidate: f64) -> f64 {
        if candidate.is_nan() {
            warn!(candidate, "start candidate ignored: not a number");
            return self.start;
        }
        let upper = (self.end - self.min_gap).max(0.0);
        self.start = candidate.clamp(0.0, upper);
        self.debug_check();
        self.start
    }

    /// Moves the end boundary to `candidate`, clamped to
    /// `[start + min_gap, duration]`.
    pub fn set_end(&mut self, candidate: f64) -> f64 {
        if candidate.is_nan() {
            warn!(candidate, "end candidate ignored: not a number");
            return self.end;
        }
        let lower = (self.start + self.min_gap).min(self.duration);
        self.end = candidate.clamp(lower, self.duration);
        self.debug_check();
        self.end
    }

    /// Routes `candidate` to the setter for `handle`.
    pub fn set(&mut self, handle: RangeHandle, candidate: f64) -> f64 {
        match handle {
            RangeHandle::Start => self.set_start(candidate),
            RangeHandle::End => self.set_end(candidate),
        }
    }

    /// Shifts one boundary by `delta` seconds through the clamped setters.
    ///
    /// # Example
    /// ```
    /// use trim_engine::{RangeHandle, TimeRange};
    ///
    /// let mut range = TimeRange::new(10.0, 1.0).expect("valid duration");
    /// range.nudge(RangeHandle::End, -0.5);
    /// range.nudge(RangeHandle::Start, -3.0);
    /// assert_eq!((range.start(), range.end()), (0.0, 9.5));
    /// ```
    pub fn nudge(&mut self, handle: RangeHandle, delta: f64) -> f64 {
        if !delta.is_finite() {
            return self.get(handle);
        }
        let current = self.get(handle);
        self.set(handle, current + delta)
    }

    /// Restores the full `[0, duration]` selection.
    pub fn reset(&mut self) {
        self.start = 0.0;
        self.end = self.duration;
        debug!(duration = self.duration, "trim range reset");
    }

    /// Re-checks the range invariant.
    ///
    /// Unreachable through the clamped setters; a failure here means the
    /// range was corrupted by a programming error.
    pub fn check_invariant(&self) -> Result<()> {
        let holds = self.start >= 0.0
            && self.start + self.min_gap <= self.end + f64::EPSILON * self.duration.max(1.0)
            && self.end <= self.duration;
        if holds {
            return Ok(());
        }
        Err(EngineError::InvariantViolation {
            start: self.start,
            end: self.end,
            duration: self.duration,
            min_gap: self.min_gap,
        })
    }

    fn debug_check(&self) {
        debug_assert!(
            self.check_invariant().is_ok(),
            "trim range invariant violated: {}..{} of {} (min gap {})",
            self.start,
            self.end,
            self.duration,
            self.min_gap
        );
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self, start: f64, end: f64) {
        self.start = start;
        self.end = end;
    }
}
