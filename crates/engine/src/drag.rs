use tracing::debug;

use crate::range::{RangeHandle, TimeRange};
use crate::time::{TrackGeometry, time_to_x, x_to_time};

/// Draggable element on the trim track.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragTarget {
    RangeStart,
    RangeEnd,
    Playhead,
}

impl DragTarget {
    /// Range boundary edited by this target, if any.
    pub fn range_handle(self) -> Option<RangeHandle> {
        match self {
            Self::RangeStart => Some(RangeHandle::Start),
            Self::RangeEnd => Some(RangeHandle::End),
            Self::Playhead => None,
        }
    }
}

/// Pointer drag state. At most one target is dragged at a time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragTarget),
}

/// Time update produced by one pointer move.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DragUpdate {
    pub target: DragTarget,
    pub time: f64,
}

/// Guarded transitions between `Idle` and `Dragging`.
#[derive(Debug, Clone, Default)]
pub struct DragMachine {
    state: DragState,
}

impl DragMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn active_target(&self) -> Option<DragTarget> {
        match self.state {
            DragState::Idle => None,
            DragState::Dragging(target) => Some(target),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state != DragState::Idle
    }

    /// Starts dragging `target`.
    ///
    /// Returns `false` and leaves the current session untouched when another
    /// drag is already active.
    ///
    /// # Example
    /// ```
    /// use trim_engine::drag::{DragMachine, DragTarget};
    ///
    /// let mut drag = DragMachine::new();
    /// assert!(drag.begin(DragTarget::RangeStart));
    /// assert!(!drag.begin(DragTarget::RangeEnd));
    /// assert_eq!(drag.active_target(), Some(DragTarget::RangeStart));
    /// ```
    pub fn begin(&mut self, target: DragTarget) -> bool {
        if let DragState::Dragging(active) = self.state {
            debug!(?active, requested = ?target, "drag begin ignored: another drag is active");
            return false;
        }
        self.state = DragState::Dragging(target);
        debug!(?target, "drag started");
        true
    }

    /// Converts a pointer move into a time update for the active target.
    ///
    /// Returns `None` while idle.
    pub fn route_move(&self, x: f32, track: TrackGeometry, duration: f64) -> Option<DragUpdate> {
        let target = self.active_target()?;
        Some(DragUpdate {
            target,
            time: x_to_time(x, track, duration),
        })
    }

    /// Ends the active drag on pointer release.
    pub fn finish(&mut self) -> Option<DragTarget> {
        let target = self.active_target();
        self.state = DragState::Idle;
        if let Some(target) = target {
            debug!(?target, "drag finished");
        }
        target
    }

    /// Abandons the active drag (pointer cancel, capture loss, teardown).
    pub fn cancel(&mut self) -> Option<DragTarget> {
        let target = self.active_target();
        self.state = DragState::Idle;
        if let Some(target) = target {
            debug!(?target, "drag cancelled");
        }
        target
    }
}

/// Resolves which draggable element sits under pointer `x`.
///
/// Range handles win over the playhead. When both handles are within reach
/// the nearer one is picked; on a tie the side of the pointer decides.
/// Returns `None` for a bare track position.
pub fn hit_test(
    x: f32,
    track: TrackGeometry,
    range: &TimeRange,
    playhead: f64,
    handle_width: f32,
) -> Option<DragTarget> {
    let reach = (handle_width * 0.5).max(1.0);
    let duration = range.duration();
    let start_x = time_to_x(range.start(), track, duration);
    let end_x = time_to_x(range.end(), track, duration);

    let start_distance = (x - start_x).abs();
    let end_distance = (x - end_x).abs();
    let near_start = start_distance <= reach;
    let near_end = end_distance <= reach;

    match (near_start, near_end) {
        (true, true) => {
            if start_distance < end_distance {
                Some(DragTarget::RangeStart)
            } else if end_distance < start_distance || x >= end_x {
                Some(DragTarget::RangeEnd)
            } else {
                Some(DragTarget::RangeStart)
            }
        }
        (true, false) => Some(DragTarget::RangeStart),
        (false, true) => Some(DragTarget::RangeEnd),
        (false, false) => {
            let playhead_x = time_to_x(playhead, track, duration);
            ((x - playhead_x).abs() <= reach).then_some(DragTarget::Playhead)
        }
    }
}
