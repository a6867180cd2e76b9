use std::time::Instant;

use tracing::debug;

use crate::range::{RangeHandle, TimeRange};

/// Media playback primitive driven by the editor.
pub trait Player {
    /// Prepares the player for a new asset of `duration` seconds, paused at 0.
    fn load(&mut self, duration: f64);

    fn play(&mut self);

    fn pause(&mut self);

    /// Moves the playback position, clamped to the asset.
    fn seek(&mut self, seconds: f64);

    /// Current playback position in seconds.
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;
}

/// Wall-clock driven player used when no decoder-backed player is attached.
///
/// The position advances in real time while playing and stops at the end of
/// the asset.
#[derive(Debug, Clone, Default)]
pub struct ClockPlayer {
    duration: f64,
    base_position: f64,
    started_at: Option<Instant>,
}

impl ClockPlayer {
    pub fn new() -> Self {
        Self::default()
    }

    fn clamp(&self, seconds: f64) -> f64 {
        if seconds.is_nan() {
            return 0.0;
        }
        seconds.clamp(0.0, self.duration.max(0.0))
    }
}

impl Player for ClockPlayer {
    fn load(&mut self, duration: f64) {
        self.duration = if duration.is_finite() {
            duration.max(0.0)
        } else {
            0.0
        };
        self.base_position = 0.0;
        self.started_at = None;
    }

    fn play(&mut self) {
        if self.started_at.is_some() && self.is_playing() {
            return;
        }
        if self.position() >= self.duration {
            self.base_position = 0.0;
        } else {
            self.base_position = self.position();
        }
        self.started_at = Some(Instant::now());
    }

    fn pause(&mut self) {
        self.base_position = self.position();
        self.started_at = None;
    }

    fn seek(&mut self, seconds: f64) {
        self.base_position = self.clamp(seconds);
        if self.started_at.is_some() {
            self.started_at = Some(Instant::now());
        }
    }

    fn position(&self) -> f64 {
        match self.started_at {
            Some(started_at) => {
                self.clamp(self.base_position + started_at.elapsed().as_secs_f64())
            }
            None => self.base_position,
        }
    }

    fn is_playing(&self) -> bool {
        self.started_at.is_some() && self.position() < self.duration
    }
}

/// Keeps the player consistent with the trim range and loop mode.
#[derive(Debug, Clone, Default)]
pub struct PlaybackSync {
    loop_mode: bool,
    scrub_resume: Option<bool>,
    playing_at_last_tick: bool,
}

impl PlaybackSync {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loop_mode(&self) -> bool {
        self.loop_mode
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrub_resume.is_some()
    }

    /// Reads the player position for one playback tick.
    ///
    /// With loop mode on, reaching `range.end()` seeks back to `range.start()`
    /// and keeps playing. Returns the playhead to publish.
    pub fn on_tick<P: Player>(&mut self, player: &mut P, range: &TimeRange) -> f64 {
        let position = player.position();
        let playing = player.is_playing();
        let was_playing = self.playing_at_last_tick;
        self.playing_at_last_tick = playing;

        let wrap = self.loop_mode
            && !self.is_scrubbing()
            && position >= range.end()
            && (playing || was_playing);
        if wrap {
            player.seek(range.start());
            if !player.is_playing() {
                player.play();
            }
            self.playing_at_last_tick = true;
            debug!(
                position,
                start = range.start(),
                end = range.end(),
                "loop preview wrapped to range start"
            );
            return player.position();
        }
        position
    }

    /// Seeks the player to an edited boundary when the edit should be visible.
    ///
    /// Skipped while the playhead is being scrubbed or the player is playing.
    pub fn on_range_edited<P: Player>(
        &self,
        player: &mut P,
        handle: RangeHandle,
        range: &TimeRange,
    ) -> Option<f64> {
        if self.is_scrubbing() || player.is_playing() {
            return None;
        }
        let target = range.get(handle);
        player.seek(target);
        Some(player.position())
    }

    /// Toggles loop-within-range preview. Enabling seeks to `range.start()`.
    pub fn set_loop_mode<P: Player>(
        &mut self,
        player: &mut P,
        enabled: bool,
        range: &TimeRange,
    ) -> Option<f64> {
        self.loop_mode = enabled;
        if !enabled {
            return None;
        }
        player.seek(range.start());
        Some(player.position())
    }

    /// Pauses playback for a playhead scrub, remembering the play state.
    pub fn begin_scrub<P: Player>(&mut self, player: &mut P) {
        let resume = player.is_playing();
        if resume {
            player.pause();
        }
        self.scrub_resume = Some(resume);
        self.playing_at_last_tick = false;
    }

    /// Ends a scrub and resumes playback if it was playing before.
    ///
    /// Returns `true` when playback resumed.
    pub fn end_scrub<P: Player>(&mut self, player: &mut P) -> bool {
        let resume = self.scrub_resume.take().unwrap_or(false);
        if resume {
            player.play();
            self.playing_at_last_tick = true;
        }
        resume
    }

    /// Records an explicit user pause. A pause during a scrub cancels the
    /// resume-on-release.
    pub fn note_user_pause(&mut self) {
        if let Some(resume) = self.scrub_resume.as_mut() {
            *resume = false;
        }
        self.playing_at_last_tick = false;
    }

    /// Records an explicit user play.
    ///
    /// Returns `true` when the play is deferred until the current scrub ends.
    pub fn note_user_play(&mut self) -> bool {
        match self.scrub_resume.as_mut() {
            Some(resume) => {
                *resume = true;
                true
            }
            None => {
                self.playing_at_last_tick = true;
                false
            }
        }
    }
}
