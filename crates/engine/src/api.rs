use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::PreviewFrameCache;
use crate::config::TrimConfig;
use crate::drag::{DragMachine, DragState, DragTarget, hit_test};
use crate::error::{EngineError, Result};
use crate::playback::{ClockPlayer, PlaybackSync, Player};
use crate::preview::{FfmpegMediaBackend, MediaBackend, MediaSource, PreviewFrame, ProbedMedia};
use crate::range::{RangeHandle, TimeRange};
use crate::save::{SaveBackend, TrimRequest};
use crate::thumbnails::{
    SamplerHandle, SamplerRequest, ThumbnailSample, ThumbnailSlot, ThumbnailStrip, spawn_sampler,
};
use crate::time::{TrackGeometry, x_to_time};

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Replaces the current asset. Probing runs in the background and
    /// completes through [`Engine::poll_jobs`].
    ///
    /// # Example
    /// ```no_run
    /// use trim_engine::{Command, Engine, JsonFileSaveBackend, MediaSource, TrimConfig};
    ///
    /// let saver = JsonFileSaveBackend::new("trim.json");
    /// let mut engine = Engine::with_ffmpeg(saver, TrimConfig::default()).expect("valid config");
    /// let _ = engine.handle_command(Command::LoadAsset {
    ///     source: MediaSource::from_url("answer.mp4"),
    /// });
    /// ```
    LoadAsset {
        source: MediaSource,
    },
    /// Pointer pressed on the track at `x`.
    ///
    /// Starts a drag when `x` is over a handle or the playhead; on a bare
    /// track position it seeks the playhead unless playback is running.
    PointerDown {
        x: f32,
        track: TrackGeometry,
    },
    PointerMove {
        x: f32,
        track: TrackGeometry,
    },
    PointerUp,
    /// Pointer cancelled or capture lost.
    PointerCancel,
    /// Moves one boundary by `steps` fine-tune steps.
    Nudge {
        handle: RangeHandle,
        steps: i32,
    },
    /// Sets one boundary from a typed value. Clamped like a drag.
    SetBoundary {
        handle: RangeHandle,
        seconds: f64,
    },
    SeekPlayhead {
        seconds: f64,
    },
    ResetTrim,
    SetPreviewLoop {
        enabled: bool,
    },
    Play,
    Pause,
    TogglePlayback,
    /// Mirrors the player position into the playhead. Sent by the front-end
    /// at `TrimConfig::tick_interval`.
    PlaybackTick,
    /// Sends the current range to the save backend.
    Commit,
    /// Tears down the session.
    Close,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    AssetLoading {
        source: MediaSource,
    },
    AssetLoaded(EditorSnapshot),
    RangeChanged {
        start: f64,
        end: f64,
        trimmed_duration: f64,
    },
    PlayheadChanged {
        seconds: f64,
    },
    PlaybackStateChanged {
        playing: bool,
    },
    PreviewLoopChanged {
        enabled: bool,
    },
    DragStarted {
        target: DragTarget,
    },
    DragEnded {
        target: DragTarget,
    },
    DragCancelled {
        target: DragTarget,
    },
    ThumbnailReady {
        slot: usize,
        thumbnail: ThumbnailSlot,
    },
    ThumbnailsComplete {
        ready: usize,
        placeholders: usize,
    },
    PreviewFrameReady {
        seconds: f64,
        frame: PreviewFrame,
    },
    CommitStarted {
        request: TrimRequest,
    },
    CommitSucceeded {
        request: TrimRequest,
    },
    SessionClosed,
    Error(EngineErrorEvent),
}

/// User-facing error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    AssetUnready,
    ThumbnailSampleFailed,
    CommitFailed,
    InvariantViolation,
    CommitInFlight,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::AssetUnready
            | EngineError::MissingDuration { .. }
            | EngineError::DurationBelowMinGap { .. }
            | EngineError::Media(_) => Self::AssetUnready,
            EngineError::ThumbnailSampleFailed { .. } => Self::ThumbnailSampleFailed,
            EngineError::CommitFailed { .. } => Self::CommitFailed,
            EngineError::InvariantViolation { .. } => Self::InvariantViolation,
            EngineError::CommitInFlight => Self::CommitInFlight,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Unready,
    Loading,
    Ready,
}

/// State of the last commit of the current session.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum CommitStatus {
    #[default]
    Idle,
    InFlight(TrimRequest),
    Succeeded(TrimRequest),
    Failed {
        request: TrimRequest,
        message: String,
    },
}

/// Immutable editor snapshot consumed by the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct EditorSnapshot {
    pub readiness: Readiness,
    pub source: Option<MediaSource>,
    pub duration: f64,
    pub start: f64,
    pub end: f64,
    pub trimmed_duration: f64,
    pub min_gap: f64,
    pub playhead: f64,
    pub playing: bool,
    pub preview_loop: bool,
    pub drag: DragState,
    pub commit: CommitStatus,
    pub thumbnails: Vec<ThumbnailSlot>,
}

#[derive(Debug, Clone)]
struct Session {
    media: ProbedMedia,
    range: TimeRange,
    playhead: f64,
}

/// Background completion routed back to the engine thread.
#[derive(Debug)]
enum JobResult {
    Probed {
        generation: u64,
        result: Result<ProbedMedia>,
    },
    Thumbnail(ThumbnailSample),
    PreviewDecoded {
        generation: u64,
        seconds: f64,
        result: Result<PreviewFrame>,
    },
    Committed {
        generation: u64,
        request: TrimRequest,
        result: Result<()>,
    },
}

impl From<ThumbnailSample> for JobResult {
    fn from(value: ThumbnailSample) -> Self {
        Self::Thumbnail(value)
    }
}

/// Trim editor controller.
///
/// All editor state lives here and is mutated only through
/// [`Engine::handle_command`] and [`Engine::poll_jobs`] on one thread.
/// Probing, thumbnail sampling, preview decoding and commits run on
/// background threads tagged with the session generation; results from a
/// previous session are dropped.
#[derive(Debug)]
pub struct Engine<M, S, P = ClockPlayer> {
    media: Arc<M>,
    saver: Arc<S>,
    player: P,
    config: TrimConfig,
    generation: u64,
    loading: Option<MediaSource>,
    session: Option<Session>,
    drag: DragMachine,
    sync: PlaybackSync,
    thumbnails: ThumbnailStrip,
    sampler: Option<SamplerHandle>,
    preview_cache: PreviewFrameCache,
    preview_in_flight: Option<f64>,
    preview_pending: Option<f64>,
    commit: CommitStatus,
    last_playing: bool,
    jobs_tx: Sender<JobResult>,
    jobs_rx: Receiver<JobResult>,
}

impl<M, S, P> Engine<M, S, P>
where
    M: MediaBackend + Send + Sync + 'static,
    S: SaveBackend + Send + Sync + 'static,
    P: Player,
{
    /// Creates an unready engine. Fails when `config` does not validate.
    pub fn new(media: M, saver: S, player: P, config: TrimConfig) -> Result<Self> {
        config.validate()?;
        let (jobs_tx, jobs_rx) = mpsc::channel();
        Ok(Self {
            media: Arc::new(media),
            saver: Arc::new(saver),
            player,
            preview_cache: PreviewFrameCache::new(
                config.preview_cache_capacity,
                config.preview_cache_bucket_seconds,
            ),
            config,
            generation: 0,
            loading: None,
            session: None,
            drag: DragMachine::new(),
            sync: PlaybackSync::new(),
            thumbnails: ThumbnailStrip::default(),
            sampler: None,
            preview_in_flight: None,
            preview_pending: None,
            commit: CommitStatus::Idle,
            last_playing: false,
            jobs_tx,
            jobs_rx,
        })
    }

    pub fn config(&self) -> &TrimConfig {
        &self.config
    }

    pub fn readiness(&self) -> Readiness {
        if self.session.is_some() {
            Readiness::Ready
        } else if self.loading.is_some() {
            Readiness::Loading
        } else {
            Readiness::Unready
        }
    }

    pub fn range(&self) -> Option<TimeRange> {
        self.session.as_ref().map(|session| session.range)
    }

    pub fn playhead(&self) -> Option<f64> {
        self.session.as_ref().map(|session| session.playhead)
    }

    pub fn thumbnails(&self) -> &ThumbnailStrip {
        &self.thumbnails
    }

    pub fn commit_status(&self) -> &CommitStatus {
        &self.commit
    }

    pub fn drag_state(&self) -> DragState {
        self.drag.state()
    }

    pub fn is_playing(&self) -> bool {
        self.session.is_some() && self.player.is_playing()
    }

    pub fn snapshot(&self) -> EditorSnapshot {
        let source = self
            .session
            .as_ref()
            .map(|session| session.media.source.clone())
            .or_else(|| self.loading.clone());
        let (duration, start, end, min_gap, playhead) = match &self.session {
            Some(session) => (
                session.range.duration(),
                session.range.start(),
                session.range.end(),
                session.range.min_gap(),
                session.playhead,
            ),
            None => (0.0, 0.0, 0.0, self.config.min_gap, 0.0),
        };

        EditorSnapshot {
            readiness: self.readiness(),
            source,
            duration,
            start,
            end,
            trimmed_duration: end - start,
            min_gap,
            playhead,
            playing: self.is_playing(),
            preview_loop: self.sync.loop_mode(),
            drag: self.drag.state(),
            commit: self.commit.clone(),
            thumbnails: self.thumbnails.slots().to_vec(),
        }
    }

    /// Applies one command and returns emitted events.
    ///
    /// Editing commands fail with `AssetUnready` while no asset is loaded.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        let mut events = match command {
            Command::LoadAsset { source } => self.load_asset(source),
            Command::PointerDown { x, track } => self.pointer_down(x, track)?,
            Command::PointerMove { x, track } => self.pointer_move(x, track),
            Command::PointerUp => self.pointer_up(),
            Command::PointerCancel => self.pointer_cancel(),
            Command::Nudge { handle, steps } => self.nudge(handle, steps)?,
            Command::SetBoundary { handle, seconds } => {
                self.require_session()?;
                self.edit_boundary(handle, |range| range.set(handle, seconds))
            }
            Command::SeekPlayhead { seconds } => {
                self.require_session()?;
                self.seek_playhead_to(seconds)
            }
            Command::ResetTrim => self.reset_trim()?,
            Command::SetPreviewLoop { enabled } => self.set_preview_loop(enabled)?,
            Command::Play => self.play()?,
            Command::Pause => self.pause()?,
            Command::TogglePlayback => {
                self.require_session()?;
                if self.player.is_playing() {
                    self.pause()?
                } else {
                    self.play()?
                }
            }
            Command::PlaybackTick => self.playback_tick(),
            Command::Commit => self.commit()?,
            Command::Close => self.close(),
        };
        events.extend(self.take_play_state_change());
        Ok(events)
    }

    /// Applies every finished background job without blocking.
    pub fn poll_jobs(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        loop {
            match self.jobs_rx.try_recv() {
                Ok(job) => events.extend(self.apply_job(job)),
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
        events.extend(self.take_play_state_change());
        events
    }

    /// Waits up to `timeout` for a background job, then drains the rest.
    pub fn wait_jobs(&mut self, timeout: Duration) -> Vec<Event> {
        let mut events = match self.jobs_rx.recv_timeout(timeout) {
            Ok(job) => self.apply_job(job),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => Vec::new(),
        };
        events.extend(self.poll_jobs());
        events
    }

    fn require_session(&self) -> Result<&Session> {
        self.session.as_ref().ok_or(EngineError::AssetUnready)
    }

    fn load_asset(&mut self, source: MediaSource) -> Vec<Event> {
        let mut events = self.teardown_session();
        let generation = self.generation;
        self.loading = Some(source.clone());
        info!(generation, %source, "loading asset");

        let media = Arc::clone(&self.media);
        let jobs = self.jobs_tx.clone();
        let probe_source = source.clone();
        thread::spawn(move || {
            let result = media.probe(&probe_source);
            let _ = jobs.send(JobResult::Probed { generation, result });
        });

        events.push(Event::AssetLoading { source });
        events
    }

    fn close(&mut self) -> Vec<Event> {
        let mut events = self.teardown_session();
        info!(generation = self.generation, "session closed");
        events.push(Event::SessionClosed);
        events
    }

    /// Drops every trace of the current session and invalidates its jobs.
    fn teardown_session(&mut self) -> Vec<Event> {
        let mut events = Vec::new();
        if let Some(target) = self.drag.cancel() {
            events.push(Event::DragCancelled { target });
        }
        if let Some(sampler) = self.sampler.take() {
            sampler.cancel();
        }
        self.generation += 1;
        self.thumbnails = ThumbnailStrip::default();
        self.preview_cache.clear();
        self.preview_in_flight = None;
        self.preview_pending = None;
        self.commit = CommitStatus::Idle;
        self.loading = None;
        self.session = None;
        self.player.pause();
        self.sync = PlaybackSync::new();
        events
    }

    fn pointer_down(&mut self, x: f32, track: TrackGeometry) -> Result<Vec<Event>> {
        let session = self.require_session()?;
        if self.drag.is_active() {
            return Ok(Vec::new());
        }

        let hit = hit_test(
            x,
            track,
            &session.range,
            session.playhead,
            self.config.handle_width,
        );
        let Some(target) = hit else {
            if self.player.is_playing() {
                debug!(x, "track click ignored while playing");
                return Ok(Vec::new());
            }
            let seconds = x_to_time(x, track, session.range.duration());
            return Ok(self.seek_playhead_to(seconds));
        };

        self.drag.begin(target);
        if target == DragTarget::Playhead {
            self.sync.begin_scrub(&mut self.player);
        }
        Ok(vec![Event::DragStarted { target }])
    }

    fn pointer_move(&mut self, x: f32, track: TrackGeometry) -> Vec<Event> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let Some(update) = self.drag.route_move(x, track, session.range.duration()) else {
            return Vec::new();
        };
        match update.target.range_handle() {
            Some(handle) => self.edit_boundary(handle, |range| range.set(handle, update.time)),
            None => self.seek_playhead_to(update.time),
        }
    }

    fn pointer_up(&mut self) -> Vec<Event> {
        let Some(target) = self.drag.finish() else {
            return Vec::new();
        };
        if target == DragTarget::Playhead {
            self.sync.end_scrub(&mut self.player);
        }
        vec![Event::DragEnded { target }]
    }

    fn pointer_cancel(&mut self) -> Vec<Event> {
        let Some(target) = self.drag.cancel() else {
            return Vec::new();
        };
        if target == DragTarget::Playhead {
            self.sync.end_scrub(&mut self.player);
        }
        vec![Event::DragCancelled { target }]
    }

    fn nudge(&mut self, handle: RangeHandle, steps: i32) -> Result<Vec<Event>> {
        self.require_session()?;
        let delta = f64::from(steps) * self.config.nudge_step;
        Ok(self.edit_boundary(handle, |range| range.nudge(handle, delta)))
    }

    /// Applies one clamped edit of `handle` and syncs the player to it.
    fn edit_boundary(
        &mut self,
        handle: RangeHandle,
        edit: impl FnOnce(&mut TimeRange) -> f64,
    ) -> Vec<Event> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        let before = session.range;
        edit(&mut session.range);
        let range = session.range;
        if range == before {
            return Vec::new();
        }

        let mut events = vec![range_changed(&range)];
        if let Some(position) = self.sync.on_range_edited(&mut self.player, handle, &range) {
            events.extend(self.publish_playhead(position));
        }
        events
    }

    fn reset_trim(&mut self) -> Result<Vec<Event>> {
        let session = self.require_session()?;
        if session.range.is_full() {
            return Ok(Vec::new());
        }
        let Some(session) = self.session.as_mut() else {
            return Ok(Vec::new());
        };
        session.range.reset();
        let range = session.range;

        let mut events = vec![range_changed(&range)];
        if let Some(position) = self
            .sync
            .on_range_edited(&mut self.player, RangeHandle::Start, &range)
        {
            events.extend(self.publish_playhead(position));
        }
        Ok(events)
    }

    fn seek_playhead_to(&mut self, seconds: f64) -> Vec<Event> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        if seconds.is_nan() {
            return Vec::new();
        }
        let target = seconds.clamp(0.0, session.range.duration());
        self.player.seek(target);
        let position = self.player.position();
        self.publish_playhead(position)
    }

    /// Stores a new playhead and asks for the matching preview frame.
    fn publish_playhead(&mut self, position: f64) -> Vec<Event> {
        let Some(session) = self.session.as_mut() else {
            return Vec::new();
        };
        if session.playhead == position {
            return Vec::new();
        }
        session.playhead = position;

        let mut events = vec![Event::PlayheadChanged { seconds: position }];
        events.extend(self.request_preview(position));
        events
    }

    fn set_preview_loop(&mut self, enabled: bool) -> Result<Vec<Event>> {
        let range = self.require_session()?.range;
        if self.sync.loop_mode() == enabled {
            return Ok(Vec::new());
        }

        let mut events = vec![Event::PreviewLoopChanged { enabled }];
        if let Some(position) = self.sync.set_loop_mode(&mut self.player, enabled, &range) {
            events.extend(self.publish_playhead(position));
        }
        debug!(enabled, "preview loop toggled");
        Ok(events)
    }

    fn play(&mut self) -> Result<Vec<Event>> {
        let session = self.require_session()?;
        let range = session.range;
        let playhead = session.playhead;
        if self.sync.note_user_play() {
            debug!("play deferred until scrub ends");
            return Ok(Vec::new());
        }

        let mut events = Vec::new();
        if self.sync.loop_mode() && (playhead < range.start() || playhead >= range.end()) {
            self.player.seek(range.start());
            let position = self.player.position();
            events.extend(self.publish_playhead(position));
        }
        self.player.play();
        Ok(events)
    }

    fn pause(&mut self) -> Result<Vec<Event>> {
        self.require_session()?;
        self.sync.note_user_pause();
        self.player.pause();
        Ok(Vec::new())
    }

    fn playback_tick(&mut self) -> Vec<Event> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        let range = session.range;
        let position = self.sync.on_tick(&mut self.player, &range);
        self.publish_playhead(position)
    }

    fn commit(&mut self) -> Result<Vec<Event>> {
        let session = self.require_session()?;
        let checked = session.range.check_invariant();
        debug_assert!(
            checked.is_ok(),
            "trim range invariant violated before commit: {:?}",
            session.range
        );
        checked?;
        if matches!(self.commit, CommitStatus::InFlight(_)) {
            return Err(EngineError::CommitInFlight);
        }

        let request = TrimRequest {
            asset_id: session.media.source.id.clone(),
            start_time: session.range.start(),
            end_time: session.range.end(),
            duration: session.range.duration(),
        };
        info!(
            asset_id = %request.asset_id,
            start = request.start_time,
            end = request.end_time,
            "committing trim"
        );
        self.commit = CommitStatus::InFlight(request.clone());

        let saver = Arc::clone(&self.saver);
        let jobs = self.jobs_tx.clone();
        let generation = self.generation;
        let job_request = request.clone();
        thread::spawn(move || {
            let result = saver.save(&job_request);
            let _ = jobs.send(JobResult::Committed {
                generation,
                request: job_request,
                result,
            });
        });

        Ok(vec![Event::CommitStarted { request }])
    }

    fn request_preview(&mut self, seconds: f64) -> Vec<Event> {
        let Some(session) = self.session.as_ref() else {
            return Vec::new();
        };
        if let Some(frame) = self.preview_cache.get(&session.media.source.url, seconds) {
            debug!(seconds, "preview cache hit");
            return vec![Event::PreviewFrameReady { seconds, frame }];
        }
        if self.preview_in_flight.is_some() {
            self.preview_pending = Some(seconds);
            return Vec::new();
        }

        debug!(seconds, "preview cache miss");
        self.preview_in_flight = Some(seconds);
        let media = Arc::clone(&self.media);
        let jobs = self.jobs_tx.clone();
        let source = session.media.source.clone();
        let size = self.config.preview_size();
        let generation = self.generation;
        thread::spawn(move || {
            let result = media.decode_frame(&source, seconds, Some(size));
            let _ = jobs.send(JobResult::PreviewDecoded {
                generation,
                seconds,
                result,
            });
        });
        Vec::new()
    }

    fn apply_job(&mut self, job: JobResult) -> Vec<Event> {
        match job {
            JobResult::Probed { generation, result } => self.on_probed(generation, result),
            JobResult::Thumbnail(sample) => self.on_thumbnail(sample),
            JobResult::PreviewDecoded {
                generation,
                seconds,
                result,
            } => self.on_preview_decoded(generation, seconds, result),
            JobResult::Committed {
                generation,
                request,
                result,
            } => self.on_committed(generation, request, result),
        }
    }

    fn on_probed(&mut self, generation: u64, result: Result<ProbedMedia>) -> Vec<Event> {
        if generation != self.generation {
            debug!(generation, current = self.generation, "stale probe dropped");
            return Vec::new();
        }
        let Some(source) = self.loading.take() else {
            return Vec::new();
        };

        let loaded = result.and_then(|media| {
            let range = TimeRange::new(media.duration, self.config.min_gap)?;
            Ok((media, range))
        });
        let (media, range) = match loaded {
            Ok(loaded) => loaded,
            Err(error) => {
                warn!(%source, %error, "asset failed to load");
                return vec![Event::Error(EngineErrorEvent::from_error(&error))];
            }
        };

        let duration = range.duration();
        self.player.load(duration);
        self.thumbnails = ThumbnailStrip::new(generation, duration, self.config.thumbnail_count);
        let sample_times = self
            .thumbnails
            .slots()
            .iter()
            .map(ThumbnailSlot::sample_time)
            .collect();
        self.sampler = Some(spawn_sampler(
            Arc::clone(&self.media),
            SamplerRequest {
                generation,
                source: media.source.clone(),
                sample_times,
                size: self.config.thumbnail_size(),
                workers: self.config.thumbnail_workers,
            },
            self.jobs_tx.clone(),
        ));
        info!(
            generation,
            %source,
            duration,
            width = ?media.width,
            height = ?media.height,
            "asset loaded"
        );
        self.session = Some(Session {
            media,
            range,
            playhead: 0.0,
        });

        let mut events = vec![Event::AssetLoaded(self.snapshot())];
        events.extend(self.request_preview(0.0));
        events
    }

    fn on_thumbnail(&mut self, sample: ThumbnailSample) -> Vec<Event> {
        let slot = sample.slot;
        let Some(published) = self.thumbnails.publish(sample) else {
            return Vec::new();
        };

        let mut events = vec![Event::ThumbnailReady {
            slot,
            thumbnail: published.clone(),
        }];
        if self.thumbnails.is_complete() {
            self.sampler = None;
            let ready = self.thumbnails.ready_count();
            let placeholders = self.thumbnails.placeholder_count();
            debug!(ready, placeholders, "thumbnail strip complete");
            events.push(Event::ThumbnailsComplete {
                ready,
                placeholders,
            });
        }
        events
    }

    fn on_preview_decoded(
        &mut self,
        generation: u64,
        seconds: f64,
        result: Result<PreviewFrame>,
    ) -> Vec<Event> {
        if generation != self.generation {
            return Vec::new();
        }
        self.preview_in_flight = None;

        let mut events = Vec::new();
        match (result, self.session.as_ref()) {
            (Ok(frame), Some(session)) => {
                self.preview_cache
                    .insert(&session.media.source.url, seconds, frame.clone());
                events.push(Event::PreviewFrameReady { seconds, frame });
            }
            (Ok(_), None) => {}
            (Err(error), _) => warn!(seconds, %error, "preview decode failed"),
        }

        if let Some(next) = self.preview_pending.take() {
            events.extend(self.request_preview(next));
        }
        events
    }

    fn on_committed(
        &mut self,
        generation: u64,
        request: TrimRequest,
        result: Result<()>,
    ) -> Vec<Event> {
        if generation != self.generation {
            debug!(
                generation,
                current = self.generation,
                asset_id = %request.asset_id,
                "commit result ignored after session change"
            );
            return Vec::new();
        }

        match result {
            Ok(()) => {
                info!(asset_id = %request.asset_id, "trim committed");
                self.commit = CommitStatus::Succeeded(request.clone());
                vec![Event::CommitSucceeded { request }]
            }
            Err(error) => {
                let error = match error {
                    EngineError::CommitFailed { .. } => error,
                    other => EngineError::CommitFailed {
                        reason: other.to_string(),
                    },
                };
                warn!(asset_id = %request.asset_id, %error, "trim commit failed");
                self.commit = CommitStatus::Failed {
                    request,
                    message: error.to_string(),
                };
                vec![Event::Error(EngineErrorEvent::from_error(&error))]
            }
        }
    }

    fn take_play_state_change(&mut self) -> Option<Event> {
        let playing = self.is_playing();
        if playing == self.last_playing {
            return None;
        }
        self.last_playing = playing;
        Some(Event::PlaybackStateChanged { playing })
    }

    #[cfg(test)]
    pub(crate) fn player_mut(&mut self) -> &mut P {
        &mut self.player
    }
}

fn range_changed(range: &TimeRange) -> Event {
    Event::RangeChanged {
        start: range.start(),
        end: range.end(),
        trimmed_duration: range.trimmed_duration(),
    }
}

impl<S> Engine<FfmpegMediaBackend, S, ClockPlayer>
where
    S: SaveBackend + Send + Sync + 'static,
{
    /// Creates an engine wired to the FFmpeg backend and a wall-clock player.
    pub fn with_ffmpeg(saver: S, config: TrimConfig) -> Result<Self> {
        Self::new(FfmpegMediaBackend, saver, ClockPlayer::new(), config)
    }
}
