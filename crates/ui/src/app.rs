use std::collections::VecDeque;
use std::sync::mpsc::TrySendError;
use std::time::Duration;

use iced::widget::{button, checkbox, column, row, text, text_input};
use iced::{Element, Length, Subscription, Task, time};
use tracing::{debug, warn};
use trim_engine::{
    Command, CommitStatus, DragState, EditorSnapshot, EngineErrorKind, Event, MediaSource,
    RangeHandle, TrimConfig,
};

use crate::bridge::{BridgeEvent, EngineCommandSender, EngineHandle, engine_subscription};
use crate::widgets::preview::{self, PreviewImage};
use crate::widgets::timeline::{self, StripCell, TrackInput, TrackView};

/// UI messages handled by the iced app update loop.
#[derive(Debug, Clone)]
pub enum Message {
    SourceChanged(String),
    LoadPressed,
    ClosePressed,
    Track(TrackInput),
    PlayPausePressed,
    PreviewLoopToggled(bool),
    Nudge(RangeHandle, i32),
    ResetPressed,
    CommitPressed,
    Tick,
    Bridge(BridgeEvent),
}

/// Root UI state. Mirrors the engine through its events.
pub struct AppState {
    engine_tx: Option<EngineCommandSender>,
    config: TrimConfig,
    source_input: String,
    editor: Option<EditorSnapshot>,
    strip: Vec<StripCell>,
    preview: Option<PreviewImage>,
    /// Pointer commands not yet accepted by the engine, in order.
    pending_pointer: VecDeque<Command>,
    status: String,
}

impl AppState {
    /// Boots the app; the engine bridge starts with the subscription.
    pub fn boot() -> (Self, Task<Message>) {
        (
            Self::with_sender(None, String::from("starting engine bridge")),
            Task::none(),
        )
    }

    fn with_sender(engine_tx: Option<EngineCommandSender>, status: String) -> Self {
        Self {
            engine_tx,
            config: TrimConfig::default(),
            source_input: String::new(),
            editor: None,
            strip: Vec::new(),
            preview: None,
            pending_pointer: VecDeque::new(),
            status,
        }
    }

    /// Handles one UI message.
    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::SourceChanged(source) => {
                self.source_input = source;
            }
            Message::LoadPressed => {
                let url = self.source_input.trim().to_owned();
                if url.is_empty() {
                    self.status = String::from("media source is empty");
                } else {
                    self.send_command(Command::LoadAsset {
                        source: MediaSource::from_url(url),
                    });
                }
            }
            Message::ClosePressed => {
                self.send_command(Command::Close);
            }
            Message::Track(input) => self.queue_pointer(input.into_command()),
            Message::PlayPausePressed => {
                self.send_command(Command::TogglePlayback);
            }
            Message::PreviewLoopToggled(enabled) => {
                self.send_command(Command::SetPreviewLoop { enabled });
            }
            Message::Nudge(handle, steps) => {
                self.send_command(Command::Nudge { handle, steps });
            }
            Message::ResetPressed => {
                self.send_command(Command::ResetTrim);
            }
            Message::CommitPressed => {
                self.send_command(Command::Commit);
            }
            Message::Tick => {
                if let Some(sender) = &self.engine_tx {
                    // A full queue already holds work for the engine thread.
                    let _ = sender.try_send(Command::PlaybackTick);
                }
            }
            Message::Bridge(BridgeEvent::Ready(EngineHandle { commands, config })) => {
                self.engine_tx = Some(commands);
                self.config = config;
                self.status = String::from("engine ready");
            }
            Message::Bridge(BridgeEvent::Event(event)) => {
                self.apply_engine_event(event);
                self.flush_pointer();
            }
            Message::Bridge(BridgeEvent::Disconnected) => {
                self.status = String::from("engine event channel closed");
                self.engine_tx = None;
                self.pending_pointer.clear();
            }
        }

        Task::none()
    }

    fn send_command(&mut self, command: Command) -> bool {
        let Some(sender) = &self.engine_tx else {
            self.status = String::from("engine is not ready");
            return false;
        };
        match sender.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(command)) => {
                warn!(?command, "engine command queue is full");
                self.status = String::from("engine command queue is full");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                self.status = String::from("engine command channel closed");
                self.engine_tx = None;
                false
            }
        }
    }

    /// Queues a pointer command behind any the engine has not taken yet.
    ///
    /// Consecutive moves collapse into the latest one. Presses, releases and
    /// cancels are kept so a drag always ends on the engine side.
    fn queue_pointer(&mut self, command: Command) {
        let coalesce = matches!(command, Command::PointerMove { .. })
            && matches!(self.pending_pointer.back(), Some(Command::PointerMove { .. }));
        if coalesce {
            self.pending_pointer.pop_back();
        }
        self.pending_pointer.push_back(command);
        self.flush_pointer();
    }

    fn flush_pointer(&mut self) {
        let Some(sender) = &self.engine_tx else {
            self.pending_pointer.clear();
            return;
        };
        while let Some(command) = self.pending_pointer.pop_front() {
            match sender.try_send(command) {
                Ok(()) => {}
                Err(TrySendError::Full(command)) => {
                    let pending = self.pending_pointer.len() + 1;
                    debug!(pending, "pointer input deferred");
                    self.pending_pointer.push_front(command);
                    return;
                }
                Err(TrySendError::Disconnected(_)) => {
                    self.status = String::from("engine command channel closed");
                    self.engine_tx = None;
                    self.pending_pointer.clear();
                    return;
                }
            }
        }
    }

    fn apply_engine_event(&mut self, event: Event) {
        match event {
            Event::AssetLoading { source } => {
                self.editor = None;
                self.strip.clear();
                self.preview = None;
                self.status = format!("loading {source}");
            }
            Event::AssetLoaded(snapshot) => {
                self.strip = snapshot.thumbnails.iter().map(StripCell::from_slot).collect();
                self.status = format!("loaded {:.2}s", snapshot.duration);
                self.editor = Some(snapshot);
            }
            Event::RangeChanged {
                start,
                end,
                trimmed_duration,
            } => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.start = start;
                    editor.end = end;
                    editor.trimmed_duration = trimmed_duration;
                }
            }
            Event::PlayheadChanged { seconds } => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.playhead = seconds;
                }
            }
            Event::PlaybackStateChanged { playing } => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.playing = playing;
                }
            }
            Event::PreviewLoopChanged { enabled } => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.preview_loop = enabled;
                }
            }
            Event::DragStarted { target } => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.drag = DragState::Dragging(target);
                }
            }
            Event::DragEnded { .. } | Event::DragCancelled { .. } => {
                if let Some(editor) = self.editor.as_mut() {
                    editor.drag = DragState::Idle;
                }
            }
            Event::ThumbnailReady { slot, thumbnail } => {
                if let Some(cell) = self.strip.get_mut(slot) {
                    *cell = StripCell::from_slot(&thumbnail);
                }
                if let Some(stored) = self
                    .editor
                    .as_mut()
                    .and_then(|editor| editor.thumbnails.get_mut(slot))
                {
                    *stored = thumbnail;
                }
            }
            Event::ThumbnailsComplete {
                ready,
                placeholders,
            } => {
                self.status = format!("thumbnails ready: {ready}, unavailable: {placeholders}");
            }
            Event::PreviewFrameReady { seconds, frame } => {
                self.preview = PreviewImage::from_frame(&frame, seconds);
            }
            Event::CommitStarted { request } => {
                self.status = format!(
                    "saving {:.2}s to {:.2}s",
                    request.start_time, request.end_time
                );
                if let Some(editor) = self.editor.as_mut() {
                    editor.commit = CommitStatus::InFlight(request);
                }
            }
            Event::CommitSucceeded { request } => {
                self.status = format!("saved trim of {}", request.asset_id);
                if let Some(editor) = self.editor.as_mut() {
                    editor.commit = CommitStatus::Succeeded(request);
                }
            }
            Event::SessionClosed => {
                self.editor = None;
                self.strip.clear();
                self.preview = None;
                self.status = String::from("closed");
            }
            Event::Error(error) => {
                if error.kind == EngineErrorKind::CommitFailed {
                    if let Some(editor) = self.editor.as_mut() {
                        if let CommitStatus::InFlight(request) = &editor.commit {
                            let request = request.clone();
                            editor.commit = CommitStatus::Failed {
                                request,
                                message: error.message.clone(),
                            };
                        }
                    }
                }
                self.status = format!("error: {}", error.message);
            }
        }
    }

    fn is_playing(&self) -> bool {
        self.editor.as_ref().is_some_and(|editor| editor.playing)
    }

    fn track_view(&self) -> TrackView {
        match &self.editor {
            Some(editor) => TrackView {
                duration: editor.duration,
                start: editor.start,
                end: editor.end,
                playhead: editor.playhead,
                handle_width: self.config.handle_width,
                active: match editor.drag {
                    DragState::Dragging(target) => Some(target),
                    DragState::Idle => None,
                },
            },
            None => TrackView::default(),
        }
    }

    /// Renders the UI tree.
    pub fn view(&self) -> Element<'_, Message> {
        let loaded = self.editor.is_some();
        let enabled = |message: Message| loaded.then_some(message);

        let source_row = row![
            text_input("media path or URL", &self.source_input)
                .on_input(Message::SourceChanged)
                .on_submit(Message::LoadPressed),
            button("Load").on_press(Message::LoadPressed),
            button("Close").on_press_maybe(enabled(Message::ClosePressed)),
        ]
        .spacing(12);

        let placeholder = if self.source_input.trim().is_empty() {
            "No media loaded"
        } else {
            "No preview frame"
        };
        let preview_pane = preview::view(self.preview.as_ref(), placeholder);

        let track = timeline::view(self.track_view(), &self.strip, Message::Track);

        let commit_in_flight = self
            .editor
            .as_ref()
            .is_some_and(|editor| matches!(editor.commit, CommitStatus::InFlight(_)));
        let play_label = if self.is_playing() { "Pause" } else { "Play" };
        let preview_loop = self
            .editor
            .as_ref()
            .is_some_and(|editor| editor.preview_loop);
        let mut loop_toggle = checkbox("Loop selection", preview_loop);
        if loaded {
            loop_toggle = loop_toggle.on_toggle(Message::PreviewLoopToggled);
        }

        let controls = row![
            button(play_label).on_press_maybe(enabled(Message::PlayPausePressed)),
            loop_toggle,
            button("Start -").on_press_maybe(enabled(Message::Nudge(RangeHandle::Start, -1))),
            button("Start +").on_press_maybe(enabled(Message::Nudge(RangeHandle::Start, 1))),
            button("End -").on_press_maybe(enabled(Message::Nudge(RangeHandle::End, -1))),
            button("End +").on_press_maybe(enabled(Message::Nudge(RangeHandle::End, 1))),
            button("Reset").on_press_maybe(enabled(Message::ResetPressed)),
            button("Save trim").on_press_maybe(
                (loaded && !commit_in_flight).then_some(Message::CommitPressed)
            ),
        ]
        .spacing(12);

        let readout = match &self.editor {
            Some(editor) => format!(
                "Start {:.2}s  End {:.2}s  Length {:.2}s  Playhead {:.2}s",
                editor.start, editor.end, editor.trimmed_duration, editor.playhead
            ),
            None => String::from("No selection"),
        };

        column![
            source_row,
            preview_pane,
            track,
            controls,
            text(readout),
            text(format!("Status: {}", self.status)),
        ]
        .spacing(12)
        .padding(16)
        .height(Length::Fill)
        .into()
    }

    /// Subscribes to bridge events and, while playing, to playback ticks.
    pub fn subscription(&self) -> Subscription<Message> {
        let bridge = engine_subscription().map(Message::Bridge);
        if self.is_playing() {
            Subscription::batch([
                bridge,
                time::every(self.tick_interval()).map(|_| Message::Tick),
            ])
        } else {
            bridge
        }
    }

    fn tick_interval(&self) -> Duration {
        self.config.tick_interval()
    }

    #[cfg(test)]
    fn from_sender_for_test(engine_tx: EngineCommandSender) -> Self {
        Self::with_sender(Some(engine_tx), String::from("idle"))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::sync::mpsc::TryRecvError;

    use trim_engine::thumbnails::Thumbnail;
    use trim_engine::{
        Command, CommitStatus, DragState, DragTarget, EditorSnapshot, EngineErrorEvent,
        EngineErrorKind, Event, MediaSource, PreviewFrame, RangeHandle, Readiness, ThumbnailSlot,
        TrackGeometry, TrimRequest,
    };

    use crate::bridge::BridgeEvent;
    use crate::widgets::timeline::{StripCell, TrackInput};

    use super::{AppState, Message};

    fn snapshot() -> EditorSnapshot {
        EditorSnapshot {
            readiness: Readiness::Ready,
            source: Some(MediaSource::new("answer", "answer.mp4")),
            duration: 20.0,
            start: 0.0,
            end: 20.0,
            trimmed_duration: 20.0,
            min_gap: 1.0,
            playhead: 0.0,
            playing: false,
            preview_loop: false,
            drag: DragState::Idle,
            commit: CommitStatus::Idle,
            thumbnails: vec![
                ThumbnailSlot::Pending { sample_time: 0.0 },
                ThumbnailSlot::Pending { sample_time: 10.0 },
            ],
        }
    }

    fn request() -> TrimRequest {
        TrimRequest {
            asset_id: "answer".to_owned(),
            start_time: 2.0,
            end_time: 8.0,
            duration: 20.0,
        }
    }

    fn engine_event(app: &mut AppState, event: Event) {
        let _ = app.update(Message::Bridge(BridgeEvent::Event(event)));
    }

    #[test]
    fn load_button_dispatches_load_asset_command() {
        let (command_tx, command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);

        let _ = app.update(Message::SourceChanged(" clips/answer.mp4 ".to_owned()));
        let _ = app.update(Message::LoadPressed);

        let command = command_rx.recv().expect("load command");
        assert_eq!(
            command,
            Command::LoadAsset {
                source: MediaSource::from_url("clips/answer.mp4")
            }
        );
    }

    #[test]
    fn empty_source_is_not_sent() {
        let (command_tx, command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);

        let _ = app.update(Message::LoadPressed);

        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
        assert_eq!(app.status, "media source is empty");
    }

    #[test]
    fn track_input_dispatches_pointer_commands() {
        let (command_tx, command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);
        let track = TrackGeometry::new(0.0, 400.0);

        let _ = app.update(Message::Track(TrackInput::Down { x: 12.0, track }));
        let _ = app.update(Message::Track(TrackInput::Move { x: 40.0, track }));
        let _ = app.update(Message::Track(TrackInput::Up));

        assert_eq!(
            command_rx.recv().expect("pointer down"),
            Command::PointerDown { x: 12.0, track }
        );
        assert_eq!(
            command_rx.recv().expect("pointer move"),
            Command::PointerMove { x: 40.0, track }
        );
        assert_eq!(command_rx.recv().expect("pointer up"), Command::PointerUp);
    }

    #[test]
    fn pointer_moves_coalesce_while_queue_is_full() {
        let (command_tx, command_rx) = mpsc::sync_channel(1);
        let mut app = AppState::from_sender_for_test(command_tx);
        let track = TrackGeometry::new(0.0, 400.0);

        let _ = app.update(Message::Track(TrackInput::Down { x: 10.0, track }));
        let _ = app.update(Message::Track(TrackInput::Move { x: 20.0, track }));
        let _ = app.update(Message::Track(TrackInput::Move { x: 30.0, track }));

        assert_eq!(
            command_rx.recv().expect("pointer down"),
            Command::PointerDown { x: 10.0, track }
        );
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));

        engine_event(&mut app, Event::PlayheadChanged { seconds: 0.5 });

        assert_eq!(
            command_rx.recv().expect("latest pointer move"),
            Command::PointerMove { x: 30.0, track }
        );
        assert!(matches!(command_rx.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn pointer_release_survives_a_full_queue() {
        let (command_tx, command_rx) = mpsc::sync_channel(1);
        let mut app = AppState::from_sender_for_test(command_tx);
        let track = TrackGeometry::new(0.0, 400.0);

        let _ = app.update(Message::Track(TrackInput::Down { x: 10.0, track }));
        let _ = app.update(Message::Track(TrackInput::Move { x: 40.0, track }));
        let _ = app.update(Message::Track(TrackInput::Up));
        let _ = app.update(Message::Track(TrackInput::Down { x: 90.0, track }));
        let _ = app.update(Message::Track(TrackInput::Cancel));
        let _ = app.update(Message::Tick);

        let mut received = vec![command_rx.recv().expect("pointer down")];
        for seconds in [0.5, 1.0, 1.5, 2.0] {
            engine_event(&mut app, Event::PlayheadChanged { seconds });
            received.extend(command_rx.try_recv());
        }

        assert_eq!(
            received,
            vec![
                Command::PointerDown { x: 10.0, track },
                Command::PointerMove { x: 40.0, track },
                Command::PointerUp,
                Command::PointerDown { x: 90.0, track },
                Command::PointerCancel,
            ]
        );
        assert!(app.pending_pointer.is_empty());
    }

    #[test]
    fn control_messages_dispatch_editor_commands() {
        let (command_tx, command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);

        let _ = app.update(Message::Nudge(RangeHandle::End, -1));
        let _ = app.update(Message::PreviewLoopToggled(true));
        let _ = app.update(Message::PlayPausePressed);
        let _ = app.update(Message::ResetPressed);
        let _ = app.update(Message::CommitPressed);
        let _ = app.update(Message::Tick);

        let received: Vec<Command> = command_rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                Command::Nudge {
                    handle: RangeHandle::End,
                    steps: -1
                },
                Command::SetPreviewLoop { enabled: true },
                Command::TogglePlayback,
                Command::ResetTrim,
                Command::Commit,
                Command::PlaybackTick,
            ]
        );
    }

    #[test]
    fn engine_events_update_mirrored_editor_state() {
        let (command_tx, _command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);

        engine_event(&mut app, Event::AssetLoaded(snapshot()));
        engine_event(
            &mut app,
            Event::RangeChanged {
                start: 2.0,
                end: 8.0,
                trimmed_duration: 6.0,
            },
        );
        engine_event(&mut app, Event::PlayheadChanged { seconds: 3.5 });
        engine_event(&mut app, Event::PlaybackStateChanged { playing: true });
        engine_event(
            &mut app,
            Event::DragStarted {
                target: DragTarget::RangeEnd,
            },
        );

        let editor = app.editor.as_ref().expect("editor after load");
        assert_eq!((editor.start, editor.end, editor.trimmed_duration), (2.0, 8.0, 6.0));
        assert_eq!(editor.playhead, 3.5);
        assert!(app.is_playing());
        assert_eq!(app.track_view().active, Some(DragTarget::RangeEnd));

        engine_event(
            &mut app,
            Event::DragCancelled {
                target: DragTarget::RangeEnd,
            },
        );
        assert_eq!(app.track_view().active, None);
    }

    #[test]
    fn thumbnail_events_fill_strip_cells() {
        let (command_tx, _command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);
        engine_event(&mut app, Event::AssetLoaded(snapshot()));
        assert_eq!(app.strip, vec![StripCell::Pending, StripCell::Pending]);

        engine_event(
            &mut app,
            Event::ThumbnailReady {
                slot: 1,
                thumbnail: ThumbnailSlot::Ready(Thumbnail {
                    sample_time: 10.0,
                    frame: PreviewFrame {
                        width: 1,
                        height: 1,
                        bytes: Arc::from(vec![0_u8; 4]),
                    },
                }),
            },
        );
        engine_event(
            &mut app,
            Event::ThumbnailReady {
                slot: 0,
                thumbnail: ThumbnailSlot::Placeholder { sample_time: 0.0 },
            },
        );

        assert_eq!(app.strip[0], StripCell::Placeholder);
        assert!(matches!(app.strip[1], StripCell::Ready(_)));
    }

    #[test]
    fn commit_failure_keeps_request_for_retry() {
        let (command_tx, _command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);
        engine_event(&mut app, Event::AssetLoaded(snapshot()));

        engine_event(&mut app, Event::CommitStarted { request: request() });
        engine_event(
            &mut app,
            Event::Error(EngineErrorEvent {
                kind: EngineErrorKind::CommitFailed,
                message: "HTTP 500: boom".to_owned(),
            }),
        );

        let editor = app.editor.as_ref().expect("editor after load");
        assert_eq!(
            editor.commit,
            CommitStatus::Failed {
                request: request(),
                message: "HTTP 500: boom".to_owned(),
            }
        );
        assert_eq!(app.status, "error: HTTP 500: boom");
    }

    #[test]
    fn asset_reload_clears_previous_session() {
        let (command_tx, _command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);
        engine_event(&mut app, Event::AssetLoaded(snapshot()));
        engine_event(
            &mut app,
            Event::PreviewFrameReady {
                seconds: 0.0,
                frame: PreviewFrame {
                    width: 1,
                    height: 1,
                    bytes: Arc::from(vec![0_u8; 4]),
                },
            },
        );
        assert!(app.preview.is_some());

        engine_event(
            &mut app,
            Event::AssetLoading {
                source: MediaSource::new("next", "next.mp4"),
            },
        );

        assert!(app.editor.is_none());
        assert!(app.strip.is_empty());
        assert!(app.preview.is_none());
    }

    #[test]
    fn disconnect_drops_sender_and_pending_pointer_input() {
        let (command_tx, _command_rx) = mpsc::sync_channel(8);
        let mut app = AppState::from_sender_for_test(command_tx);

        let _ = app.update(Message::Bridge(BridgeEvent::Disconnected));
        let _ = app.update(Message::CommitPressed);

        assert!(app.engine_tx.is_none());
        assert!(app.pending_pointer.is_empty());
        assert_eq!(app.status, "engine is not ready");
    }
}
