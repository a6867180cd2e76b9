use std::env;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use iced::futures::{SinkExt, StreamExt, channel::mpsc as futures_mpsc, executor};
use iced::{Subscription, stream};
use tracing::{debug, error, info};
use trim_engine::{
    Command, Engine, EngineError, EngineErrorEvent, Event, MediaBackend, Player, SaveBackend,
    SaveTarget, TrimConfig,
};

const COMMAND_CHANNEL_CAPACITY: usize = 32;
const EVENT_CHANNEL_CAPACITY: usize = 64;
const SUBSCRIPTION_CHANNEL_CAPACITY: usize = 64;
/// Upper bound on how long finished background jobs wait to be applied.
const JOB_POLL_INTERVAL: Duration = Duration::from_millis(10);

const CONFIG_ENV: &str = "TRIM_CONFIG";
const SAVE_URL_ENV: &str = "TRIM_SAVE_URL";
const SAVE_TOKEN_ENV: &str = "TRIM_SAVE_TOKEN";
const SAVE_FILE_ENV: &str = "TRIM_SAVE_FILE";
const DEFAULT_SAVE_FILE: &str = "trim-request.json";

/// Sender used by the UI thread to dispatch commands to the engine thread.
pub type EngineCommandSender = mpsc::SyncSender<Command>;

/// Receiver used by the UI thread to read events emitted by the engine thread.
pub type EngineEventReceiver = mpsc::Receiver<Event>;

/// Handle returned once the engine thread is running.
#[derive(Debug, Clone)]
pub struct EngineHandle {
    pub commands: EngineCommandSender,
    pub config: TrimConfig,
}

/// Messages emitted by the engine bridge subscription.
#[derive(Debug, Clone)]
pub enum BridgeEvent {
    Ready(EngineHandle),
    Event(Event),
    Disconnected,
}

/// Builds a subscription that starts the engine bridge and forwards events.
pub fn engine_subscription() -> Subscription<BridgeEvent> {
    Subscription::run(bridge_worker_stream)
}

fn bridge_worker_stream() -> impl iced::futures::Stream<Item = BridgeEvent> {
    bridge_worker_stream_with(spawn_ffmpeg_bridge)
}

fn bridge_worker_stream_with(
    spawn_bridge: fn() -> (EngineHandle, EngineEventReceiver),
) -> impl iced::futures::Stream<Item = BridgeEvent> {
    stream::channel(
        SUBSCRIPTION_CHANNEL_CAPACITY,
        move |mut output| async move {
            let (handle, engine_rx) = spawn_bridge();
            let _ = output.send(BridgeEvent::Ready(handle)).await;

            let (forward_tx, mut forward_rx) =
                futures_mpsc::channel::<BridgeEvent>(SUBSCRIPTION_CHANNEL_CAPACITY);

            thread::spawn(move || {
                let mut forward_tx = forward_tx;
                while let Ok(event) = engine_rx.recv() {
                    if executor::block_on(forward_tx.send(BridgeEvent::Event(event))).is_err() {
                        return;
                    }
                }
                let _ = executor::block_on(forward_tx.send(BridgeEvent::Disconnected));
            });

            while let Some(event) = forward_rx.next().await {
                if output.send(event).await.is_err() {
                    break;
                }
            }
        },
    )
}

/// Picks the save target from the environment.
///
/// `TRIM_SAVE_URL` selects the HTTP endpoint (with an optional
/// `TRIM_SAVE_TOKEN`); otherwise requests land in `TRIM_SAVE_FILE`.
fn save_target_from_env(config: &TrimConfig) -> SaveTarget {
    let base_url = env::var(SAVE_URL_ENV).ok();
    let token = env::var(SAVE_TOKEN_ENV).ok();
    let path = env::var(SAVE_FILE_ENV).unwrap_or_else(|_| DEFAULT_SAVE_FILE.to_owned());
    SaveTarget::select(
        base_url.as_deref(),
        token.as_deref(),
        config.save_timeout(),
        path,
    )
}

fn load_config() -> trim_engine::Result<TrimConfig> {
    match env::var(CONFIG_ENV) {
        Ok(path) if !path.trim().is_empty() => TrimConfig::from_json_file(path.trim()),
        _ => Ok(TrimConfig::default()),
    }
}

/// Spawns the production bridge that wires a FFmpeg-backed engine.
///
/// A config that fails to load or validate yields a bridge that reports
/// the error once and then disconnects.
pub fn spawn_ffmpeg_bridge() -> (EngineHandle, EngineEventReceiver) {
    let engine = load_config().and_then(|config| {
        let saver = save_target_from_env(&config);
        info!(backend = saver.label(), "save backend selected");
        Engine::with_ffmpeg(saver, config)
    });

    match engine {
        Ok(engine) => spawn_engine_bridge(engine),
        Err(err) => {
            error!(error = %err, "engine failed to start");
            spawn_failed_bridge(err)
        }
    }
}

fn spawn_failed_bridge(err: EngineError) -> (EngineHandle, EngineEventReceiver) {
    let (command_tx, command_rx) = mpsc::sync_channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::sync_channel::<Event>(EVENT_CHANNEL_CAPACITY);
    let _ = event_tx.send(Event::Error(EngineErrorEvent::from_error(&err)));
    drop(command_rx);

    (
        EngineHandle {
            commands: command_tx,
            config: TrimConfig::default(),
        },
        event_rx,
    )
}

/// Spawns a bridge thread that owns `engine`.
///
/// The thread applies commands in arrival order and, between commands,
/// applies finished background jobs so their events reach the UI without
/// further input.
pub fn spawn_engine_bridge<M, S, P>(
    mut engine: Engine<M, S, P>,
) -> (EngineHandle, EngineEventReceiver)
where
    M: MediaBackend + Send + Sync + 'static,
    S: SaveBackend + Send + Sync + 'static,
    P: Player + Send + 'static,
{
    let (command_tx, command_rx) = mpsc::sync_channel::<Command>(COMMAND_CHANNEL_CAPACITY);
    let (event_tx, event_rx) = mpsc::sync_channel::<Event>(EVENT_CHANNEL_CAPACITY);
    let config = engine.config().clone();

    thread::spawn(move || {
        let forward =
            |events: Vec<Event>| events.into_iter().all(|event| event_tx.send(event).is_ok());

        loop {
            match command_rx.recv_timeout(JOB_POLL_INTERVAL) {
                Ok(command) => {
                    let events = match engine.handle_command(command) {
                        Ok(events) => events,
                        Err(err) => vec![Event::Error(EngineErrorEvent::from_error(&err))],
                    };
                    if !forward(events) {
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    debug!("engine command channel closed");
                    return;
                }
            }

            if !forward(engine.poll_jobs()) {
                return;
            }
        }
    });

    (
        EngineHandle {
            commands: command_tx,
            config,
        },
        event_rx,
    )
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::{Duration, Instant};

    use iced::futures::{StreamExt, executor, pin_mut};
    use trim_engine::{
        ClockPlayer, EngineError, EngineErrorKind, FrameSize, MediaSource, PreviewFrame,
        ProbedMedia, TrimRequest,
    };

    use super::{
        BridgeEvent, Command, Engine, EngineEventReceiver, EngineHandle, Event, MediaBackend,
        SaveBackend, TrimConfig, bridge_worker_stream_with, spawn_engine_bridge,
        spawn_failed_bridge,
    };

    const WAIT: Duration = Duration::from_secs(2);

    #[test]
    fn bridge_applies_background_probe_without_further_commands() {
        let (handle, event_rx) = spawn_engine_bridge(mock_engine(RecordingSaver::default()));

        handle
            .commands
            .send(Command::LoadAsset {
                source: MediaSource::new("answer", "answer.mp4"),
            })
            .expect("send load command");

        let first = event_rx.recv_timeout(WAIT).expect("first event");
        assert!(matches!(first, Event::AssetLoading { .. }));

        let loaded = recv_until(&event_rx, |event| matches!(event, Event::AssetLoaded(_)));
        let Event::AssetLoaded(snapshot) = loaded else {
            panic!("expected Event::AssetLoaded");
        };
        assert_eq!(snapshot.duration, 10.0);
        assert_eq!((snapshot.start, snapshot.end), (0.0, 10.0));
        assert_eq!(snapshot.thumbnails.len(), 2);

        let complete = recv_until(&event_rx, |event| {
            matches!(event, Event::ThumbnailsComplete { .. })
        });
        assert_eq!(
            complete,
            Event::ThumbnailsComplete {
                ready: 2,
                placeholders: 0
            }
        );
    }

    #[test]
    fn bridge_emits_error_event_when_command_fails() {
        let (handle, event_rx) = spawn_engine_bridge(mock_engine(RecordingSaver::default()));

        handle
            .commands
            .send(Command::SeekPlayhead { seconds: 1.0 })
            .expect("send seek command");

        let event = event_rx.recv_timeout(WAIT).expect("error event");
        let Event::Error(error) = event else {
            panic!("expected Event::Error");
        };
        assert_eq!(error.kind, EngineErrorKind::AssetUnready);
    }

    #[test]
    fn bridge_delivers_commit_result_from_worker_thread() {
        let saver = RecordingSaver::default();
        let requests = Arc::clone(&saver.requests);
        let (handle, event_rx) = spawn_engine_bridge(mock_engine(saver));

        handle
            .commands
            .send(Command::LoadAsset {
                source: MediaSource::new("answer", "answer.mp4"),
            })
            .expect("send load command");
        recv_until(&event_rx, |event| matches!(event, Event::AssetLoaded(_)));

        handle
            .commands
            .send(Command::SetBoundary {
                handle: trim_engine::RangeHandle::Start,
                seconds: 2.5,
            })
            .expect("send boundary command");
        handle.commands.send(Command::Commit).expect("send commit");

        let succeeded = recv_until(&event_rx, |event| {
            matches!(event, Event::CommitSucceeded { .. })
        });
        let Event::CommitSucceeded { request } = succeeded else {
            panic!("expected Event::CommitSucceeded");
        };
        assert_eq!(request.start_time, 2.5);
        assert_eq!(request.end_time, 10.0);

        let recorded = requests.lock().expect("requests lock");
        assert_eq!(recorded.as_slice(), &[request]);
    }

    #[test]
    fn handle_carries_engine_config() {
        let (handle, _event_rx) = spawn_engine_bridge(mock_engine(RecordingSaver::default()));

        assert_eq!(handle.config.thumbnail_count, 2);
    }

    #[test]
    fn failed_bridge_reports_error_then_disconnects() {
        let (handle, event_rx) = spawn_failed_bridge(EngineError::InvalidConfig {
            reason: "thumbnail_count must be at least 1".to_owned(),
        });

        let event = event_rx.recv_timeout(WAIT).expect("error event");
        let Event::Error(error) = event else {
            panic!("expected Event::Error");
        };
        assert_eq!(error.kind, EngineErrorKind::Other);
        assert!(error.message.contains("thumbnail_count"));
        assert!(handle.commands.send(Command::Play).is_err());
        assert!(event_rx.recv_timeout(WAIT).is_err());
    }

    #[test]
    fn bridge_worker_stream_emits_ready_forwards_events_and_disconnected() {
        let (bridge_tx, bridge_rx) = mpsc::channel::<BridgeEvent>();

        thread::spawn(move || {
            let stream = bridge_worker_stream_with(spawn_mock_bridge);
            executor::block_on(async move {
                pin_mut!(stream);
                while let Some(event) = stream.next().await {
                    let done = matches!(event, BridgeEvent::Disconnected);
                    if bridge_tx.send(event).is_err() || done {
                        break;
                    }
                }
            });
        });

        let ready = bridge_rx.recv_timeout(WAIT).expect("ready event");
        let BridgeEvent::Ready(handle) = ready else {
            panic!("expected BridgeEvent::Ready");
        };

        handle
            .commands
            .send(Command::LoadAsset {
                source: MediaSource::new("answer", "answer.mp4"),
            })
            .expect("send load command");

        let first = bridge_rx.recv_timeout(WAIT).expect("first forwarded event");
        assert!(matches!(
            first,
            BridgeEvent::Event(Event::AssetLoading { .. })
        ));

        let deadline = Instant::now() + WAIT;
        loop {
            let event = bridge_rx
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .expect("loaded event");
            if matches!(event, BridgeEvent::Event(Event::AssetLoaded(_))) {
                break;
            }
        }

        drop(handle);

        let deadline = Instant::now() + WAIT;
        loop {
            let event = bridge_rx
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .expect("disconnected event");
            if matches!(event, BridgeEvent::Disconnected) {
                break;
            }
        }
    }

    fn recv_until(event_rx: &EngineEventReceiver, wanted: impl Fn(&Event) -> bool) -> Event {
        let deadline = Instant::now() + WAIT;
        loop {
            let event = event_rx
                .recv_timeout(deadline.saturating_duration_since(Instant::now()))
                .expect("engine event before deadline");
            if wanted(&event) {
                return event;
            }
        }
    }

    fn spawn_mock_bridge() -> (EngineHandle, EngineEventReceiver) {
        spawn_engine_bridge(mock_engine(RecordingSaver::default()))
    }

    fn mock_engine(saver: RecordingSaver) -> Engine<MockBackend, RecordingSaver, ClockPlayer> {
        let config = TrimConfig {
            thumbnail_count: 2,
            ..TrimConfig::default()
        };
        Engine::new(MockBackend, saver, ClockPlayer::new(), config).expect("valid config")
    }

    #[derive(Debug, Clone, Copy)]
    struct MockBackend;

    impl MediaBackend for MockBackend {
        fn probe(&self, source: &MediaSource) -> trim_engine::Result<ProbedMedia> {
            Ok(ProbedMedia {
                source: source.clone(),
                duration: 10.0,
                width: Some(4),
                height: Some(2),
            })
        }

        fn decode_frame(
            &self,
            _source: &MediaSource,
            _at_seconds: f64,
            size: Option<FrameSize>,
        ) -> trim_engine::Result<PreviewFrame> {
            let size = size.unwrap_or(FrameSize {
                width: 4,
                height: 2,
            });
            Ok(PreviewFrame {
                width: size.width,
                height: size.height,
                bytes: Arc::from(vec![0_u8; (size.width * size.height * 4) as usize]),
            })
        }
    }

    #[derive(Debug, Default)]
    struct RecordingSaver {
        requests: Arc<Mutex<Vec<TrimRequest>>>,
    }

    impl SaveBackend for RecordingSaver {
        fn save(&self, request: &TrimRequest) -> trim_engine::Result<()> {
            self.requests
                .lock()
                .expect("requests lock")
                .push(request.clone());
            Ok(())
        }
    }
}
