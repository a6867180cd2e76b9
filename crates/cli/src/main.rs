use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tracing::{debug, info};
use trim_engine::{
    Command, EditorSnapshot, Engine, EngineErrorKind, Event, FfmpegMediaBackend, MediaSource,
    RangeHandle, SaveTarget, TrimConfig, TrimRequest,
};

type CliEngine = Engine<FfmpegMediaBackend, SaveTarget>;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Parser, Debug)]
#[command(name = "trim")]
#[command(about = "Select a sub-range of a media asset and save the trim request")]
struct Args {
    /// Media path or URL readable by ffprobe/ffmpeg
    source: String,

    /// Asset id sent with the request (defaults to the file stem)
    #[arg(long)]
    asset_id: Option<String>,

    /// Trim start in seconds (clamped to the asset)
    #[arg(long)]
    start: Option<f64>,

    /// Trim end in seconds (clamped to the asset)
    #[arg(long)]
    end: Option<f64>,

    /// JSON file overriding editor settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the save API; the request is written to --out otherwise
    #[arg(long)]
    endpoint: Option<String>,

    /// Bearer token for the save API
    #[arg(long, env = "TRIM_SAVE_TOKEN")]
    token: Option<String>,

    /// File the request is written to when no endpoint is given
    #[arg(short, long, default_value = "trim-request.json")]
    out: PathBuf,

    /// Wait for the thumbnail strip and report how many slots rendered
    #[arg(long)]
    thumbnails: bool,

    /// Print the clamped range without saving it
    #[arg(long)]
    dry_run: bool,

    /// Seconds to wait for each background step
    #[arg(long, default_value = "30")]
    timeout: u64,
}

impl Args {
    fn media_source(&self) -> MediaSource {
        match &self.asset_id {
            Some(id) => MediaSource::new(id.clone(), self.source.clone()),
            None => MediaSource::from_url(self.source.clone()),
        }
    }

    fn save_target(&self, config: &TrimConfig) -> SaveTarget {
        SaveTarget::select(
            self.endpoint.as_deref(),
            self.token.as_deref(),
            config.save_timeout(),
            self.out.clone(),
        )
    }

    fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout.max(1))
    }
}

fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt::try_init();
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TrimConfig::from_json_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TrimConfig::default(),
    };
    let saver = args.save_target(&config);
    info!(backend = saver.label(), "save backend selected");
    let engine = Engine::with_ffmpeg(saver, config).context("failed to start editor")?;
    let mut driver = Driver::new(engine, args.step_timeout());

    let source = args.media_source();
    println!("Loading {source}");
    driver.dispatch(Command::LoadAsset { source })?;
    let snapshot = driver.wait_for("asset probe", |event| match event {
        Event::AssetLoaded(snapshot) => Some(Ok(snapshot.clone())),
        Event::Error(error) if error.kind == EngineErrorKind::AssetUnready => {
            Some(Err(anyhow!("asset is not usable: {}", error.message)))
        }
        _ => None,
    })?;
    print_asset(&snapshot);

    if args.thumbnails {
        let (ready, placeholders) = driver.wait_for("thumbnails", |event| match event {
            Event::ThumbnailsComplete {
                ready,
                placeholders,
            } => Some(Ok((*ready, *placeholders))),
            _ => None,
        })?;
        println!("Thumbnails: {ready} ready, {placeholders} unavailable");
    }

    if let Some(start) = args.start {
        driver.set_boundary(RangeHandle::Start, start)?;
    }
    if let Some(end) = args.end {
        driver.set_boundary(RangeHandle::End, end)?;
    }

    let range = driver
        .engine
        .range()
        .context("asset was unloaded before the range was set")?;
    println!(
        "Selection: {:.3}s to {:.3}s ({:.3}s)",
        range.start(),
        range.end(),
        range.trimmed_duration()
    );

    if args.dry_run {
        return Ok(());
    }

    driver.dispatch(Command::Commit)?;
    let request = driver.wait_for("save", |event| match event {
        Event::CommitSucceeded { request } => Some(Ok(request.clone())),
        Event::Error(error) if error.kind == EngineErrorKind::CommitFailed => {
            Some(Err(anyhow!("save failed: {}", error.message)))
        }
        _ => None,
    })?;
    print_request(&request)?;
    Ok(())
}

/// Runs the editor on the main thread, keeping events that arrived ahead
/// of the step waiting for them.
struct Driver {
    engine: CliEngine,
    backlog: VecDeque<Event>,
    step_timeout: Duration,
}

impl Driver {
    fn new(engine: CliEngine, step_timeout: Duration) -> Self {
        Self {
            engine,
            backlog: VecDeque::new(),
            step_timeout,
        }
    }

    fn dispatch(&mut self, command: Command) -> Result<()> {
        debug!(?command, "dispatching");
        let events = self
            .engine
            .handle_command(command)
            .context("editor rejected command")?;
        self.backlog.extend(events);
        Ok(())
    }

    fn set_boundary(&mut self, handle: RangeHandle, seconds: f64) -> Result<()> {
        if !seconds.is_finite() {
            bail!("{handle:?} must be a finite number of seconds, got {seconds}");
        }
        self.dispatch(Command::SetBoundary { handle, seconds })?;
        let Some(range) = self.engine.range() else {
            bail!("asset was unloaded while setting {handle:?}");
        };
        let applied = range.get(handle);
        if (applied - seconds).abs() > f64::EPSILON {
            println!("{handle:?} clamped from {seconds:.3}s to {applied:.3}s");
        }
        Ok(())
    }

    /// Drives background jobs until `pick` resolves an event or the step
    /// timeout runs out. Events after the resolving one stay queued.
    fn wait_for<T>(
        &mut self,
        what: &str,
        mut pick: impl FnMut(&Event) -> Option<Result<T>>,
    ) -> Result<T> {
        let deadline = Instant::now() + self.step_timeout;
        loop {
            while let Some(event) = self.backlog.pop_front() {
                if let Some(outcome) = pick(&event) {
                    return outcome;
                }
            }
            if Instant::now() >= deadline {
                bail!(
                    "timed out after {}s waiting for {what}",
                    self.step_timeout.as_secs()
                );
            }
            let events = self.engine.wait_jobs(POLL_INTERVAL);
            self.backlog.extend(events);
        }
    }
}

fn print_asset(snapshot: &EditorSnapshot) {
    let id = snapshot
        .source
        .as_ref()
        .map(|source| source.id.as_str())
        .unwrap_or("?");
    println!("Asset {id}: {:.3}s", snapshot.duration);
    println!("Minimum selection: {:.3}s", snapshot.min_gap);
}

fn print_request(request: &TrimRequest) -> Result<()> {
    let json =
        serde_json::to_string_pretty(request).context("failed to serialize trim request")?;
    println!("Saved trim request:\n{json}");
    Ok(())
}
