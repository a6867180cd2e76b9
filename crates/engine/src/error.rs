use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by editor commands, media probing and commits.
#[derive(Debug)]
pub enum EngineError {
    /// No asset with a usable duration is loaded.
    AssetUnready,
    MissingDuration {
        url: String,
    },
    DurationBelowMinGap {
        duration: f64,
        min_gap: f64,
    },
    InvariantViolation {
        start: f64,
        end: f64,
        duration: f64,
        min_gap: f64,
    },
    CommitInFlight,
    CommitFailed {
        reason: String,
    },
    ThumbnailSampleFailed {
        slot: usize,
        reason: String,
    },
    ConfigIo {
        path: PathBuf,
        source: std::io::Error,
    },
    ConfigSerialization {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidConfig {
        reason: String,
    },
    Media(media_ffmpeg::MediaFfmpegError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AssetUnready => write!(f, "asset is not ready"),
            Self::MissingDuration { url } => {
                write!(f, "media duration is missing: {url}")
            }
            Self::DurationBelowMinGap { duration, min_gap } => write!(
                f,
                "media duration {duration:.3}s is shorter than the minimum trim span {min_gap:.3}s"
            ),
            Self::InvariantViolation {
                start,
                end,
                duration,
                min_gap,
            } => write!(
                f,
                "trim range invariant violated: {start}..{end} \
                 (duration {duration}, min gap {min_gap})"
            ),
            Self::CommitInFlight => write!(f, "a trim commit is already in flight"),
            Self::CommitFailed { reason } => write!(f, "trim commit failed: {reason}"),
            Self::ThumbnailSampleFailed { slot, reason } => {
                write!(f, "thumbnail slot {slot} could not be sampled: {reason}")
            }
            Self::ConfigIo { path, source } => {
                write!(f, "failed to read config: {} ({source})", path.display())
            }
            Self::ConfigSerialization { path, source } => {
                write!(f, "config deserialization failed at {} ({source})", path.display())
            }
            Self::InvalidConfig { reason } => write!(f, "invalid config: {reason}"),
            Self::Media(err) => write!(f, "media backend error: {err}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigIo { source, .. } => Some(source),
            Self::ConfigSerialization { source, .. } => Some(source),
            Self::Media(err) => Some(err),
            _ => None,
        }
    }
}

impl From<media_ffmpeg::MediaFfmpegError> for EngineError {
    fn from(value: media_ffmpeg::MediaFfmpegError) -> Self {
        Self::Media(value)
    }
}
