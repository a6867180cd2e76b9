use std::fmt;

pub type Result<T> = std::result::Result<T, MediaFfmpegError>;

/// Failure while probing a source or grabbing a frame through the FFmpeg CLI.
#[derive(Debug)]
pub enum MediaFfmpegError {
    /// Seek time was negative or not finite.
    InvalidSeek(f64),
    InvalidFrameSize {
        width: u32,
        height: u32,
    },
    /// The source has no usable video track; `detail` says what was missing.
    NoVideo {
        source: String,
        detail: &'static str,
    },
    NoStreams(String),
    /// `ffmpeg` exited cleanly but wrote no picture.
    NoFrameDecoded {
        source: String,
        at_seconds: f64,
    },
    Io {
        context: &'static str,
        source: std::io::Error,
    },
    CommandFailed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },
    Utf8(std::string::FromUtf8Error),
    Parse {
        context: &'static str,
        value: String,
    },
}

impl fmt::Display for MediaFfmpegError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidSeek(seconds) => write!(f, "cannot seek to {seconds}s"),
            Self::InvalidFrameSize { width, height } => {
                write!(f, "frame size {width}x{height} has a zero side")
            }
            Self::NoVideo { source, detail } => write!(f, "{source} has no {detail}"),
            Self::NoStreams(source) => write!(f, "ffprobe found no streams in {source}"),
            Self::NoFrameDecoded { source, at_seconds } => {
                write!(f, "no picture at {at_seconds:.3}s in {source}")
            }
            Self::Io { context, source } => write!(f, "failed to {context}: {source}"),
            Self::CommandFailed {
                command,
                status,
                stderr,
            } => write!(f, "`{command}` exited with {status}: {}", stderr.trim()),
            Self::Utf8(err) => write!(f, "tool output is not utf-8: {err}"),
            Self::Parse { context, value } => write!(f, "unreadable {context}: {value:?}"),
        }
    }
}

impl std::error::Error for MediaFfmpegError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Utf8(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::string::FromUtf8Error> for MediaFfmpegError {
    fn from(value: std::string::FromUtf8Error) -> Self {
        Self::Utf8(value)
    }
}
