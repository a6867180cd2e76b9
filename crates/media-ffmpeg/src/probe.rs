use std::collections::HashMap;
use std::process::Command;
use std::str::FromStr;

use crate::error::{MediaFfmpegError, Result};

/// Stream kind discovered by probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Video,
    Audio,
    Other,
}

/// Stream metadata read from `ffprobe`.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamInfo {
    pub index: u32,
    pub kind: StreamKind,
    pub codec_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: Option<f64>,
}

/// Media probe result.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaInfo {
    /// Path or URL the info was read from.
    pub source: String,
    pub streams: Vec<StreamInfo>,
    /// Container duration (`format=duration`).
    pub duration_seconds: Option<f64>,
}

impl MediaInfo {
    /// Returns the first video stream.
    ///
    /// # Example
    /// ```no_run
    /// use media_ffmpeg::probe_media;
    ///
    /// let info = probe_media("sample.mp4").expect("probe should succeed");
    /// let _video = info.first_video().expect("video stream exists");
    /// ```
    pub fn first_video(&self) -> Option<&StreamInfo> {
        self.first_of(StreamKind::Video)
    }

    pub fn first_audio(&self) -> Option<&StreamInfo> {
        self.first_of(StreamKind::Audio)
    }

    fn first_of(&self, kind: StreamKind) -> Option<&StreamInfo> {
        self.streams.iter().find(|stream| stream.kind == kind)
    }

    /// Container duration, falling back to the longest stream duration.
    ///
    /// Non-finite and non-positive values are treated as unknown.
    pub fn best_duration_seconds(&self) -> Option<f64> {
        let usable = |value: &f64| value.is_finite() && *value > 0.0;
        self.duration_seconds.filter(usable).or_else(|| {
            self.streams
                .iter()
                .filter_map(|stream| stream.duration_seconds)
                .filter(usable)
                .reduce(f64::max)
        })
    }
}

/// Probes a media file or URL with a single `ffprobe` run.
///
/// # Example
/// ```no_run
/// use media_ffmpeg::probe_media;
///
/// let info = probe_media("sample.mp4").expect("probe should succeed");
/// assert!(!info.streams.is_empty());
/// ```
pub fn probe_media(source: &str) -> Result<MediaInfo> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "stream=index,codec_type,codec_name,width,height,duration:format=duration",
            "-of",
            "compact=nk=0",
        ])
        .arg(source)
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffprobe",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffprobe {source}"),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    let stdout = String::from_utf8(output.stdout)?;
    parse_probe_output(source, &stdout)
}

/// Parses `compact` output where every line starts with its section name,
/// e.g. `stream|index=0|codec_type=video|...` or `format|duration=12.48`.
fn parse_probe_output(source: &str, stdout: &str) -> Result<MediaInfo> {
    let mut streams = Vec::new();
    let mut duration_seconds = None;

    for line in stdout.lines().map(str::trim).filter(|line| !line.is_empty()) {
        let (section, body) = line.split_once('|').unwrap_or((line, ""));
        let fields = Fields::parse(body)?;
        match section {
            "stream" => streams.push(stream_from_fields(&fields, line)?),
            "format" => duration_seconds = fields.seconds("duration", "format duration")?,
            _ => {}
        }
    }

    if streams.is_empty() {
        return Err(MediaFfmpegError::NoStreams(source.to_owned()));
    }

    Ok(MediaInfo {
        source: source.to_owned(),
        streams,
        duration_seconds,
    })
}

fn stream_from_fields(fields: &Fields<'_>, line: &str) -> Result<StreamInfo> {
    let missing = |context: &'static str| MediaFfmpegError::Parse {
        context,
        value: line.to_owned(),
    };

    let kind = match fields.get("codec_type").ok_or_else(|| missing("codec_type"))? {
        "video" => StreamKind::Video,
        "audio" => StreamKind::Audio,
        _ => StreamKind::Other,
    };

    Ok(StreamInfo {
        index: fields
            .number::<u32>("index", "stream index")?
            .ok_or_else(|| missing("stream index"))?,
        kind,
        codec_name: fields.get("codec_name").map(str::to_owned),
        width: fields.number("width", "width")?,
        height: fields.number("height", "height")?,
        duration_seconds: fields.seconds("duration", "stream duration")?,
    })
}

/// `key=value` pairs of one section line. Empty and `N/A` values are absent.
struct Fields<'a>(HashMap<&'a str, &'a str>);

impl<'a> Fields<'a> {
    fn parse(body: &'a str) -> Result<Self> {
        let mut map = HashMap::new();
        for field in body.split('|').filter(|field| !field.is_empty()) {
            let (key, value) = field
                .split_once('=')
                .ok_or_else(|| MediaFfmpegError::Parse {
                    context: "probe field",
                    value: field.to_owned(),
                })?;
            let value = value.trim().trim_matches('"');
            if !value.is_empty() && value != "N/A" {
                map.insert(key.trim(), value);
            }
        }
        Ok(Self(map))
    }

    fn get(&self, key: &str) -> Option<&'a str> {
        self.0.get(key).copied()
    }

    fn number<T: FromStr>(&self, key: &str, context: &'static str) -> Result<Option<T>> {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>().map_err(|_| MediaFfmpegError::Parse {
                    context,
                    value: raw.to_owned(),
                })
            })
            .transpose()
    }

    fn seconds(&self, key: &str, context: &'static str) -> Result<Option<f64>> {
        self.number::<f64>(key, context)
    }
}

#[cfg(test)]
mod tests {
    use super::{Fields, MediaInfo, StreamInfo, StreamKind, parse_probe_output, stream_from_fields};
    use crate::error::MediaFfmpegError;

    fn stream(line: &str) -> Result<StreamInfo, MediaFfmpegError> {
        let body = line.strip_prefix("stream|").unwrap_or(line);
        let fields = Fields::parse(body)?;
        stream_from_fields(&fields, line)
    }

    #[test]
    fn parses_streams_and_format_duration_from_one_run() {
        let output = "\
stream|index=0|codec_name=h264|codec_type=video|width=1280|height=720|duration=12.480000
stream|index=1|codec_name=aac|codec_type=audio|width=N/A|height=N/A|duration=12.500000
format|duration=12.512000
";

        let info = parse_probe_output("answer.mp4", output).expect("output should parse");

        assert_eq!(info.source, "answer.mp4");
        assert_eq!(info.streams.len(), 2);
        let video = info.first_video().expect("video stream");
        assert_eq!(video.codec_name.as_deref(), Some("h264"));
        assert_eq!((video.width, video.height), (Some(1280), Some(720)));
        assert_eq!(video.duration_seconds, Some(12.48));
        assert_eq!(info.first_audio().map(|audio| audio.index), Some(1));
        assert_eq!(info.duration_seconds, Some(12.512));
    }

    #[test]
    fn audio_only_output_has_no_video() {
        let output = "\
stream|index=0|codec_name=opus|codec_type=audio|duration=N/A
format|duration=N/A
";

        let info = parse_probe_output("voice.webm", output).expect("output should parse");

        assert!(info.first_video().is_none());
        assert_eq!(info.duration_seconds, None);
        assert_eq!(info.best_duration_seconds(), None);
    }

    #[test]
    fn output_without_streams_is_rejected() {
        assert!(matches!(
            parse_probe_output("empty.bin", "format|duration=1.0\n"),
            Err(MediaFfmpegError::NoStreams(source)) if source == "empty.bin"
        ));
    }

    #[test]
    fn malformed_stream_lines_are_rejected() {
        assert!(matches!(
            stream("stream|index=0|codec_type"),
            Err(MediaFfmpegError::Parse { .. })
        ));
        assert!(matches!(
            stream("stream|index=zero|codec_type=video"),
            Err(MediaFfmpegError::Parse { .. })
        ));
        assert!(matches!(
            stream("stream|index=3|width=10"),
            Err(MediaFfmpegError::Parse {
                context: "codec_type",
                ..
            })
        ));
    }

    #[test]
    fn best_duration_falls_back_to_longest_stream() {
        let stream = |kind, duration| StreamInfo {
            index: 0,
            kind,
            codec_name: None,
            width: None,
            height: None,
            duration_seconds: duration,
        };
        let mut info = MediaInfo {
            source: "clip.webm".to_owned(),
            streams: vec![
                stream(StreamKind::Video, Some(9.5)),
                stream(StreamKind::Audio, Some(10.0)),
            ],
            duration_seconds: None,
        };
        assert_eq!(info.best_duration_seconds(), Some(10.0));

        info.duration_seconds = Some(12.0);
        assert_eq!(info.best_duration_seconds(), Some(12.0));

        info.duration_seconds = Some(f64::INFINITY);
        info.streams.clear();
        assert_eq!(info.best_duration_seconds(), None);
    }
}
