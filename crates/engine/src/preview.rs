use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::Arc;

use crate::error::{EngineError, Result};

/// Identified media asset reachable by path or URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaSource {
    /// Identifier the save endpoint knows the asset by.
    pub id: String,
    /// Anything ffmpeg can open: a local path or a URL.
    pub url: String,
}

impl MediaSource {
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }

    /// Builds a source whose id is derived from the file stem of `url`.
    ///
    /// # Example
    /// ```
    /// use trim_engine::MediaSource;
    ///
    /// let source = MediaSource::from_url("https://cdn.example.com/r/42/answer.mp4");
    /// assert_eq!(source.id, "answer");
    /// ```
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        let without_query = url.split(['?', '#']).next().unwrap_or(url.as_str());
        let id = Path::new(without_query)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .filter(|stem| !stem.is_empty())
            .unwrap_or(url.as_str())
            .to_owned();
        Self { id, url }
    }
}

impl Display for MediaSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.url)
    }
}

/// Target size of a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

/// Decoded RGBA8 frame handed to the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    pub bytes: Arc<[u8]>,
}

/// Result of probing one media asset.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbedMedia {
    pub source: MediaSource,
    pub duration: f64,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Media operations required by the editor.
pub trait MediaBackend {
    /// Reads duration and picture size.
    fn probe(&self, source: &MediaSource) -> Result<ProbedMedia>;

    /// Decodes one frame at `at_seconds`, scaled to `size` when given.
    fn decode_frame(
        &self,
        source: &MediaSource,
        at_seconds: f64,
        size: Option<FrameSize>,
    ) -> Result<PreviewFrame>;
}

/// FFmpeg CLI-backed backend used by production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegMediaBackend;

impl MediaBackend for FfmpegMediaBackend {
    fn probe(&self, source: &MediaSource) -> Result<ProbedMedia> {
        let info = media_ffmpeg::probe_media(&source.url)?;
        let duration = info
            .best_duration_seconds()
            .filter(|duration| duration.is_finite() && *duration > 0.0)
            .ok_or_else(|| EngineError::MissingDuration {
                url: source.url.clone(),
            })?;
        let video = info.first_video();

        Ok(ProbedMedia {
            source: source.clone(),
            duration,
            width: video.and_then(|stream| stream.width),
            height: video.and_then(|stream| stream.height),
        })
    }

    fn decode_frame(
        &self,
        source: &MediaSource,
        at_seconds: f64,
        size: Option<FrameSize>,
    ) -> Result<PreviewFrame> {
        let scale = size.map(|size| media_ffmpeg::ScaleTo {
            width: size.width,
            height: size.height,
        });
        let decoded = media_ffmpeg::decode_video_frame_at_seconds(&source.url, at_seconds, scale)?;
        Ok(PreviewFrame {
            width: decoded.width,
            height: decoded.height,
            bytes: decoded.rgba.into(),
        })
    }
}
