use std::process::Command;

use crate::error::{MediaFfmpegError, Result};
use crate::probe::probe_media;

/// A decoded video frame in RGBA format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedVideoFrame {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// Output size of a decoded frame. The picture is letterboxed to keep its
/// aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScaleTo {
    pub width: u32,
    pub height: u32,
}

/// Seconds stepped back when a seek past the last frame yields nothing.
const END_OF_STREAM_BACKOFF_SECONDS: f64 = 1.0;

/// Decodes a single video frame at `at_seconds`.
///
/// Without `scale` the frame keeps the stream's native size, which costs an
/// extra probe. A seek at or past the end of the stream falls back to the
/// last second of video.
///
/// # Example
/// ```no_run
/// use media_ffmpeg::{ScaleTo, decode_video_frame_at_seconds};
///
/// let frame = decode_video_frame_at_seconds(
///     "sample.mp4",
///     0.5,
///     Some(ScaleTo {
///         width: 160,
///         height: 90,
///     }),
/// )
/// .expect("decode should succeed");
/// assert_eq!(frame.rgba.len(), 160 * 90 * 4);
/// ```
pub fn decode_video_frame_at_seconds(
    source: &str,
    at_seconds: f64,
    scale: Option<ScaleTo>,
) -> Result<DecodedVideoFrame> {
    if !at_seconds.is_finite() || at_seconds < 0.0 {
        return Err(MediaFfmpegError::InvalidSeek(at_seconds));
    }

    let (width, height) = match scale {
        Some(ScaleTo { width, height }) => {
            if width == 0 || height == 0 {
                return Err(MediaFfmpegError::InvalidFrameSize { width, height });
            }
            (width, height)
        }
        None => native_dimensions(source)?,
    };

    let mut rgba = decode_rgba_frame(source, at_seconds, scale)?;
    if rgba.is_empty() && at_seconds > 0.0 {
        let earlier = (at_seconds - END_OF_STREAM_BACKOFF_SECONDS).max(0.0);
        rgba = decode_rgba_frame(source, earlier, scale)?;
    }
    if rgba.is_empty() {
        return Err(MediaFfmpegError::NoFrameDecoded {
            source: source.to_owned(),
            at_seconds,
        });
    }

    let expected_size = width as usize * height as usize * 4;
    if rgba.len() != expected_size {
        return Err(MediaFfmpegError::Parse {
            context: "decoded rgba size",
            value: format!("expected {expected_size} bytes, got {}", rgba.len()),
        });
    }

    Ok(DecodedVideoFrame {
        width,
        height,
        rgba,
    })
}

fn native_dimensions(source: &str) -> Result<(u32, u32)> {
    let media = probe_media(source)?;
    let video = media
        .first_video()
        .ok_or_else(|| no_video(source, "video stream"))?;
    match (video.width, video.height) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(no_video(source, "video dimensions")),
    }
}

fn no_video(source: &str, detail: &'static str) -> MediaFfmpegError {
    MediaFfmpegError::NoVideo {
        source: source.to_owned(),
        detail,
    }
}

fn video_filter(scale: Option<ScaleTo>) -> String {
    match scale {
        Some(ScaleTo { width, height }) => format!(
            "scale={width}:{height}:force_original_aspect_ratio=decrease,\
             pad={width}:{height}:(ow-iw)/2:(oh-ih)/2,format=rgba"
        ),
        None => "format=rgba".to_owned(),
    }
}

fn decode_rgba_frame(source: &str, at_seconds: f64, scale: Option<ScaleTo>) -> Result<Vec<u8>> {
    let output = Command::new("ffmpeg")
        .arg("-hide_banner")
        .arg("-v")
        .arg("error")
        .arg("-ss")
        .arg(format!("{at_seconds:.3}"))
        .arg("-i")
        .arg(source)
        .arg("-vf")
        .arg(video_filter(scale))
        .arg("-frames:v")
        .arg("1")
        .arg("-f")
        .arg("rawvideo")
        .arg("-pix_fmt")
        .arg("rgba")
        .arg("-")
        .output()
        .map_err(|source| MediaFfmpegError::Io {
            context: "run ffmpeg decode frame",
            source,
        })?;

    if !output.status.success() {
        return Err(MediaFfmpegError::CommandFailed {
            command: format!("ffmpeg decode frame {source} at {at_seconds:.3}s"),
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }

    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::{ScaleTo, decode_video_frame_at_seconds, video_filter};
    use crate::error::MediaFfmpegError;

    #[test]
    fn scaled_filter_letterboxes_to_exact_size() {
        let filter = video_filter(Some(ScaleTo {
            width: 160,
            height: 90,
        }));
        assert!(filter.starts_with("scale=160:90:force_original_aspect_ratio=decrease,"));
        assert!(filter.contains("pad=160:90:"));
        assert!(filter.ends_with("format=rgba"));
        assert_eq!(video_filter(None), "format=rgba");
    }

    #[test]
    fn invalid_arguments_fail_before_running_ffmpeg() {
        assert!(matches!(
            decode_video_frame_at_seconds("missing.mp4", -1.0, None),
            Err(MediaFfmpegError::InvalidSeek(_))
        ));
        assert!(matches!(
            decode_video_frame_at_seconds("missing.mp4", f64::NAN, None),
            Err(MediaFfmpegError::InvalidSeek(_))
        ));
        assert!(matches!(
            decode_video_frame_at_seconds(
                "missing.mp4",
                1.0,
                Some(ScaleTo {
                    width: 0,
                    height: 90
                })
            ),
            Err(MediaFfmpegError::InvalidFrameSize { .. })
        ));
    }
}
