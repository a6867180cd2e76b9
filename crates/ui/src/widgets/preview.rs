use iced::widget::{column, container, image, text};
use iced::{ContentFit, Element, Length};
use trim_engine::PreviewFrame;

/// Decoded frame ready for display, tagged with the source time it shows.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewImage {
    pub handle: image::Handle,
    pub width: u32,
    pub height: u32,
    pub at_seconds: f64,
}

impl PreviewImage {
    /// Returns `None` for empty frames and for RGBA buffers whose length
    /// does not match `width * height * 4`.
    pub fn from_frame(frame: &PreviewFrame, at_seconds: f64) -> Option<Self> {
        let rgba_len = frame.width.checked_mul(frame.height)?.checked_mul(4)? as usize;
        if rgba_len == 0 || frame.bytes.len() != rgba_len {
            return None;
        }

        Some(Self {
            handle: image::Handle::from_rgba(frame.width, frame.height, frame.bytes.to_vec()),
            width: frame.width,
            height: frame.height,
            at_seconds,
        })
    }
}

/// `m:ss.mmm`, with hours prepended once the asset runs past an hour.
pub fn format_timestamp(seconds: f64) -> String {
    let millis = if seconds.is_finite() {
        (seconds.max(0.0) * 1000.0).round() as u64
    } else {
        0
    };
    let (hours, rest) = (millis / 3_600_000, millis % 3_600_000);
    let (minutes, rest) = (rest / 60_000, rest % 60_000);
    let (secs, ms) = (rest / 1000, rest % 1000);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{secs:02}.{ms:03}")
    } else {
        format!("{minutes}:{secs:02}.{ms:03}")
    }
}

/// Preview pane: the latest frame with its timestamp, or `placeholder`.
pub fn view<'a, Message>(
    latest: Option<&PreviewImage>,
    placeholder: &'a str,
) -> Element<'a, Message>
where
    Message: 'a,
{
    let Some(frame) = latest else {
        return container(text(placeholder)).center(Length::Fill).into();
    };

    column![
        image(frame.handle.clone())
            .content_fit(ContentFit::Contain)
            .width(Length::Fill)
            .height(Length::Fill),
        container(text(format_timestamp(frame.at_seconds)).size(12)).center_x(Length::Fill),
    ]
    .spacing(4)
    .into()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use iced::widget::image;
    use trim_engine::PreviewFrame;

    use super::{PreviewImage, format_timestamp};

    fn frame(width: u32, height: u32, len: usize) -> PreviewFrame {
        PreviewFrame {
            width,
            height,
            bytes: Arc::from(vec![7_u8; len]),
        }
    }

    #[test]
    fn wraps_rgba_frame_with_its_sample_time() {
        let Some(preview) = PreviewImage::from_frame(&frame(2, 1, 8), 4.25) else {
            panic!("expected preview image");
        };

        assert_eq!(preview.at_seconds, 4.25);
        let image::Handle::Rgba {
            width,
            height,
            pixels,
            ..
        } = preview.handle
        else {
            panic!("expected rgba handle");
        };
        assert_eq!((width, height), (2, 1));
        assert_eq!(pixels.len(), 8);
    }

    #[test]
    fn truncated_and_empty_frames_are_not_shown() {
        assert!(PreviewImage::from_frame(&frame(2, 2, 3), 0.0).is_none());
        assert!(PreviewImage::from_frame(&frame(0, 90, 0), 0.0).is_none());
    }

    #[test]
    fn timestamps_use_minutes_and_milliseconds() {
        assert_eq!(format_timestamp(0.0), "0:00.000");
        assert_eq!(format_timestamp(75.5), "1:15.500");
        assert_eq!(format_timestamp(3_725.042), "1:02:05.042");
        assert_eq!(format_timestamp(-3.0), "0:00.000");
        assert_eq!(format_timestamp(f64::NAN), "0:00.000");
    }
}
