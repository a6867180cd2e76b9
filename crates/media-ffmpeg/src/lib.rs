mod decode;
mod error;
mod probe;

pub use decode::{DecodedVideoFrame, ScaleTo, decode_video_frame_at_seconds};
pub use error::{MediaFfmpegError, Result};
pub use probe::{MediaInfo, StreamInfo, StreamKind, probe_media};
