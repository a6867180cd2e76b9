//! UI-agnostic core of the media trim editor.

pub mod api;
pub mod cache;
pub mod config;
pub mod drag;
pub mod error;
pub mod playback;
pub mod preview;
pub mod range;
pub mod save;
pub mod thumbnails;
pub mod time;

pub use api::{
    Command, CommitStatus, EditorSnapshot, Engine, EngineErrorEvent, EngineErrorKind, Event,
    Readiness,
};
pub use config::TrimConfig;
pub use drag::{DragState, DragTarget};
pub use error::{EngineError, Result};
pub use playback::{ClockPlayer, Player};
pub use preview::{
    FfmpegMediaBackend, FrameSize, MediaBackend, MediaSource, PreviewFrame, ProbedMedia,
};
pub use range::{RangeHandle, TimeRange};
pub use save::{HttpSaveBackend, JsonFileSaveBackend, SaveBackend, SaveTarget, TrimRequest};
pub use thumbnails::{Thumbnail, ThumbnailSlot};
pub use time::TrackGeometry;
