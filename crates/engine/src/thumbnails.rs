//! Thumbnail strip sampling.
//!
//! A strip has a fixed number of slots sampled at `i * duration / N`. Worker
//! threads decode slots in whatever order they finish and report through a
//! channel; the owner publishes each result into its slot exactly once.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::Sender;
use std::thread::{self, JoinHandle};

use tracing::{debug, warn};

use crate::error::{EngineError, Result};
use crate::preview::{FrameSize, MediaBackend, MediaSource, PreviewFrame};

/// Shared flag telling background work to stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Successfully sampled preview.
#[derive(Debug, Clone, PartialEq)]
pub struct Thumbnail {
    pub sample_time: f64,
    pub frame: PreviewFrame,
}

/// One fixed position in the strip.
#[derive(Debug, Clone, PartialEq)]
pub enum ThumbnailSlot {
    Pending { sample_time: f64 },
    Ready(Thumbnail),
    /// Sampling failed; the UI draws a placeholder.
    Placeholder { sample_time: f64 },
}

impl ThumbnailSlot {
    pub fn sample_time(&self) -> f64 {
        match self {
            Self::Pending { sample_time } | Self::Placeholder { sample_time } => *sample_time,
            Self::Ready(thumbnail) => thumbnail.sample_time,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }
}

/// Completion report for one slot, tagged with the session that asked for it.
#[derive(Debug)]
pub struct ThumbnailSample {
    pub generation: u64,
    pub slot: usize,
    pub sample_time: f64,
    pub result: Result<PreviewFrame>,
}

/// Evenly spaced sample times covering `[0, duration)`.
///
/// # Example
/// ```
/// use trim_engine::thumbnails::sample_times;
///
/// assert_eq!(sample_times(100.0, 4), vec![0.0, 25.0, 50.0, 75.0]);
/// ```
pub fn sample_times(duration: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let duration = if duration.is_finite() {
        duration.max(0.0)
    } else {
        0.0
    };
    (0..count)
        .map(|index| index as f64 * duration / count as f64)
        .collect()
}

/// Ordered, fixed-size thumbnail sequence for one asset.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThumbnailStrip {
    generation: u64,
    slots: Vec<ThumbnailSlot>,
}

impl ThumbnailStrip {
    /// Creates `count` pending slots for the session `generation`.
    pub fn new(generation: u64, duration: f64, count: usize) -> Self {
        Self {
            generation,
            slots: sample_times(duration, count)
                .into_iter()
                .map(|sample_time| ThumbnailSlot::Pending { sample_time })
                .collect(),
        }
    }

    pub fn slots(&self) -> &[ThumbnailSlot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// True once no slot is pending.
    pub fn is_complete(&self) -> bool {
        !self.slots.is_empty() && self.slots.iter().all(|slot| !slot.is_pending())
    }

    pub fn ready_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, ThumbnailSlot::Ready(_)))
            .count()
    }

    pub fn placeholder_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot, ThumbnailSlot::Placeholder { .. }))
            .count()
    }

    /// Writes one sample into its slot.
    ///
    /// Returns the published slot, or `None` when the sample belongs to
    /// another session, is out of range, or the slot was already written.
    pub fn publish(&mut self, sample: ThumbnailSample) -> Option<&ThumbnailSlot> {
        if sample.generation != self.generation {
            debug!(
                sample_generation = sample.generation,
                strip_generation = self.generation,
                slot = sample.slot,
                "stale thumbnail dropped"
            );
            return None;
        }
        let slot = self.slots.get_mut(sample.slot)?;
        if !slot.is_pending() {
            return None;
        }

        *slot = match sample.result {
            Ok(frame) => ThumbnailSlot::Ready(Thumbnail {
                sample_time: sample.sample_time,
                frame,
            }),
            Err(error) => {
                warn!(slot = sample.slot, %error, "thumbnail replaced by placeholder");
                ThumbnailSlot::Placeholder {
                    sample_time: sample.sample_time,
                }
            }
        };
        Some(&*slot)
    }
}

/// Owns the worker threads sampling one strip.
///
/// Dropping the handle cancels outstanding work without joining.
#[derive(Debug)]
pub struct SamplerHandle {
    cancel: CancelToken,
    workers: Vec<JoinHandle<()>>,
}

impl SamplerHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

impl Drop for SamplerHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Parameters for one sampling run.
#[derive(Debug, Clone)]
pub struct SamplerRequest {
    pub generation: u64,
    pub source: MediaSource,
    pub sample_times: Vec<f64>,
    pub size: FrameSize,
    pub workers: usize,
}

/// Starts sampling on background threads.
///
/// Workers pull slot indices from a shared counter, so slots finish in no
/// particular order. Each result is sent as `T::from(ThumbnailSample)`. A
/// worker stops when the token is cancelled or the receiver is gone; results
/// decoded after cancellation are dropped.
pub fn spawn_sampler<M, T>(media: Arc<M>, request: SamplerRequest, sink: Sender<T>) -> SamplerHandle
where
    M: MediaBackend + Send + Sync + 'static,
    T: From<ThumbnailSample> + Send + 'static,
{
    let cancel = CancelToken::new();
    let next_slot = Arc::new(AtomicUsize::new(0));
    let times: Arc<[f64]> = request.sample_times.into();
    let worker_count = request.workers.clamp(1, times.len().max(1));

    debug!(
        generation = request.generation,
        source = %request.source,
        slots = times.len(),
        workers = worker_count,
        "thumbnail sampling started"
    );

    let workers = (0..worker_count)
        .map(|_| {
            let media = Arc::clone(&media);
            let cancel = cancel.clone();
            let next_slot = Arc::clone(&next_slot);
            let times = Arc::clone(&times);
            let source = request.source.clone();
            let sink = sink.clone();
            let generation = request.generation;
            let size = request.size;

            thread::spawn(move || {
                loop {
                    if cancel.is_cancelled() {
                        return;
                    }
                    let slot = next_slot.fetch_add(1, Ordering::Relaxed);
                    let Some(&sample_time) = times.get(slot) else {
                        return;
                    };

                    let result = media
                        .decode_frame(&source, sample_time, Some(size))
                        .map_err(|error| EngineError::ThumbnailSampleFailed {
                            slot,
                            reason: error.to_string(),
                        });
                    if cancel.is_cancelled() {
                        debug!(generation, slot, "thumbnail discarded after cancellation");
                        return;
                    }

                    let sample = ThumbnailSample {
                        generation,
                        slot,
                        sample_time,
                        result,
                    };
                    if sink.send(T::from(sample)).is_err() {
                        return;
                    }
                }
            })
        })
        .collect();

    SamplerHandle { cancel, workers }
}
