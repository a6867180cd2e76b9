use std::collections::HashMap;

use crate::preview::PreviewFrame;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    url: String,
    bucket: i64,
}

#[derive(Debug)]
struct CachedFrame {
    frame: PreviewFrame,
    last_used: u64,
}

/// Decoded preview frames keyed by source URL and a fixed-width time bucket.
///
/// Eviction drops the entry with the oldest use stamp once `capacity` is
/// exceeded.
///
/// # Example
/// ```
/// use std::sync::Arc;
///
/// use trim_engine::PreviewFrame;
/// use trim_engine::cache::PreviewFrameCache;
///
/// let mut cache = PreviewFrameCache::new(8, 1.0 / 30.0);
/// cache.insert(
///     "demo.mp4",
///     1.51,
///     PreviewFrame {
///         width: 2,
///         height: 2,
///         bytes: Arc::from(vec![0; 16]),
///     },
/// );
///
/// assert!(cache.get("demo.mp4", 1.52).is_some());
/// ```
#[derive(Debug)]
pub struct PreviewFrameCache {
    capacity: usize,
    bucket_seconds: f64,
    clock: u64,
    frames: HashMap<BucketKey, CachedFrame>,
}

impl PreviewFrameCache {
    /// `capacity` and `bucket_seconds` must be positive; `TrimConfig::validate`
    /// checks both before an engine is built.
    pub fn new(capacity: usize, bucket_seconds: f64) -> Self {
        assert!(capacity > 0, "preview cache capacity must be positive");
        assert!(
            bucket_seconds.is_finite() && bucket_seconds > 0.0,
            "preview cache bucket size must be positive"
        );
        Self {
            capacity,
            bucket_seconds,
            clock: 0,
            frames: HashMap::with_capacity(capacity + 1),
        }
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.clock = 0;
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Whether `seconds` falls into a bucket that already holds a frame.
    /// Does not refresh the entry.
    pub fn contains(&self, url: &str, seconds: f64) -> bool {
        self.frames.contains_key(&self.bucket_key(url, seconds))
    }

    pub fn get(&mut self, url: &str, seconds: f64) -> Option<PreviewFrame> {
        let key = self.bucket_key(url, seconds);
        let stamp = self.next_stamp();
        let cached = self.frames.get_mut(&key)?;
        cached.last_used = stamp;
        Some(cached.frame.clone())
    }

    /// Stores `frame` for the bucket of `seconds`, replacing any frame
    /// already there.
    pub fn insert(&mut self, url: &str, seconds: f64, frame: PreviewFrame) {
        let key = self.bucket_key(url, seconds);
        let last_used = self.next_stamp();
        self.frames.insert(key, CachedFrame { frame, last_used });
        while self.frames.len() > self.capacity {
            let stalest = self
                .frames
                .iter()
                .min_by_key(|(_, cached)| cached.last_used)
                .map(|(key, _)| key.clone());
            match stalest {
                Some(key) => {
                    self.frames.remove(&key);
                }
                None => break,
            }
        }
    }

    fn next_stamp(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn bucket_key(&self, url: &str, seconds: f64) -> BucketKey {
        let seconds = if seconds.is_finite() {
            seconds.max(0.0)
        } else {
            0.0
        };
        BucketKey {
            url: url.to_owned(),
            bucket: (seconds / self.bucket_seconds).floor() as i64,
        }
    }
}
