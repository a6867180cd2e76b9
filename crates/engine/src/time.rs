//! Conversions between media time (seconds) and track space.
//!
//! Every function here clamps: inputs outside the domain, non-finite values
//! and degenerate tracks map to the nearest valid output instead of NaN.

/// Horizontal placement of the trim track in pointer coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackGeometry {
    pub origin_x: f32,
    pub width: f32,
}

impl TrackGeometry {
    /// Creates a track starting at `origin_x` spanning `width` pixels.
    pub fn new(origin_x: f32, width: f32) -> Self {
        Self { origin_x, width }
    }

    fn is_degenerate(&self) -> bool {
        !self.origin_x.is_finite() || !self.width.is_finite() || self.width <= 0.0
    }
}

/// Maps `t` seconds to its position in `[0, 1]` along an asset of `duration`.
///
/// # Example
/// ```
/// use trim_engine::time::time_to_fraction;
///
/// assert_eq!(time_to_fraction(30.0, 120.0), 0.25);
/// assert_eq!(time_to_fraction(-5.0, 120.0), 0.0);
/// assert_eq!(time_to_fraction(500.0, 120.0), 1.0);
/// ```
pub fn time_to_fraction(t: f64, duration: f64) -> f64 {
    if !valid_duration(duration) || t.is_nan() {
        return 0.0;
    }
    (t / duration).clamp(0.0, 1.0)
}

/// Maps a track fraction back to seconds in `[0, duration]`.
///
/// # Example
/// ```
/// use trim_engine::time::fraction_to_time;
///
/// assert_eq!(fraction_to_time(0.5, 120.0), 60.0);
/// assert_eq!(fraction_to_time(1.5, 120.0), 120.0);
/// ```
pub fn fraction_to_time(fraction: f64, duration: f64) -> f64 {
    if !valid_duration(duration) || fraction.is_nan() {
        return 0.0;
    }
    (fraction.clamp(0.0, 1.0) * duration).clamp(0.0, duration)
}

/// Converts a pointer x coordinate into seconds for the given track.
///
/// Positions left of the track map to `0`, positions right of it map to
/// `duration`.
///
/// # Example
/// ```
/// use trim_engine::time::{TrackGeometry, x_to_time};
///
/// let track = TrackGeometry::new(20.0, 600.0);
/// assert_eq!(x_to_time(20.0, track, 120.0), 0.0);
/// assert_eq!(x_to_time(320.0, track, 120.0), 60.0);
/// assert_eq!(x_to_time(900.0, track, 120.0), 120.0);
/// ```
pub fn x_to_time(x: f32, track: TrackGeometry, duration: f64) -> f64 {
    if track.is_degenerate() || x.is_nan() {
        return 0.0;
    }
    let local = f64::from(x - track.origin_x);
    fraction_to_time(local / f64::from(track.width), duration)
}

/// Converts seconds into the pointer x coordinate on the given track.
pub fn time_to_x(t: f64, track: TrackGeometry, duration: f64) -> f32 {
    if track.is_degenerate() {
        return if track.origin_x.is_finite() {
            track.origin_x
        } else {
            0.0
        };
    }
    let fraction = time_to_fraction(t, duration) as f32;
    track.origin_x + fraction * track.width
}

fn valid_duration(duration: f64) -> bool {
    duration.is_finite() && duration > 0.0
}

#[cfg(test)]
mod tests {
    use super::{TrackGeometry, fraction_to_time, time_to_fraction, time_to_x, x_to_time};

    #[test]
    fn fraction_mapping_clamps_out_of_range_and_non_finite_input() {
        assert_eq!(time_to_fraction(f64::NAN, 10.0), 0.0);
        assert_eq!(time_to_fraction(f64::INFINITY, 10.0), 1.0);
        assert_eq!(time_to_fraction(f64::NEG_INFINITY, 10.0), 0.0);
        assert_eq!(fraction_to_time(f64::NAN, 10.0), 0.0);
        assert_eq!(fraction_to_time(-0.2, 10.0), 0.0);
    }

    #[test]
    fn degenerate_duration_maps_to_zero() {
        assert_eq!(time_to_fraction(5.0, 0.0), 0.0);
        assert_eq!(fraction_to_time(0.5, -3.0), 0.0);
        assert_eq!(fraction_to_time(0.5, f64::NAN), 0.0);
    }

    #[test]
    fn pixel_mapping_is_monotonic_across_the_track() {
        let track = TrackGeometry::new(10.0, 400.0);
        let mut previous = -1.0;
        for step in 0..=60 {
            let x = -50.0 + step as f32 * 10.0;
            let t = x_to_time(x, track, 90.0);
            assert!(t >= previous, "time must not decrease as x grows");
            assert!((0.0..=90.0).contains(&t));
            previous = t;
        }
    }

    #[test]
    fn pixel_mapping_round_trips_inside_the_track() {
        let track = TrackGeometry::new(0.0, 1_200.0);
        let x = time_to_x(10.0, track, 120.0);
        assert_eq!(x, 100.0);
        assert!((x_to_time(x, track, 120.0) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn zero_width_track_never_produces_nan() {
        let track = TrackGeometry::new(5.0, 0.0);
        assert_eq!(x_to_time(30.0, track, 60.0), 0.0);
        assert_eq!(time_to_x(30.0, track, 60.0), 5.0);
    }
}
