//! # Playback Engine
//!
//! Drives a virtual play-head through a trace's time axis.
//!
//! The engine owns its state and is stepped by whatever loop the host has
//! (an animation-frame callback, a render loop, a timer) through
//! [`PlaybackEngine::tick`]. Virtual time is derived from elapsed wall-clock
//! time since the last anchor, never from a per-frame counter, so dropped or
//! throttled frames do not change where the play-head is.
//!
//! Every state transition (play, seek, speed change, stop) rebases the
//! wall-clock anchor; a paused or stopped engine holds no anchor, so resuming
//! never jumps forward by the time spent paused.

use std::sync::Arc;
use std::time::Instant;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{OverlayError, Result};
use crate::resolver::GeoTrace;
use crate::telemetry::{Metric, TelemetryTrace};
use crate::GeoPoint;

/// How the discrete gear channel is sampled between two recorded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GearInterpolation {
    /// Gear of the nearer sample
    #[default]
    Nearest,
    /// Linear blend like the continuous channels (can yield fractional gears)
    Linear,
}

/// Playback configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    /// Speed multiplier at start.
    /// Default: 1.0
    pub initial_speed: f64,

    /// Gear sampling mode.
    /// Default: Nearest
    pub gear: GearInterpolation,

    /// `play()` at the end of the trace starts again from the first sample.
    /// Default: true
    pub restart_at_end: bool,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            initial_speed: 1.0,
            gear: GearInterpolation::Nearest,
            restart_at_end: true,
        }
    }
}

/// Telemetry values at an arbitrary continuous time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InterpolatedSample {
    pub time: f64,
    pub distance: f64,
    pub x: f64,
    pub y: f64,
    pub speed: f64,
    pub throttle: f64,
    pub brake: f64,
    pub rpm: f64,
    pub gear: f64,
    /// Interpolated map position, if the trace was mapped
    pub position: Option<GeoPoint>,
}

/// Derived, read-only view of the engine after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub current_time: f64,
    pub playing: bool,
    pub speed: f64,
    /// `i` such that `time[i] ≤ current_time ≤ time[i+1]`
    pub segment_index: usize,
    /// Position within segment `i`, in [0, 1]
    pub fraction: f64,
    /// Play-head position over the lap, in [0, 1]
    pub progress: f64,
    pub sample: InterpolatedSample,
}

/// Index `i` with `times[i] ≤ t ≤ times[i+1]`, clamped to `[0, n-2]`.
///
/// Binary search over a non-decreasing slice. Returns 0 for slices shorter
/// than two entries. With repeated timestamps the later interval is chosen.
///
/// # Example
/// ```
/// use track_overlay::find_segment;
/// let times = [0.0, 10.0, 20.0, 30.0];
/// assert_eq!(find_segment(&times, 15.0), 1);
/// assert_eq!(find_segment(&times, -5.0), 0);
/// assert_eq!(find_segment(&times, 999.0), 2);
/// ```
pub fn find_segment(times: &[f64], t: f64) -> usize {
    if times.len() < 2 {
        return 0;
    }
    // First index whose time is strictly after t
    let after = times.partition_point(|&x| x <= t);
    after.saturating_sub(1).min(times.len() - 2)
}

/// Fraction of `t` through `[t0, t1]`, clamped to [0, 1]; zero-length intervals give 0.
pub fn segment_fraction(t0: f64, t1: f64, t: f64) -> f64 {
    let span = t1 - t0;
    if span > 0.0 {
        ((t - t0) / span).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn lerp(a: f64, b: f64, f: f64) -> f64 {
    a + (b - a) * f
}

/// Interpolate every channel of `trace` at time `t` (clamped to the trace's range).
///
/// Returns `None` if the trace has no time column or no samples.
pub fn interpolate_at(
    trace: &TelemetryTrace,
    geo: Option<&GeoTrace>,
    t: f64,
    gear_mode: GearInterpolation,
) -> Option<(usize, f64, InterpolatedSample)> {
    let times = trace.times().filter(|ts| !ts.is_empty())?;
    let n = times.len();
    let t = t.clamp(times[0], times[n - 1]);
    let i = find_segment(times, t);
    let j = (i + 1).min(n - 1);
    let f = if j > i {
        segment_fraction(times[i], times[j], t)
    } else {
        0.0
    };

    let channel = |values: &[f64]| lerp(values[i], values[j], f);
    let gears = trace.column(Metric::Gear);
    let gear = match gear_mode {
        GearInterpolation::Nearest => {
            if f < 0.5 {
                gears[i]
            } else {
                gears[j]
            }
        }
        GearInterpolation::Linear => channel(gears),
    };

    let position = geo
        .filter(|g| g.points.len() == n)
        .map(|g| {
            let (a, b) = (g.points[i], g.points[j]);
            GeoPoint::new(lerp(a.lon, b.lon, f), lerp(a.lat, b.lat, f))
        });

    Some((
        i,
        f,
        InterpolatedSample {
            time: t,
            distance: channel(trace.distances()),
            x: channel(trace.xs()),
            y: channel(trace.ys()),
            speed: channel(trace.column(Metric::Speed)),
            throttle: channel(trace.column(Metric::Throttle)),
            brake: channel(trace.column(Metric::Brake)),
            rpm: channel(trace.column(Metric::Rpm)),
            gear,
            position,
        },
    ))
}

/// Wall-clock instant paired with the virtual time it corresponds to.
#[derive(Debug, Clone, Copy)]
struct Anchor {
    wall: Instant,
    time: f64,
}

/// Play-head over one trace.
pub struct PlaybackEngine {
    trace: Arc<TelemetryTrace>,
    geo: Option<Arc<GeoTrace>>,
    config: PlaybackConfig,
    start_time: f64,
    end_time: f64,
    current_time: f64,
    playing: bool,
    speed: f64,
    anchor: Option<Anchor>,
}

impl PlaybackEngine {
    /// Create an engine with default configuration.
    ///
    /// Returns `None` when the trace has no playback data (no time column or
    /// no samples); that is "nothing to play", not an error.
    pub fn new(trace: Arc<TelemetryTrace>, geo: Option<Arc<GeoTrace>>) -> Option<Self> {
        Self::with_config(trace, geo, PlaybackConfig::default())
    }

    /// Create an engine with custom configuration.
    pub fn with_config(
        trace: Arc<TelemetryTrace>,
        geo: Option<Arc<GeoTrace>>,
        config: PlaybackConfig,
    ) -> Option<Self> {
        let (start_time, end_time) = trace.time_range()?;
        let speed = if config.initial_speed.is_finite() && config.initial_speed > 0.0 {
            config.initial_speed
        } else {
            1.0
        };
        Some(Self {
            trace,
            geo,
            config,
            start_time,
            end_time,
            current_time: start_time,
            playing: false,
            speed,
            anchor: None,
        })
    }

    pub fn trace(&self) -> &TelemetryTrace {
        &self.trace
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// `(first, last)` sample time.
    pub fn time_range(&self) -> (f64, f64) {
        (self.start_time, self.end_time)
    }

    fn clamp_time(&self, t: f64) -> f64 {
        if t.is_nan() {
            return self.start_time;
        }
        t.clamp(self.start_time, self.end_time)
    }

    /// Virtual time at `now` given the current anchor (no state change).
    fn time_at(&self, now: Instant) -> f64 {
        match (self.playing, self.anchor) {
            (true, Some(anchor)) => {
                let elapsed = now.saturating_duration_since(anchor.wall).as_secs_f64();
                self.clamp_time(anchor.time + elapsed * self.speed)
            }
            _ => self.current_time,
        }
    }

    fn rebase(&mut self, now: Instant) {
        self.anchor = self.playing.then_some(Anchor {
            wall: now,
            time: self.current_time,
        });
    }

    /// Start or resume from the current time.
    pub fn play(&mut self, now: Instant) {
        if self.current_time >= self.end_time && self.config.restart_at_end {
            self.current_time = self.start_time;
        }
        self.playing = true;
        self.rebase(now);
        debug!("[Playback] Play from {:.3}s at {}x", self.current_time, self.speed);
    }

    /// Stop advancing; the play-head stays at its last computed time.
    pub fn pause(&mut self) {
        self.playing = false;
        self.anchor = None;
        debug!("[Playback] Paused at {:.3}s", self.current_time);
    }

    /// Halt any scheduled advancement (e.g. on teardown).
    ///
    /// Like [`pause`](Self::pause), and a later [`play`](Self::play) rebases
    /// from scratch rather than from a stale anchor.
    pub fn stop(&mut self) {
        self.pause();
    }

    /// Jump to `time` (clamped to the trace); keeps the playing state.
    pub fn seek(&mut self, time: f64, now: Instant) {
        self.current_time = self.clamp_time(time);
        self.rebase(now);
    }

    /// Change the speed multiplier without moving the play-head.
    ///
    /// # Errors
    /// [`OverlayError::InvalidSpeed`] for non-finite or non-positive values.
    pub fn set_speed(&mut self, multiplier: f64, now: Instant) -> Result<()> {
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(OverlayError::InvalidSpeed { multiplier });
        }
        // Bank progress at the old speed before switching
        self.current_time = self.time_at(now);
        self.speed = multiplier;
        self.rebase(now);
        Ok(())
    }

    /// Advance to `now` and return the current view.
    ///
    /// Reaching the last sample stops playback; it does not loop.
    pub fn tick(&mut self, now: Instant) -> PlaybackSnapshot {
        if self.playing {
            if self.anchor.is_none() {
                self.rebase(now);
            }
            self.current_time = self.time_at(now);
            if self.current_time >= self.end_time {
                self.playing = false;
                self.anchor = None;
                debug!("[Playback] Reached end at {:.3}s", self.current_time);
            }
        }
        self.snapshot()
    }

    /// Current view without advancing.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        let (segment_index, fraction, sample) = interpolate_at(
            &self.trace,
            self.geo.as_deref(),
            self.current_time,
            self.config.gear,
        )
        .unwrap_or((
            0,
            0.0,
            InterpolatedSample {
                time: self.current_time,
                distance: 0.0,
                x: 0.0,
                y: 0.0,
                speed: 0.0,
                throttle: 0.0,
                brake: 0.0,
                rpm: 0.0,
                gear: 0.0,
                position: None,
            },
        ));

        let duration = self.end_time - self.start_time;
        let progress = if duration > 0.0 {
            (self.current_time - self.start_time) / duration
        } else {
            1.0
        };

        PlaybackSnapshot {
            current_time: self.current_time,
            playing: self.playing,
            speed: self.speed,
            segment_index,
            fraction,
            progress,
            sample,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::time::Duration;

    fn trace() -> Arc<TelemetryTrace> {
        Arc::new(
            TelemetryTrace::from_json_str(
                r#"{"time": [0, 10, 20, 30],
                    "distance": [0, 500, 1000, 1500],
                    "x": [0, 100, 200, 300],
                    "y": [0, 0, 50, 50],
                    "speed": [100, 200, 150, 250],
                    "throttle": [100, 100, 0, 100],
                    "brake": [0, 0, 100, 0],
                    "rpm": [9000, 11000, 8000, 12000],
                    "gear": [3, 5, 4, 6]}"#,
            )
            .unwrap(),
        )
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_find_segment() {
        let times = [0.0, 10.0, 20.0, 30.0];
        assert_eq!(find_segment(&times, 15.0), 1);
        assert_eq!(find_segment(&times, -5.0), 0);
        assert_eq!(find_segment(&times, 999.0), 2);
        assert_eq!(find_segment(&times, 0.0), 0);
        assert_eq!(find_segment(&times, 10.0), 1);
        assert_eq!(find_segment(&times, 30.0), 2);
    }

    #[test]
    fn test_find_segment_ties_and_short() {
        let times = [0.0, 10.0, 10.0, 20.0];
        let i = find_segment(&times, 10.0);
        assert!(times[i] <= 10.0 && 10.0 <= times[i + 1]);
        assert_eq!(find_segment(&[5.0], 3.0), 0);
        assert_eq!(find_segment(&[], 3.0), 0);
    }

    #[test]
    fn test_find_segment_brackets_query() {
        let times: Vec<f64> = (0..1000).map(|i| (i as f64) * 0.25 + (i % 3) as f64 * 0.01).collect();
        for k in 0..500 {
            let t = k as f64 * 0.499;
            let i = find_segment(&times, t);
            assert!(times[i] <= t && t <= times[i + 1], "t={} i={}", t, i);
        }
    }

    #[test]
    fn test_interpolates_midpoint() {
        let t = TelemetryTrace::from_json_str(r#"{"time": [0, 10], "x": [0, 100], "y": [0, 0]}"#)
            .unwrap();
        let (i, f, s) = interpolate_at(&t, None, 5.0, GearInterpolation::Nearest).unwrap();
        assert_eq!(i, 0);
        assert_abs_diff_eq!(f, 0.5);
        assert_abs_diff_eq!(s.x, 50.0);
    }

    #[test]
    fn test_zero_length_interval() {
        let t = TelemetryTrace::from_json_str(r#"{"time": [0, 5, 5, 10], "x": [0, 1, 2, 3], "y": [0, 0, 0, 0]}"#)
            .unwrap();
        let (_, f, s) = interpolate_at(&t, None, 5.0, GearInterpolation::Nearest).unwrap();
        assert!(f.is_finite());
        assert!(s.x.is_finite());
    }

    #[test]
    fn test_gear_modes() {
        let trace = trace();
        let (_, _, nearest) = interpolate_at(&trace, None, 12.0, GearInterpolation::Nearest).unwrap();
        assert_eq!(nearest.gear, 5.0);
        let (_, _, nearest) = interpolate_at(&trace, None, 18.0, GearInterpolation::Nearest).unwrap();
        assert_eq!(nearest.gear, 4.0);
        let (_, _, linear) = interpolate_at(&trace, None, 15.0, GearInterpolation::Linear).unwrap();
        assert_abs_diff_eq!(linear.gear, 4.5);
    }

    #[test]
    fn test_no_time_means_no_engine() {
        let t = Arc::new(TelemetryTrace::from_json_str(r#"{"x": [0, 1], "y": [0, 1]}"#).unwrap());
        assert!(PlaybackEngine::new(t, None).is_none());
    }

    #[test]
    fn test_seek_then_play() {
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        let t0 = Instant::now();
        engine.seek(12.0, t0);
        engine.play(t0);
        let snap = engine.tick(t0 + secs(1.0));
        assert_abs_diff_eq!(snap.current_time, 13.0, epsilon = 1e-9);
        assert!(snap.playing);
        assert_eq!(snap.segment_index, 1);
    }

    #[test]
    fn test_advance_matches_seek() {
        let t0 = Instant::now();
        let delta = 1.75;

        let mut played = PlaybackEngine::new(trace(), None).unwrap();
        played.seek(3.0, t0);
        played.set_speed(2.0, t0).unwrap();
        played.play(t0);
        let a = played.tick(t0 + secs(delta));

        let mut sought = PlaybackEngine::new(trace(), None).unwrap();
        sought.seek(3.0 + 2.0 * delta, t0);
        let b = sought.snapshot();

        assert_abs_diff_eq!(a.current_time, b.current_time, epsilon = 1e-9);
        assert_abs_diff_eq!(a.sample.x, b.sample.x, epsilon = 1e-9);
        assert_abs_diff_eq!(a.sample.speed, b.sample.speed, epsilon = 1e-9);
    }

    #[test]
    fn test_frame_rate_independence() {
        let t0 = Instant::now();
        let mut coarse = PlaybackEngine::new(trace(), None).unwrap();
        let mut fine = PlaybackEngine::new(trace(), None).unwrap();
        coarse.play(t0);
        fine.play(t0);

        for frame in 1..=120 {
            fine.tick(t0 + secs(frame as f64 / 60.0));
        }
        let a = coarse.tick(t0 + secs(2.0));
        let b = fine.snapshot();
        assert_abs_diff_eq!(a.current_time, b.current_time, epsilon = 1e-9);
    }

    #[test]
    fn test_pause_freezes_and_resume_rebases() {
        let t0 = Instant::now();
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        engine.play(t0);
        engine.tick(t0 + secs(2.0));
        engine.pause();

        // Time passes while paused
        let snap = engine.tick(t0 + secs(10.0));
        assert!(!snap.playing);
        assert_abs_diff_eq!(snap.current_time, 2.0, epsilon = 1e-9);

        engine.play(t0 + secs(10.0));
        let snap = engine.tick(t0 + secs(11.0));
        assert_abs_diff_eq!(snap.current_time, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stop_then_play_does_not_jump() {
        let t0 = Instant::now();
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        engine.play(t0);
        engine.tick(t0 + secs(1.0));
        engine.stop();
        engine.play(t0 + secs(100.0));
        let snap = engine.tick(t0 + secs(100.5));
        assert_abs_diff_eq!(snap.current_time, 1.5, epsilon = 1e-9);
    }

    #[test]
    fn test_seek_while_playing_keeps_playing() {
        let t0 = Instant::now();
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        engine.play(t0);
        engine.seek(20.0, t0 + secs(5.0));
        assert!(engine.is_playing());
        let snap = engine.tick(t0 + secs(6.0));
        assert_abs_diff_eq!(snap.current_time, 21.0, epsilon = 1e-9);
    }

    #[test]
    fn test_seek_clamps() {
        let t0 = Instant::now();
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        engine.seek(-4.0, t0);
        assert_eq!(engine.current_time(), 0.0);
        engine.seek(1e9, t0);
        assert_eq!(engine.current_time(), 30.0);
        assert_eq!(engine.snapshot().segment_index, 2);
        assert_abs_diff_eq!(engine.snapshot().progress, 1.0);
    }

    #[test]
    fn test_stops_at_end_without_looping() {
        let t0 = Instant::now();
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        engine.seek(29.0, t0);
        engine.play(t0);
        let snap = engine.tick(t0 + secs(5.0));
        assert_eq!(snap.current_time, 30.0);
        assert!(!snap.playing);
        let snap = engine.tick(t0 + secs(50.0));
        assert_eq!(snap.current_time, 30.0);
    }

    #[test]
    fn test_play_at_end_restarts() {
        let t0 = Instant::now();
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        engine.seek(30.0, t0);
        engine.play(t0);
        let snap = engine.tick(t0 + secs(1.0));
        assert_abs_diff_eq!(snap.current_time, 1.0, epsilon = 1e-9);

        let config = PlaybackConfig { restart_at_end: false, ..Default::default() };
        let mut engine = PlaybackEngine::with_config(trace(), None, config).unwrap();
        engine.seek(30.0, t0);
        engine.play(t0);
        assert!(!engine.tick(t0 + secs(1.0)).playing);
    }

    #[test]
    fn test_speed_change_mid_play() {
        let t0 = Instant::now();
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        engine.play(t0);
        engine.set_speed(4.0, t0 + secs(2.0)).unwrap();
        let snap = engine.tick(t0 + secs(3.0));
        // 2s at 1x, then 1s at 4x
        assert_abs_diff_eq!(snap.current_time, 6.0, epsilon = 1e-9);
        assert_eq!(snap.speed, 4.0);
    }

    #[test]
    fn test_rejects_invalid_speed() {
        let mut engine = PlaybackEngine::new(trace(), None).unwrap();
        let now = Instant::now();
        assert!(engine.set_speed(0.0, now).is_err());
        assert!(engine.set_speed(-1.0, now).is_err());
        assert!(engine.set_speed(f64::NAN, now).is_err());
        assert_eq!(engine.speed(), 1.0);
    }

    #[test]
    fn test_snapshot_carries_geo_position() {
        let geo = Arc::new(GeoTrace {
            points: vec![
                GeoPoint::new(10.0, 40.0),
                GeoPoint::new(11.0, 40.0),
                GeoPoint::new(11.0, 41.0),
                GeoPoint::new(10.0, 41.0),
            ],
            method: crate::MappingMethod::Registered,
        });
        let mut engine = PlaybackEngine::new(trace(), Some(geo)).unwrap();
        engine.seek(15.0, Instant::now());
        let pos = engine.snapshot().sample.position.unwrap();
        assert_abs_diff_eq!(pos.lon, 11.0);
        assert_abs_diff_eq!(pos.lat, 40.5);
    }
}
