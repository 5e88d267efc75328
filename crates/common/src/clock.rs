//! Clock and timing utilities for the capture loop.
//!
//! Every recording session is anchored to a monotonic clock epoch taken
//! when capture starts. This module provides:
//! - The session clock (monotonic elapsed time plus wall-clock start)
//! - The drop-based frame pacer used by the capture loop
//! - Parsing of user-entered recording durations

use std::str::FromStr;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{ReelcapError, ReelcapResult};

/// A recording clock that provides monotonic timestamps relative to
/// a fixed epoch (the moment recording started).
#[derive(Debug, Clone)]
pub struct RecordingClock {
    /// The instant recording started.
    epoch: Instant,

    /// Wall-clock time at epoch (local time).
    epoch_wall: chrono::DateTime<chrono::Local>,
}

impl RecordingClock {
    /// Create a new recording clock anchored to now.
    pub fn start() -> Self {
        Self {
            epoch: Instant::now(),
            epoch_wall: chrono::Local::now(),
        }
    }

    /// Time elapsed since recording start.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }

    /// Wall-clock time at recording start.
    pub fn started_at(&self) -> chrono::DateTime<chrono::Local> {
        self.epoch_wall
    }
}

/// Drop-based frame scheduler.
///
/// Tracks `next_frame_time` as an offset from the session epoch. After each
/// accepted frame the deadline moves forward by one interval; if the loop has
/// fallen behind, missed ticks are skipped and the deadline restarts one
/// interval after `now`. Missed ticks are never queued.
#[derive(Debug, Clone)]
pub struct FramePacer {
    interval: Duration,
    next_frame: Duration,
    skipped_resets: u64,
}

impl FramePacer {
    /// Create a pacer targeting the given frame rate. The first frame is due
    /// immediately.
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_nanos(1_000_000_000 / u64::from(fps.max(1))),
            next_frame: Duration::ZERO,
            skipped_resets: 0,
        }
    }

    /// Whether the next frame is due at `now` (offset from the epoch).
    pub fn is_due(&self, now: Duration) -> bool {
        now >= self.next_frame
    }

    /// Move the deadline past the frame just handled at `now`.
    ///
    /// Returns `true` when the schedule had to be reset because the loop
    /// fell more than one interval behind.
    pub fn advance(&mut self, now: Duration) -> bool {
        self.next_frame += self.interval;
        if self.next_frame < now {
            self.next_frame = now + self.interval;
            self.skipped_resets += 1;
            return true;
        }
        false
    }

    /// How long to sleep at `now` before the next frame is due.
    pub fn wait_time(&self, now: Duration) -> Duration {
        self.next_frame.saturating_sub(now)
    }

    /// Next frame deadline as an offset from the epoch.
    pub fn next_frame(&self) -> Duration {
        self.next_frame
    }

    /// Target interval between frames.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of times the schedule was reset after falling behind.
    pub fn skipped_resets(&self) -> u64 {
        self.skipped_resets
    }
}

/// Unit attached to a user-entered recording duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DurationUnit {
    #[default]
    Seconds,
    Minutes,
    Hours,
}

impl DurationUnit {
    /// Seconds per unit.
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Seconds => 1.0,
            Self::Minutes => 60.0,
            Self::Hours => 3600.0,
        }
    }
}

impl FromStr for DurationUnit {
    type Err = ReelcapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "s" | "sec" | "second" | "seconds" => Ok(Self::Seconds),
            "m" | "min" | "minute" | "minutes" => Ok(Self::Minutes),
            "h" | "hour" | "hours" => Ok(Self::Hours),
            other => Err(ReelcapError::invalid_duration(format!(
                "unknown unit {other:?} (expected seconds, minutes or hours)"
            ))),
        }
    }
}

/// Parse a requested recording duration (`value` × unit multiplier).
///
/// Non-numeric, non-finite, and non-positive values are rejected.
pub fn parse_recording_duration(value: &str, unit: &str) -> ReelcapResult<Duration> {
    let unit: DurationUnit = unit.parse()?;
    let amount: f64 = value
        .trim()
        .parse()
        .map_err(|_| ReelcapError::invalid_duration(format!("{value:?} is not a number")))?;

    let secs = amount * unit.multiplier();
    if !secs.is_finite() || secs <= 0.0 {
        return Err(ReelcapError::invalid_duration(format!(
            "duration must be positive, got {value} {unit:?}"
        )));
    }

    Duration::try_from_secs_f64(secs)
        .map_err(|e| ReelcapError::invalid_duration(format!("{value} {unit:?}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_clock_elapsed() {
        let clock = RecordingClock::start();
        // Should be very small but non-negative
        assert!(clock.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_pacer_first_frame_due_immediately() {
        let pacer = FramePacer::new(30);
        assert!(pacer.is_due(Duration::ZERO));
        assert_eq!(pacer.interval(), Duration::from_nanos(33_333_333));
    }

    #[test]
    fn test_pacer_steady_state_advances_by_interval() {
        let mut pacer = FramePacer::new(10);
        assert!(!pacer.advance(Duration::ZERO));
        assert_eq!(pacer.next_frame(), Duration::from_millis(100));
        assert!(!pacer.is_due(Duration::from_millis(50)));
        assert_eq!(
            pacer.wait_time(Duration::from_millis(40)),
            Duration::from_millis(60)
        );
    }

    #[test]
    fn test_pacer_skips_instead_of_bursting() {
        let mut pacer = FramePacer::new(10);
        pacer.advance(Duration::ZERO);
        // A slow frame: 350ms passed although the next tick was due at 100ms.
        let now = Duration::from_millis(350);
        assert!(pacer.is_due(now));
        assert!(pacer.advance(now));
        assert_eq!(pacer.next_frame(), Duration::from_millis(450));
        assert_eq!(pacer.skipped_resets(), 1);
    }

    #[test]
    fn test_zero_fps_is_clamped() {
        let pacer = FramePacer::new(0);
        assert_eq!(pacer.interval(), Duration::from_secs(1));
    }

    #[test]
    fn test_duration_units() {
        assert_eq!(
            parse_recording_duration("90", "seconds").unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            parse_recording_duration("1.5", "Minutes").unwrap(),
            Duration::from_secs(90)
        );
        assert_eq!(
            parse_recording_duration("2", "h").unwrap(),
            Duration::from_secs(7200)
        );
    }

    #[test]
    fn test_duration_rejects_bad_input() {
        for (value, unit) in [
            ("abc", "seconds"),
            ("", "seconds"),
            ("0", "seconds"),
            ("-3", "minutes"),
            ("NaN", "seconds"),
            ("inf", "hours"),
            ("10", "fortnights"),
        ] {
            let err = parse_recording_duration(value, unit).unwrap_err();
            assert!(
                matches!(err, ReelcapError::InvalidDuration { .. }),
                "{value} {unit} should be rejected, got {err}"
            );
        }
    }

    proptest! {
        #[test]
        fn pacer_never_falls_more_than_one_interval_behind(
            fps in 1u32..120,
            costs_ms in proptest::collection::vec(0u64..200, 1..200),
        ) {
            let mut pacer = FramePacer::new(fps);
            let mut now = Duration::ZERO;
            for cost in costs_ms {
                now += pacer.wait_time(now);
                prop_assert!(pacer.is_due(now));
                now += Duration::from_millis(cost);
                pacer.advance(now);
                prop_assert!(pacer.next_frame() >= now);
                prop_assert!(pacer.next_frame() <= now + pacer.interval());
            }
        }
    }
}
