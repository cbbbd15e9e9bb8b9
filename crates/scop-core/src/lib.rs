// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]

use std::time::{Duration, Instant};

/// Installs the global fmt subscriber. `RUST_LOG` wins over `default_directive`.
pub fn init_tracing(default_directive: &str) {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_directive))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}

/// Monotonic per-tick delta time.
#[derive(Debug)]
pub struct FrameClock {
    last: Instant,
}

impl FrameClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }

    /// Seconds since the previous call (or since construction).
    pub fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f32();
        self.last = now;
        dt
    }

    /// Drops the time spent while paused so the next delta stays small.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FpsStats {
    pub avg: f32,
    pub min: f32,
    pub max: f32,
    pub frames: u32,
}

/// Collects frame times and reports fps statistics once per interval.
#[derive(Debug)]
pub struct FpsCounter {
    interval: Duration,
    elapsed: Duration,
    frames: u32,
    shortest: Duration,
    longest: Duration,
}

impl FpsCounter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            elapsed: Duration::ZERO,
            frames: 0,
            shortest: Duration::MAX,
            longest: Duration::ZERO,
        }
    }

    /// Feeds one frame time; returns stats when the interval is complete.
    pub fn record(&mut self, frame_time: Duration) -> Option<FpsStats> {
        self.elapsed += frame_time;
        self.frames = self.frames.saturating_add(1);
        self.shortest = self.shortest.min(frame_time);
        self.longest = self.longest.max(frame_time);

        if self.elapsed < self.interval {
            return None;
        }

        let rate = |d: Duration| {
            let s = d.as_secs_f32();
            if s > 0.0 {
                1.0 / s
            } else {
                0.0
            }
        };
        let stats = FpsStats {
            avg: self.frames as f32 / self.elapsed.as_secs_f32(),
            min: rate(self.longest),
            max: rate(self.shortest),
            frames: self.frames,
        };
        self.clear();
        Some(stats)
    }

    /// Forgets the partial interval (used when rendering pauses).
    pub fn clear(&mut self) {
        self.elapsed = Duration::ZERO;
        self.frames = 0;
        self.shortest = Duration::MAX;
        self.longest = Duration::ZERO;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fps_counter_waits_for_full_interval() {
        let mut c = FpsCounter::new(Duration::from_secs(1));
        for _ in 0..9 {
            assert!(c.record(Duration::from_millis(100)).is_none());
        }
        let stats = c.record(Duration::from_millis(100)).expect("interval complete");
        assert_eq!(stats.frames, 10);
        assert!((stats.avg - 10.0).abs() < 1e-3);
    }

    #[test]
    fn fps_counter_min_max_follow_frame_times() {
        let mut c = FpsCounter::new(Duration::from_millis(30));
        assert!(c.record(Duration::from_millis(10)).is_none());
        let stats = c.record(Duration::from_millis(20)).expect("interval complete");
        assert!((stats.max - 100.0).abs() < 1e-2);
        assert!((stats.min - 50.0).abs() < 1e-2);

        // counter starts over after reporting
        assert!(c.record(Duration::from_millis(10)).is_none());
    }

    #[test]
    fn frame_clock_is_monotonic() {
        let mut clock = FrameClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert!(a >= 0.0 && b >= 0.0);
    }
}
