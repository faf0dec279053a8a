use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FrameStatsSnapshot {
    pub fps: f32,
    pub frame_time_ms: f32,
    pub worst_frame_time_ms: f32,
    pub rollbacks: u32,
}

/// Collects per-frame timings and collision rollbacks and emits a snapshot
/// once per interval for the `frame_stats` log line.
#[derive(Debug)]
pub(crate) struct FrameStatsAccumulator {
    interval_start: Instant,
    interval: Duration,
    frames: u32,
    rollbacks: u32,
    frame_time_sum: Duration,
    worst_frame_time: Duration,
}

impl FrameStatsAccumulator {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval_start: Instant::now(),
            interval,
            frames: 0,
            rollbacks: 0,
            frame_time_sum: Duration::ZERO,
            worst_frame_time: Duration::ZERO,
        }
    }

    pub(crate) fn record_frame(&mut self, frame_dt: Duration, rollbacks: u32) {
        self.frames = self.frames.saturating_add(1);
        self.rollbacks = self.rollbacks.saturating_add(rollbacks);
        self.frame_time_sum = self.frame_time_sum.saturating_add(frame_dt);
        self.worst_frame_time = self.worst_frame_time.max(frame_dt);
    }

    pub(crate) fn maybe_snapshot(&mut self, now: Instant) -> Option<FrameStatsSnapshot> {
        let elapsed = now.saturating_duration_since(self.interval_start);
        if elapsed < self.interval {
            return None;
        }

        let elapsed_seconds = elapsed.as_secs_f32().max(f32::EPSILON);
        let frame_time_ms = if self.frames == 0 {
            0.0
        } else {
            (self.frame_time_sum.as_secs_f32() / self.frames as f32) * 1000.0
        };

        let snapshot = FrameStatsSnapshot {
            fps: self.frames as f32 / elapsed_seconds,
            frame_time_ms,
            worst_frame_time_ms: self.worst_frame_time.as_secs_f32() * 1000.0,
            rollbacks: self.rollbacks,
        };

        self.interval_start = now;
        self.frames = 0;
        self.rollbacks = 0;
        self.frame_time_sum = Duration::ZERO;
        self.worst_frame_time = Duration::ZERO;

        Some(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_computes_expected_values() {
        let mut stats = FrameStatsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();

        stats.record_frame(Duration::from_millis(10), 0);
        stats.record_frame(Duration::from_millis(30), 1);
        stats.record_frame(Duration::from_millis(20), 2);

        let snapshot = stats
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("snapshot should be emitted");

        assert!((snapshot.fps - 3.0).abs() < 0.05);
        assert!((snapshot.frame_time_ms - 20.0).abs() < 0.001);
        assert!((snapshot.worst_frame_time_ms - 30.0).abs() < 0.001);
        assert_eq!(snapshot.rollbacks, 3);
    }

    #[test]
    fn snapshot_not_emitted_before_interval() {
        let mut stats = FrameStatsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();
        stats.record_frame(Duration::from_millis(16), 0);

        assert!(stats
            .maybe_snapshot(base + Duration::from_millis(500))
            .is_none());
    }

    #[test]
    fn snapshot_resets_counters_for_next_interval() {
        let mut stats = FrameStatsAccumulator::new(Duration::from_secs(1));
        let base = Instant::now();
        stats.record_frame(Duration::from_millis(16), 4);
        stats
            .maybe_snapshot(base + Duration::from_secs(1))
            .expect("first snapshot");

        let second = stats
            .maybe_snapshot(base + Duration::from_secs(2))
            .expect("second snapshot");
        assert_eq!(second.rollbacks, 0);
        assert_eq!(second.frame_time_ms, 0.0);
        assert_eq!(second.fps, 0.0);
    }
}
