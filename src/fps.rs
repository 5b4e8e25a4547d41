//! Rolling frame-rate statistics for the viewer.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Frames kept in the rolling window
const WINDOW: usize = 60;

pub struct FpsTracker {
    frame_times: VecDeque<Duration>,
    last_frame: Instant,
    last_report: Instant,
    report_interval: Duration,
    min_fps: f32,
    max_fps: f32,
}

impl FpsTracker {
    pub fn new(report_interval: Duration) -> Self {
        let now = Instant::now();
        Self {
            frame_times: VecDeque::with_capacity(WINDOW + 1),
            last_frame: now,
            last_report: now,
            report_interval,
            min_fps: f32::MAX,
            max_fps: 0.0,
        }
    }

    pub fn record_frame(&mut self) {
        self.record_at(Instant::now());
    }

    fn record_at(&mut self, now: Instant) {
        let frame_time = now - self.last_frame;
        self.last_frame = now;

        self.frame_times.push_back(frame_time);
        if self.frame_times.len() > WINDOW {
            self.frame_times.pop_front();
        }

        let current_fps = self.current_fps();
        if current_fps > 0.0 {
            self.min_fps = self.min_fps.min(current_fps);
            self.max_fps = self.max_fps.max(current_fps);
        }

        if now - self.last_report > self.report_interval {
            let (min, avg, max) = self.stats();
            log::info!("FPS - Min: {:.1}, Avg: {:.1}, Max: {:.1}", min, avg, max);
            self.last_report = now;
        }
    }

    pub fn current_fps(&self) -> f32 {
        if self.frame_times.is_empty() {
            return 0.0;
        }

        let total: Duration = self.frame_times.iter().sum();
        let avg_frame_time = total.as_secs_f32() / self.frame_times.len() as f32;

        if avg_frame_time > 0.0 {
            1.0 / avg_frame_time
        } else {
            0.0
        }
    }

    /// (min, rolling average, max)
    pub fn stats(&self) -> (f32, f32, f32) {
        (self.min_fps, self.current_fps(), self.max_fps)
    }
}
