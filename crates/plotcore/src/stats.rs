use std::time::Duration;

/// Rolling frame counter reporting average frames per second over a fixed
/// collection interval.
#[derive(Debug, Clone)]
pub struct FrameStats {
    label: String,
    interval: Duration,
    period_start: f64,
    frames: u64,
    last_fps: Option<f64>,
}

impl FrameStats {
    /// A zero interval disables periodic reporting from [`FrameStats::poll`].
    pub fn new(interval: Duration, label: impl Into<String>, start: f64) -> Self {
        Self {
            label: label.into(),
            interval,
            period_start: start,
            frames: 0,
            last_fps: None,
        }
    }

    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// Average FPS since the current period began; zero when no time has
    /// passed.
    pub fn fps(&mut self, now: f64, reset: bool) -> f64 {
        let elapsed = now - self.period_start;
        let fps = if elapsed > 0.0 {
            self.frames as f64 / elapsed
        } else {
            0.0
        };
        if reset {
            self.reset(now);
        }
        fps
    }

    pub fn reset(&mut self, now: f64) {
        self.period_start = now;
        self.frames = 0;
    }

    /// Closes the period once the interval has elapsed, logging and returning
    /// its average FPS.
    pub fn poll(&mut self, now: f64) -> Option<f64> {
        if self.interval.is_zero() || now - self.period_start < self.interval.as_secs_f64() {
            return None;
        }
        let fps = self.fps(now, true);
        tracing::info!(label = %self.label, fps = %format!("{fps:.2}"), "frame rate");
        self.last_fps = Some(fps);
        Some(fps)
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// FPS reported by the most recent completed period.
    pub fn last_fps(&self) -> Option<f64> {
        self.last_fps
    }
}
