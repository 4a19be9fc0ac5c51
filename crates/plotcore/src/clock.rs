use std::time::{SystemTime, UNIX_EPOCH};

/// Where `"$(time)"` values come from.
pub trait IngestClock {
    /// Current time in seconds.
    fn now(&self) -> f64;
}

/// Wall clock reporting seconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl IngestClock for SystemClock {
    fn now(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs_f64())
            .unwrap_or_default()
    }
}

/// Clock that only moves when told to; drives deterministic runs.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ManualClock {
    seconds: f64,
}

impl ManualClock {
    pub fn starting_at(seconds: f64) -> Self {
        Self { seconds }
    }

    pub fn advance(&mut self, seconds: f64) {
        self.seconds += seconds;
    }

    pub fn set(&mut self, seconds: f64) {
        self.seconds = seconds;
    }
}

impl IngestClock for ManualClock {
    fn now(&self) -> f64 {
        self.seconds
    }
}
