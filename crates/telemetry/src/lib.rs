//! Synthetic telemetry sources.
//!
//! A source samples a set of named signals at a fixed rate on a simulated
//! timeline and delivers each sample as a JSON object frame, either returned
//! in bulk from [`SyntheticSource::frames_until`] or pushed to registered
//! handlers by [`SyntheticSource::pump`].

use std::f64::consts::TAU;

use plotconfig::{SignalConfig, SignalShape, SourceConfig, SyntheticSourceConfig};
use rand::prelude::*;
use serde_json::{Map, Value};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TelemetryError {
    #[error("source '{source_name}' has invalid rate {rate_hz} Hz")]
    InvalidRate { source_name: String, rate_hz: f64 },
    #[error("source '{0}' has no signals")]
    NoSignals(String),
}

/// One sample of every signal of a source.
#[derive(Debug, Clone, PartialEq)]
pub struct SampledFrame {
    /// Simulated time of the sample, in seconds.
    pub time: f64,
    pub payload: Value,
}

pub type FrameHandler = Box<dyn FnMut(&str, &SampledFrame)>;

pub struct SyntheticSource {
    name: String,
    period: f64,
    start: f64,
    next_index: u64,
    signals: Vec<(String, SignalConfig)>,
    rng: StdRng,
    handlers: Vec<FrameHandler>,
}

impl SyntheticSource {
    /// Creates a source whose first sample is due at `start`.
    pub fn new(
        name: impl Into<String>,
        config: &SyntheticSourceConfig,
        start: f64,
    ) -> Result<Self, TelemetryError> {
        let name = name.into();
        if !config.rate_hz.is_finite() || config.rate_hz <= 0.0 {
            return Err(TelemetryError::InvalidRate {
                source_name: name,
                rate_hz: config.rate_hz,
            });
        }
        if config.signals.is_empty() {
            return Err(TelemetryError::NoSignals(name));
        }
        Ok(Self {
            name,
            period: config.rate_hz.recip(),
            start,
            next_index: 0,
            signals: config
                .signals
                .iter()
                .map(|(field, signal)| (field.clone(), signal.clone()))
                .collect(),
            rng: StdRng::seed_from_u64(config.seed),
            handlers: Vec::new(),
        })
    }

    pub fn from_config(
        name: impl Into<String>,
        config: &SourceConfig,
        start: f64,
    ) -> Result<Self, TelemetryError> {
        match config {
            SourceConfig::Synthetic(synthetic) => Self::new(name, synthetic, start),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time the next sample is due.
    pub fn next_due(&self) -> f64 {
        self.start + self.next_index as f64 * self.period
    }

    /// Samples every frame due at or before `now`, oldest first.
    pub fn frames_until(&mut self, now: f64) -> Vec<SampledFrame> {
        let mut frames = Vec::new();
        while self.next_due() <= now {
            let time = self.next_due();
            let payload = self.sample(time - self.start);
            frames.push(SampledFrame { time, payload });
            self.next_index += 1;
        }
        frames
    }

    /// Registers a callback receiving `(source name, frame)` for every frame
    /// produced by [`SyntheticSource::pump`].
    pub fn add_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&str, &SampledFrame) + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    /// Delivers every frame due at or before `now` to the registered
    /// handlers. Returns the number of frames produced.
    pub fn pump(&mut self, now: f64) -> usize {
        let frames = self.frames_until(now);
        for frame in &frames {
            for handler in &mut self.handlers {
                handler(&self.name, frame);
            }
        }
        if frames.len() > 1 {
            tracing::trace!(source = %self.name, frames = frames.len(), "caught up on samples");
        }
        frames.len()
    }

    fn sample(&mut self, elapsed: f64) -> Value {
        let mut payload = Map::new();
        for (field, signal) in &self.signals {
            let value = evaluate(signal, elapsed, &mut self.rng);
            payload.insert(field.clone(), Value::from(value));
        }
        Value::Object(payload)
    }
}

/// Value of `signal` at `elapsed` seconds, including its jitter.
pub fn evaluate(signal: &SignalConfig, elapsed: f64, rng: &mut impl Rng) -> f64 {
    let cycles = signal.frequency_hz * elapsed + signal.phase;
    let position = cycles.rem_euclid(1.0);
    let unit = match signal.shape {
        SignalShape::Sine => (TAU * cycles).sin(),
        SignalShape::Square => {
            if position < 0.5 {
                1.0
            } else {
                -1.0
            }
        }
        SignalShape::Ramp => 2.0 * position - 1.0,
        SignalShape::Noise => rng.gen_range(-1.0..=1.0),
    };
    let jitter = if signal.noise > 0.0 {
        rng.gen_range(-signal.noise..=signal.noise)
    } else {
        0.0
    };
    signal.amplitude * unit + signal.offset + jitter
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::BTreeMap;
    use std::rc::Rc;

    fn signal(shape: SignalShape) -> SignalConfig {
        SignalConfig {
            shape,
            amplitude: 2.0,
            frequency_hz: 1.0,
            offset: 0.5,
            phase: 0.0,
            noise: 0.0,
        }
    }

    fn config(rate_hz: f64) -> SyntheticSourceConfig {
        SyntheticSourceConfig {
            rate_hz,
            seed: 42,
            signals: BTreeMap::from([
                ("ramp".to_string(), signal(SignalShape::Ramp)),
                ("noise".to_string(), signal(SignalShape::Noise)),
            ]),
        }
    }

    #[test]
    fn frames_are_emitted_at_the_configured_rate() {
        let mut source = SyntheticSource::new("imu", &config(10.0), 5.0).unwrap();
        assert!(source.frames_until(4.99).is_empty());

        let frames = source.frames_until(5.25);
        assert_eq!(frames.len(), 3);
        for (frame, expected) in frames.iter().zip([5.0, 5.1, 5.2]) {
            assert!((frame.time - expected).abs() < 1e-9);
        }
        assert!((source.next_due() - 5.3).abs() < 1e-9);
        assert!(source.frames_until(5.25).is_empty());
    }

    #[test]
    fn payload_contains_every_signal() {
        let mut source = SyntheticSource::new("imu", &config(4.0), 0.0).unwrap();
        let frames = source.frames_until(0.25);
        let second = frames[1].payload.as_object().unwrap();
        assert_eq!(second.len(), 2);
        // Quarter cycle into the ramp: 2 * (2 * 0.25 - 1) + 0.5
        assert_eq!(second["ramp"].as_f64(), Some(-0.5));
        let noise = second["noise"].as_f64().unwrap();
        assert!((-1.5..=2.5).contains(&noise));
    }

    #[test]
    fn same_seed_reproduces_the_stream() {
        let mut first = SyntheticSource::new("a", &config(50.0), 0.0).unwrap();
        let mut second = SyntheticSource::new("b", &config(50.0), 0.0).unwrap();
        assert_eq!(first.frames_until(1.0), second.frames_until(1.0));
    }

    #[test]
    fn shapes_follow_their_waveforms() {
        let mut rng = StdRng::seed_from_u64(0);
        let sine = evaluate(&signal(SignalShape::Sine), 0.25, &mut rng);
        assert!((sine - 2.5).abs() < 1e-9);
        assert_eq!(evaluate(&signal(SignalShape::Square), 0.25, &mut rng), 2.5);
        assert_eq!(evaluate(&signal(SignalShape::Square), 0.75, &mut rng), -1.5);
        assert_eq!(evaluate(&signal(SignalShape::Ramp), 0.0, &mut rng), -1.5);
    }

    #[test]
    fn jitter_stays_within_the_noise_band() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut noisy = signal(SignalShape::Ramp);
        noisy.noise = 0.1;
        for step in 0..100 {
            let elapsed = step as f64 * 0.01;
            let clean = evaluate(&signal(SignalShape::Ramp), elapsed, &mut rng);
            let value = evaluate(&noisy, elapsed, &mut rng);
            assert!((value - clean).abs() <= 0.1 + 1e-9);
        }
    }

    #[test]
    fn pump_delivers_frames_to_every_handler() {
        let mut source = SyntheticSource::new("imu", &config(2.0), 0.0).unwrap();
        let seen = Rc::new(RefCell::new(Vec::new()));
        for tag in ["first", "second"] {
            let seen = Rc::clone(&seen);
            source.add_handler(move |name, frame| {
                seen.borrow_mut().push(format!("{tag}:{name}:{}", frame.time));
            });
        }
        assert_eq!(source.pump(0.5), 2);
        assert_eq!(
            *seen.borrow(),
            vec!["first:imu:0", "second:imu:0", "first:imu:0.5", "second:imu:0.5"]
        );
    }

    #[test]
    fn invalid_configs_are_rejected() {
        assert_eq!(
            SyntheticSource::new("imu", &config(0.0), 0.0).err(),
            Some(TelemetryError::InvalidRate {
                source_name: "imu".to_string(),
                rate_hz: 0.0
            })
        );
        let mut empty = config(1.0);
        empty.signals.clear();
        assert_eq!(
            SyntheticSource::new("imu", &empty, 0.0).err(),
            Some(TelemetryError::NoSignals("imu".to_string()))
        );
    }
}
