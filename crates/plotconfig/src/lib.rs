use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

/// Pseudo-field naming the ingestion clock as a series' time source.
pub const INGEST_TIME_FIELD: &str = "$(time)";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlassConfig {
    pub version: u32,
    #[serde(default)]
    pub glass: GlassSettings,
    #[serde(default)]
    pub sources: BTreeMap<String, SourceConfig>,
    #[serde(default)]
    pub plots: BTreeMap<String, PlotConfig>,
}

/// Output surface and frame loop settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GlassSettings {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    /// Target frame rate; `0` runs unthrottled.
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    /// Period between FPS reports; zero disables them.
    #[serde(
        default = "default_stats_interval",
        deserialize_with = "deserialize_duration"
    )]
    pub stats_interval: Duration,
}

impl Default for GlassSettings {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            clear_color: default_clear_color(),
            stats_interval: default_stats_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SourceConfig {
    Synthetic(SyntheticSourceConfig),
}

impl SourceConfig {
    pub fn has_field(&self, field: &str) -> bool {
        match self {
            SourceConfig::Synthetic(synthetic) => synthetic.signals.contains_key(field),
        }
    }
}

/// Generated telemetry: every field is a periodic signal sampled at
/// `rate_hz`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SyntheticSourceConfig {
    pub rate_hz: f64,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub signals: BTreeMap<String, SignalConfig>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalShape {
    #[default]
    Sine,
    Square,
    Ramp,
    Noise,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SignalConfig {
    #[serde(default)]
    pub shape: SignalShape,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default = "default_frequency")]
    pub frequency_hz: f64,
    #[serde(default)]
    pub offset: f64,
    /// Phase offset in cycles.
    #[serde(default)]
    pub phase: f64,
    /// Peak amplitude of uniform jitter added to every sample.
    #[serde(default)]
    pub noise: f64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlotConfig {
    /// `[x, y, width, height]` in pixels; the whole surface when omitted.
    #[serde(default)]
    pub viewport: Option<[f32; 4]>,
    #[serde(default)]
    pub axes: BTreeMap<String, AxisConfig>,
    #[serde(default)]
    pub series: BTreeMap<String, SeriesConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct AxisConfig {
    pub range: [f32; 2],
    #[serde(default)]
    pub flip_direction: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum SeriesConfig {
    Time(TimeSeriesConfig),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeSeriesConfig {
    pub source: SourceRef,
    pub axes: AxisRefs,
    #[serde(default)]
    pub vertical: bool,
    #[serde(default)]
    pub color: Option<[f32; 4]>,
    /// Ring capacity in vertices.
    #[serde(default)]
    pub capacity: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SourceRef {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub time: Option<String>,
}

impl SourceRef {
    pub fn time_field(&self) -> &str {
        self.time.as_deref().unwrap_or(INGEST_TIME_FIELD)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AxisRefs {
    pub independent: String,
    pub dependent: String,
}

fn default_width() -> u32 {
    800
}

fn default_height() -> u32 {
    600
}

fn default_fps() -> f32 {
    60.0
}

fn default_clear_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_stats_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_amplitude() -> f64 {
    1.0
}

fn default_frequency() -> f64 {
    1.0
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            u64::try_from(v)
                .map(Duration::from_secs)
                .map_err(|_| E::custom("duration must be non-negative"))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if !v.is_finite() || v.is_sign_negative() {
                return Err(E::custom("duration must be a non-negative number"));
            }
            Ok(Duration::from_secs_f64(v))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid(message.into())
}

fn check_color(context: &str, color: &[f32; 4]) -> Result<(), ConfigError> {
    if color.iter().all(|c| (0.0..=1.0).contains(c)) {
        Ok(())
    } else {
        Err(invalid(format!(
            "{context} color components must lie in [0, 1], got {color:?}"
        )))
    }
}

impl GlassConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: GlassConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let input = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&input)
    }

    pub fn source(&self, name: &str) -> Option<&SourceConfig> {
        self.sources.get(name)
    }

    pub fn plot(&self, name: &str) -> Option<&PlotConfig> {
        self.plots.get(name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        let glass = &self.glass;
        if glass.width == 0 || glass.height == 0 {
            return Err(invalid("glass width and height must be greater than zero"));
        }
        if !glass.fps.is_finite() || glass.fps < 0.0 {
            return Err(invalid("glass.fps must be >= 0"));
        }
        check_color("glass.clear_color", &glass.clear_color)?;

        for (name, source) in &self.sources {
            match source {
                SourceConfig::Synthetic(synthetic) => {
                    if !synthetic.rate_hz.is_finite() || synthetic.rate_hz <= 0.0 {
                        return Err(invalid(format!(
                            "source '{name}' rate_hz must be greater than zero"
                        )));
                    }
                    if synthetic.signals.is_empty() {
                        return Err(invalid(format!(
                            "source '{name}' must define at least one signal"
                        )));
                    }
                    for (field, signal) in &synthetic.signals {
                        if signal.frequency_hz < 0.0 || signal.noise < 0.0 {
                            return Err(invalid(format!(
                                "source '{name}' signal '{field}' frequency_hz and noise must be >= 0"
                            )));
                        }
                    }
                }
            }
        }

        if self.plots.is_empty() {
            return Err(invalid("config must define at least one plot"));
        }

        for (plot_name, plot) in &self.plots {
            if let Some([_, _, width, height]) = plot.viewport {
                if width <= 0.0 || height <= 0.0 {
                    return Err(invalid(format!(
                        "plot '{plot_name}' viewport must have a positive size"
                    )));
                }
            }

            for (series_name, series) in &plot.series {
                let SeriesConfig::Time(series) = series;
                let context = format!("plot '{plot_name}' series '{series_name}'");

                let Some(source) = self.sources.get(&series.source.name) else {
                    return Err(invalid(format!(
                        "{context} references unknown source '{}'",
                        series.source.name
                    )));
                };
                if !source.has_field(&series.source.value) {
                    return Err(invalid(format!(
                        "{context} references unknown field '{}' of source '{}'",
                        series.source.value, series.source.name
                    )));
                }

                for axis in [&series.axes.independent, &series.axes.dependent] {
                    if !plot.axes.contains_key(axis) {
                        return Err(invalid(format!(
                            "{context} references unknown axis '{axis}'"
                        )));
                    }
                }

                if let Some(color) = &series.color {
                    check_color(&context, color)?;
                }
                if series.capacity == Some(0) {
                    return Err(invalid(format!("{context} capacity must be greater than zero")));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
version = 1

[glass]
width = 640
height = 480
fps = 30
clear_color = [0.0, 0.0, 0.0, 1.0]
stats_interval = "2s"

[sources.imu]
type = "synthetic"
rate_hz = 100
seed = 7

[sources.imu.signals.x]
shape = "sine"
amplitude = 2.0
frequency_hz = 0.5

[sources.imu.signals.y]
shape = "square"
noise = 0.1

[plots.main]
viewport = [0, 0, 640, 240]

[plots.main.axes.time]
range = [-10, 10]

[plots.main.axes.accel]
range = [-3, 3]
flip_direction = true

[plots.main.series.x]
type = "time"
source = { name = "imu", value = "x" }
axes = { independent = "time", dependent = "accel" }
color = [1.0, 0.0, 0.0, 1.0]
capacity = 4096
"#;

    #[test]
    fn parses_sample_config() {
        let config = GlassConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.glass.width, 640);
        assert_eq!(config.glass.stats_interval, Duration::from_secs(2));

        let SourceConfig::Synthetic(imu) = config.source("imu").expect("imu");
        assert_eq!(imu.seed, 7);
        assert_eq!(imu.signals["y"].shape, SignalShape::Square);
        assert_eq!(imu.signals["y"].amplitude, 1.0);

        let plot = config.plot("main").expect("plot");
        assert!(plot.axes["accel"].flip_direction);
        let SeriesConfig::Time(series) = &plot.series["x"];
        assert_eq!(series.source.time_field(), INGEST_TIME_FIELD);
        assert_eq!(series.capacity, Some(4096));
    }

    #[test]
    fn glass_defaults_apply_when_section_is_missing() {
        let config = GlassConfig::from_toml_str(
            r#"
version = 1

[plots.empty]
"#,
        )
        .unwrap();
        assert_eq!(config.glass.width, 800);
        assert_eq!(config.glass.clear_color, [1.0, 1.0, 1.0, 1.0]);
        assert_eq!(config.glass.stats_interval, Duration::from_secs(1));
    }

    #[test]
    fn rejects_unknown_source() {
        let config = SAMPLE.replace("name = \"imu\"", "name = \"gps\"");
        let err = GlassConfig::from_toml_str(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("unknown source")));
    }

    #[test]
    fn rejects_unknown_axis() {
        let config = SAMPLE.replace("dependent = \"accel\"", "dependent = \"pressure\"");
        let err = GlassConfig::from_toml_str(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(ref msg) if msg.contains("unknown axis")));
    }

    #[test]
    fn rejects_out_of_range_color_and_zero_rate() {
        let config = SAMPLE.replace("color = [1.0, 0.0, 0.0, 1.0]", "color = [2.0, 0.0, 0.0, 1.0]");
        assert!(GlassConfig::from_toml_str(&config).is_err());

        let config = SAMPLE.replace("rate_hz = 100", "rate_hz = 0");
        assert!(GlassConfig::from_toml_str(&config).is_err());
    }

    #[test]
    fn rejects_wrong_version_and_missing_plots() {
        let err = GlassConfig::from_toml_str("version = 2\n[plots.a]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = GlassConfig::from_toml_str("version = 1\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_malformed_duration() {
        let config = SAMPLE.replace("stats_interval = \"2s\"", "stats_interval = \"soon\"");
        let err = GlassConfig::from_toml_str(&config).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = GlassConfig::from_path(file.path()).unwrap();
        assert!(config.plot("main").is_some());

        let missing = file.path().with_extension("missing");
        let err = GlassConfig::from_path(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
