//! Data series: map labeled frames onto geometry vertices under an axis
//! transform.

use serde::{Deserialize, Serialize};

use crate::axis::AxisOptions;
use crate::frame::{DataFrame, FrameError, TIME_FIELD};
use crate::geometry::{Geometry, GeometryOptions};
use crate::program::{LineTarget, RenderProgram, TargetError};
use crate::COORDS_PER_VERTEX;

/// Ring capacity given to a series when none is configured, in vertices.
pub const DEFAULT_SERIES_CAPACITY: usize = 1_000_000;

/// Line color given to a series when none is configured (opaque black).
pub const DEFAULT_SERIES_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 1.0];

/// A line bound to one geometry, with its own camera window and color.
pub struct Series<T: LineTarget> {
    geometry: Geometry<T::Store>,
    program: Option<T::Program>,
    origin: [f32; 2],
    size: [f32; 2],
    color: [f32; 4],
    visible: bool,
}

impl<T: LineTarget> Series<T> {
    pub fn new(capacity: usize, color: [f32; 4]) -> Self {
        let options = GeometryOptions {
            initial_capacity: capacity,
            origin: [0.0, -1.0],
            size: [2.0, 2.0],
        };
        Self {
            geometry: Geometry::new(&options),
            program: None,
            origin: options.origin,
            size: options.size,
            color,
            visible: true,
        }
    }

    /// Derives the camera window from a `[dependent, independent]` axis pair.
    pub fn set_axes(&mut self, dependent: &AxisOptions, independent: &AxisOptions) {
        let [indep_min, indep_max] = independent.oriented_range();
        let [dep_min, dep_max] = dependent.oriented_range();
        if independent.is_degenerate() || dependent.is_degenerate() {
            tracing::warn!(
                independent = ?independent.range,
                dependent = ?dependent.range,
                "degenerate axis range; projection will collapse"
            );
        }
        self.origin = [indep_min, dep_min];
        self.size = [indep_min - indep_max, dep_max - dep_min];
    }

    pub fn add_vertices(&mut self, vertices: &[[f32; COORDS_PER_VERTEX]]) {
        self.geometry.add_vertices(vertices);
    }

    pub fn draw(&mut self, target: &mut T) -> Result<(), TargetError> {
        if !self.visible {
            return Ok(());
        }
        let program = match self.program.take() {
            Some(program) => self.program.insert(program),
            None => self.program.insert(target.create_program()?),
        };
        self.geometry.set_camera(self.origin, self.size);
        program.set_color(self.color);
        self.geometry.draw(target, program)
    }

    pub fn origin(&self) -> [f32; 2] {
        self.origin
    }

    pub fn size(&self) -> [f32; 2] {
        self.size
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        self.color = color;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    pub fn geometry(&self) -> &Geometry<T::Store> {
        &self.geometry
    }
}

/// Where a time series reads its samples from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBinding {
    pub name: String,
    pub value: String,
    /// Frame field carrying the timestamp; the ingestion clock when unset.
    #[serde(default = "default_time_field")]
    pub time: String,
}

fn default_time_field() -> String {
    TIME_FIELD.to_string()
}

impl SourceBinding {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            time: default_time_field(),
        }
    }
}

/// Names of the plot axes a series is drawn against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesAxes {
    pub independent: String,
    pub dependent: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeriesOptions {
    pub source: SourceBinding,
    pub axes: SeriesAxes,
    #[serde(default)]
    pub vertical: bool,
    #[serde(default = "default_color")]
    pub color: [f32; 4],
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_color() -> [f32; 4] {
    DEFAULT_SERIES_COLOR
}

fn default_capacity() -> usize {
    DEFAULT_SERIES_CAPACITY
}

/// Strip chart of one frame field against elapsed time. The time axis origin
/// follows the newest sample so the trace scrolls.
pub struct TimeSeries<T: LineTarget> {
    series: Series<T>,
    options: TimeSeriesOptions,
    first_timestamp: Option<f64>,
}

impl<T: LineTarget> TimeSeries<T> {
    pub fn new(options: TimeSeriesOptions) -> Self {
        Self {
            series: Series::new(options.capacity, options.color),
            options,
            first_timestamp: None,
        }
    }

    pub fn set_axes(&mut self, dependent: &AxisOptions, independent: &AxisOptions) {
        self.series.set_axes(dependent, independent);
        if self.options.vertical {
            let [width, height] = self.series.size;
            self.series.size = [-width, -height];
        }
    }

    /// Appends the sample carried by `frame`, returning the staged vertex.
    pub fn update_data(&mut self, frame: &DataFrame) -> Result<[f32; 3], FrameError> {
        let binding = &self.options.source;
        let time = frame.number(&binding.time)?;
        let value = frame.nested_number(&binding.name, &binding.value)? as f32;

        let first = *self.first_timestamp.get_or_insert(time);
        let elapsed = (time - first) as f32;

        let (inp, dep, axis) = if self.options.vertical {
            (value, elapsed, 1)
        } else {
            (elapsed, value, 0)
        };

        let size = self.series.size[axis];
        self.series.origin[axis] = if size < 0.0 { elapsed } else { elapsed - size };

        let vertex = [inp, dep, 0.0];
        self.series.add_vertices(&[vertex]);
        Ok(vertex)
    }

    pub fn draw(&mut self, target: &mut T) -> Result<(), TargetError> {
        self.series.draw(target)
    }

    pub fn source_name(&self) -> &str {
        &self.options.source.name
    }

    pub fn options(&self) -> &TimeSeriesOptions {
        &self.options
    }

    pub fn first_timestamp(&self) -> Option<f64> {
        self.first_timestamp
    }

    pub fn series(&self) -> &Series<T> {
        &self.series
    }

    pub fn series_mut(&mut self) -> &mut Series<T> {
        &mut self.series
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostTarget;
    use serde_json::json;

    fn options(vertical: bool) -> TimeSeriesOptions {
        TimeSeriesOptions {
            source: SourceBinding::new("source", "value"),
            axes: SeriesAxes {
                independent: "time".to_string(),
                dependent: "value".to_string(),
            },
            vertical,
            color: [1.0, 0.0, 0.0, 1.0],
            capacity: 16,
        }
    }

    fn frame(value: serde_json::Value) -> DataFrame {
        DataFrame::from_value(value).expect("frame")
    }

    #[test]
    fn horizontal_series_emits_elapsed_time_and_value() {
        let mut series = TimeSeries::<HostTarget>::new(options(false));
        let first = series
            .update_data(&frame(json!({ "$(time)": 10, "source": { "value": 2 } })))
            .expect("first");
        let second = series
            .update_data(&frame(json!({ "$(time)": 12, "source": { "value": 5 } })))
            .expect("second");

        assert_eq!(series.first_timestamp(), Some(10.0));
        assert_eq!(first, [0.0, 2.0, 0.0]);
        assert_eq!(second, [2.0, 5.0, 0.0]);
        assert_eq!(series.series().geometry().staged_len(), 6);
    }

    #[test]
    fn axes_define_origin_and_size() {
        let mut series = Series::<HostTarget>::new(4, DEFAULT_SERIES_COLOR);
        series.set_axes(&AxisOptions::new(0.0, 5.0), &AxisOptions::new(-10.0, 10.0));
        assert_eq!(series.origin(), [-10.0, 0.0]);
        assert_eq!(series.size(), [-20.0, 5.0]);
    }

    #[test]
    fn flipping_matches_swapped_range() {
        let mut flipped = Series::<HostTarget>::new(4, DEFAULT_SERIES_COLOR);
        flipped.set_axes(
            &AxisOptions::new(1.0, 4.0).flipped(),
            &AxisOptions::new(-3.0, 7.0).flipped(),
        );
        let mut swapped = Series::<HostTarget>::new(4, DEFAULT_SERIES_COLOR);
        swapped.set_axes(&AxisOptions::new(4.0, 1.0), &AxisOptions::new(7.0, -3.0));

        assert_eq!(flipped.origin(), swapped.origin());
        assert_eq!(flipped.size(), swapped.size());
    }

    #[test]
    fn time_origin_slides_to_the_newest_sample() {
        let mut series = TimeSeries::<HostTarget>::new(options(false));
        series.set_axes(&AxisOptions::new(0.0, 5.0), &AxisOptions::new(-10.0, 10.0));
        for (time, value) in [(100.0, 1.0), (103.0, 2.0)] {
            series
                .update_data(&frame(json!({ "$(time)": time, "source": { "value": value } })))
                .expect("update");
        }
        // Negative width keeps the newest sample on the window edge.
        assert_eq!(series.series().origin(), [3.0, 0.0]);

        let mut positive = TimeSeries::<HostTarget>::new(options(false));
        positive.set_axes(&AxisOptions::new(0.0, 5.0), &AxisOptions::new(10.0, -10.0));
        assert_eq!(positive.series().size()[0], 20.0);
        positive
            .update_data(&frame(json!({ "$(time)": 0, "source": { "value": 0 } })))
            .expect("update");
        positive
            .update_data(&frame(json!({ "$(time)": 25, "source": { "value": 0 } })))
            .expect("update");
        assert_eq!(positive.series().origin()[0], 5.0);
    }

    #[test]
    fn vertical_series_swaps_roles_and_mirrors_size() {
        let mut series = TimeSeries::<HostTarget>::new(options(true));
        series.set_axes(&AxisOptions::new(0.0, 5.0), &AxisOptions::new(-10.0, 10.0));
        assert_eq!(series.series().size(), [20.0, -5.0]);

        series
            .update_data(&frame(json!({ "$(time)": 1, "source": { "value": 4 } })))
            .expect("first");
        let vertex = series
            .update_data(&frame(json!({ "$(time)": 3, "source": { "value": 7 } })))
            .expect("second");
        assert_eq!(vertex, [7.0, 2.0, 0.0]);
        assert_eq!(series.series().origin()[1], 2.0);
    }

    #[test]
    fn epoch_timestamps_keep_sub_second_precision() {
        let mut series = TimeSeries::<HostTarget>::new(options(false));
        let base = 1_700_000_000.0;
        series
            .update_data(&frame(json!({ "$(time)": base, "source": { "value": 0 } })))
            .expect("first");
        let vertex = series
            .update_data(&frame(json!({ "$(time)": base + 0.25, "source": { "value": 0 } })))
            .expect("second");
        assert_eq!(vertex[0], 0.25);
    }

    #[test]
    fn custom_time_field_is_read_from_the_frame() {
        let mut opts = options(false);
        opts.source.time = "stamp".to_string();
        let mut series = TimeSeries::<HostTarget>::new(opts);
        let err = series
            .update_data(&frame(json!({ "$(time)": 1, "source": { "value": 0 } })))
            .expect_err("missing stamp");
        assert_eq!(err, FrameError::MissingField("stamp".to_string()));
        assert!(series.first_timestamp().is_none());
    }

    #[test]
    fn missing_value_does_not_latch_time_or_stage_vertices() {
        let mut series = TimeSeries::<HostTarget>::new(options(false));
        let err = series
            .update_data(&frame(json!({ "$(time)": 1, "source": {} })))
            .expect_err("missing value");
        assert_eq!(err, FrameError::MissingField("source.value".to_string()));
        assert!(series.first_timestamp().is_none());
        assert_eq!(series.series().geometry().staged_len(), 0);
    }

    #[test]
    fn draw_sets_color_and_camera_through_one_program() {
        let mut target = HostTarget::new();
        let mut series = TimeSeries::<HostTarget>::new(options(false));
        series.set_axes(&AxisOptions::new(0.0, 5.0), &AxisOptions::new(-10.0, 10.0));
        for time in 0..3 {
            series
                .update_data(&frame(json!({ "$(time)": time, "source": { "value": 1 } })))
                .expect("update");
            series.draw(&mut target).expect("draw");
        }
        let calls = target.take_draw_calls();
        assert_eq!(calls.len(), 3);
        assert!(calls.iter().all(|call| call.program == calls[0].program));
        assert_eq!(calls[2].color, [1.0, 0.0, 0.0, 1.0]);
        assert_eq!(calls[2].vertex_count(), 3);
    }

    #[test]
    fn hidden_series_issues_no_draws() {
        let mut target = HostTarget::new();
        let mut series = TimeSeries::<HostTarget>::new(options(false));
        series
            .update_data(&frame(json!({ "$(time)": 0, "source": { "value": 1 } })))
            .expect("update");
        series.series_mut().set_visible(false);
        series.draw(&mut target).expect("draw");
        assert!(target.draw_calls().is_empty());
    }

    #[test]
    fn options_fill_defaults_from_json() {
        let parsed: TimeSeriesOptions = serde_json::from_value(json!({
            "source": { "name": "imu", "value": "x" },
            "axes": { "independent": "t", "dependent": "x" }
        }))
        .expect("options");
        assert_eq!(parsed.source.time, TIME_FIELD);
        assert_eq!(parsed.capacity, DEFAULT_SERIES_CAPACITY);
        assert!(!parsed.vertical);
        assert_eq!(parsed.color, DEFAULT_SERIES_COLOR);
    }
}
