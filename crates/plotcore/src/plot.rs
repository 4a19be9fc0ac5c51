//! A plot body: named time series drawn against named axes inside one
//! viewport, fed by labeled frames from named sources.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::axis::AxisOptions;
use crate::drawable::{
    Capabilities, ClipRect, Component, Drawable, Resizable, Scrollable, Viewport,
};
use crate::frame::{DataFrame, FrameError};
use crate::program::{LineTarget, TargetError};
use crate::series::{TimeSeries, TimeSeriesOptions};

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("series '{series}' could not ingest frame from '{source_name}': {error}")]
    Frame {
        series: String,
        source_name: String,
        #[source]
        error: FrameError,
    },
    #[error("series '{series}' references unknown axis '{axis}'")]
    UnknownAxis { series: String, axis: String },
    #[error(transparent)]
    Target(#[from] TargetError),
}

struct NamedSeries<T: LineTarget> {
    name: String,
    series: TimeSeries<T>,
}

pub struct Plot<T: LineTarget> {
    name: String,
    series: Vec<NamedSeries<T>>,
    by_source: BTreeMap<String, Vec<usize>>,
    axes: BTreeMap<String, AxisOptions>,
    frame: DataFrame,
    viewport: Viewport,
    clip: Option<ClipRect>,
}

impl<T: LineTarget> Plot<T> {
    pub fn new(name: impl Into<String>, viewport: Viewport) -> Self {
        Self {
            name: name.into(),
            series: Vec::new(),
            by_source: BTreeMap::new(),
            axes: BTreeMap::new(),
            frame: DataFrame::new(),
            viewport,
            clip: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Replaces every series. Existing geometry is dropped; known axes are
    /// applied to the new series. On error the previous series are kept.
    pub fn set_series(
        &mut self,
        series: impl IntoIterator<Item = (String, TimeSeriesOptions)>,
    ) -> Result<(), PlotError> {
        let mut replacement: Vec<NamedSeries<T>> = series
            .into_iter()
            .map(|(name, options)| NamedSeries {
                name,
                series: TimeSeries::new(options),
            })
            .collect();
        if !self.axes.is_empty() {
            let windows = resolve_axes(&replacement, &self.axes)?;
            apply_windows(&mut replacement, windows);
        }

        self.by_source.clear();
        for (index, named) in replacement.iter().enumerate() {
            self.by_source
                .entry(named.series.source_name().to_string())
                .or_default()
                .push(index);
        }
        self.series = replacement;
        tracing::debug!(plot = %self.name, series = self.series.len(), "series replaced");
        Ok(())
    }

    /// Replaces the axis table and re-derives every series window. A table
    /// missing an axis some series needs is rejected without changing
    /// anything.
    pub fn set_axes(&mut self, axes: BTreeMap<String, AxisOptions>) -> Result<(), PlotError> {
        let windows = resolve_axes(&self.series, &axes)?;
        self.axes = axes;
        apply_windows(&mut self.series, windows);
        Ok(())
    }

    /// Records the latest frame from `source` in the collated frame and
    /// updates every series reading from it.
    pub fn ingest(
        &mut self,
        source: &str,
        payload: Value,
        ingest_time: f64,
    ) -> Result<(), PlotError> {
        self.frame.set_time(ingest_time);
        self.frame.insert_source(source, payload);

        let Some(indices) = self.by_source.get(source) else {
            tracing::trace!(plot = %self.name, source, "no series bound to source");
            return Ok(());
        };
        for &index in indices {
            let Some(named) = self.series.get_mut(index) else {
                continue;
            };
            named
                .series
                .update_data(&self.frame)
                .map_err(|error| PlotError::Frame {
                    series: named.name.clone(),
                    source_name: source.to_string(),
                    error,
                })?;
        }
        Ok(())
    }

    pub fn series(&self, name: &str) -> Option<&TimeSeries<T>> {
        self.series
            .iter()
            .find(|named| named.name == name)
            .map(|named| &named.series)
    }

    pub fn series_mut(&mut self, name: &str) -> Option<&mut TimeSeries<T>> {
        self.series
            .iter_mut()
            .find(|named| named.name == name)
            .map(|named| &mut named.series)
    }

    pub fn series_names(&self) -> impl Iterator<Item = &str> {
        self.series.iter().map(|named| named.name.as_str())
    }

    pub fn axes(&self) -> &BTreeMap<String, AxisOptions> {
        &self.axes
    }

    /// The collated frame: latest payload per source plus the ingest time.
    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn clip(&self) -> Option<ClipRect> {
        self.clip
    }
}

/// `(dependent, independent)` axes of every series, in series order.
fn resolve_axes<T: LineTarget>(
    series: &[NamedSeries<T>],
    axes: &BTreeMap<String, AxisOptions>,
) -> Result<Vec<(AxisOptions, AxisOptions)>, PlotError> {
    series
        .iter()
        .map(|named| {
            let binding = &named.series.options().axes;
            let lookup = |axis: &str| {
                axes.get(axis).copied().ok_or_else(|| PlotError::UnknownAxis {
                    series: named.name.clone(),
                    axis: axis.to_string(),
                })
            };
            Ok((lookup(&binding.dependent)?, lookup(&binding.independent)?))
        })
        .collect()
}

fn apply_windows<T: LineTarget>(
    series: &mut [NamedSeries<T>],
    windows: Vec<(AxisOptions, AxisOptions)>,
) {
    for (named, (dependent, independent)) in series.iter_mut().zip(windows) {
        named.series.set_axes(&dependent, &independent);
    }
}

impl<T: LineTarget> Drawable<T> for Plot<T> {
    fn draw(&mut self, target: &mut T) -> Result<(), PlotError> {
        let clipped_away = self
            .clip
            .is_some_and(|clip| clip.width == 0 || clip.height == 0);
        if self.viewport.is_empty() || clipped_away {
            return Ok(());
        }
        target.set_viewport(self.viewport, self.clip);
        for named in &mut self.series {
            named.series.draw(target)?;
        }
        Ok(())
    }
}

impl<T: LineTarget> Resizable for Plot<T> {
    fn resize(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }
}

impl<T: LineTarget> Scrollable for Plot<T> {
    fn scroll(&mut self, clip: Option<ClipRect>) {
        self.clip = clip;
    }
}

impl<T: LineTarget> Component for Plot<T> {
    fn capabilities(&self) -> Capabilities {
        Capabilities::ALL
    }
}
