use std::collections::BTreeMap;

use plotconfig::{AxisConfig, GlassConfig, PlotConfig, SeriesConfig, TimeSeriesConfig};
use plotcore::series::{DEFAULT_SERIES_CAPACITY, DEFAULT_SERIES_COLOR};
use plotcore::{AxisOptions, SeriesAxes, SourceBinding, TimeSeriesOptions, Viewport};

pub fn axis_options(axis: &AxisConfig) -> AxisOptions {
    let options = AxisOptions::new(axis.range[0], axis.range[1]);
    if axis.flip_direction {
        options.flipped()
    } else {
        options
    }
}

pub fn plot_axes(plot: &PlotConfig) -> BTreeMap<String, AxisOptions> {
    plot.axes
        .iter()
        .map(|(name, axis)| (name.clone(), axis_options(axis)))
        .collect()
}

pub fn time_series_options(series: &TimeSeriesConfig) -> TimeSeriesOptions {
    let mut source = SourceBinding::new(&series.source.name, &series.source.value);
    source.time = series.source.time_field().to_string();
    TimeSeriesOptions {
        source,
        axes: SeriesAxes {
            independent: series.axes.independent.clone(),
            dependent: series.axes.dependent.clone(),
        },
        vertical: series.vertical,
        color: series.color.unwrap_or(DEFAULT_SERIES_COLOR),
        capacity: series.capacity.unwrap_or(DEFAULT_SERIES_CAPACITY),
    }
}

pub fn plot_series(plot: &PlotConfig) -> Vec<(String, TimeSeriesOptions)> {
    plot.series
        .iter()
        .map(|(name, series)| match series {
            SeriesConfig::Time(time) => (name.clone(), time_series_options(time)),
        })
        .collect()
}

/// Pixel rectangle of every plot. Plots without an explicit viewport share
/// the surface as full-width bands, top to bottom in name order.
pub fn layout(config: &GlassConfig) -> BTreeMap<String, Viewport> {
    let width = config.glass.width as f32;
    let height = config.glass.height as f32;
    let bands = config
        .plots
        .values()
        .filter(|plot| plot.viewport.is_none())
        .count();
    let band_height = if bands == 0 {
        0.0
    } else {
        height / bands as f32
    };

    let mut next_band = 0;
    let mut viewports = BTreeMap::new();
    for (name, plot) in &config.plots {
        let viewport = match plot.viewport {
            Some([x, y, w, h]) => {
                if x + w > width || y + h > height {
                    tracing::warn!(
                        plot = %name,
                        x, y, width = w, height = h,
                        "viewport extends past the glass; it will be clipped"
                    );
                }
                Viewport::new(x, y, w, h)
            }
            None => {
                let band = Viewport::new(0.0, next_band as f32 * band_height, width, band_height);
                next_band += 1;
                band
            }
        };
        viewports.insert(name.clone(), viewport);
    }
    viewports
}
