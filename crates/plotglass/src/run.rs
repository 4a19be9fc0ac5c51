use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use plotconfig::GlassConfig;
use plotcore::{
    Capabilities, Component, DrawTree, Drawable, FrameStats, HostTarget, IngestClock, LineTarget,
    ManualClock, NodeId, OptionSet, Plot, Resizable, SystemClock, Viewport,
};
use serde_json::Value;
use telemetry::{SampledFrame, SyntheticSource};
use tracing_subscriber::EnvFilter;

use crate::bindings;
use crate::cli::{Backend, Cli};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let mut config = GlassConfig::from_path(&cli.config)
        .with_context(|| format!("failed to load config {}", cli.config.display()))?;
    if let Some((width, height)) = cli.size {
        config.glass.width = width;
        config.glass.height = height;
    }
    tracing::info!(
        config = %cli.config.display(),
        sources = config.sources.len(),
        plots = config.plots.len(),
        backend = ?cli.backend,
        "starting glass"
    );

    match cli.backend {
        Backend::Host => {
            if cli.export.is_some() {
                bail!("--export requires the gpu backend");
            }
            let mut target = HostTarget::new();
            let summary = drive(&config, &cli, &mut target, |target, _| {
                target
                    .take_draw_calls()
                    .iter()
                    .map(|call| call.spans.len())
                    .sum()
            })?;
            summary.log();
            Ok(())
        }
        Backend::Gpu => run_gpu(&config, &cli),
    }
}

#[cfg(feature = "gpu")]
fn run_gpu(config: &GlassConfig, cli: &Cli) -> Result<()> {
    use plotcore::gpu::{GpuContext, GpuTarget};

    let context = GpuContext::new(config.glass.width, config.glass.height)
        .context("failed to initialise headless GPU context")?;
    tracing::info!(adapter = %context.adapter_name, "GPU ready");
    let mut target = GpuTarget::new(context);
    let summary = drive(config, cli, &mut target, |target, clear_color| {
        target.finish_frame(clear_color)
    })?;
    summary.log();

    if let Some(path) = &cli.export {
        target
            .export_png(path)
            .with_context(|| format!("failed to export {}", path.display()))?;
    }
    Ok(())
}

#[cfg(not(feature = "gpu"))]
fn run_gpu(_config: &GlassConfig, _cli: &Cli) -> Result<()> {
    bail!("gpu support is not enabled in this build")
}

enum GlassNode<T: LineTarget> {
    Glass,
    Plot(Plot<T>),
}

impl<T: LineTarget> Component for GlassNode<T> {
    fn capabilities(&self) -> Capabilities {
        match self {
            GlassNode::Glass => Capabilities::NONE,
            GlassNode::Plot(plot) => plot.capabilities(),
        }
    }
}

struct RunSummary {
    frames: u64,
    samples: u64,
    draws: usize,
    elapsed: f64,
}

impl RunSummary {
    fn log(&self) {
        tracing::info!(
            frames = self.frames,
            samples = self.samples,
            draws = self.draws,
            elapsed = %format!("{:.2}s", self.elapsed),
            "run complete"
        );
    }
}

/// Step of the simulated timeline when the frame rate is uncapped.
const SIMULATED_FRAME_PERIOD: f64 = 1.0 / 60.0;

/// Frame timeline: simulated by default, the wall clock with `--realtime`.
struct Pacer {
    realtime: bool,
    manual: ManualClock,
    system: SystemClock,
    period: Rc<Cell<f64>>,
    deadline: Instant,
}

impl Pacer {
    fn new(realtime: bool, period: Rc<Cell<f64>>) -> Self {
        let system = SystemClock::new();
        Self {
            realtime,
            manual: ManualClock::starting_at(system.now()),
            system,
            period,
            deadline: Instant::now(),
        }
    }

    fn clock(&self) -> &dyn IngestClock {
        if self.realtime {
            &self.system
        } else {
            &self.manual
        }
    }

    fn now(&self) -> f64 {
        self.clock().now()
    }

    /// Moves to the next frame and returns its time.
    fn tick(&mut self) -> f64 {
        let period = self.period.get();
        if self.realtime {
            if period > 0.0 {
                self.deadline += Duration::from_secs_f64(period);
                let now = Instant::now();
                if self.deadline > now {
                    std::thread::sleep(self.deadline - now);
                } else {
                    self.deadline = now;
                }
            }
        } else if period > 0.0 {
            self.manual.advance(period);
        } else {
            self.manual.advance(SIMULATED_FRAME_PERIOD);
        }
        self.now()
    }
}

fn frame_period(fps: f64) -> f64 {
    if fps > 0.0 {
        fps.recip()
    } else {
        0.0
    }
}

fn parse_color(value: &Value) -> Option<[f64; 4]> {
    let parts = value.as_array()?;
    if parts.len() != 4 {
        return None;
    }
    let mut color = [0.0; 4];
    for (slot, part) in color.iter_mut().zip(parts) {
        *slot = part.as_f64()?;
    }
    Some(color)
}

/// Registers the glass-level options and seeds them from the config.
fn glass_options(
    config: &GlassConfig,
    clear_color: &Rc<Cell<[f64; 4]>>,
    period: &Rc<Cell<f64>>,
    stats: &Rc<RefCell<FrameStats>>,
) -> OptionSet {
    let mut options = OptionSet::new();

    let color = Rc::clone(clear_color);
    options.on_change("clear_color", move |value| match parse_color(value) {
        Some(parsed) => color.set(parsed),
        None => tracing::warn!(%value, "clear_color expects [r, g, b, a]; ignored"),
    });

    let frame = Rc::clone(period);
    options.on_change("fps", move |value| match value.as_f64() {
        Some(fps) if fps >= 0.0 => frame.set(frame_period(fps)),
        _ => tracing::warn!(%value, "fps expects a non-negative number; ignored"),
    });

    let interval = Rc::clone(stats);
    options.on_change("stats_interval", move |value| {
        match value.as_f64().filter(|secs| secs.is_finite() && *secs >= 0.0) {
            Some(secs) => interval
                .borrow_mut()
                .set_interval(Duration::from_secs_f64(secs)),
            None => tracing::warn!(%value, "stats_interval expects seconds >= 0; ignored"),
        }
    });

    let glass = &config.glass;
    options.set("clear_color", Value::from(glass.clear_color.map(f64::from).to_vec()));
    options.set("fps", Value::from(f64::from(glass.fps)));
    options.set(
        "stats_interval",
        Value::from(glass.stats_interval.as_secs_f64()),
    );
    options
}

fn build_tree<T: LineTarget>(config: &GlassConfig) -> Result<(DrawTree<GlassNode<T>>, NodeId)> {
    let mut tree = DrawTree::new(GlassNode::Glass);
    let root = tree.root();
    let layout = bindings::layout(config);

    let mut viewports = BTreeMap::new();
    for (name, plot_config) in &config.plots {
        let mut plot = Plot::new(name.clone(), Viewport::new(0.0, 0.0, 0.0, 0.0));
        plot.set_axes(bindings::plot_axes(plot_config))
            .with_context(|| format!("plot '{name}' axes"))?;
        plot.set_series(bindings::plot_series(plot_config))
            .with_context(|| format!("plot '{name}' series"))?;
        let id = tree.add(root, GlassNode::Plot(plot))?;
        if let Some(viewport) = layout.get(name) {
            viewports.insert(id, *viewport);
        }
    }

    let resizable = tree.resize_list(root).to_vec();
    for id in resizable {
        if let (Some(GlassNode::Plot(plot)), Some(viewport)) =
            (tree.get_mut(id), viewports.get(&id))
        {
            plot.resize(*viewport);
        }
    }
    Ok((tree, root))
}

fn drive<T, F>(config: &GlassConfig, cli: &Cli, target: &mut T, mut finish: F) -> Result<RunSummary>
where
    T: LineTarget,
    F: FnMut(&mut T, [f64; 4]) -> usize,
{
    let clear_color = Rc::new(Cell::new([1.0; 4]));
    let period = Rc::new(Cell::new(0.0));
    let stats = Rc::new(RefCell::new(FrameStats::new(
        config.glass.stats_interval,
        "glass",
        0.0,
    )));
    let mut options = glass_options(config, &clear_color, &period, &stats);
    let overrides = cli.option_overrides();
    let applied = options.update(&overrides);
    if applied < overrides.len() {
        let unknown: Vec<&str> = overrides
            .keys()
            .filter(|key| !options.is_handled(key))
            .map(String::as_str)
            .collect();
        tracing::warn!(?unknown, "ignoring unknown glass options");
    }
    tracing::debug!(options = ?options.serialize(), "glass options");

    let (mut tree, root) = build_tree::<T>(config)?;
    let plots = tree.draw_list(root).to_vec();

    let mut pacer = Pacer::new(cli.realtime, Rc::clone(&period));
    let start = pacer.now();
    stats.borrow_mut().reset(start);

    let inbox: Rc<RefCell<Vec<(String, SampledFrame)>>> = Rc::default();
    let mut sources = Vec::with_capacity(config.sources.len());
    for (name, source_config) in &config.sources {
        let mut source = SyntheticSource::from_config(name.clone(), source_config, start)
            .with_context(|| format!("failed to start source '{name}'"))?;
        let inbox = Rc::clone(&inbox);
        source.add_handler(move |source_name, frame| {
            inbox
                .borrow_mut()
                .push((source_name.to_string(), frame.clone()));
        });
        sources.push(source);
    }

    let mut summary = RunSummary {
        frames: 0,
        samples: 0,
        draws: 0,
        elapsed: 0.0,
    };
    for _ in 0..cli.frames {
        let now = pacer.tick();
        for source in &mut sources {
            summary.samples += source.pump(now) as u64;
        }

        let delivered = std::mem::take(&mut *inbox.borrow_mut());
        for (source_name, frame) in delivered {
            for id in &plots {
                if let Some(GlassNode::Plot(plot)) = tree.get_mut(*id) {
                    plot.ingest(&source_name, frame.payload.clone(), frame.time)
                        .with_context(|| format!("plot '{}' rejected a frame", plot.name()))?;
                }
            }
        }

        for id in &plots {
            if let Some(GlassNode::Plot(plot)) = tree.get_mut(*id) {
                plot.draw(target)
                    .with_context(|| format!("failed to draw plot '{}'", plot.name()))?;
            }
        }
        summary.draws += finish(target, clear_color.get());
        summary.frames += 1;

        let mut stats = stats.borrow_mut();
        stats.record_frame();
        stats.poll(now);
        summary.elapsed = now - start;
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serde_json::json;

    const CONFIG: &str = r#"
version = 1

[glass]
width = 200
height = 100
fps = 10

[sources.imu]
type = "synthetic"
rate_hz = 20.0

[sources.imu.signals.x]
shape = "ramp"

[plots.main.axes.time]
range = [-1.0, 0.0]

[plots.main.axes.value]
range = [-1.0, 1.0]

[plots.main.series.x]
type = "time"
source = { name = "imu", value = "x" }
axes = { independent = "time", dependent = "value" }
capacity = 8
"#;

    fn cli(args: &[&str]) -> Cli {
        let mut argv = vec!["plotglass", "--config", "glass.toml", "--backend", "host"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn parses_colors() {
        assert_eq!(
            parse_color(&json!([0.0, 0.5, 1, 1])),
            Some([0.0, 0.5, 1.0, 1.0])
        );
        assert_eq!(parse_color(&json!([0.0, 0.5, 1.0])), None);
        assert_eq!(parse_color(&json!("white")), None);
    }

    #[test]
    fn options_follow_config_then_overrides() {
        let config = GlassConfig::from_toml_str(CONFIG).unwrap();
        let clear_color = Rc::new(Cell::new([0.0; 4]));
        let period = Rc::new(Cell::new(0.0));
        let stats = Rc::new(RefCell::new(FrameStats::new(Duration::from_secs(9), "t", 0.0)));
        let mut options = glass_options(&config, &clear_color, &period, &stats);

        assert_eq!(clear_color.get(), [1.0; 4]);
        assert!((period.get() - 0.1).abs() < 1e-9);
        assert_eq!(stats.borrow().interval(), Duration::from_secs(1));

        let overrides = cli(&["--option", "fps=0", "--option", "clear_color=[0,0,0,1]"])
            .option_overrides();
        assert_eq!(options.update(&overrides), 2);
        assert_eq!(period.get(), 0.0);
        assert_eq!(clear_color.get(), [0.0, 0.0, 0.0, 1.0]);

        options.set("stats_interval", json!(-1));
        assert_eq!(stats.borrow().interval(), Duration::from_secs(1));

        // Zero switches frame-rate reports off.
        options.set("stats_interval", json!(0));
        assert!(stats.borrow().interval().is_zero());
        stats.borrow_mut().record_frame();
        assert_eq!(stats.borrow_mut().poll(1_000.0), None);
    }

    #[test]
    fn host_run_feeds_every_plot() {
        let config = GlassConfig::from_toml_str(CONFIG).unwrap();
        let mut target = HostTarget::capturing();
        let mut spans = Vec::new();
        let summary = drive(&config, &cli(&["--frames", "20"]), &mut target, |target, _| {
            let calls = target.take_draw_calls();
            spans.push(calls.iter().map(|call| call.spans.len()).sum::<usize>());
            calls.len()
        })
        .unwrap();

        assert_eq!(summary.frames, 20);
        // Two samples per 0.1 s frame plus the one due at the start time,
        // give or take the sample sitting on the last frame boundary.
        assert!((40..=41).contains(&summary.samples));
        assert!((summary.elapsed - 2.0).abs() < 1e-4);
        assert_eq!(summary.draws, 20);
        // Capacity 8 fills within a few frames, after which draws split.
        assert_eq!(spans.first(), Some(&1));
        assert!(spans.iter().skip(5).any(|&count| count == 2));
    }

    #[test]
    fn tree_sizes_plots_from_layout() {
        let config = GlassConfig::from_toml_str(CONFIG).unwrap();
        let (tree, root) = build_tree::<HostTarget>(&config).unwrap();
        let plots = tree.draw_list(root);
        assert_eq!(plots.len(), 1);
        match tree.get(plots[0]) {
            Some(GlassNode::Plot(plot)) => {
                assert_eq!(plot.name(), "main");
                assert_eq!(plot.viewport(), Viewport::new(0.0, 0.0, 200.0, 100.0));
                assert_eq!(plot.series_names().collect::<Vec<_>>(), vec!["x"]);
            }
            _ => panic!("expected a plot node"),
        }
    }
}
