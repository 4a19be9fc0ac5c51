//! Streaming line-plot engine.
//!
//! Samples arrive as labeled [`DataFrame`]s, time series map them to vertices
//! and every vertex lands in a per-series [`Geometry`]:
//!
//! ```text
//!   source frame ──▶ Plot::ingest ──▶ TimeSeries::update_data ──▶ StagingCache
//!                                                                    │ flush on draw
//!   per-frame loop ──▶ Plot::draw ──▶ Geometry::draw ──▶ RingBuffer ─┘
//!                                         │
//!                                         └─▶ LineTarget (host recorder or wgpu)
//! ```
//!
//! The ring has a fixed capacity chosen when it is first flushed. Once full,
//! new vertices overwrite the oldest ones and the draw is split into a tail
//! span followed by a head span so the strip stays continuous.

pub mod axis;
pub mod clock;
pub mod drawable;
pub mod frame;
pub mod geometry;
pub mod host;
pub mod options;
pub mod plot;
pub mod program;
pub mod ring;
pub mod series;
pub mod staging;
pub mod stats;

#[cfg(feature = "gpu")]
pub mod gpu;

/// Coordinates stored per vertex (x, y, z).
pub const COORDS_PER_VERTEX: usize = 3;

pub use axis::AxisOptions;
pub use clock::{IngestClock, ManualClock, SystemClock};
pub use drawable::{
    Capabilities, ClipRect, Component, DrawTree, DrawTreeError, Drawable, NodeId, Resizable,
    Scrollable, Viewport,
};
pub use frame::{DataFrame, FrameError, TIME_FIELD};
pub use geometry::{Geometry, GeometryOptions};
pub use host::HostTarget;
pub use options::OptionSet;
pub use plot::{Plot, PlotError};
pub use program::{LineTarget, RenderProgram, TargetError};
pub use ring::{DrawRange, DrawSpan, RingBuffer, VertexStore, WriteOutcome};
pub use series::{Series, SeriesAxes, SourceBinding, TimeSeries, TimeSeriesOptions};
pub use staging::StagingCache;
pub use stats::FrameStats;
