use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::program::{LineTarget, RenderProgram, TargetError};
use crate::ring::{DrawRange, RingBuffer, VertexStore, WriteOutcome};
use crate::staging::StagingCache;
use crate::COORDS_PER_VERTEX;

/// Construction-time settings for a [`Geometry`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryOptions {
    /// Ring capacity in vertices. The ring may end up larger if the first
    /// flush carries more vertices than this.
    pub initial_capacity: usize,
    /// Lower-left corner of the visible coordinate window.
    pub origin: [f32; 2],
    /// Extent of the visible coordinate window; may be negative to mirror.
    pub size: [f32; 2],
}

impl Default for GeometryOptions {
    fn default() -> Self {
        Self {
            initial_capacity: 512 / COORDS_PER_VERTEX,
            origin: [0.0, 0.0],
            size: [1.0, 1.0],
        }
    }
}

/// Vertex data for one plotted line: staged on the host, flushed into a
/// lazily allocated ring and drawn as a line strip.
#[derive(Debug)]
pub struct Geometry<S> {
    staging: StagingCache,
    ring: Option<RingBuffer<S>>,
    initial_capacity_floats: usize,
    dirty: bool,
    model_view: Mat4,
    projection: Mat4,
}

impl<S: VertexStore> Geometry<S> {
    pub fn new(options: &GeometryOptions) -> Self {
        let mut geometry = Self {
            staging: StagingCache::new(),
            ring: None,
            initial_capacity_floats: options.initial_capacity.max(1) * COORDS_PER_VERTEX,
            dirty: true,
            model_view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        };
        geometry.set_camera(options.origin, options.size);
        geometry
    }

    /// Stages packed vertices for the next flush.
    pub fn add_vertices(&mut self, vertices: &[[f32; COORDS_PER_VERTEX]]) {
        self.staging.append(vertices);
        self.dirty = true;
    }

    pub fn push_vertex(&mut self, vertex: [f32; COORDS_PER_VERTEX]) {
        self.add_vertices(std::slice::from_ref(&vertex));
    }

    /// Maps `origin .. origin + size` onto clip space.
    pub fn set_camera(&mut self, origin: [f32; 2], size: [f32; 2]) {
        self.projection = Mat4::orthographic_rh(
            origin[0],
            origin[0] + size[0],
            origin[1],
            origin[1] + size[1],
            0.0,
            1.0,
        );
    }

    /// Moves every staged vertex into the ring, allocating it on first use.
    pub fn flush<T>(&mut self, target: &mut T) -> Result<WriteOutcome, TargetError>
    where
        T: LineTarget<Store = S>,
    {
        let ring = match self.ring.take() {
            Some(ring) => self.ring.insert(ring),
            None => {
                let pending = self.staging.len();
                let ring = RingBuffer::allocate(self.initial_capacity_floats, pending, |floats| {
                    target.allocate_store(floats)
                })?;
                tracing::debug!(
                    capacity_floats = ring.capacity_floats(),
                    pending,
                    "allocated geometry ring"
                );
                self.ring.insert(ring)
            }
        };

        let outcome = ring.write(self.staging.drain());
        if outcome.discarded_floats > 0 {
            tracing::warn!(
                discarded_vertices = outcome.discarded_floats / COORDS_PER_VERTEX,
                capacity_vertices = ring.capacity_vertices(),
                "flush exceeded ring capacity; oldest staged vertices dropped"
            );
        }
        self.dirty = false;
        Ok(outcome)
    }

    /// Flushes pending vertices and issues one line-strip draw per span.
    pub fn draw<T>(&mut self, target: &mut T, program: &mut T::Program) -> Result<(), TargetError>
    where
        T: LineTarget<Store = S>,
    {
        if self.dirty {
            self.flush(target)?;
        }

        let Some(ring) = self.ring.as_ref() else {
            return Ok(());
        };
        if ring.vertex_count() == 0 {
            return Ok(());
        }

        program.use_matrices(&self.model_view, &self.projection);
        target.bind_position(program, ring.store());
        for span in ring.draw_range().spans() {
            target.draw_line_strip(span);
        }
        Ok(())
    }

    /// Vertices resident in the ring (staged vertices are not counted).
    pub fn vertex_count(&self) -> usize {
        self.ring.as_ref().map_or(0, RingBuffer::vertex_count)
    }

    pub fn draw_range(&self) -> DrawRange {
        self.ring
            .as_ref()
            .map_or(DrawRange::Empty, RingBuffer::draw_range)
    }

    pub fn ring(&self) -> Option<&RingBuffer<S>> {
        self.ring.as_ref()
    }

    pub fn staged_len(&self) -> usize {
        self.staging.len()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn is_allocated(&self) -> bool {
        self.ring.is_some()
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    pub fn model_view(&self) -> &Mat4 {
        &self.model_view
    }
}
