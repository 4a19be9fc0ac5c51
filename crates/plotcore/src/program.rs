use glam::Mat4;

use crate::drawable::{ClipRect, Viewport};
use crate::ring::{DrawSpan, VertexStore};
use crate::COORDS_PER_VERTEX;

/// Byte stride between consecutive vertices in a vertex store.
pub const VERTEX_STRIDE_BYTES: u64 = (COORDS_PER_VERTEX * std::mem::size_of::<f32>()) as u64;

/// Layout of the single vertex-position attribute every line program reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionAttribute {
    pub stride_bytes: u64,
    pub offset_bytes: u64,
    pub components: usize,
}

pub const POSITION_ATTRIBUTE: PositionAttribute = PositionAttribute {
    stride_bytes: VERTEX_STRIDE_BYTES,
    offset_bytes: 0,
    components: COORDS_PER_VERTEX,
};

/// Shading program used to draw one series.
pub trait RenderProgram {
    /// Loads the model-view and projection matrices for the next draw.
    fn use_matrices(&mut self, model_view: &Mat4, projection: &Mat4);
    /// Sets the solid line colour, components in `[0, 1]`.
    fn set_color(&mut self, rgba: [f32; 4]);
}

#[derive(Debug, thiserror::Error)]
pub enum TargetError {
    #[error("vertex store of {requested} bytes exceeds the device limit of {limit} bytes")]
    BufferTooLarge { requested: u64, limit: u64 },
}

/// Rendering surface that geometries allocate from and draw into.
///
/// A target hands out vertex stores and programs that outlive a single
/// frame; the draw calls issued through it belong to the frame currently
/// being recorded.
pub trait LineTarget {
    type Store: VertexStore;
    type Program: RenderProgram;

    /// Creates a zero-initialised store of `capacity_floats` floats.
    fn allocate_store(&mut self, capacity_floats: usize) -> Result<Self::Store, TargetError>;

    fn create_program(&mut self) -> Result<Self::Program, TargetError>;

    /// Restricts subsequent draws to `viewport`, optionally clipped further.
    fn set_viewport(&mut self, viewport: Viewport, clip: Option<ClipRect>);

    /// Binds `store` to the program's position attribute (see
    /// [`POSITION_ATTRIBUTE`]).
    fn bind_position(&mut self, program: &Self::Program, store: &Self::Store);

    /// Draws `span` of the bound store as a connected line strip.
    fn draw_line_strip(&mut self, span: DrawSpan);
}
