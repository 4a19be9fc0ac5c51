//! CPU-side [`LineTarget`] that records draw calls instead of rasterising.
//!
//! Used for dry runs without a GPU adapter and as the inspection surface in
//! tests.

use glam::Mat4;

use crate::drawable::{ClipRect, Viewport};
use crate::program::{LineTarget, RenderProgram, TargetError};
use crate::ring::DrawSpan;
use crate::COORDS_PER_VERTEX;

pub use crate::ring::HostStore;

/// Program state captured by the host target.
#[derive(Debug, Clone, PartialEq)]
pub struct HostProgram {
    id: usize,
    model_view: Mat4,
    projection: Mat4,
    color: [f32; 4],
}

impl HostProgram {
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }
}

impl RenderProgram for HostProgram {
    fn use_matrices(&mut self, model_view: &Mat4, projection: &Mat4) {
        self.model_view = *model_view;
        self.projection = *projection;
    }

    fn set_color(&mut self, rgba: [f32; 4]) {
        self.color = rgba;
    }
}

/// One `bind_position` followed by the spans drawn from that binding.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawCall {
    pub program: usize,
    pub viewport: Option<Viewport>,
    pub clip: Option<ClipRect>,
    pub model_view: Mat4,
    pub projection: Mat4,
    pub color: [f32; 4],
    pub spans: Vec<DrawSpan>,
    snapshot: Option<Vec<f32>>,
}

impl DrawCall {
    /// Total vertices submitted across every span.
    pub fn vertex_count(&self) -> usize {
        self.spans.iter().map(|span| span.vertex_count).sum()
    }

    /// Vertices in submission order; empty unless the target was capturing.
    pub fn vertices(&self) -> Vec<[f32; COORDS_PER_VERTEX]> {
        let Some(data) = self.snapshot.as_deref() else {
            return Vec::new();
        };
        self.spans
            .iter()
            .flat_map(|span| span.first_vertex..span.end())
            .filter_map(|index| {
                let start = index * COORDS_PER_VERTEX;
                data.get(start..start + COORDS_PER_VERTEX)
                    .map(|coords| [coords[0], coords[1], coords[2]])
            })
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct HostTarget {
    capture_vertices: bool,
    next_program: usize,
    viewport: Option<Viewport>,
    clip: Option<ClipRect>,
    calls: Vec<DrawCall>,
    allocated_floats: usize,
}

impl HostTarget {
    pub fn new() -> Self {
        Self::default()
    }

    /// A target that snapshots bound stores so [`DrawCall::vertices`] works.
    pub fn capturing() -> Self {
        Self {
            capture_vertices: true,
            ..Self::default()
        }
    }

    pub fn draw_calls(&self) -> &[DrawCall] {
        &self.calls
    }

    /// Ends the current frame, returning its draw calls.
    pub fn take_draw_calls(&mut self) -> Vec<DrawCall> {
        std::mem::take(&mut self.calls)
    }

    /// Floats handed out across every store allocated so far.
    pub fn allocated_floats(&self) -> usize {
        self.allocated_floats
    }
}

impl LineTarget for HostTarget {
    type Store = HostStore;
    type Program = HostProgram;

    fn allocate_store(&mut self, capacity_floats: usize) -> Result<HostStore, TargetError> {
        self.allocated_floats += capacity_floats;
        Ok(HostStore::zeroed(capacity_floats))
    }

    fn create_program(&mut self) -> Result<HostProgram, TargetError> {
        let id = self.next_program;
        self.next_program += 1;
        Ok(HostProgram {
            id,
            model_view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            color: [0.0, 0.0, 0.0, 1.0],
        })
    }

    fn set_viewport(&mut self, viewport: Viewport, clip: Option<ClipRect>) {
        self.viewport = Some(viewport);
        self.clip = clip;
    }

    fn bind_position(&mut self, program: &HostProgram, store: &HostStore) {
        self.calls.push(DrawCall {
            program: program.id,
            viewport: self.viewport,
            clip: self.clip,
            model_view: program.model_view,
            projection: program.projection,
            color: program.color,
            spans: Vec::new(),
            snapshot: self.capture_vertices.then(|| store.as_slice().to_vec()),
        });
    }

    fn draw_line_strip(&mut self, span: DrawSpan) {
        match self.calls.last_mut() {
            Some(call) => call.spans.push(span),
            None => tracing::warn!(?span, "line strip drawn without a bound vertex store"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ring::VertexStore;

    #[test]
    fn captured_vertices_follow_span_order() {
        let mut target = HostTarget::capturing();
        let program = target.create_program().expect("program");
        let mut store = target.allocate_store(9).expect("store");
        store.write_floats(0, &[1.0, 1.0, 0.0, 2.0, 2.0, 0.0, 3.0, 3.0, 0.0]);

        target.bind_position(&program, &store);
        target.draw_line_strip(DrawSpan::new(2, 1));
        target.draw_line_strip(DrawSpan::new(0, 2));

        let call = &target.draw_calls()[0];
        assert_eq!(call.vertex_count(), 3);
        assert_eq!(
            call.vertices(),
            vec![[3.0, 3.0, 0.0], [1.0, 1.0, 0.0], [2.0, 2.0, 0.0]]
        );
        assert_eq!(target.allocated_floats(), 9);
    }

    #[test]
    fn programs_get_distinct_ids() {
        let mut target = HostTarget::new();
        let first = target.create_program().expect("program");
        let second = target.create_program().expect("program");
        assert_ne!(first.id(), second.id());
    }

    #[test]
    fn draw_without_binding_is_ignored() {
        let mut target = HostTarget::new();
        target.draw_line_strip(DrawSpan::new(0, 4));
        assert!(target.take_draw_calls().is_empty());
    }
}
