use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// Host mirror of the line program's uniform block.
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct LineUniforms {
    pub projection: [[f32; 4]; 4],
    pub model_view: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl LineUniforms {
    pub fn new() -> Self {
        Self {
            projection: Mat4::IDENTITY.to_cols_array_2d(),
            model_view: Mat4::IDENTITY.to_cols_array_2d(),
            color: [0.0, 0.0, 0.0, 1.0],
        }
    }

    pub fn set_matrices(&mut self, model_view: &Mat4, projection: &Mat4) {
        self.model_view = model_view.to_cols_array_2d();
        self.projection = projection.to_cols_array_2d();
    }

    pub fn set_color(&mut self, rgba: [f32; 4]) {
        self.color = rgba;
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

impl Default for LineUniforms {
    fn default() -> Self {
        Self::new()
    }
}
