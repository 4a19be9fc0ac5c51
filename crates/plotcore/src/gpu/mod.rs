//! wgpu backend for [`LineTarget`](crate::program::LineTarget).
//!
//! - `context` owns the headless instance, device and offscreen texture.
//! - `shader` holds the WGSL line program.
//! - `uniforms` mirrors the program's uniform block.
//! - `pipeline` builds the line-strip render pipeline and its bind group layout.
//! - `target` implements the line target: vertex stores write straight through
//!   the queue, draw calls are recorded during the frame and replayed into a
//!   single render pass by [`GpuTarget::finish_frame`].

mod context;
mod pipeline;
mod shader;
mod target;
mod uniforms;

pub use context::{GpuContext, TARGET_FORMAT};
pub use target::{GpuProgram, GpuStore, GpuTarget};
pub use uniforms::LineUniforms;
