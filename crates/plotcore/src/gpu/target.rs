use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use glam::Mat4;

use crate::drawable::{ClipRect, Viewport};
use crate::program::{LineTarget, RenderProgram, TargetError};
use crate::ring::{DrawSpan, VertexStore};

use super::context::{GpuContext, TARGET_FORMAT};
use super::pipeline::LinePipeline;
use super::uniforms::LineUniforms;

/// Vertex buffer on the device; writes go straight through the queue.
pub struct GpuStore {
    buffer: Arc<wgpu::Buffer>,
    queue: Arc<wgpu::Queue>,
    capacity_floats: usize,
}

impl VertexStore for GpuStore {
    fn capacity_floats(&self) -> usize {
        self.capacity_floats
    }

    fn write_floats(&mut self, offset: usize, data: &[f32]) {
        let byte_offset = (offset * std::mem::size_of::<f32>()) as wgpu::BufferAddress;
        self.queue
            .write_buffer(&self.buffer, byte_offset, bytemuck::cast_slice(data));
    }
}

/// One series' uniform block and the bind group exposing it.
pub struct GpuProgram {
    uniforms: LineUniforms,
    buffer: wgpu::Buffer,
    bind_group: Arc<wgpu::BindGroup>,
}

impl GpuProgram {
    pub fn uniforms(&self) -> &LineUniforms {
        &self.uniforms
    }
}

impl RenderProgram for GpuProgram {
    fn use_matrices(&mut self, model_view: &Mat4, projection: &Mat4) {
        self.uniforms.set_matrices(model_view, projection);
    }

    fn set_color(&mut self, rgba: [f32; 4]) {
        self.uniforms.set_color(rgba);
    }
}

enum Command {
    Viewport {
        viewport: Viewport,
        clip: Option<ClipRect>,
    },
    Bind {
        vertex_buffer: Arc<wgpu::Buffer>,
        bind_group: Arc<wgpu::BindGroup>,
    },
    Draw(DrawSpan),
}

/// Offscreen [`LineTarget`]. Draw calls issued during a frame are recorded
/// and replayed in order into one render pass by [`GpuTarget::finish_frame`].
///
/// Uniforms are uploaded when a program is bound, so a program bound twice
/// in one frame draws both times with its last state.
pub struct GpuTarget {
    context: GpuContext,
    pipeline: LinePipeline,
    commands: Vec<Command>,
}

impl GpuTarget {
    pub fn new(context: GpuContext) -> Self {
        let pipeline = LinePipeline::new(&context.device, TARGET_FORMAT);
        Self {
            context,
            pipeline,
            commands: Vec::new(),
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    /// Clears the target to `clear_color`, replays the recorded draws and
    /// submits the frame. Returns the number of draw calls executed.
    pub fn finish_frame(&mut self, clear_color: [f64; 4]) -> usize {
        let commands = std::mem::take(&mut self.commands);
        let (width, height) = (self.context.width(), self.context.height());
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("plot frame encoder"),
            });

        let mut draws = 0;
        {
            let [r, g, b, a] = clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("plot pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.context.view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.pipeline.pipeline);

            let mut visible = true;
            for command in commands {
                match command {
                    Command::Viewport { viewport, clip } => {
                        match pixel_rects(viewport, clip, width, height) {
                            Some((viewport, scissor)) => {
                                pass.set_viewport(
                                    viewport.x,
                                    viewport.y,
                                    viewport.width,
                                    viewport.height,
                                    0.0,
                                    1.0,
                                );
                                pass.set_scissor_rect(
                                    scissor.x,
                                    scissor.y,
                                    scissor.width,
                                    scissor.height,
                                );
                                visible = true;
                            }
                            None => visible = false,
                        }
                    }
                    Command::Bind {
                        vertex_buffer,
                        bind_group,
                    } => {
                        if visible {
                            pass.set_bind_group(0, &*bind_group, &[]);
                            pass.set_vertex_buffer(0, vertex_buffer.slice(..));
                        }
                    }
                    Command::Draw(span) => {
                        if visible && span.vertex_count > 0 {
                            pass.draw(span.first_vertex as u32..span.end() as u32, 0..1);
                            draws += 1;
                        }
                    }
                }
            }
        }

        self.context.queue.submit([encoder.finish()]);
        tracing::trace!(draws, "frame submitted");
        draws
    }

    /// Copies the target texture back to the host as tightly packed RGBA8.
    pub fn read_pixels(&self) -> Result<image::RgbaImage> {
        let (width, height) = (self.context.width(), self.context.height());
        let row_bytes = width * 4;
        let padded_row_bytes = row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT);
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plot readback"),
            size: padded_row_bytes as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("plot readback encoder"),
            });
        encoder.copy_texture_to_buffer(
            self.context.texture.as_image_copy(),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row_bytes),
                    rows_per_image: None,
                },
            },
            self.context.size,
        );
        self.context.queue.submit([encoder.finish()]);

        let slice = buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .context("failed to wait for readback")?;
        receiver
            .recv()
            .context("readback callback was dropped")?
            .context("failed to map readback buffer")?;

        let data = slice.get_mapped_range();
        let mut pixels = Vec::with_capacity((row_bytes * height) as usize);
        for row in data.chunks(padded_row_bytes as usize) {
            pixels.extend_from_slice(&row[..row_bytes as usize]);
        }
        drop(data);
        buffer.unmap();

        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("readback produced a short pixel buffer"))
    }

    pub fn export_png(&self, path: &Path) -> Result<()> {
        let image = self.read_pixels()?;
        image
            .save_with_format(path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "exported frame");
        Ok(())
    }
}

impl LineTarget for GpuTarget {
    type Store = GpuStore;
    type Program = GpuProgram;

    fn allocate_store(&mut self, capacity_floats: usize) -> Result<GpuStore, TargetError> {
        let requested = (capacity_floats * std::mem::size_of::<f32>()) as u64;
        let limit = self.context.max_buffer_size();
        if requested > limit {
            return Err(TargetError::BufferTooLarge { requested, limit });
        }
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("geometry ring"),
            size: requested,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Ok(GpuStore {
            buffer: Arc::new(buffer),
            queue: Arc::clone(&self.context.queue),
            capacity_floats,
        })
    }

    fn create_program(&mut self) -> Result<GpuProgram, TargetError> {
        let uniforms = LineUniforms::new();
        let buffer = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("line uniforms"),
            size: std::mem::size_of::<LineUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = self
            .context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("line uniforms bind group"),
                layout: &self.pipeline.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                }],
            });
        Ok(GpuProgram {
            uniforms,
            buffer,
            bind_group: Arc::new(bind_group),
        })
    }

    fn set_viewport(&mut self, viewport: Viewport, clip: Option<ClipRect>) {
        self.commands.push(Command::Viewport { viewport, clip });
    }

    fn bind_position(&mut self, program: &GpuProgram, store: &GpuStore) {
        self.context
            .queue
            .write_buffer(&program.buffer, 0, program.uniforms.as_bytes());
        self.commands.push(Command::Bind {
            vertex_buffer: Arc::clone(&store.buffer),
            bind_group: Arc::clone(&program.bind_group),
        });
    }

    fn draw_line_strip(&mut self, span: DrawSpan) {
        self.commands.push(Command::Draw(span));
    }
}

/// Clamps `viewport` to the target and intersects it with `clip`, returning
/// the viewport and the scissor rectangle, or `None` if nothing is visible.
fn pixel_rects(
    viewport: Viewport,
    clip: Option<ClipRect>,
    width: u32,
    height: u32,
) -> Option<(Viewport, ClipRect)> {
    let left = viewport.x.max(0.0);
    let top = viewport.y.max(0.0);
    let right = (viewport.x + viewport.width).min(width as f32);
    let bottom = (viewport.y + viewport.height).min(height as f32);
    if right <= left || bottom <= top {
        return None;
    }
    let clamped = Viewport::new(left, top, right - left, bottom - top);

    let mut x0 = left.floor() as u32;
    let mut y0 = top.floor() as u32;
    let mut x1 = (right.ceil() as u32).min(width);
    let mut y1 = (bottom.ceil() as u32).min(height);
    if let Some(clip) = clip {
        x0 = x0.max(clip.x);
        y0 = y0.max(clip.y);
        x1 = x1.min(clip.x.saturating_add(clip.width));
        y1 = y1.min(clip.y.saturating_add(clip.height));
    }
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some((clamped, ClipRect::new(x0, y0, x1 - x0, y1 - y0)))
}
