//! wgpu implementation of the graphics context.
//!
//! Draws are not issued immediately: `draw_indexed` records them together
//! with a uniform bind group holding `projection × model_view`, and
//! [`WgpuContext::encode`] replays them into a render pass. The host (or
//! [`WgpuContext::render_to`]) decides which pass that is.

use std::{collections::HashMap, iter};

use anyhow::{Context as _, anyhow};
use cgmath::Matrix4;
use log::{debug, info, warn};
use wgpu::util::DeviceExt;

use crate::{
    context::{
        BufferId, BufferKind, BufferUsage, ContextError, DrawCall, GraphicsContext, ProgramInfo,
        ProgramVariant,
    },
    data_structures::texture::{Texture, TextureId},
    pipelines::{
        self,
        quad::{QuadPipelines, QuadUniform},
    },
    resources::{AssetLoader, registry::TextureRegistry},
};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Depth range of the orthographic projection; quads use z for layering.
const Z_RANGE: f32 = 1000.0;

/// Orthographic projection with the origin in the bottom-left corner and one
/// world unit per pixel.
pub fn projection(width: u32, height: u32) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX
        * cgmath::ortho(
            0.0,
            width.max(1) as f32,
            0.0,
            height.max(1) as f32,
            -Z_RANGE,
            Z_RANGE,
        )
}

#[derive(Debug)]
struct GpuBuffer {
    buffer: wgpu::Buffer,
    size: usize,
}

#[derive(Debug)]
struct PendingDraw {
    program: ProgramVariant,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    texture: Option<TextureId>,
    index_count: u32,
    uniforms: wgpu::BindGroup,
}

#[derive(Debug)]
pub struct WgpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    format: wgpu::TextureFormat,
    size: [u32; 2],
    projection: Matrix4<f32>,
    pipelines: QuadPipelines,
    buffers: Vec<Option<GpuBuffer>>,
    textures: HashMap<TextureId, (Texture, wgpu::BindGroup)>,
    pending: Vec<PendingDraw>,
}

impl WgpuContext {
    /// Wraps an existing device. `format` is the colour format of the
    /// targets passes will render into.
    pub fn new(
        device: wgpu::Device,
        queue: wgpu::Queue,
        format: wgpu::TextureFormat,
        size: [u32; 2],
    ) -> Self {
        let pipelines = QuadPipelines::new(&device, format);
        Self {
            device,
            queue,
            format,
            size,
            projection: projection(size[0], size[1]),
            pipelines,
            buffers: Vec::new(),
            textures: HashMap::new(),
            pending: Vec::new(),
        }
    }

    /// A context without a surface, rendering offscreen only.
    pub async fn headless(size: [u32; 2]) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            #[cfg(not(target_arch = "wasm32"))]
            backends: wgpu::Backends::PRIMARY,
            #[cfg(target_arch = "wasm32")]
            backends: wgpu::Backends::GL,
            ..wgpu::InstanceDescriptor::new_without_display_handle()
        });
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await?;
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("tessera device"),
                // WebGL doesn't support all of wgpu's features.
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                ..Default::default()
            })
            .await?;
        info!("headless context on {:?}", adapter.get_info().backend);
        Ok(Self::new(
            device,
            queue,
            wgpu::TextureFormat::Rgba8UnormSrgb,
            size,
        ))
    }

    pub fn format(&self) -> wgpu::TextureFormat {
        self.format
    }

    pub fn size(&self) -> [u32; 2] {
        self.size
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.size = [width, height];
            self.projection = projection(width, height);
        }
    }

    pub fn pending_draws(&self) -> usize {
        self.pending.len()
    }

    pub fn has_texture(&self, id: &TextureId) -> bool {
        self.textures.contains_key(id)
    }

    pub fn texture(&self, id: &TextureId) -> Result<&Texture, ContextError> {
        self.textures
            .get(id)
            .map(|(texture, _)| texture)
            .ok_or_else(|| ContextError::UnknownTexture(id.clone()))
    }

    pub fn insert_texture(&mut self, id: TextureId, texture: Texture) {
        let bind_group = self.pipelines.texture_bind_group(
            &self.device,
            &texture.view,
            &texture.sampler,
            id.as_str(),
        );
        self.textures.insert(id, (texture, bind_group));
    }

    /// Loads every requested texture that is not on the GPU yet. Returns how
    /// many were loaded.
    pub async fn load_textures(
        &mut self,
        registry: &TextureRegistry,
        loader: &AssetLoader,
    ) -> anyhow::Result<usize> {
        let missing: Vec<TextureId> = registry
            .requested()
            .filter(|texture| !self.textures.contains_key(&texture.id))
            .map(|texture| texture.id.clone())
            .collect();
        let loads = missing
            .iter()
            .map(|id| loader.load_texture(&self.device, &self.queue, id.as_str()));
        let results = futures::future::join_all(loads).await;

        let mut loaded = 0;
        for (id, texture) in missing.into_iter().zip(results) {
            let texture = texture.with_context(|| format!("loading texture {id}"))?;
            debug!("uploaded texture {id} ({}x{})", texture.size[0], texture.size[1]);
            self.insert_texture(id, texture);
            loaded += 1;
        }
        if loaded > 0 {
            info!("loaded {loaded} texture(s)");
        }
        Ok(loaded)
    }

    /// Replays this frame's draws into `pass`.
    pub fn encode(&self, pass: &mut wgpu::RenderPass<'_>) {
        for draw in &self.pending {
            let (Some(vertices), Some(indices)) = (
                self.gpu_buffer(draw.vertex_buffer),
                self.gpu_buffer(draw.index_buffer),
            ) else {
                warn!("skipping draw with released buffers");
                continue;
            };
            pass.set_pipeline(self.pipelines.get(draw.program));
            pass.set_bind_group(0, &draw.uniforms, &[]);
            if draw.program == ProgramVariant::Textured {
                let Some((_, bind_group)) = draw.texture.as_ref().and_then(|id| self.textures.get(id))
                else {
                    continue;
                };
                pass.set_bind_group(1, bind_group, &[]);
            }
            pass.set_vertex_buffer(0, vertices.buffer.slice(..));
            pass.set_index_buffer(indices.buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..draw.index_count, 0, 0..1);
        }
    }

    /// Drops this frame's recorded draws.
    pub fn finish_frame(&mut self) {
        self.pending.clear();
    }

    /// Renders this frame's draws into `view` and finishes the frame.
    pub fn render_to(&mut self, view: &wgpu::TextureView, clear: wgpu::Color) {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Quad Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Quad Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
            self.encode(&mut pass);
        }
        self.queue.submit(iter::once(encoder.finish()));
        self.finish_frame();
    }

    /// Renders this frame's draws offscreen and reads the pixels back.
    pub async fn capture(&mut self, clear: wgpu::Color) -> anyhow::Result<image::RgbaImage> {
        let [width, height] = self.size;
        let target =
            Texture::create_render_target(&self.device, self.format, self.size, "Capture Texture");
        let view = target.create_view(&wgpu::TextureViewDescriptor::default());
        self.render_to(&view, clear);

        let unpadded_row = 4 * width;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = unpadded_row.div_ceil(align) * align;
        let output = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Capture Buffer"),
            size: (padded_row * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Capture Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &target,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        // The mapping has to be requested before polling, otherwise the
        // receive below never resolves.
        let slice = output.slice(..);
        let (tx, rx) = futures_intrusive::channel::shared::oneshot_channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        #[cfg(target_arch = "wasm32")]
        self.device.poll(wgpu::PollType::Poll)?;
        #[cfg(not(target_arch = "wasm32"))]
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })?;
        rx.receive()
            .await
            .ok_or_else(|| anyhow!("capture buffer mapping was dropped"))??;

        let bgra = matches!(
            self.format,
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb
        );
        let mut pixels = Vec::with_capacity((unpadded_row * height) as usize);
        {
            let data = slice.get_mapped_range();
            for row in data.chunks_exact(padded_row as usize) {
                pixels.extend_from_slice(&row[..unpadded_row as usize]);
            }
        }
        output.unmap();
        if bgra {
            pixels.chunks_exact_mut(4).for_each(|px| px.swap(0, 2));
        }
        image::RgbaImage::from_raw(width, height, pixels)
            .ok_or_else(|| anyhow!("captured {width}x{height} image has the wrong size"))
    }

    fn gpu_buffer(&self, buffer: BufferId) -> Option<&GpuBuffer> {
        self.buffers.get(buffer.0 as usize).and_then(Option::as_ref)
    }
}

impl GraphicsContext for WgpuContext {
    fn supports_buffer_objects(&self) -> bool {
        true
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: usize,
        label: &str,
    ) -> Result<BufferId, ContextError> {
        let usage = match kind {
            BufferKind::Vertex => wgpu::BufferUsages::VERTEX,
            BufferKind::Index => wgpu::BufferUsages::INDEX,
        };
        // Copies must be 4-byte aligned.
        let padded = size.div_ceil(4) * 4;
        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: padded.max(4) as wgpu::BufferAddress,
            usage: usage | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let id = BufferId(self.buffers.len() as u32);
        self.buffers.push(Some(GpuBuffer { buffer, size }));
        Ok(id)
    }

    fn upload_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        bytes: &[u8],
        _usage: BufferUsage,
    ) -> Result<(), ContextError> {
        let target = self
            .gpu_buffer(buffer)
            .ok_or(ContextError::UnknownBuffer(buffer))?;
        if offset + bytes.len() > target.size {
            return Err(ContextError::UploadOutOfBounds {
                buffer,
                offset,
                len: bytes.len(),
                size: target.size,
            });
        }
        self.queue
            .write_buffer(&target.buffer, offset as wgpu::BufferAddress, bytes);
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Some(slot) = self.buffers.get_mut(buffer.0 as usize) {
            if let Some(released) = slot.take() {
                released.buffer.destroy();
            }
        }
    }

    fn program(&self, variant: ProgramVariant) -> ProgramInfo {
        pipelines::program_info(variant)
    }

    fn draw_indexed(&mut self, call: &DrawCall) -> Result<(), ContextError> {
        for buffer in [call.vertex_buffer, call.index_buffer] {
            if self.gpu_buffer(buffer).is_none() {
                return Err(ContextError::UnknownBuffer(buffer));
            }
        }
        if let Some(texture) = &call.texture {
            if !self.textures.contains_key(texture) {
                warn!("texture {texture} is not loaded yet, skipping draw");
                return Ok(());
            }
        }

        let uniform = QuadUniform::new(self.projection * call.model_view, call.opacity);
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Quad Uniform Buffer"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
        let uniforms = self.pipelines.uniform_bind_group(&self.device, &buffer);

        self.pending.push(PendingDraw {
            program: call.program,
            vertex_buffer: call.vertex_buffer,
            index_buffer: call.index_buffer,
            texture: call.texture.clone(),
            index_count: call.index_count,
            uniforms,
        });
        Ok(())
    }
}
