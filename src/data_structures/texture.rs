//! Texture identity and GPU textures.
//!
//! Batches and members only ever hold a [`TextureRef`]: the texture's
//! identifier (its asset path) plus its pixel size, which is all that is
//! needed to turn a frame into texture coordinates. The GPU side lives in
//! [`Texture`], owned by the wgpu context.

use std::{borrow::Borrow, fmt, sync::Arc};

use anyhow::*;
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

use crate::data_structures::quad::Rect;

/// Identifier of a texture asset, usually the path it was requested with.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(Arc<str>);

impl TextureId {
    pub fn new(path: &str) -> Self {
        Self(Arc::from(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TextureId {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

impl Borrow<str> for TextureId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TextureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A texture as seen by batches: identifier plus pixel size.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TextureRef {
    pub id: TextureId,
    pub width: u32,
    pub height: u32,
}

impl TextureRef {
    pub fn new(path: &str, width: u32, height: u32) -> Self {
        Self {
            id: TextureId::new(path),
            width,
            height,
        }
    }

    /// Texture coordinates of `frame` in quad storage order
    /// (bottom-left, bottom-right, top-left, top-right).
    pub fn tex_coords(&self, frame: &Rect) -> [[f32; 2]; 4] {
        let w = self.width.max(1) as f32;
        let h = self.height.max(1) as f32;
        let left = frame.x / w;
        let right = (frame.x + frame.width) / w;
        let bottom = frame.y / h;
        let top = (frame.y + frame.height) / h;
        [[left, bottom], [right, bottom], [left, top], [right, top]]
    }
}

/// A GPU texture with a view and sampler.
#[derive(Clone, Debug)]
pub struct Texture {
    #[allow(unused)]
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    pub size: [u32; 2],
}

impl Texture {
    /// Load a texture from raw image file contents.
    ///
    /// `format` is an optional file extension hint (e.g. "png"); without it
    /// the format is guessed from the data.
    pub fn from_bytes(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        bytes: &[u8],
        label: &str,
        format: Option<&str>,
    ) -> Result<Self> {
        let img = match format.and_then(ImageFormat::from_extension) {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
        };
        Self::from_image(device, queue, &img, Some(label))
    }

    pub fn from_image(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        img: &image::DynamicImage,
        label: Option<&str>,
    ) -> Result<Self> {
        let dimensions = img.dimensions();
        let rgba = img.to_rgba8();

        let size = wgpu::Extent3d {
            width: dimensions.0,
            height: dimensions.1,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label,
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            &rgba,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * dimensions.0),
                rows_per_image: Some(dimensions.1),
            },
            size,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        // Tile sheets are sampled texel-exact, so no filtering across tile borders.
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            texture,
            view,
            sampler,
            size: [dimensions.0, dimensions.1],
        })
    }

    /// An offscreen colour target that can be copied back to the CPU.
    pub fn create_render_target(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: [u32; 2],
        label: &str,
    ) -> wgpu::Texture {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: size[0].max(1),
                height: size[1].max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_maps_to_normalised_coordinates() {
        let tex = TextureRef::new("tiles.png", 128, 64);
        let uv = tex.tex_coords(&Rect::new(32.0, 16.0, 32.0, 16.0));
        assert_eq!(uv[0], [0.25, 0.25]);
        assert_eq!(uv[1], [0.5, 0.25]);
        assert_eq!(uv[2], [0.25, 0.5]);
        assert_eq!(uv[3], [0.5, 0.5]);
    }

    #[test]
    fn ids_compare_by_path() {
        assert_eq!(TextureId::from("a.png"), TextureId::new("a.png"));
        assert_ne!(TextureId::from("a.png"), TextureId::new("b.png"));
        assert_eq!(TextureId::new("maps/a.png").to_string(), "maps/a.png");
    }
}
