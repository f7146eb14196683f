//! The quad record shared by every batch.
//!
//! A quad is four [`QuadVertex`] records stored bottom-left, bottom-right,
//! top-left, top-right and drawn as the triangles `(v0, v1, v2)` and
//! `(v2, v1, v3)`. Stride and field offsets are the same for every quad, so
//! one attribute binding describes a whole batch.

use std::mem;

/// Vertices written per quad.
pub const VERTICES_PER_QUAD: usize = 4;
/// Indices written per quad (two triangles).
pub const INDICES_PER_QUAD: usize = 6;

/// One vertex of a quad: position, texture coordinate and colour.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub color: [f32; 4],
}

impl QuadVertex {
    /// Size of one vertex record in bytes.
    pub const STRIDE: usize = mem::size_of::<QuadVertex>();
    pub const POSITION_OFFSET: usize = 0;
    pub const TEX_COORDS_OFFSET: usize = mem::size_of::<[f32; 3]>();
    pub const COLOR_OFFSET: usize = mem::size_of::<[f32; 5]>();
    /// Size of one full quad (four records) in bytes.
    pub const QUAD_BYTES: usize = Self::STRIDE * VERTICES_PER_QUAD;

    const TEXTURED_ATTRIBUTES: [wgpu::VertexAttribute; 3] = [
        wgpu::VertexAttribute {
            offset: Self::POSITION_OFFSET as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: Self::TEX_COORDS_OFFSET as wgpu::BufferAddress,
            shader_location: 1,
            format: wgpu::VertexFormat::Float32x2,
        },
        wgpu::VertexAttribute {
            offset: Self::COLOR_OFFSET as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x4,
        },
    ];

    // The flat variant skips the texture coordinate but keeps the full stride.
    const FLAT_ATTRIBUTES: [wgpu::VertexAttribute; 2] = [
        wgpu::VertexAttribute {
            offset: Self::POSITION_OFFSET as wgpu::BufferAddress,
            shader_location: 0,
            format: wgpu::VertexFormat::Float32x3,
        },
        wgpu::VertexAttribute {
            offset: Self::COLOR_OFFSET as wgpu::BufferAddress,
            shader_location: 2,
            format: wgpu::VertexFormat::Float32x4,
        },
    ];

    /// Buffer layout for the textured program.
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::TEXTURED_ATTRIBUTES,
        }
    }

    /// Buffer layout for the flat-colour program.
    pub fn flat_desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: Self::STRIDE as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::FLAT_ATTRIBUTES,
        }
    }
}

/// The six indices of the quad whose first vertex sits at `base`.
pub fn quad_indices(base: u32) -> [u32; INDICES_PER_QUAD] {
    [base, base + 1, base + 2, base + 2, base + 1, base + 3]
}

/// An axis-aligned rectangle. Frames use texture pixels with the origin at
/// the bottom-left of the image.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// A rectangle of the given size anchored at the origin.
    pub fn sized(width: f32, height: f32) -> Self {
        Self::new(0.0, 0.0, width, height)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_packed() {
        assert_eq!(QuadVertex::STRIDE, 36);
        assert_eq!(QuadVertex::TEX_COORDS_OFFSET, 12);
        assert_eq!(QuadVertex::COLOR_OFFSET, 20);
        assert_eq!(QuadVertex::QUAD_BYTES, 144);
    }

    #[test]
    fn triangulation_shares_the_diagonal() {
        assert_eq!(quad_indices(0), [0, 1, 2, 2, 1, 3]);
        assert_eq!(quad_indices(8), [8, 9, 10, 10, 9, 11]);
    }
}
