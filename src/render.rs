//! Draw-call description.
//!
//! Batches do not talk to wgpu directly. Each frame they describe what they
//! want drawn as a [`DrawCall`] and hand it to the
//! [`GraphicsContext`](crate::context::GraphicsContext), which decides how to
//! bind and issue it.
//!
//! # Key types
//!
//! - [`ProgramVariant`] selects the textured or flat-colour program
//! - [`ProgramInfo`] holds the attribute locations a program exposes
//! - [`VertexAttribute`] is one attribute pointer (location, size, offset)
//! - [`DrawCall`] is one indexed triangle draw of a whole batch

use cgmath::Matrix4;

use crate::{context::BufferId, data_structures::texture::TextureId};

/// The two shader programs quads can be drawn with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ProgramVariant {
    Textured,
    Flat,
}

impl ProgramVariant {
    pub fn for_texture(textured: bool) -> Self {
        if textured {
            ProgramVariant::Textured
        } else {
            ProgramVariant::Flat
        }
    }
}

/// Attribute locations of a program. The flat program has no texture
/// coordinate input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProgramInfo {
    pub variant: ProgramVariant,
    pub position: u32,
    pub tex_coords: Option<u32>,
    pub color: u32,
}

/// One vertex-attribute pointer into an interleaved buffer of `f32`s.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub location: u32,
    pub components: u32,
    pub offset: usize,
}

/// An indexed triangle-list draw over one vertex and one index buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct DrawCall {
    pub program: ProgramVariant,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub stride: usize,
    pub attributes: Vec<VertexAttribute>,
    /// Texture bound to unit 0, if any.
    pub texture: Option<TextureId>,
    pub model_view: Matrix4<f32>,
    pub opacity: f32,
    pub index_count: u32,
}
