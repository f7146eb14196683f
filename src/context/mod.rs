//! The graphics context batches render through.
//!
//! [`GraphicsContext`] is the seam between the scene and the GPU: buffer
//! objects, their uploads, the program registry and indexed draws. Two
//! implementations ship with the crate:
//!
//! - [`gpu::WgpuContext`] renders with wgpu
//! - [`recording::RecordingContext`] keeps every command and a mirror of all
//!   buffer contents in memory, for headless use and tests

pub mod gpu;
pub mod recording;

use thiserror::Error;

pub use crate::render::{DrawCall, ProgramInfo, ProgramVariant, VertexAttribute};
use crate::data_structures::texture::TextureId;

/// Handle of a buffer object created by a context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub(crate) u32);

impl BufferId {
    pub fn index(&self) -> u32 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Usage hint passed with every upload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    /// Written once or rarely (index buffers).
    Static,
    /// Rewritten most frames (vertex buffers).
    Dynamic,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ContextError {
    #[error("the graphics context does not support vertex/index buffer objects")]
    BuffersUnsupported,
    #[error("unknown buffer {0:?}")]
    UnknownBuffer(BufferId),
    #[error("upload of {len} bytes at offset {offset} overflows buffer {buffer:?} of {size} bytes")]
    UploadOutOfBounds {
        buffer: BufferId,
        offset: usize,
        len: usize,
        size: usize,
    },
    #[error("texture {0} has not been loaded")]
    UnknownTexture(TextureId),
}

pub trait GraphicsContext {
    /// Whether vertex and index buffer objects are available. Batches refuse
    /// to be built without them.
    fn supports_buffer_objects(&self) -> bool;

    /// Creates a zero-filled buffer of `size` bytes.
    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: usize,
        label: &str,
    ) -> Result<BufferId, ContextError>;

    fn upload_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        bytes: &[u8],
        usage: BufferUsage,
    ) -> Result<(), ContextError>;

    fn release_buffer(&mut self, buffer: BufferId);

    /// Looks up the program for `variant`.
    fn program(&self, variant: ProgramVariant) -> ProgramInfo;

    fn draw_indexed(&mut self, call: &DrawCall) -> Result<(), ContextError>;
}
