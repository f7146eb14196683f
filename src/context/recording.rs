//! A graphics context that records instead of rendering.

use log::debug;

use crate::{
    context::{
        BufferId, BufferKind, BufferUsage, ContextError, DrawCall, GraphicsContext, ProgramInfo,
        ProgramVariant,
    },
    data_structures::quad::QuadVertex,
    pipelines,
};

/// One call made against a [`RecordingContext`].
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateBuffer {
        buffer: BufferId,
        kind: BufferKind,
        size: usize,
    },
    Upload {
        buffer: BufferId,
        offset: usize,
        len: usize,
        usage: BufferUsage,
    },
    Release(BufferId),
    Draw(DrawCall),
}

#[derive(Debug)]
struct RecordedBuffer {
    kind: BufferKind,
    label: String,
    bytes: Vec<u8>,
    released: bool,
}

/// Keeps every command plus a byte mirror of each buffer.
#[derive(Debug)]
pub struct RecordingContext {
    buffer_objects: bool,
    buffers: Vec<RecordedBuffer>,
    commands: Vec<Command>,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            buffer_objects: true,
            buffers: Vec::new(),
            commands: Vec::new(),
        }
    }

    /// A context that reports no buffer-object support.
    pub fn without_buffer_objects() -> Self {
        Self {
            buffer_objects: false,
            ..Self::new()
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &DrawCall> {
        self.commands.iter().filter_map(|command| match command {
            Command::Draw(call) => Some(call),
            _ => None,
        })
    }

    pub fn uploads(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::Upload { .. }))
    }

    pub fn bytes(&self, buffer: BufferId) -> Option<&[u8]> {
        self.buffers
            .get(buffer.0 as usize)
            .filter(|b| !b.released)
            .map(|b| b.bytes.as_slice())
    }

    pub fn label(&self, buffer: BufferId) -> Option<&str> {
        self.buffers.get(buffer.0 as usize).map(|b| b.label.as_str())
    }

    pub fn kind(&self, buffer: BufferId) -> Option<BufferKind> {
        self.buffers.get(buffer.0 as usize).map(|b| b.kind)
    }

    /// The mirrored contents of an index buffer.
    pub fn indices(&self, buffer: BufferId) -> Vec<u32> {
        self.bytes(buffer)
            .map(|bytes| {
                bytes
                    .chunks_exact(4)
                    .map(bytemuck::pod_read_unaligned::<u32>)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The mirrored contents of a vertex buffer.
    pub fn vertices(&self, buffer: BufferId) -> Vec<QuadVertex> {
        self.bytes(buffer)
            .map(|bytes| {
                bytes
                    .chunks_exact(QuadVertex::STRIDE)
                    .map(bytemuck::pod_read_unaligned::<QuadVertex>)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.iter().filter(|b| !b.released).count()
    }

    fn buffer_mut(&mut self, buffer: BufferId) -> Result<&mut RecordedBuffer, ContextError> {
        self.buffers
            .get_mut(buffer.0 as usize)
            .filter(|b| !b.released)
            .ok_or(ContextError::UnknownBuffer(buffer))
    }
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphicsContext for RecordingContext {
    fn supports_buffer_objects(&self) -> bool {
        self.buffer_objects
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: usize,
        label: &str,
    ) -> Result<BufferId, ContextError> {
        if !self.buffer_objects {
            return Err(ContextError::BuffersUnsupported);
        }
        let buffer = BufferId(self.buffers.len() as u32);
        self.buffers.push(RecordedBuffer {
            kind,
            label: label.to_string(),
            bytes: vec![0; size],
            released: false,
        });
        debug!("created {kind:?} buffer {label} ({size} bytes)");
        self.commands.push(Command::CreateBuffer { buffer, kind, size });
        Ok(buffer)
    }

    fn upload_buffer(
        &mut self,
        buffer: BufferId,
        offset: usize,
        bytes: &[u8],
        usage: BufferUsage,
    ) -> Result<(), ContextError> {
        let target = self.buffer_mut(buffer)?;
        let size = target.bytes.len();
        let end = offset + bytes.len();
        if end > size {
            return Err(ContextError::UploadOutOfBounds {
                buffer,
                offset,
                len: bytes.len(),
                size,
            });
        }
        target.bytes[offset..end].copy_from_slice(bytes);
        self.commands.push(Command::Upload {
            buffer,
            offset,
            len: bytes.len(),
            usage,
        });
        Ok(())
    }

    fn release_buffer(&mut self, buffer: BufferId) {
        if let Ok(target) = self.buffer_mut(buffer) {
            target.released = true;
            target.bytes = Vec::new();
            self.commands.push(Command::Release(buffer));
        }
    }

    fn program(&self, variant: ProgramVariant) -> ProgramInfo {
        pipelines::program_info(variant)
    }

    fn draw_indexed(&mut self, call: &DrawCall) -> Result<(), ContextError> {
        self.buffer_mut(call.vertex_buffer)?;
        self.buffer_mut(call.index_buffer)?;
        self.commands.push(Command::Draw(call.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uploads_are_mirrored() {
        let mut ctx = RecordingContext::new();
        let buffer = ctx.create_buffer(BufferKind::Index, 12, "indices").unwrap();
        ctx.upload_buffer(buffer, 4, bytemuck::cast_slice(&[7u32, 9]), BufferUsage::Static)
            .unwrap();
        assert_eq!(ctx.indices(buffer), vec![0, 7, 9]);
    }

    #[test]
    fn out_of_bounds_upload_is_rejected() {
        let mut ctx = RecordingContext::new();
        let buffer = ctx.create_buffer(BufferKind::Vertex, 4, "tiny").unwrap();
        let err = ctx
            .upload_buffer(buffer, 2, &[0; 4], BufferUsage::Dynamic)
            .unwrap_err();
        assert!(matches!(err, ContextError::UploadOutOfBounds { size: 4, .. }));
    }

    #[test]
    fn released_buffers_are_unknown() {
        let mut ctx = RecordingContext::new();
        let buffer = ctx.create_buffer(BufferKind::Vertex, 4, "gone").unwrap();
        ctx.release_buffer(buffer);
        assert_eq!(ctx.live_buffers(), 0);
        assert_eq!(
            ctx.upload_buffer(buffer, 0, &[1], BufferUsage::Dynamic),
            Err(ContextError::UnknownBuffer(buffer))
        );
    }

    #[test]
    fn no_buffers_without_support() {
        let mut ctx = RecordingContext::without_buffer_objects();
        assert!(!ctx.supports_buffer_objects());
        assert_eq!(
            ctx.create_buffer(BufferKind::Vertex, 4, "none"),
            Err(ContextError::BuffersUnsupported)
        );
    }
}
