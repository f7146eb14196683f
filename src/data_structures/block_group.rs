//! Batched rendering of many quads in one draw call.
//!
//! A [`BlockGroup`] owns one vertex arena of `capacity × 4` [`QuadVertex`]
//! records and one index buffer of `capacity × 6` indices. Every member
//! [`Block`] gets a slot when it is added; during traversal the group hands
//! each member the four records of its slot, uploads what changed, and draws
//! all members with a single indexed draw.

use std::ops::Range;

use cgmath::Matrix4;
use log::{debug, warn};
use thiserror::Error;

use crate::{
    context::{
        BufferId, BufferKind, BufferUsage, ContextError, DrawCall, GraphicsContext,
        ProgramVariant, VertexAttribute,
    },
    data_structures::{
        block::Block,
        quad::{INDICES_PER_QUAD, QuadVertex, Rect, VERTICES_PER_QUAD, quad_indices},
        scene_graph::{Node, SceneNode},
        texture::TextureRef,
    },
};

/// Identity of a group, used to check that members were created by it.
///
/// A group is identified by its vertex buffer, which is unique within the
/// graphics context that created it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(BufferId);

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("block group is full ({capacity} members)")]
    CapacityExceeded { capacity: usize },
    #[error("block texture {found} does not match the group texture {expected}")]
    TextureMismatch { expected: String, found: String },
    #[error("block was not created by this group")]
    OwnershipViolation,
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    #[error(transparent)]
    Context(#[from] ContextError),
}

/// How vertex data reaches the GPU each frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UploadStrategy {
    /// Re-upload the whole arena every frame.
    Full,
    /// Upload only the span of slots that members rewrote this frame.
    #[default]
    DirtyRange,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockGroupConfig {
    pub capacity: usize,
    pub upload: UploadStrategy,
}

impl Default for BlockGroupConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            upload: UploadStrategy::default(),
        }
    }
}

pub struct BlockGroup {
    pub node: Node,
    id: GroupId,
    capacity: usize,
    upload: UploadStrategy,
    texture: Option<TextureRef>,
    members: Vec<Block>,
    vertices: Vec<QuadVertex>,
    indices: Vec<u32>,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    structure_dirty: bool,
    /// Slots rewritten by members but not yet uploaded.
    pending_upload: Option<Range<usize>>,
}

impl BlockGroup {
    /// A group for up to `capacity` members (10 if `None`).
    pub fn new(
        ctx: &mut dyn GraphicsContext,
        texture: Option<TextureRef>,
        capacity: Option<usize>,
    ) -> Result<Self, BatchError> {
        let mut config = BlockGroupConfig::default();
        if let Some(capacity) = capacity {
            config.capacity = capacity;
        }
        Self::with_config(ctx, texture, config)
    }

    pub fn with_config(
        ctx: &mut dyn GraphicsContext,
        texture: Option<TextureRef>,
        config: BlockGroupConfig,
    ) -> Result<Self, BatchError> {
        if !ctx.supports_buffer_objects() {
            return Err(ContextError::BuffersUnsupported.into());
        }
        // Storage always holds at least one quad so index regeneration has a
        // slot to write even for an empty group.
        let slots = config.capacity.max(1);
        let vertex_buffer = ctx.create_buffer(
            BufferKind::Vertex,
            slots * QuadVertex::QUAD_BYTES,
            "BlockGroup Vertex Buffer",
        )?;
        let index_buffer = match ctx.create_buffer(
            BufferKind::Index,
            slots * INDICES_PER_QUAD * size_of::<u32>(),
            "BlockGroup Index Buffer",
        ) {
            Ok(buffer) => buffer,
            Err(e) => {
                ctx.release_buffer(vertex_buffer);
                return Err(e.into());
            }
        };

        Ok(Self {
            node: Node::new(),
            id: GroupId(vertex_buffer),
            capacity: config.capacity,
            upload: config.upload,
            texture,
            members: Vec::with_capacity(config.capacity),
            vertices: vec![QuadVertex::default(); slots * VERTICES_PER_QUAD],
            indices: vec![0; slots * INDICES_PER_QUAD],
            vertex_buffer,
            index_buffer,
            structure_dirty: true,
            pending_upload: None,
        })
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn texture(&self) -> Option<&TextureRef> {
        self.texture.as_ref()
    }

    pub fn upload_strategy(&self) -> UploadStrategy {
        self.upload
    }

    pub fn is_structure_dirty(&self) -> bool {
        self.structure_dirty
    }

    pub fn vertex_buffer(&self) -> BufferId {
        self.vertex_buffer
    }

    pub fn index_buffer(&self) -> BufferId {
        self.index_buffer
    }

    /// The CPU copy of the vertex arena, `capacity × 4` records.
    pub fn vertices(&self) -> &[QuadVertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn member(&self, slot: usize) -> Option<&Block> {
        self.members.get(slot)
    }

    pub fn member_mut(&mut self, slot: usize) -> Option<&mut Block> {
        self.members.get_mut(slot)
    }

    pub fn members(&self) -> &[Block] {
        &self.members
    }

    pub fn members_mut(&mut self) -> &mut [Block] {
        &mut self.members
    }

    /// A new block bound to this group's texture. It is not added yet.
    pub fn create_member(&self, frame: Rect) -> Block {
        Block::owned_by(self.id, frame, self.texture.clone())
    }

    /// Adds `block` and returns its slot.
    pub fn add_member(&mut self, mut block: Block) -> Result<usize, BatchError> {
        if self.members.len() == self.capacity {
            warn!("BlockGroup is full ({} members)", self.capacity);
            return Err(BatchError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        match (&self.texture, block.texture()) {
            (Some(expected), found) if found.map(|t| &t.id) != Some(&expected.id) => {
                let found = found.map_or_else(|| "none".to_string(), |t| t.id.to_string());
                warn!("rejected block with texture {found}, group uses {}", expected.id);
                return Err(BatchError::TextureMismatch {
                    expected: expected.id.to_string(),
                    found,
                });
            }
            _ => {}
        }
        if block.owner() != Some(self.id) {
            return Err(BatchError::OwnershipViolation);
        }

        if self.texture.is_none() {
            self.texture = block.texture().cloned();
        }
        let slot = self.members.len();
        block.attach(slot);
        self.members.push(block);
        self.structure_dirty = true;
        Ok(slot)
    }

    /// Member removal is not supported; slots are never reused.
    pub fn remove_member(&mut self, _slot: usize) -> Result<Block, BatchError> {
        Err(BatchError::NotImplemented("BlockGroup::remove_member"))
    }

    /// Rewrites the indices of every slot from `from_slot` on and uploads
    /// the whole index buffer.
    ///
    /// Slot `n` always starts at vertex `4n`, so a partial rewrite agrees
    /// with the untouched slots whether or not they were generated before.
    pub fn regenerate_indices(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        from_slot: usize,
    ) -> Result<(), ContextError> {
        let slots = self.members.len().max(1);
        let from_slot = from_slot.min(slots);
        let mut base = (from_slot * VERTICES_PER_QUAD) as u32;
        for quad in self.indices[from_slot * INDICES_PER_QUAD..slots * INDICES_PER_QUAD]
            .chunks_exact_mut(INDICES_PER_QUAD)
        {
            quad.copy_from_slice(&quad_indices(base));
            base += VERTICES_PER_QUAD as u32;
        }
        debug!("regenerated indices for slots {from_slot}..{slots}");
        ctx.upload_buffer(
            self.index_buffer,
            0,
            bytemuck::cast_slice(&self.indices),
            BufferUsage::Static,
        )
    }

    /// Issues one indexed draw of all members.
    pub fn render(&self, ctx: &mut dyn GraphicsContext) -> Result<(), ContextError> {
        if self.members.is_empty() {
            return Ok(());
        }
        let program = ctx.program(ProgramVariant::for_texture(self.texture.is_some()));

        let mut attributes = vec![VertexAttribute {
            location: program.position,
            components: 3,
            offset: QuadVertex::POSITION_OFFSET,
        }];
        if let Some(location) = program.tex_coords {
            attributes.push(VertexAttribute {
                location,
                components: 2,
                offset: QuadVertex::TEX_COORDS_OFFSET,
            });
        }
        attributes.push(VertexAttribute {
            location: program.color,
            components: 4,
            offset: QuadVertex::COLOR_OFFSET,
        });

        ctx.draw_indexed(&DrawCall {
            program: program.variant,
            vertex_buffer: self.vertex_buffer,
            index_buffer: self.index_buffer,
            stride: QuadVertex::STRIDE,
            attributes,
            texture: self.texture.as_ref().map(|t| t.id.clone()),
            model_view: self.node.model_view(),
            opacity: self.node.opacity(),
            index_count: (self.members.len() * INDICES_PER_QUAD) as u32,
        })
    }

    fn upload_vertices(
        &self,
        ctx: &mut dyn GraphicsContext,
        dirty: Option<Range<usize>>,
    ) -> Result<(), ContextError> {
        let slots = match self.upload {
            UploadStrategy::Full => 0..self.vertices.len() / VERTICES_PER_QUAD,
            UploadStrategy::DirtyRange => match dirty {
                Some(range) => range,
                None => return Ok(()),
            },
        };
        let records = &self.vertices[slots.start * VERTICES_PER_QUAD..slots.end * VERTICES_PER_QUAD];
        ctx.upload_buffer(
            self.vertex_buffer,
            slots.start * QuadVertex::QUAD_BYTES,
            bytemuck::cast_slice(records),
            BufferUsage::Dynamic,
        )
    }
}

impl SceneNode for BlockGroup {
    fn node(&self) -> &Node {
        &self.node
    }

    fn node_mut(&mut self) -> &mut Node {
        &mut self.node
    }

    fn visit(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        parent: &Matrix4<f32>,
    ) -> Result<(), ContextError> {
        self.node.run_update();
        if !self.node.is_visible() {
            return Ok(());
        }
        self.node.apply_transform(parent);

        let mut dirty: Option<Range<usize>> = None;
        for (slot, (member, quad)) in self
            .members
            .iter_mut()
            .zip(self.vertices.chunks_exact_mut(VERTICES_PER_QUAD))
            .enumerate()
        {
            if member.visit(quad) {
                dirty = Some(match dirty {
                    Some(range) => range.start..slot + 1,
                    None => slot..slot + 1,
                });
            }
        }

        // Slots whose upload failed stay pending; members already cleared
        // their own flags.
        let dirty = merge_ranges(self.pending_upload.take(), dirty);
        if let Err(e) = self.upload_vertices(ctx, dirty.clone()) {
            self.pending_upload = dirty;
            return Err(e);
        }
        if self.structure_dirty {
            self.regenerate_indices(ctx, 0)?;
            self.structure_dirty = false;
        }
        self.render(ctx)?;
        self.node.clear_dirty();
        Ok(())
    }

    fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        ctx.release_buffer(self.vertex_buffer);
        ctx.release_buffer(self.index_buffer);
    }
}

fn merge_ranges(a: Option<Range<usize>>, b: Option<Range<usize>>) -> Option<Range<usize>> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.start.min(b.start)..a.end.max(b.end)),
        (a, b) => a.or(b),
    }
}
