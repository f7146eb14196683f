use cgmath::{Vector2, Vector3};

use crate::data_structures::{
    block_group::GroupId,
    quad::{QuadVertex, Rect, VERTICES_PER_QUAD},
    scene_graph::Node,
    texture::TextureRef,
};

/**
 * A `Block` is one textured (or flat-coloured) quad.
 *
 * Blocks do not own vertex memory. Once added to a
 * [`BlockGroup`](crate::data_structures::block_group::BlockGroup) they get a
 * slot, and on every traversal the group hands them the four vertex records
 * of that slot to rewrite. Only what changed since the last traversal is
 * written.
 *
 * The block's position is the centre of the quad in its group's space; its
 * size is the size of its frame.
 */
#[derive(Debug)]
pub struct Block {
    pub node: Node,
    frame: Rect,
    texture: Option<TextureRef>,
    owner: Option<GroupId>,
    slot: Option<usize>,
}

impl Block {
    /// A block that belongs to no group. Groups only accept blocks from
    /// their own `create_member`, so this is mainly useful on its own.
    pub fn new(frame: Rect, texture: Option<TextureRef>) -> Self {
        Self {
            node: Node::new(),
            frame,
            texture,
            owner: None,
            slot: None,
        }
    }

    pub(crate) fn owned_by(owner: GroupId, frame: Rect, texture: Option<TextureRef>) -> Self {
        Self {
            owner: Some(owner),
            ..Self::new(frame, texture)
        }
    }

    pub fn owner(&self) -> Option<GroupId> {
        self.owner
    }

    /// Slot in the owning group, once added.
    pub fn slot(&self) -> Option<usize> {
        self.slot
    }

    pub fn frame(&self) -> Rect {
        self.frame
    }

    /// Source rectangle in texture pixels (bottom-left origin).
    pub fn set_frame(&mut self, frame: Rect) {
        self.frame = frame;
        self.node.mark_frame_dirty();
    }

    pub fn texture(&self) -> Option<&TextureRef> {
        self.texture.as_ref()
    }

    pub fn set_texture(&mut self, texture: Option<TextureRef>) {
        self.texture = texture;
        self.node.mark_frame_dirty();
    }

    pub fn move_to(&mut self, x: f32, y: f32) {
        let z = self.node.position().z;
        self.node.set_position(Vector3::new(x, y, z));
    }

    pub(crate) fn attach(&mut self, slot: usize) {
        self.slot = Some(slot);
        self.node.mark_all_dirty();
    }

    /// Runs the update hook and rewrites the dirty parts of `quad`.
    ///
    /// Returns whether anything was written.
    pub(crate) fn visit(&mut self, quad: &mut [QuadVertex]) -> bool {
        debug_assert_eq!(quad.len(), VERTICES_PER_QUAD);
        self.node.run_update();
        if !self.node.is_dirty() {
            return false;
        }

        if self.node.is_transform_dirty() || self.node.is_frame_dirty() {
            let corners = self.corners();
            for (vertex, corner) in quad.iter_mut().zip(corners) {
                vertex.position = corner;
            }
        }
        if self.node.is_frame_dirty() {
            let tex_coords = match &self.texture {
                Some(texture) => texture.tex_coords(&self.frame),
                None => [[0.0; 2]; VERTICES_PER_QUAD],
            };
            for (vertex, uv) in quad.iter_mut().zip(tex_coords) {
                vertex.tex_coords = uv;
            }
        }
        if self.node.is_color_dirty() {
            let [r, g, b, a] = self.node.color();
            let color = [r, g, b, a * self.node.opacity()];
            quad.iter_mut().for_each(|vertex| vertex.color = color);
        }

        self.node.clear_dirty();
        true
    }

    /// Corner positions in storage order. Hidden blocks collapse to a point
    /// so they draw nothing.
    fn corners(&self) -> [[f32; 3]; VERTICES_PER_QUAD] {
        if !self.node.is_visible() {
            return [[0.0; 3]; VERTICES_PER_QUAD];
        }
        let half_w = self.frame.width / 2.0;
        let half_h = self.frame.height / 2.0;
        let transform = self.node.transform();
        [
            Vector2::new(-half_w, -half_h),
            Vector2::new(half_w, -half_h),
            Vector2::new(-half_w, half_h),
            Vector2::new(half_w, half_h),
        ]
        .map(|corner| transform.apply(corner).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_quad() -> [QuadVertex; VERTICES_PER_QUAD] {
        [QuadVertex::default(); VERTICES_PER_QUAD]
    }

    #[test]
    fn writes_corners_around_the_position() {
        let mut block = Block::new(Rect::new(0.0, 0.0, 32.0, 16.0), None);
        block.move_to(100.0, 50.0);
        let mut quad = blank_quad();

        assert!(block.visit(&mut quad));
        assert_eq!(quad[0].position, [84.0, 42.0, 0.0]);
        assert_eq!(quad[1].position, [116.0, 42.0, 0.0]);
        assert_eq!(quad[2].position, [84.0, 58.0, 0.0]);
        assert_eq!(quad[3].position, [116.0, 58.0, 0.0]);
        assert_eq!(quad[0].color, [1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn clean_block_writes_nothing() {
        let mut block = Block::new(Rect::sized(8.0, 8.0), None);
        let mut quad = blank_quad();
        assert!(block.visit(&mut quad));

        let before = quad;
        assert!(!block.visit(&mut quad));
        assert_eq!(quad, before);
    }

    #[test]
    fn color_change_leaves_geometry_alone() {
        let texture = TextureRef::new("tiles.png", 64, 64);
        let mut block = Block::new(Rect::new(0.0, 32.0, 32.0, 32.0), Some(texture));
        let mut quad = blank_quad();
        block.visit(&mut quad);

        quad[0].position = [9.0, 9.0, 9.0];
        block.node.set_color([1.0, 0.0, 0.0, 1.0]);
        block.node.set_opacity(0.5);
        assert!(block.visit(&mut quad));

        assert_eq!(quad[0].position, [9.0, 9.0, 9.0]);
        assert_eq!(quad[3].color, [1.0, 0.0, 0.0, 0.5]);
        assert_eq!(quad[3].tex_coords, [0.5, 1.0]);
    }

    #[test]
    fn hidden_block_collapses() {
        let mut block = Block::new(Rect::sized(8.0, 8.0), None);
        block.move_to(4.0, 4.0);
        let mut quad = blank_quad();
        block.visit(&mut quad);

        block.node.set_visible(false);
        assert!(block.visit(&mut quad));
        assert!(quad.iter().all(|v| v.position == [0.0; 3]));
    }
}
