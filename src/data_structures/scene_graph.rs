//! Scene graph and hierarchical scene organization.
//!
//! Every entity in the scene embeds a [`Node`] that carries its local
//! transform, visibility, colour and opacity plus the dirty flags batches use
//! to decide what to rewrite. Entities expose the node through the
//! [`SceneNode`] trait, whose `visit` is the per-frame depth-first traversal.

use std::fmt;

use cgmath::{Matrix4, Rad, SquareMatrix, Vector2, Vector3};

use crate::{
    context::{ContextError, GraphicsContext},
    data_structures::transform::Transform,
};

/// Per-frame hook run at the start of a node's traversal.
pub type UpdateFn = Box<dyn FnMut(&mut Node)>;

/// State shared by every scene entity.
pub struct Node {
    transform: Transform,
    visible: bool,
    color: [f32; 4],
    opacity: f32,
    frame_dirty: bool,
    color_dirty: bool,
    transform_dirty: bool,
    model_view: Matrix4<f32>,
    update: Option<UpdateFn>,
}

impl Node {
    pub fn new() -> Self {
        Self {
            transform: Transform::new(),
            visible: true,
            color: [1.0, 1.0, 1.0, 1.0],
            opacity: 1.0,
            frame_dirty: true,
            color_dirty: true,
            transform_dirty: true,
            model_view: Matrix4::identity(),
            update: None,
        }
    }

    pub fn at(position: Vector3<f32>) -> Self {
        let mut node = Self::new();
        node.transform = position.into();
        node
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.transform = transform;
        self.transform_dirty = true;
    }

    pub fn position(&self) -> Vector3<f32> {
        self.transform.position
    }

    pub fn set_position(&mut self, position: Vector3<f32>) {
        self.transform.position = position;
        self.transform_dirty = true;
    }

    pub fn set_rotation(&mut self, rotation: Rad<f32>) {
        self.transform.rotation = rotation;
        self.transform_dirty = true;
    }

    pub fn set_scale(&mut self, scale: Vector2<f32>) {
        self.transform.scale = scale;
        self.transform_dirty = true;
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Hiding a quad collapses its geometry, so visibility counts as a
    /// transform change.
    pub fn set_visible(&mut self, visible: bool) {
        if self.visible != visible {
            self.visible = visible;
            self.transform_dirty = true;
        }
    }

    pub fn color(&self) -> [f32; 4] {
        self.color
    }

    pub fn set_color(&mut self, color: [f32; 4]) {
        self.color = color;
        self.color_dirty = true;
    }

    pub fn opacity(&self) -> f32 {
        self.opacity
    }

    pub fn set_opacity(&mut self, opacity: f32) {
        self.opacity = opacity.clamp(0.0, 1.0);
        self.color_dirty = true;
    }

    pub fn mark_frame_dirty(&mut self) {
        self.frame_dirty = true;
    }

    pub fn mark_all_dirty(&mut self) {
        self.frame_dirty = true;
        self.color_dirty = true;
        self.transform_dirty = true;
    }

    pub fn is_frame_dirty(&self) -> bool {
        self.frame_dirty
    }

    pub fn is_color_dirty(&self) -> bool {
        self.color_dirty
    }

    pub fn is_transform_dirty(&self) -> bool {
        self.transform_dirty
    }

    pub fn is_dirty(&self) -> bool {
        self.frame_dirty || self.color_dirty || self.transform_dirty
    }

    pub fn clear_dirty(&mut self) {
        self.frame_dirty = false;
        self.color_dirty = false;
        self.transform_dirty = false;
    }

    /// Model-view matrix computed by the last [`Node::apply_transform`].
    pub fn model_view(&self) -> Matrix4<f32> {
        self.model_view
    }

    /// Composes the local transform with the parent's model-view matrix.
    pub fn apply_transform(&mut self, parent: &Matrix4<f32>) -> Matrix4<f32> {
        self.model_view = parent * self.transform.to_matrix();
        self.model_view
    }

    pub fn set_update(&mut self, update: impl FnMut(&mut Node) + 'static) {
        self.update = Some(Box::new(update));
    }

    pub fn clear_update(&mut self) {
        self.update = None;
    }

    /// Runs the frame-update hook if one is installed.
    ///
    /// The hook may replace itself through [`Node::set_update`].
    pub fn run_update(&mut self) {
        if let Some(mut update) = self.update.take() {
            update(self);
            if self.update.is_none() {
                self.update = Some(update);
            }
        }
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("transform", &self.transform)
            .field("visible", &self.visible)
            .field("color", &self.color)
            .field("opacity", &self.opacity)
            .field("frame_dirty", &self.frame_dirty)
            .field("color_dirty", &self.color_dirty)
            .field("transform_dirty", &self.transform_dirty)
            .field("has_update", &self.update.is_some())
            .finish()
    }
}

/// Capability interface of everything that can be placed in a scene.
pub trait SceneNode {
    fn node(&self) -> &Node;

    fn node_mut(&mut self) -> &mut Node;

    /// Depth-first per-frame traversal.
    ///
    /// `parent` is the parent's model-view matrix. Implementations run the
    /// update hook, return early when invisible, apply their transform and
    /// then do their own work (visit children, upload, draw).
    fn visit(
        &mut self,
        ctx: &mut dyn GraphicsContext,
        parent: &Matrix4<f32>,
    ) -> Result<(), ContextError>;

    /// Releases GPU resources held by this node and its children.
    fn release(&mut self, _ctx: &mut dyn GraphicsContext) {}
}

/// A node that only groups and transforms its children.
#[derive(Default)]
pub struct ContainerNode {
    pub node: Node,
    children: Vec<Box<dyn SceneNode>>,
}

impl ContainerNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&mut self, child: Box<dyn SceneNode>) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[Box<dyn SceneNode>] {
        &self.children
    }

    pub fn children_mut(&mut self) -> &mut Vec<Box<dyn SceneNode>> {
        &mut self.children
    }
}

impl SceneNode for ContainerNode {
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
        let model_view = self.node.apply_transform(parent);
        for child in self.children.iter_mut() {
            child.visit(ctx, &model_view)?;
        }
        self.node.clear_dirty();
        Ok(())
    }

    fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        self.children.iter_mut().for_each(|child| child.release(ctx));
    }
}
