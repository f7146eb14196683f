//! Engine data structures: quads, blocks, batches, textures and the scene graph.
//!
//! - `quad` is the vertex record and triangulation every batch shares
//! - `transform` holds a node's local position, rotation and scale
//! - `scene_graph` has the common node state and the traversal trait
//! - `texture` contains texture identity plus the GPU texture wrapper
//! - `block` is a single quad that writes into its group's vertex arena
//! - `block_group` batches blocks into one vertex/index buffer pair

pub mod block;
pub mod block_group;
pub mod quad;
pub mod scene_graph;
pub mod texture;
pub mod transform;
