//! tessera
//!
//! Batched quad rendering and TMX tile-map decoding for a small 2D scene
//! graph on top of wgpu, for native targets and the web. Many quads sharing
//! one texture are packed into a single vertex/index buffer pair and drawn
//! with one call per batch; TMX maps decode into one such batch per layer.
//!
//! High-level modules
//! - `context`: the graphics-context seam plus its wgpu and recording implementations
//! - `data_structures`: quads, blocks, block groups, textures and scene nodes
//! - `pipelines`: the textured and flat-colour quad pipelines
//! - `render`: the draw-call description batches hand to a context
//! - `resources`: asset loading, registries and the TMX decoder
//! - `logging`: logger setup
//!

pub mod context;
pub mod data_structures;
pub mod logging;
pub mod pipelines;
pub mod render;
pub mod resources;

// Re-exports commonly used types for convenience in downstream code.
pub use cgmath;
pub use wgpu;

pub use context::{GraphicsContext, gpu::WgpuContext, recording::RecordingContext};
pub use data_structures::{
    block::Block,
    block_group::{BatchError, BlockGroup, BlockGroupConfig, UploadStrategy},
    quad::{QuadVertex, Rect},
    scene_graph::{ContainerNode, Node, SceneNode},
    texture::{TextureId, TextureRef},
};
pub use resources::{
    AssetLoader, LoaderConfig,
    registry::Assets,
    tmx::{MapError, Orientation, TileMap, decode_map, load_map},
};
