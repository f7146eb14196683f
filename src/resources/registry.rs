//! Process-wide asset registries.
//!
//! One [`Assets`] value is built at startup and passed by reference to
//! whatever loads or looks up assets. Nothing here is global: dropping or
//! tearing down the value is the end of every registered asset.

use std::collections::{BTreeMap, HashMap};

use log::{debug, warn};

use crate::{
    context::GraphicsContext,
    data_structures::{
        scene_graph::SceneNode,
        texture::{TextureId, TextureRef},
    },
    resources::tmx::TileMap,
};

/// Textures that have been asked for, with their declared pixel size.
///
/// Requesting only records the texture; a graphics context loads the
/// pixels later (see `WgpuContext::load_textures`).
#[derive(Debug, Default)]
pub struct TextureRegistry {
    textures: BTreeMap<TextureId, TextureRef>,
}

impl TextureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a request for `path` and returns its reference. Repeated
    /// requests return the first registration.
    pub fn request(&mut self, path: &str, width: u32, height: u32) -> TextureRef {
        if let Some(existing) = self.textures.get(path) {
            if (existing.width, existing.height) != (width, height) {
                warn!(
                    "texture {path} requested as {width}x{height}, keeping {}x{}",
                    existing.width, existing.height
                );
            }
            return existing.clone();
        }
        debug!("texture requested: {path} ({width}x{height})");
        let texture = TextureRef::new(path, width, height);
        self.textures.insert(texture.id.clone(), texture.clone());
        texture
    }

    pub fn get(&self, path: &str) -> Option<&TextureRef> {
        self.textures.get(path)
    }

    pub fn is_requested(&self, path: &str) -> bool {
        self.textures.contains_key(path)
    }

    pub fn requested(&self) -> impl Iterator<Item = &TextureRef> {
        self.textures.values()
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }
}

/// Decoded maps keyed by the path they were loaded from.
#[derive(Default)]
pub struct MapRegistry {
    maps: HashMap<String, TileMap>,
}

impl MapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.maps.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&TileMap> {
        self.maps.get(path)
    }

    pub fn get_mut(&mut self, path: &str) -> Option<&mut TileMap> {
        self.maps.get_mut(path)
    }

    /// Registers `map` under `path`, replacing (and returning) any previous
    /// map there. The caller owns the GPU buffers of a returned map.
    pub fn insert(&mut self, path: &str, map: TileMap) -> Option<TileMap> {
        self.maps.insert(path.to_string(), map)
    }

    pub fn remove(&mut self, path: &str) -> Option<TileMap> {
        self.maps.remove(path)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.maps.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }

    /// Unregisters every map and releases its buffers.
    pub fn clear(&mut self, ctx: &mut dyn GraphicsContext) {
        for (path, mut map) in self.maps.drain() {
            debug!("releasing map {path}");
            map.release(ctx);
        }
    }
}

#[derive(Default)]
pub struct Assets {
    pub textures: TextureRegistry,
    pub maps: MapRegistry,
}

impl Assets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Releases every registered map and forgets all texture requests.
    pub fn teardown(&mut self, ctx: &mut dyn GraphicsContext) {
        self.maps.clear(ctx);
        self.textures = TextureRegistry::new();
    }
}
