use std::path::PathBuf;

use base64::{Engine, engine::general_purpose};
use tessera::{AssetLoader, LoaderConfig};

/// Routes log output through the test harness. Safe to call from every test.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A loader rooted at this crate's `assets/` directory.
pub fn asset_loader() -> AssetLoader {
    AssetLoader::new(LoaderConfig {
        asset_root: PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("assets"),
    })
}

/// Base64 layer payload for the given stored tile ids.
pub fn encode_layer(ids: &[u32]) -> String {
    let bytes: Vec<u8> = ids.iter().flat_map(|id| id.to_le_bytes()).collect();
    general_purpose::STANDARD.encode(bytes)
}

/// Builds small TMX documents for decoder tests.
pub struct TmxBuilder {
    orientation: String,
    columns: u32,
    rows: u32,
    map_tile: (u32, u32),
    tile: (u32, u32),
    spacing: u32,
    margin: u32,
    image: (String, u32, u32),
    layers: Vec<String>,
}

impl TmxBuilder {
    pub fn new(orientation: &str, columns: u32, rows: u32) -> Self {
        Self {
            orientation: orientation.to_string(),
            columns,
            rows,
            map_tile: (32, 32),
            tile: (32, 32),
            spacing: 0,
            margin: 0,
            image: ("tiles.png".to_string(), 128, 128),
            layers: Vec::new(),
        }
    }

    pub fn map_tile(mut self, width: u32, height: u32) -> Self {
        self.map_tile = (width, height);
        self
    }

    pub fn tile(mut self, width: u32, height: u32) -> Self {
        self.tile = (width, height);
        self
    }

    pub fn spacing(mut self, spacing: u32, margin: u32) -> Self {
        self.spacing = spacing;
        self.margin = margin;
        self
    }

    pub fn image(mut self, source: &str, width: u32, height: u32) -> Self {
        self.image = (source.to_string(), width, height);
        self
    }

    /// Adds a base64 layer covering the whole map.
    pub fn layer(self, name: &str, ids: &[u32]) -> Self {
        let data = format!(r#"<data encoding="base64">{}</data>"#, encode_layer(ids));
        self.raw_layer(name, &data)
    }

    /// Adds a layer with a hand-written `<data>` element.
    pub fn raw_layer(mut self, name: &str, data: &str) -> Self {
        self.layers.push(format!(
            r#" <layer name="{name}" width="{}" height="{}">{data}</layer>"#,
            self.columns, self.rows
        ));
        self
    }

    pub fn build(&self) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.0" orientation="{}" width="{}" height="{}" tilewidth="{}" tileheight="{}">
 <tileset firstgid="1" name="tiles" tilewidth="{}" tileheight="{}" spacing="{}" margin="{}">
  <image source="{}" width="{}" height="{}"/>
 </tileset>
{}
</map>"#,
            self.orientation,
            self.columns,
            self.rows,
            self.map_tile.0,
            self.map_tile.1,
            self.tile.0,
            self.tile.1,
            self.spacing,
            self.margin,
            self.image.0,
            self.image.1,
            self.image.2,
            self.layers.join("\n"),
        )
    }
}
