//! TMX tile-map decoding.
//!
//! A map document declares one tileset (tile size, spacing, margin and the
//! tileset image) and a list of tile layers. Every layer stores its grid as
//! base64-encoded little-endian `u32` tile ids in row-major order. Each
//! non-empty cell becomes one [`Block`](crate::data_structures::block::Block)
//! in a per-layer [`BlockGroup`], so a whole layer draws in one call.
//!
//! Tile ids are 1-based; `0` marks an empty cell. Frames are measured in
//! tileset pixels from the bottom-left corner of the image.

use std::str::FromStr;

use base64::{Engine, engine::general_purpose};
use cgmath::{Matrix4, Vector3};
use log::{debug, info};
use roxmltree::Node as XmlNode;
use thiserror::Error;

use crate::{
    context::{ContextError, GraphicsContext},
    data_structures::{
        block_group::{BatchError, BlockGroup},
        quad::Rect,
        scene_graph::{Node, SceneNode},
        texture::TextureRef,
    },
    resources::{
        AssetLoader,
        registry::{Assets, TextureRegistry},
        resolve_relative,
    },
};

#[derive(Debug, Error)]
pub enum MapError {
    #[error("unsupported layer encoding {0:?}, only base64 is supported")]
    UnsupportedEncoding(String),
    #[error("unsupported layer compression {0:?}")]
    UnsupportedCompression(String),
    #[error("layer {0:?} has no data")]
    MissingLayerData(String),
    #[error("unsupported map orientation {0:?}")]
    UnsupportedOrientation(String),
    #[error("map declares no tileset")]
    MissingTileset,
    #[error("document has no <{0}> element")]
    MissingElement(&'static str),
    #[error("<{element}> is missing the {attribute} attribute")]
    MissingAttribute {
        element: String,
        attribute: &'static str,
    },
    #[error("<{element}> has an invalid {attribute} value {value:?}")]
    InvalidAttribute {
        element: String,
        attribute: &'static str,
        value: String,
    },
    #[error("layer {layer:?} holds {actual} bytes of tile data, expected {expected}")]
    LayerSizeMismatch {
        layer: String,
        expected: usize,
        actual: usize,
    },
    #[error("malformed map document: {0}")]
    Xml(#[from] roxmltree::Error),
    #[error("malformed layer data: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("could not fetch {path}: {reason}")]
    Fetch { path: String, reason: String },
    #[error(transparent)]
    Batch(#[from] BatchError),
}

impl From<ContextError> for MapError {
    fn from(e: ContextError) -> Self {
        MapError::Batch(e.into())
    }
}

/// Projection from grid cells to world positions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Orientation {
    Orthogonal,
    Isometric,
}

impl FromStr for Orientation {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "orthogonal" => Ok(Orientation::Orthogonal),
            "isometric" => Ok(Orientation::Isometric),
            other => Err(MapError::UnsupportedOrientation(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct TilesetInfo {
    pub name: String,
    pub tile_width: u32,
    pub tile_height: u32,
    pub spacing: u32,
    pub margin: u32,
    /// Image path, relative to the asset root.
    pub image: String,
    pub image_width: u32,
    pub image_height: u32,
}

impl TilesetInfo {
    /// Number of tiles in one row of the tileset image, `None` when the
    /// attribute values overflow.
    pub fn tiles_per_row(&self) -> Option<u32> {
        let usable = self
            .image_width
            .checked_add(self.spacing)?
            .saturating_sub(self.margin.checked_mul(2)?);
        let stride = self.tile_width.checked_add(self.spacing)?;
        Some(usable / stride.max(1))
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct MapInfo {
    pub orientation: Orientation,
    /// Map size in cells.
    pub columns: u32,
    pub rows: u32,
    /// Size of one grid cell in world units.
    pub tile_width: u32,
    pub tile_height: u32,
    pub tileset: TilesetInfo,
}

/// One decoded tile layer and the batch that draws it.
pub struct TileLayer {
    name: String,
    columns: u32,
    rows: u32,
    tiles: Vec<u32>,
    group: BlockGroup,
}

impl TileLayer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> (u32, u32) {
        (self.columns, self.rows)
    }

    /// Stored tile id at a cell (0 when empty).
    pub fn tile_id(&self, column: u32, row: u32) -> Option<u32> {
        if column >= self.columns || row >= self.rows {
            return None;
        }
        self.tiles.get((row * self.columns + column) as usize).copied()
    }

    pub fn tiles(&self) -> &[u32] {
        &self.tiles
    }

    pub fn group(&self) -> &BlockGroup {
        &self.group
    }

    pub fn group_mut(&mut self) -> &mut BlockGroup {
        &mut self.group
    }
}

/// A decoded map: one [`BlockGroup`] per layer, drawn in document order.
pub struct TileMap {
    pub node: Node,
    info: MapInfo,
    texture: TextureRef,
    layers: Vec<TileLayer>,
}

impl TileMap {
    pub fn info(&self) -> &MapInfo {
        &self.info
    }

    pub fn texture(&self) -> &TextureRef {
        &self.texture
    }

    pub fn layers(&self) -> &[TileLayer] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut [TileLayer] {
        &mut self.layers
    }

    pub fn layer(&self, name: &str) -> Option<&TileLayer> {
        self.layers.iter().find(|layer| layer.name == name)
    }

    pub fn layer_mut(&mut self, name: &str) -> Option<&mut TileLayer> {
        self.layers.iter_mut().find(|layer| layer.name == name)
    }
}

impl SceneNode for TileMap {
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
        for layer in self.layers.iter_mut() {
            layer.group.visit(ctx, &model_view)?;
        }
        self.node.clear_dirty();
        Ok(())
    }

    fn release(&mut self, ctx: &mut dyn GraphicsContext) {
        self.layers
            .iter_mut()
            .for_each(|layer| layer.group.release(ctx));
    }
}

/// Zero-based tileset index of a stored tile id, `None` for empty cells.
pub fn tile_index(gid: u32) -> Option<u32> {
    gid.checked_sub(1)
}

/// Source rectangle of tile `index` in the tileset image, bottom-left origin.
///
/// Tiles are laid out left to right, top to bottom.
pub fn tile_frame(tileset: &TilesetInfo, index: u32) -> Rect {
    let per_row = tileset.tiles_per_row().unwrap_or(1).max(1);
    let column = (index % per_row) as f32;
    let row = (index / per_row) as f32;
    let (tw, th) = (tileset.tile_width as f32, tileset.tile_height as f32);
    let (spacing, margin) = (tileset.spacing as f32, tileset.margin as f32);
    let x = column * (tw + spacing) + margin;
    let y = (tileset.image_height as f32 - th - margin - spacing) - row * (th + spacing) + margin;
    Rect::new(x, y, tw, th)
}

/// World position of the centre of the tile at (`column`, `row`).
///
/// Row 0 is the top row of the map; world y grows upwards.
pub fn tile_position(info: &MapInfo, column: u32, row: u32) -> (f32, f32) {
    let (col, row) = (column as f32, row as f32);
    let (cols, rows) = (info.columns as f32, info.rows as f32);
    let (map_w, map_h) = (info.tile_width as f32, info.tile_height as f32);
    let half_w = info.tileset.tile_width as f32 / 2.0;
    let half_h = info.tileset.tile_height as f32 / 2.0;
    match info.orientation {
        Orientation::Orthogonal => (col * map_w + half_w, (rows - row - 1.0) * map_h + half_h),
        Orientation::Isometric => (
            map_w / 2.0 * (cols + col - row - 1.0) + half_w,
            map_h / 2.0 * ((rows * 2.0 - col - row) - 2.0) + half_h,
        ),
    }
}

/// The raw `<data>` block of a layer.
#[derive(Clone, Copy, Debug)]
pub struct LayerData<'a> {
    pub layer: &'a str,
    pub encoding: Option<&'a str>,
    pub compression: Option<&'a str>,
    pub payload: &'a str,
}

/// Decodes a layer grid of `columns × rows` stored tile ids.
pub fn decode_layer_data(data: &LayerData<'_>, columns: u32, rows: u32) -> Result<Vec<u32>, MapError> {
    match data.encoding {
        Some("base64") => {}
        other => {
            return Err(MapError::UnsupportedEncoding(
                other.unwrap_or("xml").to_string(),
            ));
        }
    }
    if let Some(compression) = data.compression {
        return Err(MapError::UnsupportedCompression(compression.to_string()));
    }

    let compact: String = data
        .payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    let bytes = general_purpose::STANDARD.decode(compact)?;
    let expected = columns as usize * rows as usize * 4;
    if bytes.len() != expected {
        return Err(MapError::LayerSizeMismatch {
            layer: data.layer.to_string(),
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn element_name(node: XmlNode<'_, '_>) -> String {
    node.tag_name().name().to_string()
}

fn required<'a>(node: XmlNode<'a, '_>, attribute: &'static str) -> Result<&'a str, MapError> {
    node.attribute(attribute)
        .ok_or_else(|| MapError::MissingAttribute {
            element: element_name(node),
            attribute,
        })
}

fn parse_value<T: FromStr>(
    node: XmlNode<'_, '_>,
    attribute: &'static str,
    value: &str,
) -> Result<T, MapError> {
    value.trim().parse().map_err(|_| MapError::InvalidAttribute {
        element: element_name(node),
        attribute,
        value: value.to_string(),
    })
}

fn parse_required<T: FromStr>(node: XmlNode<'_, '_>, attribute: &'static str) -> Result<T, MapError> {
    parse_value(node, attribute, required(node, attribute)?)
}

fn parse_or<T: FromStr>(node: XmlNode<'_, '_>, attribute: &'static str, default: T) -> Result<T, MapError> {
    match node.attribute(attribute) {
        Some(value) => parse_value(node, attribute, value),
        None => Ok(default),
    }
}

fn child<'a, 'input>(node: XmlNode<'a, 'input>, tag: &str) -> Option<XmlNode<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn parse_tileset(map_path: &str, tileset: XmlNode<'_, '_>) -> Result<TilesetInfo, MapError> {
    let image = child(tileset, "image").ok_or(MapError::MissingElement("image"))?;
    let info = TilesetInfo {
        name: tileset.attribute("name").unwrap_or_default().to_string(),
        tile_width: parse_required(tileset, "tilewidth")?,
        tile_height: parse_required(tileset, "tileheight")?,
        spacing: parse_or(tileset, "spacing", 0)?,
        margin: parse_or(tileset, "margin", 0)?,
        image: resolve_relative(map_path, required(image, "source")?),
        image_width: parse_required(image, "width")?,
        image_height: parse_required(image, "height")?,
    };
    match info.tiles_per_row() {
        Some(0) => Err(MapError::InvalidAttribute {
            element: "image".to_string(),
            attribute: "width",
            value: info.image_width.to_string(),
        }),
        Some(_) => Ok(info),
        None if info.margin.checked_mul(2).is_none() => Err(MapError::InvalidAttribute {
            element: element_name(tileset),
            attribute: "margin",
            value: info.margin.to_string(),
        }),
        None => Err(MapError::InvalidAttribute {
            element: element_name(tileset),
            attribute: "spacing",
            value: info.spacing.to_string(),
        }),
    }
}

fn parse_map_info(map_path: &str, map: XmlNode<'_, '_>) -> Result<MapInfo, MapError> {
    let orientation: Orientation = required(map, "orientation")?.parse()?;
    let tileset = map
        .descendants()
        .find(|n| n.has_tag_name("tileset"))
        .ok_or(MapError::MissingTileset)?;
    Ok(MapInfo {
        orientation,
        columns: parse_or(map, "width", 0)?,
        rows: parse_or(map, "height", 0)?,
        tile_width: parse_required(map, "tilewidth")?,
        tile_height: parse_required(map, "tileheight")?,
        tileset: parse_tileset(map_path, tileset)?,
    })
}

fn decode_layer(
    layer: XmlNode<'_, '_>,
    info: &MapInfo,
    texture: &TextureRef,
    ctx: &mut dyn GraphicsContext,
) -> Result<TileLayer, MapError> {
    let name = layer.attribute("name").unwrap_or_default().to_string();
    let columns: u32 = parse_required(layer, "width")?;
    let rows: u32 = parse_required(layer, "height")?;
    let data = child(layer, "data").ok_or_else(|| MapError::MissingLayerData(name.clone()))?;
    let tiles = decode_layer_data(
        &LayerData {
            layer: &name,
            encoding: data.attribute("encoding"),
            compression: data.attribute("compression"),
            payload: data.text().unwrap_or_default(),
        },
        columns,
        rows,
    )?;

    // Positions use the layer's own grid.
    let grid = MapInfo {
        columns,
        rows,
        ..info.clone()
    };
    let occupied = tiles.iter().filter(|&&gid| tile_index(gid).is_some()).count();
    let mut group = BlockGroup::new(ctx, Some(texture.clone()), Some(occupied.max(1)))?;
    group.node.set_visible(parse_or::<u8>(layer, "visible", 1)? != 0);
    group.node.set_opacity(parse_or(layer, "opacity", 1.0)?);

    for (cell, &gid) in tiles.iter().enumerate() {
        let Some(index) = tile_index(gid) else {
            continue;
        };
        let column = cell as u32 % columns;
        let row = cell as u32 / columns;
        let (x, y) = tile_position(&grid, column, row);
        let mut block = group.create_member(tile_frame(&info.tileset, index));
        block.node.set_position(Vector3::new(x, y, 0.0));
        if let Err(e) = group.add_member(block) {
            group.release(ctx);
            return Err(e.into());
        }
    }
    debug!("decoded layer {name:?}: {occupied} of {} cells", tiles.len());

    Ok(TileLayer {
        name,
        columns,
        rows,
        tiles,
        group,
    })
}

/// Decodes a map document loaded from `path`.
///
/// Nothing is published: on success the tileset texture is requested and
/// the map returned; on failure every buffer created so far is released.
pub fn decode_map(
    path: &str,
    xml: &str,
    ctx: &mut dyn GraphicsContext,
    textures: &mut TextureRegistry,
) -> Result<TileMap, MapError> {
    // Tiled writes a DOCTYPE line into its maps.
    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let doc = roxmltree::Document::parse_with_options(xml, options)?;
    let map = doc
        .descendants()
        .find(|n| n.has_tag_name("map"))
        .ok_or(MapError::MissingElement("map"))?;
    let info = parse_map_info(path, map)?;
    let tileset = &info.tileset;
    let texture = TextureRef::new(&tileset.image, tileset.image_width, tileset.image_height);

    let mut layers: Vec<TileLayer> = Vec::new();
    for layer in map.descendants().filter(|n| n.has_tag_name("layer")) {
        match decode_layer(layer, &info, &texture, ctx) {
            Ok(layer) => layers.push(layer),
            Err(e) => {
                layers
                    .iter_mut()
                    .for_each(|layer| layer.group.release(ctx));
                return Err(e);
            }
        }
    }

    let texture = textures.request(&tileset.image, tileset.image_width, tileset.image_height);
    Ok(TileMap {
        node: Node::new(),
        info,
        texture,
        layers,
    })
}

/// Fetches, decodes and registers the map at `path`.
///
/// Returns `false` without fetching if the path is already registered.
pub async fn load_map(
    path: &str,
    loader: &AssetLoader,
    assets: &mut Assets,
    ctx: &mut dyn GraphicsContext,
) -> Result<bool, MapError> {
    if assets.maps.contains(path) {
        debug!("map {path} already loaded");
        return Ok(false);
    }
    let xml = loader
        .load_string(path)
        .await
        .map_err(|e| MapError::Fetch {
            path: path.to_string(),
            reason: format!("{e:#}"),
        })?;
    let map = decode_map(path, &xml, ctx, &mut assets.textures)?;
    info!(
        "map {path} registered: {} layer(s), {} tiles",
        map.layers().len(),
        map.layers().iter().map(|l| l.group().len()).sum::<usize>()
    );
    if let Some(mut replaced) = assets.maps.insert(path, map) {
        replaced.release(ctx);
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use cgmath::SquareMatrix;

    use super::*;
    use crate::context::recording::RecordingContext;

    fn tileset(image_width: u32, image_height: u32, tile: u32) -> TilesetInfo {
        TilesetInfo {
            name: "tiles".to_string(),
            tile_width: tile,
            tile_height: tile,
            spacing: 0,
            margin: 0,
            image: "tiles.png".to_string(),
            image_width,
            image_height,
        }
    }

    fn info(orientation: Orientation, columns: u32, rows: u32, tile: u32) -> MapInfo {
        MapInfo {
            orientation,
            columns,
            rows,
            tile_width: tile,
            tile_height: tile,
            tileset: tileset(128, 128, tile),
        }
    }

    fn encode(ids: &[u32]) -> String {
        let bytes: Vec<u8> = ids.iter().flat_map(|id| id.to_le_bytes()).collect();
        general_purpose::STANDARD.encode(bytes)
    }

    fn document(orientation: &str, data: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<map version="1.0" orientation="{orientation}" width="2" height="2" tilewidth="32" tileheight="32">
 <tileset firstgid="1" name="tiles" tilewidth="32" tileheight="32">
  <image source="tiles.png" width="128" height="128"/>
 </tileset>
 <layer name="ground" width="2" height="2">
  {data}
 </layer>
</map>"#
        )
    }

    #[test]
    fn stored_zero_is_empty() {
        assert_eq!(tile_index(0), None);
        assert_eq!(tile_index(1), Some(0));
        assert_eq!(tile_index(5), Some(4));
    }

    #[test]
    fn orientation_names() {
        assert_eq!("orthogonal".parse::<Orientation>().unwrap(), Orientation::Orthogonal);
        assert_eq!("isometric".parse::<Orientation>().unwrap(), Orientation::Isometric);
        assert!(matches!(
            "hexagonal".parse::<Orientation>(),
            Err(MapError::UnsupportedOrientation(o)) if o == "hexagonal"
        ));
    }

    #[test]
    fn orthogonal_position() {
        let map = info(Orientation::Orthogonal, 4, 3, 16);
        assert_eq!(tile_position(&map, 1, 2), (24.0, 8.0));
        assert_eq!(tile_position(&map, 0, 0), (8.0, 40.0));
    }

    #[test]
    fn isometric_position() {
        let map = info(Orientation::Isometric, 4, 3, 16);
        assert_eq!(tile_position(&map, 1, 2), (24.0, 16.0));
        assert_eq!(tile_position(&map, 0, 0), (32.0, 40.0));
    }

    #[test]
    fn frames_walk_the_tileset_from_the_top() {
        let set = tileset(128, 128, 32);
        assert_eq!(set.tiles_per_row(), Some(4));
        assert_eq!(tile_frame(&set, 0), Rect::new(0.0, 96.0, 32.0, 32.0));
        assert_eq!(tile_frame(&set, 3), Rect::new(96.0, 96.0, 32.0, 32.0));
        assert_eq!(tile_frame(&set, 4), Rect::new(0.0, 64.0, 32.0, 32.0));
    }

    #[test]
    fn frames_honour_spacing_and_margin() {
        let set = TilesetInfo {
            spacing: 2,
            margin: 1,
            ..tileset(70, 70, 16)
        };
        // (70 - 2 + 2) / 18
        assert_eq!(set.tiles_per_row(), Some(3));
        assert_eq!(tile_frame(&set, 0), Rect::new(1.0, 52.0, 16.0, 16.0));
        assert_eq!(tile_frame(&set, 4), Rect::new(19.0, 34.0, 16.0, 16.0));
    }

    #[test]
    fn overflowing_tileset_attributes_are_rejected() {
        let set = TilesetInfo {
            spacing: u32::MAX,
            ..tileset(64, 64, 32)
        };
        assert_eq!(set.tiles_per_row(), None);
        assert_eq!(tile_frame(&set, 1).width, 32.0);

        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let data = format!(r#"<data encoding="base64">{}</data>"#, encode(&[1, 1, 1, 1]));
        for (attribute, tileset) in [
            ("spacing", r#"<tileset tilewidth="32" tileheight="32" spacing="4294967295">"#),
            ("margin", r#"<tileset tilewidth="32" tileheight="32" margin="4294967295">"#),
        ] {
            let xml = document("orthogonal", &data).replace(
                r#"<tileset firstgid="1" name="tiles" tilewidth="32" tileheight="32">"#,
                tileset,
            );
            let err = decode_map("m.tmx", &xml, &mut ctx, &mut textures).err();
            assert!(
                matches!(err, Some(MapError::InvalidAttribute { attribute: a, .. }) if a == attribute),
                "{attribute}: {err:?}"
            );
        }
        assert!(textures.is_empty());
        assert_eq!(ctx.live_buffers(), 0);
    }

    #[test]
    fn accepts_the_tiled_doctype() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let data = format!(r#"<data encoding="base64">{}</data>"#, encode(&[1, 0, 0, 1]));
        let xml = document("orthogonal", &data).replacen(
            "\n<map",
            "\n<!DOCTYPE map SYSTEM \"http://mapeditor.org/dtd/1.0/map.dtd\">\n<map",
            1,
        );
        assert!(xml.contains("<!DOCTYPE map"));
        let map = decode_map("m.tmx", &xml, &mut ctx, &mut textures).unwrap();
        assert_eq!(map.layer("ground").unwrap().group().len(), 2);
    }

    #[test]
    fn layer_payload_is_little_endian_row_major() {
        let payload = format!("\n   {}\n  ", encode(&[1, 2, 0, 5]));
        let data = LayerData {
            layer: "ground",
            encoding: Some("base64"),
            compression: None,
            payload: &payload,
        };
        assert_eq!(decode_layer_data(&data, 2, 2).unwrap(), vec![1, 2, 0, 5]);
    }

    #[test]
    fn layer_payload_must_fill_the_grid() {
        let payload = encode(&[1, 2, 3]);
        let data = LayerData {
            layer: "ground",
            encoding: Some("base64"),
            compression: None,
            payload: &payload,
        };
        assert!(matches!(
            decode_layer_data(&data, 2, 2),
            Err(MapError::LayerSizeMismatch { expected: 16, actual: 12, .. })
        ));
    }

    #[test]
    fn decodes_positions_and_skips_empty_cells() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let data = format!(r#"<data encoding="base64">{}</data>"#, encode(&[1, 2, 0, 5]));
        let map = decode_map("maps/test.tmx", &document("orthogonal", &data), &mut ctx, &mut textures)
            .unwrap();

        assert_eq!(map.info().orientation, Orientation::Orthogonal);
        assert_eq!(map.texture().id.as_str(), "maps/tiles.png");
        assert!(textures.is_requested("maps/tiles.png"));

        let layer = map.layer("ground").unwrap();
        assert_eq!(layer.size(), (2, 2));
        assert_eq!(layer.tile_id(0, 1), Some(0));
        assert_eq!(layer.group().len(), 3);
        assert_eq!(layer.group().capacity(), 3);

        let positions: Vec<_> = layer
            .group()
            .members()
            .iter()
            .map(|b| (b.node.position().x, b.node.position().y))
            .collect();
        assert_eq!(positions, vec![(16.0, 48.0), (48.0, 48.0), (48.0, 16.0)]);
        assert_eq!(
            layer.group().member(2).unwrap().frame(),
            Rect::new(0.0, 64.0, 32.0, 32.0)
        );
    }

    #[test]
    fn rejects_other_encodings() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let xml = document("orthogonal", r#"<data encoding="csv">1,2,0,5</data>"#);
        assert!(matches!(
            decode_map("m.tmx", &xml, &mut ctx, &mut textures),
            Err(MapError::UnsupportedEncoding(e)) if e == "csv"
        ));
        assert!(textures.is_empty());
        assert_eq!(ctx.live_buffers(), 0);
    }

    #[test]
    fn rejects_compressed_layers() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let xml = document(
            "orthogonal",
            r#"<data encoding="base64" compression="zlib">eJxjZGBgYAAAAAQAAQ==</data>"#,
        );
        assert!(matches!(
            decode_map("m.tmx", &xml, &mut ctx, &mut textures),
            Err(MapError::UnsupportedCompression(c)) if c == "zlib"
        ));
    }

    #[test]
    fn rejects_layers_without_data() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let xml = document("orthogonal", "");
        assert!(matches!(
            decode_map("m.tmx", &xml, &mut ctx, &mut textures),
            Err(MapError::MissingLayerData(name)) if name == "ground"
        ));
    }

    #[test]
    fn rejects_unknown_orientation_before_any_layer() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let data = format!(r#"<data encoding="base64">{}</data>"#, encode(&[1, 1, 1, 1]));
        assert!(matches!(
            decode_map("m.tmx", &document("staggered", &data), &mut ctx, &mut textures),
            Err(MapError::UnsupportedOrientation(_))
        ));
        assert!(ctx.commands().is_empty());
    }

    #[test]
    fn failed_layer_releases_earlier_layers() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let good = encode(&[1, 1, 1, 1]);
        let xml = format!(
            r#"<map orientation="orthogonal" width="2" height="2" tilewidth="32" tileheight="32">
 <tileset tilewidth="32" tileheight="32"><image source="t.png" width="64" height="64"/></tileset>
 <layer name="a" width="2" height="2"><data encoding="base64">{good}</data></layer>
 <layer name="b" width="2" height="2"><data encoding="base64" compression="gzip">{good}</data></layer>
</map>"#
        );
        assert!(decode_map("m.tmx", &xml, &mut ctx, &mut textures).is_err());
        assert_eq!(ctx.live_buffers(), 0);
    }

    #[test]
    fn missing_tileset_is_reported() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let xml = r#"<map orientation="orthogonal" tilewidth="32" tileheight="32"/>"#;
        assert!(matches!(
            decode_map("m.tmx", xml, &mut ctx, &mut textures),
            Err(MapError::MissingTileset)
        ));
    }

    #[test]
    fn map_traversal_draws_every_layer() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let data = format!(r#"<data encoding="base64">{}</data>"#, encode(&[1, 2, 3, 4]));
        let mut map =
            decode_map("m.tmx", &document("isometric", &data), &mut ctx, &mut textures).unwrap();
        ctx.clear_commands();

        map.visit(&mut ctx, &Matrix4::identity()).unwrap();
        let draws: Vec<_> = ctx.draws().collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, 24);
        assert_eq!(draws[0].texture.as_ref().map(|t| t.as_str()), Some("tiles.png"));
    }

    #[test]
    fn hidden_layers_stay_hidden() {
        let mut ctx = RecordingContext::new();
        let mut textures = TextureRegistry::new();
        let data = encode(&[1, 0, 0, 1]);
        let xml = format!(
            r#"<map orientation="orthogonal" width="2" height="2" tilewidth="32" tileheight="32">
 <tileset tilewidth="32" tileheight="32"><image source="t.png" width="64" height="64"/></tileset>
 <layer name="shown" width="2" height="2"><data encoding="base64">{data}</data></layer>
 <layer name="hidden" width="2" height="2" visible="0" opacity="0.5"><data encoding="base64">{data}</data></layer>
</map>"#
        );
        let mut map = decode_map("m.tmx", &xml, &mut ctx, &mut textures).unwrap();
        let hidden = map.layer("hidden").unwrap().group();
        assert!(!hidden.node.is_visible());
        assert_eq!(hidden.node.opacity(), 0.5);

        ctx.clear_commands();
        map.visit(&mut ctx, &Matrix4::identity()).unwrap();
        assert_eq!(ctx.draws().count(), 1);
    }
}
