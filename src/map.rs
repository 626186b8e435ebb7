// src/map.rs
use crate::error::MapError;
use crate::geometry::{CoordinateTransformer, MapDescriptor, RenderOrder};
use crate::ir_map::*;
use crate::layer_data;
use crate::loader::{json_loader, tmx_loader};
use crate::spatial::{ChunkedGrid, Grid2D, TileGid};
use crate::tile::{GidError, PlacedTile, TileInstanceBuilder};
use crate::tileset::{TilesetEntry, TilesetId, TilesetRegistry};
use log::{debug, warn};
use macroquad::math::{vec2, IVec2, Vec2};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::thread::{self, JoinHandle};

/// Knobs for [`TileMap`] loading.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Keep layers marked invisible in the file.
    pub include_hidden_layers: bool,
    /// Turn unresolved gids into [`MapError::DanglingGids`].
    pub strict_gids: bool,
    /// Directory for external tilesets when loading from a string.
    pub base_dir: Option<PathBuf>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            include_hidden_layers: true,
            strict_gids: false,
            base_dir: None,
        }
    }
}

impl LoadOptions {
    /// Reads options from a JSON object; missing fields keep their defaults.
    pub fn from_json_str(txt: &str) -> Result<Self, MapError> {
        serde_json::from_str(txt).map_err(|source| MapError::Json {
            path: PathBuf::from("<load options>"),
            source,
        })
    }
}

/// On-disk map format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MapFormat {
    Tmx,
    Json,
}

impl MapFormat {
    /// Picks the format from the file extension.
    pub fn from_path(path: &Path) -> Result<Self, MapError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("tmx") => Ok(MapFormat::Tmx),
            Some("json") | Some("tmj") => Ok(MapFormat::Json),
            _ => Err(MapError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Fields every layer kind carries.
#[derive(Debug, Clone)]
pub struct LayerCommon {
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    /// This layer's own offset; parents' offsets are already folded into
    /// tile and object positions.
    pub offset: Vec2,
    pub properties: Properties,
}

/// Placed tiles of one tile layer.
#[derive(Debug, Clone)]
pub enum TileStorage {
    Finite(Grid2D<Option<PlacedTile>>),
    Chunked(ChunkedGrid<Option<PlacedTile>>),
}

impl TileStorage {
    pub fn get(&self, coord: IVec2) -> Option<&PlacedTile> {
        match self {
            TileStorage::Finite(grid) => grid.get(coord)?.as_ref(),
            TileStorage::Chunked(chunks) => chunks.get(coord)?.as_ref(),
        }
    }

    /// Non-empty cells in storage order.
    pub fn tiles(&self) -> Box<dyn Iterator<Item = &PlacedTile> + '_> {
        match self {
            TileStorage::Finite(grid) => Box::new(grid.iter().filter_map(|(_, t)| t.as_ref())),
            TileStorage::Chunked(chunks) => Box::new(chunks.iter().filter_map(|(_, t)| t.as_ref())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TileLayer {
    pub common: LayerCommon,
    /// Declared size in tiles; chunked layers may extend past it.
    pub width: usize,
    pub height: usize,
    pub storage: TileStorage,
    /// Cells whose gid no tileset claims. They are left empty.
    pub gid_errors: Vec<GidError>,
}

impl TileLayer {
    pub fn tile_at(&self, coord: IVec2) -> Option<&PlacedTile> {
        self.storage.get(coord)
    }

    pub fn tiles(&self) -> impl Iterator<Item = &PlacedTile> + '_ {
        self.storage.tiles()
    }
}

/// Tileset lookup of a tile object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectTile {
    pub gid: TileGid,
    pub tileset: TilesetId,
    pub local_id: u32,
}

/// An object with its render-space position.
#[derive(Debug, Clone)]
pub struct MapObject {
    pub object: IrObject,
    /// Render space (y up), not floored.
    pub position: Vec2,
    /// Set for tile objects whose gid resolved.
    pub tile: Option<ObjectTile>,
}

/// A tile object whose gid no tileset claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectGidError {
    pub object_id: u32,
    pub gid: u32,
}

#[derive(Debug, Clone)]
pub struct ObjectLayer {
    pub common: LayerCommon,
    pub objects: Vec<MapObject>,
    pub gid_errors: Vec<ObjectGidError>,
}

impl ObjectLayer {
    pub fn object_by_name(&self, name: &str) -> Option<&MapObject> {
        self.objects.iter().find(|o| o.object.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ImageLayer {
    pub common: LayerCommon,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GroupLayer {
    pub common: LayerCommon,
    pub layers: Vec<Layer>,
}

#[derive(Debug, Clone)]
pub enum Layer {
    Tile(TileLayer),
    Object(ObjectLayer),
    Image(ImageLayer),
    Group(GroupLayer),
}

impl Layer {
    pub fn common(&self) -> &LayerCommon {
        match self {
            Layer::Tile(l) => &l.common,
            Layer::Object(l) => &l.common,
            Layer::Image(l) => &l.common,
            Layer::Group(l) => &l.common,
        }
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    pub fn as_tile_layer(&self) -> Option<&TileLayer> {
        match self {
            Layer::Tile(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_object_layer(&self) -> Option<&ObjectLayer> {
        match self {
            Layer::Object(l) => Some(l),
            _ => None,
        }
    }

    /// Depth-first search through groups, this layer included.
    fn find(&self, name: &str) -> Option<&Layer> {
        if self.name() == name {
            return Some(self);
        }
        match self {
            Layer::Group(g) => g.layers.iter().find_map(|l| l.find(name)),
            _ => None,
        }
    }

    fn collect_gid_errors<'a>(&'a self, out: &mut Vec<(&'a str, GidError)>) {
        match self {
            Layer::Tile(l) => out.extend(l.gid_errors.iter().map(|e| (l.common.name.as_str(), *e))),
            Layer::Group(g) => g.layers.iter().for_each(|l| l.collect_gid_errors(out)),
            Layer::Object(_) | Layer::Image(_) => {}
        }
    }
}

/// A loaded map: grid description, tilesets and built layers.
#[derive(Debug, Clone)]
pub struct TileMap {
    pub descriptor: MapDescriptor,
    pub transformer: CoordinateTransformer,
    pub tilesets: TilesetRegistry,
    pub properties: Properties,
    /// Draw order.
    pub layers: Vec<Layer>,
}

impl TileMap {
    /// Loads a `.tmx`, `.json` or `.tmj` map with default options.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MapError> {
        Self::load_from_file(path, &LoadOptions::default())
    }

    pub fn load_from_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self, MapError> {
        let path = path.as_ref();
        let ir = match MapFormat::from_path(path)? {
            MapFormat::Tmx => tmx_loader::decode_tmx_file_to_ir(path)?,
            MapFormat::Json => json_loader::decode_json_file_to_ir(path)?,
        };
        debug!("parsed map {}", path.display());
        Self::from_ir(ir, options)
    }

    /// Loads a map held in memory. External tilesets resolve against
    /// `options.base_dir`, or the working directory.
    pub fn load_from_str(
        txt: &str,
        format: MapFormat,
        options: &LoadOptions,
    ) -> Result<Self, MapError> {
        let base_dir = options.base_dir.clone().unwrap_or_else(|| PathBuf::from("./"));
        let ir = match format {
            MapFormat::Tmx => {
                tmx_loader::decode_tmx_str_to_ir(txt, Path::new("<memory>.tmx"), &base_dir)?
            }
            MapFormat::Json => {
                json_loader::decode_json_str_to_ir(txt, Path::new("<memory>.json"), &base_dir)?
            }
        };
        Self::from_ir(ir, options)
    }

    /// Loads on a dedicated worker thread.
    pub fn spawn_load(
        path: impl Into<PathBuf>,
        options: LoadOptions,
    ) -> Result<JoinHandle<Result<TileMap, MapError>>, MapError> {
        let path = path.into();
        let name = format!("map-loader:{}", path.display());
        thread::Builder::new()
            .name(name)
            .spawn({
                let path = path.clone();
                move || TileMap::load_from_file(&path, &options)
            })
            .map_err(|source| MapError::Io { path, source })
    }

    /// Waits for [`TileMap::spawn_load`]; a panicking loader becomes
    /// [`MapError::LoaderPanicked`].
    pub fn join(handle: JoinHandle<Result<TileMap, MapError>>) -> Result<TileMap, MapError> {
        handle.join().map_err(|_| MapError::LoaderPanicked)?
    }

    /// Registers tilesets and builds every layer. Any structural error
    /// discards everything built so far.
    pub fn from_ir(ir: IrMap, options: &LoadOptions) -> Result<Self, MapError> {
        let descriptor = ir.descriptor;
        if descriptor.render_order != RenderOrder::RightDown {
            warn!(
                "render order {:?} is kept but tile data is always laid out row-major",
                descriptor.render_order
            );
        }

        let mut tilesets = TilesetRegistry::new();
        for ts in ir.tilesets {
            tilesets.register(TilesetEntry::from(ts))?;
        }
        debug!("registered {} tileset(s)", tilesets.len());

        let transformer = descriptor.transformer();
        let ctx = BuildContext {
            descriptor: &descriptor,
            transformer: &transformer,
            tilesets: &tilesets,
            options,
        };
        let layers = ctx.build_layers(ir.layers, Vec2::ZERO)?;

        Ok(TileMap {
            descriptor,
            transformer,
            tilesets,
            properties: ir.properties,
            layers,
        })
    }

    /// First layer with this name, searching inside groups.
    pub fn layer_by_name(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find_map(|l| l.find(name))
    }

    /// Placed tile at `coord` on the named tile layer.
    pub fn tile_at(&self, layer: &str, coord: IVec2) -> Option<&PlacedTile> {
        self.layer_by_name(layer)?.as_tile_layer()?.tile_at(coord)
    }

    /// Tileset entry owning a placed tile.
    pub fn tileset_of(&self, tile: &PlacedTile) -> Option<&TilesetEntry> {
        self.tilesets.get(tile.tileset)
    }

    pub fn point_for_coordinate(&self, coord: IVec2) -> Vec2 {
        self.transformer.point_for_coordinate(coord, 0.0, 0.0)
    }

    pub fn coordinate_for_point(&self, point: Vec2) -> IVec2 {
        self.transformer.coordinate_for_point(point)
    }

    pub fn size_in_points(&self) -> Vec2 {
        self.transformer.size_in_points()
    }

    /// Dangling gids of every tile layer, tagged with the layer name.
    pub fn gid_errors(&self) -> Vec<(&str, GidError)> {
        let mut out = Vec::new();
        for layer in &self.layers {
            layer.collect_gid_errors(&mut out);
        }
        out
    }
}

struct BuildContext<'a> {
    descriptor: &'a MapDescriptor,
    transformer: &'a CoordinateTransformer,
    tilesets: &'a TilesetRegistry,
    options: &'a LoadOptions,
}

impl BuildContext<'_> {
    fn build_layers(
        &self,
        layers: Vec<IrLayer>,
        parent_offset: Vec2,
    ) -> Result<Vec<Layer>, MapError> {
        let mut out = Vec::with_capacity(layers.len());
        for layer in layers {
            if !layer.visible && !self.options.include_hidden_layers {
                debug!("skipping hidden layer '{}'", layer.name);
                continue;
            }
            out.push(self.build_layer(layer, parent_offset)?);
        }
        Ok(out)
    }

    fn build_layer(&self, layer: IrLayer, parent_offset: Vec2) -> Result<Layer, MapError> {
        let IrLayer {
            id,
            name,
            visible,
            opacity,
            offset,
            properties,
            kind,
        } = layer;
        let common = LayerCommon {
            id,
            name,
            visible,
            opacity,
            offset,
            properties,
        };
        let total_offset = parent_offset + offset;

        Ok(match kind {
            IrLayerKind::Tiles { width, height, data } => {
                Layer::Tile(self.build_tile_layer(common, width, height, data, total_offset)?)
            }
            IrLayerKind::Objects { objects } => {
                Layer::Object(self.build_object_layer(common, objects, total_offset))
            }
            IrLayerKind::Image { image } => Layer::Image(ImageLayer { common, image }),
            IrLayerKind::Group { layers } => Layer::Group(GroupLayer {
                layers: self.build_layers(layers, total_offset)?,
                common,
            }),
        })
    }

    fn build_tile_layer(
        &self,
        common: LayerCommon,
        width: usize,
        height: usize,
        data: IrTileData,
        offset: Vec2,
    ) -> Result<TileLayer, MapError> {
        let cell_size = vec2(self.descriptor.tile_width as f32, self.descriptor.tile_height as f32);
        let builder = TileInstanceBuilder::new(self.transformer, self.tilesets, cell_size)
            .with_offset(offset);

        let (storage, gid_errors) = match data {
            IrTileData::Finite(raw) => {
                let cells = layer_data::decode(&common.name, &raw, width, height)?;
                let build = builder.build_grid(&cells);
                (TileStorage::Finite(build.tiles), build.gid_errors)
            }
            IrTileData::Chunks(chunks) => {
                let cells = layer_data::decode_chunks(&common.name, &chunks)?;
                let build = builder.build_chunks(&cells);
                (TileStorage::Chunked(build.tiles), build.gid_errors)
            }
        };

        let placed = storage.tiles().count();
        debug!("built tile layer '{}': {placed} tile(s)", common.name);

        if !gid_errors.is_empty() {
            let mut gids: Vec<u32> = gid_errors.iter().map(|e| e.gid).collect();
            gids.sort_unstable();
            gids.dedup();
            warn!(
                "layer '{}': {} cell(s) reference gids with no tileset: {gids:?}",
                common.name,
                gid_errors.len()
            );
            if self.options.strict_gids {
                return Err(MapError::DanglingGids {
                    layer: common.name,
                    count: gid_errors.len(),
                });
            }
        }

        Ok(TileLayer {
            common,
            width,
            height,
            storage,
            gid_errors,
        })
    }

    fn build_object_layer(
        &self,
        common: LayerCommon,
        objects: Vec<IrObject>,
        offset: Vec2,
    ) -> ObjectLayer {
        let screen_offset = vec2(offset.x, -offset.y);
        let mut gid_errors = Vec::new();
        let objects = objects
            .into_iter()
            .map(|object| {
                let position = self.transformer.object_render_position(vec2(object.x, object.y))
                    + screen_offset;
                let tile = match object.shape {
                    IrObjectShape::Tile { gid } => {
                        let gid = TileGid::from(gid);
                        match self.tilesets.resolve(gid.id) {
                            Some((tileset, local_id)) => {
                                Some(ObjectTile { gid, tileset, local_id })
                            }
                            None => {
                                gid_errors.push(ObjectGidError {
                                    object_id: object.id,
                                    gid: gid.id,
                                });
                                None
                            }
                        }
                    }
                    _ => None,
                };
                MapObject { object, position, tile }
            })
            .collect();

        if !gid_errors.is_empty() {
            warn!(
                "object layer '{}': {} tile object(s) reference gids with no tileset",
                common.name,
                gid_errors.len()
            );
        }

        ObjectLayer {
            common,
            objects,
            gid_errors,
        }
    }
}
