//! Tiled map loading for Macroquad: TMX and JSON maps decoded into placed
//! tiles for orthogonal, isometric, hexagonal and staggered grids.

mod error;
pub mod geometry;
pub mod ir_map;
pub mod layer_data;
pub mod loader {
    pub mod json_loader;
    pub mod tmx_loader;
}
mod map;
pub mod spatial;
pub mod tile;
pub mod tileset;

pub use error::MapError;
pub use geometry::{
    CoordinateTransformer, MapDescriptor, Orientation, RenderOrder, RenderParams, Stagger,
    StaggerAxis, StaggerIndex,
};
pub use ir_map::{IrObject, IrObjectShape, Properties, PropertyValue};
pub use map::{
    GroupLayer, ImageLayer, Layer, LayerCommon, LoadOptions, MapFormat, MapObject, ObjectGidError,
    ObjectLayer, ObjectTile, TileLayer, TileMap, TileStorage,
};
pub use spatial::{Grid2D, TileFlags, TileGid};
pub use tile::{AnchorCorner, FlipTransform, GidError, PlacedTile};
pub use tileset::{TilesetEntry, TilesetId, TilesetRegistry};
