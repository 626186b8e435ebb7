// src/ir_map.rs
use crate::error::MapError;
use crate::geometry::{MapDescriptor, Orientation, Stagger};
use macroquad::math::Vec2;
use std::collections::HashMap;

/// Canonical, format-agnostic map produced by the TMX and JSON loaders.
pub struct IrMap {
    pub descriptor: MapDescriptor,
    pub properties: Properties,
    pub tilesets: Vec<IrTileset>, // sorted by first_gid
    pub layers: Vec<IrLayer>,     // draw order: array order
}

/// Map element attributes before validation.
#[derive(Debug, Clone, Default)]
pub struct IrMapHeader {
    pub orientation: String,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub hex_side_length: Option<u32>,
    pub stagger_axis: Option<String>,
    pub stagger_index: Option<String>,
    pub render_order: Option<String>,
    pub infinite: bool,
}

impl IrMapHeader {
    /// Validates orientation-specific attributes. Stagger axis and index
    /// default to `y` / `odd` like the editor does; a hexagonal map without a
    /// side length is rejected.
    pub fn to_descriptor(&self) -> Result<MapDescriptor, MapError> {
        let orientation: Orientation = self.orientation.parse()?;
        let render_order = match &self.render_order {
            Some(s) => s.parse()?,
            None => Default::default(),
        };

        let stagger = if orientation.is_staggered() {
            Some(Stagger {
                axis: match &self.stagger_axis {
                    Some(s) => s.parse()?,
                    None => Default::default(),
                },
                index: match &self.stagger_index {
                    Some(s) => s.parse()?,
                    None => Default::default(),
                },
            })
        } else {
            None
        };

        let hex_side_length = match orientation {
            Orientation::Hexagonal => Some(self.hex_side_length.ok_or(MapError::MissingAttribute {
                element: "map",
                attribute: "hexsidelength",
            })?),
            _ => None,
        };

        if self.tile_width == 0 || self.tile_height == 0 {
            return Err(MapError::InvalidMap(format!(
                "tile size must be non-zero, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }
        // hexagonal and staggered math works on half tiles
        if orientation.is_staggered() && (self.tile_width < 2 || self.tile_height < 2) {
            return Err(MapError::InvalidMap(format!(
                "{orientation} tiles must be at least 2x2, got {}x{}",
                self.tile_width, self.tile_height
            )));
        }

        Ok(MapDescriptor {
            orientation,
            width: self.width,
            height: self.height,
            tile_width: self.tile_width,
            tile_height: self.tile_height,
            hex_side_length,
            stagger,
            render_order,
            infinite: self.infinite,
        })
    }
}

#[derive(Debug, Clone)]
pub struct IrTileset {
    pub first_gid: u32,
    pub name: String,
    pub tile_w: u32,
    pub tile_h: u32,
    pub tilecount: u32,
    pub columns: u32,
    pub spacing: u32, // 0 if not used
    pub margin: u32,  // 0 if not used
    /// Atlas image; `None` for image-collection tilesets.
    pub image: Option<String>,
    pub tile_offset: Vec2,
    pub properties: Properties,
    pub tiles: Vec<IrTileMetadata>,
}

#[derive(Debug, Clone, Default)]
pub struct IrTileMetadata {
    pub id: u32, // local id
    pub image: Option<String>,
    pub properties: Properties,
    pub objects: Vec<IrObject>,
    pub animation: Vec<IrFrame>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrFrame {
    pub tile_id: u32,
    pub duration_ms: u32,
}

/// Raw tile ids of a layer, flip bits included.
#[derive(Debug, Clone)]
pub enum IrTileData {
    Finite(Vec<u32>),
    Chunks(Vec<IrChunk>),
}

#[derive(Debug, Clone)]
pub struct IrChunk {
    pub x: i32,
    pub y: i32,
    pub width: usize,
    pub height: usize,
    pub data: Vec<u32>,
}

#[derive(Debug, Clone)]
pub enum IrLayerKind {
    Tiles {
        width: usize,
        height: usize,
        data: IrTileData,
    },
    Objects {
        objects: Vec<IrObject>,
    },
    Image {
        image: Option<String>,
    },
    Group {
        layers: Vec<IrLayer>,
    },
}

#[derive(Debug, Clone)]
pub struct IrLayer {
    pub id: u32,
    pub name: String,
    pub visible: bool,
    pub opacity: f32,
    pub offset: Vec2, // pixel offset for this layer
    pub properties: Properties,
    pub kind: IrLayerKind,
}

/// Object shape as stored in the map file.
#[derive(Debug, Clone, PartialEq)]
pub enum IrObjectShape {
    Rectangle,
    Ellipse,
    Point,
    Polygon(Vec<Vec2>),
    Polyline(Vec<Vec2>),
    /// Tile object; the gid keeps its flip bits.
    Tile { gid: u32 },
    Text(String),
}

/// An object from an object layer or a tile's collision group.
#[derive(Debug, Clone)]
pub struct IrObject {
    pub id: u32,
    pub name: String,
    pub class_name: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub rotation: f32,
    pub visible: bool,
    pub shape: IrObjectShape,
    pub properties: Properties,
}

/// Typed custom property value.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    I64(i64),
    F32(f32),
    String(String),
}

/// Custom properties of a map element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties(HashMap<String, PropertyValue>);

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: PropertyValue) {
        self.0.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.0.get(name)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        match self.0.get(name)? {
            PropertyValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn get_i64(&self, name: &str) -> Option<i64> {
        match self.0.get(name)? {
            PropertyValue::I64(v) => Some(*v),
            _ => None,
        }
    }

    /// `None` when the value does not fit in an `i32`.
    pub fn get_i32(&self, name: &str) -> Option<i32> {
        self.get_i64(name).and_then(|v| i32::try_from(v).ok())
    }

    pub fn get_f32(&self, name: &str) -> Option<f32> {
        match self.0.get(name)? {
            PropertyValue::F32(v) => Some(*v),
            PropertyValue::I64(v) => Some(*v as f32),
            _ => None,
        }
    }

    pub fn get_string(&self, name: &str) -> Option<&str> {
        match self.0.get(name)? {
            PropertyValue::String(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PropertyValue)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Parses a property from its declared type name and textual value. Used
/// by the XML loader, where every value arrives as a string.
pub fn parse_property(
    name: &str,
    kind: Option<&str>,
    value: &str,
) -> Result<PropertyValue, MapError> {
    let invalid = || MapError::InvalidAttribute {
        element: "property",
        attribute: name.to_owned(),
        value: value.to_owned(),
    };
    Ok(match kind.unwrap_or("string") {
        "bool" => PropertyValue::Bool(value.parse().map_err(|_| invalid())?),
        "int" | "object" => PropertyValue::I64(value.parse().map_err(|_| invalid())?),
        "float" => PropertyValue::F32(value.parse().map_err(|_| invalid())?),
        "string" | "file" | "color" | "class" => PropertyValue::String(value.to_owned()),
        other => {
            return Err(MapError::UnsupportedPropertyType {
                name: name.to_owned(),
                kind: other.to_owned(),
            })
        }
    })
}
