// src/loader/json_loader.rs
use crate::error::MapError;
use crate::ir_map::*;
use crate::layer_data::{self, Compression, Encoding};
use macroquad::math::{vec2, Vec2};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

/// Tile data is either an id array or an encoded string.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonData {
    Ids(Vec<u32>),
    Encoded(String),
}

impl Default for JsonData {
    fn default() -> Self {
        JsonData::Ids(Vec::new())
    }
}

#[derive(Deserialize)]
struct JsonChunk {
    x: i32,
    y: i32,
    width: usize,
    height: usize,
    data: JsonData,
}

#[derive(Deserialize)]
struct JsonLayer {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    data: JsonData,
    #[serde(default)]
    chunks: Option<Vec<JsonChunk>>,
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    compression: Option<String>,
    #[serde(default)]
    width: usize,
    #[serde(default)]
    height: usize,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default = "one")]
    opacity: f32,
    #[serde(default)]
    offsetx: f32,
    #[serde(default)]
    offsety: f32,
    #[serde(default)]
    name: String,
    #[serde(rename = "type")]
    kind: Option<String>, // "tilelayer" if absent
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    objects: Vec<JsonObject>,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    layers: Vec<JsonLayer>,
}

fn default_true() -> bool {
    true
}
fn one() -> f32 {
    1.0
}

#[derive(Deserialize, Default)]
struct JsonTileOffset {
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
}

/// Tileset fields, shared by external files and embedded definitions.
#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonTilesetDef {
    name: String,
    tilewidth: u32,
    tileheight: u32,
    tilecount: u32,
    columns: u32,
    image: Option<String>,
    spacing: u32,
    margin: u32,
    tileoffset: Option<JsonTileOffset>,
    properties: Vec<JsonProperty>,
    tiles: Vec<JsonTile>,
}

#[derive(Deserialize)]
struct JsonTilesetRef {
    firstgid: u32,
    #[serde(default)]
    source: Option<String>,
    #[serde(flatten)]
    def: JsonTilesetDef,
}

#[derive(Deserialize)]
struct JsonMap {
    orientation: String,
    #[serde(default)]
    renderorder: Option<String>,
    width: u32,
    height: u32,
    tilewidth: u32,
    tileheight: u32,
    #[serde(default)]
    hexsidelength: Option<u32>,
    #[serde(default)]
    staggeraxis: Option<String>,
    #[serde(default)]
    staggerindex: Option<String>,
    #[serde(default)]
    infinite: bool,
    layers: Vec<JsonLayer>,
    #[serde(default)]
    tilesets: Vec<JsonTilesetRef>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonProperty {
    name: String,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    value: JsonValue,
}

#[derive(Deserialize)]
struct JsonObject {
    #[serde(default)]
    id: u32,
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    class: String,
    #[serde(default)]
    x: f32,
    #[serde(default)]
    y: f32,
    #[serde(default)]
    width: f32,
    #[serde(default)]
    height: f32,
    #[serde(default)]
    rotation: f32,
    #[serde(default = "default_true")]
    visible: bool,
    #[serde(default)]
    point: bool,
    #[serde(default)]
    ellipse: bool,
    #[serde(default)]
    polygon: Vec<JsonObjectPoint>,
    #[serde(default)]
    polyline: Vec<JsonObjectPoint>,
    #[serde(default)]
    text: Option<JsonText>,
    #[serde(default)]
    gid: Option<u32>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
}

#[derive(Deserialize)]
struct JsonText {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct JsonObjectPoint {
    x: f32,
    y: f32,
}

#[derive(Deserialize, Default)]
struct JsonObjectGroup {
    #[serde(default)]
    objects: Vec<JsonObject>,
}

#[derive(Deserialize)]
struct JsonFrame {
    tileid: u32,
    duration: u32,
}

#[derive(Deserialize)]
struct JsonTile {
    id: u32,
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    properties: Vec<JsonProperty>,
    #[serde(default)]
    objectgroup: JsonObjectGroup,
    #[serde(default)]
    animation: Vec<JsonFrame>,
}

fn json_property_to_ir(prop: JsonProperty) -> Result<Option<(String, PropertyValue)>, MapError> {
    let JsonProperty { name, kind, value } = prop;

    let parsed = match kind.as_deref() {
        Some("bool") => value.as_bool().map(PropertyValue::Bool),
        Some("int") | Some("object") => value.as_i64().map(PropertyValue::I64),
        Some("float") => value.as_f64().map(|n| PropertyValue::F32(n as f32)),
        Some("string") | Some("file") | Some("color") | Some("class") => {
            value.as_str().map(|s| PropertyValue::String(s.to_owned()))
        }
        Some(other) => {
            return Err(MapError::UnsupportedPropertyType {
                name,
                kind: other.to_owned(),
            });
        }
        None => {
            if let Some(v) = value.as_bool() {
                Some(PropertyValue::Bool(v))
            } else if let Some(v) = value.as_i64() {
                Some(PropertyValue::I64(v))
            } else if let Some(v) = value.as_f64() {
                Some(PropertyValue::F32(v as f32))
            } else {
                value.as_str().map(|s| PropertyValue::String(s.to_owned()))
            }
        }
    };

    Ok(parsed.map(|value| (name, value)))
}

fn properties_from_json(props: Vec<JsonProperty>) -> Result<Properties, MapError> {
    let mut out = Properties::new();
    for p in props {
        if let Some((name, value)) = json_property_to_ir(p)? {
            out.insert(name, value);
        }
    }
    Ok(out)
}

fn object_to_ir(obj: JsonObject) -> Result<IrObject, MapError> {
    let shape = if let Some(gid) = obj.gid {
        IrObjectShape::Tile { gid }
    } else if obj.point {
        IrObjectShape::Point
    } else if obj.ellipse {
        IrObjectShape::Ellipse
    } else if !obj.polygon.is_empty() {
        IrObjectShape::Polygon(obj.polygon.into_iter().map(|p| vec2(p.x, p.y)).collect())
    } else if !obj.polyline.is_empty() {
        IrObjectShape::Polyline(obj.polyline.into_iter().map(|p| vec2(p.x, p.y)).collect())
    } else if let Some(text) = obj.text {
        IrObjectShape::Text(text.text)
    } else {
        IrObjectShape::Rectangle
    };

    let class_name = if !obj.class.is_empty() {
        obj.class
    } else {
        obj.kind
    };

    Ok(IrObject {
        id: obj.id,
        name: obj.name,
        class_name,
        x: obj.x,
        y: obj.y,
        width: obj.width,
        height: obj.height,
        rotation: obj.rotation,
        visible: obj.visible,
        shape,
        properties: properties_from_json(obj.properties)?,
    })
}

fn tileset_to_ir(first_gid: u32, def: JsonTilesetDef) -> Result<IrTileset, MapError> {
    Ok(IrTileset {
        first_gid,
        name: def.name,
        tile_w: def.tilewidth,
        tile_h: def.tileheight,
        tilecount: def.tilecount,
        columns: def.columns,
        spacing: def.spacing,
        margin: def.margin,
        image: def.image,
        tile_offset: def
            .tileoffset
            .map(|o| vec2(o.x, o.y))
            .unwrap_or(Vec2::ZERO),
        properties: properties_from_json(def.properties)?,
        tiles: def
            .tiles
            .into_iter()
            .map(|tile| -> Result<IrTileMetadata, MapError> {
                Ok(IrTileMetadata {
                    id: tile.id,
                    image: tile.image,
                    properties: properties_from_json(tile.properties)?,
                    objects: tile
                        .objectgroup
                        .objects
                        .into_iter()
                        .map(object_to_ir)
                        .collect::<Result<Vec<_>, _>>()?,
                    animation: tile
                        .animation
                        .into_iter()
                        .map(|f| IrFrame {
                            tile_id: f.tileid,
                            duration_ms: f.duration,
                        })
                        .collect(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?,
    })
}

/// Array data is taken as is; string data goes through the layer decoder.
fn data_to_ids(
    data: JsonData,
    encoding: Encoding,
    compression: Compression,
) -> Result<Vec<u32>, MapError> {
    match data {
        JsonData::Ids(ids) => Ok(ids),
        JsonData::Encoded(text) => layer_data::decode_payload(encoding, compression, &text, &[]),
    }
}

fn layer_to_ir(l: JsonLayer) -> Result<IrLayer, MapError> {
    let properties = properties_from_json(l.properties)?;
    let kind = match l.kind.as_deref().unwrap_or("tilelayer") {
        "tilelayer" => {
            let encoding = match l.encoding.as_deref() {
                None | Some("csv") => Encoding::Csv,
                other => Encoding::from_attr(other)?,
            };
            let compression = Compression::from_attr(l.compression.as_deref())?;
            let data = match l.chunks {
                Some(chunks) => IrTileData::Chunks(
                    chunks
                        .into_iter()
                        .map(|c| {
                            Ok(IrChunk {
                                x: c.x,
                                y: c.y,
                                width: c.width,
                                height: c.height,
                                data: data_to_ids(c.data, encoding, compression)?,
                            })
                        })
                        .collect::<Result<Vec<_>, MapError>>()?,
                ),
                None => IrTileData::Finite(data_to_ids(l.data, encoding, compression)?),
            };
            IrLayerKind::Tiles {
                width: l.width,
                height: l.height,
                data,
            }
        }
        "objectgroup" => IrLayerKind::Objects {
            objects: l
                .objects
                .into_iter()
                .map(object_to_ir)
                .collect::<Result<Vec<_>, _>>()?,
        },
        "imagelayer" => IrLayerKind::Image { image: l.image },
        "group" => IrLayerKind::Group {
            layers: l
                .layers
                .into_iter()
                .map(layer_to_ir)
                .collect::<Result<Vec<_>, _>>()?,
        },
        other => {
            return Err(MapError::InvalidMap(format!(
                "layer '{}' has unknown type '{other}'",
                l.name
            )))
        }
    };
    Ok(IrLayer {
        id: l.id,
        name: l.name,
        visible: l.visible,
        opacity: l.opacity,
        offset: vec2(l.offsetx, l.offsety),
        properties,
        kind,
    })
}

/// Parses a Tiled JSON map. External tilesets are resolved against `base_dir`.
pub fn decode_json_str_to_ir(txt: &str, path: &Path, base_dir: &Path) -> Result<IrMap, MapError> {
    let j: JsonMap = serde_json::from_str(txt).map_err(|source| MapError::Json {
        path: path.to_path_buf(),
        source,
    })?;

    let header = IrMapHeader {
        orientation: j.orientation,
        width: j.width,
        height: j.height,
        tile_width: j.tilewidth,
        tile_height: j.tileheight,
        hex_side_length: j.hexsidelength,
        stagger_axis: j.staggeraxis,
        stagger_index: j.staggerindex,
        render_order: j.renderorder,
        infinite: j.infinite,
    };
    let descriptor = header.to_descriptor()?;

    // Build IR tilesets
    let mut ir_tilesets = Vec::with_capacity(j.tilesets.len());
    for ts in j.tilesets {
        let def = match &ts.source {
            Some(source) => {
                let ts_path = base_dir.join(source);
                let ext_txt = std::fs::read_to_string(&ts_path).map_err(|source| MapError::Io {
                    path: ts_path.clone(),
                    source,
                })?;
                serde_json::from_str(&ext_txt).map_err(|source| MapError::Json {
                    path: ts_path,
                    source,
                })?
            }
            None => ts.def,
        };
        ir_tilesets.push(tileset_to_ir(ts.firstgid, def)?);
    }

    // Sort by first_gid to make registration order match gid order
    ir_tilesets.sort_by_key(|t| t.first_gid);

    let layers = j
        .layers
        .into_iter()
        .map(layer_to_ir)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(IrMap {
        descriptor,
        properties: properties_from_json(j.properties)?,
        tilesets: ir_tilesets,
        layers,
    })
}

pub fn decode_json_file_to_ir(path: &Path) -> Result<IrMap, MapError> {
    let txt = std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let map_dir = path
        .parent()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./"));

    decode_json_str_to_ir(&txt, path, &map_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Orientation;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_dir() -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock went backwards")
            .as_nanos();
        let dir = std::env::temp_dir().join(format!("mq_tiled_props_{nanos}"));
        fs::create_dir_all(&dir).expect("failed to create temp dir");
        dir
    }

    #[test]
    fn parses_properties_for_map_layer_object_tileset_and_tile() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let ts_path = dir.join("tileset.json");

        let map_json = r#"{
          "orientation": "orthogonal",
          "width": 2,
          "height": 2,
          "tilewidth": 16,
          "tileheight": 16,
          "properties": [
            {"name":"is_night","type":"bool","value":true},
            {"name":"gravity","type":"float","value":9.8},
            {"name":"theme","type":"string","value":"forest"}
          ],
          "layers": [
            {
              "type":"tilelayer",
              "name":"ground",
              "width":2,
              "height":2,
              "data":[1,0,0,0],
              "properties":[
                {"name":"is_solid","type":"bool","value":true},
                {"name":"difficulty","type":"int","value":3}
              ]
            },
            {
              "type":"objectgroup",
              "name":"spawns",
              "objects":[
                {
                  "id": 7,
                  "name":"spawn_1",
                  "type":"spawn",
                  "properties":[{"name":"kind","type":"string","value":"player"}]
                }
              ],
              "properties":[{"name":"enabled","type":"bool","value":true}]
            }
          ],
          "tilesets":[{"firstgid":1,"source":"tileset.json"}]
        }"#;

        let tileset_json = r#"{
          "name":"forest",
          "tilewidth":16,
          "tileheight":16,
          "tilecount":4,
          "columns":2,
          "image":"tiles.png",
          "properties":[{"name":"biome","type":"string","value":"forest"}],
          "tiles":[
            {
              "id":0,
              "properties":[{"name":"damage","type":"int","value":10}],
              "objectgroup":{
                "objects":[
                  {"id":1,"name":"hitbox","type":"shape",
                   "properties":[{"name":"sensor","type":"bool","value":false}]}
                ]
              },
              "animation":[{"tileid":0,"duration":80},{"tileid":1,"duration":80}]
            }
          ]
        }"#;

        fs::write(&map_path, map_json).expect("failed to write map");
        fs::write(&ts_path, tileset_json).expect("failed to write tileset");

        let ir = decode_json_file_to_ir(&map_path).expect("decode");

        assert_eq!(ir.properties.get_bool("is_night"), Some(true));
        assert_eq!(ir.properties.get_f32("gravity"), Some(9.8));
        assert_eq!(ir.properties.get_string("theme"), Some("forest"));

        assert_eq!(ir.layers[0].properties.get_bool("is_solid"), Some(true));
        assert_eq!(ir.layers[0].properties.get_i32("difficulty"), Some(3));

        match &ir.layers[1].kind {
            IrLayerKind::Objects { objects } => {
                assert_eq!(objects.len(), 1);
                assert_eq!(objects[0].properties.get_string("kind"), Some("player"));
            }
            _ => panic!("expected object layer"),
        }

        let ts = &ir.tilesets[0];
        assert_eq!(ts.properties.get_string("biome"), Some("forest"));
        assert_eq!(ts.tiles.len(), 1);
        assert_eq!(ts.tiles[0].properties.get_i32("damage"), Some(10));
        assert_eq!(ts.tiles[0].animation.len(), 2);
        assert_eq!(
            ts.tiles[0].objects[0].properties.get_bool("sensor"),
            Some(false)
        );
    }

    #[test]
    fn keeps_large_int_property_values() {
        let json = r#"{
          "orientation": "orthogonal",
          "width": 1, "height": 1,
          "tilewidth": 16,
          "tileheight": 16,
          "properties": [
            {"name":"big_id","type":"object","value":5000000000}
          ],
          "layers": []
        }"#;

        let ir =
            decode_json_str_to_ir(json, Path::new("big.json"), Path::new(".")).expect("decode");
        assert_eq!(ir.properties.get_i64("big_id"), Some(5_000_000_000));
        assert_eq!(ir.properties.get_i32("big_id"), None);
    }

    #[test]
    fn embedded_tileset_and_staggered_header() {
        let json = r#"{
          "orientation": "staggered", "staggeraxis": "x", "staggerindex": "even",
          "renderorder": "left-up",
          "width": 2, "height": 1, "tilewidth": 64, "tileheight": 32,
          "layers": [
            {"type":"tilelayer","name":"t","width":2,"height":1,
             "encoding":"base64","data":"AQAAAAIAAIA="}
          ],
          "tilesets": [
            {"firstgid": 1, "name": "embedded", "tilewidth": 64, "tileheight": 32,
             "tilecount": 2, "columns": 2, "tileoffset": {"x": 0, "y": 8}}
          ]
        }"#;
        let ir = decode_json_str_to_ir(json, Path::new("s.json"), Path::new(".")).expect("decode");
        assert_eq!(ir.descriptor.orientation, Orientation::Staggered);
        assert_eq!(ir.tilesets[0].name, "embedded");
        assert_eq!(ir.tilesets[0].tile_offset, vec2(0.0, 8.0));
        match &ir.layers[0].kind {
            IrLayerKind::Tiles { data: IrTileData::Finite(ids), .. } => {
                assert_eq!(ids, &vec![1, 0x8000_0002]);
            }
            _ => panic!("expected tile layer"),
        }
    }

    #[test]
    fn infinite_map_chunks() {
        let json = r#"{
          "orientation": "orthogonal", "infinite": true,
          "width": 4, "height": 4, "tilewidth": 8, "tileheight": 8,
          "layers": [
            {"type":"tilelayer","name":"inf","width":4,"height":4,
             "chunks":[{"x":-4,"y":0,"width":2,"height":1,"data":[1,2]}]}
          ]
        }"#;
        let ir = decode_json_str_to_ir(json, Path::new("i.json"), Path::new(".")).expect("decode");
        assert!(ir.descriptor.infinite);
        match &ir.layers[0].kind {
            IrLayerKind::Tiles { data: IrTileData::Chunks(chunks), .. } => {
                assert_eq!((chunks[0].x, chunks[0].data.clone()), (-4, vec![1, 2]));
            }
            _ => panic!("expected chunked layer"),
        }
    }

    #[test]
    fn returns_typed_error_for_malformed_json() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        fs::write(&map_path, "{ not json").expect("failed to write map");

        let err = decode_json_file_to_ir(&map_path)
            .err()
            .expect("expected decode error");
        assert!(matches!(err, MapError::Json { .. }));
    }

    #[test]
    fn returns_typed_error_for_missing_tileset_file() {
        let dir = temp_dir();
        let map_path = dir.join("map.json");
        let map_json = r#"{
          "orientation": "orthogonal",
          "width": 1, "height": 1,
          "tilewidth": 16,
          "tileheight": 16,
          "layers": [],
          "tilesets":[{"firstgid":1,"source":"missing_tileset.json"}]
        }"#;
        fs::write(&map_path, map_json).expect("failed to write map");

        let err = decode_json_file_to_ir(&map_path)
            .err()
            .expect("expected decode error");
        assert!(matches!(err, MapError::Io { .. }));
    }

    #[test]
    fn returns_typed_error_for_unknown_property_type() {
        let json = r#"{
          "orientation": "orthogonal",
          "width": 1, "height": 1,
          "tilewidth": 16,
          "tileheight": 16,
          "properties": [
            {"name":"mystery","type":"not_supported","value":"x"}
          ],
          "layers": []
        }"#;

        let err = decode_json_str_to_ir(json, Path::new("m.json"), Path::new("."))
            .err()
            .expect("expected decode error");
        assert!(matches!(err, MapError::UnsupportedPropertyType { .. }));
    }
}
