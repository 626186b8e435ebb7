// src/loader/tmx_loader.rs
use crate::error::MapError;
use crate::ir_map::*;
use crate::layer_data::{self, Compression, Encoding};
use macroquad::math::{vec2, Vec2};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Element with its attributes, text and children, in document order.
#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn from_start(e: &BytesStart) -> Result<Self, quick_xml::Error> {
        let mut attrs = Vec::new();
        for attr in e.attributes() {
            let attr = attr?;
            attrs.push((
                String::from_utf8_lossy(attr.key.as_ref()).into_owned(),
                attr.unescape_value()?.into_owned(),
            ));
        }
        Ok(XmlNode {
            name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
            attrs,
            ..Default::default()
        })
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    fn parse<T: FromStr>(&self, element: &'static str, name: &str) -> Result<Option<T>, MapError> {
        self.attr(name)
            .map(|v| {
                v.trim().parse().map_err(|_| MapError::InvalidAttribute {
                    element,
                    attribute: name.to_owned(),
                    value: v.to_owned(),
                })
            })
            .transpose()
    }

    fn parse_or<T: FromStr>(
        &self,
        element: &'static str,
        name: &str,
        default: T,
    ) -> Result<T, MapError> {
        Ok(self.parse(element, name)?.unwrap_or(default))
    }

    fn required<T: FromStr>(
        &self,
        element: &'static str,
        name: &'static str,
    ) -> Result<T, MapError> {
        self.parse(element, name)?
            .ok_or(MapError::MissingAttribute { element, attribute: name })
    }

    /// `"1"`/`"0"` as written by the editor, `true`/`false` tolerated.
    fn flag(&self, name: &str, default: bool) -> bool {
        match self.attr(name) {
            Some("1") | Some("true") => true,
            Some("0") | Some("false") => false,
            _ => default,
        }
    }

    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlNode> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }
}

fn parse_document(text: &str, path: &Path) -> Result<XmlNode, MapError> {
    let xml_err = |source| MapError::Xml {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = Reader::from_str(text);
    reader.trim_text(true);

    // stack[0] is a synthetic document node
    let mut stack = vec![XmlNode::default()];
    loop {
        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => stack.push(XmlNode::from_start(&e).map_err(xml_err)?),
            Event::Empty(e) => {
                let node = XmlNode::from_start(&e).map_err(xml_err)?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::End(_) => {
                let node = stack.pop().filter(|_| !stack.is_empty()).ok_or_else(|| {
                    MapError::InvalidMap(format!("unbalanced closing tag in {}", path.display()))
                })?;
                if let Some(parent) = stack.last_mut() {
                    parent.children.push(node);
                }
            }
            Event::Text(t) => {
                let s = t.unescape().map_err(xml_err)?;
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&s);
                }
            }
            Event::CData(c) => {
                if let Some(node) = stack.last_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(MapError::InvalidMap(format!(
            "unexpected end of document in {}",
            path.display()
        )));
    }
    stack
        .pop()
        .and_then(|doc| doc.children.into_iter().next())
        .ok_or_else(|| MapError::InvalidMap(format!("empty document {}", path.display())))
}

fn properties_from_xml(node: &XmlNode) -> Result<Properties, MapError> {
    let mut out = Properties::new();
    if let Some(props) = node.child("properties") {
        for p in props.children_named("property") {
            let name: String = p.required("property", "name")?;
            // multi-line string values are stored as text
            let value = p.attr("value").unwrap_or(p.text.as_str());
            out.insert(name.clone(), parse_property(&name, p.attr("type"), value)?);
        }
    }
    Ok(out)
}

fn points_from_xml(node: &XmlNode) -> Result<Vec<Vec2>, MapError> {
    let raw: String = node.required("polygon", "points")?;
    let invalid = || MapError::InvalidAttribute {
        element: "polygon",
        attribute: "points".into(),
        value: raw.clone(),
    };
    raw.split_whitespace()
        .map(|pair| {
            let (x, y) = pair.split_once(',').ok_or_else(invalid)?;
            Ok(vec2(
                x.parse().map_err(|_| invalid())?,
                y.parse().map_err(|_| invalid())?,
            ))
        })
        .collect()
}

fn object_from_xml(node: &XmlNode) -> Result<IrObject, MapError> {
    let shape = if let Some(gid) = node.parse::<u32>("object", "gid")? {
        IrObjectShape::Tile { gid }
    } else if node.child("point").is_some() {
        IrObjectShape::Point
    } else if node.child("ellipse").is_some() {
        IrObjectShape::Ellipse
    } else if let Some(poly) = node.child("polygon") {
        IrObjectShape::Polygon(points_from_xml(poly)?)
    } else if let Some(line) = node.child("polyline") {
        IrObjectShape::Polyline(points_from_xml(line)?)
    } else if let Some(text) = node.child("text") {
        IrObjectShape::Text(text.text.clone())
    } else {
        IrObjectShape::Rectangle
    };

    let class_name = node
        .attr("class")
        .or_else(|| node.attr("type"))
        .unwrap_or_default()
        .to_owned();

    Ok(IrObject {
        id: node.parse_or("object", "id", 0)?,
        name: node.attr("name").unwrap_or_default().to_owned(),
        class_name,
        x: node.parse_or("object", "x", 0.0)?,
        y: node.parse_or("object", "y", 0.0)?,
        width: node.parse_or("object", "width", 0.0)?,
        height: node.parse_or("object", "height", 0.0)?,
        rotation: node.parse_or("object", "rotation", 0.0)?,
        visible: node.flag("visible", true),
        shape,
        properties: properties_from_xml(node)?,
    })
}

fn tile_metadata_from_xml(node: &XmlNode) -> Result<IrTileMetadata, MapError> {
    let objects = match node.child("objectgroup") {
        Some(group) => group
            .children_named("object")
            .map(object_from_xml)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };
    let animation = match node.child("animation") {
        Some(anim) => anim
            .children_named("frame")
            .map(|f| {
                Ok(IrFrame {
                    tile_id: f.required("frame", "tileid")?,
                    duration_ms: f.required("frame", "duration")?,
                })
            })
            .collect::<Result<Vec<_>, MapError>>()?,
        None => Vec::new(),
    };
    Ok(IrTileMetadata {
        id: node.required("tile", "id")?,
        image: node
            .child("image")
            .and_then(|i| i.attr("source"))
            .map(str::to_owned),
        properties: properties_from_xml(node)?,
        objects,
        animation,
    })
}

/// `first_gid` comes from the map's reference; `def` is either the same
/// element (embedded) or the root of an external `.tsx`.
fn tileset_from_xml(first_gid: u32, def: &XmlNode) -> Result<IrTileset, MapError> {
    let tile_offset = match def.child("tileoffset") {
        Some(o) => vec2(o.parse_or("tileoffset", "x", 0.0)?, o.parse_or("tileoffset", "y", 0.0)?),
        None => Vec2::ZERO,
    };
    Ok(IrTileset {
        first_gid,
        name: def.attr("name").unwrap_or_default().to_owned(),
        tile_w: def.required("tileset", "tilewidth")?,
        tile_h: def.required("tileset", "tileheight")?,
        tilecount: def.parse_or("tileset", "tilecount", 0)?,
        columns: def.parse_or("tileset", "columns", 0)?,
        spacing: def.parse_or("tileset", "spacing", 0)?,
        margin: def.parse_or("tileset", "margin", 0)?,
        image: def
            .child("image")
            .and_then(|i| i.attr("source"))
            .map(str::to_owned),
        tile_offset,
        properties: properties_from_xml(def)?,
        tiles: def
            .children_named("tile")
            .map(tile_metadata_from_xml)
            .collect::<Result<Vec<_>, _>>()?,
    })
}

fn read_file(path: &Path) -> Result<String, MapError> {
    std::fs::read_to_string(path).map_err(|source| MapError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads the payload of a `<data>` or `<chunk>` element.
fn payload_from_xml(
    node: &XmlNode,
    encoding: Encoding,
    compression: Compression,
) -> Result<Vec<u32>, MapError> {
    let cells = if encoding == Encoding::Xml {
        node.children_named("tile")
            .map(|t| t.parse_or("tile", "gid", 0u32))
            .collect::<Result<Vec<_>, _>>()?
    } else {
        Vec::new()
    };
    layer_data::decode_payload(encoding, compression, &node.text, &cells)
}

fn tile_layer_from_xml(node: &XmlNode, name: &str) -> Result<IrLayerKind, MapError> {
    let width: usize = node.required("layer", "width")?;
    let height: usize = node.required("layer", "height")?;
    let data = node
        .child("data")
        .ok_or(MapError::MissingAttribute { element: "layer", attribute: "data" })?;
    let encoding = Encoding::from_attr(data.attr("encoding"))?;
    let compression = Compression::from_attr(data.attr("compression"))?;

    let data = if data.child("chunk").is_some() {
        let chunks = data
            .children_named("chunk")
            .map(|c| {
                Ok(IrChunk {
                    x: c.required("chunk", "x")?,
                    y: c.required("chunk", "y")?,
                    width: c.required("chunk", "width")?,
                    height: c.required("chunk", "height")?,
                    data: payload_from_xml(c, encoding, compression)?,
                })
            })
            .collect::<Result<Vec<_>, MapError>>()?;
        IrTileData::Chunks(chunks)
    } else {
        let ids = payload_from_xml(data, encoding, compression)?;
        log::trace!("layer '{name}': {} raw ids ({encoding:?}, {compression:?})", ids.len());
        IrTileData::Finite(ids)
    };

    Ok(IrLayerKind::Tiles { width, height, data })
}

fn layer_from_xml(node: &XmlNode) -> Result<Option<IrLayer>, MapError> {
    let name = node.attr("name").unwrap_or_default().to_owned();
    let kind = match node.name.as_str() {
        "layer" => tile_layer_from_xml(node, &name)?,
        "objectgroup" => IrLayerKind::Objects {
            objects: node
                .children_named("object")
                .map(object_from_xml)
                .collect::<Result<Vec<_>, _>>()?,
        },
        "imagelayer" => IrLayerKind::Image {
            image: node
                .child("image")
                .and_then(|i| i.attr("source"))
                .map(str::to_owned),
        },
        "group" => IrLayerKind::Group {
            layers: layers_from_xml(node)?,
        },
        _ => return Ok(None),
    };

    Ok(Some(IrLayer {
        id: node.parse_or("layer", "id", 0)?,
        name,
        visible: node.flag("visible", true),
        opacity: node.parse_or("layer", "opacity", 1.0)?,
        offset: vec2(
            node.parse_or("layer", "offsetx", 0.0)?,
            node.parse_or("layer", "offsety", 0.0)?,
        ),
        properties: properties_from_xml(node)?,
        kind,
    }))
}

fn layers_from_xml(parent: &XmlNode) -> Result<Vec<IrLayer>, MapError> {
    let mut layers = Vec::new();
    for child in &parent.children {
        if let Some(layer) = layer_from_xml(child)? {
            layers.push(layer);
        }
    }
    Ok(layers)
}

/// Parses a TMX document. External tilesets are resolved against `base_dir`.
pub fn decode_tmx_str_to_ir(text: &str, path: &Path, base_dir: &Path) -> Result<IrMap, MapError> {
    let root = parse_document(text, path)?;
    if root.name != "map" {
        return Err(MapError::InvalidMap(format!(
            "expected <map> root in {}, found <{}>",
            path.display(),
            root.name
        )));
    }

    let header = IrMapHeader {
        orientation: root.required("map", "orientation")?,
        width: root.required("map", "width")?,
        height: root.required("map", "height")?,
        tile_width: root.required("map", "tilewidth")?,
        tile_height: root.required("map", "tileheight")?,
        hex_side_length: root.parse("map", "hexsidelength")?,
        stagger_axis: root.attr("staggeraxis").map(str::to_owned),
        stagger_index: root.attr("staggerindex").map(str::to_owned),
        render_order: root.attr("renderorder").map(str::to_owned),
        infinite: root.flag("infinite", false),
    };
    let descriptor = header.to_descriptor()?;

    let mut tilesets = Vec::new();
    for ts in root.children_named("tileset") {
        let first_gid: u32 = ts.required("tileset", "firstgid")?;
        let tileset = match ts.attr("source") {
            Some(source) => {
                let ts_path = base_dir.join(source);
                let external = parse_document(&read_file(&ts_path)?, &ts_path)?;
                tileset_from_xml(first_gid, &external)?
            }
            None => tileset_from_xml(first_gid, ts)?,
        };
        tilesets.push(tileset);
    }
    tilesets.sort_by_key(|t| t.first_gid);

    Ok(IrMap {
        descriptor,
        properties: properties_from_xml(&root)?,
        tilesets,
        layers: layers_from_xml(&root)?,
    })
}

/// Reads a `.tmx` file; external tilesets resolve next to it.
pub fn decode_tmx_file_to_ir(path: &Path) -> Result<IrMap, MapError> {
    let text = read_file(path)?;
    let map_dir = path
        .parent()
        .map(|d| d.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./"));
    decode_tmx_str_to_ir(&text, path, &map_dir)
}
