use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Error type for map loading.
///
/// Every variant aborts the load; unresolved gids are collected as
/// [`GidError`](crate::GidError) diagnostics instead, unless strict gid
/// checking asks for [`MapError::DanglingGids`].
#[derive(Debug, Error)]
pub enum MapError {
    /// File I/O error
    #[error("I/O error reading {path}: {source}")]
    Io {
        /// File being read
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },

    /// JSON parse error
    #[error("failed to parse JSON {path}: {source}")]
    Json {
        /// File being parsed
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// XML parse error
    #[error("failed to parse XML {path}: {source}")]
    Xml {
        /// File being parsed
        path: PathBuf,
        /// Underlying error
        source: quick_xml::Error,
    },

    /// Unsupported file format
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Structurally invalid document
    #[error("invalid map: {0}")]
    InvalidMap(String),

    /// A required attribute is absent
    #[error("<{element}> is missing required attribute '{attribute}'")]
    MissingAttribute {
        /// Element name
        element: &'static str,
        /// Attribute name
        attribute: &'static str,
    },

    /// An attribute could not be parsed into its expected type
    #[error("<{element}> attribute '{attribute}' has invalid value '{value}'")]
    InvalidAttribute {
        /// Element name
        element: &'static str,
        /// Attribute name
        attribute: String,
        /// Offending value
        value: String,
    },

    /// Unknown map orientation
    #[error("unknown orientation '{0}'")]
    InvalidOrientation(String),

    /// Unknown stagger axis
    #[error("unknown stagger axis '{0}'")]
    InvalidStaggerAxis(String),

    /// Unknown stagger index
    #[error("unknown stagger index '{0}'")]
    InvalidStaggerIndex(String),

    /// Unknown render order
    #[error("unknown render order '{0}'")]
    InvalidRenderOrder(String),

    /// Decoded tile count does not match the declared grid
    #[error("layer '{layer}' has {actual} tiles, expected {width}x{height}")]
    LayerSizeMismatch {
        /// Layer name
        layer: String,
        /// Declared width
        width: usize,
        /// Declared height
        height: usize,
        /// Tiles actually decoded
        actual: usize,
    },

    /// Unknown data encoding
    #[error("unsupported data encoding '{0}'")]
    UnsupportedEncoding(String),

    /// Unknown compression
    #[error("unsupported data compression '{0}'")]
    UnsupportedCompression(String),

    /// Malformed base64 payload
    #[error("malformed base64 layer data: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decompression failed
    #[error("failed to decompress layer data: {0}")]
    Decompress(#[source] io::Error),

    /// Decoded byte payload is not a whole number of `u32`s
    #[error("layer data is {0} bytes, not a multiple of 4")]
    TruncatedData(usize),

    /// A CSV cell is not a valid `u32`
    #[error("invalid CSV tile id '{0}'")]
    InvalidCsv(String),

    /// Two tilesets claim the same gid range
    #[error(
        "tileset '{name}' (gids {first_gid}..{end}) overlaps tileset '{existing}'"
    )]
    OverlappingTilesets {
        /// Tileset being registered
        name: String,
        /// Its first gid
        first_gid: u32,
        /// One past its last gid
        end: u32,
        /// Already registered tileset
        existing: String,
    },

    /// Tileset gid range starts at 0 or runs past the 29 gid bits
    #[error("tileset '{name}' has invalid gid range: first gid {first_gid}, {tile_count} tile(s)")]
    TilesetRange {
        /// Tileset being registered
        name: String,
        /// Its first gid
        first_gid: u32,
        /// Declared tile count
        tile_count: u32,
    },

    /// Unsupported custom property type
    #[error("property '{name}' has unsupported type '{kind}'")]
    UnsupportedPropertyType {
        /// Property name
        name: String,
        /// Declared type
        kind: String,
    },

    /// Unresolved gids in a layer, raised only with strict gid checking
    #[error("layer '{layer}' references {count} gid(s) with no tileset")]
    DanglingGids {
        /// Layer name
        layer: String,
        /// Number of offending cells
        count: usize,
    },

    /// Background loader thread panicked
    #[error("map loader thread panicked")]
    LoaderPanicked,
}
