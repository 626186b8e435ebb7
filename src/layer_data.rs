//! Tile layer payload decoding: CSV, base64 (optionally zlib/gzip
//! compressed) and element-per-cell XML all end up as the same flat `u32`
//! array, which is then laid out row-major into a grid.

use crate::error::MapError;
use crate::ir_map::IrChunk;
use crate::spatial::{Chunk, ChunkedGrid, Grid2D, TileGid};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use flate2::read::{GzDecoder, ZlibDecoder};
use macroquad::math::ivec2;
use std::io::Read;

/// `encoding` attribute of a `<data>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// One `<tile gid=".."/>` child per cell.
    Xml,
    Csv,
    Base64,
}

impl Encoding {
    /// An absent attribute means inline XML.
    pub fn from_attr(value: Option<&str>) -> Result<Self, MapError> {
        match value {
            None | Some("xml") => Ok(Encoding::Xml),
            Some("csv") => Ok(Encoding::Csv),
            Some("base64") => Ok(Encoding::Base64),
            Some(other) => Err(MapError::UnsupportedEncoding(other.to_owned())),
        }
    }
}

/// `compression` attribute of a `<data>` element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Zlib,
    Gzip,
}

impl Compression {
    pub fn from_attr(value: Option<&str>) -> Result<Self, MapError> {
        match value {
            None | Some("") => Ok(Compression::None),
            Some("zlib") => Ok(Compression::Zlib),
            Some("gzip") => Ok(Compression::Gzip),
            Some(other) => Err(MapError::UnsupportedCompression(other.to_owned())),
        }
    }
}

/// Decodes a text payload. `xml_cells` is only read for [`Encoding::Xml`];
/// compression is only valid with base64.
pub fn decode_payload(
    encoding: Encoding,
    compression: Compression,
    text: &str,
    xml_cells: &[u32],
) -> Result<Vec<u32>, MapError> {
    if compression != Compression::None && encoding != Encoding::Base64 {
        return Err(MapError::UnsupportedCompression(format!(
            "{compression:?} with {encoding:?} encoding"
        )));
    }
    match encoding {
        Encoding::Xml => Ok(xml_cells.to_vec()),
        Encoding::Csv => decode_csv(text),
        Encoding::Base64 => decode_base64(text, compression),
    }
}

/// Comma-separated decimal ids; whitespace and a trailing comma are ignored.
pub fn decode_csv(text: &str) -> Result<Vec<u32>, MapError> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<u32>().map_err(|_| MapError::InvalidCsv(s.to_owned())))
        .collect()
}

/// Base64 of little-endian `u32`s, optionally compressed before encoding.
pub fn decode_base64(text: &str, compression: Compression) -> Result<Vec<u32>, MapError> {
    let cleaned: String = text.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD.decode(cleaned.as_bytes())?;

    let bytes = match compression {
        Compression::None => bytes,
        Compression::Zlib => inflate(ZlibDecoder::new(&bytes[..]))?,
        Compression::Gzip => inflate(GzDecoder::new(&bytes[..]))?,
    };

    if bytes.len() % 4 != 0 {
        return Err(MapError::TruncatedData(bytes.len()));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn inflate(mut reader: impl Read) -> Result<Vec<u8>, MapError> {
    let mut out = Vec::new();
    reader.read_to_end(&mut out).map_err(MapError::Decompress)?;
    Ok(out)
}

/// Lays out raw ids row-major: index `i` lands at `(i % width, i / width)`.
pub fn decode(
    layer: &str,
    raw: &[u32],
    width: usize,
    height: usize,
) -> Result<Grid2D<TileGid>, MapError> {
    let cells = raw.iter().map(|&r| TileGid::from(r)).collect();
    Grid2D::from_vec(width, height, cells).ok_or_else(|| MapError::LayerSizeMismatch {
        layer: layer.to_owned(),
        width,
        height,
        actual: raw.len(),
    })
}

/// Decodes every chunk of an infinite layer, each with its own shape check.
pub fn decode_chunks(
    layer: &str,
    chunks: &[IrChunk],
) -> Result<ChunkedGrid<TileGid>, MapError> {
    let mut out = ChunkedGrid::new();
    for c in chunks {
        let fits = |origin: i32, len: usize| {
            i32::try_from(len).ok().and_then(|len| origin.checked_add(len)).is_some()
        };
        if !fits(c.x, c.width) || !fits(c.y, c.height) {
            return Err(MapError::InvalidMap(format!(
                "chunk at ({}, {}) of layer '{layer}' extends past the coordinate range ({}x{})",
                c.x, c.y, c.width, c.height
            )));
        }
        out.insert(Chunk {
            origin: ivec2(c.x, c.y),
            grid: decode(layer, &c.data, c.width, c.height)?,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use std::io::Write;

    fn le_bytes(ids: &[u32]) -> Vec<u8> {
        ids.iter().flat_map(|id| id.to_le_bytes()).collect()
    }

    #[test]
    fn csv_with_newlines_and_trailing_comma() {
        let ids = decode_csv("1,2,\n3,2147483652,\n").expect("csv");
        assert_eq!(ids, vec![1, 2, 3, 0x8000_0004]);
        assert!(matches!(decode_csv("1,x"), Err(MapError::InvalidCsv(s)) if s == "x"));
    }

    #[test]
    fn base64_uncompressed() {
        let text = format!("\n   {}\n  ", STANDARD.encode(le_bytes(&[1, 0, 0x4000_0002])));
        assert_eq!(decode_base64(&text, Compression::None).unwrap(), vec![1, 0, 0x4000_0002]);
    }

    #[test]
    fn base64_zlib_and_gzip() {
        let ids = [5u32, 6, 7, 0, 0x2000_0001, 9];

        let mut z = ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        z.write_all(&le_bytes(&ids)).unwrap();
        let zlib = STANDARD.encode(z.finish().unwrap());
        assert_eq!(decode_base64(&zlib, Compression::Zlib).unwrap(), ids);

        let mut g = GzEncoder::new(Vec::new(), flate2::Compression::default());
        g.write_all(&le_bytes(&ids)).unwrap();
        let gzip = STANDARD.encode(g.finish().unwrap());
        assert_eq!(decode_base64(&gzip, Compression::Gzip).unwrap(), ids);
    }

    #[test]
    fn malformed_payloads_fail() {
        assert!(matches!(decode_base64("@@@@", Compression::None), Err(MapError::Base64(_))));
        let not_zlib = STANDARD.encode([1u8, 2, 3, 4]);
        assert!(matches!(
            decode_base64(&not_zlib, Compression::Zlib),
            Err(MapError::Decompress(_))
        ));
        let odd = STANDARD.encode([1u8, 2, 3]);
        assert!(matches!(decode_base64(&odd, Compression::None), Err(MapError::TruncatedData(3))));
    }

    #[test]
    fn encoding_and_compression_tags() {
        assert_eq!(Encoding::from_attr(None).unwrap(), Encoding::Xml);
        assert!(matches!(Encoding::from_attr(Some("hex")), Err(MapError::UnsupportedEncoding(_))));
        assert!(matches!(
            Compression::from_attr(Some("zstd")),
            Err(MapError::UnsupportedCompression(s)) if s == "zstd"
        ));
        assert!(matches!(
            decode_payload(Encoding::Csv, Compression::Gzip, "1", &[]),
            Err(MapError::UnsupportedCompression(_))
        ));
        assert_eq!(
            decode_payload(Encoding::Xml, Compression::None, "", &[3, 0]).unwrap(),
            vec![3, 0]
        );
    }

    #[test]
    fn grid_layout_is_row_major() {
        let raw = [1, 2, 3, 0x8000_0004, 5, 6];
        let grid = decode("ground", &raw, 3, 2).expect("shape matches");
        for (i, &r) in raw.iter().enumerate() {
            let cell = grid.get(ivec2((i % 3) as i32, (i / 3) as i32)).unwrap();
            assert_eq!(cell.id, r & crate::spatial::GID_MASK);
        }
        assert!(grid.get(ivec2(0, 1)).unwrap().flags.flip_h());

        let err = decode("ground", &raw, 4, 2).unwrap_err();
        assert!(matches!(
            err,
            MapError::LayerSizeMismatch { ref layer, width: 4, height: 2, actual: 6 }
                if layer == "ground"
        ));
    }

    #[test]
    fn huge_declared_size_is_a_mismatch() {
        let err = decode("ground", &[1, 2], 10_000_000_000, 10_000_000_000).unwrap_err();
        assert!(matches!(err, MapError::LayerSizeMismatch { actual: 2, .. }));

        let err = decode("ground", &[1, 2], usize::MAX, 2).unwrap_err();
        assert!(matches!(err, MapError::LayerSizeMismatch { width: usize::MAX, .. }));
    }

    #[test]
    fn chunks_keep_their_origin() {
        let chunks = vec![
            IrChunk { x: -2, y: 0, width: 2, height: 1, data: vec![1, 2] },
            IrChunk { x: 0, y: 0, width: 2, height: 1, data: vec![3, 4] },
        ];
        let grid = decode_chunks("inf", &chunks).expect("chunks");
        assert_eq!(grid.get(ivec2(-1, 0)).map(|g| g.id), Some(2));
        assert_eq!(grid.get(ivec2(1, 0)).map(|g| g.id), Some(4));

        let bad = vec![IrChunk { x: 0, y: 0, width: 2, height: 2, data: vec![1] }];
        assert!(matches!(decode_chunks("inf", &bad), Err(MapError::LayerSizeMismatch { .. })));
    }

    #[test]
    fn chunk_past_the_coordinate_range_is_rejected() {
        let edge = vec![IrChunk { x: i32::MAX - 2, y: 0, width: 2, height: 1, data: vec![1, 2] }];
        let grid = decode_chunks("inf", &edge).expect("fits");
        assert_eq!(grid.get(ivec2(i32::MAX - 1, 0)).map(|g| g.id), Some(2));
        assert_eq!(grid.get(ivec2(i32::MIN, 0)), None);

        let past = vec![IrChunk { x: i32::MAX - 1, y: 0, width: 2, height: 1, data: vec![1, 2] }];
        assert!(matches!(decode_chunks("inf", &past), Err(MapError::InvalidMap(_))));
    }
}
