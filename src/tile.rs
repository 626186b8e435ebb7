//! Placement of decoded cells: tileset lookup, orientation and position.

use crate::geometry::{CoordinateTransformer, Orientation};
use crate::spatial::{Chunk, ChunkedGrid, Grid2D, TileFlags, TileGid};
use crate::tileset::{TilesetId, TilesetRegistry};
use macroquad::math::{vec2, IVec2, Vec2};
use std::fmt;

/// Corner of the tile texture pinned to the cell's bottom-left corner when
/// the tileset's tile size differs from the map grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorCorner {
    BottomLeft,
    BottomRight,
    TopLeft,
    TopRight,
}

impl AnchorCorner {
    /// Normalized anchor, y up.
    pub fn point(self) -> Vec2 {
        match self {
            AnchorCorner::BottomLeft => vec2(0.0, 0.0),
            AnchorCorner::BottomRight => vec2(1.0, 0.0),
            AnchorCorner::TopLeft => vec2(0.0, 1.0),
            AnchorCorner::TopRight => vec2(1.0, 1.0),
        }
    }
}

/// Net rotation and axis flips for one combination of flip flags.
///
/// Scale is applied before rotation; positive rotation is counter-clockwise
/// in render space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlipTransform {
    pub rotation_degrees: i32,
    pub scale_x: i8,
    pub scale_y: i8,
    pub anchor: AnchorCorner,
}

const fn flip(
    rotation_degrees: i32,
    scale_x: i8,
    scale_y: i8,
    anchor: AnchorCorner,
) -> FlipTransform {
    FlipTransform {
        rotation_degrees,
        scale_x,
        scale_y,
        anchor,
    }
}

/// Indexed by [`TileFlags::index`] (`h << 2 | v << 1 | d`). The diagonal flag
/// transposes the texture before the horizontal and vertical flips.
const FLIP_TABLE: [FlipTransform; 8] = {
    use AnchorCorner::*;
    [
        flip(0, 1, 1, BottomLeft),    // -
        flip(-90, 1, -1, TopRight),   // d
        flip(0, 1, -1, TopLeft),      // v
        flip(90, 1, 1, TopLeft),      // v d
        flip(0, -1, 1, BottomRight),  // h
        flip(-90, 1, 1, BottomRight), // h d
        flip(0, -1, -1, TopRight),    // h v
        flip(-90, -1, 1, BottomLeft), // h v d
    ]
};

impl FlipTransform {
    pub fn for_flags(flags: TileFlags) -> Self {
        FLIP_TABLE[flags.index()]
    }

    pub fn rotation_radians(self) -> f32 {
        (self.rotation_degrees as f32).to_radians()
    }

    pub fn scale(self) -> Vec2 {
        vec2(self.scale_x as f32, self.scale_y as f32)
    }
}

/// A positioned tile instance, ready for a renderer.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedTile {
    pub coord: IVec2,
    pub gid: TileGid,
    pub tileset: TilesetId,
    pub local_id: u32,
    /// Render space (y up), floored to whole pixels.
    pub position: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    /// Normalized anchor of the texture at `position`.
    pub anchor: Vec2,
}

/// A cell whose gid no tileset claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GidError {
    pub coord: IVec2,
    pub gid: u32,
}

impl fmt::Display for GidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gid {} at ({}, {})", self.gid, self.coord.x, self.coord.y)
    }
}

/// Placed tiles of one layer plus the cells that could not be resolved.
#[derive(Debug, Clone)]
pub struct LayerBuild<T> {
    pub tiles: T,
    pub gid_errors: Vec<GidError>,
}

/// Turns decoded cells into [`PlacedTile`]s.
pub struct TileInstanceBuilder<'a> {
    transformer: &'a CoordinateTransformer,
    registry: &'a TilesetRegistry,
    cell_size: Vec2,
    /// Accumulated layer offset, in screen pixels.
    offset: Vec2,
}

impl<'a> TileInstanceBuilder<'a> {
    pub fn new(
        transformer: &'a CoordinateTransformer,
        registry: &'a TilesetRegistry,
        cell_size: Vec2,
    ) -> Self {
        TileInstanceBuilder {
            transformer,
            registry,
            cell_size,
            offset: Vec2::ZERO,
        }
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// `Ok(None)` for empty cells, `Err` for gids without a tileset.
    pub fn place(&self, coord: IVec2, gid: TileGid) -> Result<Option<PlacedTile>, GidError> {
        if gid.is_empty() {
            return Ok(None);
        }
        let (tileset, local_id) = self
            .registry
            .resolve(gid.id)
            .ok_or(GidError { coord, gid: gid.id })?;
        // resolve only hands out ids it owns
        let Some(entry) = self.registry.get(tileset) else {
            return Err(GidError { coord, gid: gid.id });
        };

        let flip = FlipTransform::for_flags(gid.flags);
        let offset = entry.tile_offset + self.offset;
        let center = self.transformer.point_for_coordinate(coord, offset.x, offset.y);

        let tile_size = vec2(entry.tile_width as f32, entry.tile_height as f32);
        let (position, anchor) = if tile_size == self.cell_size {
            (center, vec2(0.5, 0.5))
        } else {
            self.corner_anchor(center, flip.anchor)
        };

        Ok(Some(PlacedTile {
            coord,
            gid,
            tileset,
            local_id,
            position,
            rotation: flip.rotation_radians(),
            scale: flip.scale(),
            anchor,
        }))
    }

    /// Pins the texture to the bottom of the cell: the bottom-left corner
    /// for rectangular cells, the bottom vertex for isometric diamonds.
    fn corner_anchor(&self, center: Vec2, corner: AnchorCorner) -> (Vec2, Vec2) {
        let half = self.cell_size / 2.0;
        let anchor = corner.point();
        match self.transformer.orientation() {
            Orientation::Isometric => (vec2(center.x, center.y - half.y), vec2(0.5, anchor.y)),
            _ => (center - half, anchor),
        }
    }

    pub fn build_grid(&self, cells: &Grid2D<TileGid>) -> LayerBuild<Grid2D<Option<PlacedTile>>> {
        let mut gid_errors = Vec::new();
        let tiles = cells.map(|coord, &gid| self.place(coord, gid).unwrap_or_else(|e| {
            gid_errors.push(e);
            None
        }));
        LayerBuild { tiles, gid_errors }
    }

    pub fn build_chunks(
        &self,
        cells: &ChunkedGrid<TileGid>,
    ) -> LayerBuild<ChunkedGrid<Option<PlacedTile>>> {
        let mut tiles = ChunkedGrid::new();
        let mut gid_errors = Vec::new();
        for chunk in cells.chunks() {
            let origin = chunk.origin;
            let grid = chunk.grid.map(|local, &gid| {
                self.place(local + origin, gid).unwrap_or_else(|e| {
                    gid_errors.push(e);
                    None
                })
            });
            tiles.insert(Chunk { origin, grid });
        }
        LayerBuild { tiles, gid_errors }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::MapDescriptor;
    use crate::tileset::TilesetEntry;
    use macroquad::math::ivec2;
    use std::f32::consts::FRAC_PI_2;

    #[test]
    fn flip_table_matches_reference() {
        use AnchorCorner::*;
        let expected = [
            ((false, false, false), (0, 1, 1, BottomLeft)),
            ((true, false, false), (0, -1, 1, BottomRight)),
            ((false, true, false), (0, 1, -1, TopLeft)),
            ((true, true, false), (0, -1, -1, TopRight)),
            ((false, false, true), (-90, 1, -1, TopRight)),
            ((true, false, true), (-90, 1, 1, BottomRight)),
            ((false, true, true), (90, 1, 1, TopLeft)),
            ((true, true, true), (-90, -1, 1, BottomLeft)),
        ];
        let mut seen = std::collections::HashSet::new();
        for ((h, v, d), (rot, sx, sy, anchor)) in expected {
            let t = FlipTransform::for_flags(TileFlags::new(h, v, d));
            assert_eq!(t, flip(rot, sx, sy, anchor), "flags h={h} v={v} d={d}");
            assert!(seen.insert(t));
        }
        assert_eq!(seen.len(), 8);
    }

    /// Applies scale then rotation to a point, in render space.
    fn apply(t: FlipTransform, p: Vec2) -> Vec2 {
        let s = p * t.scale();
        let r = t.rotation_radians();
        let (sin, cos) = (r.sin().round(), r.cos().round());
        vec2(s.x * cos - s.y * sin, s.x * sin + s.y * cos)
    }

    #[test]
    fn diagonal_flag_is_a_transpose() {
        // In y-down texture space a transpose maps (x, y) to (y, x); with y
        // up that is (x, y) -> (-y, -x).
        let t = FlipTransform::for_flags(TileFlags::new(false, false, true));
        assert_eq!(apply(t, vec2(1.0, 0.0)), vec2(0.0, -1.0));
        assert_eq!(apply(t, vec2(0.0, 1.0)), vec2(-1.0, 0.0));
    }

    #[test]
    fn anchor_corner_lands_on_visual_bottom_left() {
        for bits in 0..8u8 {
            let flags = TileFlags::new(bits & 4 != 0, bits & 2 != 0, bits & 1 != 0);
            let t = FlipTransform::for_flags(flags);
            let corner = t.anchor.point() * 2.0 - Vec2::ONE;
            assert_eq!(apply(t, corner), vec2(-1.0, -1.0), "bits {bits:03b}");
        }
    }

    fn registry(tile_w: u32, tile_h: u32) -> TilesetRegistry {
        let mut reg = TilesetRegistry::new();
        reg.register(TilesetEntry::new("terrain", 1, 16, tile_w, tile_h)).unwrap();
        reg
    }

    #[test]
    fn places_matching_tiles_at_cell_center() {
        let t = MapDescriptor::orthogonal(4, 4, 32, 32).transformer();
        let reg = registry(32, 32);
        let builder = TileInstanceBuilder::new(&t, &reg, vec2(32.0, 32.0));

        let tile = builder
            .place(ivec2(3, 2), TileGid::from(0x8000_0005))
            .expect("resolves")
            .expect("not empty");
        assert_eq!(tile.local_id, 4);
        assert_eq!(tile.position, vec2(112.0, -80.0));
        assert_eq!(tile.scale, vec2(-1.0, 1.0));
        assert_eq!(tile.rotation, 0.0);
        assert_eq!(tile.anchor, vec2(0.5, 0.5));

        assert_eq!(builder.place(ivec2(0, 0), TileGid::EMPTY), Ok(None));
        assert_eq!(
            builder.place(ivec2(1, 1), TileGid::from(40)),
            Err(GidError { coord: ivec2(1, 1), gid: 40 })
        );
    }

    #[test]
    fn oversized_tiles_pin_a_corner() {
        let t = MapDescriptor::orthogonal(4, 4, 32, 32).transformer();
        let reg = registry(64, 96);
        let builder = TileInstanceBuilder::new(&t, &reg, vec2(32.0, 32.0));

        let tile = builder.place(ivec2(1, 1), TileGid::from(0x2000_0001)).unwrap().unwrap();
        // cell (1,1) spans x 32..64, y -32..-64 in render space
        assert_eq!(tile.position, vec2(32.0, -64.0));
        assert_eq!(tile.anchor, vec2(1.0, 1.0));
        assert!((tile.rotation + FRAC_PI_2).abs() < 1e-6);
        assert_eq!(tile.scale, vec2(1.0, -1.0));
    }

    #[test]
    fn tileset_offset_shifts_position() {
        let t = MapDescriptor::orthogonal(4, 4, 16, 16).transformer();
        let mut reg = TilesetRegistry::new();
        let mut ts = TilesetEntry::new("offset", 1, 4, 16, 16);
        ts.tile_offset = vec2(2.0, 4.0);
        reg.register(ts).unwrap();
        let builder = TileInstanceBuilder::new(&t, &reg, vec2(16.0, 16.0));
        let tile = builder.place(ivec2(0, 0), TileGid::from(1)).unwrap().unwrap();
        assert_eq!(tile.position, vec2(10.0, -12.0));

        let shifted =
            TileInstanceBuilder::new(&t, &reg, vec2(16.0, 16.0)).with_offset(vec2(4.0, 8.0));
        let tile = shifted.place(ivec2(0, 0), TileGid::from(1)).unwrap().unwrap();
        assert_eq!(tile.position, vec2(14.0, -20.0));
    }

    #[test]
    fn layer_build_collects_dangling_gids() {
        let t = MapDescriptor::orthogonal(3, 1, 16, 16).transformer();
        let reg = registry(16, 16);
        let builder = TileInstanceBuilder::new(&t, &reg, vec2(16.0, 16.0));
        let raw = vec![TileGid::from(1), TileGid::from(99), TileGid::EMPTY];
        let cells = Grid2D::from_vec(3, 1, raw).unwrap();

        let build = builder.build_grid(&cells);
        assert!(build.tiles.get(ivec2(0, 0)).unwrap().is_some());
        assert!(build.tiles.get(ivec2(1, 0)).unwrap().is_none());
        assert_eq!(build.gid_errors, vec![GidError { coord: ivec2(1, 0), gid: 99 }]);
    }

    #[test]
    fn chunk_tiles_use_map_coordinates() {
        let t = MapDescriptor::orthogonal(0, 0, 16, 16).transformer();
        let reg = registry(16, 16);
        let builder = TileInstanceBuilder::new(&t, &reg, vec2(16.0, 16.0));
        let mut cells = ChunkedGrid::new();
        cells.insert(Chunk {
            origin: ivec2(-2, 0),
            grid: Grid2D::from_vec(2, 1, vec![TileGid::from(2), TileGid::from(77)]).unwrap(),
        });
        let build = builder.build_chunks(&cells);
        let tile = build.tiles.get(ivec2(-2, 0)).unwrap().as_ref().unwrap();
        assert_eq!(tile.coord, ivec2(-2, 0));
        assert_eq!(tile.position, vec2(-24.0, -8.0));
        assert_eq!(build.gid_errors, vec![GidError { coord: ivec2(-1, 0), gid: 77 }]);
    }
}
