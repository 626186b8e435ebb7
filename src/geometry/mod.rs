//! Map projections and tile/screen coordinate conversion.

mod transform;

pub use transform::CoordinateTransformer;

use crate::error::MapError;
use std::fmt;
use std::str::FromStr;

/// Geometric projection used to lay out tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Orientation {
    Orthogonal,
    Isometric,
    Hexagonal,
    /// Staggered isometric.
    Staggered,
}

impl Orientation {
    /// Hexagonal and staggered maps offset every other row or column.
    pub fn is_staggered(self) -> bool {
        matches!(self, Orientation::Hexagonal | Orientation::Staggered)
    }
}

impl FromStr for Orientation {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, MapError> {
        match s {
            "orthogonal" => Ok(Orientation::Orthogonal),
            "isometric" => Ok(Orientation::Isometric),
            "hexagonal" => Ok(Orientation::Hexagonal),
            "staggered" => Ok(Orientation::Staggered),
            other => Err(MapError::InvalidOrientation(other.to_owned())),
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Orientation::Orthogonal => "orthogonal",
            Orientation::Isometric => "isometric",
            Orientation::Hexagonal => "hexagonal",
            Orientation::Staggered => "staggered",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StaggerAxis {
    X,
    #[default]
    Y,
}

impl FromStr for StaggerAxis {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, MapError> {
        match s {
            "x" => Ok(StaggerAxis::X),
            "y" => Ok(StaggerAxis::Y),
            other => Err(MapError::InvalidStaggerAxis(other.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StaggerIndex {
    #[default]
    Odd,
    Even,
}

impl FromStr for StaggerIndex {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, MapError> {
        match s {
            "odd" => Ok(StaggerIndex::Odd),
            "even" => Ok(StaggerIndex::Even),
            other => Err(MapError::InvalidStaggerIndex(other.to_owned())),
        }
    }
}

/// Draw order of tiles. Parsed and kept, but tile data is always laid out
/// row-major from the top-left regardless of this value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderOrder {
    #[default]
    RightDown,
    RightUp,
    LeftDown,
    LeftUp,
}

impl FromStr for RenderOrder {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, MapError> {
        match s {
            "right-down" => Ok(RenderOrder::RightDown),
            "right-up" => Ok(RenderOrder::RightUp),
            "left-down" => Ok(RenderOrder::LeftDown),
            "left-up" => Ok(RenderOrder::LeftUp),
            other => Err(MapError::InvalidRenderOrder(other.to_owned())),
        }
    }
}

/// Which axis is staggered and which indices are shifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Stagger {
    pub axis: StaggerAxis,
    pub index: StaggerIndex,
}

/// Immutable description of a map's grid.
#[derive(Debug, Clone, PartialEq)]
pub struct MapDescriptor {
    pub orientation: Orientation,
    /// Map size in tiles.
    pub width: u32,
    pub height: u32,
    /// Grid cell size in pixels.
    pub tile_width: u32,
    pub tile_height: u32,
    /// Hexagonal maps only.
    pub hex_side_length: Option<u32>,
    /// Hexagonal and staggered maps only.
    pub stagger: Option<Stagger>,
    pub render_order: RenderOrder,
    pub infinite: bool,
}

impl MapDescriptor {
    pub fn orthogonal(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        MapDescriptor {
            orientation: Orientation::Orthogonal,
            width,
            height,
            tile_width,
            tile_height,
            hex_side_length: None,
            stagger: None,
            render_order: RenderOrder::RightDown,
            infinite: false,
        }
    }

    pub fn isometric(width: u32, height: u32, tile_width: u32, tile_height: u32) -> Self {
        MapDescriptor {
            orientation: Orientation::Isometric,
            ..Self::orthogonal(width, height, tile_width, tile_height)
        }
    }

    pub fn hexagonal(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        hex_side_length: u32,
        stagger: Stagger,
    ) -> Self {
        MapDescriptor {
            orientation: Orientation::Hexagonal,
            hex_side_length: Some(hex_side_length),
            stagger: Some(stagger),
            ..Self::orthogonal(width, height, tile_width, tile_height)
        }
    }

    pub fn staggered(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
        stagger: Stagger,
    ) -> Self {
        MapDescriptor {
            orientation: Orientation::Staggered,
            stagger: Some(stagger),
            ..Self::orthogonal(width, height, tile_width, tile_height)
        }
    }

    /// Builds the transformer for this map.
    ///
    /// # Panics
    /// If a hexagonal map has no side length, or a hexagonal/staggered map
    /// has no stagger parameters.
    pub fn transformer(&self) -> CoordinateTransformer {
        CoordinateTransformer::new(self)
    }
}

#[inline]
fn to_i32(v: u32) -> i32 {
    i32::try_from(v).unwrap_or(i32::MAX)
}

/// Integer layout parameters shared by the hexagonal and staggered math.
///
/// Tile sizes are rounded down to even numbers so that half sizes are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    pub tile_width: i32,
    pub tile_height: i32,
    pub side_length_x: i32,
    pub side_length_y: i32,
    pub side_offset_x: i32,
    pub side_offset_y: i32,
    pub column_width: i32,
    pub row_height: i32,
    pub stagger_x: bool,
    pub stagger_even: bool,
}

impl RenderParams {
    pub fn new(desc: &MapDescriptor) -> Self {
        let stagger = match desc.orientation {
            Orientation::Hexagonal | Orientation::Staggered => desc.stagger.unwrap_or_else(|| {
                panic!("{} map descriptor has no stagger parameters", desc.orientation)
            }),
            _ => Stagger::default(),
        };
        let tile_width = to_i32(desc.tile_width) & !1;
        let tile_height = to_i32(desc.tile_height) & !1;
        let stagger_x = stagger.axis == StaggerAxis::X;

        let (mut side_length_x, mut side_length_y) = (0, 0);
        if desc.orientation == Orientation::Hexagonal {
            let side = desc
                .hex_side_length
                .expect("hexagonal map descriptor has no hex side length");
            let side = to_i32(side);
            if stagger_x {
                side_length_x = side;
            } else {
                side_length_y = side;
            }
        }

        let side_offset_x = tile_width.saturating_sub(side_length_x) / 2;
        let side_offset_y = tile_height.saturating_sub(side_length_y) / 2;

        RenderParams {
            tile_width,
            tile_height,
            side_length_x,
            side_length_y,
            side_offset_x,
            side_offset_y,
            column_width: side_offset_x.saturating_add(side_length_x),
            row_height: side_offset_y.saturating_add(side_length_y),
            stagger_x,
            stagger_even: stagger.index == StaggerIndex::Even,
        }
    }

    #[inline]
    fn parity(&self, v: i32) -> bool {
        ((v & 1) ^ self.stagger_even as i32) != 0
    }

    /// Column `x` is shifted down.
    #[inline]
    pub fn do_stagger_x(&self, x: i32) -> bool {
        self.stagger_x && self.parity(x)
    }

    /// Row `y` is shifted right.
    #[inline]
    pub fn do_stagger_y(&self, y: i32) -> bool {
        !self.stagger_x && self.parity(y)
    }
}
