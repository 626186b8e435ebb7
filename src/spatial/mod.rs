//! Storage primitives: tile id codec, fixed grids and chunked grids.

pub mod chunk;
pub mod gid;
pub mod grid;

pub use chunk::{Chunk, ChunkCoord, ChunkedGrid};
pub use gid::{TileFlags, TileGid, FLIP_D, FLIP_H, FLIP_MASK, FLIP_V, GID_MASK};
pub use grid::Grid2D;
