use super::grid::Grid2D;
use macroquad::math::{ivec2, IVec2};
use std::collections::HashMap;

/// Bucket index of a chunk: its origin divided by the chunk size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

/// A rectangular piece of an infinite layer, placed at `origin` in tile space.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk<T> {
    pub origin: IVec2,
    pub grid: Grid2D<T>,
}

impl<T> Chunk<T> {
    /// Chunk-local cell of a map coordinate, `None` if the offset overflows.
    fn local(&self, coord: IVec2) -> Option<IVec2> {
        Some(ivec2(
            coord.x.checked_sub(self.origin.x)?,
            coord.y.checked_sub(self.origin.y)?,
        ))
    }

    pub fn contains(&self, coord: IVec2) -> bool {
        self.local(coord).is_some_and(|l| self.grid.contains(l))
    }

    pub fn get(&self, coord: IVec2) -> Option<&T> {
        self.grid.get(self.local(coord)?)
    }

    /// Cells with their map-space coordinate.
    pub fn iter(&self) -> impl Iterator<Item = (IVec2, &T)> + '_ {
        self.grid.iter().map(move |(c, v)| (c + self.origin, v))
    }
}

/// Sparse tile storage for infinite maps.
///
/// Chunks whose origin is aligned to the common chunk size are bucketed with
/// `div_euclid`; anything irregular is still reachable through a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkedGrid<T> {
    chunk_size: IVec2,
    chunks: Vec<Chunk<T>>,
    buckets: HashMap<ChunkCoord, usize>,
}

impl<T> Default for ChunkedGrid<T> {
    fn default() -> Self {
        ChunkedGrid {
            chunk_size: IVec2::ZERO,
            chunks: Vec::new(),
            buckets: HashMap::new(),
        }
    }
}

#[inline]
pub fn tile_to_chunk(coord: IVec2, chunk_size: IVec2) -> ChunkCoord {
    ChunkCoord {
        x: coord.x.div_euclid(chunk_size.x),
        y: coord.y.div_euclid(chunk_size.y),
    }
}

impl<T> ChunkedGrid<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chunk: Chunk<T>) {
        let size = ivec2(chunk.grid.width() as i32, chunk.grid.height() as i32);
        if self.chunk_size == IVec2::ZERO && size.x > 0 && size.y > 0 {
            self.chunk_size = size;
        }
        let idx = self.chunks.len();
        if size == self.chunk_size
            && chunk.origin.x.rem_euclid(size.x) == 0
            && chunk.origin.y.rem_euclid(size.y) == 0
        {
            self.buckets
                .insert(tile_to_chunk(chunk.origin, size), idx);
        }
        self.chunks.push(chunk);
    }

    pub fn chunks(&self) -> &[Chunk<T>] {
        &self.chunks
    }

    pub fn chunk_size(&self) -> IVec2 {
        self.chunk_size
    }

    pub fn get(&self, coord: IVec2) -> Option<&T> {
        if self.chunk_size.x > 0 && self.chunk_size.y > 0 {
            let key = tile_to_chunk(coord, self.chunk_size);
            if let Some(&i) = self.buckets.get(&key) {
                return self.chunks[i].get(coord);
            }
        }
        self.chunks
            .iter()
            .find(|c| c.contains(coord))
            .and_then(|c| c.get(coord))
    }

    pub fn iter(&self) -> impl Iterator<Item = (IVec2, &T)> + '_ {
        self.chunks.iter().flat_map(|c| c.iter())
    }

    /// Tile-space bounds `(min, max_exclusive)` of all chunks.
    pub fn bounds(&self) -> Option<(IVec2, IVec2)> {
        self.chunks.iter().fold(None, |acc, c| {
            let lo = c.origin;
            let hi = c.origin + ivec2(c.grid.width() as i32, c.grid.height() as i32);
            Some(match acc {
                None => (lo, hi),
                Some((a, b)) => (a.min(lo), b.max(hi)),
            })
        })
    }
}
