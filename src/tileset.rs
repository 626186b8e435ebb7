use crate::error::MapError;
use crate::ir_map::{IrTileMetadata, IrTileset, Properties};
use crate::spatial::gid::GID_MASK;
use macroquad::math::{Rect, Vec2};

/// Stable index of a tileset inside a [`TilesetRegistry`], in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TilesetId(pub usize);

/// A tileset as referenced by one map.
#[derive(Debug, Clone)]
pub struct TilesetEntry {
    pub name: String,
    pub first_gid: u32,
    pub tile_count: u32,
    /// Size of one tile image, which may differ from the map grid.
    pub tile_width: u32,
    pub tile_height: u32,
    pub columns: u32,
    pub spacing: u32,
    pub margin: u32,
    pub image: Option<String>,
    /// Drawing offset applied to every tile of this set.
    pub tile_offset: Vec2,
    pub properties: Properties,
    pub tiles: Vec<IrTileMetadata>,
}

impl TilesetEntry {
    pub fn new(
        name: impl Into<String>,
        first_gid: u32,
        tile_count: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Self {
        TilesetEntry {
            name: name.into(),
            first_gid,
            tile_count,
            tile_width,
            tile_height,
            columns: 0,
            spacing: 0,
            margin: 0,
            image: None,
            tile_offset: Vec2::ZERO,
            properties: Properties::new(),
            tiles: Vec::new(),
        }
    }

    /// One past the last gid claimed by this tileset.
    #[inline]
    pub fn end_gid(&self) -> u32 {
        self.first_gid.saturating_add(self.tile_count)
    }

    #[inline]
    pub fn contains(&self, gid: u32) -> bool {
        gid >= self.first_gid && gid < self.end_gid()
    }

    #[inline]
    pub fn global_id(&self, local_id: u32) -> u32 {
        self.first_gid + local_id
    }

    /// Atlas rectangle of a local tile, accounting for margin and spacing.
    pub fn tile_rect(&self, local_id: u32) -> Option<Rect> {
        if self.columns == 0 || local_id >= self.tile_count {
            return None;
        }
        let col = local_id % self.columns;
        let row = local_id / self.columns;
        let sx = self.margin + col * (self.tile_width + self.spacing);
        let sy = self.margin + row * (self.tile_height + self.spacing);
        Some(Rect::new(
            sx as f32,
            sy as f32,
            self.tile_width as f32,
            self.tile_height as f32,
        ))
    }

    pub fn tile_metadata(&self, local_id: u32) -> Option<&IrTileMetadata> {
        self.tiles.iter().find(|t| t.id == local_id)
    }
}

impl From<IrTileset> for TilesetEntry {
    fn from(t: IrTileset) -> Self {
        TilesetEntry {
            name: t.name,
            first_gid: t.first_gid,
            tile_count: t.tilecount,
            tile_width: t.tile_w,
            tile_height: t.tile_h,
            columns: t.columns,
            spacing: t.spacing,
            margin: t.margin,
            image: t.image,
            tile_offset: t.tile_offset,
            properties: t.properties,
            tiles: t.tiles,
        }
    }
}

/// All tilesets of a map, searchable by gid.
#[derive(Debug, Clone, Default)]
pub struct TilesetRegistry {
    entries: Vec<TilesetEntry>,
    // entry indices sorted by first_gid
    by_gid: Vec<usize>,
}

impl TilesetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tileset; fails if its gid range overlaps an existing one or
    /// does not fit in the 29 gid bits.
    pub fn register(&mut self, entry: TilesetEntry) -> Result<TilesetId, MapError> {
        let fits = entry
            .first_gid
            .checked_add(entry.tile_count)
            .is_some_and(|end| end <= GID_MASK + 1);
        if entry.first_gid == 0 || !fits {
            return Err(MapError::TilesetRange {
                name: entry.name,
                first_gid: entry.first_gid,
                tile_count: entry.tile_count,
            });
        }

        let pos = self
            .by_gid
            .partition_point(|&i| self.entries[i].first_gid < entry.first_gid);

        let neighbours = [pos.checked_sub(1), Some(pos)];
        for i in neighbours.into_iter().flatten() {
            let Some(&idx) = self.by_gid.get(i) else {
                continue;
            };
            let other = &self.entries[idx];
            let overlaps = entry.first_gid < other.end_gid() && other.first_gid < entry.end_gid();
            // A zero-sized set sitting on another's first gid still collides.
            if overlaps || entry.first_gid == other.first_gid {
                let end = entry.end_gid();
                return Err(MapError::OverlappingTilesets {
                    name: entry.name,
                    first_gid: entry.first_gid,
                    end,
                    existing: other.name.clone(),
                });
            }
        }

        let id = TilesetId(self.entries.len());
        self.entries.push(entry);
        self.by_gid.insert(pos, id.0);
        Ok(id)
    }

    /// Owning tileset and local id of a gid; flip bits are ignored.
    /// `None` for gid 0 and for gids no tileset claims.
    pub fn resolve(&self, gid: u32) -> Option<(TilesetId, u32)> {
        let gid = gid & GID_MASK;
        if gid == 0 {
            return None;
        }
        let pos = self
            .by_gid
            .partition_point(|&i| self.entries[i].first_gid <= gid);
        let idx = *self.by_gid.get(pos.checked_sub(1)?)?;
        let entry = &self.entries[idx];
        entry
            .contains(gid)
            .then(|| (TilesetId(idx), gid - entry.first_gid))
    }

    pub fn resolve_entry(&self, gid: u32) -> Option<(&TilesetEntry, u32)> {
        self.resolve(gid).map(|(id, local)| (&self.entries[id.0], local))
    }

    pub fn global_id(&self, id: TilesetId, local_id: u32) -> Option<u32> {
        self.get(id).map(|e| e.global_id(local_id))
    }

    pub fn get(&self, id: TilesetId) -> Option<&TilesetEntry> {
        self.entries.get(id.0)
    }

    /// Tilesets in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (TilesetId, &TilesetEntry)> + '_ {
        self.entries.iter().enumerate().map(|(i, e)| (TilesetId(i), e))
    }

    /// Tilesets in ascending `first_gid` order.
    pub fn sorted(&self) -> impl Iterator<Item = &TilesetEntry> + '_ {
        self.by_gid.iter().map(|&i| &self.entries[i])
    }

    pub fn by_name(&self, name: &str) -> Option<&TilesetEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, first_gid: u32, count: u32) -> TilesetEntry {
        TilesetEntry::new(name, first_gid, count, 16, 16)
    }

    #[test]
    fn overlapping_ranges_are_rejected() {
        let mut reg = TilesetRegistry::new();
        reg.register(entry("a", 1, 10)).expect("first");
        let err = reg.register(entry("b", 5, 10)).unwrap_err();
        assert!(matches!(
            err,
            MapError::OverlappingTilesets { ref name, ref existing, first_gid: 5, end: 15 }
                if name == "b" && existing == "a"
        ));
        // inserted before an existing range
        reg.register(entry("c", 20, 5)).expect("disjoint");
        assert!(reg.register(entry("d", 15, 6)).is_err());
        reg.register(entry("e", 11, 9)).expect("exactly fills the gap");
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn out_of_range_gids_are_rejected() {
        let mut reg = TilesetRegistry::new();
        let err = reg.register(entry("huge", u32::MAX - 2, 10)).unwrap_err();
        assert!(matches!(
            err,
            MapError::TilesetRange { ref name, tile_count: 10, .. } if name == "huge"
        ));
        assert!(matches!(reg.register(entry("zero", 0, 4)), Err(MapError::TilesetRange { .. })));
        assert!(reg.register(entry("flag bits", GID_MASK, 2)).is_err());
        reg.register(entry("last", GID_MASK, 1)).expect("ends at the last gid");
        assert_eq!(entry("sat", u32::MAX, 5).end_gid(), u32::MAX);
    }

    #[test]
    fn resolves_across_unsorted_registration() {
        let mut reg = TilesetRegistry::new();
        let late = reg.register(entry("late", 101, 50)).unwrap();
        let early = reg.register(entry("early", 1, 100)).unwrap();

        assert_eq!(reg.resolve(1), Some((early, 0)));
        assert_eq!(reg.resolve(100), Some((early, 99)));
        assert_eq!(reg.resolve(101), Some((late, 0)));
        assert_eq!(reg.resolve(0x8000_0000 | 120), Some((late, 19)));
        assert_eq!(reg.resolve(151), None);
        assert_eq!(reg.resolve(0), None);
        assert_eq!(reg.global_id(late, 19), Some(120));

        let names: Vec<&str> = reg.sorted().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["early", "late"]);
    }

    #[test]
    fn gap_between_tilesets_is_dangling() {
        let mut reg = TilesetRegistry::new();
        reg.register(entry("a", 1, 4)).unwrap();
        reg.register(entry("b", 10, 4)).unwrap();
        assert_eq!(reg.resolve(7), None);
        assert_eq!(reg.resolve_entry(11).map(|(e, l)| (e.name.as_str(), l)), Some(("b", 1)));
    }

    #[test]
    fn atlas_rect_honours_margin_and_spacing() {
        let mut ts = entry("atlas", 1, 6);
        ts.columns = 3;
        ts.margin = 2;
        ts.spacing = 1;
        assert_eq!(ts.tile_rect(4), Some(Rect::new(19.0, 19.0, 16.0, 16.0)));
        assert_eq!(ts.tile_rect(6), None);
    }
}
