//! Global tile id encoding.
//!
//! Tiled stores three orientation flags in the top bits of every 32-bit tile
//! id. They are split off once, at decode time, into a [`TileGid`]; nothing
//! downstream ever re-masks a raw value.

pub const FLIP_H: u32 = 0x8000_0000; // bit 31
pub const FLIP_V: u32 = 0x4000_0000; // bit 30
pub const FLIP_D: u32 = 0x2000_0000; // bit 29
pub const FLIP_MASK: u32 = FLIP_H | FLIP_V | FLIP_D;
pub const GID_MASK: u32 = !FLIP_MASK; // keep lower 29 bits

/// Per-cell orientation flags, packed as `0b0000_0hvd`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileFlags(u8);

impl TileFlags {
    pub const NONE: TileFlags = TileFlags(0);
    const H: u8 = 0b100;
    const V: u8 = 0b010;
    const D: u8 = 0b001;

    pub fn new(flip_h: bool, flip_v: bool, flip_d: bool) -> Self {
        let mut bits = 0;
        if flip_h {
            bits |= Self::H;
        }
        if flip_v {
            bits |= Self::V;
        }
        if flip_d {
            bits |= Self::D;
        }
        TileFlags(bits)
    }

    #[inline] pub fn flip_h(self) -> bool { self.0 & Self::H != 0 }
    #[inline] pub fn flip_v(self) -> bool { self.0 & Self::V != 0 }
    #[inline] pub fn flip_d(self) -> bool { self.0 & Self::D != 0 }
    #[inline] pub fn is_empty(self) -> bool { self.0 == 0 }

    /// Index in `0..8`, ordered `h, v, d` from most to least significant.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A global tile id with its flip flags already split off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TileGid {
    pub id: u32,
    pub flags: TileFlags,
}

impl TileGid {
    pub const EMPTY: TileGid = TileGid {
        id: 0,
        flags: TileFlags::NONE,
    };

    /// Id 0 means "no tile here".
    #[inline]
    pub fn is_empty(self) -> bool {
        self.id == 0
    }

    #[inline]
    pub fn raw(self) -> u32 {
        encode(self.id, self.flags.flip_h(), self.flags.flip_v(), self.flags.flip_d())
    }
}

impl From<u32> for TileGid {
    fn from(raw: u32) -> Self {
        let (id, h, v, d) = decode(raw);
        TileGid {
            id,
            flags: TileFlags::new(h, v, d),
        }
    }
}

/// Splits a raw id into `(gid, flip_h, flip_v, flip_d)`. Total over `u32`.
#[inline]
pub fn decode(raw: u32) -> (u32, bool, bool, bool) {
    (
        raw & GID_MASK,
        raw & FLIP_H != 0,
        raw & FLIP_V != 0,
        raw & FLIP_D != 0,
    )
}

/// Packs flags back into a raw id.
///
/// # Panics
/// If `gid` does not fit in 29 bits.
#[inline]
pub fn encode(gid: u32, flip_h: bool, flip_v: bool, flip_d: bool) -> u32 {
    assert!(gid & FLIP_MASK == 0, "gid {gid:#x} does not fit in 29 bits");
    let mut raw = gid;
    if flip_h {
        raw |= FLIP_H;
    }
    if flip_v {
        raw |= FLIP_V;
    }
    if flip_d {
        raw |= FLIP_D;
    }
    raw
}
