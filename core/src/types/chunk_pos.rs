use crate::constants::{
    CHUNK_KEY_XZ_MASK, CHUNK_KEY_Y_MASK, CHUNK_KEY_Y_SHIFT, CHUNK_KEY_Z_SHIFT,
};

/// Chunk coordinate in chunk units (not block units).
///
/// Packs into the 64-bit key used as the `position` primary key of every
/// chunk-shaped savegame table. Coordinates outside the key layout are masked
/// to fit, so `from_chunk_index(pos.to_chunk_index())` only round-trips for
/// in-range positions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkPos {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl ChunkPos {
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Pack this position into its 64-bit save key.
    pub const fn to_chunk_index(&self) -> u64 {
        ((self.y as u64 & CHUNK_KEY_Y_MASK) << CHUNK_KEY_Y_SHIFT)
            | ((self.z as u64 & CHUNK_KEY_XZ_MASK) << CHUNK_KEY_Z_SHIFT)
            | (self.x as u64 & CHUNK_KEY_XZ_MASK)
    }

    /// Unpack a 64-bit save key.
    pub const fn from_chunk_index(index: u64) -> Self {
        Self {
            x: (index & CHUNK_KEY_XZ_MASK) as u32,
            y: ((index >> CHUNK_KEY_Y_SHIFT) & CHUNK_KEY_Y_MASK) as u32,
            z: ((index >> CHUNK_KEY_Z_SHIFT) & CHUNK_KEY_XZ_MASK) as u32,
        }
    }

    /// The same column with the vertical component dropped.
    ///
    /// Map chunks and map regions are keyed on columns, so every position
    /// headed for those tables goes through here first.
    pub const fn column(&self) -> Self {
        Self {
            x: self.x,
            y: 0,
            z: self.z,
        }
    }
}
