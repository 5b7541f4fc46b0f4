//! Constants module - savegame key layout and well-known row keys

// =============================================================================
// Chunk key layout
// =============================================================================
//
//  63        54 53                27 26                 0
// +------------+--------------------+--------------------+
// |   y (10)   |       z (27)       |       x (27)       |
// +------------+--------------------+--------------------+

/// Bits reserved for the horizontal (x and z) chunk coordinates.
pub const CHUNK_KEY_XZ_BITS: u32 = 27;
/// Bits reserved for the vertical chunk coordinate.
pub const CHUNK_KEY_Y_BITS: u32 = 10;

pub const CHUNK_KEY_XZ_MASK: u64 = (1 << CHUNK_KEY_XZ_BITS) - 1;
pub const CHUNK_KEY_Y_MASK: u64 = (1 << CHUNK_KEY_Y_BITS) - 1;

pub const CHUNK_KEY_Z_SHIFT: u32 = CHUNK_KEY_XZ_BITS;
pub const CHUNK_KEY_Y_SHIFT: u32 = CHUNK_KEY_XZ_BITS * 2;

/// Largest x or z chunk coordinate representable in a save key.
pub const MAX_CHUNK_XZ: u32 = CHUNK_KEY_XZ_MASK as u32;
/// Largest y chunk coordinate representable in a save key.
pub const MAX_CHUNK_Y: u32 = CHUNK_KEY_Y_MASK as u32;

// =============================================================================
// Singleton rows
// =============================================================================

/// Primary key of the one and only `gamedata` row.
pub const SAVEGAME_ID: i64 = 1;
