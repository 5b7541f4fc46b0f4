//! Data types module - world coordinates and chunk rows exchanged with the savegame store

mod chunk_pos;
mod db_chunk;

// Re-export all types
pub use chunk_pos::ChunkPos;
pub use db_chunk::DbChunk;
