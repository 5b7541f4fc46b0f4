use super::ChunkPos;

/// One chunk-shaped row: a position and its opaque serialized payload.
///
/// The same shape is used for chunks, map chunks and map regions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DbChunk {
    pub position: ChunkPos,
    pub data: Vec<u8>,
}

impl DbChunk {
    pub fn new(position: ChunkPos, data: impl Into<Vec<u8>>) -> Self {
        Self {
            position,
            data: data.into(),
        }
    }
}
