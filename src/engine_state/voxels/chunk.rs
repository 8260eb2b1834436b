//! # Chunk Module
//!
//! A chunk is the unit of meshing: one cubic sub-volume whose surface geometry
//! lives in its own GPU vertex buffer.
//!
//! The chunk itself has no behavior. Its buffer and vertex count are replaced
//! together by the meshing pipeline's swap step, which releases the previous
//! buffer at the same moment. Before the first completed job the buffer is
//! absent and the count is zero.

use crate::core::StResource;

use super::coordinates::{ChunkId, ChunkPosition};

/// Shared handle to a chunk, held by both the spatial index and the meshing queue.
pub type ChunkHandle<Buf> = StResource<Chunk<Buf>>;

/// Geometry of one cubic voxel sub-volume.
///
/// `Buf` is the GPU buffer type of the backend that meshes the chunk.
#[derive(Debug)]
pub struct Chunk<Buf> {
    /// Encoded chunk coordinate
    pub id: ChunkId,
    /// Vertex buffer holding exactly `vertex_count` vertices, if meshed yet
    pub vertex_buffer: Option<Buf>,
    /// Number of valid vertices in `vertex_buffer`
    pub vertex_count: u32,
}

impl<Buf> Chunk<Buf> {
    /// Creates a chunk with no geometry.
    pub fn new(id: ChunkId) -> Self {
        Self {
            id,
            vertex_buffer: None,
            vertex_count: 0,
        }
    }

    /// Position the chunk's id was encoded from.
    pub fn position(&self) -> ChunkPosition {
        self.id.decode()
    }

    /// Whether the draw pass has anything to draw for this chunk.
    ///
    /// A completed job that produced no vertices leaves an empty buffer with a
    /// zero count, which must be skipped.
    pub fn is_drawable(&self) -> bool {
        self.vertex_buffer.is_some() && self.vertex_count > 0
    }

    /// Installs new geometry and hands back the buffer it replaces.
    pub fn replace_geometry(&mut self, vertex_buffer: Buf, vertex_count: u32) -> Option<Buf> {
        self.vertex_count = vertex_count;
        self.vertex_buffer.replace(vertex_buffer)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;

    #[test]
    fn new_chunk_has_nothing_to_draw() {
        let id = ChunkId::encode(Point3::new(3, 4, 5)).unwrap();
        let chunk: Chunk<Vec<u8>> = Chunk::new(id);

        assert_eq!(chunk.position(), Point3::new(3, 4, 5));
        assert_eq!(chunk.vertex_count, 0);
        assert!(!chunk.is_drawable());
    }

    #[test]
    fn replacing_geometry_returns_previous_buffer() {
        let id = ChunkId::encode(Point3::new(0, 0, 0)).unwrap();
        let mut chunk = Chunk::new(id);

        assert_eq!(chunk.replace_geometry(vec![1u8], 6), None);
        assert!(chunk.is_drawable());

        assert_eq!(chunk.replace_geometry(vec![2u8], 0), Some(vec![1u8]));
        assert_eq!(chunk.vertex_count, 0);
        assert!(!chunk.is_drawable());
    }
}
