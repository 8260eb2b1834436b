//! Linear chunk-coordinate encoding.
//!
//! Chunk coordinates are packed into a single `u64` as `x + N * (y + N * z)`
//! with `N = 16384`. Only components in `[0, N)` are representable; anything
//! else is rejected rather than wrapped, because wrapping would alias distinct
//! chunks onto the same id. Negative coordinates cannot be expressed at all
//! since positions are unsigned.

use cgmath::Point3;

use crate::engine_state::rendering::meshing::MeshingError;

/// Number of representable chunk positions along each axis.
pub const AXIS_EXTENT: u32 = 16384;

/// Position of a chunk in chunk space.
pub type ChunkPosition = Point3<u32>;

/// Unique id of a chunk, derived from its position.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkId(u64);

impl ChunkId {
    /// Encodes a chunk position.
    ///
    /// # Errors
    /// Returns `MeshingError::CoordinateOutOfRange` if any component is
    /// `>= AXIS_EXTENT`.
    pub fn encode(position: ChunkPosition) -> Result<Self, MeshingError> {
        if !is_in_domain(position) {
            return Err(MeshingError::CoordinateOutOfRange {
                x: position.x,
                y: position.y,
                z: position.z,
            });
        }

        let n = AXIS_EXTENT as u64;
        Ok(ChunkId(
            position.x as u64 + n * (position.y as u64 + n * position.z as u64),
        ))
    }

    /// Decodes the id back into the position it was encoded from.
    pub fn decode(self) -> ChunkPosition {
        let n = AXIS_EXTENT as u64;
        Point3::new(
            (self.0 % n) as u32,
            ((self.0 / n) % n) as u32,
            (self.0 / n / n) as u32,
        )
    }

    /// The raw encoded value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let position = self.decode();
        write!(f, "{} ({}, {}, {})", self.0, position.x, position.y, position.z)
    }
}

/// Whether every component of `position` is encodable.
pub fn is_in_domain(position: ChunkPosition) -> bool {
    position.x < AXIS_EXTENT && position.y < AXIS_EXTENT && position.z < AXIS_EXTENT
}
