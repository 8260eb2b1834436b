use std::fmt;

use crate::engine_state::voxels::coordinates::ChunkId;

/// Failures surfaced by the spatial index and the meshing pipeline.
///
/// A lookup miss on `update_chunk` is deliberately absent: it is an expected
/// outcome, reported as `Ok(false)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MeshingError {
    /// A job generated more vertices than the scratch buffer can hold.
    ///
    /// The kernel stops writing at capacity but keeps counting, so the
    /// geometry in scratch is incomplete. The scratch capacity is a hard
    /// invariant: the pipeline faults and the chunk keeps its previous buffer.
    ResourceExhaustion {
        /// Chunk whose job overflowed
        chunk: ChunkId,
        /// Vertex count reported by the extraction kernel
        vertex_count: u32,
        /// Scratch buffer capacity in vertices
        capacity: u32,
    },
    /// The scratch buffers do not fit the device's buffer limits.
    ScratchTooLarge {
        /// Bytes the scratch buffer would need
        requested: u64,
        /// Largest buffer binding the device allows
        limit: u64,
    },
    /// The device was lost or rejected an operation.
    ///
    /// Unrecoverable: every device-owned buffer and pipeline must be recreated.
    DeviceUnavailable(String),
    /// A chunk coordinate component lies outside the encodable range.
    CoordinateOutOfRange {
        /// X component
        x: u32,
        /// Y component
        y: u32,
        /// Z component
        z: u32,
    },
}

impl MeshingError {
    /// Whether the pipeline must stop after this error.
    ///
    /// Only a rejected coordinate is recoverable; it never reaches the pipeline.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MeshingError::DeviceUnavailable(_)
                | MeshingError::ScratchTooLarge { .. }
                | MeshingError::ResourceExhaustion { .. }
        )
    }
}

impl fmt::Display for MeshingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeshingError::ResourceExhaustion {
                chunk,
                vertex_count,
                capacity,
            } => write!(
                f,
                "chunk {} generated {} vertices but the scratch buffer holds {}",
                chunk, vertex_count, capacity
            ),
            MeshingError::ScratchTooLarge { requested, limit } => write!(
                f,
                "scratch buffer needs {} bytes but the device allows {}",
                requested, limit
            ),
            MeshingError::DeviceUnavailable(reason) => {
                write!(f, "GPU device unavailable: {}", reason)
            }
            MeshingError::CoordinateOutOfRange { x, y, z } => write!(
                f,
                "chunk coordinate ({}, {}, {}) is outside the encodable range",
                x, y, z
            ),
        }
    }
}

impl std::error::Error for MeshingError {}
