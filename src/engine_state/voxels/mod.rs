//! # Voxel Data
//!
//! Chunk storage and addressing.
//!
//! * **Coordinates**: packs a chunk position into a unique `ChunkId` and back
//! * **Chunk**: per-chunk geometry (vertex buffer and count)
//! * **SpatialIndex**: sparse id-to-chunk map, chunk creation and regeneration requests
//!
//! ## Data Flow
//!
//! 1. The host asks the index to generate or update a chunk
//! 2. The index hands the chunk to the regeneration queue
//! 3. The meshing pipeline later swaps new geometry into the chunk
//! 4. The draw pass reads the chunk through `SpatialIndex::get_chunks_in_radius`

pub mod chunk;
pub mod coordinates;
pub mod spatial_index;
