//! # Spatial Index Module
//!
//! Sparse map from encoded chunk coordinate to chunk. The index owns chunk
//! creation and is the entry point for requesting regeneration; both hand the
//! affected chunk to a `RegenerationQueue`, normally the meshing pipeline.
//!
//! Only chunks that have been generated are stored, so lookups for empty space
//! are cheap misses and radius queries skip absent cells.

use std::collections::HashMap;

use cgmath::Point3;
use log::{trace, warn};

use crate::engine_state::rendering::meshing::{MeshingError, RegenerationQueue};

use super::{
    chunk::{Chunk, ChunkHandle},
    coordinates::{is_in_domain, ChunkId, ChunkPosition, AXIS_EXTENT},
};

/// Sparse collection of chunks keyed by their encoded coordinate.
///
/// # Examples
///
/// ```
/// use std::collections::VecDeque;
/// use cgmath::Point3;
/// use voxel_mesher::engine_state::voxels::{chunk::ChunkHandle, spatial_index::SpatialIndex};
///
/// let mut index: SpatialIndex<()> = SpatialIndex::new();
/// let mut queue: VecDeque<ChunkHandle<()>> = VecDeque::new();
///
/// index.generate_chunk(Point3::new(1, 2, 3), &mut queue).unwrap();
/// assert_eq!(queue.len(), 1);
/// assert_eq!(index.get_chunks_in_radius(Point3::new(1, 2, 3), 0).len(), 1);
/// ```
pub struct SpatialIndex<Buf> {
    chunks: HashMap<ChunkId, ChunkHandle<Buf>>,
}

impl<Buf> SpatialIndex<Buf> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self {
            chunks: HashMap::new(),
        }
    }

    /// Creates a chunk at `position`, stores it and queues it for meshing.
    ///
    /// A chunk already stored at the same position is replaced. Its buffer is
    /// released once the last handle to it is dropped, which may be after an
    /// in-flight job for it has finished.
    ///
    /// # Errors
    /// `MeshingError::CoordinateOutOfRange` if the position is not encodable.
    pub fn generate_chunk<Q>(
        &mut self,
        position: ChunkPosition,
        queue: &mut Q,
    ) -> Result<ChunkHandle<Buf>, MeshingError>
    where
        Q: RegenerationQueue<Buf> + ?Sized,
    {
        let id = ChunkId::encode(position)?;
        let chunk = ChunkHandle::new(Chunk::new(id));

        if self.chunks.insert(id, chunk.clone()).is_some() {
            warn!("Replacing existing chunk {}", id);
        }
        trace!("Generated chunk {}", id);

        queue.enqueue(chunk.clone());
        Ok(chunk)
    }

    /// Queues the chunk at `position` for regeneration.
    ///
    /// # Returns
    /// `Ok(true)` if a chunk was found and queued, `Ok(false)` if no chunk
    /// exists there. A miss is not an error.
    pub fn update_chunk<Q>(&self, position: ChunkPosition, queue: &mut Q) -> Result<bool, MeshingError>
    where
        Q: RegenerationQueue<Buf> + ?Sized,
    {
        let id = ChunkId::encode(position)?;

        match self.chunks.get(&id) {
            Some(chunk) => {
                queue.enqueue(chunk.clone());
                Ok(true)
            }
            None => {
                trace!("No chunk at {} to update", id);
                Ok(false)
            }
        }
    }

    /// Looks up the chunk at `position`.
    pub fn get_chunk(&self, position: ChunkPosition) -> Option<ChunkHandle<Buf>> {
        let id = ChunkId::encode(position).ok()?;
        self.chunks.get(&id).cloned()
    }

    /// Returns every stored chunk within Chebyshev distance `radius` of `position`.
    ///
    /// Chunks are listed in nested ascending x, y, z order. Cells outside the
    /// encodable domain and cells without a chunk are skipped.
    pub fn get_chunks_in_radius(&self, position: ChunkPosition, radius: u32) -> Vec<ChunkHandle<Buf>> {
        let mut chunks = Vec::new();

        let (Some(x_range), Some(y_range), Some(z_range)) = (
            axis_range(position.x, radius),
            axis_range(position.y, radius),
            axis_range(position.z, radius),
        ) else {
            return chunks;
        };

        for x in x_range {
            for y in y_range.clone() {
                for z in z_range.clone() {
                    let cell = Point3::new(x, y, z);
                    debug_assert!(is_in_domain(cell));
                    if let Ok(id) = ChunkId::encode(cell) {
                        if let Some(chunk) = self.chunks.get(&id) {
                            chunks.push(chunk.clone());
                        }
                    }
                }
            }
        }

        chunks
    }

    /// Number of stored chunks.
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    /// Whether no chunk has been generated yet.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterates over all stored chunks in no particular order.
    pub fn chunks(&self) -> impl Iterator<Item = &ChunkHandle<Buf>> {
        self.chunks.values()
    }
}

impl<Buf> Default for SpatialIndex<Buf> {
    fn default() -> Self {
        Self::new()
    }
}

/// Inclusive range of in-domain coordinates within `radius` of `center`.
fn axis_range(center: u32, radius: u32) -> Option<std::ops::RangeInclusive<u32>> {
    if center >= AXIS_EXTENT {
        return None;
    }
    let low = center.saturating_sub(radius);
    let high = center.saturating_add(radius).min(AXIS_EXTENT - 1);
    Some(low..=high)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;

    type Queue = VecDeque<ChunkHandle<()>>;

    fn positions(chunks: &[ChunkHandle<()>]) -> Vec<ChunkPosition> {
        chunks.iter().map(|chunk| chunk.get().position()).collect()
    }

    #[test]
    fn generated_chunk_is_the_only_one_at_radius_zero() {
        let mut index = SpatialIndex::new();
        let mut queue = Queue::new();
        let position = Point3::new(10, 20, 30);

        let created = index.generate_chunk(position, &mut queue).unwrap();
        index.generate_chunk(Point3::new(11, 20, 30), &mut queue).unwrap();

        let found = index.get_chunks_in_radius(position, 0);
        assert_eq!(found.len(), 1);
        assert!(found[0].ptr_eq(&created));
        assert!(queue[0].ptr_eq(&created));
    }

    #[test]
    fn update_of_missing_chunk_leaves_queue_untouched() {
        let mut index = SpatialIndex::new();
        let mut queue = Queue::new();
        index.generate_chunk(Point3::new(1, 1, 1), &mut queue).unwrap();
        let before = queue.len();

        assert!(!index.update_chunk(Point3::new(2, 2, 2), &mut queue).unwrap());
        assert_eq!(queue.len(), before);
    }

    #[test]
    fn update_of_existing_chunk_enqueues_duplicates() {
        let mut index = SpatialIndex::new();
        let mut queue = Queue::new();
        let chunk = index.generate_chunk(Point3::new(1, 1, 1), &mut queue).unwrap();

        assert!(index.update_chunk(Point3::new(1, 1, 1), &mut queue).unwrap());
        assert!(index.update_chunk(Point3::new(1, 1, 1), &mut queue).unwrap());

        assert_eq!(queue.len(), 3);
        assert!(queue.iter().all(|queued| queued.ptr_eq(&chunk)));
    }

    #[test]
    fn radius_query_matches_chebyshev_ball_in_axis_order() {
        let mut index = SpatialIndex::new();
        let mut queue = Queue::new();
        let mut rng = fastrand::Rng::with_seed(7);

        for _ in 0..200 {
            let position = Point3::new(rng.u32(0..12), rng.u32(0..12), rng.u32(0..12));
            index.generate_chunk(position, &mut queue).unwrap();
        }

        let center = Point3::new(5, 6, 4);
        let radius = 2;
        let found = positions(&index.get_chunks_in_radius(center, radius));

        let mut expected: Vec<ChunkPosition> = index
            .chunks()
            .map(|chunk| chunk.get().position())
            .filter(|p| {
                p.x.abs_diff(center.x) <= radius
                    && p.y.abs_diff(center.y) <= radius
                    && p.z.abs_diff(center.z) <= radius
            })
            .collect();
        expected.sort_by_key(|p| (p.x, p.y, p.z));

        assert_eq!(found, expected);
    }

    #[test]
    fn radius_query_clips_at_domain_edges() {
        let mut index = SpatialIndex::new();
        let mut queue = Queue::new();
        let max = AXIS_EXTENT - 1;

        index.generate_chunk(Point3::new(0, 0, 0), &mut queue).unwrap();
        index.generate_chunk(Point3::new(max, max, max), &mut queue).unwrap();

        assert_eq!(
            positions(&index.get_chunks_in_radius(Point3::new(0, 0, 1), 3)),
            vec![Point3::new(0, 0, 0)]
        );
        assert_eq!(
            positions(&index.get_chunks_in_radius(Point3::new(max, max, max), 1)),
            vec![Point3::new(max, max, max)]
        );
        assert!(index
            .get_chunks_in_radius(Point3::new(AXIS_EXTENT, 0, 0), 5)
            .is_empty());
    }

    #[test]
    fn regenerating_a_position_replaces_the_stored_chunk() {
        let mut index = SpatialIndex::new();
        let mut queue = Queue::new();
        let position = Point3::new(4, 4, 4);

        let first = index.generate_chunk(position, &mut queue).unwrap();
        let second = index.generate_chunk(position, &mut queue).unwrap();

        assert_eq!(index.len(), 1);
        assert!(index.get_chunk(position).unwrap().ptr_eq(&second));
        assert!(!first.ptr_eq(&second));
        // The replaced chunk survives only in the queue and this test.
        assert_eq!(first.handle_count(), 2);
    }

    #[test]
    fn out_of_range_generation_is_rejected() {
        let mut index = SpatialIndex::new();
        let mut queue = Queue::new();

        assert!(index
            .generate_chunk(Point3::new(AXIS_EXTENT, 0, 0), &mut queue)
            .is_err());
        assert!(queue.is_empty());
        assert!(index.is_empty());
    }
}
