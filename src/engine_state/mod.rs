//! # Engine State Module
//!
//! The application context of the voxel mesher. `EngineState` owns the
//! spatial index, the meshing pipeline and the statistics record; it is built
//! once by the composition root and dropped on shutdown.
//!
//! ## Key Components
//!
//! * `EngineState` - Context tying the index to the pipeline and ticking both
//! * `buffer_state` - Registry of the wgpu backend's buffers
//! * `rendering` - GPU backend seam, meshing pipeline and vertex layout
//! * `statistics` - Smoothed per-tick figures and their sinks
//! * `voxels` - Chunks, coordinate encoding and the spatial index
//!
//! ## Tick Order
//!
//! Each call to `EngineState::tick` folds the elapsed wall time into the frame
//! rate and advances the meshing pipeline by one state. Chunk creation and
//! invalidation may happen between ticks and only append to the queue.

use log::trace;
use web_time::Instant;

use rendering::{gpu::GpuBackend, meshing::MeshingError, MeshingPipeline};
use statistics::Statistics;
use voxels::{
    chunk::ChunkHandle, coordinates::ChunkPosition, spatial_index::SpatialIndex,
};

pub mod buffer_state;
pub mod rendering;
pub mod statistics;
pub mod voxels;

/// Spatial index, meshing pipeline and statistics for one GPU backend.
///
/// # Examples
///
/// ```ignore
/// let mut engine_state = EngineState::new(backend);
/// engine_state.generate_chunk(Point3::new(8, 8, 8))?;
///
/// while !engine_state.meshing_pipeline.is_idle() {
///     engine_state.tick()?;
/// }
/// ```
pub struct EngineState<B: GpuBackend> {
    /// Every generated chunk, keyed by encoded position
    pub spatial_index: SpatialIndex<B::Buffer>,
    /// Regeneration queue and the in-flight job
    pub meshing_pipeline: MeshingPipeline<B>,
    /// Figures published to the statistics sink after each tick
    pub statistics: Statistics,
    last_tick: Option<Instant>,
}

impl<B: GpuBackend> EngineState<B> {
    /// Creates an empty context meshing on `backend`.
    pub fn new(backend: B) -> Self {
        Self {
            spatial_index: SpatialIndex::new(),
            meshing_pipeline: MeshingPipeline::new(backend),
            statistics: Statistics::default(),
            last_tick: None,
        }
    }

    /// Creates the chunk at `position` and queues it for meshing.
    ///
    /// A chunk it replaces has its buffer released unless the pipeline still
    /// holds it.
    pub fn generate_chunk(
        &mut self,
        position: ChunkPosition,
    ) -> Result<ChunkHandle<B::Buffer>, MeshingError> {
        let replaced = self.spatial_index.get_chunk(position);
        let chunk = self
            .spatial_index
            .generate_chunk(position, &mut self.meshing_pipeline)?;

        if let Some(replaced) = replaced.filter(|replaced| replaced.handle_count() == 1) {
            let vertex_buffer = replaced.get_mut().vertex_buffer.take();
            if let Some(vertex_buffer) = vertex_buffer {
                self.meshing_pipeline.backend_mut().release_buffer(vertex_buffer);
            }
        }
        Ok(chunk)
    }

    /// Queues the chunk at `position` for regeneration.
    ///
    /// Returns `Ok(false)` when no chunk exists there.
    pub fn update_chunk(&mut self, position: ChunkPosition) -> Result<bool, MeshingError> {
        self.spatial_index
            .update_chunk(position, &mut self.meshing_pipeline)
    }

    /// Chunks within Chebyshev distance `radius` of `position`, for drawing.
    pub fn chunks_in_radius(
        &self,
        position: ChunkPosition,
        radius: u32,
    ) -> Vec<ChunkHandle<B::Buffer>> {
        self.spatial_index.get_chunks_in_radius(position, radius)
    }

    /// Advances the frame clock and the meshing pipeline by one tick.
    ///
    /// # Errors
    /// Whatever `MeshingPipeline::poll` reports for this tick.
    pub fn tick(&mut self) -> Result<(), MeshingError> {
        let now = Instant::now();
        if let Some(last_tick) = self.last_tick.replace(now) {
            self.statistics
                .record_frame_time(now.duration_since(last_tick));
        }

        trace!("Tick: {:?}", self.meshing_pipeline.phase());
        self.meshing_pipeline.poll(&mut self.statistics)
    }
}

#[cfg(test)]
mod tests {
    use cgmath::Point3;

    use super::*;
    use crate::engine_state::rendering::{
        gpu::recording_backend::RecordingBackend, meshing::PipelinePhase,
    };

    fn engine_state() -> EngineState<RecordingBackend> {
        EngineState::new(RecordingBackend::new(10_000))
    }

    fn drain(engine_state: &mut EngineState<RecordingBackend>) {
        for _ in 0..200 {
            engine_state.tick().unwrap();
            if engine_state.meshing_pipeline.is_idle() {
                return;
            }
        }
        panic!("meshing pipeline never drained");
    }

    #[test]
    fn generated_chunk_is_found_at_radius_zero() {
        let mut engine_state = engine_state();
        let chunk = engine_state.generate_chunk(Point3::new(4, 5, 6)).unwrap();

        let found = engine_state.chunks_in_radius(Point3::new(4, 5, 6), 0);
        assert_eq!(found.len(), 1);
        assert!(found[0].ptr_eq(&chunk));
        assert_eq!(engine_state.meshing_pipeline.queued_len(), 1);
    }

    #[test]
    fn update_of_missing_chunk_queues_nothing() {
        let mut engine_state = engine_state();
        engine_state.generate_chunk(Point3::new(0, 0, 0)).unwrap();

        assert_eq!(engine_state.update_chunk(Point3::new(9, 9, 9)), Ok(false));
        assert_eq!(engine_state.meshing_pipeline.queued_len(), 1);

        assert_eq!(engine_state.update_chunk(Point3::new(0, 0, 0)), Ok(true));
        assert_eq!(engine_state.meshing_pipeline.queued_len(), 2);
    }

    #[test]
    fn ticking_meshes_every_generated_chunk() {
        let mut engine_state = engine_state();
        engine_state
            .meshing_pipeline
            .backend_mut()
            .script_vertex_counts([6, 12, 18]);
        for x in 0..3 {
            engine_state.generate_chunk(Point3::new(x, 0, 0)).unwrap();
        }

        drain(&mut engine_state);

        let counts: Vec<u32> = engine_state
            .chunks_in_radius(Point3::new(1, 0, 0), 1)
            .iter()
            .map(|chunk| chunk.get().vertex_count)
            .collect();
        assert_eq!(counts, vec![6, 12, 18]);
        assert_eq!(engine_state.statistics.vertices, 18);
        assert_eq!(engine_state.meshing_pipeline.phase(), PipelinePhase::Idle);
    }

    #[test]
    fn regenerating_a_meshed_chunk_releases_its_buffer() {
        let mut engine_state = engine_state();
        engine_state.meshing_pipeline.backend_mut().script_vertex_counts([6]);
        let first = engine_state.generate_chunk(Point3::new(1, 1, 1)).unwrap();
        drain(&mut engine_state);
        let first_id = first.get().vertex_buffer.as_ref().unwrap().id;
        drop(first);

        let second = engine_state.generate_chunk(Point3::new(1, 1, 1)).unwrap();

        assert_eq!(engine_state.meshing_pipeline.backend().released(), vec![first_id]);
        assert!(second.get().vertex_buffer.is_none());
    }

    #[test]
    fn replaced_chunk_held_elsewhere_keeps_its_buffer() {
        let mut engine_state = engine_state();
        engine_state.meshing_pipeline.backend_mut().script_vertex_counts([6]);
        let first = engine_state.generate_chunk(Point3::new(1, 1, 1)).unwrap();
        drain(&mut engine_state);

        engine_state.generate_chunk(Point3::new(1, 1, 1)).unwrap();

        assert!(engine_state.meshing_pipeline.backend().released().is_empty());
        assert!(first.get().is_drawable());
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        let mut engine_state = engine_state();
        let result = engine_state.generate_chunk(Point3::new(16384, 0, 0));

        assert!(matches!(
            result,
            Err(MeshingError::CoordinateOutOfRange { x: 16384, .. })
        ));
        assert!(engine_state.spatial_index.is_empty());
        assert_eq!(engine_state.meshing_pipeline.queued_len(), 0);
    }
}
