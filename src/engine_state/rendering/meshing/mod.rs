//! GPU surface meshing for voxel chunks.
//!
//! The `MeshingPipeline` turns queued chunks into vertex buffers one at a time.
//! Each job walks a fixed sequence of states, advanced by one step per tick:
//!
//! ```text
//! Idle -> Dispatching -> AwaitingReadback -> Swapping -> Idle
//! ```
//!
//! - `Idle`: pop the front of the FIFO queue into the active slot
//! - `Dispatching`: reset the vertex counter, submit the fill and extraction
//!   kernels plus the counter readback copy
//! - `AwaitingReadback`: wait for the staging buffer to map, read the vertex
//!   count, reset the counter, allocate an exact-size buffer and submit the
//!   copy out of the scratch buffer
//! - `Swapping`: wait for the copy to finish, then install the new buffer on
//!   the chunk and release the one it replaces
//!
//! Waiting states never block; they check a `Completion` and return. Only one
//! chunk is ever in the active slot, so the shared scratch buffers and counter
//! are never touched by two jobs at once.
//!
//! A lost device or a job that overflows the scratch buffer moves the
//! pipeline into `Faulted`, which it never leaves.

use std::collections::VecDeque;

use log::{debug, error, trace};
use web_time::Instant;

mod error;
pub mod kernels;

pub use error::MeshingError;

use crate::engine_state::{
    statistics::Statistics,
    voxels::{chunk::ChunkHandle, coordinates::ChunkId},
};

use super::gpu::{Completion, GpuBackend};

/// Destination for chunks that need their geometry regenerated.
pub trait RegenerationQueue<Buf> {
    /// Appends `chunk` to the back of the queue. Duplicates are kept.
    fn enqueue(&mut self, chunk: ChunkHandle<Buf>);
}

impl<Buf> RegenerationQueue<Buf> for VecDeque<ChunkHandle<Buf>> {
    fn enqueue(&mut self, chunk: ChunkHandle<Buf>) {
        self.push_back(chunk);
    }
}

/// Externally visible state of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelinePhase {
    /// No active job; the next poll starts the front of the queue
    Idle,
    /// A chunk is in the active slot, kernels not yet submitted
    Dispatching,
    /// Kernels submitted, waiting for the vertex count to map
    AwaitingReadback,
    /// Vertex copy submitted, waiting for the queue to finish it
    Swapping,
    /// Stopped after a fatal error
    Faulted,
}

enum JobState<B: GpuBackend> {
    Idle,
    Dispatching,
    AwaitingReadback {
        staging: B::Staging,
        readback: Completion<()>,
        started: Instant,
    },
    Swapping {
        buffer: B::Buffer,
        vertex_count: u32,
        copied: Completion<()>,
    },
    Faulted(MeshingError),
}

/// Serialized dispatch / readback / swap pipeline over a `GpuBackend`.
///
/// # Examples
///
/// ```ignore
/// let mut pipeline = MeshingPipeline::new(backend);
/// index.generate_chunk(Point3::new(0, 0, 0), &mut pipeline)?;
///
/// // Once per tick:
/// pipeline.poll(&mut statistics)?;
/// ```
pub struct MeshingPipeline<B: GpuBackend> {
    backend: B,
    queue: VecDeque<ChunkHandle<B::Buffer>>,
    active: Option<ChunkHandle<B::Buffer>>,
    state: JobState<B>,
    jobs_completed: u64,
}

impl<B: GpuBackend> MeshingPipeline<B> {
    /// Creates an idle pipeline with an empty queue.
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            queue: VecDeque::new(),
            active: None,
            state: JobState::Idle,
            jobs_completed: 0,
        }
    }

    /// Advances the current job by at most one state.
    ///
    /// # Errors
    /// Every error is fatal. The active job is aborted, its chunk keeps its
    /// previous geometry, and the same error is returned from every later poll.
    /// - `MeshingError::ResourceExhaustion` when a job overflowed the scratch buffer
    /// - `MeshingError::DeviceUnavailable` when the device is gone or rejected
    ///   a readback or copy
    pub fn poll(&mut self, statistics: &mut Statistics) -> Result<(), MeshingError> {
        if let JobState::Faulted(error) = &self.state {
            return Err(error.clone());
        }

        let result = self
            .backend
            .poll()
            .and_then(|()| self.advance(statistics));

        match result {
            Err(error) if error.is_fatal() => Err(self.fault(error)),
            result => result,
        }
    }

    fn advance(&mut self, statistics: &mut Statistics) -> Result<(), MeshingError> {
        match std::mem::replace(&mut self.state, JobState::Idle) {
            JobState::Idle => {
                if let Some(chunk) = self.queue.pop_front() {
                    assert!(
                        self.active.is_none(),
                        "a meshing job was started while another was in flight"
                    );
                    trace!("Chunk {} entered the meshing pipeline", chunk.get().id);
                    self.active = Some(chunk);
                    self.state = JobState::Dispatching;
                }
                Ok(())
            }
            JobState::Dispatching => {
                let id = self.active_id();
                self.backend.reset_vertex_counter();
                let (staging, readback) = self
                    .backend
                    .submit_meshing_job(&format!("Chunk {} meshing", id));

                debug!("Dispatched meshing kernels for chunk {}", id);
                self.state = JobState::AwaitingReadback {
                    staging,
                    readback,
                    started: Instant::now(),
                };
                Ok(())
            }
            JobState::AwaitingReadback {
                staging,
                readback,
                started,
            } => match readback.try_take() {
                None => {
                    self.state = JobState::AwaitingReadback {
                        staging,
                        readback,
                        started,
                    };
                    Ok(())
                }
                Some(mapped) => {
                    mapped?;
                    self.finish_readback(staging, started, statistics)
                }
            },
            JobState::Swapping {
                buffer,
                vertex_count,
                copied,
            } => match copied.try_take() {
                None => {
                    self.state = JobState::Swapping {
                        buffer,
                        vertex_count,
                        copied,
                    };
                    Ok(())
                }
                Some(Ok(())) => {
                    self.install(buffer, vertex_count);
                    Ok(())
                }
                Some(Err(error)) => {
                    self.backend.release_buffer(buffer);
                    Err(error)
                }
            },
            JobState::Faulted(error) => {
                self.state = JobState::Faulted(error.clone());
                Err(error)
            }
        }
    }

    fn finish_readback(
        &mut self,
        staging: B::Staging,
        started: Instant,
        statistics: &mut Statistics,
    ) -> Result<(), MeshingError> {
        let id = self.active_id();
        let vertex_count = self.backend.read_vertex_count(staging)?;
        self.backend.reset_vertex_counter();

        statistics.vertices = vertex_count;
        statistics.record_mesh_generation(started.elapsed());

        let capacity = self.backend.scratch_vertex_capacity();
        if vertex_count > capacity {
            return Err(MeshingError::ResourceExhaustion {
                chunk: id,
                vertex_count,
                capacity,
            });
        }

        let buffer = self
            .backend
            .create_vertex_buffer(&format!("Chunk {} vertices", id), vertex_count);
        let copied = self.backend.submit_vertex_copy(&buffer, vertex_count);

        debug!("Chunk {} produced {} vertices", id, vertex_count);
        self.state = JobState::Swapping {
            buffer,
            vertex_count,
            copied,
        };
        Ok(())
    }

    fn install(&mut self, buffer: B::Buffer, vertex_count: u32) {
        let Some(chunk) = self.active.take() else {
            return;
        };

        let previous = chunk.get_mut().replace_geometry(buffer, vertex_count);
        if let Some(previous) = previous {
            self.backend.release_buffer(previous);
        }

        self.jobs_completed += 1;
        trace!("Chunk {} geometry swapped in", chunk.get().id);
    }

    fn fault(&mut self, error: MeshingError) -> MeshingError {
        if let Some(chunk) = self.active.take() {
            error!("Aborting meshing job for chunk {}: {}", chunk.get().id, error);
        } else {
            error!("Meshing pipeline faulted: {}", error);
        }
        let aborted = std::mem::replace(&mut self.state, JobState::Faulted(error.clone()));
        if let JobState::Swapping { buffer, .. } = aborted {
            self.backend.release_buffer(buffer);
        }
        error
    }

    fn active_id(&self) -> ChunkId {
        match &self.active {
            Some(chunk) => chunk.get().id,
            None => unreachable!("no chunk in the active slot"),
        }
    }

    /// Current state of the active job.
    pub fn phase(&self) -> PipelinePhase {
        match self.state {
            JobState::Idle => PipelinePhase::Idle,
            JobState::Dispatching => PipelinePhase::Dispatching,
            JobState::AwaitingReadback { .. } => PipelinePhase::AwaitingReadback,
            JobState::Swapping { .. } => PipelinePhase::Swapping,
            JobState::Faulted(_) => PipelinePhase::Faulted,
        }
    }

    /// Number of chunks waiting behind the active job.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// The chunk currently being meshed.
    pub fn active_chunk(&self) -> Option<&ChunkHandle<B::Buffer>> {
        self.active.as_ref()
    }

    /// Whether there is neither an active job nor queued work.
    pub fn is_idle(&self) -> bool {
        matches!(self.state, JobState::Idle) && self.queue.is_empty()
    }

    /// Number of jobs whose geometry has been swapped in.
    pub fn jobs_completed(&self) -> u64 {
        self.jobs_completed
    }

    /// The device backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The device backend, for releasing buffers the pipeline never saw.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

impl<B: GpuBackend> RegenerationQueue<B::Buffer> for MeshingPipeline<B> {
    fn enqueue(&mut self, chunk: ChunkHandle<B::Buffer>) {
        trace!("Queued chunk {} for meshing", chunk.get().id);
        self.queue.push_back(chunk);
    }
}
