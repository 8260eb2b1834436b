//! GPU capability consumed by the meshing pipeline.
//!
//! The pipeline never touches wgpu directly. It drives a `GpuBackend`, which
//! owns the scratch buffers, the two compute pipelines and the device queue.
//! Every operation that completes asynchronously on the device returns a
//! `Completion` that the pipeline checks on later ticks.
//!
//! - `WgpuMeshingBackend` is the production backend
//! - a recording backend stands in for the device in unit tests

pub mod completion;
pub mod wgpu_backend;

#[cfg(test)]
pub mod recording_backend;

pub use completion::{completion, Completion, CompletionSignal, DeviceFault};
pub use wgpu_backend::WgpuMeshingBackend;

use super::meshing::MeshingError;

/// Device operations needed to run one meshing job.
///
/// Calls are made from the tick thread only, and never for more than one job
/// at a time, so implementations may share a single set of scratch buffers
/// between jobs.
pub trait GpuBackend {
    /// A device buffer owned by a chunk.
    type Buffer;
    /// Host-readable copy of the vertex counter for one job.
    type Staging;

    /// Scratch vertex buffer capacity in vertices.
    fn scratch_vertex_capacity(&self) -> u32;

    /// Queues a write that sets the shared vertex counter to zero.
    fn reset_vertex_counter(&mut self);

    /// Submits the fill dispatch, the extraction dispatch and a copy of the
    /// vertex counter into a fresh staging buffer, in one submission.
    ///
    /// The returned completion resolves once the staging buffer is mapped.
    fn submit_meshing_job(&mut self, label: &str) -> (Self::Staging, Completion<()>);

    /// Reads the vertex count out of a mapped staging buffer and releases it.
    fn read_vertex_count(&mut self, staging: Self::Staging) -> Result<u32, MeshingError>;

    /// Allocates a vertex buffer sized for exactly `vertex_count` vertices.
    fn create_vertex_buffer(&mut self, label: &str, vertex_count: u32) -> Self::Buffer;

    /// Copies the first `vertex_count` scratch vertices into `target`.
    ///
    /// The returned completion resolves once the device queue reports the
    /// copy finished.
    fn submit_vertex_copy(&mut self, target: &Self::Buffer, vertex_count: u32) -> Completion<()>;

    /// Size of `buffer` in bytes.
    fn buffer_size(&self, buffer: &Self::Buffer) -> u64;

    /// Frees a buffer that is no longer referenced by any chunk.
    fn release_buffer(&mut self, buffer: Self::Buffer);

    /// Lets the device make progress and run ready callbacks without blocking.
    ///
    /// # Errors
    /// `MeshingError::DeviceUnavailable` once the device is lost or has
    /// reported an uncaptured error.
    fn poll(&mut self) -> Result<(), MeshingError>;
}
