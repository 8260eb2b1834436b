//! GPU side of the voxel mesher.
//!
//! - `gpu` the device capability the pipeline drives, with the wgpu backend
//! - `meshing` the regeneration queue and dispatch / readback / swap pipeline
//! - `vertex` the vertex layout shared by the extraction kernel and draw pass

pub mod gpu;
pub mod meshing;
pub mod vertex;

pub use gpu::{GpuBackend, WgpuMeshingBackend};
pub use meshing::{MeshingError, MeshingPipeline, PipelinePhase, RegenerationQueue};
pub use vertex::Vertex;
