//! Host-side contract of the two meshing compute kernels.
//!
//! Fill kernel (`voxel_grid.wgsl`):
//! - `@group(0) @binding(0)` `GridParams` uniform
//! - `@group(0) @binding(1)` voxel grid, one `f32` occupancy per cell, read-write
//!
//! Extraction kernel (`voxel_mesh.wgsl`):
//! - `@group(0) @binding(0)` `GridParams` uniform
//! - `@group(0) @binding(1)` voxel grid, read-only
//! - `@group(0) @binding(2)` scratch vertex buffer, `vec4<f32>` per vertex, append target
//! - `@group(0) @binding(3)` vertex counter, `atomic<u32>`
//!
//! Both kernels use a 4x4x4 workgroup and are dispatched over the whole grid.

use crate::engine_state::rendering::meshing::MeshingError;
use crate::engine_state::rendering::vertex::VERTEX_STRIDE;

/// Workgroup extent along each axis, matching `@workgroup_size(4, 4, 4)`.
pub const WORKGROUP_EXTENT: u32 = 4;

/// Uniform block shared by both kernels.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GridParams {
    /// Voxel grid extent per axis
    pub size: [u32; 3],
    /// Scratch vertex capacity; the extraction kernel never writes past it
    pub max_vertices: u32,
}

impl GridParams {
    /// Builds the parameter block for a grid of `size` cells holding at most
    /// `max_vertices_per_voxel` vertices per cell.
    ///
    /// # Errors
    /// `MeshingError::ScratchTooLarge` if the capacity does not fit in a `u32`.
    pub fn new(size: [u32; 3], max_vertices_per_voxel: u32) -> Result<Self, MeshingError> {
        let capacity = voxel_count(size) * max_vertices_per_voxel as u64;
        let max_vertices = u32::try_from(capacity).map_err(|_| MeshingError::ScratchTooLarge {
            requested: capacity * VERTEX_STRIDE,
            limit: u32::MAX as u64 * VERTEX_STRIDE,
        })?;

        Ok(Self { size, max_vertices })
    }

    /// Number of cells in the grid.
    pub fn voxel_count(&self) -> u64 {
        voxel_count(self.size)
    }

    /// Workgroups to dispatch per axis.
    pub fn workgroup_counts(&self) -> [u32; 3] {
        self.size.map(|extent| extent.div_ceil(WORKGROUP_EXTENT))
    }

    /// Size in bytes of the voxel grid buffer.
    pub fn voxel_grid_bytes(&self) -> u64 {
        self.voxel_count() * std::mem::size_of::<f32>() as u64
    }

    /// Size in bytes of the scratch vertex buffer.
    pub fn scratch_vertex_bytes(&self) -> u64 {
        self.max_vertices as u64 * VERTEX_STRIDE
    }
}

fn voxel_count(size: [u32; 3]) -> u64 {
    size.iter().map(|&extent| extent as u64).product()
}
