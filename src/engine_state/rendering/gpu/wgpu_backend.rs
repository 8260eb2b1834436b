//! wgpu implementation of the meshing backend.
//!
//! Owns the four shared scratch buffers, the fill and extraction compute
//! pipelines and their bind groups. Asynchronous results are delivered through
//! `map_async` and `Queue::on_submitted_work_done` callbacks, which fire from
//! `Device::poll` and only record into a `Completion`.
//!
//! # Resource Management
//!
//! - Grid params uniform: written once at startup
//! - Voxel grid: one `f32` per cell, rewritten by every fill dispatch
//! - Scratch vertices: worst-case capacity, reused by every job
//! - Vertex counter: zeroed before each job and again after its readback
//! - Staging buffers: one per job, dropped after the readback

use log::{debug, error, info};
use wgpu::{BindGroup, Buffer, ComputePipeline, Device, Queue};

use crate::engine_state::{
    buffer_state::BufferState,
    rendering::{
        meshing::{kernels::GridParams, MeshingError},
        vertex::vertex_bytes,
    },
};

use super::{completion, Completion, DeviceFault, GpuBackend};

/// Name of the uniform buffer holding `GridParams`
pub const GRID_PARAMS_BUFFER: &str = "Grid Params Buffer";
/// Name of the voxel occupancy buffer
pub const VOXEL_GRID_BUFFER: &str = "Voxel Grid Buffer";
/// Name of the worst-case scratch vertex buffer
pub const SCRATCH_VERTEX_BUFFER: &str = "Scratch Vertex Buffer";
/// Name of the atomic vertex counter buffer
pub const VERTEX_COUNTER_BUFFER: &str = "Vertex Counter Buffer";

const COUNTER_BYTES: u64 = std::mem::size_of::<u32>() as u64;

/// Staging buffer holding one job's vertex count.
pub struct WgpuStaging {
    buffer: Buffer,
}

/// Meshing backend running both kernels on a wgpu device.
pub struct WgpuMeshingBackend {
    device: Device,
    queue: Queue,
    buffer_state: BufferState,
    params: GridParams,
    grid_pipeline: ComputePipeline,
    mesh_pipeline: ComputePipeline,
    grid_bind_group: BindGroup,
    mesh_bind_group: BindGroup,
    fault: DeviceFault,
}

impl WgpuMeshingBackend {
    /// Creates the scratch buffers and compute pipelines.
    ///
    /// # Arguments
    /// * `device` - The GPU device
    /// * `queue` - The device queue
    /// * `params` - Grid extent and scratch capacity
    /// * `grid_shader` - WGSL source of the fill kernel
    /// * `mesh_shader` - WGSL source of the extraction kernel
    ///
    /// # Errors
    /// - `MeshingError::ScratchTooLarge` if a scratch buffer exceeds device limits
    /// - `MeshingError::DeviceUnavailable` if the device rejects the kernels
    pub fn new(
        device: Device,
        queue: Queue,
        params: GridParams,
        grid_shader: &str,
        mesh_shader: &str,
    ) -> Result<Self, MeshingError> {
        check_limits(&device.limits(), &params)?;

        let fault = DeviceFault::default();
        let lost = fault.clone();
        device.set_device_lost_callback(move |reason, message| {
            lost.record(format!("device lost ({:?}): {}", reason, message));
        });
        let uncaptured = fault.clone();
        device.on_uncaptured_error(Box::new(move |device_error: wgpu::Error| {
            error!("Uncaptured device error: {}", device_error);
            uncaptured.record(device_error.to_string());
        }));

        let mut buffer_state = BufferState::new(device.clone(), queue.clone());
        create_scratch_buffers(&mut buffer_state, &params);

        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let grid_pipeline = create_kernel(&device, "Voxel Grid Kernel", grid_shader);
        let mesh_pipeline = create_kernel(&device, "Voxel Mesh Kernel", mesh_shader);

        let grid_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxel Grid Bind Group"),
            layout: &grid_pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer_state.get_entire_binding(GRID_PARAMS_BUFFER),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer_state.get_entire_binding(VOXEL_GRID_BUFFER),
                },
            ],
        });

        let mesh_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Voxel Mesh Bind Group"),
            layout: &mesh_pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer_state.get_entire_binding(GRID_PARAMS_BUFFER),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffer_state.get_entire_binding(VOXEL_GRID_BUFFER),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffer_state.get_entire_binding(SCRATCH_VERTEX_BUFFER),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffer_state.get_entire_binding(VERTEX_COUNTER_BUFFER),
                },
            ],
        });

        if let Some(validation_error) = pollster::block_on(device.pop_error_scope()) {
            return Err(MeshingError::DeviceUnavailable(format!(
                "meshing kernels rejected: {}",
                validation_error
            )));
        }

        buffer_state.write_buffer(GRID_PARAMS_BUFFER, 0, bytemuck::bytes_of(&params));
        buffer_state.write_buffer(VERTEX_COUNTER_BUFFER, 0, bytemuck::bytes_of(&0u32));

        info!(
            "Meshing backend ready: grid {:?}, scratch capacity {} vertices",
            params.size, params.max_vertices
        );
        buffer_state.log_analytics();

        Ok(Self {
            device,
            queue,
            buffer_state,
            params,
            grid_pipeline,
            mesh_pipeline,
            grid_bind_group,
            mesh_bind_group,
            fault,
        })
    }

    /// The buffer registry, for memory reporting.
    pub fn buffer_state(&self) -> &BufferState {
        &self.buffer_state
    }
}

impl GpuBackend for WgpuMeshingBackend {
    type Buffer = Buffer;
    type Staging = WgpuStaging;

    fn scratch_vertex_capacity(&self) -> u32 {
        self.params.max_vertices
    }

    fn reset_vertex_counter(&mut self) {
        self.buffer_state
            .write_buffer(VERTEX_COUNTER_BUFFER, 0, bytemuck::bytes_of(&0u32));
    }

    fn submit_meshing_job(&mut self, label: &str) -> (Self::Staging, Completion<()>) {
        let staging = self
            .buffer_state
            .create_staging_buffer(&format!("Vertex Count Staging Buffer - {}", label), COUNTER_BYTES);
        let [x, y, z] = self.params.workgroup_counts();

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) });

        {
            let mut grid_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Voxel Grid Pass"),
                timestamp_writes: None,
            });
            grid_pass.set_pipeline(&self.grid_pipeline);
            grid_pass.set_bind_group(0, &self.grid_bind_group, &[]);
            grid_pass.dispatch_workgroups(x, y, z);
        }

        {
            let mut mesh_pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Voxel Mesh Pass"),
                timestamp_writes: None,
            });
            mesh_pass.set_pipeline(&self.mesh_pipeline);
            mesh_pass.set_bind_group(0, &self.mesh_bind_group, &[]);
            mesh_pass.dispatch_workgroups(x, y, z);
        }

        encoder.copy_buffer_to_buffer(
            self.buffer_state.get_buffer(VERTEX_COUNTER_BUFFER),
            0,
            &staging,
            0,
            COUNTER_BYTES,
        );

        self.queue.submit(std::iter::once(encoder.finish()));

        let (mapped, signal) = completion();
        BufferState::map_async(&staging, move |result| match result {
            Ok(()) => signal.resolve(()),
            Err(map_error) => signal.reject(MeshingError::DeviceUnavailable(format!(
                "vertex count readback failed: {}",
                map_error
            ))),
        });

        debug!("Submitted meshing dispatch {} ({}x{}x{} workgroups)", label, x, y, z);

        (WgpuStaging { buffer: staging }, mapped)
    }

    fn read_vertex_count(&mut self, staging: Self::Staging) -> Result<u32, MeshingError> {
        let vertex_count = {
            let view = staging.buffer.slice(..COUNTER_BYTES).get_mapped_range();
            bytemuck::pod_read_unaligned::<u32>(&view)
        };
        staging.buffer.unmap();
        staging.buffer.destroy();

        Ok(vertex_count)
    }

    fn create_vertex_buffer(&mut self, label: &str, vertex_count: u32) -> Self::Buffer {
        self.buffer_state.create_chunk_buffer(wgpu::BufferDescriptor {
            label: Some(label),
            size: vertex_bytes(vertex_count),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::VERTEX
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn submit_vertex_copy(&mut self, target: &Self::Buffer, vertex_count: u32) -> Completion<()> {
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Chunk Vertex Copy"),
            });

        if vertex_count > 0 {
            encoder.copy_buffer_to_buffer(
                self.buffer_state.get_buffer(SCRATCH_VERTEX_BUFFER),
                0,
                target,
                0,
                vertex_bytes(vertex_count),
            );
        }

        self.queue.submit(std::iter::once(encoder.finish()));

        let (copied, signal) = completion();
        self.queue.on_submitted_work_done(move || signal.resolve(()));
        copied
    }

    fn buffer_size(&self, buffer: &Self::Buffer) -> u64 {
        buffer.size()
    }

    fn release_buffer(&mut self, buffer: Self::Buffer) {
        self.buffer_state.release_chunk_buffer(buffer);
    }

    fn poll(&mut self) -> Result<(), MeshingError> {
        self.fault.check()?;
        self.device
            .poll(wgpu::PollType::Poll)
            .map_err(|poll_error| MeshingError::DeviceUnavailable(poll_error.to_string()))?;
        self.fault.check()
    }
}

/// Rejects grids whose scratch buffers the device cannot bind.
fn check_limits(limits: &wgpu::Limits, params: &GridParams) -> Result<(), MeshingError> {
    let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);

    for requested in [params.voxel_grid_bytes(), params.scratch_vertex_bytes()] {
        if requested > limit {
            return Err(MeshingError::ScratchTooLarge { requested, limit });
        }
    }

    Ok(())
}

fn create_scratch_buffers(buffer_state: &mut BufferState, params: &GridParams) {
    buffer_state.create_buffer(
        GRID_PARAMS_BUFFER,
        wgpu::BufferDescriptor {
            label: Some(GRID_PARAMS_BUFFER),
            size: std::mem::size_of::<GridParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        },
    );

    buffer_state.create_buffer(
        VOXEL_GRID_BUFFER,
        wgpu::BufferDescriptor {
            label: Some(VOXEL_GRID_BUFFER),
            size: params.voxel_grid_bytes(),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        },
    );

    buffer_state.create_buffer(
        SCRATCH_VERTEX_BUFFER,
        wgpu::BufferDescriptor {
            label: Some(SCRATCH_VERTEX_BUFFER),
            size: params.scratch_vertex_bytes(),
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        },
    );

    buffer_state.create_buffer(
        VERTEX_COUNTER_BUFFER,
        wgpu::BufferDescriptor {
            label: Some(VERTEX_COUNTER_BUFFER),
            size: COUNTER_BYTES,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        },
    );
}

fn create_kernel(device: &Device, label: &str, source: &str) -> ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: None,
        module: &module,
        entry_point: Some("main"),
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    })
}
