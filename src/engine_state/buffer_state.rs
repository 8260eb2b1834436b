//! # Buffer State Module
//!
//! Registry for the GPU buffers owned by the meshing backend.
//!
//! ## Key Features
//!
//! * Named scratch buffers created once at startup (grid params, voxel grid,
//!   scratch vertices, vertex counter)
//! * Unnamed per-chunk vertex buffers, created and destroyed per job
//! * Memory analytics for both kinds. A chunk buffer counts from creation
//!   until it is released through the backend; one dropped with an orphaned
//!   chunk (replaced while still queued) stays in the totals
//! * Bounds-checked writes and asynchronous mapping
//!
//! Buffers are referenced by name (static string), as in the rest of the engine.

use std::collections::HashMap;

use wgpu::{Buffer, BufferAsyncError, Device, MapMode, Queue, WasmNotSend};

/// Analytics data for a named GPU buffer.
#[derive(Debug)]
struct BufferAnalytics {
    /// Total memory allocated for the buffer in bytes
    allocated_memory: u64,
    /// Highest byte written so far
    used_memory: u64,
    /// Number of times the buffer has been written to
    times_written: u64,
}

/// Central manager for the meshing backend's GPU buffers.
///
/// # Examples
///
/// ```ignore
/// let mut buffer_state = BufferState::new(device, queue);
///
/// buffer_state.create_buffer(
///     VERTEX_COUNTER_BUFFER,
///     wgpu::BufferDescriptor {
///         label: Some(VERTEX_COUNTER_BUFFER),
///         size: 4,
///         usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
///         mapped_at_creation: false,
///     },
/// );
/// buffer_state.write_buffer(VERTEX_COUNTER_BUFFER, 0, bytemuck::bytes_of(&0u32));
/// ```
pub struct BufferState {
    /// The GPU device
    device: Device,
    /// The GPU command queue
    queue: Queue,
    /// Named buffers
    buffers: HashMap<&'static str, Buffer>,
    /// Analytics for each named buffer
    buffer_analytics: HashMap<&'static str, BufferAnalytics>,
    /// Bytes held by live chunk buffers
    chunk_buffer_memory: u64,
    /// Number of live chunk buffers
    chunk_buffer_count: u64,
}

impl BufferState {
    /// Creates an empty registry on `device`.
    pub fn new(device: Device, queue: Queue) -> Self {
        Self {
            device,
            queue,
            buffers: HashMap::new(),
            buffer_analytics: HashMap::new(),
            chunk_buffer_memory: 0,
            chunk_buffer_count: 0,
        }
    }

    /// Creates an empty named buffer.
    pub fn create_buffer(
        &mut self,
        buffer_name: &'static str,
        buffer_descriptor: wgpu::BufferDescriptor,
    ) {
        let buffer_analytics = BufferAnalytics {
            allocated_memory: buffer_descriptor.size,
            used_memory: 0,
            times_written: 0,
        };
        let buffer = self.device.create_buffer(&buffer_descriptor);

        self.buffers.insert(buffer_name, buffer);
        self.buffer_analytics.insert(buffer_name, buffer_analytics);
    }

    /// Creates an unnamed buffer for chunk geometry.
    pub fn create_chunk_buffer(&mut self, buffer_descriptor: wgpu::BufferDescriptor) -> Buffer {
        self.chunk_buffer_memory += buffer_descriptor.size;
        self.chunk_buffer_count += 1;
        self.device.create_buffer(&buffer_descriptor)
    }

    /// Creates a host-readable buffer that is dropped after one readback.
    pub fn create_staging_buffer(&self, label: &str, size: u64) -> Buffer {
        self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    /// Destroys a chunk buffer created by `create_chunk_buffer`.
    pub fn release_chunk_buffer(&mut self, buffer: Buffer) {
        self.chunk_buffer_memory = self.chunk_buffer_memory.saturating_sub(buffer.size());
        self.chunk_buffer_count = self.chunk_buffer_count.saturating_sub(1);
        buffer.destroy();
    }

    /// Writes raw bytes to a named buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not exist or if the write would exceed buffer bounds
    pub fn write_buffer(&mut self, buffer_name: &'static str, offset: wgpu::BufferAddress, data: &[u8]) {
        let buffer = &self.buffers[buffer_name];
        let Some(buffer_analytics) = self.buffer_analytics.get_mut(buffer_name) else {
            panic!("No analytics recorded for buffer '{}'", buffer_name);
        };

        let data_size = data.len() as u64;
        if offset + data_size > buffer_analytics.allocated_memory {
            panic!(
                "Buffer write out of bounds for buffer name '{}'",
                buffer_name
            );
        }

        self.queue.write_buffer(buffer, offset, data);
        buffer_analytics.used_memory = buffer_analytics.used_memory.max(offset + data_size);
        buffer_analytics.times_written += 1;
    }

    /// Maps a buffer asynchronously for host reads.
    pub fn map_async(
        buffer: &Buffer,
        callback: impl FnOnce(Result<(), BufferAsyncError>) + WasmNotSend + 'static,
    ) {
        buffer.slice(..).map_async(MapMode::Read, callback)
    }

    /// Gets a named buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not exist
    pub fn get_buffer(&self, buffer_name: &'static str) -> &Buffer {
        &self.buffers[buffer_name]
    }

    /// Binding resource covering a whole named buffer.
    ///
    /// # Panics
    ///
    /// Panics if the buffer does not exist
    pub fn get_entire_binding(&self, buffer_name: &'static str) -> wgpu::BindingResource<'_> {
        self.buffers[buffer_name].as_entire_binding()
    }

    /// Total bytes allocated for named buffers.
    pub fn get_total_allocated_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .fold(0, |acc, buffer_analytics| acc + buffer_analytics.allocated_memory)
    }

    /// Total bytes written to named buffers.
    pub fn get_total_used_memory(&self) -> u64 {
        self.buffer_analytics
            .values()
            .fold(0, |acc, buffer_analytics| acc + buffer_analytics.used_memory)
    }

    /// Bytes and count of live chunk buffers.
    pub fn get_chunk_buffer_usage(&self) -> (u64, u64) {
        (self.chunk_buffer_memory, self.chunk_buffer_count)
    }

    /// Logs the analytics of every named buffer at debug level.
    pub fn log_analytics(&self) {
        for (name, analytics) in &self.buffer_analytics {
            log::debug!("Buffer '{}': {:?}", name, analytics);
        }
        let (chunk_memory, chunk_count) = self.get_chunk_buffer_usage();
        log::info!(
            "Scratch buffers: {} bytes allocated, {} written; chunk buffers: {} live, {} bytes",
            self.get_total_allocated_memory(),
            self.get_total_used_memory(),
            chunk_count,
            chunk_memory
        );
    }
}
