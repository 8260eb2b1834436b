//! # Graphics Resources Builder
//!
//! Acquires a headless wgpu device for the compute-only meshing backend. No
//! window or surface is created; the draw pass is an external consumer of the
//! finished chunk buffers.

use std::error::Error;
use std::fs;
use std::path::Path;

use log::info;
use wgpu::{Device, Features, Queue};

/// Device, queue and kernel sources needed to build the meshing backend.
pub struct Graphics {
    /// Headless device the kernels run on
    pub device: Device,
    /// Queue all meshing work is submitted to
    pub queue: Queue,
    /// WGSL source of the grid generation kernel
    pub grid_shader: String,
    /// WGSL source of the mesh extraction kernel
    pub mesh_shader: String,
}

/// Requests an adapter and device with the adapter's full limits.
///
/// The scratch vertex buffer is sized for the worst case, so the default
/// storage binding limit is usually too small for larger grids.
pub async fn create_device() -> Result<(Device, Queue), Box<dyn Error>> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::PRIMARY,
        flags: wgpu::InstanceFlags::empty(),
        backend_options: wgpu::BackendOptions::from_env_or_default(),
    });

    let adapter = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: None,
            force_fallback_adapter: false,
        })
        .await?;

    let adapter_info = adapter.get_info();
    info!(
        "Using adapter '{}' ({:?})",
        adapter_info.name, adapter_info.backend
    );

    let (device, queue) = adapter
        .request_device(&wgpu::DeviceDescriptor {
            required_features: Features::empty(),
            required_limits: adapter.limits(),
            label: Some("Voxel Mesher Device"),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::Off,
        })
        .await?;

    Ok((device, queue))
}

/// Reads a WGSL source file.
pub fn load_shader(path: impl AsRef<Path>) -> Result<String, Box<dyn Error>> {
    let path = path.as_ref();
    fs::read_to_string(path)
        .map_err(|error| format!("Failed to read shader {}: {}", path.display(), error).into())
}

/// Blocks on device creation and loads both kernels.
pub fn create_graphics(
    grid_shader_path: &str,
    mesh_shader_path: &str,
) -> Result<Graphics, Box<dyn Error>> {
    let grid_shader = load_shader(grid_shader_path)?;
    let mesh_shader = load_shader(mesh_shader_path)?;
    let (device, queue) = pollster::block_on(create_device())?;

    Ok(Graphics {
        device,
        queue,
        grid_shader,
        mesh_shader,
    })
}
