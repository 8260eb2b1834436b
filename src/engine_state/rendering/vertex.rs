//! Vertex layout produced by the extraction kernel.
//!
//! The kernel appends one `vec4<f32>` position per vertex; chunk vertex
//! buffers are exact-size copies of that output and are bound directly by the
//! draw pass.

/// A vertex in a chunk's vertex buffer.
///
/// # Memory Layout
/// - Position: 4x f32 (16 bytes), `w` is always 1.0
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    /// Homogeneous position in chunk-local voxel units
    pub position: [f32; 4],
}

/// Size of one vertex in bytes.
pub const VERTEX_STRIDE: wgpu::BufferAddress = std::mem::size_of::<Vertex>() as wgpu::BufferAddress;

impl Vertex {
    /// Vertex buffer layout for a render pipeline consuming chunk buffers.
    ///
    /// # Shader Attributes
    /// - `location = 0`: position (vec4<f32>)
    pub fn desc<'a>() -> wgpu::VertexBufferLayout<'a> {
        wgpu::VertexBufferLayout {
            array_stride: VERTEX_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[wgpu::VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x4,
            }],
        }
    }
}

/// Bytes needed to hold `vertex_count` vertices.
pub fn vertex_bytes(vertex_count: u32) -> wgpu::BufferAddress {
    vertex_count as wgpu::BufferAddress * VERTEX_STRIDE
}
