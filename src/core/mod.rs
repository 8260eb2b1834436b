//! # Core Module
//!
//! Shared ownership primitives used throughout the mesher.
//!
//! Everything in this crate runs on a single cooperative tick thread, so the
//! only container needed is `StResource`, a reference-counted cell that lets
//! the spatial index and the meshing queue refer to the same chunk.
//!
//! ## Usage
//! ```rust
//! use voxel_mesher::core::StResource;
//!
//! let chunk_count = StResource::new(0u32);
//! *chunk_count.get_mut() += 1;
//! assert_eq!(*chunk_count.get(), 1);
//! ```

pub mod st_resource;

pub use st_resource::StResource;
