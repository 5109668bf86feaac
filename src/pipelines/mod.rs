//! The wgpu implementation of the render backend.
//!
//! - `basic` holds the vertex layout and render pipeline construction
//! - `reflect` validates WGSL programs and reflects their bindings
//! - `texture` contains the GPU texture wrapper and upload utilities
//! - `wgpu_backend` records draw calls and replays them as render passes

pub mod basic;
pub mod reflect;
pub mod texture;
pub mod wgpu_backend;

pub use wgpu_backend::WgpuBackend;
